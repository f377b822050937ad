//! Zip archiving of directories before upload.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{BackupError, Result};

/// A zip archive living in its own temporary directory.
///
/// The archive and its directory are removed when this value is dropped,
/// whether or not the upload that used it succeeded.
#[derive(Debug)]
pub struct ArchiveFile {
    path: PathBuf,
    _dir: TempDir,
}

impl ArchiveFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The archive's file name, `<directory name>.zip`.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Archive `source` into a temporary `<base name>.zip`.
pub fn archive<P: AsRef<Path>>(source: P) -> Result<ArchiveFile> {
    let source = source.as_ref();
    ensure_directory(source)?;

    let dir = tempfile::Builder::new().prefix("drive_backup").tempdir()?;
    archive_scoped(source, dir)
}

/// Like [`archive`], but the temporary directory is created inside `temp_root`.
pub fn archive_in<P: AsRef<Path>, Q: AsRef<Path>>(source: P, temp_root: Q) -> Result<ArchiveFile> {
    let source = source.as_ref();
    ensure_directory(source)?;

    let dir = tempfile::Builder::new()
        .prefix("drive_backup")
        .tempdir_in(temp_root)?;
    archive_scoped(source, dir)
}

fn archive_scoped(source: &Path, dir: TempDir) -> Result<ArchiveFile> {
    let path = archive_into(source, dir.path())?;
    Ok(ArchiveFile { path, _dir: dir })
}

/// Archive `source` into `dest_dir/<base name>.zip` and return that path.
///
/// Entry names are relative to the parent of `source`, so extracting the
/// archive recreates a folder named after `source`. Symlinked files are
/// stored with their target's content; symlinked directories are skipped.
pub fn archive_into<P: AsRef<Path>, Q: AsRef<Path>>(source: P, dest_dir: Q) -> Result<PathBuf> {
    let source = source.as_ref();
    ensure_directory(source)?;

    let root_name = base_name(source)?;
    let archive_path = dest_dir.as_ref().join(format!("{}.zip", root_name));

    let mut zip = ZipWriter::new(BufWriter::new(File::create(&archive_path)?));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut files = 0usize;
    for entry in WalkDir::new(source).sort_by_file_name() {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| BackupError::Io(io::Error::other(e)))?;
        let name = entry_name(&root_name, relative);

        let file_type = entry.file_type();
        if file_type.is_dir() {
            zip.add_directory(name, options)?;
        } else if file_type.is_file() || (file_type.is_symlink() && entry.path().is_file()) {
            zip.start_file(name, options)?;
            let mut input = File::open(entry.path())?;
            io::copy(&mut input, &mut zip)?;
            files += 1;
        }
    }

    zip.finish()?.flush()?;
    debug!(source = %source.display(), archive = %archive_path.display(), files, "archive written");
    Ok(archive_path)
}

/// The last component of `path`, resolving `.` and `..` against the
/// filesystem when needed.
pub fn base_name<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    if let Some(name) = path.file_name() {
        return Ok(name.to_string_lossy().into_owned());
    }

    let canonical = fs::canonicalize(path)?;
    canonical
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| BackupError::NotFound(format!("no file name in {}", path.display())))
}

fn ensure_directory(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(BackupError::PathNotFound(path.to_path_buf()));
    }
    if !path.is_dir() {
        return Err(BackupError::NotADirectory(path.to_path_buf()));
    }
    Ok(())
}

/// Zip entry name for `relative` below the archive root, always `/`-separated.
fn entry_name(root_name: &str, relative: &Path) -> String {
    let mut name = root_name.to_string();
    for component in relative.components() {
        name.push('/');
        name.push_str(&component.as_os_str().to_string_lossy());
    }
    name
}
