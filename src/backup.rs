//! Backup folder resolution and uploads.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::archive::{self, base_name};
use crate::client::DriveClient;
use crate::error::{BackupError, Result};
use crate::models::RemoteFile;

/// Name of the drive folder backups go to unless configured otherwise.
pub const DEFAULT_FOLDER_NAME: &str = "Backups";

/// What a local path is expected to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    File,
    Directory,
}

impl PathKind {
    /// Inspect the filesystem to find out what `path` is.
    pub fn detect<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => BackupError::PathNotFound(path.to_path_buf()),
            _ => BackupError::Io(e),
        })?;
        if metadata.is_dir() {
            Ok(PathKind::Directory)
        } else {
            Ok(PathKind::File)
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Trash a same-named file in the backup folder before uploading.
    pub replace_existing: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            replace_existing: true,
        }
    }
}

/// Backup operations scoped to one named drive folder.
pub struct BackupService {
    client: DriveClient,
    folder_name: String,
    temp_dir: Option<PathBuf>,
}

impl BackupService {
    pub fn new(client: DriveClient) -> Self {
        Self {
            client,
            folder_name: DEFAULT_FOLDER_NAME.to_string(),
            temp_dir: None,
        }
    }

    pub fn with_folder_name(mut self, folder_name: impl Into<String>) -> Self {
        self.folder_name = folder_name.into();
        self
    }

    /// Build directory archives under `dir` instead of the system temp dir.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    pub fn folder_name(&self) -> &str {
        &self.folder_name
    }

    pub fn client(&self) -> &DriveClient {
        &self.client
    }

    /// Return the id of the backup folder, creating it if it does not exist.
    ///
    /// Folders are listed on every call. After a create the listing is
    /// queried again instead of trusting the create response.
    pub async fn resolve_folder(&self) -> Result<String> {
        if let Some(id) = self.find_folder().await? {
            return Ok(id);
        }

        info!(folder = %self.folder_name, "backup folder missing, creating it");
        self.client.create_folder(&self.folder_name, None).await?;

        self.find_folder().await?.ok_or_else(|| {
            BackupError::NotFound(format!(
                "folder '{}' not listed after creation",
                self.folder_name
            ))
        })
    }

    async fn find_folder(&self) -> Result<Option<String>> {
        let folders = self.client.list_folders().await?;
        Ok(folders
            .into_iter()
            .find(|f| f.name == self.folder_name)
            .map(|f| f.id))
    }

    /// Upload a file or directory into the backup folder.
    ///
    /// Directories are zipped first and uploaded as `<name>.zip`. The path is
    /// checked against `kind` before anything is sent to the remote store.
    pub async fn upload_path<P: AsRef<Path>>(
        &self,
        path: P,
        kind: PathKind,
        options: &UploadOptions,
    ) -> Result<RemoteFile> {
        let path = path.as_ref();
        match (kind, PathKind::detect(path)?) {
            (PathKind::File, PathKind::Directory) => {
                return Err(BackupError::NotAFile(path.to_path_buf()))
            }
            (PathKind::Directory, PathKind::File) => {
                return Err(BackupError::NotADirectory(path.to_path_buf()))
            }
            _ => {}
        }

        let folder_id = self.resolve_folder().await?;
        let uploaded = match kind {
            PathKind::Directory => self.upload_directory(path, &folder_id).await?,
            PathKind::File => self.upload_file(path, &folder_id, options).await?,
        };

        info!(name = %uploaded.name, id = %uploaded.id, "upload complete");
        Ok(uploaded)
    }

    async fn upload_directory(&self, path: &Path, folder_id: &str) -> Result<RemoteFile> {
        let source: PathBuf = path.to_path_buf();
        let temp_dir = self.temp_dir.clone();
        let archive = tokio::task::spawn_blocking(move || match temp_dir {
            Some(dir) => archive::archive_in(source, dir),
            None => archive::archive(source),
        })
        .await
        .map_err(|e| BackupError::Io(std::io::Error::other(e)))??;

        let display_name = archive.file_name();
        debug!(archive = %archive.path().display(), "uploading directory archive");
        // `archive` is dropped when this returns, removing the temp file.
        self.client
            .upload_file(archive.path(), &display_name, Some(folder_id))
            .await
    }

    async fn upload_file(
        &self,
        path: &Path,
        folder_id: &str,
        options: &UploadOptions,
    ) -> Result<RemoteFile> {
        let name = base_name(path)?;

        // Not atomic: if the upload fails after the trash, no copy remains.
        if options.replace_existing {
            let existing = self.client.list_files(folder_id).await?;
            for old in existing.iter().filter(|f| f.name == name) {
                info!(name = %name, id = %old.id, "replacing existing backup");
                self.client.trash_file(&old.id).await?;
            }
        }

        self.client.upload_file(path, &name, Some(folder_id)).await
    }

    /// Trash the backup named `name`.
    pub async fn trash_backup(&self, name: &str) -> Result<RemoteFile> {
        let folder_id = self.resolve_folder().await?;
        let file = self
            .client
            .list_files(&folder_id)
            .await?
            .into_iter()
            .find(|f| f.name == name)
            .ok_or_else(|| {
                BackupError::NotFound(format!("'{}' in folder '{}'", name, self.folder_name))
            })?;

        self.client.trash_file(&file.id).await?;
        info!(name = %file.name, id = %file.id, "backup trashed");
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_path_kind() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.txt");
        std::fs::write(&file, b"hello").unwrap();

        assert_eq!(PathKind::detect(dir.path()).unwrap(), PathKind::Directory);
        assert_eq!(PathKind::detect(&file).unwrap(), PathKind::File);
        assert!(matches!(
            PathKind::detect(dir.path().join("missing")),
            Err(BackupError::PathNotFound(_))
        ));
    }

    #[test]
    fn test_detect_keeps_other_io_errors() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.txt");
        std::fs::write(&file, b"hello").unwrap();

        // A regular file used as a directory fails with ENOTDIR, not ENOENT.
        let err = PathKind::detect(file.join("child")).unwrap_err();
        assert!(matches!(err, BackupError::Io(_)), "unexpected error: {:?}", err);
    }

    #[test]
    fn test_default_options_replace() {
        assert!(UploadOptions::default().replace_existing);
    }
}
