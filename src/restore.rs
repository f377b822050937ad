//! Listing and restoring backups.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::backup::BackupService;
use crate::error::{BackupError, Result};
use crate::models::RemoteFile;

/// How a backup to restore is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Exact file name in the backup folder.
    Name(String),
    /// 1-based position in a [`BackupListing`].
    Index(usize),
}

/// Snapshot of the backup folder's contents, in the order Drive listed them.
///
/// Numeric selections are resolved against this snapshot, so the numbers a
/// user saw are the numbers that get used.
#[derive(Debug, Clone)]
pub struct BackupListing {
    folder_id: String,
    files: Vec<RemoteFile>,
}

impl BackupListing {
    pub fn new(folder_id: impl Into<String>, files: Vec<RemoteFile>) -> Self {
        Self {
            folder_id: folder_id.into(),
            files,
        }
    }

    pub fn folder_id(&self) -> &str {
        &self.folder_id
    }

    pub fn files(&self) -> &[RemoteFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Files paired with their 1-based display number.
    pub fn entries(&self) -> impl Iterator<Item = (usize, &RemoteFile)> {
        self.files.iter().enumerate().map(|(i, f)| (i + 1, f))
    }

    pub fn select(&self, selector: &Selector) -> Result<&RemoteFile> {
        match selector {
            Selector::Name(name) => self
                .files
                .iter()
                .find(|f| &f.name == name)
                .ok_or_else(|| BackupError::NotFound(name.clone())),
            Selector::Index(index) => index
                .checked_sub(1)
                .and_then(|i| self.files.get(i))
                .ok_or(BackupError::InvalidSelection {
                    index: *index,
                    count: self.files.len(),
                }),
        }
    }
}

impl BackupService {
    /// Take a snapshot of the files in the backup folder.
    pub async fn list_backups(&self) -> Result<BackupListing> {
        let folder_id = self.resolve_folder().await?;
        let files = self.client().list_files(&folder_id).await?;
        Ok(BackupListing::new(folder_id, files))
    }

    /// Download `file` into `dest_dir`, creating the directory if needed.
    ///
    /// Returns the path that was written.
    pub async fn restore<P: AsRef<Path>>(&self, file: &RemoteFile, dest_dir: P) -> Result<PathBuf> {
        let dest_dir = dest_dir.as_ref();
        tokio::fs::create_dir_all(dest_dir).await?;

        let target = dest_dir.join(local_file_name(&file.name));
        let bytes = self.client().download_file(&file.id, &target).await?;

        info!(name = %file.name, path = %target.display(), bytes, "backup restored");
        Ok(target)
    }

    /// List the backup folder, pick a file with `selector` and restore it.
    ///
    /// Nothing is written locally when the selection is invalid.
    pub async fn restore_selected<P: AsRef<Path>>(
        &self,
        selector: &Selector,
        dest_dir: P,
    ) -> Result<PathBuf> {
        let listing = self.list_backups().await?;
        let file = listing.select(selector)?;
        self.restore(file, dest_dir).await
    }
}

/// Remote names may contain path separators; keep the restored file inside
/// the destination directory.
fn local_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "_".repeat(cleaned.len().max(1)),
        _ => cleaned,
    }
}
