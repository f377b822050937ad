//! drive_backup - Back up local files and directories to a Google Drive folder.
//!
//! This library provides functionality to:
//! - Upload files, and directories as zip archives, to a backup folder
//!   that is created on first use
//! - List the backups stored in that folder
//! - Restore a backup by name or by its number in a listing
//!
//! # Example
//!
//! ```no_run
//! use drive_backup::{Authenticator, BackupService, DriveClient, PathKind, UploadOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let auth = Authenticator::from_file("creds.json")?;
//!     let service = BackupService::new(DriveClient::new(auth));
//!
//!     service
//!         .upload_path("notes.txt", PathKind::File, &UploadOptions::default())
//!         .await?;
//!
//!     let listing = service.list_backups().await?;
//!     for (number, file) in listing.entries() {
//!         println!("{}. {}", number, file.name);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod auth;
pub mod backup;
pub mod client;
pub mod error;
pub mod models;
pub mod restore;

// Re-exports for convenience
pub use auth::Authenticator;
pub use backup::{BackupService, PathKind, UploadOptions, DEFAULT_FOLDER_NAME};
pub use client::DriveClient;
pub use error::{BackupError, Result};
pub use models::{RemoteFile, RemoteFolder};
pub use restore::{BackupListing, Selector};
