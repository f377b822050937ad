//! Google Drive API client used by the backup and restore operations.

use std::path::Path;

use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, RequestBuilder, Response};
use serde_json::{json, Value};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::auth::Authenticator;
use crate::error::{BackupError, Result};
use crate::models::{
    ApiErrorResponse, FileListResponse, FileMetadata, RemoteFile, RemoteFolder, FOLDER_MIME_TYPE,
};

/// Base URL for Google Drive API v3.
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Upload URL for Google Drive API.
const UPLOAD_API_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// Threshold for resumable upload (500 MB).
const RESUMABLE_THRESHOLD: u64 = 500 * 1024 * 1024;

const FILE_FIELDS: &str = "id, name, size, mimeType, parents";
const LIST_FIELDS: &str = "nextPageToken, files(id, name, size, mimeType, parents)";

/// Parent alias Drive resolves to the user's "My Drive" root.
const ROOT_ALIAS: &str = "root";

/// Client for the handful of Drive calls a backup needs.
///
/// Every method performs one remote round trip (plus paging for listings)
/// and never retries.
pub struct DriveClient {
    auth: Authenticator,
    http: Client,
    api_base: String,
    upload_base: String,
    drive_id: Option<String>,
}

impl DriveClient {
    /// Create a client talking to the public Google Drive endpoints.
    pub fn new(auth: Authenticator) -> Self {
        Self::with_endpoints(auth, DRIVE_API_BASE, UPLOAD_API_BASE)
    }

    /// Create a client with custom API and upload base URLs.
    pub fn with_endpoints(
        auth: Authenticator,
        api_base: impl Into<String>,
        upload_base: impl Into<String>,
    ) -> Self {
        Self {
            auth,
            http: Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            upload_base: upload_base.into().trim_end_matches('/').to_string(),
            drive_id: None,
        }
    }

    /// Scope every call to a Shared Drive instead of "My Drive".
    pub fn with_shared_drive(mut self, drive_id: impl Into<String>) -> Self {
        self.drive_id = Some(drive_id.into());
        self
    }

    /// Get the Shared Drive ID, if any.
    pub fn drive_id(&self) -> Option<&str> {
        self.drive_id.as_deref()
    }

    fn default_parent(&self) -> &str {
        self.drive_id.as_deref().unwrap_or(ROOT_ALIAS)
    }

    /// List every non-trashed folder visible to the session.
    pub async fn list_folders(&self) -> Result<Vec<RemoteFolder>> {
        let query = format!("mimeType='{}' and trashed=false", FOLDER_MIME_TYPE);
        let folders = self.query_files(&query).await?;
        Ok(folders.into_iter().map(RemoteFolder::from).collect())
    }

    /// List every non-trashed, non-folder object directly inside a folder.
    pub async fn list_files(&self, folder_id: &str) -> Result<Vec<RemoteFile>> {
        let query = format!(
            "'{}' in parents and mimeType != '{}' and trashed=false",
            folder_id, FOLDER_MIME_TYPE
        );
        let files = self.query_files(&query).await?;
        Ok(files
            .into_iter()
            .map(|f| f.into_remote_file(folder_id))
            .collect())
    }

    /// Query files using Google Drive query syntax.
    pub async fn query_files(&self, query: &str) -> Result<Vec<FileMetadata>> {
        let token = self.auth.get_access_token().await?;
        let mut all_files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            debug!(query, "listing drive files");
            let mut request = self
                .http
                .get(format!("{}/files", self.api_base))
                .bearer_auth(&token)
                .query(&[
                    ("q", query),
                    ("supportsAllDrives", "true"),
                    ("spaces", "drive"),
                    ("fields", LIST_FIELDS),
                ]);

            if let Some(ref drive_id) = self.drive_id {
                request = request.query(&[
                    ("driveId", drive_id.as_str()),
                    ("corpora", "drive"),
                    ("includeItemsFromAllDrives", "true"),
                ]);
            }

            if let Some(ref token) = page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let response = send_checked(request).await?;
            let list_response: FileListResponse = response.json().await?;
            all_files.extend(list_response.files);

            match list_response.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(all_files)
    }

    /// Get file metadata by ID.
    pub async fn get_file(&self, file_id: &str) -> Result<FileMetadata> {
        let token = self.auth.get_access_token().await?;

        let request = self
            .http
            .get(format!("{}/files/{}", self.api_base, file_id))
            .bearer_auth(&token)
            .query(&[("supportsAllDrives", "true"), ("fields", FILE_FIELDS)]);

        let metadata: FileMetadata = send_checked(request).await?.json().await?;
        Ok(metadata)
    }

    /// Create a folder. Without a parent it lands in the drive root.
    pub async fn create_folder(&self, name: &str, parent_id: Option<&str>) -> Result<RemoteFolder> {
        let token = self.auth.get_access_token().await?;
        let metadata = self.object_metadata(name, Some(FOLDER_MIME_TYPE), parent_id);

        debug!(name, "creating folder");
        let request = self
            .http
            .post(format!("{}/files", self.api_base))
            .bearer_auth(&token)
            .query(&[("supportsAllDrives", "true"), ("fields", FILE_FIELDS)])
            .json(&metadata);

        let created: FileMetadata = send_checked(request).await?.json().await?;
        Ok(created.into())
    }

    /// Move a file to the trash.
    pub async fn trash_file(&self, file_id: &str) -> Result<()> {
        let token = self.auth.get_access_token().await?;

        debug!(file_id, "trashing file");
        let request = self
            .http
            .patch(format!("{}/files/{}", self.api_base, file_id))
            .bearer_auth(&token)
            .query(&[("supportsAllDrives", "true")])
            .json(&json!({ "trashed": true }));

        send_checked(request).await?;
        Ok(())
    }

    /// Upload a local file as a new drive object named `display_name`.
    ///
    /// Existing objects with the same name are left alone; replacing them
    /// is up to the caller.
    pub async fn upload_file<P: AsRef<Path>>(
        &self,
        local_path: P,
        display_name: &str,
        parent_id: Option<&str>,
    ) -> Result<RemoteFile> {
        let local_path = local_path.as_ref();
        let file_size = tokio::fs::metadata(local_path).await?.len();
        let mime_type = mime_guess::from_path(display_name)
            .first_or_octet_stream()
            .to_string();
        let metadata = self.object_metadata(display_name, None, parent_id);

        let uploaded = if file_size > RESUMABLE_THRESHOLD {
            self.upload_resumable(local_path, file_size, &metadata, &mime_type)
                .await?
        } else {
            self.upload_multipart(local_path, file_size, &metadata, display_name, &mime_type)
                .await?
        };

        Ok(uploaded.into_remote_file(parent_id.unwrap_or_else(|| self.default_parent())))
    }

    /// Upload a file using multipart upload (for smaller files).
    async fn upload_multipart(
        &self,
        local_path: &Path,
        file_size: u64,
        metadata: &Value,
        filename: &str,
        mime_type: &str,
    ) -> Result<FileMetadata> {
        let token = self.auth.get_access_token().await?;
        let file = File::open(local_path).await?;

        let metadata_part = Part::text(metadata.to_string()).mime_str("application/json")?;

        let file_part = Part::stream_with_length(Body::wrap_stream(ReaderStream::new(file)), file_size)
            .file_name(filename.to_string())
            .mime_str(mime_type)?;

        let form = Form::new()
            .part("metadata", metadata_part)
            .part("file", file_part);

        debug!(filename, file_size, "multipart upload");
        let request = self
            .http
            .post(format!("{}/files", self.upload_base))
            .bearer_auth(&token)
            .query(&[
                ("uploadType", "multipart"),
                ("supportsAllDrives", "true"),
                ("fields", FILE_FIELDS),
            ])
            .multipart(form);

        let metadata: FileMetadata = send_checked(request).await?.json().await?;
        Ok(metadata)
    }

    /// Upload a file using resumable upload (for larger files).
    async fn upload_resumable(
        &self,
        local_path: &Path,
        file_size: u64,
        metadata: &Value,
        mime_type: &str,
    ) -> Result<FileMetadata> {
        let token = self.auth.get_access_token().await?;

        // Step 1: Initiate resumable upload
        debug!(file_size, "starting resumable upload session");
        let init_request = self
            .http
            .post(format!("{}/files", self.upload_base))
            .bearer_auth(&token)
            .query(&[("uploadType", "resumable"), ("supportsAllDrives", "true")])
            .header("X-Upload-Content-Type", mime_type)
            .header("X-Upload-Content-Length", file_size.to_string())
            .json(metadata);

        let init_response = send_checked(init_request).await?;

        let upload_url = init_response
            .headers()
            .get("Location")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| BackupError::ApiError {
                status: init_response.status().as_u16(),
                message: "No upload URL in response".to_string(),
            })?
            .to_string();

        // Step 2: Stream the file content
        let file = File::open(local_path).await?;
        let upload_request = self
            .http
            .put(&upload_url)
            .header("Content-Type", mime_type)
            .header("Content-Length", file_size.to_string())
            .query(&[("fields", FILE_FIELDS)])
            .body(Body::wrap_stream(ReaderStream::new(file)));

        let metadata: FileMetadata = send_checked(upload_request).await?.json().await?;
        Ok(metadata)
    }

    /// Download a file's content to `destination`, overwriting it.
    ///
    /// Returns the number of bytes written.
    pub async fn download_file<P: AsRef<Path>>(&self, file_id: &str, destination: P) -> Result<u64> {
        let token = self.auth.get_access_token().await?;
        let destination = destination.as_ref();

        debug!(file_id, destination = %destination.display(), "downloading file");
        let request = self
            .http
            .get(format!("{}/files/{}", self.api_base, file_id))
            .bearer_auth(&token)
            .query(&[("alt", "media"), ("supportsAllDrives", "true")]);

        let response = send_checked(request).await?;

        // Stream to file
        let mut file = File::create(destination).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        file.flush().await?;

        Ok(written)
    }

    fn object_metadata(&self, name: &str, mime_type: Option<&str>, parent_id: Option<&str>) -> Value {
        let mut metadata = json!({ "name": name });
        if let Some(mime_type) = mime_type {
            metadata["mimeType"] = json!(mime_type);
        }
        // Shared drives have no implicit root, so objects go to the drive itself.
        if let Some(parent) = parent_id.or(self.drive_id.as_deref()) {
            metadata["parents"] = json!([parent]);
        }
        metadata
    }
}

/// Send a request and turn non-success statuses into [`BackupError::ApiError`].
async fn send_checked(request: RequestBuilder) -> Result<Response> {
    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_body = response.text().await.unwrap_or_default();
    if let Ok(api_error) = serde_json::from_str::<ApiErrorResponse>(&error_body) {
        return Err(BackupError::ApiError {
            status: api_error.error.code,
            message: api_error.error.message,
        });
    }
    Err(BackupError::ApiError {
        status: status.as_u16(),
        message: error_body,
    })
}
