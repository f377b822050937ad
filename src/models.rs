//! Data models for Google Drive API responses and backup entries.

use serde::{Deserialize, Serialize};

/// MIME type Google Drive uses for folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Metadata for a file or folder in Google Drive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default, deserialize_with = "deserialize_size")]
    pub size: Option<u64>,
    #[serde(default)]
    pub parents: Vec<String>,
}

fn deserialize_size<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt {
        Some(s) => s.parse::<u64>().map(Some).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

impl FileMetadata {
    pub fn is_folder(&self) -> bool {
        self.mime_type.as_deref() == Some(FOLDER_MIME_TYPE)
    }

    /// Convert into a [`RemoteFile`], using `fallback_parent` when the
    /// response did not carry a parent.
    pub fn into_remote_file(self, fallback_parent: &str) -> RemoteFile {
        let parent_folder_id = self
            .parents
            .into_iter()
            .next()
            .unwrap_or_else(|| fallback_parent.to_string());
        RemoteFile {
            name: self.name,
            id: self.id,
            parent_folder_id,
            size: self.size,
        }
    }
}

/// A folder in the user's drive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFolder {
    pub name: String,
    pub id: String,
}

impl From<FileMetadata> for RemoteFolder {
    fn from(metadata: FileMetadata) -> Self {
        Self {
            name: metadata.name,
            id: metadata.id,
        }
    }
}

/// A non-folder object stored inside a drive folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub name: String,
    pub id: String,
    pub parent_folder_id: String,
    pub size: Option<u64>,
}

impl std::fmt::Display for RemoteFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let size_str = self
            .size
            .map(format_size)
            .unwrap_or_else(|| "-".to_string());
        write!(f, "{:>10}  {:<44} {}", size_str, self.id, self.name)
    }
}

/// Format bytes into human-readable size.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Response from the files.list API endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileListResponse {
    #[serde(default)]
    pub files: Vec<FileMetadata>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Google API error response.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    pub code: u16,
    pub message: String,
}

/// Service account credentials from JSON file.
#[derive(Debug, Deserialize)]
pub struct ServiceAccountCredentials {
    pub client_email: String,
    pub private_key: String,
    pub token_uri: Option<String>,
}

/// OAuth client credentials for a user who already granted consent.
///
/// Both the `authorized_user` files written by gcloud and the
/// `creds.json` cache written by the installed-app flow have this shape.
#[derive(Debug, Deserialize)]
pub struct AuthorizedUserCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    #[serde(default)]
    pub token_uri: Option<String>,
}

/// Any credential file the authenticator understands.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Credentials {
    ServiceAccount(ServiceAccountCredentials),
    AuthorizedUser(AuthorizedUserCredentials),
}

/// OAuth2 token response.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    pub expires_in: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1048576), "1.00 MB");
        assert_eq!(format_size(1073741824), "1.00 GB");
    }

    #[test]
    fn test_file_metadata_deserialize() {
        let json = r#"{
            "id": "abc123",
            "name": "notes.txt",
            "mimeType": "text/plain",
            "size": "1024",
            "parents": ["folder1"]
        }"#;

        let metadata: FileMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(metadata.id, "abc123");
        assert_eq!(metadata.name, "notes.txt");
        assert_eq!(metadata.mime_type, Some("text/plain".to_string()));
        assert_eq!(metadata.size, Some(1024));
        assert_eq!(metadata.parents, vec!["folder1".to_string()]);
        assert!(!metadata.is_folder());
    }

    #[test]
    fn test_into_remote_file_fallback_parent() {
        let metadata = FileMetadata {
            id: "abc123".to_string(),
            name: "notes.txt".to_string(),
            mime_type: None,
            size: None,
            parents: Vec::new(),
        };

        let file = metadata.into_remote_file("backups-id");
        assert_eq!(file.parent_folder_id, "backups-id");
        assert_eq!(file.id, "abc123");
    }

    #[test]
    fn test_remote_file_display() {
        let file = RemoteFile {
            name: "project.zip".to_string(),
            id: "abc123".to_string(),
            parent_folder_id: "folder1".to_string(),
            size: Some(2048),
        };

        let display = format!("{}", file);
        assert!(display.contains("abc123"));
        assert!(display.contains("project.zip"));
        assert!(display.contains("2.00 KB"));
    }

    #[test]
    fn test_credentials_untagged() {
        let service: Credentials = serde_json::from_str(
            r#"{"client_email": "svc@example.com", "private_key": "key"}"#,
        )
        .unwrap();
        assert!(matches!(service, Credentials::ServiceAccount(_)));

        let user: Credentials = serde_json::from_str(
            r#"{
                "access_token": "stale",
                "client_id": "id.apps.googleusercontent.com",
                "client_secret": "secret",
                "refresh_token": "1//refresh",
                "token_uri": "https://oauth2.googleapis.com/token",
                "invalid": false
            }"#,
        )
        .unwrap();
        assert!(matches!(user, Credentials::AuthorizedUser(_)));
    }
}
