//! Session handling: turns stored credentials into Drive access tokens.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{BackupError, Result};
use crate::models::{
    AuthorizedUserCredentials, Credentials, ServiceAccountCredentials, TokenResponse,
};

/// Google OAuth2 token endpoint.
const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Google Drive API scope.
const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// JWT claims for service account authentication.
#[derive(Debug, Serialize)]
struct Claims {
    iss: String,   // Issuer (service account email)
    scope: String, // OAuth scope
    aud: String,   // Audience (token endpoint)
    exp: u64,      // Expiration time
    iat: u64,      // Issued at
}

/// Cached access token with expiration.
#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: SystemTime,
}

enum TokenSource {
    ServiceAccount(ServiceAccountCredentials),
    AuthorizedUser(AuthorizedUserCredentials),
    Static(String),
}

/// The session object shared by every component that talks to Drive.
///
/// Cloning is cheap; clones share the same token cache.
#[derive(Clone)]
pub struct Authenticator {
    source: Arc<TokenSource>,
    client: Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
}

impl Authenticator {
    /// Create a new authenticator from a credentials JSON file.
    ///
    /// Accepts service account keys and authorized-user credentials.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => BackupError::AuthenticationError(format!(
                "credentials file {} does not exist",
                path.display()
            )),
            _ => BackupError::Io(e),
        })?;
        let credentials: Credentials = serde_json::from_str(&content)?;
        Ok(Self::new(credentials))
    }

    /// Create a new authenticator from credentials.
    pub fn new(credentials: Credentials) -> Self {
        let source = match credentials {
            Credentials::ServiceAccount(creds) => TokenSource::ServiceAccount(creds),
            Credentials::AuthorizedUser(creds) => TokenSource::AuthorizedUser(creds),
        };
        Self::from_source(source)
    }

    /// Create an authenticator around an already issued access token.
    ///
    /// The token is never refreshed.
    pub fn with_access_token(token: impl Into<String>) -> Self {
        Self::from_source(TokenSource::Static(token.into()))
    }

    fn from_source(source: TokenSource) -> Self {
        Self {
            source: Arc::new(source),
            client: Client::new(),
            cached_token: Arc::new(RwLock::new(None)),
        }
    }

    /// Get a valid access token, refreshing if necessary.
    pub async fn get_access_token(&self) -> Result<String> {
        // Check if we have a valid cached token
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                // Add 60 second buffer before expiration
                let buffer = Duration::from_secs(60);
                if token.expires_at > SystemTime::now() + buffer {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let new_token = match self.source.as_ref() {
            TokenSource::ServiceAccount(creds) => self.exchange_jwt(creds).await?,
            TokenSource::AuthorizedUser(creds) => self.refresh_user_token(creds).await?,
            TokenSource::Static(token) => return Ok(token.clone()),
        };

        {
            let mut cached = self.cached_token.write().await;
            *cached = Some(new_token.clone());
        }

        Ok(new_token.access_token)
    }

    /// Obtain an access token using a signed JWT assertion.
    async fn exchange_jwt(&self, creds: &ServiceAccountCredentials) -> Result<CachedToken> {
        let token_uri = creds.token_uri.as_deref().unwrap_or(TOKEN_URI);
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        let claims = Claims {
            iss: creds.client_email.clone(),
            scope: DRIVE_SCOPE.to_string(),
            aud: token_uri.to_string(),
            iat: now,
            exp: now + 3600, // 1 hour
        };

        let header = Header::new(Algorithm::RS256);
        let key = EncodingKey::from_rsa_pem(creds.private_key.as_bytes())?;
        let jwt = encode(&header, &claims, &key)?;

        debug!(email = %creds.client_email, "requesting service account token");
        let params = [
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", jwt.as_str()),
        ];
        self.request_token(token_uri, &params).await
    }

    /// Obtain an access token using a stored refresh token.
    async fn refresh_user_token(&self, creds: &AuthorizedUserCredentials) -> Result<CachedToken> {
        let token_uri = creds.token_uri.as_deref().unwrap_or(TOKEN_URI);

        debug!(client_id = %creds.client_id, "refreshing user access token");
        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", creds.client_id.as_str()),
            ("client_secret", creds.client_secret.as_str()),
            ("refresh_token", creds.refresh_token.as_str()),
        ];
        self.request_token(token_uri, &params).await
    }

    async fn request_token(&self, token_uri: &str, params: &[(&str, &str)]) -> Result<CachedToken> {
        let response = self.client.post(token_uri).form(params).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BackupError::TokenRefreshError(format!(
                "Status {}: {}",
                status, body
            )));
        }

        let token_response: TokenResponse = response.json().await?;

        let expires_at = SystemTime::now() + Duration::from_secs(token_response.expires_in);

        Ok(CachedToken {
            access_token: token_response.access_token,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_serialization() {
        let claims = Claims {
            iss: "backup@example.iam.gserviceaccount.com".to_string(),
            scope: DRIVE_SCOPE.to_string(),
            aud: TOKEN_URI.to_string(),
            iat: 1234567890,
            exp: 1234571490,
        };

        let json = serde_json::to_string(&claims).unwrap();
        assert!(json.contains("backup@example.iam.gserviceaccount.com"));
        assert!(json.contains(DRIVE_SCOPE));
    }

    #[tokio::test]
    async fn test_static_token() {
        let auth = Authenticator::with_access_token("ya29.static");
        assert_eq!(auth.get_access_token().await.unwrap(), "ya29.static");
    }

    #[test]
    fn test_missing_credentials_file() {
        let err = match Authenticator::from_file("/nonexistent/creds.json") {
            Err(e) => e,
            Ok(_) => panic!("expected an error"),
        };
        assert!(matches!(err, BackupError::AuthenticationError(_)));
    }
}
