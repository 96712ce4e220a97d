//! Upload of the finished feed to Google Cloud Storage.
//!
//! The upload talks to the Cloud Storage JSON API directly with `reqwest`:
//!
//! 1. **Authorization**: either a ready-made OAuth token
//!    (`GOOGLE_OAUTH_ACCESS_TOKEN`) or a credentials file
//!    (`GOOGLE_APPLICATION_CREDENTIALS`). A `service_account` key signs a JWT
//!    that is exchanged for a token at the key's `token_uri`; an
//!    `authorized_user` file (written by `gcloud auth application-default
//!    login`) trades its refresh token for one.
//! 2. **Upload**: a single `multipart/related` request carrying the object
//!    metadata and the feed bytes.
//!
//! The whole upload, token exchange included, is bounded by
//! [`UPLOAD_TIMEOUT`].

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, instrument};

/// Upper bound for one upload including authorization.
pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Content type of uploaded feeds.
pub const CONTENT_TYPE: &str = "application/xml";

/// Value of the `created-by` object metadata.
pub const CREATED_BY: &str = "yle-scraper";

const STORAGE_SCOPE: &str = "https://www.googleapis.com/auth/devstorage.read_write";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_STORAGE_BASE: &str = "https://storage.googleapis.com";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const REFRESH_TOKEN_GRANT: &str = "refresh_token";
const MULTIPART_BOUNDARY: &str = "yle_search_rss_multipart_boundary";

/// Errors raised while uploading a feed.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Google Cloud credentials unavailable: {0}")]
    Credentials(String),
    #[error("failed to sign token request: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("token endpoint returned {status}: {body}")]
    Token { status: u16, body: String },
    #[error("upload rejected with {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("upload timed out after {0:?}")]
    Timeout(Duration),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// The fields of a service-account key file this uploader needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// The fields of an `authorized_user` credentials file.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizedUser {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

/// How the uploader authorizes itself.
#[derive(Debug, Clone)]
pub enum Credentials {
    ServiceAccount(ServiceAccountKey),
    AuthorizedUser(AuthorizedUser),
    AccessToken(String),
}

/// Credentials file contents, discriminated by their `type` field.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum CredentialsFile {
    ServiceAccount(ServiceAccountKey),
    AuthorizedUser(AuthorizedUser),
}

impl Credentials {
    /// Credentials from `GOOGLE_OAUTH_ACCESS_TOKEN` or `GOOGLE_APPLICATION_CREDENTIALS`.
    pub fn from_env() -> Result<Self, UploadError> {
        Self::from_sources(
            std::env::var("GOOGLE_OAUTH_ACCESS_TOKEN").ok(),
            std::env::var_os("GOOGLE_APPLICATION_CREDENTIALS").map(PathBuf::from),
        )
    }

    /// A non-empty access token wins over a key file.
    fn from_sources(token: Option<String>, key_path: Option<PathBuf>) -> Result<Self, UploadError> {
        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            return Ok(Credentials::AccessToken(token));
        }
        match key_path.filter(|p| !p.as_os_str().is_empty()) {
            Some(path) => Self::from_key_file(&path),
            None => Err(UploadError::Credentials(
                "set GOOGLE_APPLICATION_CREDENTIALS or GOOGLE_OAUTH_ACCESS_TOKEN".to_string(),
            )),
        }
    }

    /// Load a `service_account` or `authorized_user` JSON credentials file.
    pub fn from_key_file(path: &Path) -> Result<Self, UploadError> {
        let text = std::fs::read_to_string(path).map_err(|source| UploadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let file: CredentialsFile = serde_json::from_str(&text).map_err(|e| {
            UploadError::Credentials(format!(
                "{}: expected a service_account or authorized_user file: {e}",
                path.display()
            ))
        })?;
        Ok(match file {
            CredentialsFile::ServiceAccount(key) => Credentials::ServiceAccount(key),
            CredentialsFile::AuthorizedUser(user) => Credentials::AuthorizedUser(user),
        })
    }
}

#[derive(Debug, Serialize)]
struct TokenClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Uploads feeds to a Cloud Storage bucket.
#[derive(Debug, Clone)]
pub struct GcsUploader {
    client: reqwest::Client,
    credentials: Credentials,
    storage_base: String,
}

impl GcsUploader {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            client: reqwest::Client::new(),
            credentials,
            storage_base: DEFAULT_STORAGE_BASE.to_string(),
        }
    }

    /// Send requests to another Cloud Storage endpoint (emulators, tests).
    pub fn with_storage_base(mut self, base: impl Into<String>) -> Self {
        self.storage_base = base.into().trim_end_matches('/').to_string();
        self
    }

    /// Upload the file at `local_path` as `bucket/object_name`.
    #[instrument(level = "info", skip(self, local_path), fields(path = %local_path.display()))]
    pub async fn upload_file(
        &self,
        local_path: &Path,
        bucket: &str,
        object_name: &str,
    ) -> Result<(), UploadError> {
        let bytes = tokio::fs::read(local_path)
            .await
            .map_err(|source| UploadError::Io {
                path: local_path.display().to_string(),
                source,
            })?;
        self.upload(&bytes, bucket, object_name).await?;
        info!(
            destination = %format!("gs://{bucket}/{object_name}"),
            bytes = bytes.len(),
            "Feed uploaded"
        );
        Ok(())
    }

    /// Upload `bytes` as `bucket/object_name`, bounded by [`UPLOAD_TIMEOUT`].
    pub async fn upload(&self, bytes: &[u8], bucket: &str, object_name: &str) -> Result<(), UploadError> {
        timeout(UPLOAD_TIMEOUT, self.upload_unbounded(bytes, bucket, object_name))
            .await
            .map_err(|_| UploadError::Timeout(UPLOAD_TIMEOUT))?
    }

    async fn upload_unbounded(
        &self,
        bytes: &[u8],
        bucket: &str,
        object_name: &str,
    ) -> Result<(), UploadError> {
        let token = self.access_token().await?;
        let (boundary, body) = multipart_body(object_name, bytes);
        let url = format!(
            "{}/upload/storage/v1/b/{}/o?uploadType=multipart",
            self.storage_base,
            urlencoding::encode(bucket)
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        debug!(%url, status = status.as_u16(), "Upload accepted");
        Ok(())
    }

    async fn access_token(&self) -> Result<String, UploadError> {
        match &self.credentials {
            Credentials::AccessToken(token) => Ok(token.clone()),
            Credentials::ServiceAccount(key) => {
                let iat = Utc::now().timestamp();
                let claims = TokenClaims {
                    iss: &key.client_email,
                    scope: STORAGE_SCOPE,
                    aud: &key.token_uri,
                    iat,
                    exp: iat + 3600,
                };
                let assertion = jsonwebtoken::encode(
                    &Header::new(Algorithm::RS256),
                    &claims,
                    &EncodingKey::from_rsa_pem(key.private_key.as_bytes())?,
                )?;
                let token = self
                    .exchange_token(
                        &key.token_uri,
                        &[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())],
                    )
                    .await?;
                debug!(client_email = %key.client_email, "Obtained access token");
                Ok(token)
            }
            Credentials::AuthorizedUser(user) => {
                let token = self
                    .exchange_token(
                        &user.token_uri,
                        &[
                            ("grant_type", REFRESH_TOKEN_GRANT),
                            ("client_id", user.client_id.as_str()),
                            ("client_secret", user.client_secret.as_str()),
                            ("refresh_token", user.refresh_token.as_str()),
                        ],
                    )
                    .await?;
                debug!(client_id = %user.client_id, "Refreshed access token");
                Ok(token)
            }
        }
    }

    /// POST a token grant and return the minted access token.
    async fn exchange_token(&self, token_uri: &str, form: &[(&str, &str)]) -> Result<String, UploadError> {
        let response = self.client.post(token_uri).form(form).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::Token {
                status: status.as_u16(),
                body,
            });
        }
        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }
}

/// `multipart/related` body: JSON object metadata, then the feed itself.
///
/// Returns the boundary together with the body; the boundary never occurs
/// inside either part.
fn multipart_body(object_name: &str, bytes: &[u8]) -> (String, Vec<u8>) {
    let metadata = serde_json::json!({
        "name": object_name,
        "contentType": CONTENT_TYPE,
        "metadata": {
            "created-by": CREATED_BY,
            "date-run": Utc::now().to_rfc3339(),
        },
    })
    .to_string();
    let boundary = boundary_for(&[metadata.as_bytes(), bytes]);

    let mut body = Vec::with_capacity(bytes.len() + metadata.len() + 256);
    body.extend_from_slice(
        format!("--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(format!("--{boundary}\r\nContent-Type: {CONTENT_TYPE}\r\n\r\n").as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    (boundary, body)
}

/// First `MULTIPART_BOUNDARY_<n>` that appears in none of `parts`.
fn boundary_for(parts: &[&[u8]]) -> String {
    (0u32..)
        .map(|n| format!("{MULTIPART_BOUNDARY}_{n}"))
        .find(|candidate| {
            let needle = candidate.as_bytes();
            !parts
                .iter()
                .any(|part| part.windows(needle.len()).any(|window| window == needle))
        })
        .unwrap_or_else(|| MULTIPART_BOUNDARY.to_string())
}
