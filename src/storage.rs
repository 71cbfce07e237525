use anyhow::{Result, anyhow};
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Upper bound on a single signing request. There are no retries.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Failures while asking the storage provider for a signed URL.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Storage returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Storage response did not contain a signed URL")]
    MissingUrl,
}

/// Where the protected artifact lives and how long links stay valid.
#[derive(Clone)]
pub struct StorageConfig {
    pub base_url: String,
    pub service_key: String,
    pub bucket: String,
    pub object: String,
    pub link_expiry: Duration,
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("base_url", &self.base_url)
            .field("bucket", &self.bucket)
            .field("object", &self.object)
            .field("link_expiry", &self.link_expiry)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignRequest {
    expires_in: u64,
}

#[derive(Deserialize)]
struct SignResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

/// Client for the object storage signing endpoint (Supabase Storage API).
#[derive(Clone, Debug)]
pub struct StorageClient {
    client: Client,
    sign_url: Url,
    public_prefix: String,
    config: StorageConfig,
}

impl StorageClient {
    pub fn new(config: StorageConfig) -> Result<Self> {
        let base_url = config.base_url.trim_end_matches('/');
        info!(
            base_url,
            bucket = %config.bucket,
            object = %config.object,
            "Building storage client"
        );

        let mut sign_url = Url::parse(base_url)?;
        sign_url
            .path_segments_mut()
            .map_err(|_| anyhow!("Storage URL cannot be a base: {base_url}"))?
            .pop_if_empty()
            .extend(["storage", "v1", "object", "sign", config.bucket.as_str()])
            .extend(config.object.split('/').filter(|s| !s.is_empty()));

        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            sign_url,
            public_prefix: format!("{base_url}/storage/v1"),
            config,
        })
    }

    pub fn link_expiry(&self) -> Duration {
        self.config.link_expiry
    }

    /// Request a time-limited download URL for the artifact.
    ///
    /// Any non-success status, transport error, timeout or unexpected body is
    /// an error. Callers must not fall back to an unsigned URL.
    pub async fn signed_download_url(&self) -> Result<String, StorageError> {
        let expires_in = self.config.link_expiry.as_secs();
        debug!(url = %self.sign_url, expires_in, "Requesting signed URL");

        let response = self
            .client
            .post(self.sign_url.clone())
            .bearer_auth(&self.config.service_key)
            .json(&SignRequest { expires_in })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Status { status, body });
        }

        let SignResponse { signed_url } = response.json().await?;
        if signed_url.is_empty() {
            return Err(StorageError::MissingUrl);
        }

        Ok(format!("{}{signed_url}", self.public_prefix))
    }
}
