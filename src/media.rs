use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::fmt;
use tracing::debug;

/// Media-server upload seam. Mirrored image bytes go through here; the
/// returned id is what gets embedded into article blocks.
#[async_trait]
pub trait MediaService: Send + Sync {
    async fn upload(&self, filename: &str, mime_type: &str, bytes: Vec<u8>)
        -> Result<UploadedImage>;
}

/// Response from the media server for a completed upload.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImage {
    pub id: String,
    pub filename: String,
    pub mime_type: String,
    #[serde(default)]
    pub width: Option<i64>,
    #[serde(default)]
    pub height: Option<i64>,
}

#[derive(Clone)]
pub struct KarmaMediaClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl fmt::Debug for KarmaMediaClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KarmaMediaClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl KarmaMediaClient {
    pub fn new(server_url: &str, token: String) -> Result<Self> {
        let base_url = Url::parse(server_url).context("invalid media server URL")?;
        Ok(Self::with_base_url(base_url, token))
    }

    pub fn with_base_url(base_url: Url, token: String) -> Self {
        let http = Client::builder()
            .user_agent("woz-sync/0.1")
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url,
            token,
        }
    }

    pub fn build_upload_request(
        &self,
        filename: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<reqwest::Request> {
        let endpoint = self
            .base_url
            .join("upload")
            .context("invalid media server URL")?;
        self.http
            .post(endpoint)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Content-Type", mime_type)
            .header("X-Filename", filename)
            .body(bytes)
            .build()
            .context("failed to build media upload request")
    }
}

#[async_trait]
impl MediaService for KarmaMediaClient {
    async fn upload(
        &self,
        filename: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadedImage> {
        let size = bytes.len();
        let request = self.build_upload_request(filename, mime_type, bytes)?;
        debug!(url=%request.url(), filename, size, "uploading image to media server");
        let res = self
            .http
            .execute(request)
            .await
            .context("failed to reach media server")?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("media server error {}: {}", status, body));
        }

        res.json().await.context("invalid media server response")
    }
}
