use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use std::fmt;
use tracing::debug;

use crate::model::{SourceArticle, SourceTeaser};

/// Remote article source: paginated teaser listing, per-article detail
/// records, and raw image downloads.
#[async_trait]
pub trait SourceService: Send + Sync {
    /// Fetch one page of teasers. `Ok(None)` signals the end of pagination
    /// (the feed answers 404 past the last page); any other failure is an
    /// error the caller reports.
    async fn list_page(&self, offset: u32, limit: u32) -> Result<Option<Vec<SourceTeaser>>>;

    async fn fetch_article(&self, url: &str) -> Result<SourceArticle>;

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>>;
}

#[derive(Clone)]
pub struct WozClient {
    http: Client,
    base_url: Url,
}

impl fmt::Debug for WozClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WozClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl WozClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url).context("invalid source base URL")?;
        Ok(Self::with_base_url(base_url))
    }

    pub fn with_base_url(base_url: Url) -> Self {
        let http = Client::builder()
            .user_agent("woz-sync/0.1")
            .build()
            .expect("reqwest client");
        Self { http, base_url }
    }

    /// List URL for a page of teasers, e.g. `{base}?offset=10&limit=10`.
    pub fn list_url(&self, offset: u32, limit: u32) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("offset", &offset.to_string())
            .append_pair("limit", &limit.to_string());
        url
    }
}

#[async_trait]
impl SourceService for WozClient {
    async fn list_page(&self, offset: u32, limit: u32) -> Result<Option<Vec<SourceTeaser>>> {
        let url = self.list_url(offset, limit);
        debug!(url=%url, "fetching teaser page");
        let res = self
            .http
            .get(url)
            .header("Content-Type", "application/json")
            .send()
            .await
            .context("failed to reach article source")?;

        match res.status() {
            StatusCode::OK => {
                let teasers = res.json().await.context("invalid teaser page")?;
                Ok(Some(teasers))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => {
                let body = res.text().await.unwrap_or_default();
                Err(anyhow!("source list error {}: {}", status, body))
            }
        }
    }

    async fn fetch_article(&self, url: &str) -> Result<SourceArticle> {
        debug!(url, "fetching article detail");
        let res = self
            .http
            .get(url)
            .header("Content-Type", "application/json")
            .send()
            .await
            .context("failed to reach article source")?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("article fetch error {}: {}", status, body));
        }
        res.json().await.context("invalid article record")
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        debug!(url, "downloading image");
        let res = self
            .http
            .get(url)
            .send()
            .await
            .context("failed to reach image host")?;

        if !res.status().is_success() {
            return Err(anyhow!("image download error {}", res.status()));
        }
        let bytes = res.bytes().await.context("failed to read image body")?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_url_appends_pagination_query() {
        let client = WozClient::new("https://www.woz.ch/wepub/1.0/articles").unwrap();
        let url = client.list_url(20, 10);
        assert_eq!(url.path(), "/wepub/1.0/articles");
        assert_eq!(url.query(), Some("offset=20&limit=10"));
    }

    #[test]
    fn new_rejects_garbage_url() {
        assert!(WozClient::new("not a url").is_err());
    }

    #[test]
    fn teaser_page_decodes() {
        let raw = r#"[
            {
                "id": "woz-1",
                "url": "https://www.woz.ch/wepub/1.0/articles/woz-1",
                "title": "Erster",
                "publishedAt": "2021-03-01T08:00:00Z",
                "updatedAt": "2021-03-01T09:30:00Z"
            }
        ]"#;
        let teasers: Vec<SourceTeaser> = serde_json::from_str(raw).unwrap();
        assert_eq!(teasers.len(), 1);
        assert_eq!(teasers[0].id, "woz-1");
    }
}
