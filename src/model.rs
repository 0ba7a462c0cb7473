use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cms::ArticleRef;

/// Lightweight list entry from the remote article feed. A full article is
/// fetched separately through `teaser.url`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SourceTeaser {
    pub id: String,
    pub url: String,
    pub title: String,
    pub published_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Author record embedded in a remote article.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SourceAuthor {
    pub id: String,
    pub name: String,
    pub slug: String,
}

/// Image record embedded in a remote article or block.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SourceImage {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub width: Option<i64>,
    #[serde(default)]
    pub height: Option<i64>,
    pub mime_type: String,
}

/// Full remote article record. Blocks stay as raw JSON values; only the
/// image-bearing block kinds are rewritten during sync, everything else
/// passes through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceArticle {
    pub id: String,
    #[serde(default)]
    pub shared: bool,
    pub published_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub pre_title: String,
    pub title: String,
    #[serde(default)]
    pub lead: String,
    pub slug: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub author_records: Vec<SourceAuthor>,
    #[serde(default)]
    pub breaking: bool,
    #[serde(default)]
    pub blocks: Vec<Value>,
    #[serde(default)]
    pub image_record: Option<SourceImage>,
    pub permalink: String,
}

/// A teaser paired with its diff result against the CMS store. `existing`
/// holds the local row matched through the teaser's `wozID` property.
#[derive(Debug, Clone)]
pub struct PendingArticle {
    pub teaser: SourceTeaser,
    pub existing: Option<ArticleRef>,
}

impl PendingArticle {
    /// An article is synced when it is unknown locally, when the remote copy
    /// is newer than the stored one, or when the force flag is set.
    pub fn needs_update(&self, force: bool) -> bool {
        match &self.existing {
            None => true,
            Some(existing) => force || self.teaser.updated_at > existing.modified_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn teaser(updated_at: DateTime<Utc>) -> SourceTeaser {
        SourceTeaser {
            id: "ter-1".into(),
            url: "https://example.com/articles/1".into(),
            title: "Ein Artikel".into(),
            published_at: Utc.with_ymd_and_hms(2021, 3, 1, 8, 0, 0).unwrap(),
            updated_at,
        }
    }

    #[test]
    fn unknown_article_needs_update() {
        let pending = PendingArticle {
            teaser: teaser(Utc.with_ymd_and_hms(2021, 3, 1, 8, 0, 0).unwrap()),
            existing: None,
        };
        assert!(pending.needs_update(false));
    }

    #[test]
    fn stale_remote_is_skipped_unless_forced() {
        let stored = Utc.with_ymd_and_hms(2021, 3, 2, 8, 0, 0).unwrap();
        let pending = PendingArticle {
            teaser: teaser(Utc.with_ymd_and_hms(2021, 3, 1, 8, 0, 0).unwrap()),
            existing: Some(ArticleRef {
                id: "art-1".into(),
                modified_at: stored,
            }),
        };
        assert!(!pending.needs_update(false));
        assert!(pending.needs_update(true));
    }

    #[test]
    fn newer_remote_needs_update() {
        let stored = Utc.with_ymd_and_hms(2021, 3, 1, 8, 0, 0).unwrap();
        let pending = PendingArticle {
            teaser: teaser(Utc.with_ymd_and_hms(2021, 3, 2, 8, 0, 0).unwrap()),
            existing: Some(ArticleRef {
                id: "art-1".into(),
                modified_at: stored,
            }),
        };
        assert!(pending.needs_update(false));
    }

    #[test]
    fn equal_timestamps_are_skipped() {
        let at = Utc.with_ymd_and_hms(2021, 3, 1, 8, 0, 0).unwrap();
        let pending = PendingArticle {
            teaser: teaser(at),
            existing: Some(ArticleRef {
                id: "art-1".into(),
                modified_at: at,
            }),
        };
        assert!(!pending.needs_update(false));
    }

    #[test]
    fn article_wire_format_decodes() {
        let raw = serde_json::json!({
            "id": "woz-77",
            "shared": true,
            "publishedAt": "2021-03-01T08:00:00Z",
            "updatedAt": "2021-03-02T08:00:00Z",
            "preTitle": "Kommentar",
            "title": "Ein Artikel",
            "lead": "Worum es geht.",
            "slug": "ein-artikel",
            "tags": ["politik"],
            "authorRecords": [
                {"id": "a-1", "name": "A. Author", "slug": "a-author"}
            ],
            "breaking": false,
            "blocks": [{"type": "richText", "richText": []}],
            "imageRecord": {
                "id": "img-1",
                "url": "https://example.com/img-1.jpg",
                "width": 1200,
                "height": 800,
                "mimeType": "image/jpeg"
            },
            "permalink": "https://www.woz.ch/ein-artikel"
        });
        let article: SourceArticle = serde_json::from_value(raw).unwrap();
        assert_eq!(article.author_records[0].slug, "a-author");
        assert_eq!(article.image_record.as_ref().unwrap().mime_type, "image/jpeg");
        assert_eq!(article.blocks.len(), 1);
    }
}
