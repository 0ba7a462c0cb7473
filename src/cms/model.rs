use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key/value property attached to an article row. `wozID` (private) carries
/// the remote identity used for dedup, `wozLink` (public) the remote
/// permalink.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Property {
    pub key: String,
    pub value: String,
    pub public: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AuthorInput {
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub id: String,
    pub filename: String,
    pub title: String,
    pub mime_type: String,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ImageInput {
    pub filename: String,
    pub title: String,
    pub mime_type: String,
    pub width: Option<i64>,
    pub height: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub pre_title: String,
    pub lead: String,
    pub breaking: bool,
    pub shared: bool,
    pub image_id: Option<String>,
    pub blocks: Vec<Value>,
    pub author_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Everything needed to create or replace an article row.
#[derive(Debug, Clone)]
pub struct ArticleInput {
    pub title: String,
    pub slug: String,
    pub pre_title: String,
    pub lead: String,
    pub breaking: bool,
    pub shared: bool,
    pub image_id: Option<String>,
    pub blocks: Vec<Value>,
    pub author_ids: Vec<String>,
    pub properties: Vec<Property>,
}

/// Minimal projection returned by the wozID diff lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleRef {
    pub id: String,
    pub modified_at: DateTime<Utc>,
}

/// Listing row for the inspect binary.
#[derive(Debug, Clone)]
pub struct ArticleSummary {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub modified_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub woz_id: Option<String>,
}
