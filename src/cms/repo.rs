use super::model::{
    Article, ArticleInput, ArticleRef, ArticleSummary, Author, AuthorInput, Image, ImageInput,
    Property,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, Sqlite, SqlitePool, Transaction};
use tracing::instrument;
use uuid::Uuid;

pub type Pool = SqlitePool;

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let pool = SqlitePool::connect(&normalized).await?;
    // Enable WAL and stricter durability.
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// For file-backed SQLite URLs, expand a leading `~/` and make sure the
/// parent directory exists. In-memory URLs and non-sqlite schemes pass
/// through untouched.
fn prepare_sqlite_url(url: &str) -> String {
    let Some(rest) = url.strip_prefix("sqlite:") else {
        return url.to_string();
    };
    if rest.starts_with(":memory") {
        return url.to_string();
    }

    let rest = rest.strip_prefix("//").unwrap_or(rest);
    let (path_part, query_part) = match rest.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (rest, None),
    };
    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = match path_part.strip_prefix("~/") {
        Some(tail) => match std::env::var("HOME") {
            Ok(home) => format!("{}/{}", home.trim_end_matches('/'), tail),
            Err(_) => path_part.to_string(),
        },
        None => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let mut rebuilt = format!("sqlite://{expanded_path}");
    if let Some(q) = query_part {
        rebuilt.push('?');
        rebuilt.push_str(q);
    }
    rebuilt
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Look up the article holding the given property, e.g. `wozID` = remote id.
/// Returns the minimal projection the diff needs.
#[instrument(skip_all)]
pub async fn find_article_by_property(
    pool: &Pool,
    key: &str,
    value: &str,
) -> Result<Option<ArticleRef>> {
    let row = sqlx::query(
        "SELECT a.id, a.modified_at FROM articles a \
         JOIN article_properties p ON p.article_id = a.id \
         WHERE p.key = ? AND p.value = ?",
    )
    .bind(key)
    .bind(value)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|row| ArticleRef {
        id: row.get("id"),
        modified_at: row.get("modified_at"),
    }))
}

#[instrument(skip_all)]
pub async fn get_author_by_slug(pool: &Pool, slug: &str) -> Result<Option<Author>> {
    let row = sqlx::query(
        "SELECT id, name, slug, created_at, modified_at FROM authors WHERE slug = ?",
    )
    .bind(slug)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(author_from_row))
}

#[instrument(skip_all)]
pub async fn create_author(pool: &Pool, input: AuthorInput) -> Result<Author> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO authors (id, name, slug, created_at, modified_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&input.name)
    .bind(&input.slug)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(Author {
        id,
        name: input.name,
        slug: input.slug,
        created_at: now,
        modified_at: now,
    })
}

/// Register an image row. The id comes from the media server so the stored
/// row and the uploaded binary share an identity.
#[instrument(skip_all)]
pub async fn create_image(pool: &Pool, id: &str, input: ImageInput) -> Result<Image> {
    let id = id.to_string();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO images (id, filename, title, mime_type, width, height, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&input.filename)
    .bind(&input.title)
    .bind(&input.mime_type)
    .bind(input.width)
    .bind(input.height)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(Image {
        id,
        filename: input.filename,
        title: input.title,
        mime_type: input.mime_type,
        width: input.width,
        height: input.height,
        created_at: now,
    })
}

#[instrument(skip_all)]
pub async fn create_article(pool: &Pool, input: ArticleInput) -> Result<Article> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();
    let blocks_json = serde_json::to_string(&input.blocks)?;
    let author_ids_json = serde_json::to_string(&input.author_ids)?;

    let mut tx = pool.begin().await?;
    sqlx::query(
        "INSERT INTO articles \
         (id, title, slug, pre_title, lead, breaking, shared, image_id, blocks, author_ids, created_at, modified_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&input.title)
    .bind(&input.slug)
    .bind(&input.pre_title)
    .bind(&input.lead)
    .bind(input.breaking)
    .bind(input.shared)
    .bind(&input.image_id)
    .bind(&blocks_json)
    .bind(&author_ids_json)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;
    insert_properties_tx(&mut tx, &id, &input.properties).await?;
    tx.commit().await?;

    Ok(Article {
        id,
        title: input.title,
        slug: input.slug,
        pre_title: input.pre_title,
        lead: input.lead,
        breaking: input.breaking,
        shared: input.shared,
        image_id: input.image_id,
        blocks: input.blocks,
        author_ids: input.author_ids,
        created_at: now,
        modified_at: now,
        published_at: None,
    })
}

/// Replace an existing article's fields and properties, bumping
/// `modified_at`. Returns `None` when no row carries the id.
#[instrument(skip_all)]
pub async fn update_article(pool: &Pool, id: &str, input: ArticleInput) -> Result<Option<Article>> {
    let now = Utc::now();
    let blocks_json = serde_json::to_string(&input.blocks)?;
    let author_ids_json = serde_json::to_string(&input.author_ids)?;

    let mut tx = pool.begin().await?;
    let result = sqlx::query(
        "UPDATE articles SET title = ?, slug = ?, pre_title = ?, lead = ?, breaking = ?, \
         shared = ?, image_id = ?, blocks = ?, author_ids = ?, modified_at = ? WHERE id = ?",
    )
    .bind(&input.title)
    .bind(&input.slug)
    .bind(&input.pre_title)
    .bind(&input.lead)
    .bind(input.breaking)
    .bind(input.shared)
    .bind(&input.image_id)
    .bind(&blocks_json)
    .bind(&author_ids_json)
    .bind(now)
    .bind(id)
    .execute(&mut *tx)
    .await?;
    if result.rows_affected() == 0 {
        return Ok(None);
    }

    sqlx::query("DELETE FROM article_properties WHERE article_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    insert_properties_tx(&mut tx, id, &input.properties).await?;

    let row = sqlx::query("SELECT created_at, published_at FROM articles WHERE id = ?")
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(Some(Article {
        id: id.to_string(),
        title: input.title,
        slug: input.slug,
        pre_title: input.pre_title,
        lead: input.lead,
        breaking: input.breaking,
        shared: input.shared,
        image_id: input.image_id,
        blocks: input.blocks,
        author_ids: input.author_ids,
        created_at: row.get("created_at"),
        modified_at: now,
        published_at: row.get("published_at"),
    }))
}

#[instrument(skip_all)]
pub async fn publish_article(pool: &Pool, id: &str, published_at: DateTime<Utc>) -> Result<()> {
    let result = sqlx::query("UPDATE articles SET published_at = ? WHERE id = ?")
        .bind(published_at)
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        anyhow::bail!("cannot publish unknown article {id}");
    }
    Ok(())
}

#[instrument(skip_all)]
pub async fn get_article(pool: &Pool, id: &str) -> Result<Option<Article>> {
    let row = sqlx::query(
        "SELECT id, title, slug, pre_title, lead, breaking, shared, image_id, blocks, \
         author_ids, created_at, modified_at, published_at FROM articles WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    row.map(article_from_row).transpose()
}

#[instrument(skip_all)]
pub async fn get_article_properties(pool: &Pool, article_id: &str) -> Result<Vec<Property>> {
    let rows = sqlx::query(
        "SELECT key, value, public FROM article_properties WHERE article_id = ? ORDER BY key",
    )
    .bind(article_id)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|row| Property {
            key: row.get("key"),
            value: row.get("value"),
            public: row.get("public"),
        })
        .collect())
}

/// Article overview with the wozID property joined in, newest first.
#[instrument(skip_all)]
pub async fn list_articles(pool: &Pool) -> Result<Vec<ArticleSummary>> {
    let rows = sqlx::query(
        "SELECT a.id, a.slug, a.title, a.modified_at, a.published_at, p.value AS woz_id \
         FROM articles a \
         LEFT JOIN article_properties p ON p.article_id = a.id AND p.key = 'wozID' \
         ORDER BY a.modified_at DESC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|row| ArticleSummary {
            id: row.get("id"),
            slug: row.get("slug"),
            title: row.get("title"),
            modified_at: row.get("modified_at"),
            published_at: row.get("published_at"),
            woz_id: row.get("woz_id"),
        })
        .collect())
}

async fn insert_properties_tx(
    tx: &mut Transaction<'_, Sqlite>,
    article_id: &str,
    properties: &[Property],
) -> Result<()> {
    for property in properties {
        sqlx::query(
            "INSERT INTO article_properties (article_id, key, value, public) VALUES (?, ?, ?, ?)",
        )
        .bind(article_id)
        .bind(&property.key)
        .bind(&property.value)
        .bind(property.public)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

fn author_from_row(row: SqliteRow) -> Author {
    Author {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        created_at: row.get("created_at"),
        modified_at: row.get("modified_at"),
    }
}

fn article_from_row(row: SqliteRow) -> Result<Article> {
    let blocks: String = row.get("blocks");
    let author_ids: String = row.get("author_ids");
    Ok(Article {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        pre_title: row.get("pre_title"),
        lead: row.get("lead"),
        breaking: row.get("breaking"),
        shared: row.get("shared"),
        image_id: row.get("image_id"),
        blocks: serde_json::from_str(&blocks).context("corrupt blocks column")?,
        author_ids: serde_json::from_str(&author_ids).context("corrupt author_ids column")?,
        created_at: row.get("created_at"),
        modified_at: row.get("modified_at"),
        published_at: row.get("published_at"),
    })
}
