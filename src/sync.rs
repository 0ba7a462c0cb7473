//! The sync job: paginated teaser diff, per-article fetch, author and image
//! resolution, block transformation, upsert + publish.

use anyhow::{Context, Result};
use chrono::Utc;
use futures::future::try_join_all;
use serde_json::{json, Value};
use tracing::{error, info, instrument};

use crate::cms::{self, ArticleInput, AuthorInput, ImageInput, Pool, Property};
use crate::media::MediaService;
use crate::model::{PendingArticle, SourceImage};
use crate::report::ErrorSink;
use crate::source::SourceService;

/// Private property carrying the remote article id, used for dedup.
pub const WOZ_ID_KEY: &str = "wozID";
/// Public property carrying the remote permalink.
pub const WOZ_LINK_KEY: &str = "wozLink";

/// Counters for one completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub listed: usize,
    pub synced: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Page through the list endpoint and diff every teaser against the store.
///
/// A 404 past the last page ends the loop silently. Any other listing or
/// lookup failure is captured to the sink and ends the loop, keeping the
/// teasers collected so far.
#[instrument(skip_all)]
pub async fn collect_pending(
    pool: &Pool,
    source: &dyn SourceService,
    page_limit: u32,
    sink: &dyn ErrorSink,
) -> Vec<PendingArticle> {
    let mut pending = Vec::new();
    let mut offset = 0u32;
    loop {
        match collect_page(pool, source, offset, page_limit).await {
            Ok(Some(page)) if !page.is_empty() => {
                pending.extend(page);
                offset += page_limit;
            }
            Ok(_) => break,
            Err(err) => {
                sink.capture(&err);
                break;
            }
        }
    }
    pending
}

async fn collect_page(
    pool: &Pool,
    source: &dyn SourceService,
    offset: u32,
    limit: u32,
) -> Result<Option<Vec<PendingArticle>>> {
    let Some(teasers) = source.list_page(offset, limit).await? else {
        return Ok(None);
    };
    let lookups = teasers
        .iter()
        .map(|teaser| cms::find_article_by_property(pool, WOZ_ID_KEY, &teaser.id));
    let existing = try_join_all(lookups).await?;
    Ok(Some(
        teasers
            .into_iter()
            .zip(existing)
            .map(|(teaser, existing)| PendingArticle { teaser, existing })
            .collect(),
    ))
}

/// Download the remote image and re-upload it through the media service, then
/// register the result as a CMS image row. Returns the local image id.
pub async fn mirror_image(
    pool: &Pool,
    source: &dyn SourceService,
    media: &dyn MediaService,
    title: &str,
    image: &SourceImage,
) -> Result<String> {
    let bytes = source.fetch_bytes(&image.url).await?;
    let uploaded = media.upload(&image.id, &image.mime_type, bytes).await?;
    let stored = cms::create_image(
        pool,
        &uploaded.id,
        ImageInput {
            filename: uploaded.filename,
            title: title.to_string(),
            mime_type: uploaded.mime_type,
            width: uploaded.width.or(image.width),
            height: uploaded.height.or(image.height),
        },
    )
    .await?;
    Ok(stored.id)
}

/// Rewrite image-bearing blocks to point at mirrored images. `image` blocks
/// keep their caption and gain the local `imageID`; `imageGallery` blocks
/// mirror every gallery entry; everything else passes through untouched.
pub async fn transform_blocks(
    pool: &Pool,
    source: &dyn SourceService,
    media: &dyn MediaService,
    article_title: &str,
    blocks: Vec<Value>,
) -> Result<Vec<Value>> {
    let mut out = Vec::with_capacity(blocks.len());
    for block in blocks {
        out.push(transform_block(pool, source, media, article_title, block).await?);
    }
    Ok(out)
}

async fn transform_block(
    pool: &Pool,
    source: &dyn SourceService,
    media: &dyn MediaService,
    article_title: &str,
    block: Value,
) -> Result<Value> {
    match block.get("type").and_then(Value::as_str) {
        Some("image") => {
            let record: SourceImage = serde_json::from_value(
                block
                    .get("imageRecord")
                    .cloned()
                    .context("image block without imageRecord")?,
            )?;
            let title = format!("{article_title} - image");
            let image_id = mirror_image(pool, source, media, &title, &record).await?;
            Ok(json!({
                "type": "image",
                "caption": block.get("caption").cloned().unwrap_or(Value::Null),
                "imageID": image_id,
            }))
        }
        Some("imageGallery") => {
            let records: Vec<SourceImage> = serde_json::from_value(
                block
                    .get("imageRecords")
                    .cloned()
                    .context("imageGallery block without imageRecords")?,
            )?;
            let entries = block
                .get("images")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            if entries.len() != records.len() {
                anyhow::bail!(
                    "gallery caption/record mismatch: {} images, {} records",
                    entries.len(),
                    records.len()
                );
            }

            let title = format!("{article_title} - imageGallery");
            let uploads = records
                .iter()
                .map(|record| mirror_image(pool, source, media, &title, record));
            let image_ids = try_join_all(uploads).await?;

            let images: Vec<Value> = entries
                .iter()
                .zip(image_ids)
                .map(|(entry, image_id)| {
                    json!({
                        "imageID": image_id,
                        "caption": entry.get("caption").cloned().unwrap_or(Value::Null),
                    })
                })
                .collect();
            Ok(json!({ "type": "imageGallery", "images": images }))
        }
        _ => Ok(block),
    }
}

/// Sync a single teaser: detail fetch, author resolution, image mirroring,
/// block transformation, create-or-update, publish.
#[instrument(skip_all, fields(id = %pending.teaser.id))]
pub async fn sync_article(
    pool: &Pool,
    source: &dyn SourceService,
    media: &dyn MediaService,
    pending: &PendingArticle,
) -> Result<()> {
    let article = source.fetch_article(&pending.teaser.url).await?;
    info!(title = %article.title, "fetched article");

    // Authors are created on first sighting and reused by slug afterwards.
    let mut author_ids = Vec::with_capacity(article.author_records.len());
    for author in &article.author_records {
        match cms::get_author_by_slug(pool, &author.slug).await? {
            Some(existing) => author_ids.push(existing.id),
            None => {
                let created = cms::create_author(
                    pool,
                    AuthorInput {
                        name: author.name.clone(),
                        slug: author.slug.clone(),
                    },
                )
                .await?;
                info!(name = %created.name, "created author");
                author_ids.push(created.id);
            }
        }
    }

    let image_id = match &article.image_record {
        Some(record) => {
            let title = format!("{} - Mood Image", article.title);
            Some(mirror_image(pool, source, media, &title, record).await?)
        }
        None => None,
    };

    let blocks = transform_blocks(pool, source, media, &article.title, article.blocks).await?;

    let input = ArticleInput {
        title: article.title,
        slug: article.slug,
        pre_title: article.pre_title,
        lead: article.lead,
        breaking: article.breaking,
        shared: true,
        image_id,
        blocks,
        author_ids,
        properties: vec![
            Property {
                key: WOZ_ID_KEY.into(),
                value: article.id,
                public: false,
            },
            Property {
                key: WOZ_LINK_KEY.into(),
                value: article.permalink,
                public: true,
            },
        ],
    };

    let upserted = match &pending.existing {
        None => cms::create_article(pool, input).await?,
        Some(existing) => cms::update_article(pool, &existing.id, input)
            .await?
            .with_context(|| format!("updating article {} failed", existing.id))?,
    };
    cms::publish_article(pool, &upserted.id, Utc::now()).await?;
    Ok(())
}

/// Run the whole job. Listing failures are captured to the sink; per-article
/// failures are logged and skipped so the batch always completes.
pub async fn run(
    pool: &Pool,
    source: &dyn SourceService,
    media: &dyn MediaService,
    page_limit: u32,
    force: bool,
    sink: &dyn ErrorSink,
) -> SyncReport {
    let pending = collect_pending(pool, source, page_limit, sink).await;
    let mut report = SyncReport {
        listed: pending.len(),
        ..Default::default()
    };

    for article in &pending {
        if !article.needs_update(force) {
            report.skipped += 1;
            continue;
        }
        match sync_article(pool, source, media, article).await {
            Ok(()) => report.synced += 1,
            Err(err) => {
                report.failed += 1;
                error!(?err, id = %article.teaser.id, "article sync failed");
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::UploadedImage;
    use crate::model::{SourceArticle, SourceTeaser};
    use anyhow::anyhow;
    use async_trait::async_trait;

    struct StubSource;

    #[async_trait]
    impl SourceService for StubSource {
        async fn list_page(&self, _: u32, _: u32) -> Result<Option<Vec<SourceTeaser>>> {
            Err(anyhow!("list_page not expected"))
        }

        async fn fetch_article(&self, _: &str) -> Result<SourceArticle> {
            Err(anyhow!("fetch_article not expected"))
        }

        async fn fetch_bytes(&self, _: &str) -> Result<Vec<u8>> {
            Ok(vec![0xFF, 0xD8])
        }
    }

    struct StubMedia;

    #[async_trait]
    impl MediaService for StubMedia {
        async fn upload(
            &self,
            filename: &str,
            mime_type: &str,
            _bytes: Vec<u8>,
        ) -> Result<UploadedImage> {
            Ok(UploadedImage {
                id: format!("media-{filename}"),
                filename: filename.to_string(),
                mime_type: mime_type.to_string(),
                width: Some(1200),
                height: Some(800),
            })
        }
    }

    async fn setup_pool() -> Pool {
        let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn unknown_blocks_pass_through() {
        let pool = setup_pool().await;
        let blocks = vec![
            json!({"type": "richText", "richText": [{"text": "hallo"}]}),
            json!({"type": "embed", "url": "https://example.com"}),
        ];
        let out = transform_blocks(&pool, &StubSource, &StubMedia, "Titel", blocks.clone())
            .await
            .unwrap();
        assert_eq!(out, blocks);
    }

    #[tokio::test]
    async fn image_block_gets_mirrored_id() {
        let pool = setup_pool().await;
        let blocks = vec![json!({
            "type": "image",
            "caption": "Legende",
            "imageRecord": {
                "id": "img-1",
                "url": "https://example.com/img-1.jpg",
                "mimeType": "image/jpeg"
            }
        })];
        let out = transform_blocks(&pool, &StubSource, &StubMedia, "Titel", blocks)
            .await
            .unwrap();
        assert_eq!(out[0]["type"], "image");
        assert_eq!(out[0]["caption"], "Legende");
        assert_eq!(out[0]["imageID"], "media-img-1");
        assert!(out[0].get("imageRecord").is_none());

        // The mirrored image is registered in the store with a title suffix.
        let image = sqlx::query_scalar::<_, String>("SELECT title FROM images WHERE id = ?")
            .bind("media-img-1")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(image, "Titel - image");
    }

    #[tokio::test]
    async fn gallery_block_pairs_captions_by_index() {
        let pool = setup_pool().await;
        let blocks = vec![json!({
            "type": "imageGallery",
            "images": [
                {"caption": "eins"},
                {"caption": "zwei"}
            ],
            "imageRecords": [
                {"id": "g-1", "url": "https://example.com/g-1.jpg", "mimeType": "image/jpeg"},
                {"id": "g-2", "url": "https://example.com/g-2.jpg", "mimeType": "image/png"}
            ]
        })];
        let out = transform_blocks(&pool, &StubSource, &StubMedia, "Titel", blocks)
            .await
            .unwrap();
        let images = out[0]["images"].as_array().unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0]["caption"], "eins");
        assert_eq!(images[0]["imageID"], "media-g-1");
        assert_eq!(images[1]["caption"], "zwei");
        assert_eq!(images[1]["imageID"], "media-g-2");
    }

    #[tokio::test]
    async fn gallery_mismatch_is_an_error() {
        let pool = setup_pool().await;
        let blocks = vec![json!({
            "type": "imageGallery",
            "images": [{"caption": "eins"}],
            "imageRecords": []
        })];
        let err = transform_blocks(&pool, &StubSource, &StubMedia, "Titel", blocks)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("mismatch"));
    }

    #[tokio::test]
    async fn image_block_without_record_is_an_error() {
        let pool = setup_pool().await;
        let blocks = vec![json!({"type": "image", "caption": "Legende"})];
        assert!(transform_blocks(&pool, &StubSource, &StubMedia, "Titel", blocks)
            .await
            .is_err());
    }
}
