//! CMS store: entity models and SQL repositories.
//!
//! This module is split into two submodules:
//! - `model`: typed records stored for articles, authors and images.
//! - `repo`: SQL-only functions that map rows into records.
//!
//! Callers import from `woz_sync::cms` — the repository API and the models
//! are re-exported here.

pub mod model;
pub mod repo;

pub use model::{
    Article, ArticleInput, ArticleRef, ArticleSummary, Author, AuthorInput, Image, ImageInput,
    Property,
};
pub use repo::*;
