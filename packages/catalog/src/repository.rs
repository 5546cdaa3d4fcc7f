//! Records and the storage contracts the core writes through.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RepoError;

/// Companion generator script attached to a level.
///
/// Existence of this value is what ties `levelgen` and `levelgen_filename`
/// together: a level either has both, or neither.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Levelgen {
    /// File name the script was uploaded under, e.g. `spawner.levelgen`.
    pub filename: String,
    /// Script source.
    pub source: String,
}

impl Levelgen {
    /// Rebuild from the two flat storage columns. An empty source means no script.
    pub fn from_columns(filename: String, source: String) -> Option<Self> {
        if source.is_empty() {
            None
        } else {
            Some(Self { filename, source })
        }
    }

    /// Split into `(filename, source)` storage columns, empty when absent.
    pub fn into_columns(levelgen: Option<Self>) -> (String, String) {
        match levelgen {
            Some(l) => (l.filename, l.source),
            None => (String::new(), String::new()),
        }
    }
}

/// A published level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Level {
    pub id: i32,
    pub name: String,
    pub description: String,
    /// Raw level file, header lines included.
    pub content: String,
    pub levelgen: Option<Levelgen>,
    /// Display name, independent from the owning user.
    pub author: String,
    /// `None` for legacy or anonymous uploads.
    pub owner_id: Option<i32>,
    /// Sum of every user's rating value.
    pub rating: i64,
    pub downloads: u64,
    /// Last content edit. Ratings and downloads never touch it.
    pub last_updated: DateTime<Utc>,
}

/// Fields replaced when a level's content is edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelContent {
    pub name: String,
    pub content: String,
    pub levelgen: Option<Levelgen>,
}

/// A level about to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLevel {
    pub name: String,
    pub description: String,
    pub content: String,
    pub levelgen: Option<Levelgen>,
    pub author: String,
    pub owner_id: Option<i32>,
}

impl NewLevel {
    /// A new level built from uploaded content and attributed to `owner`.
    pub fn from_content(content: LevelContent, owner: &Uploader) -> Self {
        Self {
            name: content.name,
            description: String::new(),
            content: content.content,
            levelgen: content.levelgen,
            author: owner.display_name.clone(),
            owner_id: Some(owner.user_id),
        }
    }
}

/// One user's rating of one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rating {
    pub user_id: i32,
    pub level_id: i32,
    pub value: i32,
}

/// Identity of whoever is uploading, supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uploader {
    pub user_id: i32,
    pub display_name: String,
}

/// Storage of level records.
#[async_trait]
pub trait LevelRepository: Send + Sync {
    async fn find_by_id(&self, id: i32) -> Result<Option<Level>, RepoError>;

    /// Insert a level and return its id.
    async fn create(&self, level: NewLevel) -> Result<i32, RepoError>;

    /// Replace the content fields of an existing level and bump `last_updated`.
    ///
    /// Ownership, author, rating and download fields are left alone.
    async fn update(&self, id: i32, fields: LevelContent) -> Result<(), RepoError>;

    /// Add `delta` to the cached aggregate rating.
    ///
    /// Implementations must apply this as a single atomic per-row write and
    /// must not touch `last_updated`.
    async fn adjust_rating(&self, id: i32, delta: i64) -> Result<(), RepoError>;
}

/// Storage of per-user ratings, at most one per `(user, level)` pair.
#[async_trait]
pub trait RatingRepository: Send + Sync {
    async fn find(&self, user_id: i32, level_id: i32) -> Result<Option<Rating>, RepoError>;

    /// Create the rating or overwrite the existing one in place.
    async fn upsert(&self, user_id: i32, level_id: i32, value: i32) -> Result<(), RepoError>;

    /// Drop the rating if there is one. Removing a missing rating is not an error.
    async fn remove(&self, user_id: i32, level_id: i32) -> Result<(), RepoError>;
}
