use std::str::FromStr;

use catalog::{Level, Levelgen, UploadReport};
use chrono::{DateTime, Utc};
use sea_orm::FromQueryResult;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::utils::filename::validate_levelgen_filename;

pub use super::shared::{Pagination, escape_like};
use super::shared::{double_option, validate_name};

/// Default page size for level listings.
pub const DEFAULT_PER_PAGE: u64 = 25;

/// Generator script sent alongside a level.
#[derive(Debug, Deserialize, PartialEq, utoipa::ToSchema)]
pub struct LevelgenPayload {
    /// Stored filename, shown on the first line of the raw script.
    #[schema(example = "spawner.levelgen")]
    pub filename: String,
    /// Script source. Must not be empty.
    #[schema(example = "levelgen.addItem(1, 2)")]
    pub source: String,
}

impl LevelgenPayload {
    fn validate(&self, extension: &str) -> Result<(), AppError> {
        validate_levelgen_filename(&self.filename, extension)
            .map_err(|e| AppError::Validation(e.message().into()))?;
        if self.source.is_empty() {
            return Err(AppError::Validation(
                "Levelgen source must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn into_levelgen(self) -> Levelgen {
        Levelgen {
            filename: self.filename.trim().to_string(),
            source: self.source,
        }
    }
}

/// Request body for adding a level.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateLevelRequest {
    /// Display name (1-256 characters).
    #[schema(example = "Twin Towers")]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Raw level file.
    pub content: String,
    pub levelgen: Option<LevelgenPayload>,
}

pub fn validate_create_level(payload: &CreateLevelRequest, extension: &str) -> Result<(), AppError> {
    validate_name(&payload.name)?;
    if payload.content.is_empty() {
        return Err(AppError::Validation("Content must not be empty".into()));
    }
    if let Some(ref levelgen) = payload.levelgen {
        levelgen.validate(extension)?;
    }
    Ok(())
}

/// Request body for editing a level. Absent fields are left unchanged.
#[derive(Deserialize, Default, PartialEq, utoipa::ToSchema)]
pub struct UpdateLevelRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    /// `null` removes the generator script.
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<LevelgenPayload>)]
    pub levelgen: Option<Option<LevelgenPayload>>,
}

pub fn validate_update_level(payload: &UpdateLevelRequest, extension: &str) -> Result<(), AppError> {
    if let Some(ref name) = payload.name {
        validate_name(name)?;
    }
    if let Some(ref content) = payload.content
        && content.is_empty()
    {
        return Err(AppError::Validation("Content must not be empty".into()));
    }
    if let Some(Some(ref levelgen)) = payload.levelgen {
        levelgen.validate(extension)?;
    }
    Ok(())
}

impl UpdateLevelRequest {
    /// Whether the edit touches the level file or its script, which is what
    /// `last_updated` tracks.
    pub fn changes_content(&self) -> bool {
        self.name.is_some() || self.content.is_some() || self.levelgen.is_some()
    }
}

/// Request body for uploading a single level file.
///
/// The level name and an optional `LevelDatabaseId` are read from the
/// file's header.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct UploadLevelRequest {
    #[schema(example = "LevelName Twin Towers\nLevelDatabaseId 12\n")]
    pub content: String,
    pub levelgen: Option<LevelgenPayload>,
}

pub fn validate_upload_level(payload: &UploadLevelRequest, extension: &str) -> Result<(), AppError> {
    if let Some(ref levelgen) = payload.levelgen {
        levelgen.validate(extension)?;
    }
    Ok(())
}

/// Full level details.
#[derive(Serialize, utoipa::ToSchema)]
pub struct LevelResponse {
    #[schema(example = 1)]
    pub id: i32,
    pub name: String,
    pub description: String,
    pub content: String,
    pub levelgen: Option<Levelgen>,
    pub author: String,
    pub owner_id: Option<i32>,
    /// Sum of every user's rating.
    pub rating: i64,
    pub downloads: u64,
    pub last_updated: DateTime<Utc>,
}

impl From<Level> for LevelResponse {
    fn from(level: Level) -> Self {
        Self {
            id: level.id,
            name: level.name,
            description: level.description,
            content: level.content,
            levelgen: level.levelgen,
            author: level.author,
            owner_id: level.owner_id,
            rating: level.rating,
            downloads: level.downloads,
            last_updated: level.last_updated,
        }
    }
}

/// A level as seen by the caller.
#[derive(Serialize, utoipa::ToSchema)]
pub struct LevelViewResponse {
    pub level: LevelResponse,
    /// The caller's own rating, absent for anonymous callers or when unrated.
    pub user_rating: Option<i32>,
    pub is_owner: bool,
}

/// Level summary for list views. Content fields are omitted.
#[derive(Serialize, FromQueryResult, utoipa::ToSchema)]
pub struct LevelListItem {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub author: String,
    pub owner_id: Option<i32>,
    pub rating: i64,
    pub downloads: i64,
    /// Empty when the level has no generator script.
    pub levelgen_filename: String,
    pub last_updated: DateTime<Utc>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct LevelListResponse {
    pub data: Vec<LevelListItem>,
    pub pagination: Pagination,
}

/// Query parameters for listing levels.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct LevelListQuery {
    /// Page number (1-indexed).
    #[param(example = 1)]
    pub page: Option<u64>,
    /// Items per page (1-100, default 25).
    #[param(example = 25)]
    pub per_page: Option<u64>,
    /// Case-insensitive substring match on the level name.
    pub search: Option<String>,
}

/// Which stored file `GET /{id}/raw/{kind}` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawKind {
    Content,
    Levelgen,
}

impl FromStr for RawKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "content" => Ok(Self::Content),
            "levelgen" => Ok(Self::Levelgen),
            other => Err(AppError::Validation(format!(
                "Unknown raw kind '{other}': expected 'content' or 'levelgen'"
            ))),
        }
    }
}

/// Body of a raw generator script download: the filename as a Lua comment,
/// then the source.
pub fn raw_levelgen(levelgen: Option<&Levelgen>) -> String {
    match levelgen {
        Some(l) if !l.filename.is_empty() => format!("-- {}\r\n{}", l.filename, l.source),
        Some(l) => l.source.clone(),
        None => String::new(),
    }
}

/// Response of an archive upload.
#[derive(Serialize, utoipa::ToSchema)]
pub struct MassUploadResponse {
    /// Levels created or updated.
    pub stored: usize,
    /// Level files that could not be stored.
    pub failed: usize,
    /// One row per level file, in archive order.
    pub reports: Vec<UploadReport>,
}

impl From<Vec<UploadReport>> for MassUploadResponse {
    fn from(reports: Vec<UploadReport>) -> Self {
        Self {
            stored: reports.iter().filter(|r| r.level_id.is_some()).count(),
            failed: reports.iter().filter(|r| !r.errors.is_empty()).count(),
            reports,
        }
    }
}
