use thiserror::Error;

/// Batch-fatal failures raised while walking an uploaded archive.
///
/// Any of these aborts the whole ingestion call before a single report row
/// is produced or a single level is written.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Invalid ZIP archive: {0}")]
    Unreadable(String),

    #[error("File '{path}' exceeds maximum decompressed size of {limit} bytes")]
    FileTooLarge { path: String, limit: u64 },

    #[error("Total decompressed archive content exceeds {limit} bytes")]
    TotalTooLarge { limit: u64 },
}

/// Failures extracting the header fields of a level file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    #[error("level file has no LevelName line")]
    MissingName,

    #[error("LevelDatabaseId '{0}' is not an integer")]
    InvalidDatabaseId(String),
}

/// Errors reported by level and rating repositories.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepoError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Rejections from the rating aggregator.
///
/// Both variants are request-validation failures: the caller asked for
/// something that could not be applied, and nothing was partially written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RatingError {
    #[error("Level {0} not found")]
    LevelNotFound(i32),

    #[error("Could not set rating: {0}")]
    Persistence(String),
}

/// Failures of the single-level upload path.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    Header(#[from] HeaderError),

    #[error("Level content is not valid UTF-8")]
    InvalidEncoding,

    #[error("Failed to save level: {0}")]
    Persistence(#[from] RepoError),
}
