pub mod archive;
pub mod config;
pub mod error;
pub mod header;
pub mod ingest;
pub mod memory;
pub mod rating;
pub mod repository;

pub use config::IngestConfig;
pub use error::{ArchiveError, HeaderError, RatingError, RepoError, UploadError};
pub use ingest::{StoredLevel, UploadReport, ingest, ingest_archive, upload_level};
pub use rating::{RatingExpr, RatingOutcome, rate};
pub use repository::{
    Level, LevelContent, LevelRepository, Levelgen, NewLevel, Rating, RatingRepository, Uploader,
};
