//! Batch ingestion of level archives.
//!
//! Every `.level` entry gets its own report row. Per-entry problems are
//! recorded on that row and never stop the batch; only an unreadable archive
//! aborts, and it does so before anything is written.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::archive::{self, ArchiveEntry};
use crate::config::IngestConfig;
use crate::error::{ArchiveError, RepoError, UploadError};
use crate::header;
use crate::repository::{LevelContent, LevelRepository, Levelgen, NewLevel, Uploader};

pub const METADATA_WARNING: &str = "ignored platform metadata entry";
pub const PERSISTENCE_ERROR: &str = "failed to save level";

/// Result for one level file of an uploaded archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct UploadReport {
    /// Path of the level file inside the archive.
    pub path: String,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Id of the created or updated level, set only when it was stored.
    pub level_id: Option<i32>,
}

impl UploadReport {
    fn new(path: &str, outcome: EntryOutcome) -> Self {
        let mut report = Self {
            path: path.to_string(),
            errors: Vec::new(),
            warnings: Vec::new(),
            level_id: None,
        };
        match outcome {
            EntryOutcome::Stored(id) => report.level_id = Some(id),
            EntryOutcome::Failed(msg) => report.errors.push(msg),
            EntryOutcome::Skipped(msg) => report.warnings.push(msg),
        }
        report
    }

    /// Stored with no errors or warnings.
    pub fn is_success(&self) -> bool {
        self.level_id.is_some() && self.errors.is_empty() && self.warnings.is_empty()
    }
}

#[derive(Debug)]
enum EntryOutcome {
    Stored(i32),
    Failed(String),
    Skipped(String),
}

/// Result of storing a single level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct StoredLevel {
    pub level_id: i32,
    /// `false` when an existing level was updated in place.
    pub created: bool,
}

/// Generator scripts of an archive keyed by `(directory, stem)`.
struct ScriptIndex<'e> {
    scripts: HashMap<(&'e str, &'e str), &'e ArchiveEntry>,
}

impl<'e> ScriptIndex<'e> {
    fn build(entries: &'e [ArchiveEntry], config: &IngestConfig) -> Self {
        let mut scripts = HashMap::new();
        for entry in entries.iter().filter(|e| !e.is_dir()) {
            let Some((stem, ext)) = entry.split_extension() else {
                continue;
            };
            if ext != config.levelgen_extension || is_platform_metadata(entry, config) {
                continue;
            }
            scripts.entry((entry.directory_path(), stem)).or_insert(entry);
        }
        Self { scripts }
    }

    fn resolve(&self, directory: &str, name: &str) -> Result<Levelgen, String> {
        let entry = self
            .scripts
            .get(&(directory, name))
            .ok_or_else(|| format!("referenced generator script not found: {name}"))?;

        let source = std::str::from_utf8(entry.data())
            .map_err(|_| format!("generator script {} is not valid UTF-8", entry.file_name()))?;
        if source.is_empty() {
            return Err(format!("generator script {} is empty", entry.file_name()));
        }

        Ok(Levelgen {
            filename: entry.file_name().to_string(),
            source: source.to_string(),
        })
    }
}

fn is_platform_metadata(entry: &ArchiveEntry, config: &IngestConfig) -> bool {
    entry.ancestors().any(|dir| config.is_metadata_dir(dir))
}

fn is_level_file(entry: &ArchiveEntry, config: &IngestConfig) -> bool {
    !entry.is_dir()
        && entry
            .split_extension()
            .is_some_and(|(_, ext)| ext == config.level_extension)
}

/// Create a new level, or update the one named by `database_id` if it exists.
///
/// Updates keep the existing owner and author; creates are attributed to
/// `uploader`.
async fn store_level<R: LevelRepository + ?Sized>(
    repo: &R,
    database_id: Option<i32>,
    content: LevelContent,
    uploader: &Uploader,
) -> Result<StoredLevel, RepoError> {
    if let Some(id) = database_id
        && repo.find_by_id(id).await?.is_some()
    {
        repo.update(id, content).await?;
        return Ok(StoredLevel {
            level_id: id,
            created: false,
        });
    }

    let level_id = repo.create(NewLevel::from_content(content, uploader)).await?;
    Ok(StoredLevel {
        level_id,
        created: true,
    })
}

async fn process_level<R: LevelRepository + ?Sized>(
    repo: &R,
    entry: &ArchiveEntry,
    scripts: &ScriptIndex<'_>,
    uploader: &Uploader,
    config: &IngestConfig,
) -> EntryOutcome {
    let Ok(text) = std::str::from_utf8(entry.data()) else {
        return EntryOutcome::Failed("level file is not valid UTF-8".into());
    };

    let header = match header::parse(text) {
        Ok(header) => header,
        Err(e) => return EntryOutcome::Failed(e.to_string()),
    };

    let levelgen = match header.script_name(&config.levelgen_extension) {
        Some(name) => match scripts.resolve(entry.directory_path(), name) {
            Ok(levelgen) => Some(levelgen),
            Err(msg) => return EntryOutcome::Failed(msg),
        },
        None => None,
    };

    let content = LevelContent {
        name: header.name,
        content: text.to_string(),
        levelgen,
    };

    match store_level(repo, header.database_id, content, uploader).await {
        Ok(stored) => EntryOutcome::Stored(stored.level_id),
        Err(e) => {
            warn!(path = entry.path(), error = %e, "Failed to persist uploaded level");
            EntryOutcome::Failed(PERSISTENCE_ERROR.into())
        }
    }
}

/// Ingest already-walked archive entries.
///
/// Returns one report row per level file, in archive order. Generator
/// scripts and unrelated files never produce rows of their own.
pub async fn ingest<R: LevelRepository + ?Sized>(
    repo: &R,
    entries: &[ArchiveEntry],
    uploader: &Uploader,
    config: &IngestConfig,
) -> Vec<UploadReport> {
    let scripts = ScriptIndex::build(entries, config);
    let mut reports = Vec::new();

    for entry in entries.iter().filter(|e| is_level_file(e, config)) {
        let outcome = if is_platform_metadata(entry, config) {
            EntryOutcome::Skipped(METADATA_WARNING.into())
        } else {
            process_level(repo, entry, &scripts, uploader, config).await
        };
        debug!(path = entry.path(), ?outcome, "Processed archive entry");
        reports.push(UploadReport::new(entry.path(), outcome));
    }

    let stored = reports.iter().filter(|r| r.level_id.is_some()).count();
    let failed = reports.iter().filter(|r| !r.errors.is_empty()).count();
    info!(
        entries = reports.len(),
        stored,
        failed,
        skipped = reports.len() - stored - failed,
        uploader = uploader.user_id,
        "Archive ingestion finished"
    );

    reports
}

/// Walk `archive` and ingest its level files.
pub async fn ingest_archive<R: LevelRepository + ?Sized>(
    repo: &R,
    archive: &[u8],
    uploader: &Uploader,
    config: &IngestConfig,
) -> Result<Vec<UploadReport>, ArchiveError> {
    let entries = archive::read_entries(archive, config)?;
    Ok(ingest(repo, &entries, uploader, config).await)
}

/// Store one level file uploaded on its own.
///
/// The header decides create versus update exactly as in batch ingestion;
/// the generator script, if any, is supplied alongside rather than looked up.
pub async fn upload_level<R: LevelRepository + ?Sized>(
    repo: &R,
    content: &[u8],
    levelgen: Option<Levelgen>,
    uploader: &Uploader,
) -> Result<StoredLevel, UploadError> {
    let text = std::str::from_utf8(content).map_err(|_| UploadError::InvalidEncoding)?;
    let header = header::parse(text)?;
    let content = LevelContent {
        name: header.name,
        content: text.to_string(),
        levelgen,
    };
    let stored = store_level(repo, header.database_id, content, uploader).await?;
    debug!(level_id = stored.level_id, created = stored.created, "Stored uploaded level");
    Ok(stored)
}
