use axum::Json;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use catalog::{IngestConfig, StoredLevel, ingest_archive, upload_level};
use tracing::{info, instrument};

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::level::*;
use crate::repository::LevelStore;
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/upload",
    tag = "Upload",
    operation_id = "uploadLevel",
    summary = "Upload a single level file",
    description = "Stores one level file. The name comes from the `LevelName` header line. A `LevelDatabaseId` line that names an existing level updates it in place; otherwise a new level owned by the caller is created.",
    request_body = UploadLevelRequest,
    responses(
        (status = 201, description = "Level created", body = StoredLevel),
        (status = 200, description = "Existing level updated", body = StoredLevel),
        (status = 400, description = "Invalid header or encoding (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user = auth_user.user_id))]
pub async fn upload_single(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<UploadLevelRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_upload_level(&payload, &state.config.upload.levelgen_extension)?;

    let store = LevelStore::new(&state.db);
    let stored = upload_level(
        &store,
        payload.content.as_bytes(),
        payload.levelgen.map(LevelgenPayload::into_levelgen),
        &auth_user.uploader(),
    )
    .await?;

    let status = if stored.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(stored)))
}

#[utoipa::path(
    post,
    path = "/mass-upload",
    tag = "Upload",
    operation_id = "massUploadLevels",
    summary = "Upload a zip archive of levels",
    description = "Ingests every level file in the archive. Each level's generator script is looked up by the `Script` header line in the level's own directory. Returns one report row per level file in archive order; a failing entry never stops the others. Platform metadata folders such as `__MACOSX` are skipped with a warning.",
    request_body(content_type = "multipart/form-data", description = "ZIP archive in the `file` field"),
    responses(
        (status = 200, description = "Per-entry ingestion report", body = MassUploadResponse),
        (status = 400, description = "Unreadable or oversized archive (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, multipart), fields(user = auth_user.user_id))]
pub async fn mass_upload(
    auth_user: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<MassUploadResponse>, AppError> {
    let mut zip_bytes: Option<Vec<u8>> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Multipart error: {e}")))?
    {
        if field.name() == Some("file") {
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(format!("Failed to read file: {e}")))?;
            zip_bytes = Some(data.to_vec());
            break;
        }
    }

    let zip_bytes = zip_bytes.ok_or_else(|| AppError::Validation("Missing 'file' field".into()))?;

    let store = LevelStore::new(&state.db);
    let reports = ingest_archive(
        &store,
        &zip_bytes,
        &auth_user.uploader(),
        &state.config.upload,
    )
    .await?;

    let response = MassUploadResponse::from(reports);
    info!(
        stored = response.stored,
        failed = response.failed,
        "Mass upload finished"
    );
    Ok(Json(response))
}

/// Body limit layer for the archive upload route, sized to the configured
/// archive limit plus multipart framing.
pub fn upload_body_limit(config: &IngestConfig) -> DefaultBodyLimit {
    let limit = usize::try_from(config.max_total_size).unwrap_or(usize::MAX);
    DefaultBodyLimit::max(limit.saturating_add(64 * 1024))
}
