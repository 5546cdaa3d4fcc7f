use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderName, StatusCode, header};
use axum::response::IntoResponse;
use catalog::{
    Level, LevelRepository, Levelgen, NewLevel, RatingExpr, RatingOutcome, RatingRepository, rate,
};
use sea_orm::prelude::Expr;
use sea_orm::sea_query::{Func, LikeExpr, LockType};
use sea_orm::*;
use tracing::{info, instrument};

use crate::entity::level;
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::level::*;
use crate::repository::LevelStore;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/",
    tag = "Levels",
    operation_id = "listLevels",
    summary = "List levels",
    description = "Returns a page of levels sorted by name. Supports a case-insensitive `search` on the level name. Level content and scripts are omitted from list results.",
    params(LevelListQuery),
    responses(
        (status = 200, description = "List of levels", body = LevelListResponse),
    ),
)]
#[instrument(skip(state, query))]
pub async fn list_levels(
    State(state): State<AppState>,
    Query(query): Query<LevelListQuery>,
) -> Result<Json<LevelListResponse>, AppError> {
    let page = Ord::max(query.page.unwrap_or(1), 1);
    let per_page = query.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, 100);

    let mut select = level::Entity::find();

    if let Some(ref search) = query.search {
        let term = escape_like(search.trim());
        if !term.is_empty() {
            select = select.filter(
                Expr::expr(Func::lower(Expr::col(level::Column::Name)))
                    .like(LikeExpr::new(format!("%{}%", term.to_lowercase())).escape('\\')),
            );
        }
    }

    let total = select
        .clone()
        .paginate(&state.db, per_page)
        .num_items()
        .await?;
    let total_pages = total.div_ceil(per_page);

    let data = select
        .order_by_asc(level::Column::Name)
        .order_by_asc(level::Column::Id)
        .select_only()
        .column(level::Column::Id)
        .column(level::Column::Name)
        .column(level::Column::Description)
        .column(level::Column::Author)
        .column(level::Column::OwnerId)
        .column(level::Column::Rating)
        .column(level::Column::Downloads)
        .column(level::Column::LevelgenFilename)
        .column(level::Column::LastUpdated)
        .offset(Some((page - 1) * per_page))
        .limit(Some(per_page))
        .into_model::<LevelListItem>()
        .all(&state.db)
        .await?;

    Ok(Json(LevelListResponse {
        data,
        pagination: Pagination {
            page,
            per_page,
            total,
            total_pages,
        },
    }))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Levels",
    operation_id = "getLevel",
    summary = "View a level",
    description = "Returns the full level. When called with a token, also returns the caller's own rating and whether they own the level.",
    params(("id" = i32, Path, description = "Level ID")),
    responses(
        (status = 200, description = "Level details", body = LevelViewResponse),
        (status = 401, description = "Invalid token (TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Level not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, auth_user), fields(id))]
pub async fn get_level(
    auth_user: Option<AuthUser>,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<LevelViewResponse>, AppError> {
    let store = LevelStore::new(&state.db);
    let level = find_level(&store, id).await?;

    let (user_rating, is_owner) = match auth_user {
        Some(user) => {
            let rating = store.find(user.user_id, id).await?;
            (rating.map(|r| r.value), user.owns(level.owner_id))
        }
        None => (None, false),
    };

    Ok(Json(LevelViewResponse {
        level: level.into(),
        user_rating,
        is_owner,
    }))
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Levels",
    operation_id = "createLevel",
    summary = "Add a level",
    description = "Creates a level owned by the caller, credited to the caller's display name.",
    request_body = CreateLevelRequest,
    responses(
        (status = 201, description = "Level created", body = LevelResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(name = %payload.name))]
pub async fn create_level(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateLevelRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_create_level(&payload, &state.config.upload.levelgen_extension)?;

    let store = LevelStore::new(&state.db);
    let id = store
        .create(NewLevel {
            name: payload.name.trim().to_string(),
            description: payload.description,
            content: payload.content,
            levelgen: payload.levelgen.map(LevelgenPayload::into_levelgen),
            author: auth_user.display_name.clone(),
            owner_id: Some(auth_user.user_id),
        })
        .await?;
    info!(id, user = auth_user.user_id, "Level created");

    let level = find_level(&store, id).await?;
    Ok((StatusCode::CREATED, Json(LevelResponse::from(level))))
}

#[utoipa::path(
    patch,
    path = "/{id}",
    tag = "Levels",
    operation_id = "updateLevel",
    summary = "Edit a level",
    description = "Partially updates a level; only provided fields are modified. Only the owner or an admin may edit. Owner, author and rating never change. Editing the name, content or script bumps `last_updated`; editing only the description does not.",
    params(("id" = i32, Path, description = "Level ID")),
    request_body = UpdateLevelRequest,
    responses(
        (status = 200, description = "Level updated", body = LevelResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not the owner (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Level not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(id))]
pub async fn update_level(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateLevelRequest>,
) -> Result<Json<LevelResponse>, AppError> {
    validate_update_level(&payload, &state.config.upload.levelgen_extension)?;

    let txn = state.db.begin().await?;

    let existing = find_level_for_update(&txn, id).await?;
    auth_user.require_owner_or_admin(existing.owner_id)?;

    if payload == UpdateLevelRequest::default() {
        return Ok(Json(Level::from(existing).into()));
    }

    let active = apply_update(existing, payload, chrono::Utc::now());
    let model = active.update(&txn).await?;
    txn.commit().await?;

    Ok(Json(Level::from(model).into()))
}

/// Fold a PATCH body into the stored row. `last_updated` moves to `now` only
/// when the name, content or script changes.
fn apply_update(
    existing: level::Model,
    payload: UpdateLevelRequest,
    now: chrono::DateTime<chrono::Utc>,
) -> level::ActiveModel {
    let changes_content = payload.changes_content();
    let mut active: level::ActiveModel = existing.into();

    if let Some(ref name) = payload.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(description) = payload.description {
        active.description = Set(description);
    }
    if let Some(content) = payload.content {
        active.content = Set(content);
    }
    if let Some(levelgen) = payload.levelgen {
        let (filename, source) =
            Levelgen::into_columns(levelgen.map(LevelgenPayload::into_levelgen));
        active.levelgen_filename = Set(filename);
        active.levelgen = Set(source);
    }
    if changes_content {
        active.last_updated = Set(now);
    }
    active
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Levels",
    operation_id = "deleteLevel",
    summary = "Delete a level",
    description = "Permanently deletes a level together with its ratings. Only the owner or an admin may delete.",
    params(("id" = i32, Path, description = "Level ID")),
    responses(
        (status = 204, description = "Level deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not the owner (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Level not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id))]
pub async fn delete_level(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, AppError> {
    let txn = state.db.begin().await?;

    let existing = find_level_for_update(&txn, id).await?;
    auth_user.require_owner_or_admin(existing.owner_id)?;

    LevelStore::new(&txn).delete(id).await?;
    txn.commit().await?;
    info!(id, user = auth_user.user_id, "Level deleted");

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/{id}/rate/{value}",
    tag = "Levels",
    operation_id = "rateLevel",
    summary = "Rate a level",
    description = "Sets the caller's rating of a level and moves the level's aggregate rating by the difference. `value` is an integer, `up`/`increment` (+1) or `down`/`decrement` (-1). Rating a missing level, or a rating that cannot be stored, is a validation error.",
    params(
        ("id" = i32, Path, description = "Level ID"),
        ("value" = String, Path, description = "Integer, `up` or `down`"),
    ),
    responses(
        (status = 200, description = "Rating stored", body = RatingOutcome),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id, user = auth_user.user_id))]
pub async fn rate_level(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path((id, value)): Path<(i32, String)>,
) -> Result<Json<RatingOutcome>, AppError> {
    let expr = value
        .parse::<RatingExpr>()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let txn = state.db.begin().await?;

    // Serialise raters of the same level so each reads a settled old value.
    level::Entity::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?;

    let store = LevelStore::new(&txn);
    let outcome = rate(&store, &store, id, auth_user.user_id, expr).await?;
    txn.commit().await?;

    Ok(Json(outcome))
}

#[utoipa::path(
    get,
    path = "/{id}/raw",
    tag = "Levels",
    operation_id = "getLevelRaw",
    summary = "Download a level file",
    description = "Returns the raw level file and counts a download.",
    params(("id" = i32, Path, description = "Level ID")),
    responses(
        (status = 200, description = "Raw level file", body = String, content_type = "text/plain"),
        (status = 404, description = "Level not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(id))]
pub async fn raw_level(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, AppError> {
    raw_response(&state, id, RawKind::Content).await
}

#[utoipa::path(
    get,
    path = "/{id}/raw/{kind}",
    tag = "Levels",
    operation_id = "getLevelRawKind",
    summary = "Download a level file or its generator script",
    description = "`kind` is `content` or `levelgen`. The script is prefixed with a `-- <filename>` line. Only `content` downloads are counted.",
    params(
        ("id" = i32, Path, description = "Level ID"),
        ("kind" = String, Path, description = "`content` or `levelgen`"),
    ),
    responses(
        (status = 200, description = "Raw file", body = String, content_type = "text/plain"),
        (status = 400, description = "Unknown kind (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Level not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(id, kind = %kind))]
pub async fn raw_level_kind(
    State(state): State<AppState>,
    Path((id, kind)): Path<(i32, String)>,
) -> Result<impl IntoResponse, AppError> {
    let kind: RawKind = kind.parse()?;
    raw_response(&state, id, kind).await
}

async fn raw_response(
    state: &AppState,
    id: i32,
    kind: RawKind,
) -> Result<([(HeaderName, &'static str); 1], String), AppError> {
    let store = LevelStore::new(&state.db);
    let level = find_level(&store, id).await?;

    let body = match kind {
        RawKind::Content => {
            store.record_download(id).await?;
            level.content
        }
        RawKind::Levelgen => raw_levelgen(level.levelgen.as_ref()),
    };

    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body))
}

async fn find_level<R: LevelRepository + ?Sized>(store: &R, id: i32) -> Result<Level, AppError> {
    store
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Level not found".into()))
}

async fn find_level_for_update(
    txn: &DatabaseTransaction,
    id: i32,
) -> Result<level::Model, AppError> {
    level::Entity::find_by_id(id)
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Level not found".into()))
}
