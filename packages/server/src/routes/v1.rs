use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::config::AppConfig;
use crate::handlers;
use crate::state::AppState;

pub fn routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest("/levels", level_routes(config))
}

fn level_routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    let crud = OpenApiRouter::new()
        .routes(routes!(
            handlers::level::list_levels,
            handlers::level::create_level
        ))
        .routes(routes!(
            handlers::level::get_level,
            handlers::level::update_level,
            handlers::level::delete_level
        ))
        .routes(routes!(handlers::level::rate_level))
        .routes(routes!(handlers::level::raw_level))
        .routes(routes!(handlers::level::raw_level_kind))
        .routes(routes!(handlers::upload::upload_single));

    let mass_upload = OpenApiRouter::new()
        .routes(routes!(handlers::upload::mass_upload))
        .layer(handlers::upload::upload_body_limit(&config.upload));

    crud.merge(mass_upload)
}
