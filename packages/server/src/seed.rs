use sea_orm::sea_query::{Index, PostgresQueryBuilder};
use sea_orm::*;
use tracing::{info, warn};

use crate::entity::level;

/// Ensure the indexes used by level listing exist.
///
/// Schema sync only creates primary keys and unique constraints, so the
/// non-unique lookup indexes are created here on startup.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    // Listing sorts and searches by name.
    let by_name = Index::create()
        .if_not_exists()
        .name("idx_level_name")
        .table(level::Entity)
        .col(level::Column::Name)
        .to_string(PostgresQueryBuilder);

    // Ownership checks and "my levels" lookups.
    let by_owner = Index::create()
        .if_not_exists()
        .name("idx_level_owner")
        .table(level::Entity)
        .col(level::Column::OwnerId)
        .to_string(PostgresQueryBuilder);

    for (name, stmt) in [("idx_level_name", by_name), ("idx_level_owner", by_owner)] {
        match db.execute_unprepared(&stmt).await {
            Ok(_) => info!("Ensured index {} exists", name),
            Err(e) => warn!("Failed to create index {}: {}", name, e),
        }
    }

    Ok(())
}
