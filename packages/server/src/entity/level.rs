use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "level")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub name: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    #[sea_orm(column_type = "Text")]
    pub content: String, // raw level file, header included
    #[sea_orm(column_type = "Text")]
    pub levelgen: String, // empty when the level has no generator script
    pub levelgen_filename: String,

    pub author: String,
    pub owner_id: Option<i32>,

    pub rating: i64, // sum of rating.value for this level
    pub downloads: i64,

    #[sea_orm(has_many)]
    pub ratings: HasMany<super::rating::Entity>,

    pub created_at: DateTimeUtc,
    pub last_updated: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
