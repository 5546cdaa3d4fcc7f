//! sea-orm implementation of the catalog's storage contracts.

use async_trait::async_trait;
use catalog::{
    Level, LevelContent, LevelRepository, Levelgen, NewLevel, Rating, RatingRepository, RepoError,
};
use chrono::Utc;
use sea_orm::sea_query::{Expr, ExprTrait, OnConflict};
use sea_orm::*;

use crate::entity::{level, rating};

impl From<level::Model> for Level {
    fn from(m: level::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            description: m.description,
            content: m.content,
            levelgen: Levelgen::from_columns(m.levelgen_filename, m.levelgen),
            author: m.author,
            owner_id: m.owner_id,
            rating: m.rating,
            downloads: u64::try_from(m.downloads).unwrap_or(0),
            last_updated: m.last_updated,
        }
    }
}

fn storage(err: DbErr) -> RepoError {
    RepoError::Storage(err.to_string())
}

fn level_not_found(id: i32) -> RepoError {
    RepoError::NotFound(format!("Level {id}"))
}

/// Level and rating storage over any sea-orm connection or transaction.
pub struct LevelStore<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> LevelStore<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Bump the download counter. Returns `false` if the level does not exist.
    pub async fn record_download(&self, id: i32) -> Result<bool, DbErr> {
        let result = level::Entity::update_many()
            .col_expr(
                level::Column::Downloads,
                Expr::col(level::Column::Downloads).add(1),
            )
            .filter(level::Column::Id.eq(id))
            .exec(self.conn)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Delete a level. Its ratings go with it through the foreign key.
    pub async fn delete(&self, id: i32) -> Result<bool, DbErr> {
        let result = level::Entity::delete_by_id(id).exec(self.conn).await?;
        Ok(result.rows_affected > 0)
    }
}

#[async_trait]
impl<C> LevelRepository for LevelStore<'_, C>
where
    C: ConnectionTrait + Send + Sync,
{
    async fn find_by_id(&self, id: i32) -> Result<Option<Level>, RepoError> {
        let model = level::Entity::find_by_id(id)
            .one(self.conn)
            .await
            .map_err(storage)?;
        Ok(model.map(Level::from))
    }

    async fn create(&self, new: NewLevel) -> Result<i32, RepoError> {
        let now = Utc::now();
        let (levelgen_filename, levelgen) = Levelgen::into_columns(new.levelgen);
        let model = level::ActiveModel {
            name: Set(new.name),
            description: Set(new.description),
            content: Set(new.content),
            levelgen: Set(levelgen),
            levelgen_filename: Set(levelgen_filename),
            author: Set(new.author),
            owner_id: Set(new.owner_id),
            rating: Set(0),
            downloads: Set(0),
            created_at: Set(now),
            last_updated: Set(now),
            ..Default::default()
        };

        let model = model.insert(self.conn).await.map_err(storage)?;
        Ok(model.id)
    }

    async fn update(&self, id: i32, fields: LevelContent) -> Result<(), RepoError> {
        let (levelgen_filename, levelgen) = Levelgen::into_columns(fields.levelgen);
        let result = level::Entity::update_many()
            .col_expr(level::Column::Name, Expr::value(fields.name))
            .col_expr(level::Column::Content, Expr::value(fields.content))
            .col_expr(level::Column::Levelgen, Expr::value(levelgen))
            .col_expr(
                level::Column::LevelgenFilename,
                Expr::value(levelgen_filename),
            )
            .col_expr(level::Column::LastUpdated, Expr::value(Utc::now()))
            .filter(level::Column::Id.eq(id))
            .exec(self.conn)
            .await
            .map_err(storage)?;

        if result.rows_affected == 0 {
            return Err(level_not_found(id));
        }
        Ok(())
    }

    async fn adjust_rating(&self, id: i32, delta: i64) -> Result<(), RepoError> {
        // Single UPDATE .. SET rating = rating + delta keeps concurrent
        // ratings of the same level from losing writes.
        let result = level::Entity::update_many()
            .col_expr(
                level::Column::Rating,
                Expr::col(level::Column::Rating).add(delta),
            )
            .filter(level::Column::Id.eq(id))
            .exec(self.conn)
            .await
            .map_err(storage)?;

        if result.rows_affected == 0 {
            return Err(level_not_found(id));
        }
        Ok(())
    }
}

#[async_trait]
impl<C> RatingRepository for LevelStore<'_, C>
where
    C: ConnectionTrait + Send + Sync,
{
    async fn find(&self, user_id: i32, level_id: i32) -> Result<Option<Rating>, RepoError> {
        let model = rating::Entity::find_by_id((user_id, level_id))
            .one(self.conn)
            .await
            .map_err(storage)?;
        Ok(model.map(|m| Rating {
            user_id: m.user_id,
            level_id: m.level_id,
            value: m.value,
        }))
    }

    async fn upsert(&self, user_id: i32, level_id: i32, value: i32) -> Result<(), RepoError> {
        let model = rating::ActiveModel {
            user_id: Set(user_id),
            level_id: Set(level_id),
            value: Set(value),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };

        rating::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([rating::Column::UserId, rating::Column::LevelId])
                    .update_columns([rating::Column::Value, rating::Column::UpdatedAt])
                    .to_owned(),
            )
            .exec_without_returning(self.conn)
            .await
            .map_err(storage)?;
        Ok(())
    }

    async fn remove(&self, user_id: i32, level_id: i32) -> Result<(), RepoError> {
        rating::Entity::delete_by_id((user_id, level_id))
            .exec(self.conn)
            .await
            .map_err(storage)?;
        Ok(())
    }
}
