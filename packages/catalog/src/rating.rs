//! Per-user ratings and the aggregate cached on each level.
//!
//! The aggregate is moved by the difference between a user's old and new
//! value rather than recomputed, so a level's rating is always the sum of
//! its individual ratings as long as the repository applies each delta
//! atomically.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{RatingError, RepoError};
use crate::repository::{LevelRepository, RatingRepository};

/// What a user asked their rating of a level to become.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingExpr {
    /// Set the rating to exactly this value.
    Absolute(i32),
    /// Set the rating to +1.
    Increment,
    /// Set the rating to -1.
    Decrement,
}

impl RatingExpr {
    /// The per-user value this expression resolves to.
    pub fn target(self) -> i32 {
        match self {
            Self::Absolute(value) => value,
            Self::Increment => 1,
            Self::Decrement => -1,
        }
    }
}

/// A rating expression that is neither an integer nor a known directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRatingError(String);

impl fmt::Display for ParseRatingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid rating '{}': expected an integer, 'up' or 'down'",
            self.0
        )
    }
}

impl std::error::Error for ParseRatingError {}

impl FromStr for RatingExpr {
    type Err = ParseRatingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "up" | "increment" => Ok(Self::Increment),
            "down" | "decrement" => Ok(Self::Decrement),
            other => other
                .parse::<i32>()
                .map(Self::Absolute)
                .map_err(|_| ParseRatingError(s.to_string())),
        }
    }
}

/// State after a successful rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct RatingOutcome {
    pub level_id: i32,
    /// The level's aggregate rating after this change.
    pub rating: i64,
    /// The caller's own rating after this change.
    pub user_rating: i32,
}

fn persistence(err: RepoError) -> RatingError {
    warn!(error = %err, "Rating write failed");
    RatingError::Persistence(err.to_string())
}

/// Set `rater_id`'s rating of `level_id` and move the level's aggregate by
/// the difference.
///
/// If the rating itself cannot be stored, the aggregate is left untouched.
/// If the aggregate cannot be moved, the caller's previous rating is put back
/// (or removed when there was none) so a retry computes the full delta again.
/// Only the aggregate is written on the level; `last_updated` is unchanged.
pub async fn rate<L, R>(
    levels: &L,
    ratings: &R,
    level_id: i32,
    rater_id: i32,
    expr: RatingExpr,
) -> Result<RatingOutcome, RatingError>
where
    L: LevelRepository + ?Sized,
    R: RatingRepository + ?Sized,
{
    let level = levels
        .find_by_id(level_id)
        .await
        .map_err(persistence)?
        .ok_or(RatingError::LevelNotFound(level_id))?;

    let previous = ratings
        .find(rater_id, level_id)
        .await
        .map_err(persistence)?
        .map(|r| r.value);
    let old_value = previous.unwrap_or(0);
    let new_value = expr.target();
    let delta = i64::from(new_value) - i64::from(old_value);

    ratings
        .upsert(rater_id, level_id, new_value)
        .await
        .map_err(persistence)?;

    if delta != 0
        && let Err(err) = levels.adjust_rating(level_id, delta).await
    {
        restore(ratings, rater_id, level_id, previous).await;
        return Err(match err {
            RepoError::NotFound(_) => RatingError::LevelNotFound(level_id),
            other => persistence(other),
        });
    }

    let rating = levels
        .find_by_id(level_id)
        .await
        .map_err(persistence)?
        .map_or(level.rating + delta, |l| l.rating);

    debug!(level_id, rater_id, old_value, new_value, delta, rating, "Rating applied");

    Ok(RatingOutcome {
        level_id,
        rating,
        user_rating: new_value,
    })
}

/// Undo a rating write whose aggregate adjustment failed.
async fn restore<R>(ratings: &R, rater_id: i32, level_id: i32, previous: Option<i32>)
where
    R: RatingRepository + ?Sized,
{
    let result = match previous {
        Some(value) => ratings.upsert(rater_id, level_id, value).await,
        None => ratings.remove(rater_id, level_id).await,
    };
    if let Err(error) = result {
        warn!(level_id, rater_id, %error, "Could not restore previous rating");
    }
}
