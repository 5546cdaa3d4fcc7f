use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::error::RepoError;
use crate::repository::{
    Level, LevelContent, LevelRepository, NewLevel, Rating, RatingRepository,
};

#[derive(Default)]
struct State {
    levels: BTreeMap<i32, Level>,
    ratings: BTreeMap<(i32, i32), i32>,
    last_id: i32,
}

/// In-process level and rating store.
///
/// Each method holds the lock for its whole read-modify-write, which gives
/// the per-row atomicity the repository contracts ask for. Writes can be
/// made to fail on demand to exercise error paths.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    fail_level_writes: AtomicBool,
    fail_rating_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `create`/`update`/`adjust_rating` fail.
    pub fn fail_level_writes(&self, fail: bool) {
        self.fail_level_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent rating `upsert`/`remove` fail.
    pub fn fail_rating_writes(&self, fail: bool) {
        self.fail_rating_writes.store(fail, Ordering::SeqCst);
    }

    /// Insert a level directly, bypassing failure injection.
    pub async fn insert(&self, level: NewLevel) -> Level {
        let mut state = self.state.lock().await;
        insert_level(&mut state, level)
    }

    /// Every stored level in id order.
    pub async fn levels(&self) -> Vec<Level> {
        self.state.lock().await.levels.values().cloned().collect()
    }

    pub async fn level_count(&self) -> usize {
        self.state.lock().await.levels.len()
    }

    pub async fn rating_count(&self) -> usize {
        self.state.lock().await.ratings.len()
    }

    fn check(flag: &AtomicBool, what: &str) -> Result<(), RepoError> {
        if flag.load(Ordering::SeqCst) {
            Err(RepoError::Storage(format!("{what} write rejected")))
        } else {
            Ok(())
        }
    }
}

fn insert_level(state: &mut State, level: NewLevel) -> Level {
    state.last_id += 1;
    let stored = Level {
        id: state.last_id,
        name: level.name,
        description: level.description,
        content: level.content,
        levelgen: level.levelgen,
        author: level.author,
        owner_id: level.owner_id,
        rating: 0,
        downloads: 0,
        last_updated: Utc::now(),
    };
    state.levels.insert(stored.id, stored.clone());
    stored
}

fn not_found(id: i32) -> RepoError {
    RepoError::NotFound(format!("level {id}"))
}

#[async_trait]
impl LevelRepository for MemoryStore {
    async fn find_by_id(&self, id: i32) -> Result<Option<Level>, RepoError> {
        Ok(self.state.lock().await.levels.get(&id).cloned())
    }

    async fn create(&self, level: NewLevel) -> Result<i32, RepoError> {
        Self::check(&self.fail_level_writes, "level")?;
        let mut state = self.state.lock().await;
        Ok(insert_level(&mut state, level).id)
    }

    async fn update(&self, id: i32, fields: LevelContent) -> Result<(), RepoError> {
        Self::check(&self.fail_level_writes, "level")?;
        let mut state = self.state.lock().await;
        let level = state.levels.get_mut(&id).ok_or_else(|| not_found(id))?;
        level.name = fields.name;
        level.content = fields.content;
        level.levelgen = fields.levelgen;
        level.last_updated = Utc::now();
        Ok(())
    }

    async fn adjust_rating(&self, id: i32, delta: i64) -> Result<(), RepoError> {
        Self::check(&self.fail_level_writes, "level")?;
        let mut state = self.state.lock().await;
        let level = state.levels.get_mut(&id).ok_or_else(|| not_found(id))?;
        level.rating += delta;
        Ok(())
    }
}

#[async_trait]
impl RatingRepository for MemoryStore {
    async fn find(&self, user_id: i32, level_id: i32) -> Result<Option<Rating>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .ratings
            .get(&(user_id, level_id))
            .map(|&value| Rating {
                user_id,
                level_id,
                value,
            }))
    }

    async fn upsert(&self, user_id: i32, level_id: i32, value: i32) -> Result<(), RepoError> {
        Self::check(&self.fail_rating_writes, "rating")?;
        self.state
            .lock()
            .await
            .ratings
            .insert((user_id, level_id), value);
        Ok(())
    }

    async fn remove(&self, user_id: i32, level_id: i32) -> Result<(), RepoError> {
        Self::check(&self.fail_rating_writes, "rating")?;
        self.state.lock().await.ratings.remove(&(user_id, level_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::Levelgen;

    fn new_level(name: &str) -> NewLevel {
        NewLevel {
            name: name.into(),
            description: String::new(),
            content: format!("LevelName {name}"),
            levelgen: None,
            author: "alice".into(),
            owner_id: Some(1),
        }
    }

    #[tokio::test]
    async fn create_assigns_sequential_ids() {
        let store = MemoryStore::new();
        let a = store.create(new_level("a")).await.unwrap();
        let b = store.create(new_level("b")).await.unwrap();
        assert_eq!((a, b), (1, 2));
        assert_eq!(store.level_count().await, 2);
    }

    #[tokio::test]
    async fn update_keeps_ownership_and_rating() {
        let store = MemoryStore::new();
        let level = store.insert(new_level("a")).await;
        store.adjust_rating(level.id, 3).await.unwrap();

        store
            .update(
                level.id,
                LevelContent {
                    name: "renamed".into(),
                    content: "LevelName renamed".into(),
                    levelgen: Some(Levelgen {
                        filename: "a.levelgen".into(),
                        source: "print()".into(),
                    }),
                },
            )
            .await
            .unwrap();

        let updated = store.find_by_id(level.id).await.unwrap().unwrap();
        assert_eq!(updated.name, "renamed");
        assert_eq!(updated.author, "alice");
        assert_eq!(updated.owner_id, Some(1));
        assert_eq!(updated.rating, 3);
        assert!(updated.last_updated >= level.last_updated);
    }

    #[tokio::test]
    async fn upsert_overwrites_in_place() {
        let store = MemoryStore::new();
        store.upsert(1, 7, 1).await.unwrap();
        store.upsert(1, 7, 5).await.unwrap();
        assert_eq!(store.rating_count().await, 1);
        assert_eq!(store.find(1, 7).await.unwrap().map(|r| r.value), Some(5));
    }

    #[tokio::test]
    async fn missing_level_writes_report_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.adjust_rating(9, 1).await,
            Err(RepoError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn injected_failures_reject_writes() {
        let store = MemoryStore::new();
        store.fail_level_writes(true);
        assert!(matches!(
            store.create(new_level("a")).await,
            Err(RepoError::Storage(_))
        ));
        store.fail_rating_writes(true);
        assert!(store.upsert(1, 1, 1).await.is_err());
        assert_eq!(store.rating_count().await, 0);
    }

    #[tokio::test]
    async fn remove_drops_only_that_rating() {
        let store = MemoryStore::new();
        store.upsert(1, 7, 5).await.unwrap();
        store.upsert(2, 7, -1).await.unwrap();

        store.remove(1, 7).await.unwrap();
        store.remove(1, 8).await.unwrap();
        assert_eq!(store.find(1, 7).await.unwrap(), None);
        assert_eq!(store.rating_count().await, 1);
    }
}
