//! crates/ghost_gym_core/src/favorites.rs
//!
//! Per-user favorite exercises, stored as one document at
//! `users/{uid}/data/favorites`.
//!
//! Older documents hold each entry under a literal top-level key
//! `exercises.{id}` instead of inside the nested `exercises` map. Both
//! shapes are decoded into `UserFavorites` here; a legacy document is
//! rewritten in the nested shape before the next mutation touches it.

use crate::documents::{paths, to_document, DocPath, Document, FieldOp, FieldPath};
use crate::domain::{Exercise, FavoriteExercise, UserFavorites};
use crate::ports::{DocumentDatabase, PortError, PortResult};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

const FAVORITES_DOC: &str = "favorites";
const LEGACY_PREFIX: &str = "exercises.";

/// The two storage shapes of a favorites document.
enum StoredFavorites {
    Nested(Document),
    LegacyFlat(Document),
}

impl StoredFavorites {
    fn classify(doc: Document) -> Self {
        if doc.keys().any(|k| k.starts_with(LEGACY_PREFIX)) {
            StoredFavorites::LegacyFlat(doc)
        } else {
            StoredFavorites::Nested(doc)
        }
    }

    fn is_legacy(&self) -> bool {
        matches!(self, StoredFavorites::LegacyFlat(_))
    }

    /// Canonical form. Ids are derived from the decoded entries so the
    /// result is always consistent, whatever the stored counters say.
    fn normalize(self) -> UserFavorites {
        let doc = match self {
            StoredFavorites::Nested(doc) | StoredFavorites::LegacyFlat(doc) => doc,
        };
        let last_updated = doc
            .get("lastUpdated")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<DateTime<Utc>>().ok());

        let mut entries = BTreeMap::new();
        if let Some(nested) = doc.get("exercises").and_then(Value::as_object) {
            for (id, raw) in nested {
                if let Some(favorite) = decode_entry(id, raw) {
                    entries.insert(id.clone(), favorite);
                }
            }
        }
        for (key, raw) in &doc {
            if let Some(id) = key.strip_prefix(LEGACY_PREFIX) {
                if let Some(favorite) = decode_entry(id, raw) {
                    entries.entry(id.to_string()).or_insert(favorite);
                }
            }
        }
        UserFavorites::from_entries(entries, last_updated)
    }
}

fn decode_entry(id: &str, raw: &Value) -> Option<FavoriteExercise> {
    match serde_json::from_value(raw.clone()) {
        Ok(favorite) => Some(favorite),
        Err(e) => {
            warn!(exercise_id = id, error = %e, "Skipping unreadable favorite entry");
            None
        }
    }
}

pub struct FavoritesIndex {
    db: Arc<dyn DocumentDatabase>,
}

impl FavoritesIndex {
    pub fn new(db: Arc<dyn DocumentDatabase>) -> Self {
        Self { db }
    }

    fn path(uid: &str) -> DocPath {
        paths::user_data(uid, FAVORITES_DOC)
    }

    async fn load(&self, uid: &str) -> PortResult<Option<StoredFavorites>> {
        Ok(self.db.get(&Self::path(uid)).await?.map(StoredFavorites::classify))
    }

    /// Loads the favorites, rewriting a legacy document in nested form first.
    async fn load_for_write(&self, uid: &str) -> PortResult<UserFavorites> {
        let Some(stored) = self.load(uid).await? else {
            return Ok(UserFavorites::default());
        };
        let legacy = stored.is_legacy();
        let favorites = stored.normalize();
        if legacy {
            self.db.set(&Self::path(uid), to_document(&favorites)?).await?;
            info!(uid, count = favorites.count(), "Rewrote legacy favorites document");
        }
        Ok(favorites)
    }

    pub async fn get_all(&self, uid: &str) -> PortResult<UserFavorites> {
        Ok(self
            .load(uid)
            .await?
            .map(StoredFavorites::normalize)
            .unwrap_or_default())
    }

    pub async fn favorite_ids(&self, uid: &str) -> PortResult<HashSet<String>> {
        Ok(self.get_all(uid).await?.exercise_ids().iter().cloned().collect())
    }

    pub async fn is_favorited(&self, uid: &str, exercise_id: &str) -> PortResult<bool> {
        Ok(self.get_all(uid).await?.contains(exercise_id))
    }

    pub async fn bulk_check(
        &self,
        uid: &str,
        exercise_ids: &[String],
    ) -> PortResult<BTreeMap<String, bool>> {
        let favorites = self.get_all(uid).await?;
        Ok(exercise_ids
            .iter()
            .map(|id| (id.clone(), favorites.contains(id)))
            .collect())
    }

    /// Returns false when the exercise was already a favorite.
    pub async fn add(&self, uid: &str, exercise: &Exercise) -> PortResult<bool> {
        let favorites = self.load_for_write(uid).await?;
        if favorites.contains(&exercise.id) {
            return Ok(false);
        }
        let now = Utc::now();
        let snapshot = serde_json::to_value(FavoriteExercise::snapshot(exercise, now))
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let ops = vec![
            FieldOp::ArrayUnion("exerciseIds".into(), vec![Value::from(exercise.id.clone())]),
            FieldOp::Set(FieldPath::new(["exercises", exercise.id.as_str()]), snapshot),
            FieldOp::set("lastUpdated", now.to_rfc3339()),
            FieldOp::increment("count", 1),
        ];
        self.db.update(&Self::path(uid), ops, true).await?;
        self.bump_favorite_count(&exercise.id, 1).await;
        info!(uid, exercise_id = %exercise.id, "Added favorite");
        Ok(true)
    }

    /// Returns false when the exercise was not a favorite.
    pub async fn remove(&self, uid: &str, exercise_id: &str) -> PortResult<bool> {
        let favorites = self.load_for_write(uid).await?;
        if !favorites.contains(exercise_id) {
            return Ok(false);
        }
        let ops = vec![
            FieldOp::ArrayRemove("exerciseIds".into(), vec![Value::from(exercise_id)]),
            FieldOp::Delete(FieldPath::new(["exercises", exercise_id])),
            FieldOp::set("lastUpdated", Utc::now().to_rfc3339()),
            FieldOp::increment("count", -1),
        ];
        self.db.update(&Self::path(uid), ops, false).await?;
        self.bump_favorite_count(exercise_id, -1).await;
        info!(uid, exercise_id, "Removed favorite");
        Ok(true)
    }

    /// Best-effort popularity signal on the global catalog entry.
    async fn bump_favorite_count(&self, exercise_id: &str, delta: i64) {
        let ops = vec![FieldOp::increment("favoriteCount", delta)];
        if let Err(e) = self.db.update(&paths::global_exercise(exercise_id), ops, false).await {
            warn!(exercise_id, error = %e, "Could not update exercise favorite count");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn legacy_and_nested_entries_merge_on_decode() {
        let doc = json!({
            "exerciseIds": ["ex-1", "ex-2"],
            "count": 5,
            "exercises": {
                "ex-1": { "exerciseId": "ex-1", "name": "Squat", "favoritedAt": "2024-01-01T00:00:00Z" }
            },
            "exercises.ex-2": { "exerciseId": "ex-2", "name": "Row", "favoritedAt": "2024-01-02T00:00:00Z" }
        });
        let stored = StoredFavorites::classify(doc.as_object().cloned().unwrap());
        assert!(stored.is_legacy());

        let favorites = stored.normalize();
        assert!(favorites.is_consistent());
        assert_eq!(favorites.count(), 2);
        assert!(favorites.contains("ex-2"));
    }

    #[test]
    fn unreadable_entries_are_dropped_from_every_view() {
        let doc = json!({
            "exerciseIds": ["ex-1", "broken"],
            "exercises": {
                "ex-1": { "exerciseId": "ex-1", "name": "Squat", "favoritedAt": "2024-01-01T00:00:00Z" },
                "broken": { "name": 7 }
            }
        });
        let favorites = StoredFavorites::classify(doc.as_object().cloned().unwrap()).normalize();
        assert!(favorites.is_consistent());
        assert!(!favorites.contains("broken"));
    }
}
