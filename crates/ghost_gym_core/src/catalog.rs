//! crates/ghost_gym_core/src/catalog.rs
//!
//! The shared exercise catalog (`global_exercises`) plus each user's custom
//! exercises. Search over-fetches candidates through the token index and
//! hands them to the ranker before truncating.

use crate::documents::{from_document, paths, to_document, DocPath, DocumentSnapshot, Filter, Query};
use crate::domain::{search_tokens, Exercise, Identity, NewExercise, ValidationError};
use crate::favorites::FavoritesIndex;
use crate::ports::{DocumentDatabase, PortError, PortResult};
use crate::ranking;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_CANDIDATE_CAP: usize = 100;

/// Optional equality filters applied before ranking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseFilters {
    pub muscle_group: Option<String>,
    pub equipment: Option<String>,
    pub difficulty: Option<String>,
}

impl ExerciseFilters {
    fn apply(&self, mut query: Query) -> Query {
        let pairs = [
            ("targetMuscleGroup", &self.muscle_group),
            ("primaryEquipment", &self.equipment),
            ("difficultyLevel", &self.difficulty),
        ];
        for (field, value) in pairs {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                query = query.eq(field, value);
            }
        }
        query
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseSearch {
    pub exercises: Vec<Exercise>,
    pub query: String,
    pub total_results: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExercisePage {
    pub exercises: Vec<Exercise>,
    pub total_count: usize,
    pub page: usize,
    pub page_size: usize,
}

pub struct ExerciseCatalog {
    db: Arc<dyn DocumentDatabase>,
    favorites: Arc<FavoritesIndex>,
    candidate_cap: usize,
}

impl ExerciseCatalog {
    pub fn new(
        db: Arc<dyn DocumentDatabase>,
        favorites: Arc<FavoritesIndex>,
        candidate_cap: usize,
    ) -> Self {
        Self {
            db,
            favorites,
            candidate_cap: candidate_cap.max(1),
        }
    }

    fn decode_all(snapshots: Vec<DocumentSnapshot>) -> Vec<Exercise> {
        snapshots
            .into_iter()
            .filter_map(|snap| match from_document::<Exercise>(snap.data) {
                Ok(exercise) => Some(exercise),
                Err(e) => {
                    warn!(id = %snap.id, error = %e, "Failed to parse exercise");
                    None
                }
            })
            .collect()
    }

    /// Looks in the global catalog first, then in the caller's custom exercises.
    pub async fn get_exercise(
        &self,
        identity: Option<&Identity>,
        exercise_id: &str,
    ) -> PortResult<Option<Exercise>> {
        if let Some(doc) = self.db.get(&paths::global_exercise(exercise_id)).await? {
            return Ok(Some(from_document(doc)?));
        }
        let Some(identity) = identity else {
            return Ok(None);
        };
        let path = DocPath::new(paths::custom_exercises(&identity.uid), exercise_id);
        match self.db.get(&path).await? {
            Some(doc) => Ok(Some(from_document(doc)?)),
            None => Ok(None),
        }
    }

    /// Global exercises ordered by name, 1-based pages.
    pub async fn list_exercises(&self, page: usize, page_size: usize) -> PortResult<ExercisePage> {
        let page = page.max(1);
        let all = self
            .db
            .query(paths::GLOBAL_EXERCISES, &Query::new().order_by("name", false))
            .await?;
        let total_count = all.len();
        let exercises = Self::decode_all(
            all.into_iter()
                .skip((page - 1).saturating_mul(page_size))
                .take(page_size)
                .collect(),
        );
        Ok(ExercisePage {
            exercises,
            total_count,
            page,
            page_size,
        })
    }

    /// Token-index search across the global catalog and the caller's custom
    /// exercises, ranked with the caller's favorites.
    pub async fn search(
        &self,
        identity: Option<&Identity>,
        query: &str,
        filters: &ExerciseFilters,
        limit: usize,
    ) -> PortResult<ExerciseSearch> {
        let fetch = limit.saturating_mul(3).min(self.candidate_cap);
        let tokens: Vec<Value> = search_tokens(query).into_iter().map(Value::from).collect();
        // Only stop words or single characters: nothing in the token index can match.
        if tokens.is_empty() && !query.trim().is_empty() {
            debug!(query, "Search query has no indexable words");
            return Ok(ExerciseSearch {
                exercises: Vec::new(),
                query: query.to_string(),
                total_results: 0,
            });
        }
        let mut candidate_query = filters.apply(Query::new());
        if !tokens.is_empty() {
            candidate_query =
                candidate_query.filter(Filter::ArrayContainsAny("nameSearchTokens".into(), tokens));
        }
        let candidate_query = candidate_query.limit(fetch);

        let mut candidates = Self::decode_all(
            self.db.query(paths::GLOBAL_EXERCISES, &candidate_query).await?,
        );
        let mut favorites = HashSet::new();
        if let Some(identity) = identity {
            let custom = self
                .db
                .query(&paths::custom_exercises(&identity.uid), &candidate_query)
                .await?;
            candidates.extend(Self::decode_all(custom));
            favorites = match self.favorites.favorite_ids(&identity.uid).await {
                Ok(ids) => ids,
                Err(e) => {
                    warn!(uid = %identity.uid, error = %e, "Ranking without favorites");
                    HashSet::new()
                }
            };
        }

        let mut exercises = ranking::rank(candidates, query, &favorites);
        exercises.truncate(limit);
        info!(query, results = exercises.len(), "Exercise search");
        Ok(ExerciseSearch {
            total_results: exercises.len(),
            exercises,
            query: query.to_string(),
        })
    }

    pub async fn create_custom_exercise(
        &self,
        identity: Option<&Identity>,
        new: NewExercise,
    ) -> PortResult<Exercise> {
        let identity = identity.ok_or(PortError::Unauthorized)?;
        if new.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        let exercise = Exercise::custom(new);
        let path = DocPath::new(paths::custom_exercises(&identity.uid), exercise.id.clone());
        self.db.set(&path, to_document(&exercise)?).await?;
        info!(uid = %identity.uid, id = %exercise.id, "Created custom exercise");
        Ok(exercise)
    }

    pub async fn list_custom_exercises(
        &self,
        identity: Option<&Identity>,
        limit: usize,
    ) -> PortResult<Vec<Exercise>> {
        let identity = identity.ok_or(PortError::Unauthorized)?;
        let query = Query::new().order_by("name", false).limit(limit);
        Ok(Self::decode_all(
            self.db.query(&paths::custom_exercises(&identity.uid), &query).await?,
        ))
    }

    /// Distinct non-empty string values of `field` across the global catalog, sorted.
    pub async fn unique_values(&self, field: &str) -> PortResult<Vec<String>> {
        let docs = self.db.query(paths::GLOBAL_EXERCISES, &Query::new()).await?;
        let values: BTreeSet<String> = docs
            .iter()
            .filter_map(|snap| snap.data.get(field).and_then(Value::as_str))
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();
        Ok(values.into_iter().collect())
    }

    /// Writes a global catalog entry, regenerating its search tokens.
    pub async fn put_global_exercise(&self, mut exercise: Exercise) -> PortResult<()> {
        exercise.name_search_tokens = search_tokens(&exercise.name);
        exercise.is_global = true;
        self.db
            .set(&paths::global_exercise(&exercise.id), to_document(&exercise)?)
            .await
    }
}
