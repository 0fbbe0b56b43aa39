//! crates/ghost_gym_core/src/sessions.rs
//!
//! Workout session logging and per-exercise history. Authenticated users
//! only: every call without an identity fails with `PortError::Unauthorized`.

use crate::documents::{from_document, paths, to_document, DocPath, Query, WriteBatch};
use crate::domain::{
    CompleteSession, ExerciseHistory, ExercisePerformance, Identity, NewSession, SessionPatch,
    SessionStatus, WorkoutSession,
};
use crate::ports::{DocumentDatabase, PortError, PortResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Bonus exercises from the latest completed session of a workout, used to
/// pre-populate the next one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BonusHistory {
    pub last_session_date: Option<DateTime<Utc>>,
    pub bonus_exercises: Vec<ExercisePerformance>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionFilter {
    pub workout_id: Option<String>,
    pub status: Option<SessionStatus>,
    pub limit: Option<usize>,
}

pub struct SessionLog {
    db: Arc<dyn DocumentDatabase>,
}

fn require(identity: Option<&Identity>) -> PortResult<&str> {
    identity.map(|i| i.uid.as_str()).ok_or(PortError::Unauthorized)
}

impl SessionLog {
    pub fn new(db: Arc<dyn DocumentDatabase>) -> Self {
        Self { db }
    }

    fn session_path(uid: &str, id: &str) -> DocPath {
        DocPath::new(paths::sessions(uid), id)
    }

    fn history_path(uid: &str, workout_id: &str, exercise_name: &str) -> DocPath {
        DocPath::new(
            paths::exercise_history(uid),
            ExerciseHistory::key(workout_id, exercise_name),
        )
    }

    async fn load(&self, uid: &str, id: &str) -> PortResult<Option<WorkoutSession>> {
        match self.db.get(&Self::session_path(uid, id)).await? {
            Some(doc) => Ok(Some(from_document(doc)?)),
            None => Ok(None),
        }
    }

    async fn store(&self, uid: &str, session: &WorkoutSession) -> PortResult<()> {
        self.db
            .set(&Self::session_path(uid, &session.id), to_document(session)?)
            .await
    }

    pub async fn create(
        &self,
        identity: Option<&Identity>,
        new: NewSession,
    ) -> PortResult<WorkoutSession> {
        let uid = require(identity)?;
        if new.workout_id.trim().is_empty() {
            return Err(PortError::Validation("workout_id must not be empty".into()));
        }
        let session = WorkoutSession::start(new, Utc::now());
        self.store(uid, &session).await?;
        info!(uid, id = %session.id, workout_id = %session.workout_id, "Started workout session");
        Ok(session)
    }

    pub async fn get(
        &self,
        identity: Option<&Identity>,
        session_id: &str,
    ) -> PortResult<Option<WorkoutSession>> {
        let uid = require(identity)?;
        self.load(uid, session_id).await
    }

    /// Auto-save. Only sessions still in progress accept changes.
    pub async fn update(
        &self,
        identity: Option<&Identity>,
        session_id: &str,
        patch: SessionPatch,
    ) -> PortResult<Option<WorkoutSession>> {
        let uid = require(identity)?;
        let Some(mut session) = self.load(uid, session_id).await? else {
            return Ok(None);
        };
        if session.status != SessionStatus::InProgress {
            return Err(PortError::Validation(format!(
                "session {} is {} and can no longer be edited",
                session_id,
                session.status.as_str()
            )));
        }
        patch.apply(&mut session);
        self.store(uid, &session).await?;
        Ok(Some(session))
    }

    /// Completes the session and folds every weighted exercise into its
    /// history record. The session and all history records are written in
    /// one batch.
    pub async fn complete(
        &self,
        identity: Option<&Identity>,
        session_id: &str,
        completion: CompleteSession,
    ) -> PortResult<Option<WorkoutSession>> {
        let uid = require(identity)?;
        let Some(mut session) = self.load(uid, session_id).await? else {
            return Ok(None);
        };
        if !session.complete(completion, Utc::now()) {
            return Err(PortError::Validation(format!(
                "session {} is already {}",
                session_id,
                session.status.as_str()
            )));
        }
        let completed_at = session.completed_at.unwrap_or_else(Utc::now);

        // One record per exercise name; the first weighted entry counts.
        let mut histories: BTreeMap<String, ExerciseHistory> = BTreeMap::new();
        for performed in &session.exercises_performed {
            let Some(weight) = performed.weight else {
                continue;
            };
            let key = ExerciseHistory::key(&session.workout_id, &performed.exercise_name);
            if histories.contains_key(&key) {
                continue;
            }
            let path = Self::history_path(uid, &session.workout_id, &performed.exercise_name);
            let mut history = match self.db.get(&path).await? {
                Some(doc) => from_document(doc)?,
                None => ExerciseHistory::empty(&session.workout_id, &performed.exercise_name),
            };
            history.record(
                &session.id,
                completed_at,
                weight,
                performed.weight_unit,
                performed.sets_completed,
            );
            histories.insert(key, history);
        }

        let mut batch = WriteBatch::new();
        batch.set(Self::session_path(uid, &session.id), to_document(&session)?);
        for (key, history) in &histories {
            batch.set(
                DocPath::new(paths::exercise_history(uid), key.clone()),
                to_document(history)?,
            );
        }
        self.db.commit(batch).await?;
        info!(
            uid,
            id = %session.id,
            duration_minutes = ?session.duration_minutes,
            histories = histories.len(),
            "Completed workout session"
        );
        Ok(Some(session))
    }

    /// Marks an in-progress session abandoned. History is untouched.
    pub async fn abandon(
        &self,
        identity: Option<&Identity>,
        session_id: &str,
    ) -> PortResult<Option<WorkoutSession>> {
        let uid = require(identity)?;
        let Some(mut session) = self.load(uid, session_id).await? else {
            return Ok(None);
        };
        if session.status != SessionStatus::InProgress {
            return Err(PortError::Validation(format!(
                "session {} is {} and cannot be abandoned",
                session_id,
                session.status.as_str()
            )));
        }
        session.status = SessionStatus::Abandoned;
        self.store(uid, &session).await?;
        Ok(Some(session))
    }

    /// Removes the session document. History is untouched.
    pub async fn delete(&self, identity: Option<&Identity>, session_id: &str) -> PortResult<bool> {
        let uid = require(identity)?;
        let deleted = self.db.delete(&Self::session_path(uid, session_id)).await?;
        if deleted {
            info!(uid, session_id, "Deleted workout session; exercise history kept");
        }
        Ok(deleted)
    }

    /// Sessions newest first.
    pub async fn list(
        &self,
        identity: Option<&Identity>,
        filter: &SessionFilter,
    ) -> PortResult<Vec<WorkoutSession>> {
        let uid = require(identity)?;
        let mut query = Query::new().order_by("started_at", true);
        if let Some(workout_id) = &filter.workout_id {
            query = query.eq("workout_id", workout_id.as_str());
        }
        if let Some(status) = filter.status {
            query = query.eq("status", status.as_str());
        }
        if let Some(limit) = filter.limit {
            query = query.limit(limit);
        }
        let snapshots = self.db.query(&paths::sessions(uid), &query).await?;
        Ok(snapshots
            .into_iter()
            .filter_map(|snap| match from_document(snap.data) {
                Ok(session) => Some(session),
                Err(e) => {
                    warn!(uid, id = %snap.id, error = %e, "Skipping malformed session");
                    None
                }
            })
            .collect())
    }

    pub async fn last_bonus_exercises(
        &self,
        identity: Option<&Identity>,
        workout_id: &str,
    ) -> PortResult<BonusHistory> {
        let filter = SessionFilter {
            workout_id: Some(workout_id.to_string()),
            status: Some(SessionStatus::Completed),
            limit: None,
        };
        let sessions = self.list(identity, &filter).await?;
        let latest = sessions
            .into_iter()
            .max_by_key(|s| s.completed_at.unwrap_or(s.started_at));
        Ok(match latest {
            Some(session) => BonusHistory {
                last_session_date: session.completed_at,
                bonus_exercises: session.bonus_exercises().into_iter().cloned().collect(),
            },
            None => BonusHistory::default(),
        })
    }

    pub async fn exercise_history(
        &self,
        identity: Option<&Identity>,
        workout_id: &str,
        exercise_name: &str,
    ) -> PortResult<Option<ExerciseHistory>> {
        let uid = require(identity)?;
        match self
            .db
            .get(&Self::history_path(uid, workout_id, exercise_name))
            .await?
        {
            Some(doc) => Ok(Some(from_document(doc)?)),
            None => Ok(None),
        }
    }

    /// Every history record of one workout, keyed by exercise name.
    pub async fn workout_history(
        &self,
        identity: Option<&Identity>,
        workout_id: &str,
    ) -> PortResult<BTreeMap<String, ExerciseHistory>> {
        let uid = require(identity)?;
        let query = Query::new().eq("workout_id", workout_id);
        let snapshots = self.db.query(&paths::exercise_history(uid), &query).await?;
        let mut histories = BTreeMap::new();
        for snap in snapshots {
            let history: ExerciseHistory = from_document(snap.data)?;
            histories.insert(history.exercise_name.clone(), history);
        }
        Ok(histories)
    }
}
