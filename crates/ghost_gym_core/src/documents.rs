//! crates/ghost_gym_core/src/documents.rs
//!
//! Value types for the document database port: paths, field operations,
//! queries and write batches. Adapters share the pure helpers here so every
//! backend applies updates and evaluates filters identically.

use crate::ports::{PortError, PortResult};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// A stored document: a JSON object.
pub type Document = Map<String, Value>;

/// Address of one document, e.g. `users/u1/workouts` + `workout-1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocPath {
    pub collection: String,
    pub id: String,
}

impl DocPath {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

impl std::fmt::Display for DocPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// Collection names under a user's root document.
pub mod paths {
    use super::DocPath;

    pub const USERS: &str = "users";
    pub const GLOBAL_EXERCISES: &str = "global_exercises";

    pub fn user(uid: &str) -> DocPath {
        DocPath::new(USERS, uid)
    }

    pub fn workouts(uid: &str) -> String {
        format!("{}/{}/workouts", USERS, uid)
    }

    pub fn programs(uid: &str) -> String {
        format!("{}/{}/programs", USERS, uid)
    }

    pub fn custom_exercises(uid: &str) -> String {
        format!("{}/{}/custom_exercises", USERS, uid)
    }

    pub fn sessions(uid: &str) -> String {
        format!("{}/{}/workout_sessions", USERS, uid)
    }

    pub fn exercise_history(uid: &str) -> String {
        format!("{}/{}/exercise_history", USERS, uid)
    }

    /// Singleton documents such as `favorites` and `migration`.
    pub fn user_data(uid: &str, name: &str) -> DocPath {
        DocPath::new(format!("{}/{}/data", USERS, uid), name)
    }

    pub fn global_exercise(id: &str) -> DocPath {
        DocPath::new(GLOBAL_EXERCISES, id)
    }
}

/// A path into a document's nested maps. Segments are kept explicit so
/// keys containing dots (legacy favorites, exercise ids) stay addressable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    pub fn new<S: Into<String>>(segments: impl IntoIterator<Item = S>) -> Self {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Resolves the path inside `doc`.
    pub fn get<'a>(&self, doc: &'a Document) -> Option<&'a Value> {
        let (first, rest) = self.0.split_first()?;
        let mut current = doc.get(first)?;
        for segment in rest {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Mutable slot for the path, creating intermediate maps as needed.
    fn slot<'a>(&self, doc: &'a mut Document) -> Option<&'a mut Value> {
        let (last, parents) = self.0.split_last()?;
        let mut current = doc;
        for segment in parents {
            let entry = current
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            current = entry.as_object_mut()?;
        }
        Some(current.entry(last.clone()).or_insert(Value::Null))
    }

    fn remove(&self, doc: &mut Document) {
        let Some((last, parents)) = self.0.split_last() else {
            return;
        };
        let mut current = doc;
        for segment in parents {
            match current.get_mut(segment).and_then(Value::as_object_mut) {
                Some(next) => current = next,
                None => return,
            }
        }
        current.remove(last);
    }
}

/// Dotted shorthand for paths whose segments contain no dots.
impl From<&str> for FieldPath {
    fn from(dotted: &str) -> Self {
        Self::new(dotted.split('.'))
    }
}

impl std::fmt::Display for FieldPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

/// A single-field mutation, applied atomically with the others in the
/// same `update` call.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
    Set(FieldPath, Value),
    Delete(FieldPath),
    /// Adds to a numeric field; missing or non-numeric fields start at zero.
    Increment(FieldPath, i64),
    /// Appends the values not already present.
    ArrayUnion(FieldPath, Vec<Value>),
    ArrayRemove(FieldPath, Vec<Value>),
}

impl FieldOp {
    pub fn set(path: impl Into<FieldPath>, value: impl Into<Value>) -> Self {
        FieldOp::Set(path.into(), value.into())
    }

    pub fn increment(path: impl Into<FieldPath>, by: i64) -> Self {
        FieldOp::Increment(path.into(), by)
    }
}

pub fn apply_ops(doc: &mut Document, ops: &[FieldOp]) {
    for op in ops {
        match op {
            FieldOp::Set(path, value) => {
                if let Some(slot) = path.slot(doc) {
                    *slot = value.clone();
                }
            }
            FieldOp::Delete(path) => path.remove(doc),
            FieldOp::Increment(path, by) => {
                if let Some(slot) = path.slot(doc) {
                    *slot = match slot.as_i64() {
                        Some(current) => Value::from(current + by),
                        None => match slot.as_f64() {
                            Some(current) => Value::from(current + *by as f64),
                            None => Value::from(*by),
                        },
                    };
                }
            }
            FieldOp::ArrayUnion(path, values) => {
                if let Some(slot) = path.slot(doc) {
                    if !slot.is_array() {
                        *slot = Value::Array(Vec::new());
                    }
                    if let Some(items) = slot.as_array_mut() {
                        for value in values {
                            if !items.contains(value) {
                                items.push(value.clone());
                            }
                        }
                    }
                }
            }
            FieldOp::ArrayRemove(path, values) => {
                if let Some(slot) = path.slot(doc) {
                    match slot.as_array_mut() {
                        Some(items) => items.retain(|item| !values.contains(item)),
                        None => *slot = Value::Array(Vec::new()),
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(FieldPath, Value),
    ArrayContains(FieldPath, Value),
    ArrayContainsAny(FieldPath, Vec<Value>),
}

impl Filter {
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::Eq(path, expected) => path.get(doc) == Some(expected),
            Filter::ArrayContains(path, expected) => path
                .get(doc)
                .and_then(Value::as_array)
                .is_some_and(|items| items.contains(expected)),
            Filter::ArrayContainsAny(path, expected) => path
                .get(doc)
                .and_then(Value::as_array)
                .is_some_and(|items| items.iter().any(|i| expected.contains(i))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: FieldPath,
    pub descending: bool,
}

/// Conjunctive filters with optional ordering and limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn eq(self, field: impl Into<FieldPath>, value: impl Into<Value>) -> Self {
        self.filter(Filter::Eq(field.into(), value.into()))
    }

    pub fn order_by(mut self, field: impl Into<FieldPath>, descending: bool) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            descending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.filters.iter().all(|f| f.matches(doc))
    }

    /// Filters, orders and truncates an unordered candidate set. Documents
    /// missing the order field sort last; ties keep their input order.
    pub fn evaluate(&self, candidates: Vec<DocumentSnapshot>) -> Vec<DocumentSnapshot> {
        let mut hits: Vec<_> = candidates.into_iter().filter(|s| self.matches(&s.data)).collect();
        if let Some(order) = &self.order_by {
            hits.sort_by(|a, b| {
                match (order.field.get(&a.data), order.field.get(&b.data)) {
                    (Some(x), Some(y)) => {
                        let ord = compare_values(x, y);
                        if order.descending {
                            ord.reverse()
                        } else {
                            ord
                        }
                    }
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                }
            });
        }
        if let Some(limit) = self.limit {
            hits.truncate(limit);
        }
        hits
    }
}

/// Orders numbers numerically, timestamps chronologically and other
/// strings lexicographically. Mixed kinds compare equal.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            _ => Ordering::Equal,
        },
        (Value::String(x), Value::String(y)) => {
            match (x.parse::<DateTime<Utc>>(), y.parse::<DateTime<Utc>>()) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                _ => x.cmp(y),
            }
        }
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

/// A document returned from a query, with its id.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    pub id: String,
    pub data: Document,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    Set(DocPath, Document),
    /// Field operations on a document, creating it when missing.
    Update(DocPath, Vec<FieldOp>),
    Delete(DocPath),
}

/// Writes committed all-or-nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    pub writes: Vec<Write>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, path: DocPath, doc: Document) -> &mut Self {
        self.writes.push(Write::Set(path, doc));
        self
    }

    pub fn update(&mut self, path: DocPath, ops: Vec<FieldOp>) -> &mut Self {
        self.writes.push(Write::Update(path, ops));
        self
    }

    pub fn delete(&mut self, path: DocPath) -> &mut Self {
        self.writes.push(Write::Delete(path));
        self
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

/// Serializes an entity into a document. Entities that are not JSON
/// objects are rejected.
pub fn to_document<T: Serialize>(value: &T) -> PortResult<Document> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(PortError::Unexpected(format!(
            "expected a JSON object, got {}",
            other
        ))),
        Err(e) => Err(PortError::Unexpected(e.to_string())),
    }
}

pub fn from_document<T: DeserializeOwned>(doc: Document) -> PortResult<T> {
    serde_json::from_value(Value::Object(doc)).map_err(|e| PortError::Unexpected(e.to_string()))
}
