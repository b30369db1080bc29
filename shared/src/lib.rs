use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted task as returned to clients. `created_at` serializes as an
/// RFC 3339 timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub done: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TaskCreate {
    pub title: String,
    #[serde(default)]
    pub done: bool,
}

/// Partial update: only fields present in the body are applied.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub done: Option<bool>,
}
