use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One university on a student's list. Keyed by (user_id, university_id);
/// removal is a hard delete.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CollegeListItem {
    pub user_id: String,
    pub university_id: String,
    /// "favorites" | "applied" | ...
    pub status: String,
    pub intended_major: Option<String>,
    /// Display sequencing, ascending.
    #[serde(rename = "order")]
    pub display_order: i32,
    pub added_at: DateTime<Utc>,
}
