//! Activity feed items
//!
//! Feed entries are assembled client-side from the restaurants and reviews
//! of followed users; they are never stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{RecordId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    /// Added a restaurant they visited
    Visited,
    /// Added a restaurant to their "to try" list
    WantsToTry,
    /// Reviewed a restaurant
    Reviewed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityItem {
    pub kind: ActivityKind,
    pub actor_id: UserId,
    pub actor_name: String,
    pub restaurant_id: RecordId,
    pub restaurant_name: Option<String>,
    pub rating: Option<f32>,
    pub occurred_at: DateTime<Utc>,
}
