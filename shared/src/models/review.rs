//! Review Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{RecordId, UserId};

/// A user's review of a restaurant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: RecordId,
    pub restaurant_id: RecordId,
    pub user_id: UserId,
    /// 0-10
    pub rating: f32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Create review payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewCreate {
    pub restaurant_id: RecordId,
    pub rating: f32,
    pub comment: Option<String>,
}
