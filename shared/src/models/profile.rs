//! Profile and Follow Models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{RecordId, UserId};

/// Public profile of a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Same id as the auth user
    pub id: UserId,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl Profile {
    /// Name to show in the UI
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }
}

/// Directed follow edge: `follower_id` follows `following_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Follow {
    pub id: RecordId,
    pub follower_id: UserId,
    pub following_id: UserId,
    pub created_at: DateTime<Utc>,
}
