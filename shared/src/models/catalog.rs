//! Catalog Models
//!
//! Restaurant types and cities are shared lookup tables maintained by admins.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RecordId;

/// Cuisine / venue type (e.g. "Ramen", "Tapas bar")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestaurantType {
    pub id: RecordId,
    pub name: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// City entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub id: RecordId,
    pub name: String,
    pub country: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Update payload shared by both catalog tables
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl RestaurantType {
    pub fn apply_patch(&mut self, patch: &CatalogPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
    }
}

impl City {
    pub fn apply_patch(&mut self, patch: &CatalogPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(country) = &patch.country {
            self.country = Some(country.clone());
        }
    }
}
