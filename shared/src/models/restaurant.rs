//! Restaurant Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{GeoPoint, RecordId, UserId};

/// A restaurant entry in a user's catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: RecordId,
    /// Owner of this entry
    pub user_id: UserId,
    pub name: String,
    pub type_id: Option<RecordId>,
    pub city_id: Option<RecordId>,

    // -- Denormalized names (joined by the backend view) --
    #[serde(default)]
    pub type_name: Option<String>,
    #[serde(default)]
    pub city_name: Option<String>,

    /// Price tier 1-4
    pub price: Option<u8>,
    /// Rating 0-10
    pub rating: Option<f32>,
    pub notes: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// On the "want to try" list rather than visited
    #[serde(default)]
    pub to_try: bool,
    pub visited_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Restaurant {
    /// Coordinates, when both halves are known
    pub fn location(&self) -> Option<GeoPoint> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoPoint::new(latitude, longitude)),
            _ => None,
        }
    }

    /// Shallow-merge the set fields of a patch into this entry
    pub fn apply_patch(&mut self, patch: &RestaurantPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(type_id) = patch.type_id {
            self.type_id = Some(type_id);
        }
        if let Some(type_name) = &patch.type_name {
            self.type_name = Some(type_name.clone());
        }
        if let Some(city_id) = patch.city_id {
            self.city_id = Some(city_id);
        }
        if let Some(city_name) = &patch.city_name {
            self.city_name = Some(city_name.clone());
        }
        if let Some(price) = patch.price {
            self.price = Some(price);
        }
        if let Some(rating) = patch.rating {
            self.rating = Some(rating);
        }
        if let Some(notes) = &patch.notes {
            self.notes = Some(notes.clone());
        }
        if let Some(address) = &patch.address {
            self.address = Some(address.clone());
        }
        if let Some(latitude) = patch.latitude {
            self.latitude = Some(latitude);
        }
        if let Some(longitude) = patch.longitude {
            self.longitude = Some(longitude);
        }
        if let Some(to_try) = patch.to_try {
            self.to_try = to_try;
        }
        if let Some(visited_at) = patch.visited_at {
            self.visited_at = Some(visited_at);
        }
    }
}

/// Create restaurant payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RestaurantCreate {
    pub name: String,
    pub type_id: Option<RecordId>,
    pub city_id: Option<RecordId>,
    pub price: Option<u8>,
    pub rating: Option<f32>,
    pub notes: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(default)]
    pub to_try: bool,
    pub visited_at: Option<DateTime<Utc>>,
}

impl RestaurantCreate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Update restaurant payload
///
/// Only the fields that are `Some` are sent and merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RestaurantPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_id: Option<RecordId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city_id: Option<RecordId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_try: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visited_at: Option<DateTime<Utc>>,
}

impl RestaurantPatch {
    /// True when no field would change
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Restaurant {
        Restaurant {
            id: 1,
            user_id: UserId::nil(),
            name: "Casa Lucio".to_string(),
            type_id: Some(2),
            city_id: None,
            type_name: Some("Spanish".to_string()),
            city_name: None,
            price: Some(3),
            rating: None,
            notes: None,
            address: None,
            latitude: None,
            longitude: None,
            to_try: true,
            visited_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_apply_patch_merges_only_set_fields() {
        let mut restaurant = sample();
        let patch = RestaurantPatch {
            rating: Some(9.0),
            to_try: Some(false),
            ..Default::default()
        };
        restaurant.apply_patch(&patch);

        assert_eq!(restaurant.rating, Some(9.0));
        assert!(!restaurant.to_try);
        assert_eq!(restaurant.name, "Casa Lucio");
        assert_eq!(restaurant.price, Some(3));
    }

    #[test]
    fn test_patch_serializes_sparse() {
        let patch = RestaurantPatch {
            name: Some("Renamed".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({ "name": "Renamed" }));
        assert!(RestaurantPatch::default().is_empty());
    }

    #[test]
    fn test_location_requires_both_coordinates() {
        let mut restaurant = sample();
        restaurant.latitude = Some(40.4);
        assert!(restaurant.location().is_none());
        restaurant.longitude = Some(-3.7);
        assert_eq!(restaurant.location(), Some(GeoPoint::new(40.4, -3.7)));
    }
}
