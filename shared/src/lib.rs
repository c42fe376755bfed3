//! Shared types for Tastebook
//!
//! Domain records mirrored from the hosted backend and the realtime
//! change messages it pushes to clients.

pub mod message;
pub mod models;

// Re-exports
pub use serde::{Deserialize, Serialize};

pub use message::{ChangeEvent, ChangeKind};
pub use models::{
    ActivityItem, ActivityKind, CatalogPatch, City, Collection, Follow, GeoPoint, PriceTier,
    Profile, RecordId, Restaurant, RestaurantCreate, RestaurantPatch, RestaurantType, Review,
    ReviewCreate, UserId,
};
