//! Domain models
//!
//! Records owned by the hosted backend. The client only ever holds
//! non-authoritative copies of these.

pub mod activity;
pub mod catalog;
pub mod geo;
pub mod profile;
pub mod restaurant;
pub mod review;

pub use activity::{ActivityItem, ActivityKind};
pub use catalog::{CatalogPatch, City, RestaurantType};
pub use geo::{GeoPoint, PriceTier};
pub use profile::{Follow, Profile};
pub use restaurant::{Restaurant, RestaurantCreate, RestaurantPatch};
pub use review::{Review, ReviewCreate};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an authenticated user (auth provider uuid)
pub type UserId = uuid::Uuid;

/// Numeric primary key of a backend row
pub type RecordId = i64;

/// Remote tables the client reads and writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Restaurants,
    RestaurantTypes,
    Cities,
    Profiles,
    Follows,
    Reviews,
}

impl Collection {
    /// Table name on the backend
    pub const fn table(&self) -> &'static str {
        match self {
            Self::Restaurants => "restaurants",
            Self::RestaurantTypes => "restaurant_types",
            Self::Cities => "cities",
            Self::Profiles => "profiles",
            Self::Follows => "follows",
            Self::Reviews => "reviews",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}
