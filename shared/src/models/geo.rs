//! Geographic and pricing value types

use serde::{Deserialize, Serialize};

/// Latitude / longitude pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Both components within WGS84 bounds
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Price tier, rendered as "$" to "$$$$"
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PriceTier(u8);

impl PriceTier {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 4;

    /// Returns `None` outside 1..=4
    pub fn new(tier: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&tier).then_some(Self(tier))
    }

    pub const fn value(&self) -> u8 {
        self.0
    }

    pub fn symbol(&self) -> String {
        "$".repeat(usize::from(self.0))
    }
}
