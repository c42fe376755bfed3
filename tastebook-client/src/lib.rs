//! Tastebook Client - data layer for the Tastebook restaurant tracker
//!
//! Talks to a hosted Postgres-style backend through [`RemoteStore`],
//! retries flaky calls with [`RetryExecutor`], and keeps per-view
//! [`CollectionStore`]s in sync with optimistic local updates.

pub mod client;
pub mod config;
pub mod error;
pub mod geocode;
pub mod logging;
pub mod network;
pub mod realtime;
pub mod remote;
pub mod retry;
pub mod services;
pub mod session;
pub mod store;
pub mod validation;

pub use client::TastebookClient;
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use geocode::{Geocoder, NominatimGeocoder, geocode_with_retry};
pub use network::NetworkStatus;
pub use realtime::watch_changes;
pub use remote::{
    AuthSession, AuthUser, Credentials, Filter, MemoryBackend, RemoteStore, RestBackend, Subscription,
};
pub use retry::{RetryExecutor, RetryPolicy, execute_with_retry};
pub use services::{CatalogService, FeedService, RestaurantService, ReviewService, SocialService};
pub use session::{ConnectivityMonitor, SessionManager};
pub use store::{
    AttributeFilters, CollectionQuery, CollectionSnapshot, CollectionStore, OwnerKey, RefreshOutcome,
    SortKey, StoreAccess,
};

// Re-export shared types for convenience
pub use shared::{
    ActivityItem, ActivityKind, ChangeEvent, ChangeKind, City, Collection, GeoPoint, Profile,
    Restaurant, RestaurantCreate, RestaurantPatch, RestaurantType, Review, ReviewCreate,
};
