//! Client facade
//!
//! [`TastebookClient`] wires the backend, geocoder, session, services and
//! stores together so an application holds a single handle.

use shared::{ChangeKind, City, Restaurant, RestaurantType, UserId};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::config::ClientConfig;
use crate::error::ClientResult;
use crate::geocode::{Geocoder, NominatimGeocoder};
use crate::network::NetworkStatus;
use crate::realtime::watch_changes;
use crate::remote::{RemoteStore, RestBackend};
use crate::retry::RetryExecutor;
use crate::services::{
    CatalogService, FeedService, RestaurantService, ReviewService, ServiceContext, SocialService,
};
use crate::session::{ConnectivityMonitor, SessionManager};
use crate::store::{CollectionQuery, CollectionStore, OwnerKey, Record, RemoteCollection, StoreAccess};

pub struct TastebookClient {
    config: ClientConfig,
    remote: Arc<dyn RemoteStore>,
    network: NetworkStatus,
    executor: RetryExecutor,
    session: SessionManager,
    connectivity: ConnectivityMonitor,
    restaurants: RestaurantService,
    catalog: CatalogService,
    social: SocialService,
    reviews: ReviewService,
    feed: FeedService,
}

impl TastebookClient {
    /// Client over the hosted backend and the configured geocoder
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let network = NetworkStatus::new();
        let remote = Arc::new(RestBackend::new(&config, network.clone())?);
        let geocoder = Arc::new(NominatimGeocoder::new(&config, network.clone())?);
        Ok(Self::with_backends(config, remote, geocoder, network))
    }

    /// Client over caller-supplied backends
    pub fn with_backends(
        config: ClientConfig,
        remote: Arc<dyn RemoteStore>,
        geocoder: Arc<dyn Geocoder>,
        network: NetworkStatus,
    ) -> Self {
        let executor = RetryExecutor::new(config.retry);
        let session = SessionManager::new(
            remote.clone(),
            executor,
            network.clone(),
            config.session_refresh_interval,
        );
        let ctx = ServiceContext::new(remote.clone(), executor, session.clone());
        let social = SocialService::new(ctx.clone());

        Self {
            restaurants: RestaurantService::new(ctx.clone(), geocoder),
            catalog: CatalogService::new(ctx.clone()),
            reviews: ReviewService::new(ctx.clone()),
            feed: FeedService::new(ctx, social.clone()),
            social,
            connectivity: ConnectivityMonitor::new(network.clone()),
            config,
            remote,
            network,
            executor,
            session,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn network(&self) -> &NetworkStatus {
        &self.network
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    pub fn restaurants(&self) -> &RestaurantService {
        &self.restaurants
    }

    pub fn catalog(&self) -> &CatalogService {
        &self.catalog
    }

    pub fn social(&self) -> &SocialService {
        &self.social
    }

    pub fn reviews(&self) -> &ReviewService {
        &self.reviews
    }

    pub fn feed(&self) -> &FeedService {
        &self.feed
    }

    // ========== Stores ==========

    /// Store for a user's restaurants; writable only by that user
    pub fn restaurant_store(&self, owner: UserId) -> CollectionStore<Restaurant> {
        self.store(CollectionQuery::for_user(owner))
    }

    pub fn type_store(&self) -> CollectionStore<RestaurantType> {
        self.store(CollectionQuery::shared())
    }

    pub fn city_store(&self) -> CollectionStore<City> {
        self.store(CollectionQuery::shared())
    }

    /// New store for `query`, registered with the connectivity monitor
    pub fn store<T: Record>(&self, query: CollectionQuery) -> CollectionStore<T> {
        let access = self.access_for(&query.owner);
        let store = CollectionStore::new(
            Arc::new(RemoteCollection::new(self.remote.clone())),
            query,
            access,
            self.executor,
        );
        self.connectivity.register(Arc::new(store.clone()));
        store
    }

    /// Write access of the signed-in viewer over `owner`'s collection
    pub fn access_for(&self, owner: &OwnerKey) -> StoreAccess {
        match owner {
            OwnerKey::User(id) if self.session.current_user_id() == Some(*id) => StoreAccess::Owner,
            _ => StoreAccess::resolve(owner, self.session.profile().as_ref()),
        }
    }

    /// Refresh `store` whenever its collection changes remotely
    pub fn watch<T: Record>(&self, store: &CollectionStore<T>) -> ClientResult<JoinHandle<()>> {
        let subscription = self.remote.subscribe(T::COLLECTION, &ChangeKind::ALL)?;
        Ok(watch_changes(store.clone(), subscription))
    }

    /// Start reacting to connectivity transitions
    pub fn start_connectivity(&self) -> JoinHandle<()> {
        self.connectivity.spawn()
    }

    /// Stop background work
    pub fn shutdown(&self) {
        self.session.stop_refresh_loop();
        self.connectivity.shutdown();
        tracing::info!("Client shut down");
    }
}
