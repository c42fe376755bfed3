//! Domain services
//!
//! Every mutation follows the same order: validate locally, check
//! authorization, run the remote call through the retry executor, and only
//! then patch the caller's store. A failure at any step leaves the store
//! untouched.

mod catalog;
mod feed;
mod restaurants;
mod reviews;
mod social;

pub use catalog::CatalogService;
pub use feed::{DEFAULT_FEED_LIMIT, FeedService};
pub use restaurants::RestaurantService;
pub use reviews::ReviewService;
pub use social::SocialService;

use serde::Serialize;
use serde::de::DeserializeOwned;
use shared::{Collection, RecordId};
use std::sync::Arc;

use crate::error::ClientResult;
use crate::remote::{Filter, RemoteStore, decode_row, decode_rows, encode_row};
use crate::retry::RetryExecutor;
use crate::session::SessionManager;

/// Shared plumbing handed to every service
#[derive(Clone)]
pub struct ServiceContext {
    remote: Arc<dyn RemoteStore>,
    executor: RetryExecutor,
    session: SessionManager,
}

impl ServiceContext {
    pub fn new(remote: Arc<dyn RemoteStore>, executor: RetryExecutor, session: SessionManager) -> Self {
        Self {
            remote,
            executor,
            session,
        }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn executor(&self) -> &RetryExecutor {
        &self.executor
    }

    /// Query and decode rows
    pub(crate) async fn fetch<T: DeserializeOwned>(
        &self,
        collection: Collection,
        filter: Filter,
    ) -> ClientResult<Vec<T>> {
        let remote = &self.remote;
        let filter = &filter;
        let rows = self
            .executor
            .execute(|| remote.query(collection, filter))
            .await?;
        decode_rows(rows)
    }

    /// First row matching `filter`
    pub(crate) async fn fetch_one<T: DeserializeOwned>(
        &self,
        collection: Collection,
        filter: Filter,
    ) -> ClientResult<Option<T>> {
        let rows: Vec<T> = self.fetch(collection, filter.limit(1)).await?;
        Ok(rows.into_iter().next())
    }

    pub(crate) async fn insert<T: DeserializeOwned>(
        &self,
        collection: Collection,
        payload: &impl Serialize,
    ) -> ClientResult<T> {
        let row = encode_row(payload)?;
        let remote = &self.remote;
        let stored = self
            .executor
            .execute(|| remote.insert(collection, row.clone()))
            .await?;
        decode_row(stored)
    }

    pub(crate) async fn update<T: DeserializeOwned>(
        &self,
        collection: Collection,
        id: RecordId,
        patch: &impl Serialize,
    ) -> ClientResult<T> {
        let row = encode_row(patch)?;
        let remote = &self.remote;
        let stored = self
            .executor
            .execute(|| remote.update(collection, id, row.clone()))
            .await?;
        decode_row(stored)
    }

    pub(crate) async fn delete(&self, collection: Collection, id: RecordId) -> ClientResult<()> {
        let remote = &self.remote;
        self.executor
            .execute(|| remote.delete(collection, id))
            .await
    }
}
