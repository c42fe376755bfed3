//! Where a store's rows come from

use async_trait::async_trait;
use std::sync::Arc;

use super::query::OwnerKey;
use super::record::Record;
use crate::error::ClientResult;
use crate::remote::{Filter, RemoteStore, decode_rows};

/// Fetches the full collection backing a store
#[async_trait]
pub trait CollectionSource<T>: Send + Sync {
    async fn fetch_all(&self, owner: &OwnerKey) -> ClientResult<Vec<T>>;
}

/// Source reading straight from the remote backend
#[derive(Clone)]
pub struct RemoteCollection {
    remote: Arc<dyn RemoteStore>,
}

impl RemoteCollection {
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        Self { remote }
    }
}

#[async_trait]
impl<T: Record> CollectionSource<T> for RemoteCollection {
    async fn fetch_all(&self, owner: &OwnerKey) -> ClientResult<Vec<T>> {
        let mut filter = Filter::new().order_by("created_at", false);
        if let (OwnerKey::User(user_id), Some(column)) = (owner, T::OWNER_COLUMN) {
            filter = filter.eq(column, user_id.to_string());
        }

        let rows = self.remote.query(T::COLLECTION, &filter).await?;
        tracing::debug!(collection = %T::COLLECTION, rows = rows.len(), "Fetched collection");
        decode_rows(rows)
    }
}
