//! Records held by collection stores

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use shared::{CatalogPatch, City, Collection, RecordId, Restaurant, RestaurantPatch, RestaurantType};

/// A row type that can be mirrored by a [`CollectionStore`](super::CollectionStore)
///
/// Attribute accessors default to `None`; a record without an attribute
/// never matches a filter on that attribute.
pub trait Record: Clone + Send + Sync + DeserializeOwned + 'static {
    /// Partial update merged by `update_local`
    type Patch: Send + Sync;

    const COLLECTION: Collection;

    /// Column scoping the collection to one user, if any
    const OWNER_COLUMN: Option<&'static str> = None;

    fn id(&self) -> RecordId;

    fn name(&self) -> &str;

    fn created_at(&self) -> Option<DateTime<Utc>>;

    /// Text searched by the free-text query
    fn search_fields(&self) -> Vec<&str> {
        vec![self.name()]
    }

    fn type_id(&self) -> Option<RecordId> {
        None
    }

    fn city_id(&self) -> Option<RecordId> {
        None
    }

    fn price(&self) -> Option<u8> {
        None
    }

    fn rating(&self) -> Option<f32> {
        None
    }

    fn to_try(&self) -> Option<bool> {
        None
    }

    fn apply_patch(&mut self, patch: &Self::Patch);
}

impl Record for Restaurant {
    type Patch = RestaurantPatch;

    const COLLECTION: Collection = Collection::Restaurants;
    const OWNER_COLUMN: Option<&'static str> = Some("user_id");

    fn id(&self) -> RecordId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        Some(self.created_at)
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str()];
        fields.extend(self.type_name.as_deref());
        fields.extend(self.city_name.as_deref());
        fields
    }

    fn type_id(&self) -> Option<RecordId> {
        self.type_id
    }

    fn city_id(&self) -> Option<RecordId> {
        self.city_id
    }

    fn price(&self) -> Option<u8> {
        self.price
    }

    fn rating(&self) -> Option<f32> {
        self.rating
    }

    fn to_try(&self) -> Option<bool> {
        Some(self.to_try)
    }

    fn apply_patch(&mut self, patch: &RestaurantPatch) {
        Restaurant::apply_patch(self, patch);
    }
}

impl Record for RestaurantType {
    type Patch = CatalogPatch;

    const COLLECTION: Collection = Collection::RestaurantTypes;

    fn id(&self) -> RecordId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    fn apply_patch(&mut self, patch: &CatalogPatch) {
        RestaurantType::apply_patch(self, patch);
    }
}

impl Record for City {
    type Patch = CatalogPatch;

    const COLLECTION: Collection = Collection::Cities;

    fn id(&self) -> RecordId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str()];
        fields.extend(self.country.as_deref());
        fields
    }

    fn apply_patch(&mut self, patch: &CatalogPatch) {
        City::apply_patch(self, patch);
    }
}
