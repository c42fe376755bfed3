use chrono::Utc;
use serde::Serialize;
use shared::{Collection, RecordId, Restaurant, RestaurantCreate, RestaurantPatch, UserId};
use std::sync::Arc;

use super::ServiceContext;
use crate::error::{ClientError, ClientResult};
use crate::geocode::{Geocoder, geocode_with_retry};
use crate::remote::Filter;
use crate::store::CollectionStore;
use crate::validation::{validate_rating, validate_restaurant_create, validate_restaurant_patch};

/// Insert payload: the create form plus its owner
#[derive(Serialize)]
struct NewRestaurant<'a> {
    user_id: UserId,
    #[serde(flatten)]
    input: &'a RestaurantCreate,
}

/// Restaurant catalog of the signed-in user
#[derive(Clone)]
pub struct RestaurantService {
    ctx: ServiceContext,
    geocoder: Arc<dyn Geocoder>,
}

impl RestaurantService {
    pub fn new(ctx: ServiceContext, geocoder: Arc<dyn Geocoder>) -> Self {
        Self { ctx, geocoder }
    }

    pub async fn get(&self, id: RecordId) -> ClientResult<Restaurant> {
        self.ctx
            .fetch_one(Collection::Restaurants, Filter::new().eq("id", id))
            .await?
            .ok_or_else(|| ClientError::not_found(format!("restaurant {id}")))
    }

    /// Add a restaurant and prepend it to `store`
    pub async fn create(
        &self,
        store: &CollectionStore<Restaurant>,
        mut input: RestaurantCreate,
    ) -> ClientResult<Restaurant> {
        input.name = input.name.trim().to_string();
        validate_restaurant_create(&input)?;
        let user_id = self.ctx.session().require_user()?;

        if self.name_taken(user_id, &input.name, None).await? {
            return Err(ClientError::Conflict(format!(
                "you already have a restaurant named '{}'",
                input.name
            )));
        }

        if input.latitude.is_none()
            && let Some(address) = input.address.as_deref()
            && let Some(point) = self.locate(address).await
        {
            input.latitude = Some(point.latitude);
            input.longitude = Some(point.longitude);
        }

        let payload = NewRestaurant {
            user_id,
            input: &input,
        };
        let created: Restaurant = self.ctx.insert(Collection::Restaurants, &payload).await?;
        tracing::info!(restaurant_id = created.id, name = %created.name, "Restaurant created");

        store.add_local(created.clone());
        Ok(created)
    }

    /// Patch one of the user's restaurants
    pub async fn update(
        &self,
        store: &CollectionStore<Restaurant>,
        id: RecordId,
        mut patch: RestaurantPatch,
    ) -> ClientResult<Restaurant> {
        if let Some(name) = &mut patch.name {
            *name = name.trim().to_string();
        }
        validate_restaurant_patch(&patch)?;
        let existing = self.owned(id).await?;

        if let Some(name) = &patch.name
            && !name.eq_ignore_ascii_case(&existing.name)
            && self.name_taken(existing.user_id, name, Some(id)).await?
        {
            return Err(ClientError::Conflict(format!(
                "you already have a restaurant named '{name}'"
            )));
        }

        if patch.latitude.is_none()
            && let Some(address) = patch.address.as_deref()
            && let Some(point) = self.locate(address).await
        {
            patch.latitude = Some(point.latitude);
            patch.longitude = Some(point.longitude);
        }

        let updated: Restaurant = self.ctx.update(Collection::Restaurants, id, &patch).await?;
        tracing::info!(restaurant_id = id, "Restaurant updated");

        // The backend's row carries derived columns the patch does not
        store.replace_local(updated.clone());
        Ok(updated)
    }

    /// Delete one of the user's restaurants
    pub async fn delete(&self, store: &CollectionStore<Restaurant>, id: RecordId) -> ClientResult<()> {
        self.owned(id).await?;
        self.ctx.delete(Collection::Restaurants, id).await?;
        tracing::info!(restaurant_id = id, "Restaurant deleted");

        store.remove_local(id);
        Ok(())
    }

    /// Move a "to try" entry to visited, optionally rating it
    pub async fn mark_visited(
        &self,
        store: &CollectionStore<Restaurant>,
        id: RecordId,
        rating: Option<f32>,
    ) -> ClientResult<Restaurant> {
        validate_rating(rating)?;
        let patch = RestaurantPatch {
            to_try: Some(false),
            visited_at: Some(Utc::now()),
            rating,
            ..Default::default()
        };
        self.update(store, id, patch).await
    }

    /// The restaurant with `id`, if the signed-in user owns it
    async fn owned(&self, id: RecordId) -> ClientResult<Restaurant> {
        let user_id = self.ctx.session().require_user()?;
        let restaurant = self.get(id).await?;
        if restaurant.user_id != user_id {
            return Err(ClientError::forbidden("only the owner can change this restaurant"));
        }
        Ok(restaurant)
    }

    async fn name_taken(&self, user_id: UserId, name: &str, except: Option<RecordId>) -> ClientResult<bool> {
        let filter = Filter::new()
            .eq("user_id", user_id.to_string())
            .ilike("name", name);
        let candidates: Vec<Restaurant> = self.ctx.fetch(Collection::Restaurants, filter).await?;
        Ok(candidates
            .iter()
            .any(|r| Some(r.id) != except && r.name.trim().eq_ignore_ascii_case(name)))
    }

    /// Geocoding never blocks a write; failures leave coordinates unset
    async fn locate(&self, address: &str) -> Option<shared::GeoPoint> {
        match geocode_with_retry(self.geocoder.as_ref(), self.ctx.executor(), address).await {
            Ok(point) => point,
            Err(e) => {
                tracing::warn!(address, error = %e, "Geocoding failed, saving without coordinates");
                None
            }
        }
    }
}
