use serde::Serialize;
use shared::{City, Collection, RecordId, RestaurantType};

use super::ServiceContext;
use crate::error::{ClientError, ClientResult};
use crate::remote::Filter;
use crate::store::{CollectionStore, Record};
use crate::validation::{MAX_NAME_LEN, validate_optional_text, validate_required_text};

#[derive(Serialize)]
struct NewType<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct NewCity<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    country: Option<&'a str>,
}

/// Shared lookup tables: restaurant types and cities
///
/// Anyone may read them; only admins may add or delete entries.
#[derive(Clone)]
pub struct CatalogService {
    ctx: ServiceContext,
}

impl CatalogService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    pub async fn list_types(&self) -> ClientResult<Vec<RestaurantType>> {
        self.ctx
            .fetch(Collection::RestaurantTypes, Filter::new().order_by("name", true))
            .await
    }

    pub async fn list_cities(&self) -> ClientResult<Vec<City>> {
        self.ctx
            .fetch(Collection::Cities, Filter::new().order_by("name", true))
            .await
    }

    pub async fn add_type(
        &self,
        store: &CollectionStore<RestaurantType>,
        name: &str,
    ) -> ClientResult<RestaurantType> {
        let name = name.trim();
        validate_required_text(name, "name", MAX_NAME_LEN)?;
        self.ctx.session().require_admin()?;
        self.ensure_unique::<RestaurantType>(name).await?;

        let created: RestaurantType = self
            .ctx
            .insert(Collection::RestaurantTypes, &NewType { name })
            .await?;
        tracing::info!(type_id = created.id, name, "Restaurant type added");

        store.add_local(created.clone());
        Ok(created)
    }

    pub async fn add_city(
        &self,
        store: &CollectionStore<City>,
        name: &str,
        country: Option<&str>,
    ) -> ClientResult<City> {
        let name = name.trim();
        let country = country.map(str::trim).filter(|c| !c.is_empty());
        validate_required_text(name, "name", MAX_NAME_LEN)?;
        validate_optional_text(country, "country", MAX_NAME_LEN)?;
        self.ctx.session().require_admin()?;
        self.ensure_unique::<City>(name).await?;

        let created: City = self
            .ctx
            .insert(Collection::Cities, &NewCity { name, country })
            .await?;
        tracing::info!(city_id = created.id, name, "City added");

        store.add_local(created.clone());
        Ok(created)
    }

    pub async fn delete_type(&self, store: &CollectionStore<RestaurantType>, id: RecordId) -> ClientResult<()> {
        self.ctx.session().require_admin()?;
        self.ctx.delete(Collection::RestaurantTypes, id).await?;
        tracing::info!(type_id = id, "Restaurant type deleted");
        store.remove_local(id);
        Ok(())
    }

    pub async fn delete_city(&self, store: &CollectionStore<City>, id: RecordId) -> ClientResult<()> {
        self.ctx.session().require_admin()?;
        self.ctx.delete(Collection::Cities, id).await?;
        tracing::info!(city_id = id, "City deleted");
        store.remove_local(id);
        Ok(())
    }

    /// Names are unique per table, ignoring case
    async fn ensure_unique<T: Record>(&self, name: &str) -> ClientResult<()> {
        let existing: Vec<T> = self
            .ctx
            .fetch(T::COLLECTION, Filter::new().ilike("name", name))
            .await?;
        if existing.iter().any(|row| row.name().trim().eq_ignore_ascii_case(name)) {
            return Err(ClientError::Conflict(format!("'{name}' already exists")));
        }
        Ok(())
    }
}
