// tastebook-client/tests/services_integration.rs
// Domain services over the in-memory backend

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tastebook_client::remote::{Fault, MemoryOp};
use tastebook_client::{
    ActivityKind, ClientConfig, ClientError, ClientResult, Collection, Credentials, GeoPoint,
    Geocoder, MemoryBackend, RestaurantCreate, RestaurantPatch, RetryPolicy, ReviewCreate,
    TastebookClient,
};
use uuid::Uuid;

/// Geocoder answering with a fixed point, or failing every call
struct StubGeocoder {
    point: Option<GeoPoint>,
    fail: bool,
    calls: AtomicUsize,
}

impl StubGeocoder {
    fn found(point: GeoPoint) -> Self {
        Self {
            point: Some(point),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    fn broken() -> Self {
        Self {
            point: None,
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Geocoder for StubGeocoder {
    async fn lookup(&self, _address: &str) -> ClientResult<Option<GeoPoint>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ClientError::Validation("geocoder rejected query".into()));
        }
        Ok(self.point)
    }
}

fn client_with(backend: &MemoryBackend, geocoder: Arc<StubGeocoder>) -> TastebookClient {
    TastebookClient::with_backends(
        ClientConfig::default().with_retry_policy(RetryPolicy::no_retry()),
        Arc::new(backend.clone()),
        geocoder,
        backend.network().clone(),
    )
}

async fn sign_in(client: &TastebookClient, email: &str) {
    client
        .session()
        .sign_in(Credentials::new(email, "secret1"))
        .await
        .unwrap();
}

async fn user(backend: &MemoryBackend, name: &str) -> (TastebookClient, Uuid) {
    let email = format!("{name}@example.com");
    let id = backend.register_user(&email, "secret1", name);
    let client = client_with(backend, Arc::new(StubGeocoder::found(GeoPoint::new(0.0, 0.0))));
    sign_in(&client, &email).await;
    (client, id)
}

#[tokio::test]
async fn test_create_geocodes_missing_coordinates() {
    let backend = MemoryBackend::new();
    backend.register_user("ana@example.com", "secret1", "ana");
    let geocoder = Arc::new(StubGeocoder::found(GeoPoint::new(38.7223, -9.1393)));
    let client = client_with(&backend, geocoder.clone());
    sign_in(&client, "ana@example.com").await;
    let user_id = client.session().require_user().unwrap();
    let store = client.restaurant_store(user_id);

    let mut input = RestaurantCreate::new("Cervejaria Ramiro");
    input.address = Some("Av. Almirante Reis 1, Lisboa".into());
    let created = client.restaurants().create(&store, input).await.unwrap();

    assert_eq!(geocoder.calls.load(Ordering::SeqCst), 1);
    assert_eq!(created.location(), Some(GeoPoint::new(38.7223, -9.1393)));
    assert_eq!(store.total_count(), 1);

    // Explicit coordinates skip the lookup
    let mut input = RestaurantCreate::new("Taberna");
    input.address = Some("Rua da Rosa 1".into());
    input.latitude = Some(38.71);
    input.longitude = Some(-9.14);
    client.restaurants().create(&store, input).await.unwrap();
    assert_eq!(geocoder.calls.load(Ordering::SeqCst), 1);
    client.shutdown();
}

#[tokio::test]
async fn test_geocoder_failure_does_not_block_create() {
    let backend = MemoryBackend::new();
    backend.register_user("ana@example.com", "secret1", "ana");
    let client = client_with(&backend, Arc::new(StubGeocoder::broken()));
    sign_in(&client, "ana@example.com").await;
    let store = client.restaurant_store(client.session().require_user().unwrap());

    let mut input = RestaurantCreate::new("Somewhere");
    input.address = Some("Nowhere street".into());
    let created = client.restaurants().create(&store, input).await.unwrap();
    assert!(created.location().is_none());
    assert_eq!(store.total_count(), 1);
    client.shutdown();
}

#[tokio::test]
async fn test_update_and_mark_visited_patch_store() {
    let backend = MemoryBackend::new();
    let (client, user_id) = user(&backend, "ana").await;
    let store = client.restaurant_store(user_id);

    let mut input = RestaurantCreate::new("Sushi Ko");
    input.to_try = true;
    let created = client.restaurants().create(&store, input).await.unwrap();

    // A column filled in on the backend side, unknown to the local entry
    let remote: Arc<dyn tastebook_client::RemoteStore> = Arc::new(backend.clone());
    remote
        .update(Collection::Restaurants, created.id, json!({"type_name": "Sushi bar"}))
        .await
        .unwrap();
    assert_eq!(store.get(created.id).unwrap().type_name, None);

    let patch = RestaurantPatch {
        notes: Some("omakase only".into()),
        ..Default::default()
    };
    let updated = client.restaurants().update(&store, created.id, patch).await.unwrap();
    let local = store.get(created.id).unwrap();
    assert_eq!(local, updated);
    assert_eq!(local.notes.as_deref(), Some("omakase only"));
    assert_eq!(local.type_name.as_deref(), Some("Sushi bar"));
    assert_eq!(store.total_count(), 1);

    let visited = client
        .restaurants()
        .mark_visited(&store, created.id, Some(9.0))
        .await
        .unwrap();
    assert!(!visited.to_try);
    assert!(visited.visited_at.is_some());
    let local = store.get(created.id).unwrap();
    assert_eq!(local, visited);
    assert!(!local.to_try);
    assert_eq!(local.rating, Some(9.0));

    let empty = client
        .restaurants()
        .update(&store, created.id, RestaurantPatch::default())
        .await;
    assert!(matches!(empty, Err(ClientError::Validation(_))));
    assert!(matches!(
        client.restaurants().mark_visited(&store, created.id, Some(11.0)).await,
        Err(ClientError::Validation(_))
    ));
    client.shutdown();
}

#[tokio::test]
async fn test_delete_removes_from_store_and_backend() {
    let backend = MemoryBackend::new();
    let (client, user_id) = user(&backend, "ana").await;
    let store = client.restaurant_store(user_id);
    let created = client
        .restaurants()
        .create(&store, RestaurantCreate::new("Gone Soon"))
        .await
        .unwrap();

    client.restaurants().delete(&store, created.id).await.unwrap();
    assert_eq!(store.total_count(), 0);
    assert!(backend.rows(Collection::Restaurants).is_empty());

    let again = client.restaurants().delete(&store, created.id).await;
    assert!(matches!(again, Err(ClientError::NotFound(_))));
    client.shutdown();
}

#[tokio::test]
async fn test_catalog_writes_require_admin() {
    let backend = MemoryBackend::new();
    let (client, user_id) = user(&backend, "ana").await;
    let types = client.type_store();

    let denied = client.catalog().add_type(&types, "Ramen").await;
    assert!(matches!(denied, Err(ClientError::Forbidden(_))));
    assert_eq!(backend.calls(MemoryOp::Insert), 0);

    backend.set_admin(user_id, true);
    client.session().sign_out().await.unwrap();
    sign_in(&client, "ana@example.com").await;
    let types = client.type_store();
    let cities = client.city_store();

    let ramen = client.catalog().add_type(&types, "Ramen").await.unwrap();
    assert_eq!(types.total_count(), 1);
    let duplicate = client.catalog().add_type(&types, " ramen ").await;
    assert!(matches!(duplicate, Err(ClientError::Conflict(_))));

    let porto = client
        .catalog()
        .add_city(&cities, "Porto", Some("Portugal"))
        .await
        .unwrap();
    assert_eq!(porto.country.as_deref(), Some("Portugal"));
    assert_eq!(client.catalog().list_cities().await.unwrap().len(), 1);

    client.catalog().delete_type(&types, ramen.id).await.unwrap();
    assert_eq!(types.total_count(), 0);
    assert!(client.catalog().list_types().await.unwrap().is_empty());
    client.shutdown();
}

#[tokio::test]
async fn test_follow_rules() {
    let backend = MemoryBackend::new();
    let (ana, ana_id) = user(&backend, "ana").await;
    let bo_id = backend.register_user("bo@example.com", "secret1", "bo");

    assert!(matches!(ana.social().follow(ana_id).await, Err(ClientError::Validation(_))));
    assert!(matches!(
        ana.social().follow(Uuid::new_v4()).await,
        Err(ClientError::NotFound(_))
    ));

    ana.social().follow(bo_id).await.unwrap();
    assert!(ana.social().is_following(bo_id).await.unwrap());
    assert!(matches!(ana.social().follow(bo_id).await, Err(ClientError::Conflict(_))));

    let followers = ana.social().followers(bo_id).await.unwrap();
    assert_eq!(followers.len(), 1);
    assert_eq!(followers[0].id, ana_id);
    let following = ana.social().following(ana_id).await.unwrap();
    assert_eq!(following[0].username, "bo");

    let hits = ana.social().search_profiles("B").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert!(ana.social().search_profiles("  ").await.unwrap().is_empty());

    ana.social().unfollow(bo_id).await.unwrap();
    assert!(!ana.social().is_following(bo_id).await.unwrap());
    assert!(matches!(ana.social().unfollow(bo_id).await, Err(ClientError::NotFound(_))));
    ana.shutdown();
}

#[tokio::test]
async fn test_reviews_one_per_user_and_author_only_delete() {
    let backend = MemoryBackend::new();
    let (ana, ana_id) = user(&backend, "ana").await;
    let store = ana.restaurant_store(ana_id);
    let place = ana
        .restaurants()
        .create(&store, RestaurantCreate::new("Noma"))
        .await
        .unwrap();

    let review = ana
        .reviews()
        .add_review(ReviewCreate {
            restaurant_id: place.id,
            rating: 9.5,
            comment: Some("  worth it  ".into()),
        })
        .await
        .unwrap();
    assert_eq!(review.comment.as_deref(), Some("worth it"));

    let second = ana
        .reviews()
        .add_review(ReviewCreate {
            restaurant_id: place.id,
            rating: 8.0,
            comment: None,
        })
        .await;
    assert!(matches!(second, Err(ClientError::Conflict(_))));

    let missing = ana
        .reviews()
        .add_review(ReviewCreate {
            restaurant_id: 9999,
            rating: 8.0,
            comment: None,
        })
        .await;
    assert!(matches!(missing, Err(ClientError::NotFound(_))));

    let (bo, _) = user(&backend, "bo").await;
    assert!(matches!(
        bo.reviews().delete_review(review.id).await,
        Err(ClientError::Forbidden(_))
    ));
    assert_eq!(ana.reviews().reviews_for(place.id).await.unwrap().len(), 1);

    ana.reviews().delete_review(review.id).await.unwrap();
    assert!(ana.reviews().reviews_for(place.id).await.unwrap().is_empty());
    ana.shutdown();
    bo.shutdown();
}

#[tokio::test]
async fn test_feed_merges_followed_activity_newest_first() {
    let backend = MemoryBackend::new();
    let (ana, _) = user(&backend, "ana").await;
    let bo_id = backend.register_user("bo@example.com", "secret1", "bo");
    let cy_id = backend.register_user("cy@example.com", "secret1", "cy");

    backend.seed(
        Collection::Restaurants,
        [
            json!({"id": 1, "user_id": bo_id, "name": "Alma", "to_try": false, "created_at": "2026-03-01T10:00:00Z"}),
            json!({"id": 2, "user_id": bo_id, "name": "Bodega", "to_try": true, "created_at": "2026-03-02T10:00:00Z"}),
            json!({"id": 3, "user_id": cy_id, "name": "Not Followed", "created_at": "2026-03-04T10:00:00Z"}),
        ],
    );
    backend.seed(
        Collection::Reviews,
        [json!({"restaurant_id": 3, "user_id": bo_id, "rating": 7.0, "created_at": "2026-03-03T10:00:00Z"})],
    );

    assert!(ana.feed().feed(10).await.unwrap().is_empty());
    ana.social().follow(bo_id).await.unwrap();

    let feed = ana.feed().feed(10).await.unwrap();
    let kinds: Vec<ActivityKind> = feed.iter().map(|item| item.kind).collect();
    assert_eq!(
        kinds,
        [ActivityKind::Reviewed, ActivityKind::WantsToTry, ActivityKind::Visited]
    );
    assert!(feed.iter().all(|item| item.actor_name == "bo"));
    assert_eq!(feed[0].restaurant_name.as_deref(), Some("Not Followed"));

    assert_eq!(ana.feed().feed(2).await.unwrap().len(), 2);
    assert!(ana.feed().feed(0).await.unwrap().is_empty());
    ana.shutdown();
}

#[tokio::test]
async fn test_transient_read_failure_is_retried() {
    let backend = MemoryBackend::new();
    backend.register_user("ana@example.com", "secret1", "ana");
    let client = TastebookClient::with_backends(
        ClientConfig::default().with_retry_policy(RetryPolicy::new(
            2,
            std::time::Duration::from_millis(1),
            std::time::Duration::from_secs(1),
        ).with_max_jitter(std::time::Duration::ZERO)),
        Arc::new(backend.clone()),
        Arc::new(StubGeocoder::broken()),
        backend.network().clone(),
    );
    sign_in(&client, "ana@example.com").await;

    backend.push_fault(MemoryOp::Query, Fault::BackendCode("40001".into()));
    let before = backend.calls(MemoryOp::Query);
    assert!(client.catalog().list_types().await.unwrap().is_empty());
    assert_eq!(backend.calls(MemoryOp::Query), before + 2);
    client.shutdown();
}
