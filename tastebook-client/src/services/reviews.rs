use serde::Serialize;
use shared::{Collection, RecordId, Restaurant, Review, ReviewCreate, UserId};

use super::ServiceContext;
use crate::error::{ClientError, ClientResult};
use crate::remote::Filter;
use crate::validation::validate_review;

#[derive(Serialize)]
struct NewReview<'a> {
    user_id: UserId,
    #[serde(flatten)]
    input: &'a ReviewCreate,
}

/// Restaurant reviews; one per user per restaurant
#[derive(Clone)]
pub struct ReviewService {
    ctx: ServiceContext,
}

impl ReviewService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    pub async fn add_review(&self, mut input: ReviewCreate) -> ClientResult<Review> {
        input.comment = input
            .comment
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        validate_review(&input)?;
        let user_id = self.ctx.session().require_user()?;

        let restaurant: Option<Restaurant> = self
            .ctx
            .fetch_one(Collection::Restaurants, Filter::new().eq("id", input.restaurant_id))
            .await?;
        if restaurant.is_none() {
            return Err(ClientError::not_found(format!(
                "restaurant {}",
                input.restaurant_id
            )));
        }

        let existing: Option<Review> = self
            .ctx
            .fetch_one(
                Collection::Reviews,
                Filter::new()
                    .eq("restaurant_id", input.restaurant_id)
                    .eq("user_id", user_id.to_string()),
            )
            .await?;
        if existing.is_some() {
            return Err(ClientError::Conflict(
                "you already reviewed this restaurant".to_string(),
            ));
        }

        let review: Review = self
            .ctx
            .insert(Collection::Reviews, &NewReview { user_id, input: &input })
            .await?;
        tracing::info!(review_id = review.id, restaurant_id = review.restaurant_id, "Review added");
        Ok(review)
    }

    /// Reviews of a restaurant, newest first
    pub async fn reviews_for(&self, restaurant_id: RecordId) -> ClientResult<Vec<Review>> {
        let filter = Filter::new()
            .eq("restaurant_id", restaurant_id)
            .order_by("created_at", false);
        self.ctx.fetch(Collection::Reviews, filter).await
    }

    /// Delete a review; only its author may
    pub async fn delete_review(&self, id: RecordId) -> ClientResult<()> {
        let user_id = self.ctx.session().require_user()?;
        let review: Review = self
            .ctx
            .fetch_one(Collection::Reviews, Filter::new().eq("id", id))
            .await?
            .ok_or_else(|| ClientError::not_found(format!("review {id}")))?;
        if review.user_id != user_id {
            return Err(ClientError::forbidden("only the author can delete this review"));
        }

        self.ctx.delete(Collection::Reviews, id).await?;
        tracing::info!(review_id = id, "Review deleted");
        Ok(())
    }
}
