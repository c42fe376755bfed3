use shared::{ActivityItem, ActivityKind, Collection, Profile, RecordId, Restaurant, Review, UserId};
use std::collections::HashMap;

use super::{ServiceContext, SocialService};
use crate::error::ClientResult;
use crate::remote::Filter;

pub const DEFAULT_FEED_LIMIT: usize = 50;

/// Activity of the users the viewer follows
#[derive(Clone)]
pub struct FeedService {
    ctx: ServiceContext,
    social: SocialService,
}

impl FeedService {
    pub fn new(ctx: ServiceContext, social: SocialService) -> Self {
        Self { ctx, social }
    }

    /// Newest restaurants and reviews of followed users, newest first
    pub async fn feed(&self, limit: usize) -> ClientResult<Vec<ActivityItem>> {
        let me = self.ctx.session().require_user()?;
        if limit == 0 {
            return Ok(Vec::new());
        }
        let followed = self.social.following_ids(me).await?;
        if followed.is_empty() {
            return Ok(Vec::new());
        }
        let followed_values: Vec<String> = followed.iter().map(UserId::to_string).collect();

        let restaurants: Vec<Restaurant> = self
            .ctx
            .fetch(
                Collection::Restaurants,
                Filter::new()
                    .is_in("user_id", followed_values.clone())
                    .order_by("created_at", false)
                    .limit(limit),
            )
            .await?;
        let reviews: Vec<Review> = self
            .ctx
            .fetch(
                Collection::Reviews,
                Filter::new()
                    .is_in("user_id", followed_values)
                    .order_by("created_at", false)
                    .limit(limit),
            )
            .await?;

        let names = self.actor_names(followed).await?;
        let mut restaurant_names: HashMap<RecordId, String> =
            restaurants.iter().map(|r| (r.id, r.name.clone())).collect();
        let missing: Vec<RecordId> = reviews
            .iter()
            .map(|r| r.restaurant_id)
            .filter(|id| !restaurant_names.contains_key(id))
            .collect();
        if !missing.is_empty() {
            let reviewed: Vec<Restaurant> = self
                .ctx
                .fetch(Collection::Restaurants, Filter::new().is_in("id", missing))
                .await?;
            restaurant_names.extend(reviewed.into_iter().map(|r| (r.id, r.name)));
        }

        let actor = |id: &UserId| names.get(id).cloned().unwrap_or_else(|| id.to_string());
        let mut items: Vec<ActivityItem> = restaurants
            .iter()
            .map(|r| ActivityItem {
                kind: if r.to_try {
                    ActivityKind::WantsToTry
                } else {
                    ActivityKind::Visited
                },
                actor_id: r.user_id,
                actor_name: actor(&r.user_id),
                restaurant_id: r.id,
                restaurant_name: Some(r.name.clone()),
                rating: r.rating,
                occurred_at: r.created_at,
            })
            .chain(reviews.iter().map(|r| ActivityItem {
                kind: ActivityKind::Reviewed,
                actor_id: r.user_id,
                actor_name: actor(&r.user_id),
                restaurant_id: r.restaurant_id,
                restaurant_name: restaurant_names.get(&r.restaurant_id).cloned(),
                rating: Some(r.rating),
                occurred_at: r.created_at,
            }))
            .collect();

        items.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        items.truncate(limit);
        Ok(items)
    }

    async fn actor_names(&self, ids: Vec<UserId>) -> ClientResult<HashMap<UserId, String>> {
        let profiles: Vec<Profile> = self.social.profiles(ids).await?;
        Ok(profiles
            .into_iter()
            .map(|p| (p.id, p.label().to_string()))
            .collect())
    }
}
