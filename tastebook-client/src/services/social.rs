use serde::Serialize;
use shared::{Collection, Follow, Profile, UserId};

use super::ServiceContext;
use crate::error::{ClientError, ClientResult};
use crate::remote::Filter;

/// Profile search results are capped
const SEARCH_LIMIT: usize = 20;

#[derive(Serialize)]
struct NewFollow {
    follower_id: UserId,
    following_id: UserId,
}

/// Follow graph and profile lookup
#[derive(Clone)]
pub struct SocialService {
    ctx: ServiceContext,
}

impl SocialService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    pub async fn profile(&self, user_id: UserId) -> ClientResult<Profile> {
        self.ctx
            .fetch_one(Collection::Profiles, Filter::new().eq("id", user_id.to_string()))
            .await?
            .ok_or_else(|| ClientError::not_found(format!("profile {user_id}")))
    }

    pub async fn follow(&self, target: UserId) -> ClientResult<Follow> {
        let me = self.ctx.session().require_user()?;
        if me == target {
            return Err(ClientError::validation("you cannot follow yourself"));
        }
        self.profile(target).await?;
        if self.edge(me, target).await?.is_some() {
            return Err(ClientError::Conflict("already following".to_string()));
        }

        let follow: Follow = self
            .ctx
            .insert(
                Collection::Follows,
                &NewFollow {
                    follower_id: me,
                    following_id: target,
                },
            )
            .await?;
        tracing::info!(follower = %me, following = %target, "Followed user");
        Ok(follow)
    }

    pub async fn unfollow(&self, target: UserId) -> ClientResult<()> {
        let me = self.ctx.session().require_user()?;
        let follow = self
            .edge(me, target)
            .await?
            .ok_or_else(|| ClientError::not_found("not following this user"))?;
        self.ctx.delete(Collection::Follows, follow.id).await?;
        tracing::info!(follower = %me, following = %target, "Unfollowed user");
        Ok(())
    }

    pub async fn is_following(&self, target: UserId) -> ClientResult<bool> {
        let me = self.ctx.session().require_user()?;
        Ok(self.edge(me, target).await?.is_some())
    }

    /// Profiles following `user_id`
    pub async fn followers(&self, user_id: UserId) -> ClientResult<Vec<Profile>> {
        let edges: Vec<Follow> = self
            .ctx
            .fetch(Collection::Follows, Filter::new().eq("following_id", user_id.to_string()))
            .await?;
        self.profiles(edges.iter().map(|f| f.follower_id).collect()).await
    }

    /// Profiles `user_id` follows
    pub async fn following(&self, user_id: UserId) -> ClientResult<Vec<Profile>> {
        let ids = self.following_ids(user_id).await?;
        self.profiles(ids).await
    }

    pub(crate) async fn following_ids(&self, user_id: UserId) -> ClientResult<Vec<UserId>> {
        let edges: Vec<Follow> = self
            .ctx
            .fetch(Collection::Follows, Filter::new().eq("follower_id", user_id.to_string()))
            .await?;
        Ok(edges.into_iter().map(|f| f.following_id).collect())
    }

    /// Profiles whose username contains `text`; blank text finds nothing
    pub async fn search_profiles(&self, text: &str) -> ClientResult<Vec<Profile>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let filter = Filter::new()
            .ilike("username", text)
            .order_by("username", true)
            .limit(SEARCH_LIMIT);
        self.ctx.fetch(Collection::Profiles, filter).await
    }

    pub(crate) async fn profiles(&self, ids: Vec<UserId>) -> ClientResult<Vec<Profile>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let filter = Filter::new()
            .is_in("id", ids.iter().map(|id| id.to_string()))
            .order_by("username", true);
        self.ctx.fetch(Collection::Profiles, filter).await
    }

    async fn edge(&self, follower: UserId, following: UserId) -> ClientResult<Option<Follow>> {
        let filter = Filter::new()
            .eq("follower_id", follower.to_string())
            .eq("following_id", following.to_string());
        self.ctx.fetch_one(Collection::Follows, filter).await
    }
}
