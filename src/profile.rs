use std::borrow::Cow;

use log::debug;
use serde::Serialize;

use crate::store::Store;
use crate::types::{ApiResult, Conflict, Error, NotFound};
use crate::users::models::User;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile<'a> {
    pub username: Cow<'a, str>,
    pub bio: Option<Cow<'a, str>>,
    pub image: Option<Cow<'a, str>>,
    // None when the viewer is anonymous or is this user; omitted from JSON.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub following: Option<bool>,
}

impl Profile<'static> {
    pub fn from_user(user: User, following: Option<bool>) -> Self {
        Profile {
            username: Cow::Owned(user.username),
            bio: user.bio.map(Cow::Owned),
            image: user.image.map(Cow::Owned),
            following,
        }
    }
}

fn resolve<S: Store>(store: &mut S, username: &str) -> ApiResult<User> {
    store
        .user_by_username(username)?
        .ok_or_else(|| Error::NotFound(NotFound::User { username: username.to_owned() }))
}

pub fn get_profile<S: Store>(
    store: &mut S,
    viewer_id: Option<i32>,
    username: &str,
) -> ApiResult<Profile<'static>> {
    let user = resolve(store, username)?;
    let following = match viewer_id {
        Some(viewer_id) if viewer_id != user.id => Some(store.follow_exists(viewer_id, user.id)?),
        _ => None,
    };
    Ok(Profile::from_user(user, following))
}

pub fn follow<S: Store>(
    store: &mut S,
    follower_id: i32,
    username: &str,
) -> ApiResult<Profile<'static>> {
    let target = resolve(store, username)?;
    if target.id == follower_id {
        return Err(Error::Conflict(Conflict::CannotFollowSelf));
    }
    if store.follow_exists(follower_id, target.id)? {
        return Err(Error::Conflict(Conflict::AlreadyFollowing));
    }
    // A concurrent duplicate slips past the check above and is re-classified
    // from the unique violation on (follower_id, followed_id).
    store.insert_follow(follower_id, target.id)?;
    debug!("user {} now follows {}", follower_id, target.id);
    Ok(Profile::from_user(target, Some(true)))
}

pub fn unfollow<S: Store>(
    store: &mut S,
    follower_id: i32,
    username: &str,
) -> ApiResult<Profile<'static>> {
    let target = resolve(store, username)?;
    if target.id == follower_id {
        return Err(Error::Conflict(Conflict::CannotUnfollowSelf));
    }
    if !store.follow_exists(follower_id, target.id)? {
        return Err(Error::Conflict(Conflict::NotFollowingUser));
    }
    if !store.delete_follow(follower_id, target.id)? {
        // Lost a race with an identical unfollow.
        return Err(Error::Conflict(Conflict::NotFollowingUser));
    }
    debug!("user {} no longer follows {}", follower_id, target.id);
    Ok(Profile::from_user(target, Some(false)))
}
