pub mod models;
mod utils;

use serde::{Deserialize, Serialize};

use crate::store::{Store, StoreError, UniqueKey};
use crate::types::{ApiResult, Conflict, Error, NotFound, Validate, ValidationError};
use models::{User, UserChanges};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserView {
    pub email: String,
    pub username: String,
    pub bio: Option<String>,
    pub image: Option<String>,
}

impl From<User> for UserView {
    fn from(user: User) -> UserView {
        UserView {
            email: user.email,
            username: user.username,
            bio: user.bio,
            image: user.image,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub username: Option<String>,
    pub bio: Option<String>,
    pub image: Option<String>,
}

impl Validate for UserUpdate {
    type Error = ValidationError;

    fn validate(self) -> Result<Self, ValidationError> {
        let mut error = ValidationError::default();
        if let Some(email) = &self.email {
            if let Err(e) = utils::validate_email(email) {
                error.merge(e);
            }
        }
        if let Some(username) = &self.username {
            if let Err(e) = utils::validate_username(username) {
                error.merge(e);
            }
        }
        if error.empty() {
            Ok(self)
        } else {
            Err(error)
        }
    }
}

pub fn get<S: Store>(store: &mut S, user_id: i32) -> ApiResult<UserView> {
    let user = store
        .user_by_id(user_id)?
        .ok_or_else(|| Error::NotFound(NotFound::User { username: user_id.to_string() }))?;
    Ok(user.into())
}

pub fn update<S: Store>(store: &mut S, user_id: i32, update: UserUpdate) -> ApiResult<UserView> {
    let update = update.validate()?;
    let current = store
        .user_by_id(user_id)?
        .ok_or_else(|| Error::NotFound(NotFound::User { username: user_id.to_string() }))?;

    let changes = UserChanges {
        email: update.email,
        username: update.username,
        bio: update.bio,
        image: update.image,
    };
    if changes.is_empty() {
        return Ok(current.into());
    }

    // Advisory pre-checks; the unique constraints on email/username are the
    // real guard under concurrent updates.
    if let Some(email) = &changes.email {
        if email != &current.email && store.user_by_email(email)?.is_some() {
            return Err(Error::Conflict(Conflict::EmailTaken { email: email.clone() }));
        }
    }
    if let Some(username) = &changes.username {
        if username != &current.username && store.user_by_username(username)?.is_some() {
            return Err(Error::Conflict(Conflict::UsernameTaken {
                username: username.clone(),
            }));
        }
    }

    let updated = store.update_user(user_id, changes.clone()).map_err(|e| match e {
        StoreError::UniqueViolation(UniqueKey::UserEmail) => Error::Conflict(Conflict::EmailTaken {
            email: changes.email.clone().unwrap_or_default(),
        }),
        StoreError::UniqueViolation(UniqueKey::UserUsername) => {
            Error::Conflict(Conflict::UsernameTaken {
                username: changes.username.clone().unwrap_or_default(),
            })
        }
        other => other.into(),
    })?;
    Ok(updated.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::test_support::new_user;

    #[test]
    fn test_update_changes_fields() {
        let mut store = MemoryStore::new();
        let id = new_user(&mut store, "jake");
        let view = update(
            &mut store,
            id,
            UserUpdate {
                bio: Some("I work at statefarm".into()),
                ..UserUpdate::default()
            },
        )
        .unwrap();
        assert_eq!(view.username, "jake");
        assert_eq!(view.bio.as_deref(), Some("I work at statefarm"));
    }

    #[test]
    fn test_update_rejects_taken_email() {
        let mut store = MemoryStore::new();
        let id = new_user(&mut store, "jake");
        new_user(&mut store, "anah");
        let err = update(
            &mut store,
            id,
            UserUpdate {
                email: Some("anah@example.com".into()),
                ..UserUpdate::default()
            },
        )
        .unwrap_err();
        assert_eq!(
            err,
            Error::Conflict(Conflict::EmailTaken { email: "anah@example.com".into() })
        );
    }

    #[test]
    fn test_update_rejects_taken_username() {
        let mut store = MemoryStore::new();
        let id = new_user(&mut store, "jake");
        new_user(&mut store, "anah");
        let err = update(
            &mut store,
            id,
            UserUpdate { username: Some("anah".into()), ..UserUpdate::default() },
        )
        .unwrap_err();
        assert_eq!(
            err,
            Error::Conflict(Conflict::UsernameTaken { username: "anah".into() })
        );
    }

    #[test]
    fn test_update_keeps_own_email() {
        let mut store = MemoryStore::new();
        let id = new_user(&mut store, "jake");
        let view = update(
            &mut store,
            id,
            UserUpdate {
                email: Some("jake@example.com".into()),
                image: Some("https://i.stack.imgur.com/xHWG8.jpg".into()),
                ..UserUpdate::default()
            },
        )
        .unwrap();
        assert_eq!(view.email, "jake@example.com");
    }

    #[test]
    fn test_update_validates_input() {
        let mut store = MemoryStore::new();
        let id = new_user(&mut store, "jake");
        let err = update(
            &mut store,
            id,
            UserUpdate { email: Some("nope".into()), ..UserUpdate::default() },
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_unknown_user() {
        let mut store = MemoryStore::new();
        assert!(matches!(get(&mut store, 42), Err(Error::NotFound(_))));
    }
}
