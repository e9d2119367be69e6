use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::store::{StoreError, UniqueKey};

pub trait Validate
where
    Self: Sized,
{
    type Error;
    fn validate(self) -> Result<Self, Self::Error>;
}

pub type ApiResult<T> = Result<T, Error>;

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    NotFound(NotFound),
    Forbidden(Forbidden),
    Conflict(Conflict),
    Validation(ValidationError),
    Store(StoreError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum NotFound {
    Article { slug: String },
    User { username: String },
    Comment { id: i32 },
    // The whole batch that made a publish call fail, for the error message.
    Drafts { slugs: Vec<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Forbidden {
    UpdateArticle,
    DeleteArticle,
    DeleteComment,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Conflict {
    ArticleSlug { slug: String },
    AlreadyFavorited,
    NotFavoritedYet,
    AlreadyFollowing,
    NotFollowingUser,
    CannotFollowSelf,
    CannotUnfollowSelf,
    EmailTaken { email: String },
    UsernameTaken { username: String },
}

impl Error {
    // Stable code handed to the translation layer; the variant carries the
    // structured context (slug, username, ...).
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound(NotFound::Article { .. }) => "ARTICLE_NOT_FOUND",
            Error::NotFound(NotFound::Drafts { .. }) => "ARTICLE_NOT_FOUND",
            Error::NotFound(NotFound::User { .. }) => "USER_NOT_FOUND",
            Error::NotFound(NotFound::Comment { .. }) => "COMMENT_NOT_FOUND",
            Error::Forbidden(Forbidden::UpdateArticle) => "FORBIDDEN_UPDATE_ARTICLE",
            Error::Forbidden(Forbidden::DeleteArticle) => "FORBIDDEN_DELETE_ARTICLE",
            Error::Forbidden(Forbidden::DeleteComment) => "FORBIDDEN_DELETE_COMMENT",
            Error::Conflict(Conflict::ArticleSlug { .. }) => "ARTICLE_CONFLICT",
            Error::Conflict(Conflict::AlreadyFavorited) => "ALREADY_FAVORITED",
            Error::Conflict(Conflict::NotFavoritedYet) => "NOT_FAVORITED_YET",
            Error::Conflict(Conflict::AlreadyFollowing) => "ALREADY_FOLLOWING",
            Error::Conflict(Conflict::NotFollowingUser) => "NOT_FOLLOWING_USER",
            Error::Conflict(Conflict::CannotFollowSelf) => "CANNOT_FOLLOW_SELF",
            Error::Conflict(Conflict::CannotUnfollowSelf) => "CANNOT_UNFOLLOW_SELF",
            Error::Conflict(Conflict::EmailTaken { .. }) => "EMAIL_ALREADY_EXISTS",
            Error::Conflict(Conflict::UsernameTaken { .. }) => "USERNAME_ALREADY_EXISTS",
            Error::Validation(_) => "INVALID_INPUT",
            Error::Store(_) => "INTERNAL_SERVER_ERROR",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::NotFound(NotFound::Article { slug }) => {
                write!(f, "article not found: {}", slug)
            }
            Error::NotFound(NotFound::User { username }) => {
                write!(f, "user not found: {}", username)
            }
            Error::NotFound(NotFound::Comment { id }) => write!(f, "comment not found: {}", id),
            Error::NotFound(NotFound::Drafts { slugs }) => {
                write!(f, "drafts not found: {}", slugs.join(", "))
            }
            Error::Forbidden(_) => write!(f, "{}", self.kind()),
            Error::Conflict(Conflict::ArticleSlug { slug }) => {
                write!(f, "an article with slug {} already exists", slug)
            }
            Error::Conflict(Conflict::EmailTaken { email }) => {
                write!(f, "email already taken: {}", email)
            }
            Error::Conflict(Conflict::UsernameTaken { username }) => {
                write!(f, "username already taken: {}", username)
            }
            Error::Conflict(_) => write!(f, "{}", self.kind()),
            Error::Validation(errors) => write!(f, "invalid input: {:?}", errors),
            Error::Store(err) => write!(f, "store error: {}", err),
        }
    }
}

impl std::error::Error for Error {}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Error {
        Error::Validation(err)
    }
}

// The single point where race-induced constraint violations on the
// favorite/follow edges are re-classified into domain conflicts. Violations
// that carry caller context (slug, email, username) are mapped at the call
// site instead.
impl From<StoreError> for Error {
    fn from(err: StoreError) -> Error {
        match err {
            StoreError::UniqueViolation(UniqueKey::Favorite) => {
                Error::Conflict(Conflict::AlreadyFavorited)
            }
            StoreError::UniqueViolation(UniqueKey::Follow) => {
                Error::Conflict(Conflict::AlreadyFollowing)
            }
            other => Error::Store(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct ValidationError(HashMap<String, Vec<String>>);

impl ValidationError {
    pub fn add_error<K: Into<String>, V: Into<String>>(&mut self, key: K, val: V) {
        let entry = self.0.entry(key.into()).or_default();
        entry.push(val.into());
    }

    pub fn from<K: Into<String>, V: Into<String>>(key: K, val: V) -> Self {
        let mut error = ValidationError::default();
        error.add_error(key, val);
        error
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn merge(&mut self, other: ValidationError) {
        for (key, errors) in other.0.into_iter() {
            let entry = self.0.entry(key).or_default();
            entry.extend(errors);
        }
    }

    pub fn empty(&self) -> bool {
        self.len() == 0
    }
}
