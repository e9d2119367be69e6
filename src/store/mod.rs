use std::fmt;

use chrono::NaiveDateTime;

use crate::article::{Article, ArticleChanges, NewArticle};
use crate::comment::{Comment, NewComment};
use crate::users::models::{NewUser, User, UserChanges};

mod memory;

pub use memory::MemoryStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    // A unique constraint fired; which one decides the domain conflict it
    // becomes.
    UniqueViolation(UniqueKey),
    NotFound,
    Backend(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueKey {
    UserEmail,
    UserUsername,
    ArticleSlug,
    TagName,
    Favorite,
    Follow,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StoreError::UniqueViolation(key) => write!(f, "unique violation: {:?}", key),
            StoreError::NotFound => write!(f, "row not found"),
            StoreError::Backend(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// An article with every relation the response projector needs, loaded in one
/// snapshot-consistent fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleRecord {
    pub article: Article,
    pub author: User,
    pub author_follower_ids: Vec<i32>,
    pub tags: Vec<String>,
    pub favoriter_ids: Vec<i32>,
    pub comment_ids: Vec<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct ArticleQuery {
    pub tag: Option<String>,
    pub author: Option<String>,
    pub favorited_by: Option<String>,
    // Governs the draft-visibility clause; absent means published only.
    pub viewer_id: Option<i32>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InteractionRow {
    pub article_id: i32,
    pub created_at: NaiveDateTime,
    pub comments: i64,
    pub favorites: i64,
}

/// The narrow persistence interface the engine runs against. Implementations
/// must enforce the unique constraints on `users.email`, `users.username`,
/// `articles.slug`, `tags.name`, `favorites(user_id, article_id)` and
/// `follows(follower_id, followed_id)`, surfacing violations as
/// `StoreError::UniqueViolation` so the engine can re-classify them.
pub trait Store {
    // users
    fn insert_user(&mut self, user: NewUser) -> StoreResult<User>;
    fn user_by_id(&mut self, id: i32) -> StoreResult<Option<User>>;
    fn user_by_username(&mut self, username: &str) -> StoreResult<Option<User>>;
    fn user_by_email(&mut self, email: &str) -> StoreResult<Option<User>>;
    fn update_user(&mut self, id: i32, changes: UserChanges) -> StoreResult<User>;

    // follow edges
    fn follow_exists(&mut self, follower_id: i32, followed_id: i32) -> StoreResult<bool>;
    fn insert_follow(&mut self, follower_id: i32, followed_id: i32) -> StoreResult<()>;
    fn delete_follow(&mut self, follower_id: i32, followed_id: i32) -> StoreResult<bool>;
    fn following_ids(&mut self, follower_id: i32) -> StoreResult<Vec<i32>>;

    // articles
    fn insert_article(&mut self, article: NewArticle, tags: &[String]) -> StoreResult<ArticleRecord>;
    fn article_by_slug(&mut self, slug: &str) -> StoreResult<Option<ArticleRecord>>;
    fn update_article(&mut self, id: i32, changes: ArticleChanges) -> StoreResult<ArticleRecord>;
    fn delete_article(&mut self, id: i32) -> StoreResult<()>;
    fn list_articles(&mut self, query: &ArticleQuery) -> StoreResult<Vec<ArticleRecord>>;
    fn feed_articles(&mut self, author_ids: &[i32], limit: i64, offset: i64)
        -> StoreResult<Vec<ArticleRecord>>;
    fn drafts_by_slugs(&mut self, author_id: i32, slugs: &[String])
        -> StoreResult<Vec<ArticleRecord>>;
    fn mark_published(&mut self, ids: &[i32]) -> StoreResult<Vec<ArticleRecord>>;

    // favorite edges
    fn favorite_exists(&mut self, user_id: i32, article_id: i32) -> StoreResult<bool>;
    fn insert_favorite(&mut self, user_id: i32, article_id: i32) -> StoreResult<()>;
    fn delete_favorite(&mut self, user_id: i32, article_id: i32) -> StoreResult<bool>;

    // comments
    fn insert_comment(&mut self, comment: NewComment) -> StoreResult<(Comment, User)>;
    fn comment_by_id(&mut self, id: i32) -> StoreResult<Option<Comment>>;
    fn comments_for_article(&mut self, article_id: i32) -> StoreResult<Vec<(Comment, User)>>;
    fn delete_comment(&mut self, id: i32) -> StoreResult<()>;

    // tags
    fn tag_names(&mut self) -> StoreResult<Vec<String>>;

    // statistics
    fn interaction_rows(&mut self, author_id: i32) -> StoreResult<Vec<InteractionRow>>;
}
