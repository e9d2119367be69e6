//! The engine behind a multi-tenant content-sharing backend: article
//! visibility, the follow/favorite social graph, personalized feeds, bulk
//! draft publishing and interaction statistics. Controllers, authentication
//! and message translation live upstream; they hand every operation an
//! explicit viewer and get back either a projected view or a classified
//! error.

pub mod db;
pub mod store;
pub mod users;
pub mod types;
pub mod utils;
pub mod profile;
pub mod article;
pub mod comment;
pub mod feed;
pub mod publish;
pub mod stats;

pub use store::{MemoryStore, Store};
pub use types::{ApiResult, Error};
