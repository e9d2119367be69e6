use log::debug;
use serde::Deserialize;

use crate::article::ArticleList;
use crate::store::Store;
use crate::types::ApiResult;
use crate::utils::page_params;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// Published articles by followed authors, newest first. An empty following
// set yields an empty feed, never the global listing, and drafts stay out
// even when the viewer wrote them.
pub fn feed<S: Store>(store: &mut S, viewer_id: i32, query: FeedQuery) -> ApiResult<ArticleList> {
    let (limit, offset) = page_params(query.limit, query.offset)?;
    let following = store.following_ids(viewer_id)?;
    if following.is_empty() {
        return Ok(ArticleList::empty());
    }
    debug!(
        "assembling feed for user {} over {} followed author(s)",
        viewer_id,
        following.len()
    );
    let records = store.feed_articles(&following, limit, offset)?;
    Ok(ArticleList::from_records(&records, Some(viewer_id)))
}
