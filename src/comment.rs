use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;

use crate::article::is_visible;
use crate::db::schema::comments;
use crate::profile::Profile;
use crate::store::{ArticleRecord, Store};
use crate::types::{ApiResult, Error, Forbidden, NotFound, ValidationError};
use crate::utils::serialize_date;

#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = comments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Comment {
    pub id: i32,
    pub article_id: i32,
    pub author_id: i32,
    pub body: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = comments)]
pub struct NewComment {
    pub article_id: i32,
    pub author_id: i32,
    pub body: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: i32,
    #[serde(serialize_with = "serialize_date")]
    pub created_at: NaiveDateTime,
    #[serde(serialize_with = "serialize_date")]
    pub updated_at: NaiveDateTime,
    pub body: String,
    pub author: Profile<'static>,
}

impl From<(Comment, Profile<'static>)> for CommentView {
    fn from((comment, profile): (Comment, Profile<'static>)) -> Self {
        CommentView {
            id: comment.id,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
            body: comment.body,
            author: profile,
        }
    }
}

fn resolve_visible<S: Store>(
    store: &mut S,
    slug: &str,
    viewer_id: Option<i32>,
) -> ApiResult<ArticleRecord> {
    store
        .article_by_slug(slug)?
        .filter(|record| is_visible(&record.article, viewer_id))
        .ok_or_else(|| Error::NotFound(NotFound::Article { slug: slug.to_owned() }))
}

pub fn add<S: Store>(store: &mut S, user_id: i32, slug: &str, body: &str) -> ApiResult<CommentView> {
    let record = resolve_visible(store, slug, Some(user_id))?;
    if body.trim().is_empty() {
        return Err(ValidationError::from("body", "empty body").into());
    }
    let now = Utc::now().naive_utc();
    let (comment, author) = store.insert_comment(NewComment {
        article_id: record.article.id,
        author_id: user_id,
        body: body.to_owned(),
        created_at: now,
        updated_at: now,
    })?;
    // The commenter is the author of this profile; no following flag.
    Ok((comment, Profile::from_user(author, None)).into())
}

pub fn list<S: Store>(
    store: &mut S,
    viewer_id: Option<i32>,
    slug: &str,
) -> ApiResult<Vec<CommentView>> {
    let record = resolve_visible(store, slug, viewer_id)?;
    let rows = store.comments_for_article(record.article.id)?;
    let following_ids = match viewer_id {
        Some(viewer_id) => store.following_ids(viewer_id)?,
        None => Vec::new(),
    };
    Ok(rows
        .into_iter()
        .map(|(comment, author)| {
            let following = match viewer_id {
                Some(viewer_id) if viewer_id != author.id => {
                    Some(following_ids.contains(&author.id))
                }
                _ => None,
            };
            (comment, Profile::from_user(author, following)).into()
        })
        .collect())
}

pub fn delete<S: Store>(store: &mut S, user_id: i32, slug: &str, comment_id: i32) -> ApiResult<()> {
    let record = resolve_visible(store, slug, Some(user_id))?;
    let comment = store
        .comment_by_id(comment_id)?
        .filter(|comment| comment.article_id == record.article.id)
        .ok_or(Error::NotFound(NotFound::Comment { id: comment_id }))?;
    if comment.author_id != user_id {
        return Err(Error::Forbidden(Forbidden::DeleteComment));
    }
    store.delete_comment(comment_id)?;
    Ok(())
}
