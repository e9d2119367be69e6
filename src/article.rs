use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::db::schema::articles;
use crate::profile::Profile;
use crate::store::{ArticleQuery, ArticleRecord, Store, StoreError, UniqueKey};
use crate::types::{ApiResult, Conflict, Error, Forbidden, NotFound, Validate, ValidationError};
use crate::utils::{page_params, serialize_date, slugify};

#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = articles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Article {
    pub id: i32,
    pub author_id: i32,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
    pub is_draft: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = articles)]
pub struct NewArticle {
    pub author_id: i32,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
    pub is_draft: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = articles)]
pub struct ArticleChanges {
    pub slug: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub body: Option<String>,
    pub updated_at: Option<NaiveDateTime>,
}

// The one visibility rule: drafts exist only for their author. Everyone
// applies this predicate; a failed check reads as "no such article".
pub fn is_visible(article: &Article, viewer_id: Option<i32>) -> bool {
    !article.is_draft || viewer_id == Some(article.author_id)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleView {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
    pub tag_list: Vec<String>,
    pub is_draft: bool,
    #[serde(serialize_with = "serialize_date")]
    pub created_at: NaiveDateTime,
    #[serde(serialize_with = "serialize_date")]
    pub updated_at: NaiveDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favorited: Option<bool>,
    pub favorites_count: i64,
    pub comments_count: i64,
    pub author: Profile<'static>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleList {
    pub articles: Vec<ArticleView>,
    pub articles_count: i64,
}

impl ArticleList {
    pub fn empty() -> Self {
        ArticleList { articles: Vec::new(), articles_count: 0 }
    }

    pub fn from_records(records: &[ArticleRecord], viewer_id: Option<i32>) -> Self {
        let articles: Vec<ArticleView> = records
            .iter()
            .map(|record| ArticleView::project(record, viewer_id))
            .collect();
        let articles_count = articles.len() as i64;
        ArticleList { articles, articles_count }
    }
}

impl ArticleView {
    // Pure projection of one joined record for one viewer; everything it
    // needs is already on the record.
    pub fn project(record: &ArticleRecord, viewer_id: Option<i32>) -> ArticleView {
        let article = &record.article;
        let favorited = viewer_id.map(|id| record.favoriter_ids.contains(&id));
        let following = match viewer_id {
            Some(id) if id != article.author_id => Some(record.author_follower_ids.contains(&id)),
            _ => None,
        };
        ArticleView {
            slug: article.slug.clone(),
            title: article.title.clone(),
            description: article.description.clone(),
            body: article.body.clone(),
            tag_list: record.tags.clone(),
            is_draft: article.is_draft,
            created_at: article.created_at,
            updated_at: article.updated_at.unwrap_or(article.created_at),
            favorited,
            favorites_count: record.favoriter_ids.len() as i64,
            comments_count: record.comment_ids.len() as i64,
            author: Profile::from_user(record.author.clone(), following),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleDraft {
    pub title: String,
    pub description: String,
    pub body: String,
    #[serde(default)]
    pub tag_list: Vec<String>,
    pub is_draft: Option<bool>,
}

impl Validate for ArticleDraft {
    type Error = ValidationError;

    fn validate(self) -> Result<Self, ValidationError> {
        let mut error = ValidationError::default();
        if self.title.trim().is_empty() {
            error.add_error("title", "empty title");
        }
        if self.description.trim().is_empty() {
            error.add_error("description", "empty description");
        }
        if self.body.trim().is_empty() {
            error.add_error("body", "empty body");
        }
        if error.empty() {
            Ok(self)
        } else {
            Err(error)
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArticleUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub body: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub tag: Option<String>,
    pub author: Option<String>,
    pub favorited: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

fn not_found(slug: &str) -> Error {
    Error::NotFound(NotFound::Article { slug: slug.to_owned() })
}

fn resolve_visible<S: Store>(
    store: &mut S,
    slug: &str,
    viewer_id: Option<i32>,
) -> ApiResult<ArticleRecord> {
    store
        .article_by_slug(slug)?
        .filter(|record| is_visible(&record.article, viewer_id))
        .ok_or_else(|| not_found(slug))
}

pub fn get_by_slug<S: Store>(
    store: &mut S,
    slug: &str,
    viewer_id: Option<i32>,
) -> ApiResult<ArticleView> {
    let record = resolve_visible(store, slug, viewer_id)?;
    Ok(ArticleView::project(&record, viewer_id))
}

pub fn create<S: Store>(store: &mut S, author_id: i32, draft: ArticleDraft) -> ApiResult<ArticleView> {
    let draft = draft.validate()?;
    let slug = slugify(&draft.title);
    if store.article_by_slug(&slug)?.is_some() {
        return Err(Error::Conflict(Conflict::ArticleSlug { slug }));
    }
    let mut tags: Vec<String> = Vec::new();
    for tag in draft.tag_list {
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    let new_article = NewArticle {
        author_id,
        slug: slug.clone(),
        title: draft.title,
        description: draft.description,
        body: draft.body,
        is_draft: draft.is_draft.unwrap_or(true),
        created_at: Utc::now().naive_utc(),
    };
    let record = store.insert_article(new_article, &tags).map_err(|e| match e {
        StoreError::UniqueViolation(UniqueKey::ArticleSlug) => {
            Error::Conflict(Conflict::ArticleSlug { slug: slug.clone() })
        }
        other => other.into(),
    })?;
    debug!("user {} created article {}", author_id, record.article.slug);
    Ok(ArticleView::project(&record, Some(author_id)))
}

pub fn update<S: Store>(
    store: &mut S,
    user_id: i32,
    slug: &str,
    changes: ArticleUpdate,
) -> ApiResult<ArticleView> {
    // Ownership is checked on the raw slug: the author can always reach
    // their own drafts.
    let record = store.article_by_slug(slug)?.ok_or_else(|| not_found(slug))?;
    if record.article.author_id != user_id {
        return Err(Error::Forbidden(Forbidden::UpdateArticle));
    }

    let mut new_slug = None;
    if let Some(title) = &changes.title {
        if title.trim().is_empty() {
            return Err(ValidationError::from("title", "empty title").into());
        }
        let candidate = slugify(title);
        if candidate != record.article.slug {
            if store.article_by_slug(&candidate)?.is_some() {
                return Err(Error::Conflict(Conflict::ArticleSlug { slug: candidate }));
            }
            new_slug = Some(candidate);
        }
    }

    let store_changes = ArticleChanges {
        slug: new_slug.clone(),
        title: changes.title,
        description: changes.description,
        body: changes.body,
        updated_at: Some(Utc::now().naive_utc()),
    };
    let updated = store
        .update_article(record.article.id, store_changes)
        .map_err(|e| match e {
            StoreError::UniqueViolation(UniqueKey::ArticleSlug) => {
                Error::Conflict(Conflict::ArticleSlug {
                    slug: new_slug.clone().unwrap_or_default(),
                })
            }
            other => other.into(),
        })?;
    Ok(ArticleView::project(&updated, Some(user_id)))
}

pub fn delete<S: Store>(store: &mut S, user_id: i32, slug: &str) -> ApiResult<()> {
    let record = store.article_by_slug(slug)?.ok_or_else(|| not_found(slug))?;
    if record.article.author_id != user_id {
        return Err(Error::Forbidden(Forbidden::DeleteArticle));
    }
    store.delete_article(record.article.id)?;
    debug!("user {} deleted article {}", user_id, slug);
    Ok(())
}

pub fn list<S: Store>(
    store: &mut S,
    viewer_id: Option<i32>,
    query: ListQuery,
) -> ApiResult<ArticleList> {
    let (limit, offset) = page_params(query.limit, query.offset)?;
    let records = store.list_articles(&ArticleQuery {
        tag: query.tag,
        author: query.author,
        favorited_by: query.favorited,
        viewer_id,
        limit,
        offset,
    })?;
    Ok(ArticleList::from_records(&records, viewer_id))
}

pub fn favorite<S: Store>(store: &mut S, user_id: i32, slug: &str) -> ApiResult<ArticleView> {
    let record = resolve_visible(store, slug, Some(user_id))?;
    if store.favorite_exists(user_id, record.article.id)? {
        return Err(Error::Conflict(Conflict::AlreadyFavorited));
    }
    // Racing duplicates surface as a unique violation on (user_id,
    // article_id) and come back as AlreadyFavorited.
    store.insert_favorite(user_id, record.article.id)?;
    let record = store.article_by_slug(slug)?.ok_or_else(|| not_found(slug))?;
    Ok(ArticleView::project(&record, Some(user_id)))
}

pub fn unfavorite<S: Store>(store: &mut S, user_id: i32, slug: &str) -> ApiResult<ArticleView> {
    let record = resolve_visible(store, slug, Some(user_id))?;
    if !store.favorite_exists(user_id, record.article.id)? {
        return Err(Error::Conflict(Conflict::NotFavoritedYet));
    }
    if !store.delete_favorite(user_id, record.article.id)? {
        return Err(Error::Conflict(Conflict::NotFavoritedYet));
    }
    let record = store.article_by_slug(slug)?.ok_or_else(|| not_found(slug))?;
    Ok(ArticleView::project(&record, Some(user_id)))
}

pub fn tags<S: Store>(store: &mut S) -> ApiResult<Vec<String>> {
    Ok(store.tag_names()?)
}
