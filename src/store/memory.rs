use std::collections::{BTreeMap, BTreeSet};

use crate::article::{is_visible, Article, ArticleChanges, NewArticle};
use crate::comment::{Comment, NewComment};
use crate::users::models::{NewUser, User, UserChanges};

use super::{
    ArticleQuery, ArticleRecord, InteractionRow, Store, StoreError, StoreResult, UniqueKey,
};

/// An embeddable store keeping everything in process memory. It enforces the
/// same unique constraints as the relational backend, so the engine's
/// conflict handling behaves identically against it.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: BTreeMap<i32, User>,
    articles: BTreeMap<i32, Article>,
    tags: BTreeMap<i32, String>,
    article_tags: BTreeSet<(i32, i32)>,
    comments: BTreeMap<i32, Comment>,
    favorites: BTreeSet<(i32, i32)>,
    follows: BTreeSet<(i32, i32)>,
    next_user_id: i32,
    next_article_id: i32,
    next_comment_id: i32,
    next_tag_id: i32,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    fn record(&self, article: &Article) -> StoreResult<ArticleRecord> {
        let author = self
            .users
            .get(&article.author_id)
            .cloned()
            .ok_or_else(|| StoreError::Backend(format!("missing author {}", article.author_id)))?;
        let mut tags: Vec<String> = self
            .article_tags
            .iter()
            .filter(|(article_id, _)| *article_id == article.id)
            .filter_map(|(_, tag_id)| self.tags.get(tag_id).cloned())
            .collect();
        tags.sort();
        Ok(ArticleRecord {
            author_follower_ids: self
                .follows
                .iter()
                .filter(|(_, followed)| *followed == article.author_id)
                .map(|(follower, _)| *follower)
                .collect(),
            tags,
            favoriter_ids: self
                .favorites
                .iter()
                .filter(|(_, article_id)| *article_id == article.id)
                .map(|(user_id, _)| *user_id)
                .collect(),
            comment_ids: self
                .comments
                .values()
                .filter(|c| c.article_id == article.id)
                .map(|c| c.id)
                .collect(),
            article: article.clone(),
            author,
        })
    }

    fn records(&self, articles: Vec<&Article>) -> StoreResult<Vec<ArticleRecord>> {
        articles.into_iter().map(|a| self.record(a)).collect()
    }

    fn page<'a>(mut rows: Vec<&'a Article>, limit: i64, offset: i64) -> Vec<&'a Article> {
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        rows.into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect()
    }

    fn tag_id_by_name(&self, name: &str) -> Option<i32> {
        self.tags
            .iter()
            .find(|(_, tag)| tag.as_str() == name)
            .map(|(id, _)| *id)
    }

    fn user_id_by_name(&self, username: &str) -> Option<i32> {
        self.users
            .values()
            .find(|u| u.username == username)
            .map(|u| u.id)
    }
}

impl Store for MemoryStore {
    fn insert_user(&mut self, user: NewUser) -> StoreResult<User> {
        if self.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::UniqueViolation(UniqueKey::UserEmail));
        }
        if self.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::UniqueViolation(UniqueKey::UserUsername));
        }
        self.next_user_id += 1;
        let user = User {
            id: self.next_user_id,
            email: user.email,
            username: user.username,
            password_hash: user.password_hash,
            bio: user.bio,
            image: user.image,
        };
        self.users.insert(user.id, user.clone());
        Ok(user)
    }

    fn user_by_id(&mut self, id: i32) -> StoreResult<Option<User>> {
        Ok(self.users.get(&id).cloned())
    }

    fn user_by_username(&mut self, username: &str) -> StoreResult<Option<User>> {
        Ok(self.users.values().find(|u| u.username == username).cloned())
    }

    fn user_by_email(&mut self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.users.values().find(|u| u.email == email).cloned())
    }

    fn update_user(&mut self, id: i32, changes: UserChanges) -> StoreResult<User> {
        if let Some(email) = &changes.email {
            if self.users.values().any(|u| u.id != id && &u.email == email) {
                return Err(StoreError::UniqueViolation(UniqueKey::UserEmail));
            }
        }
        if let Some(username) = &changes.username {
            if self.users.values().any(|u| u.id != id && &u.username == username) {
                return Err(StoreError::UniqueViolation(UniqueKey::UserUsername));
            }
        }
        let user = self.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(username) = changes.username {
            user.username = username;
        }
        if let Some(bio) = changes.bio {
            user.bio = Some(bio);
        }
        if let Some(image) = changes.image {
            user.image = Some(image);
        }
        Ok(user.clone())
    }

    fn follow_exists(&mut self, follower_id: i32, followed_id: i32) -> StoreResult<bool> {
        Ok(self.follows.contains(&(follower_id, followed_id)))
    }

    fn insert_follow(&mut self, follower_id: i32, followed_id: i32) -> StoreResult<()> {
        if !self.follows.insert((follower_id, followed_id)) {
            return Err(StoreError::UniqueViolation(UniqueKey::Follow));
        }
        Ok(())
    }

    fn delete_follow(&mut self, follower_id: i32, followed_id: i32) -> StoreResult<bool> {
        Ok(self.follows.remove(&(follower_id, followed_id)))
    }

    fn following_ids(&mut self, follower_id: i32) -> StoreResult<Vec<i32>> {
        Ok(self
            .follows
            .iter()
            .filter(|(follower, _)| *follower == follower_id)
            .map(|(_, followed)| *followed)
            .collect())
    }

    fn insert_article(&mut self, article: NewArticle, tags: &[String]) -> StoreResult<ArticleRecord> {
        if self.articles.values().any(|a| a.slug == article.slug) {
            return Err(StoreError::UniqueViolation(UniqueKey::ArticleSlug));
        }
        self.next_article_id += 1;
        let article = Article {
            id: self.next_article_id,
            author_id: article.author_id,
            slug: article.slug,
            title: article.title,
            description: article.description,
            body: article.body,
            is_draft: article.is_draft,
            created_at: article.created_at,
            updated_at: None,
        };
        for name in tags {
            let tag_id = match self.tag_id_by_name(name) {
                Some(id) => id,
                None => {
                    self.next_tag_id += 1;
                    self.tags.insert(self.next_tag_id, name.clone());
                    self.next_tag_id
                }
            };
            self.article_tags.insert((article.id, tag_id));
        }
        self.articles.insert(article.id, article.clone());
        self.record(&article)
    }

    fn article_by_slug(&mut self, slug: &str) -> StoreResult<Option<ArticleRecord>> {
        match self.articles.values().find(|a| a.slug == slug).cloned() {
            Some(article) => Ok(Some(self.record(&article)?)),
            None => Ok(None),
        }
    }

    fn update_article(&mut self, id: i32, changes: ArticleChanges) -> StoreResult<ArticleRecord> {
        if let Some(slug) = &changes.slug {
            if self.articles.values().any(|a| a.id != id && &a.slug == slug) {
                return Err(StoreError::UniqueViolation(UniqueKey::ArticleSlug));
            }
        }
        let article = self.articles.get_mut(&id).ok_or(StoreError::NotFound)?;
        if let Some(slug) = changes.slug {
            article.slug = slug;
        }
        if let Some(title) = changes.title {
            article.title = title;
        }
        if let Some(description) = changes.description {
            article.description = description;
        }
        if let Some(body) = changes.body {
            article.body = body;
        }
        if let Some(updated_at) = changes.updated_at {
            article.updated_at = Some(updated_at);
        }
        let article = article.clone();
        self.record(&article)
    }

    fn delete_article(&mut self, id: i32) -> StoreResult<()> {
        self.comments.retain(|_, c| c.article_id != id);
        self.favorites.retain(|(_, article_id)| *article_id != id);
        self.article_tags.retain(|(article_id, _)| *article_id != id);
        self.articles.remove(&id);
        Ok(())
    }

    fn list_articles(&mut self, query: &ArticleQuery) -> StoreResult<Vec<ArticleRecord>> {
        let tag_id = match &query.tag {
            Some(name) => match self.tag_id_by_name(name) {
                Some(id) => Some(id),
                None => return Ok(Vec::new()),
            },
            None => None,
        };
        let author_id = match &query.author {
            Some(username) => match self.user_id_by_name(username) {
                Some(id) => Some(id),
                None => return Ok(Vec::new()),
            },
            None => None,
        };
        let favoriter_id = match &query.favorited_by {
            Some(username) => match self.user_id_by_name(username) {
                Some(id) => Some(id),
                None => return Ok(Vec::new()),
            },
            None => None,
        };

        let rows: Vec<&Article> = self
            .articles
            .values()
            .filter(|a| is_visible(a, query.viewer_id))
            .filter(|a| tag_id.map_or(true, |t| self.article_tags.contains(&(a.id, t))))
            .filter(|a| author_id.map_or(true, |u| a.author_id == u))
            .filter(|a| favoriter_id.map_or(true, |u| self.favorites.contains(&(u, a.id))))
            .collect();
        self.records(Self::page(rows, query.limit, query.offset))
    }

    fn feed_articles(
        &mut self,
        author_ids: &[i32],
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<ArticleRecord>> {
        let rows: Vec<&Article> = self
            .articles
            .values()
            .filter(|a| !a.is_draft && author_ids.contains(&a.author_id))
            .collect();
        self.records(Self::page(rows, limit, offset))
    }

    fn drafts_by_slugs(
        &mut self,
        author_id: i32,
        slugs: &[String],
    ) -> StoreResult<Vec<ArticleRecord>> {
        let rows: Vec<&Article> = self
            .articles
            .values()
            .filter(|a| a.author_id == author_id && a.is_draft && slugs.contains(&a.slug))
            .collect();
        self.records(rows)
    }

    fn mark_published(&mut self, ids: &[i32]) -> StoreResult<Vec<ArticleRecord>> {
        for id in ids {
            let article = self.articles.get_mut(id).ok_or(StoreError::NotFound)?;
            article.is_draft = false;
        }
        let rows: Vec<&Article> = self
            .articles
            .values()
            .filter(|a| ids.contains(&a.id))
            .collect();
        self.records(Self::page(rows, ids.len() as i64, 0))
    }

    fn favorite_exists(&mut self, user_id: i32, article_id: i32) -> StoreResult<bool> {
        Ok(self.favorites.contains(&(user_id, article_id)))
    }

    fn insert_favorite(&mut self, user_id: i32, article_id: i32) -> StoreResult<()> {
        if !self.favorites.insert((user_id, article_id)) {
            return Err(StoreError::UniqueViolation(UniqueKey::Favorite));
        }
        Ok(())
    }

    fn delete_favorite(&mut self, user_id: i32, article_id: i32) -> StoreResult<bool> {
        Ok(self.favorites.remove(&(user_id, article_id)))
    }

    fn insert_comment(&mut self, comment: NewComment) -> StoreResult<(Comment, User)> {
        let author = self
            .users
            .get(&comment.author_id)
            .cloned()
            .ok_or_else(|| StoreError::Backend(format!("missing author {}", comment.author_id)))?;
        self.next_comment_id += 1;
        let comment = Comment {
            id: self.next_comment_id,
            article_id: comment.article_id,
            author_id: comment.author_id,
            body: comment.body,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
        };
        self.comments.insert(comment.id, comment.clone());
        Ok((comment, author))
    }

    fn comment_by_id(&mut self, id: i32) -> StoreResult<Option<Comment>> {
        Ok(self.comments.get(&id).cloned())
    }

    fn comments_for_article(&mut self, article_id: i32) -> StoreResult<Vec<(Comment, User)>> {
        self.comments
            .values()
            .filter(|c| c.article_id == article_id)
            .map(|c| {
                let author = self
                    .users
                    .get(&c.author_id)
                    .cloned()
                    .ok_or_else(|| StoreError::Backend(format!("missing author {}", c.author_id)))?;
                Ok((c.clone(), author))
            })
            .collect()
    }

    fn delete_comment(&mut self, id: i32) -> StoreResult<()> {
        self.comments.remove(&id);
        Ok(())
    }

    fn tag_names(&mut self) -> StoreResult<Vec<String>> {
        let mut names: Vec<String> = self.tags.values().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn interaction_rows(&mut self, author_id: i32) -> StoreResult<Vec<InteractionRow>> {
        Ok(self
            .articles
            .values()
            .filter(|a| a.author_id == author_id)
            .map(|a| InteractionRow {
                article_id: a.id,
                created_at: a.created_at,
                comments: self.comments.values().filter(|c| c.article_id == a.id).count() as i64,
                favorites: self
                    .favorites
                    .iter()
                    .filter(|(_, article_id)| *article_id == a.id)
                    .count() as i64,
            })
            .collect())
    }
}
