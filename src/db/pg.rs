use std::collections::HashMap;

use chrono::NaiveDateTime;
use diesel::dsl::{count_star, exists};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::{delete, insert_into, select, update};
use log::debug;

use crate::article::{Article, ArticleChanges, NewArticle};
use crate::comment::{Comment, NewComment};
use crate::db::schema::{article_tags, articles, comments, favorites, follows, tags, users};
use crate::store::{
    ArticleQuery, ArticleRecord, InteractionRow, Store, StoreError, StoreResult, UniqueKey,
};
use crate::users::models::{NewUser, User, UserChanges};

impl From<DieselError> for StoreError {
    fn from(err: DieselError) -> StoreError {
        match err {
            DieselError::NotFound => StoreError::NotFound,
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                match info.constraint_name() {
                    Some("users_email_key") => StoreError::UniqueViolation(UniqueKey::UserEmail),
                    Some("users_username_key") => {
                        StoreError::UniqueViolation(UniqueKey::UserUsername)
                    }
                    Some("articles_slug_key") => {
                        StoreError::UniqueViolation(UniqueKey::ArticleSlug)
                    }
                    Some("tags_name_key") => StoreError::UniqueViolation(UniqueKey::TagName),
                    Some("favorites_pkey") => StoreError::UniqueViolation(UniqueKey::Favorite),
                    Some("follows_pkey") => StoreError::UniqueViolation(UniqueKey::Follow),
                    other => StoreError::Backend(format!(
                        "unique violation on unexpected constraint {:?}",
                        other
                    )),
                }
            }
            other => StoreError::Backend(other.to_string()),
        }
    }
}

// Hydrates joined records with a fixed number of batched queries so list
// responses never fan out per article.
fn assemble(
    conn: &mut PgConnection,
    rows: Vec<(Article, User)>,
) -> StoreResult<Vec<ArticleRecord>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let article_ids: Vec<i32> = rows.iter().map(|(a, _)| a.id).collect();
    let author_ids: Vec<i32> = rows.iter().map(|(_, u)| u.id).collect();
    debug!("hydrating {} article record(s)", article_ids.len());

    let mut tag_map: HashMap<i32, Vec<String>> = HashMap::new();
    for (article_id, name) in article_tags::table
        .inner_join(tags::table)
        .filter(article_tags::article_id.eq_any(&article_ids))
        .select((article_tags::article_id, tags::name))
        .load::<(i32, String)>(conn)?
    {
        tag_map.entry(article_id).or_default().push(name);
    }

    let mut favoriter_map: HashMap<i32, Vec<i32>> = HashMap::new();
    for (article_id, user_id) in favorites::table
        .filter(favorites::article_id.eq_any(&article_ids))
        .select((favorites::article_id, favorites::user_id))
        .load::<(i32, i32)>(conn)?
    {
        favoriter_map.entry(article_id).or_default().push(user_id);
    }

    let mut comment_map: HashMap<i32, Vec<i32>> = HashMap::new();
    for (article_id, comment_id) in comments::table
        .filter(comments::article_id.eq_any(&article_ids))
        .select((comments::article_id, comments::id))
        .load::<(i32, i32)>(conn)?
    {
        comment_map.entry(article_id).or_default().push(comment_id);
    }

    let mut follower_map: HashMap<i32, Vec<i32>> = HashMap::new();
    for (followed_id, follower_id) in follows::table
        .filter(follows::followed_id.eq_any(&author_ids))
        .select((follows::followed_id, follows::follower_id))
        .load::<(i32, i32)>(conn)?
    {
        follower_map.entry(followed_id).or_default().push(follower_id);
    }

    Ok(rows
        .into_iter()
        .map(|(article, author)| {
            let mut tags = tag_map.remove(&article.id).unwrap_or_default();
            tags.sort();
            ArticleRecord {
                author_follower_ids: follower_map.get(&author.id).cloned().unwrap_or_default(),
                tags,
                favoriter_ids: favoriter_map.remove(&article.id).unwrap_or_default(),
                comment_ids: comment_map.remove(&article.id).unwrap_or_default(),
                article,
                author,
            }
        })
        .collect())
}

fn attach_tags(conn: &mut PgConnection, article_id: i32, names: &[String]) -> StoreResult<()> {
    if names.is_empty() {
        return Ok(());
    }
    insert_into(tags::table)
        .values(names.iter().map(|n| tags::name.eq(n)).collect::<Vec<_>>())
        .on_conflict(tags::name)
        .do_nothing()
        .execute(conn)?;
    let tag_ids = tags::table
        .filter(tags::name.eq_any(names))
        .select(tags::id)
        .load::<i32>(conn)?;
    insert_into(article_tags::table)
        .values(
            tag_ids
                .iter()
                .map(|tag_id| {
                    (
                        article_tags::article_id.eq(article_id),
                        article_tags::tag_id.eq(*tag_id),
                    )
                })
                .collect::<Vec<_>>(),
        )
        .on_conflict_do_nothing()
        .execute(conn)?;
    Ok(())
}

fn one_record(
    conn: &mut PgConnection,
    article: Article,
) -> StoreResult<ArticleRecord> {
    let author = users::table
        .find(article.author_id)
        .select(User::as_select())
        .first::<User>(conn)?;
    assemble(conn, vec![(article, author)])?
        .pop()
        .ok_or_else(|| StoreError::Backend("record hydration came back empty".into()))
}

impl Store for PgConnection {
    fn insert_user(&mut self, user: NewUser) -> StoreResult<User> {
        insert_into(users::table)
            .values(&user)
            .returning(User::as_returning())
            .get_result(self)
            .map_err(Into::into)
    }

    fn user_by_id(&mut self, id: i32) -> StoreResult<Option<User>> {
        users::table
            .find(id)
            .select(User::as_select())
            .first(self)
            .optional()
            .map_err(Into::into)
    }

    fn user_by_username(&mut self, username: &str) -> StoreResult<Option<User>> {
        users::table
            .filter(users::username.eq(username))
            .select(User::as_select())
            .first(self)
            .optional()
            .map_err(Into::into)
    }

    fn user_by_email(&mut self, email: &str) -> StoreResult<Option<User>> {
        users::table
            .filter(users::email.eq(email))
            .select(User::as_select())
            .first(self)
            .optional()
            .map_err(Into::into)
    }

    fn update_user(&mut self, id: i32, changes: UserChanges) -> StoreResult<User> {
        update(users::table.find(id))
            .set(&changes)
            .returning(User::as_returning())
            .get_result(self)
            .map_err(Into::into)
    }

    fn follow_exists(&mut self, follower_id: i32, followed_id: i32) -> StoreResult<bool> {
        select(exists(
            follows::table
                .filter(follows::follower_id.eq(follower_id))
                .filter(follows::followed_id.eq(followed_id)),
        ))
        .get_result(self)
        .map_err(Into::into)
    }

    // No on-conflict clause: a racing duplicate must surface as a unique
    // violation so the engine can report the conflict.
    fn insert_follow(&mut self, follower_id: i32, followed_id: i32) -> StoreResult<()> {
        insert_into(follows::table)
            .values((
                follows::follower_id.eq(follower_id),
                follows::followed_id.eq(followed_id),
            ))
            .execute(self)?;
        Ok(())
    }

    fn delete_follow(&mut self, follower_id: i32, followed_id: i32) -> StoreResult<bool> {
        let deleted = delete(
            follows::table
                .filter(follows::follower_id.eq(follower_id))
                .filter(follows::followed_id.eq(followed_id)),
        )
        .execute(self)?;
        Ok(deleted > 0)
    }

    fn following_ids(&mut self, follower_id: i32) -> StoreResult<Vec<i32>> {
        follows::table
            .filter(follows::follower_id.eq(follower_id))
            .select(follows::followed_id)
            .load(self)
            .map_err(Into::into)
    }

    fn insert_article(
        &mut self,
        article: NewArticle,
        tag_names: &[String],
    ) -> StoreResult<ArticleRecord> {
        self.transaction(|conn| {
            let article: Article = insert_into(articles::table)
                .values(&article)
                .returning(Article::as_returning())
                .get_result(conn)?;
            attach_tags(conn, article.id, tag_names)?;
            one_record(conn, article)
        })
    }

    fn article_by_slug(&mut self, slug: &str) -> StoreResult<Option<ArticleRecord>> {
        self.transaction(|conn| {
            let article = articles::table
                .filter(articles::slug.eq(slug))
                .select(Article::as_select())
                .first::<Article>(conn)
                .optional()?;
            match article {
                Some(article) => Ok(Some(one_record(conn, article)?)),
                None => Ok(None),
            }
        })
    }

    fn update_article(&mut self, id: i32, changes: ArticleChanges) -> StoreResult<ArticleRecord> {
        self.transaction(|conn| {
            let article: Article = update(articles::table.find(id))
                .set(&changes)
                .returning(Article::as_returning())
                .get_result(conn)?;
            one_record(conn, article)
        })
    }

    fn delete_article(&mut self, id: i32) -> StoreResult<()> {
        self.transaction(|conn| {
            delete(comments::table.filter(comments::article_id.eq(id))).execute(conn)?;
            delete(favorites::table.filter(favorites::article_id.eq(id))).execute(conn)?;
            delete(article_tags::table.filter(article_tags::article_id.eq(id))).execute(conn)?;
            delete(articles::table.find(id)).execute(conn)?;
            Ok(())
        })
    }

    fn list_articles(&mut self, query: &ArticleQuery) -> StoreResult<Vec<ArticleRecord>> {
        self.transaction(|conn| {
            let mut q = articles::table
                .inner_join(users::table)
                .select((Article::as_select(), User::as_select()))
                .into_boxed();
            if let Some(tag) = &query.tag {
                let tagged = article_tags::table
                    .inner_join(tags::table)
                    .filter(tags::name.eq(tag.clone()))
                    .select(article_tags::article_id);
                q = q.filter(articles::id.eq_any(tagged));
            }
            if let Some(author) = &query.author {
                q = q.filter(users::username.eq(author.clone()));
            }
            if let Some(favoriter) = &query.favorited_by {
                let fav_user_ids: Vec<i32> = users::table
                    .filter(users::username.eq(favoriter.clone()))
                    .select(users::id)
                    .load(conn)?;
                let favorited = favorites::table
                    .filter(favorites::user_id.eq_any(fav_user_ids))
                    .select(favorites::article_id);
                q = q.filter(articles::id.eq_any(favorited));
            }
            q = match query.viewer_id {
                Some(viewer_id) => q.filter(
                    articles::is_draft
                        .eq(false)
                        .or(articles::author_id.eq(viewer_id)),
                ),
                None => q.filter(articles::is_draft.eq(false)),
            };
            let rows = q
                .order((articles::created_at.desc(), articles::id.desc()))
                .limit(query.limit)
                .offset(query.offset)
                .load::<(Article, User)>(conn)?;
            assemble(conn, rows)
        })
    }

    fn feed_articles(
        &mut self,
        author_ids: &[i32],
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<ArticleRecord>> {
        self.transaction(|conn| {
            let rows = articles::table
                .inner_join(users::table)
                .filter(articles::author_id.eq_any(author_ids))
                .filter(articles::is_draft.eq(false))
                .order((articles::created_at.desc(), articles::id.desc()))
                .limit(limit)
                .offset(offset)
                .select((Article::as_select(), User::as_select()))
                .load::<(Article, User)>(conn)?;
            assemble(conn, rows)
        })
    }

    fn drafts_by_slugs(
        &mut self,
        author_id: i32,
        slugs: &[String],
    ) -> StoreResult<Vec<ArticleRecord>> {
        self.transaction(|conn| {
            let rows = articles::table
                .inner_join(users::table)
                .filter(articles::author_id.eq(author_id))
                .filter(articles::is_draft.eq(true))
                .filter(articles::slug.eq_any(slugs))
                .select((Article::as_select(), User::as_select()))
                .load::<(Article, User)>(conn)?;
            assemble(conn, rows)
        })
    }

    fn mark_published(&mut self, ids: &[i32]) -> StoreResult<Vec<ArticleRecord>> {
        self.transaction(|conn| {
            update(articles::table.filter(articles::id.eq_any(ids)))
                .set(articles::is_draft.eq(false))
                .execute(conn)?;
            let rows = articles::table
                .inner_join(users::table)
                .filter(articles::id.eq_any(ids))
                .order((articles::created_at.desc(), articles::id.desc()))
                .select((Article::as_select(), User::as_select()))
                .load::<(Article, User)>(conn)?;
            assemble(conn, rows)
        })
    }

    fn favorite_exists(&mut self, user_id: i32, article_id: i32) -> StoreResult<bool> {
        select(exists(
            favorites::table
                .filter(favorites::user_id.eq(user_id))
                .filter(favorites::article_id.eq(article_id)),
        ))
        .get_result(self)
        .map_err(Into::into)
    }

    fn insert_favorite(&mut self, user_id: i32, article_id: i32) -> StoreResult<()> {
        insert_into(favorites::table)
            .values((
                favorites::user_id.eq(user_id),
                favorites::article_id.eq(article_id),
            ))
            .execute(self)?;
        Ok(())
    }

    fn delete_favorite(&mut self, user_id: i32, article_id: i32) -> StoreResult<bool> {
        let deleted = delete(
            favorites::table
                .filter(favorites::user_id.eq(user_id))
                .filter(favorites::article_id.eq(article_id)),
        )
        .execute(self)?;
        Ok(deleted > 0)
    }

    fn insert_comment(&mut self, comment: NewComment) -> StoreResult<(Comment, User)> {
        self.transaction(|conn| {
            let comment: Comment = insert_into(comments::table)
                .values(&comment)
                .returning(Comment::as_returning())
                .get_result(conn)?;
            let author = users::table
                .find(comment.author_id)
                .select(User::as_select())
                .first::<User>(conn)?;
            Ok((comment, author))
        })
    }

    fn comment_by_id(&mut self, id: i32) -> StoreResult<Option<Comment>> {
        comments::table
            .find(id)
            .select(Comment::as_select())
            .first(self)
            .optional()
            .map_err(Into::into)
    }

    fn comments_for_article(&mut self, article_id: i32) -> StoreResult<Vec<(Comment, User)>> {
        comments::table
            .inner_join(users::table)
            .filter(comments::article_id.eq(article_id))
            .order(comments::id.asc())
            .select((Comment::as_select(), User::as_select()))
            .load(self)
            .map_err(Into::into)
    }

    fn delete_comment(&mut self, id: i32) -> StoreResult<()> {
        delete(comments::table.find(id)).execute(self)?;
        Ok(())
    }

    fn tag_names(&mut self) -> StoreResult<Vec<String>> {
        tags::table
            .select(tags::name)
            .order(tags::name.asc())
            .load(self)
            .map_err(Into::into)
    }

    fn interaction_rows(&mut self, author_id: i32) -> StoreResult<Vec<InteractionRow>> {
        self.transaction(|conn| {
            let rows = articles::table
                .filter(articles::author_id.eq(author_id))
                .select((articles::id, articles::created_at))
                .load::<(i32, NaiveDateTime)>(conn)?;
            if rows.is_empty() {
                return Ok(Vec::new());
            }
            let ids: Vec<i32> = rows.iter().map(|(id, _)| *id).collect();
            let comment_counts: HashMap<i32, i64> = comments::table
                .filter(comments::article_id.eq_any(&ids))
                .group_by(comments::article_id)
                .select((comments::article_id, count_star()))
                .load::<(i32, i64)>(conn)?
                .into_iter()
                .collect();
            let favorite_counts: HashMap<i32, i64> = favorites::table
                .filter(favorites::article_id.eq_any(&ids))
                .group_by(favorites::article_id)
                .select((favorites::article_id, count_star()))
                .load::<(i32, i64)>(conn)?
                .into_iter()
                .collect();
            Ok(rows
                .into_iter()
                .map(|(article_id, created_at)| InteractionRow {
                    article_id,
                    created_at,
                    comments: comment_counts.get(&article_id).copied().unwrap_or(0),
                    favorites: favorite_counts.get(&article_id).copied().unwrap_or(0),
                })
                .collect())
        })
    }
}
