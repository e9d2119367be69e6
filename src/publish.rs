use log::info;

use crate::article::ArticleList;
use crate::store::Store;
use crate::types::{ApiResult, Error, NotFound, ValidationError};

// All-or-nothing at the decision stage: every slug must name one of the
// caller's drafts or nothing is published. The state flip itself runs in one
// store transaction.
pub fn publish_drafts<S: Store>(
    store: &mut S,
    author_id: i32,
    slugs: &[String],
) -> ApiResult<ArticleList> {
    if slugs.is_empty() {
        return Err(ValidationError::from("slugs", "no slugs to publish").into());
    }
    let drafts = store.drafts_by_slugs(author_id, slugs)?;
    let found: Vec<&str> = drafts.iter().map(|r| r.article.slug.as_str()).collect();
    let missing: Vec<String> = slugs
        .iter()
        .filter(|slug| !found.contains(&slug.as_str()))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(Error::NotFound(NotFound::Drafts { slugs: missing }));
    }

    let ids: Vec<i32> = drafts.iter().map(|r| r.article.id).collect();
    info!("publishing {} draft(s) for user {}", ids.len(), author_id);
    let published = store.mark_published(&ids)?;
    Ok(ArticleList::from_records(&published, Some(author_id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::{self, ArticleDraft};
    use crate::store::MemoryStore;
    use crate::test_support::{draft_input, new_user};
    use pretty_assertions::assert_eq;

    fn slugs(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_publish_flips_all_requested_drafts() {
        let mut store = MemoryStore::new();
        let jake = new_user(&mut store, "jake");
        article::create(&mut store, jake, draft_input("One")).unwrap();
        article::create(&mut store, jake, draft_input("Two")).unwrap();

        let result = publish_drafts(&mut store, jake, &slugs(&["one", "two"])).unwrap();
        assert_eq!(result.articles_count, 2);
        assert!(result.articles.iter().all(|a| !a.is_draft));
        // Now visible to everyone.
        assert!(article::get_by_slug(&mut store, "one", None).is_ok());
        assert!(article::get_by_slug(&mut store, "two", None).is_ok());
    }

    #[test]
    fn test_missing_slug_fails_whole_batch() {
        let mut store = MemoryStore::new();
        let jake = new_user(&mut store, "jake");
        article::create(&mut store, jake, draft_input("Owned Draft")).unwrap();

        let err =
            publish_drafts(&mut store, jake, &slugs(&["owned-draft", "unknown"])).unwrap_err();
        assert_eq!(err, Error::NotFound(NotFound::Drafts { slugs: vec!["unknown".into()] }));
        // The owned draft was not touched.
        assert!(article::get_by_slug(&mut store, "owned-draft", None).is_err());
        let own = article::get_by_slug(&mut store, "owned-draft", Some(jake)).unwrap();
        assert!(own.is_draft);
    }

    #[test]
    fn test_foreign_draft_counts_as_missing() {
        let mut store = MemoryStore::new();
        let jake = new_user(&mut store, "jake");
        let anah = new_user(&mut store, "anah");
        article::create(&mut store, anah, draft_input("Not Yours")).unwrap();

        let err = publish_drafts(&mut store, jake, &slugs(&["not-yours"])).unwrap_err();
        assert_eq!(err, Error::NotFound(NotFound::Drafts { slugs: vec!["not-yours".into()] }));
    }

    #[test]
    fn test_already_published_counts_as_missing() {
        let mut store = MemoryStore::new();
        let jake = new_user(&mut store, "jake");
        let input = ArticleDraft { is_draft: Some(false), ..draft_input("Live Already") };
        article::create(&mut store, jake, input).unwrap();

        let err = publish_drafts(&mut store, jake, &slugs(&["live-already"])).unwrap_err();
        assert_eq!(
            err,
            Error::NotFound(NotFound::Drafts { slugs: vec!["live-already".into()] })
        );
    }

    #[test]
    fn test_empty_slug_list_is_invalid_input() {
        let mut store = MemoryStore::new();
        let jake = new_user(&mut store, "jake");
        assert!(matches!(
            publish_drafts(&mut store, jake, &[]),
            Err(Error::Validation(_))
        ));
    }
}
