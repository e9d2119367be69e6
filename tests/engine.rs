use inkpost::article::{self, ArticleDraft, ArticleUpdate, ListQuery};
use inkpost::comment;
use inkpost::feed::{self, FeedQuery};
use inkpost::profile;
use inkpost::publish;
use inkpost::stats;
use inkpost::store::MemoryStore;
use inkpost::types::{Conflict, Error, NotFound};
use inkpost::users::models::NewUser;
use inkpost::Store;

fn init() -> MemoryStore {
    let _ = env_logger::builder().is_test(true).try_init();
    MemoryStore::new()
}

fn register(store: &mut MemoryStore, username: &str) -> i32 {
    store
        .insert_user(NewUser {
            email: format!("{}@example.com", username),
            username: username.to_owned(),
            password_hash: "$argon2$stub".to_owned(),
            bio: None,
            image: None,
        })
        .unwrap()
        .id
}

fn draft(title: &str, tags: &[&str]) -> ArticleDraft {
    ArticleDraft {
        title: title.to_owned(),
        description: "a description".to_owned(),
        body: "a body".to_owned(),
        tag_list: tags.iter().map(|t| t.to_string()).collect(),
        is_draft: None,
    }
}

fn published(title: &str, tags: &[&str]) -> ArticleDraft {
    ArticleDraft { is_draft: Some(false), ..draft(title, tags) }
}

#[test]
fn draft_lifecycle_from_creation_to_feed() {
    let mut store = init();
    let author = register(&mut store, "celeb");
    let reader = register(&mut store, "reader");

    // Authored as a draft: only the author can see it anywhere.
    article::create(&mut store, author, draft("How To Train Your Dragon", &["dragons"])).unwrap();
    assert!(matches!(
        article::get_by_slug(&mut store, "how-to-train-your-dragon", Some(reader)),
        Err(Error::NotFound(_))
    ));
    assert_eq!(article::list(&mut store, Some(reader), ListQuery::default()).unwrap().articles_count, 0);

    profile::follow(&mut store, reader, "celeb").unwrap();
    assert_eq!(feed::feed(&mut store, reader, FeedQuery::default()).unwrap().articles_count, 0);

    // Publishing flips the switch for everyone.
    publish::publish_drafts(&mut store, author, &["how-to-train-your-dragon".to_owned()])
        .unwrap();
    let view = article::get_by_slug(&mut store, "how-to-train-your-dragon", Some(reader)).unwrap();
    assert!(!view.is_draft);
    assert_eq!(view.author.following, Some(true));

    let result = feed::feed(&mut store, reader, FeedQuery::default()).unwrap();
    assert_eq!(result.articles_count, 1);
    assert_eq!(result.articles[0].slug, "how-to-train-your-dragon");
}

#[test]
fn favorite_comment_and_stats_flow() {
    let mut store = init();
    let author = register(&mut store, "celeb");
    let fan = register(&mut store, "fan");
    let lurker = register(&mut store, "lurker");

    article::create(&mut store, author, published("Dragon Training 101", &["dragons"])).unwrap();

    let view = article::favorite(&mut store, fan, "dragon-training-101").unwrap();
    assert_eq!(view.favorited, Some(true));
    assert_eq!(view.favorites_count, 1);
    article::favorite(&mut store, lurker, "dragon-training-101").unwrap();

    comment::add(&mut store, fan, "dragon-training-101", "It takes a Jacobian").unwrap();
    let comments = comment::list(&mut store, None, "dragon-training-101").unwrap();
    assert_eq!(comments.len(), 1);

    let view = article::get_by_slug(&mut store, "dragon-training-101", None).unwrap();
    assert_eq!(view.favorites_count, 2);
    assert_eq!(view.comments_count, 1);
    assert_eq!(view.favorited, None);

    // 2 likes + 1 comment land in one month bucket.
    let monthly = stats::monthly_high_interaction(&mut store, author, 3).unwrap();
    assert_eq!(monthly.len(), 1);
    assert_eq!(monthly[0].total_interactions, 3);
    assert!(stats::monthly_high_interaction(&mut store, author, 4).unwrap().is_empty());
}

#[test]
fn slug_collisions_and_renames() {
    let mut store = init();
    let author = register(&mut store, "celeb");
    article::create(&mut store, author, published("How To Train Your Dragon", &[])).unwrap();

    let err = article::create(
        &mut store,
        author,
        published("How to train: your dragon", &[]),
    )
    .unwrap_err();
    assert_eq!(
        err,
        Error::Conflict(Conflict::ArticleSlug { slug: "how-to-train-your-dragon".into() })
    );

    let view = article::update(
        &mut store,
        author,
        "how-to-train-your-dragon",
        ArticleUpdate { title: Some("How To Feed Your Dragon".into()), ..ArticleUpdate::default() },
    )
    .unwrap();
    assert_eq!(view.slug, "how-to-feed-your-dragon");

    // The old slug is free again.
    article::create(&mut store, author, published("How To Train Your Dragon", &[])).unwrap();
}

#[test]
fn publish_batch_is_all_or_nothing() {
    let mut store = init();
    let author = register(&mut store, "celeb");
    article::create(&mut store, author, draft("One", &[])).unwrap();
    article::create(&mut store, author, draft("Two", &[])).unwrap();

    let err = publish::publish_drafts(
        &mut store,
        author,
        &["one".to_owned(), "two".to_owned(), "three".to_owned()],
    )
    .unwrap_err();
    assert_eq!(err, Error::NotFound(NotFound::Drafts { slugs: vec!["three".into()] }));

    // Neither of the real drafts moved.
    assert!(article::get_by_slug(&mut store, "one", None).is_err());
    assert!(article::get_by_slug(&mut store, "two", None).is_err());

    let result =
        publish::publish_drafts(&mut store, author, &["one".to_owned(), "two".to_owned()])
            .unwrap();
    assert_eq!(result.articles_count, 2);
}

#[test]
fn viewer_scoped_fields_stay_out_of_anonymous_json() {
    let mut store = init();
    let author = register(&mut store, "celeb");
    article::create(&mut store, author, published("Public Knowledge", &[])).unwrap();

    let view = article::get_by_slug(&mut store, "public-knowledge", None).unwrap();
    let json = serde_json::to_value(&view).unwrap();
    assert!(json.get("favorited").is_none());
    assert!(json["author"].get("following").is_none());
    assert_eq!(json["favoritesCount"], 0);
    assert_eq!(json["commentsCount"], 0);

    let view = article::get_by_slug(&mut store, "public-knowledge", Some(author)).unwrap();
    let json = serde_json::to_value(&view).unwrap();
    assert_eq!(json["favorited"], false);
    // Self-view: still no following flag on the author block.
    assert!(json["author"].get("following").is_none());
}

#[test]
fn deleting_an_article_takes_its_interactions_along() {
    let mut store = init();
    let author = register(&mut store, "celeb");
    let fan = register(&mut store, "fan");
    article::create(&mut store, author, published("Ephemeral", &["gone"])).unwrap();
    article::favorite(&mut store, fan, "ephemeral").unwrap();
    comment::add(&mut store, fan, "ephemeral", "first!").unwrap();

    article::delete(&mut store, author, "ephemeral").unwrap();
    assert!(matches!(
        article::get_by_slug(&mut store, "ephemeral", Some(author)),
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        comment::list(&mut store, None, "ephemeral"),
        Err(Error::NotFound(_))
    ));
    // The tag itself survives; tags are never deleted.
    assert_eq!(article::tags(&mut store).unwrap(), vec!["gone".to_owned()]);
}
