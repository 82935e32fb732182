use pretty_assertions::assert_eq;
use serde_json::json;
use trellis_lib::{
    best_page,
    config::{Config, TypeConfig},
    frontmatter_file::Keeper,
    join::NoJoins,
    list,
    record::Document,
    Engine, Error,
};

macro_rules! doc {
    ($tokens:tt) => {
        serde_json::from_value::<Document>(json!($tokens)).unwrap()
    };
}

fn make_test_keeper() -> Keeper {
    let mut docs = (0..25)
        .map(|i| {
            let tags = match i % 3 {
                0 => json!(["red"]),
                1 => json!(["blue"]),
                _ => json!(["red", "blue"]),
            };
            doc!({
                "_id": format!("post-{i:02}"),
                "type": "blogPost",
                "slug": format!("post-{i:02}"),
                "sortTitle": format!("post {i:02}"),
                "tags": tags,
                "published": true
            })
        })
        .collect::<Vec<_>>();

    docs.push(doc!({ "_id": "odd-one", "type": "blogPost", "slug": "odd-one", "sortTitle": "odd one", "tags": ["green"] }));
    docs.push(doc!({ "_id": "page-a", "type": "blog", "slug": "/red", "sortTitle": "a", "settings": { "tags": ["red"] } }));
    docs.push(doc!({ "_id": "page-b", "type": "blog", "slug": "/blue", "sortTitle": "b", "settings": { "tags": ["blue"] } }));
    docs.push(doc!({ "_id": "page-c", "type": "blog", "slug": "/all/", "sortTitle": "c", "settings": {} }));

    Keeper::from_documents(docs)
}

fn make_test_config() -> Config {
    let mut config = Config::default();
    config.types.insert(
        "blogPost".to_owned(),
        TypeConfig {
            pages: vec!["blog".to_owned()],
            ..TypeConfig::default()
        },
    );
    config
}

async fn best_page_id(engine: &Engine<'_, Keeper>, slug: &str) -> Option<String> {
    best_page::lookup(
        engine,
        best_page::Args {
            kind: "blogPost".to_owned(),
            slug: slug.to_owned(),
            ..best_page::Args::default()
        },
    )
    .await
    .unwrap()
    .map(|page| page.id)
}

#[tokio::test]
async fn items_find_their_most_relevant_page() {
    let keeper = make_test_keeper();
    let config = make_test_config();
    let engine = Engine::new(&keeper, &config, &NoJoins);

    assert_eq!(Some("page-a".to_owned()), best_page_id(&engine, "post-00").await);
    assert_eq!(Some("page-b".to_owned()), best_page_id(&engine, "post-01").await);
    assert_eq!(Some("page-c".to_owned()), best_page_id(&engine, "odd-one").await);
    // {red, blue} scores 1 against A and B alike and -1 against C; A comes first.
    assert_eq!(Some("page-a".to_owned()), best_page_id(&engine, "post-02").await);
}

#[tokio::test]
async fn unknown_item_is_not_found() {
    let keeper = make_test_keeper();
    let config = make_test_config();
    let engine = Engine::new(&keeper, &config, &NoJoins);

    let err = best_page::lookup(
        &engine,
        best_page::Args {
            kind: "blogPost".to_owned(),
            slug: "nope".to_owned(),
            ..best_page::Args::default()
        },
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::NotFound { .. }));
}

#[tokio::test]
async fn listing_permalinks_use_best_pages() {
    let keeper = make_test_keeper();
    let config = make_test_config();
    let engine = Engine::new(&keeper, &config, &NoJoins);

    let response = list::query(
        &engine,
        list::Args {
            kind: "blogPost".to_owned(),
            filter: json!({ "perPage": 30, "permalink": true }),
            ..list::Args::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(26, response.total);
    let url_of = |slug: &str| {
        response
            .items
            .iter()
            .find(|item| item.slug == slug)
            .and_then(|item| item.url.clone())
    };
    assert_eq!(Some("/red/post-00".to_owned()), url_of("post-00"));
    assert_eq!(Some("/blue/post-01".to_owned()), url_of("post-01"));
    assert_eq!(Some("/all/odd-one".to_owned()), url_of("odd-one"));
}

#[tokio::test]
async fn active_tag_and_page_restriction_intersect() {
    let keeper = make_test_keeper();
    let config = make_test_config();
    let engine = Engine::new(&keeper, &config, &NoJoins);

    let response = list::query(
        &engine,
        list::Args {
            kind: "blogPost".to_owned(),
            page: Some("/red".to_owned()),
            params: [("tag".to_owned(), "blue".to_owned())].into(),
            filter: json!({ "perPage": 30 }),
            ..list::Args::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(8, response.total);
    assert!(response
        .items
        .iter()
        .all(|item| item.tags.contains(&"red".to_owned()) && item.tags.contains(&"blue".to_owned())));
}
