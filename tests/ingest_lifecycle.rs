//! Integration tests for the reading lifecycle: subscribe, refresh, read,
//! star, prune, unsubscribe.
//!
//! Each test runs against its own in-memory SQLite database, with a wiremock
//! server standing in for the remote feed, so the full fetch -> normalize ->
//! ingest path is exercised without touching the network.

use babelfeed::feed::{add_feed, refresh_feed};
use babelfeed::storage::{Database, NewArticle, DEFAULT_CATEGORY};
use babelfeed::translate::{OpenAiProvider, ProviderRegistry, Translator};
use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn test_db() -> Database {
    Database::open(":memory:").await.unwrap()
}

fn rss_response(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("Content-Type", "application/rss+xml")
}

/// Build a minimal RSS document from (guid, title) pairs.
fn rss_feed(title: &str, items: &[(&str, &str)]) -> String {
    let mut doc = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<rss version=\"2.0\"><channel><title>{}</title>",
        title
    );
    for (guid, item_title) in items {
        doc.push_str(&format!(
            "<item><guid>{guid}</guid><title>{item_title}</title>\
             <link>https://example.com/{guid}</link>\
             <description>Body of {item_title}</description>\
             <pubDate>Mon, 01 Jan 2024 00:00:00 GMT</pubDate></item>"
        ));
    }
    doc.push_str("</channel></rss>");
    doc
}

fn new_article(guid: &str, published: i64) -> NewArticle {
    NewArticle {
        guid: guid.to_string(),
        title: format!("Article {}", guid),
        link: format!("https://example.com/{}", guid),
        content: "<p>Body</p>".to_string(),
        summary: "Body".to_string(),
        author: None,
        published,
        thumbnail: None,
    }
}

// ============================================================================
// Refresh Idempotence
// ============================================================================

#[tokio::test]
async fn test_refresh_of_unchanged_feed_adds_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(rss_response(&rss_feed(
            "News",
            &[("a", "First"), ("b", "Second")],
        )))
        .mount(&server)
        .await;

    let db = test_db().await;
    let client = reqwest::Client::new();
    let url = format!("{}/feed.xml", server.uri());

    let feed = add_feed(&db, &client, &url, DEFAULT_CATEGORY).await.unwrap();
    assert_eq!(feed.unread_count, 2);

    assert_eq!(refresh_feed(&db, &client, &feed).await, 0);
    assert_eq!(refresh_feed(&db, &client, &feed).await, 0);

    let articles = db.get_articles_for_feed(feed.id, None).await.unwrap();
    assert_eq!(articles.len(), 2);
    let reloaded = db.get_feed(feed.id).await.unwrap().unwrap();
    assert_eq!(reloaded.unread_count, 2);
}

#[tokio::test]
async fn test_read_state_survives_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(rss_response(&rss_feed(
            "News",
            &[("a", "First"), ("b", "Second")],
        )))
        .mount(&server)
        .await;

    let db = test_db().await;
    let client = reqwest::Client::new();
    let url = format!("{}/feed.xml", server.uri());

    let feed = add_feed(&db, &client, &url, DEFAULT_CATEGORY).await.unwrap();
    let articles = db.get_articles_for_feed(feed.id, None).await.unwrap();
    db.mark_article_read(articles[0].id).await.unwrap();

    // The same payload arrives again; the read article must not come back
    // unread
    refresh_feed(&db, &client, &feed).await;

    let reread = db.get_article(articles[0].id).await.unwrap().unwrap();
    assert!(reread.read);
    let reloaded = db.get_feed(feed.id).await.unwrap().unwrap();
    assert_eq!(reloaded.unread_count, 1);
}

#[tokio::test]
async fn test_only_new_items_become_unread_after_mark_all() {
    let server = MockServer::start().await;
    // First request serves one item, later requests serve two
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(rss_response(&rss_feed("News", &[("a", "First")])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(rss_response(&rss_feed(
            "News",
            &[("a", "First"), ("b", "Second")],
        )))
        .mount(&server)
        .await;

    let db = test_db().await;
    let client = reqwest::Client::new();
    let url = format!("{}/feed.xml", server.uri());

    let feed = add_feed(&db, &client, &url, DEFAULT_CATEGORY).await.unwrap();
    db.mark_all_read(feed.id).await.unwrap();
    assert_eq!(db.get_feed(feed.id).await.unwrap().unwrap().unread_count, 0);

    assert_eq!(refresh_feed(&db, &client, &feed).await, 1);

    let reloaded = db.get_feed(feed.id).await.unwrap().unwrap();
    assert_eq!(reloaded.unread_count, 1, "only the new item is unread");
}

// ============================================================================
// Unsubscribe
// ============================================================================

#[tokio::test]
async fn test_unsubscribe_removes_articles_and_translations() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(rss_response(&rss_feed("News", &[("a", "First")])))
        .mount(&server)
        .await;

    let db = test_db().await;
    let client = reqwest::Client::new();
    let url = format!("{}/feed.xml", server.uri());

    let feed = add_feed(&db, &client, &url, DEFAULT_CATEGORY).await.unwrap();
    let articles = db.get_articles_for_feed(feed.id, None).await.unwrap();
    let article_id = articles[0].id;
    db.put_translation(article_id, "Body", "fr", "Corps")
        .await
        .unwrap();

    assert!(db.delete_feed(feed.id).await.unwrap());

    assert!(db.get_article(article_id).await.unwrap().is_none());
    assert!(db
        .list_translations(article_id)
        .await
        .unwrap()
        .is_empty());
    assert!(db.get_feeds().await.unwrap().is_empty());
}

// ============================================================================
// Retention
// ============================================================================

#[tokio::test]
async fn test_prune_spares_starred_and_recent_articles() {
    let db = test_db().await;
    let feed = db
        .insert_feed("https://example.com/feed.xml", "News", DEFAULT_CATEGORY, 30)
        .await
        .unwrap();

    let now = chrono::Utc::now().timestamp();
    let old = now - 40 * 86_400;
    let recent = now - 86_400;
    db.ingest_articles(
        feed.id,
        &[
            new_article("old-unstarred", old),
            new_article("old-starred", old),
            new_article("recent", recent),
        ],
    )
    .await
    .unwrap();

    let articles = db.get_articles_for_feed(feed.id, None).await.unwrap();
    let old_starred = articles
        .iter()
        .find(|a| a.guid == "old-starred")
        .unwrap();
    db.toggle_article_starred(old_starred.id).await.unwrap();

    let removed = db.prune_articles(30).await.unwrap();
    assert_eq!(removed, 1);

    let remaining = db.get_articles_for_feed(feed.id, None).await.unwrap();
    let guids: Vec<&str> = remaining.iter().map(|a| a.guid.as_str()).collect();
    assert!(guids.contains(&"old-starred"));
    assert!(guids.contains(&"recent"));
    assert!(!guids.contains(&"old-unstarred"));

    // Unread count reflects the removal
    let reloaded = db.get_feed(feed.id).await.unwrap().unwrap();
    assert_eq!(reloaded.unread_count, 2);
}

// ============================================================================
// End-to-End Reader Flow
// ============================================================================

/// The full path a user walks: subscribe, refresh, read an article,
/// translate it twice. The second translation must come from the cache, so
/// the backend sees exactly one request.
#[tokio::test]
async fn test_subscribe_refresh_read_translate_flow() {
    let feed_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(rss_response(&rss_feed(
            "World News",
            &[("a", "First Story"), ("b", "Second Story")],
        )))
        .mount(&feed_server)
        .await;

    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "最初の記事"}}]
        })))
        .expect(1)
        .mount(&backend)
        .await;

    let db = test_db().await;
    let client = reqwest::Client::new();
    let url = format!("{}/feed.xml", feed_server.uri());

    // Subscribe
    let feed = add_feed(&db, &client, &url, "News").await.unwrap();
    assert_eq!(feed.unread_count, 2);

    // Refresh: nothing changed upstream
    assert_eq!(refresh_feed(&db, &client, &feed).await, 0);

    // Read one article
    let articles = db.get_articles_for_feed(feed.id, None).await.unwrap();
    db.mark_article_read(articles[0].id).await.unwrap();
    assert_eq!(db.get_feed(feed.id).await.unwrap().unwrap().unread_count, 1);

    // Translate the article twice; the backend must only be hit once
    let mut registry = ProviderRegistry::new();
    registry.register(Box::new(OpenAiProvider::with_base_url(backend.uri())));
    let translator = Translator::new(db.clone(), client.clone(), registry);
    let credential = SecretString::from("sk-test");

    let first = translator
        .translate_article(articles[0].id, "ja", "openai", &credential)
        .await
        .unwrap();
    let second = translator
        .translate_article(articles[0].id, "ja", "openai", &credential)
        .await
        .unwrap();

    assert_eq!(first, "最初の記事");
    assert_eq!(second, first);

    let cached = db.list_translations(articles[0].id).await.unwrap();
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].target_lang, "ja");
}
