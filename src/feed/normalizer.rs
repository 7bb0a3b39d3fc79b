use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::storage::NewArticle;
use crate::util::summarize;

/// Maximum characters in a derived summary
const SUMMARY_CHARS: usize = 200;

/// Raw feed item as delivered by the upstream parser.
///
/// Which fields are present varies wildly between feeds and formats (RSS
/// `description` vs. `content:encoded` vs. Atom `summary`, `dc:creator` vs.
/// `author`, four different places a thumbnail can hide), so every field is
/// optional and normalization fills the gaps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawItem {
    pub title: Option<String>,
    pub link: Option<String>,
    pub content: Option<String>,
    pub content_encoded: Option<String>,
    pub summary: Option<String>,
    pub creator: Option<String>,
    pub author: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub guid: Option<String>,
    pub thumbnail_url: Option<String>,
    pub media_url: Option<String>,
    pub enclosure_url: Option<String>,
    pub enclosure_mime: Option<String>,
}

/// Normalize a raw feed item into a canonical article candidate.
///
/// Pure and infallible: partial or entirely empty input still produces a
/// best-effort result. Rules:
///
/// - title falls back to `"Untitled"`, link to `""`
/// - content is the first non-empty of encoded content, plain content,
///   summary
/// - summary is the content stripped of HTML and truncated to 200 chars
/// - author prefers the `dc:creator` field over `author`
/// - publication date falls back to the current time
/// - guid prefers the explicit id, then the link, then a derived token
/// - thumbnail resolution priority: explicit thumbnail, media url,
///   image-typed enclosure, first `<img src>` inside the content
pub fn normalize_item(item: RawItem) -> NewArticle {
    let RawItem {
        title,
        link,
        content,
        content_encoded,
        summary,
        creator,
        author,
        published,
        guid,
        thumbnail_url,
        media_url,
        enclosure_url,
        enclosure_mime,
    } = item;

    let content = [content_encoded, content, summary]
        .into_iter()
        .flatten()
        .find(|c| !c.trim().is_empty())
        .unwrap_or_default();

    let title = title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| "Untitled".to_string());
    let link = link.filter(|l| !l.trim().is_empty()).unwrap_or_default();
    let author = creator
        .filter(|c| !c.trim().is_empty())
        .or(author.filter(|a| !a.trim().is_empty()));
    let published = published
        .map(|d| d.timestamp())
        .unwrap_or_else(|| Utc::now().timestamp());

    let thumbnail = thumbnail_url
        .filter(|u| !u.trim().is_empty())
        .or(media_url.filter(|u| !u.trim().is_empty()))
        .or(enclosure_url
            .filter(|u| !u.trim().is_empty())
            .filter(|_| enclosure_mime.as_deref().is_some_and(|m| m.starts_with("image/"))))
        .or_else(|| first_img_src(&content));

    let guid = guid
        .map(|g| g.trim().to_string())
        .filter(|g| !g.is_empty())
        .or_else(|| (!link.is_empty()).then(|| link.clone()))
        .unwrap_or_else(|| derive_guid(&title, &link, published));

    NewArticle {
        guid,
        title,
        link,
        summary: summarize(&content, SUMMARY_CHARS),
        content,
        author,
        published,
        thumbnail,
    }
}

/// Deterministic fallback identifier for items that carry neither a guid nor
/// a link. Re-fetching the same (title, link, date) triple must land on the
/// same token or deduplication falls apart.
fn derive_guid(title: &str, link: &str, published: i64) -> String {
    let input = format!("{}|{}|{}", title, link, published);
    format!("{:x}", Sha256::digest(input.as_bytes()))
}

fn img_pattern() -> &'static Regex {
    static IMG: OnceLock<Regex> = OnceLock::new();
    IMG.get_or_init(|| {
        Regex::new(r#"<img[^>]+src\s*=\s*["']([^"']+)["']"#).expect("hardcoded pattern compiles")
    })
}

/// First `<img src="...">` target found inside raw HTML content, if any
fn first_img_src(html: &str) -> Option<String> {
    img_pattern()
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dated(secs: i64) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(secs, 0)
    }

    #[test]
    fn fills_title_and_link_fallbacks() {
        let article = normalize_item(RawItem::default());
        assert_eq!(article.title, "Untitled");
        assert_eq!(article.link, "");

        let article = normalize_item(RawItem {
            title: Some("   ".to_string()),
            ..Default::default()
        });
        assert_eq!(article.title, "Untitled", "whitespace-only title is absent");
    }

    #[test]
    fn content_priority_prefers_encoded() {
        let article = normalize_item(RawItem {
            content_encoded: Some("<p>full body</p>".to_string()),
            content: Some("short body".to_string()),
            summary: Some("blurb".to_string()),
            ..Default::default()
        });
        assert_eq!(article.content, "<p>full body</p>");

        let article = normalize_item(RawItem {
            content: Some("short body".to_string()),
            summary: Some("blurb".to_string()),
            ..Default::default()
        });
        assert_eq!(article.content, "short body");

        let article = normalize_item(RawItem {
            summary: Some("blurb".to_string()),
            ..Default::default()
        });
        assert_eq!(article.content, "blurb");

        let article = normalize_item(RawItem::default());
        assert_eq!(article.content, "");
    }

    #[test]
    fn empty_encoded_content_falls_through() {
        let article = normalize_item(RawItem {
            content_encoded: Some("  ".to_string()),
            content: Some("real body".to_string()),
            ..Default::default()
        });
        assert_eq!(article.content, "real body");
    }

    #[test]
    fn summary_is_stripped_and_truncated() {
        let body = format!("<p>{}</p>", "word ".repeat(100));
        let article = normalize_item(RawItem {
            content_encoded: Some(body),
            ..Default::default()
        });
        assert!(!article.summary.contains('<'));
        assert!(article.summary.ends_with("..."));
        assert_eq!(article.summary.chars().count(), 203);
    }

    #[test]
    fn author_prefers_creator() {
        let article = normalize_item(RawItem {
            creator: Some("Alice".to_string()),
            author: Some("Bob".to_string()),
            ..Default::default()
        });
        assert_eq!(article.author.as_deref(), Some("Alice"));

        let article = normalize_item(RawItem {
            author: Some("Bob".to_string()),
            ..Default::default()
        });
        assert_eq!(article.author.as_deref(), Some("Bob"));

        let article = normalize_item(RawItem::default());
        assert_eq!(article.author, None);
    }

    #[test]
    fn missing_date_defaults_to_now() {
        let before = Utc::now().timestamp();
        let article = normalize_item(RawItem::default());
        let after = Utc::now().timestamp();
        assert!(article.published >= before && article.published <= after);

        let article = normalize_item(RawItem {
            published: dated(1704067200),
            ..Default::default()
        });
        assert_eq!(article.published, 1704067200);
    }

    #[test]
    fn guid_prefers_explicit_then_link() {
        let article = normalize_item(RawItem {
            guid: Some("  tag:example.com,2024:1  ".to_string()),
            link: Some("https://example.com/post".to_string()),
            ..Default::default()
        });
        assert_eq!(article.guid, "tag:example.com,2024:1");

        let article = normalize_item(RawItem {
            link: Some("https://example.com/post".to_string()),
            ..Default::default()
        });
        assert_eq!(article.guid, "https://example.com/post");
    }

    #[test]
    fn derived_guid_is_stable_across_fetches() {
        let raw = RawItem {
            title: Some("Hello".to_string()),
            published: dated(1704067200),
            ..Default::default()
        };
        let first = normalize_item(raw.clone());
        let second = normalize_item(raw);
        assert_eq!(first.guid, second.guid);
        assert_eq!(first.guid.len(), 64, "derived token is a hex sha-256");

        let other = normalize_item(RawItem {
            title: Some("Different".to_string()),
            published: dated(1704067200),
            ..Default::default()
        });
        assert_ne!(first.guid, other.guid);
    }

    #[test]
    fn thumbnail_resolution_priority() {
        let everything = RawItem {
            thumbnail_url: Some("https://img.example.com/thumb.png".to_string()),
            media_url: Some("https://img.example.com/media.png".to_string()),
            enclosure_url: Some("https://img.example.com/enc.png".to_string()),
            enclosure_mime: Some("image/png".to_string()),
            content_encoded: Some(r#"<img src="https://img.example.com/inline.png">"#.to_string()),
            ..Default::default()
        };
        let article = normalize_item(everything.clone());
        assert_eq!(article.thumbnail.as_deref(), Some("https://img.example.com/thumb.png"));

        let article = normalize_item(RawItem {
            thumbnail_url: None,
            ..everything.clone()
        });
        assert_eq!(article.thumbnail.as_deref(), Some("https://img.example.com/media.png"));

        let article = normalize_item(RawItem {
            thumbnail_url: None,
            media_url: None,
            ..everything.clone()
        });
        assert_eq!(article.thumbnail.as_deref(), Some("https://img.example.com/enc.png"));

        let article = normalize_item(RawItem {
            thumbnail_url: None,
            media_url: None,
            enclosure_url: None,
            ..everything
        });
        assert_eq!(article.thumbnail.as_deref(), Some("https://img.example.com/inline.png"));
    }

    #[test]
    fn non_image_enclosure_is_skipped() {
        let article = normalize_item(RawItem {
            enclosure_url: Some("https://example.com/episode.mp3".to_string()),
            enclosure_mime: Some("audio/mpeg".to_string()),
            ..Default::default()
        });
        assert_eq!(article.thumbnail, None);

        // An enclosure without a type is not trusted as an image either
        let article = normalize_item(RawItem {
            enclosure_url: Some("https://example.com/file.png".to_string()),
            ..Default::default()
        });
        assert_eq!(article.thumbnail, None);
    }

    #[test]
    fn img_extraction_handles_quote_styles() {
        assert_eq!(
            first_img_src(r#"<p>x</p><img class="a" src="https://e.com/1.png" alt="">"#),
            Some("https://e.com/1.png".to_string())
        );
        assert_eq!(
            first_img_src(r#"<img src='https://e.com/2.png'>"#),
            Some("https://e.com/2.png".to_string())
        );
        assert_eq!(first_img_src("<p>no images here</p>"), None);
    }

    proptest::proptest! {
        #[test]
        fn derived_guid_is_deterministic(
            title in ".{0,64}",
            link in ".{0,64}",
            ts in 0i64..4_102_444_800i64,
        ) {
            proptest::prop_assert_eq!(
                derive_guid(&title, &link, ts),
                derive_guid(&title, &link, ts)
            );
        }
    }
}
