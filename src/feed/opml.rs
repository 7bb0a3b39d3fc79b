use anyhow::{Context, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

use crate::storage::{Feed, DEFAULT_CATEGORY};
use crate::util::validate_feed_url;

/// Maximum allowed nesting depth for OPML outline elements. Prevents stack
/// abuse from maliciously crafted deeply nested documents.
const MAX_OPML_DEPTH: usize = 50;

/// Errors that can occur during OPML parsing.
#[derive(Debug, Error)]
pub enum OpmlError {
    #[error("OPML nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),

    #[error("XML parse error: {0}")]
    XmlParse(String),

    #[error("Failed to read OPML file: {0}")]
    Io(#[from] std::io::Error),
}

/// A feed subscription exchanged through an OPML file.
///
/// On import, `category` is the text of the innermost named group outline
/// enclosing the feed (or the default category for top-level feeds). On
/// export, feeds are grouped into one outline per category.
#[derive(Debug, Clone, PartialEq)]
pub struct OpmlFeed {
    pub title: String,
    pub xml_url: String,
    pub category: String,
}

impl From<&Feed> for OpmlFeed {
    fn from(feed: &Feed) -> Self {
        OpmlFeed {
            title: feed.title.clone(),
            xml_url: feed.url.clone(),
            category: feed.category.clone(),
        }
    }
}

/// Parse an OPML file from disk and extract feed subscriptions.
///
/// Outline elements with an `xmlUrl` attribute become feeds; outline
/// elements without one are treated as category groups. Feeds whose URL
/// fails validation are skipped with a warning rather than failing the
/// whole import.
pub async fn parse(path: &str) -> Result<Vec<OpmlFeed>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read OPML file: {}", path))?;
    parse_opml_content(&content)
}

/// Parse OPML content and extract feed subscriptions with their categories.
///
/// XXE note: quick-xml (0.37) never parses `<!ENTITY>` declarations from a
/// DOCTYPE. Entity resolution only covers the five XML builtins, so custom
/// entities fail with an unrecognized-entity error instead of expanding.
/// `decode_and_unescape_value()` (not the `_with` variant) keeps us on that
/// default.
fn parse_opml_content(content: &str) -> Result<Vec<OpmlFeed>> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut feeds = Vec::new();
    let mut buf = Vec::new();
    // One entry per open <outline>: Some(name) for a named group, None for
    // feed outlines and unnamed groups. The innermost Some is the current
    // category.
    let mut group_stack: Vec<Option<String>> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"outline" => {
                if group_stack.len() + 1 > MAX_OPML_DEPTH {
                    return Err(OpmlError::MaxDepthExceeded(MAX_OPML_DEPTH).into());
                }

                let attrs = read_outline_attributes(&e, &reader)?;
                if attrs.xml_url.is_some() {
                    if let Some(feed) = feed_from_attributes(attrs, current_category(&group_stack))
                    {
                        feeds.push(feed);
                    }
                    group_stack.push(None);
                } else {
                    group_stack.push(attrs.group_name());
                }
            }
            Ok(Event::Empty(e)) if e.name().as_ref() == b"outline" => {
                let attrs = read_outline_attributes(&e, &reader)?;
                if let Some(feed) = feed_from_attributes(attrs, current_category(&group_stack)) {
                    feeds.push(feed);
                }
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"outline" => {
                group_stack.pop();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(OpmlError::XmlParse(e.to_string()).into()),
            _ => {}
        }
        buf.clear();
    }

    Ok(feeds)
}

fn current_category(group_stack: &[Option<String>]) -> &str {
    group_stack
        .iter()
        .rev()
        .flatten()
        .next()
        .map(String::as_str)
        .unwrap_or(DEFAULT_CATEGORY)
}

/// Raw attributes of a single outline element
#[derive(Debug, Default)]
struct OutlineAttributes {
    text: Option<String>,
    title: Option<String>,
    xml_url: Option<String>,
}

impl OutlineAttributes {
    /// Display title for a feed outline: `title`, then `text`, then the URL
    fn feed_title(&self, url: &str) -> String {
        self.title
            .clone()
            .or_else(|| self.text.clone())
            .unwrap_or_else(|| url.to_string())
    }

    /// Category name introduced by a group outline, if it has one
    fn group_name(self) -> Option<String> {
        self.text
            .or(self.title)
            .filter(|name| !name.trim().is_empty())
    }
}

fn read_outline_attributes(
    e: &quick_xml::events::BytesStart<'_>,
    reader: &Reader<&[u8]>,
) -> Result<OutlineAttributes> {
    let mut attrs = OutlineAttributes::default();

    for attr_result in e.attributes() {
        let attr = match attr_result {
            Ok(attr) => attr,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed OPML attribute");
                continue;
            }
        };
        let decoder = reader.decoder();
        match attr.key.as_ref() {
            b"xmlUrl" => {
                attrs.xml_url = Some(attr.decode_and_unescape_value(decoder)?.to_string())
            }
            b"title" => attrs.title = Some(attr.decode_and_unescape_value(decoder)?.to_string()),
            b"text" => attrs.text = Some(attr.decode_and_unescape_value(decoder)?.to_string()),
            _ => {}
        }
    }

    Ok(attrs)
}

fn feed_from_attributes(attrs: OutlineAttributes, category: &str) -> Option<OpmlFeed> {
    let url = attrs.xml_url.clone()?;
    match validate_feed_url(&url) {
        Ok(_) => Some(OpmlFeed {
            title: attrs.feed_title(&url),
            xml_url: url,
            category: category.to_string(),
        }),
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "Skipping invalid feed URL in OPML");
            None
        }
    }
}

/// Export feed subscriptions as an OPML 2.0 XML string.
///
/// Feeds are grouped under one outline per category, in first-seen order,
/// with each feed as a self-closing outline carrying `type`, `text`,
/// `title`, and `xmlUrl` attributes.
pub fn export_opml(feeds: &[OpmlFeed]) -> Result<String> {
    use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
    use quick_xml::Writer;
    use std::io::Cursor;

    let mut groups: Vec<(&str, Vec<&OpmlFeed>)> = Vec::new();
    for feed in feeds {
        match groups.iter_mut().find(|(c, _)| *c == feed.category) {
            Some((_, members)) => members.push(feed),
            None => groups.push((feed.category.as_str(), vec![feed])),
        }
    }

    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .context("Failed to write XML declaration")?;

    let mut opml = BytesStart::new("opml");
    opml.push_attribute(("version", "2.0"));
    writer
        .write_event(Event::Start(opml))
        .context("Failed to write opml element")?;

    writer
        .write_event(Event::Start(BytesStart::new("head")))
        .context("Failed to write head element")?;
    writer
        .write_event(Event::Start(BytesStart::new("title")))
        .context("Failed to write title element")?;
    writer
        .write_event(Event::Text(BytesText::new("babelfeed subscriptions")))
        .context("Failed to write title text")?;
    writer
        .write_event(Event::End(BytesEnd::new("title")))
        .context("Failed to write title end")?;
    writer
        .write_event(Event::End(BytesEnd::new("head")))
        .context("Failed to write head end")?;

    writer
        .write_event(Event::Start(BytesStart::new("body")))
        .context("Failed to write body element")?;

    for (category, members) in &groups {
        let mut group = BytesStart::new("outline");
        group.push_attribute(("text", *category));
        group.push_attribute(("title", *category));
        writer
            .write_event(Event::Start(group))
            .context("Failed to write category outline")?;

        for feed in members {
            let mut outline = BytesStart::new("outline");
            outline.push_attribute(("type", "rss"));
            outline.push_attribute(("text", feed.title.as_str()));
            outline.push_attribute(("title", feed.title.as_str()));
            outline.push_attribute(("xmlUrl", feed.xml_url.as_str()));
            writer
                .write_event(Event::Empty(outline))
                .context("Failed to write feed outline")?;
        }

        writer
            .write_event(Event::End(BytesEnd::new("outline")))
            .context("Failed to write category outline end")?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("body")))
        .context("Failed to write body end")?;
    writer
        .write_event(Event::End(BytesEnd::new("opml")))
        .context("Failed to write opml end")?;

    let result = writer.into_inner().into_inner();
    String::from_utf8(result).context("Generated OPML contains invalid UTF-8")
}

/// Export feed subscriptions to an OPML file atomically.
///
/// Writes to a temporary file in the same directory, syncs, then renames
/// over the destination so it is never left partially written.
pub fn export_to_file(feeds: &[OpmlFeed], path: &std::path::Path) -> Result<()> {
    use std::time::{SystemTime, UNIX_EPOCH};

    let content = export_opml(feeds)?;

    // Randomized temp filename to avoid clobbering a concurrent export
    let random_suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = path.with_extension(format!("tmp.{:016x}", random_suffix));

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)
        .with_context(|| {
            format!(
                "Failed to create temporary file '{}': check directory permissions",
                temp_path.display()
            )
        })?;

    std::io::Write::write_all(&mut file, content.as_bytes()).with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!(
            "Failed to write OPML to temporary file '{}'",
            temp_path.display()
        )
    })?;

    file.sync_all().with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!(
            "Failed to sync temporary file '{}' to disk",
            temp_path.display()
        )
    })?;

    drop(file);

    std::fs::rename(&temp_path, path).with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!(
            "Failed to rename '{}' to '{}'",
            temp_path.display(),
            path.display()
        )
    })?;

    Ok(())
}
