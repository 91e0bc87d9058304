use feed_rs::model::FeedType;
use feed_rs::parser;
use once_cell::sync::Lazy;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use thiserror::Error;

use super::types::{Feed, FeedEntry};
use crate::gemini::{GeminiError, Page, Url};

/// `YYYY-MM-DD` at the very start of a link label, then the rest of the label.
static DATED_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]{4}-[0-9]{2}-[0-9]{2})\s*(.*)$").unwrap());

/// Separator run many gemlogs put between the date and the post title.
static LEADING_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-=|~:]+(?:\s+|$)").unwrap());

/// Calendar date at the start of an RFC 3339 timestamp.
static TIMESTAMP_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([0-9]{4}-[0-9]{2}-[0-9]{2})").unwrap());

/// Reasons the Atom strategy gives up on a page.
///
/// These never leave [`extract_feed`]; they only decide that the gemfeed
/// link strategy runs instead.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Not a feed document: {0}")]
    Syndication(#[from] parser::ParseFeedError),
    #[error("Feed is not Atom")]
    NotAtom,
    #[error("Atom feed has no entries")]
    Empty,
    #[error("Entry {index} has no {field}")]
    MissingField { index: usize, field: &'static str },
    #[error("Entry {index} has an unusable link: {source}")]
    BadLink {
        index: usize,
        #[source]
        source: GeminiError,
    },
}

/// Extracts dated entries from a fetched page.
///
/// The body is first read as an Atom feed; if that fails for any reason the
/// page's gemtext links are scanned for dated labels instead. Entries keep
/// the order they appear in the page.
///
/// `title_override` replaces the feed title for every entry when given.
pub fn extract_feed(page: &Page, title_override: Option<&str>) -> Feed {
    match parse_atom(page, title_override) {
        Ok(feed) => {
            tracing::debug!(url = %page.url(), entries = feed.entries.len(), "Parsed Atom feed");
            feed
        }
        Err(e) => {
            tracing::debug!(url = %page.url(), reason = %e, "Falling back to gemfeed links");
            parse_gemfeed(page, title_override)
        }
    }
}

/// Reads the page body as an Atom document.
///
/// Every entry needs a title, a link, and an `updated` or `published`
/// timestamp; one incomplete entry rejects the whole document.
pub fn parse_atom(page: &Page, title_override: Option<&str>) -> Result<Feed, ParseError> {
    let raw = page.raw_body();
    let atom = parser::parse(raw.as_bytes())?;

    if !matches!(atom.feed_type, FeedType::Atom) {
        return Err(ParseError::NotAtom);
    }
    if atom.entries.is_empty() {
        return Err(ParseError::Empty);
    }

    let title = match title_override {
        Some(title) => title.to_string(),
        None => atom
            .title
            .as_ref()
            .map(|t| t.content.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| page.title().to_string()),
    };

    // feed-rs normalizes timestamps to UTC; the date the author wrote is
    // read from the raw text so an offset cannot move an entry to another day.
    let written = written_timestamps(&raw);
    let written = (written.len() == atom.entries.len()).then_some(written);

    let entries = atom
        .entries
        .iter()
        .enumerate()
        .map(|(index, entry)| -> Result<FeedEntry, ParseError> {
            let post_title = entry
                .title
                .as_ref()
                .map(|t| t.content.trim().to_string())
                .ok_or(ParseError::MissingField {
                    index,
                    field: "title",
                })?;
            let href = entry
                .links
                .first()
                .map(|link| link.href.as_str())
                .ok_or(ParseError::MissingField {
                    index,
                    field: "link",
                })?;
            let url = Url::resolve(page.url(), href)
                .map_err(|source| ParseError::BadLink { index, source })?;
            let timestamp = entry
                .updated
                .or(entry.published)
                .ok_or(ParseError::MissingField {
                    index,
                    field: "timestamp",
                })?;
            let written_date = written.as_ref().and_then(|all| {
                let text = all[index].updated.as_deref().or(all[index].published.as_deref())?;
                TIMESTAMP_DATE.captures(text)?.get(1)
            });
            let date = match written_date {
                Some(date) => date.as_str().to_string(),
                None => timestamp.format("%Y-%m-%d").to_string(),
            };

            Ok(FeedEntry {
                feed_title: title.clone(),
                post_title,
                url,
                date,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Feed { title, entries })
}

/// `updated` and `published` text of one Atom entry, exactly as written.
#[derive(Debug, Default)]
struct WrittenTimestamps {
    updated: Option<String>,
    published: Option<String>,
}

/// Collects the timestamp text of every `<entry>` in document order.
///
/// Only direct children of an entry count, so a nested `<source>` block
/// cannot override the entry's own timestamps. A document quick-xml cannot
/// read yields what was collected before the error.
fn written_timestamps(xml: &str) -> Vec<WrittenTimestamps> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries: Vec<WrittenTimestamps> = Vec::new();
    let mut open: Vec<Vec<u8>> = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = e.local_name().as_ref().to_vec();
                if name == b"entry" {
                    entries.push(WrittenTimestamps::default());
                }
                open.push(name);
            }
            Ok(Event::End(_)) => {
                open.pop();
            }
            Ok(Event::Text(t)) => {
                if let ([.., parent, field], Some(entry)) = (open.as_slice(), entries.last_mut())
                {
                    if parent.as_slice() == b"entry" {
                        let text = t.unescape().ok().map(|text| text.into_owned());
                        match field.as_slice() {
                            b"updated" => entry.updated = text,
                            b"published" => entry.published = text,
                            _ => {}
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::debug!(error = %e, "Stopped reading Atom timestamps");
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    entries
}

/// Builds a feed from the page's links following the gemfeed convention.
///
/// Only links whose label starts with a `YYYY-MM-DD` date become entries;
/// everything else (navigation, undated links, unlabeled links) is dropped.
pub fn parse_gemfeed(page: &Page, title_override: Option<&str>) -> Feed {
    let title = title_override.unwrap_or_else(|| page.title()).to_string();

    let entries = page
        .links()
        .iter()
        .filter_map(|link| {
            let (date, post_title) = split_dated_label(link.label.as_deref()?)?;
            Some(FeedEntry {
                feed_title: title.clone(),
                post_title: post_title.to_string(),
                url: link.url.clone(),
                date: date.to_string(),
            })
        })
        .collect();

    Feed { title, entries }
}

/// Splits `2024-01-02 - Title` into the date and the title.
fn split_dated_label(label: &str) -> Option<(&str, &str)> {
    let caps = DATED_LABEL.captures(label)?;
    let date = caps.get(1)?.as_str();
    let rest = caps.get(2).map_or("", |m| m.as_str());
    let post_title = LEADING_SEPARATOR
        .find(rest)
        .map_or(rest, |sep| &rest[sep.end()..]);
    Some((date, post_title.trim()))
}
