use futures::stream::{self, StreamExt};

use super::parser::extract_feed;
use super::types::Feed;
use crate::gemini::{Connector, GeminiClient, GeminiError, Link, Url};

/// Number of sources fetched at the same time unless configured otherwise.
pub const DEFAULT_CONCURRENCY: usize = 16;

/// Receives one report per source that could not be fetched.
///
/// Reports are fire-and-forget: implementations must not block, and nothing
/// they do affects the rest of the run. Closures taking `(&Url, &GeminiError)`
/// implement this trait.
pub trait ErrorSink: Send + Sync {
    fn report(&self, source: &Url, error: &GeminiError);
}

impl<F> ErrorSink for F
where
    F: Fn(&Url, &GeminiError) + Send + Sync,
{
    fn report(&self, source: &Url, error: &GeminiError) {
        self(source, error)
    }
}

/// Parses the feed list: one gemtext link line per source.
///
/// The optional label of each line becomes the feed title override. Blank
/// lines are ignored; any other line that is not an absolute link is logged
/// and skipped.
pub fn parse_source_list(text: &str) -> Vec<Link> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(idx, line)| match Link::parse_line(line.trim(), None) {
            Ok(Some(link)) => Some(link),
            Ok(None) => {
                tracing::warn!(line = idx + 1, text = %line, "Ignoring feed list line that is not a link");
                None
            }
            Err(e) => {
                tracing::warn!(line = idx + 1, error = %e, "Ignoring invalid feed list entry");
                None
            }
        })
        .collect()
}

/// Fetches and extracts every source with bounded concurrency.
///
/// Returns once every source has finished. Failed sources are reported to
/// `sink` and left out; the returned feeds are in source-list order no
/// matter which fetch completes first.
///
/// # Arguments
///
/// * `client` - Gemini client shared by all fetches
/// * `sources` - Feed addresses with optional title overrides
/// * `concurrency` - Maximum fetches in flight (clamped to at least 1)
/// * `sink` - Receives `(source url, error)` for each failed source
pub async fn fetch_feeds<C: Connector>(
    client: &GeminiClient<C>,
    sources: &[Link],
    concurrency: usize,
    sink: &dyn ErrorSink,
) -> Vec<Feed> {
    if sources.is_empty() {
        return Vec::new();
    }

    // `buffered` yields in input order, which keeps same-date entries in list order
    let results: Vec<Option<Feed>> = stream::iter(sources)
        .map(|source| async move {
            match fetch_one(client, source).await {
                Ok(feed) => Some(feed),
                Err(e) => {
                    tracing::warn!(url = %source.url, error = %e, "Feed fetch failed");
                    sink.report(&source.url, &e);
                    None
                }
            }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let feeds: Vec<Feed> = results.into_iter().flatten().collect();
    tracing::info!(
        sources = sources.len(),
        fetched = feeds.len(),
        failed = sources.len() - feeds.len(),
        "Finished fetching feeds"
    );
    feeds
}

/// One complete fetch-and-extract cycle for a single source.
pub async fn fetch_one<C: Connector>(
    client: &GeminiClient<C>,
    source: &Link,
) -> Result<Feed, GeminiError> {
    let page = client.fetch(&source.url).await?;
    let feed = extract_feed(&page, source.label.as_deref());
    tracing::debug!(url = %source.url, title = %feed.title, entries = feed.entries.len(), "Extracted feed");
    Ok(feed)
}
