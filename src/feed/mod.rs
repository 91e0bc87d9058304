//! Feed extraction and aggregation.
//!
//! - [`parser`] - Turns a fetched page into a [`Feed`] (Atom first, gemfeed links second)
//! - [`fetcher`] - Concurrent fetch-and-extract over the feed list with error reporting
//! - [`aggregate`] - Date grouping and rendering of the combined gemtext page
//!
//! # Example
//!
//! ```ignore
//! use glean::feed::{aggregate, fetch_feeds, parse_source_list, render};
//!
//! let sources = parse_source_list(&list_text);
//! let feeds = fetch_feeds(&client, &sources, 16, &|url, err| eprintln!("{url}: {err}")).await;
//! let page = render(&aggregate(&feeds), &header, &footer, Utc::now());
//! ```

mod aggregate;
mod fetcher;
mod parser;
mod types;

pub use aggregate::{aggregate, render, DateGroups};
pub use fetcher::{fetch_feeds, fetch_one, parse_source_list, ErrorSink, DEFAULT_CONCURRENCY};
pub use parser::{extract_feed, parse_atom, parse_gemfeed, ParseError};
pub use types::{Feed, FeedEntry};
