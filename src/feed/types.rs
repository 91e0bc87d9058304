use crate::gemini::Url;

/// One dated post contributed by a feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    /// Title of the feed the entry came from (override or page title)
    pub feed_title: String,
    pub post_title: String,
    pub url: Url,
    /// Always `YYYY-MM-DD`
    pub date: String,
}

/// The entries extracted from a single source page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feed {
    pub title: String,
    pub entries: Vec<FeedEntry>,
}
