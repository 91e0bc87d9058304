use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::types::{Feed, FeedEntry};

/// Feed entries grouped by their `YYYY-MM-DD` date.
///
/// Within a date, entries keep the order in which they were encountered:
/// feed order first, then entry order inside each feed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DateGroups {
    groups: BTreeMap<String, Vec<FeedEntry>>,
}

impl DateGroups {
    /// Dates from newest to oldest with their entries.
    pub fn newest_first(&self) -> impl Iterator<Item = (&str, &[FeedEntry])> {
        self.groups
            .iter()
            .rev()
            .map(|(date, entries)| (date.as_str(), entries.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of distinct dates.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Total number of entries across all dates.
    pub fn entry_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }
}

/// Merges the entries of every feed into date groups.
pub fn aggregate(feeds: &[Feed]) -> DateGroups {
    let mut groups: BTreeMap<String, Vec<FeedEntry>> = BTreeMap::new();

    for entry in feeds.iter().flat_map(|feed| feed.entries.iter()) {
        groups
            .entry(entry.date.clone())
            .or_default()
            .push(entry.clone());
    }

    DateGroups { groups }
}

/// Renders the aggregated gemtext page.
///
/// Layout: `header`, the `Last fetched on ... utc` line and a blank line,
/// one link line per entry with a blank line closing each date, then
/// `footer`. Header and footer are copied verbatim.
pub fn render(
    groups: &DateGroups,
    header: &str,
    footer: &str,
    generated_at: DateTime<Utc>,
) -> String {
    let mut out = String::with_capacity(header.len() + footer.len() + groups.entry_count() * 96);

    out.push_str(header);
    out.push_str(&format!(
        "Last fetched on {} utc\n\n",
        generated_at.format("%Y-%m-%d %H:%M")
    ));

    for (date, entries) in groups.newest_first() {
        for entry in entries {
            out.push_str(&format!(
                "=> {} {} {} | {}\n",
                entry.url, date, entry.feed_title, entry.post_title
            ));
        }
        out.push('\n');
    }

    out.push_str(footer);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::Url;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn entry(feed: &str, post: &str, path: &str, date: &str) -> FeedEntry {
        FeedEntry {
            feed_title: feed.to_string(),
            post_title: post.to_string(),
            url: Url::parse(&format!("gemini://{}.example{path}", feed.to_lowercase())).unwrap(),
            date: date.to_string(),
        }
    }

    fn feed(title: &str, entries: Vec<FeedEntry>) -> Feed {
        Feed {
            title: title.to_string(),
            entries,
        }
    }

    fn generated_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 2, 9, 41, 27).unwrap()
    }

    #[test]
    fn test_aggregate_groups_by_date_in_feed_order() {
        let feeds = vec![
            feed(
                "Alpha",
                vec![
                    entry("Alpha", "a1", "/1", "2024-03-01"),
                    entry("Alpha", "a2", "/2", "2024-02-15"),
                ],
            ),
            feed(
                "Beta",
                vec![
                    entry("Beta", "b1", "/1", "2024-03-01"),
                    entry("Beta", "b2", "/2", "2024-03-01"),
                ],
            ),
        ];

        let groups = aggregate(&feeds);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups.entry_count(), 4);

        let collected: Vec<(&str, Vec<&str>)> = groups
            .newest_first()
            .map(|(date, entries)| {
                (date, entries.iter().map(|e| e.post_title.as_str()).collect())
            })
            .collect();
        assert_eq!(
            collected,
            vec![
                ("2024-03-01", vec!["a1", "b1", "b2"]),
                ("2024-02-15", vec!["a2"]),
            ]
        );
    }

    #[test]
    fn test_aggregate_empty() {
        let groups = aggregate(&[feed("Empty", vec![])]);
        assert!(groups.is_empty());
        assert_eq!(groups.entry_count(), 0);
    }

    #[test]
    fn test_render_newest_date_first() {
        let feeds = vec![
            feed("Beta", vec![entry("Beta", "Older", "/old.gmi", "2024-02-15")]),
            feed("Alpha", vec![entry("Alpha", "Newer", "/new.gmi", "2024-03-01")]),
        ];

        let rendered = render(&aggregate(&feeds), "# Feeds\n\n", "=> / Home\n", generated_at());
        assert_eq!(
            rendered,
            "# Feeds\n\
             \n\
             Last fetched on 2024-03-02 09:41 utc\n\
             \n\
             => gemini://alpha.example:1965/new.gmi 2024-03-01 Alpha | Newer\n\
             \n\
             => gemini://beta.example:1965/old.gmi 2024-02-15 Beta | Older\n\
             \n\
             => / Home\n"
        );
    }

    #[test]
    fn test_render_without_entries_or_header() {
        let rendered = render(&DateGroups::default(), "", "", generated_at());
        assert_eq!(rendered, "Last fetched on 2024-03-02 09:41 utc\n\n");
    }
}
