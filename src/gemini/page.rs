use once_cell::sync::OnceCell;

use super::{GeminiError, Url};

const HEADING_MARKER: char = '#';
const LINK_MARKER: &str = "=>";

/// Response class, from the leading digit of the two-digit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// 1x: the server wants user input
    Input,
    /// 2x
    Success,
    /// 3x: meta holds the new address
    Redirect,
    /// 4x temporary, 5x permanent, 6x certificate required, and anything unknown
    Failure,
}

impl StatusClass {
    pub fn from_status(status: u8) -> Self {
        match status / 10 {
            1 => StatusClass::Input,
            2 => StatusClass::Success,
            3 => StatusClass::Redirect,
            _ => StatusClass::Failure,
        }
    }
}

/// A gemtext link line: an address plus optional label text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub url: Url,
    /// `None` when the line has no label; never `Some("")`.
    pub label: Option<String>,
}

impl Link {
    pub fn new(url: Url, label: impl Into<String>) -> Self {
        let label = label.into();
        Self {
            url,
            label: (!label.is_empty()).then_some(label),
        }
    }

    /// Parses `=>[whitespace]<address>[whitespace<label>]`.
    ///
    /// Returns `Ok(None)` for lines that are not link lines. With a `base`
    /// the address may be relative and is resolved against it; without one
    /// it must be absolute.
    ///
    /// # Examples
    ///
    /// ```
    /// use glean::gemini::Link;
    ///
    /// let link = Link::parse_line("=> gemini://example.org/ My capsule", None)
    ///     .unwrap()
    ///     .unwrap();
    /// assert_eq!(link.label.as_deref(), Some("My capsule"));
    /// assert!(Link::parse_line("Just text", None).unwrap().is_none());
    /// ```
    pub fn parse_line(line: &str, base: Option<&Url>) -> Result<Option<Link>, GeminiError> {
        let Some(rest) = line.strip_prefix(LINK_MARKER) else {
            return Ok(None);
        };

        let rest = rest.trim_start();
        let (reference, label) = match rest.find(char::is_whitespace) {
            Some(idx) => (&rest[..idx], rest[idx..].trim()),
            None => (rest, ""),
        };

        if reference.is_empty() {
            return Err(GeminiError::MalformedUrl(line.to_string()));
        }

        let url = match base {
            Some(base) => Url::resolve(base, reference)?,
            None => Url::parse(reference)?,
        };

        Ok(Some(Link::new(url, label)))
    }
}

/// A successfully fetched document.
///
/// Title and links are derived from the body on first access and cached;
/// the body never changes after construction.
#[derive(Debug, Clone)]
pub struct Page {
    url: Url,
    status: u8,
    meta: String,
    body: Vec<String>,
    title: OnceCell<String>,
    links: OnceCell<Vec<Link>>,
}

impl Page {
    pub fn new(url: Url, status: u8, meta: impl Into<String>, body: Vec<String>) -> Self {
        Self {
            url,
            status,
            meta: meta.into(),
            body,
            title: OnceCell::new(),
            links: OnceCell::new(),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn status(&self) -> u8 {
        self.status
    }

    pub fn status_class(&self) -> StatusClass {
        StatusClass::from_status(self.status)
    }

    pub fn meta(&self) -> &str {
        &self.meta
    }

    pub fn body(&self) -> &[String] {
        &self.body
    }

    /// The body lines joined back into a single string.
    pub fn raw_body(&self) -> String {
        self.body.join("\n")
    }

    /// Text of the first heading line.
    ///
    /// Falls back to the page address when the heading is empty, and to the
    /// host when there is no heading at all.
    pub fn title(&self) -> &str {
        self.title.get_or_init(|| {
            match self
                .body
                .iter()
                .find(|line| line.starts_with(HEADING_MARKER))
            {
                Some(line) => {
                    let text = line.trim_start_matches(HEADING_MARKER).trim();
                    if text.is_empty() {
                        self.url.to_string()
                    } else {
                        text.to_string()
                    }
                }
                None => self.url.host().to_string(),
            }
        })
    }

    /// Every link line in the body, resolved against the page address.
    ///
    /// Lines whose address cannot be parsed or resolved are skipped.
    pub fn links(&self) -> &[Link] {
        self.links.get_or_init(|| {
            self.body
                .iter()
                .filter_map(|line| match Link::parse_line(line, Some(&self.url)) {
                    Ok(link) => link,
                    Err(e) => {
                        tracing::debug!(page = %self.url, line = %line, error = %e, "Skipping link line");
                        None
                    }
                })
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(body: &[&str]) -> Page {
        Page::new(
            Url::parse("gemini://capsule.example/gemlog/").unwrap(),
            20,
            "text/gemini",
            body.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn test_status_class() {
        assert_eq!(StatusClass::from_status(10), StatusClass::Input);
        assert_eq!(StatusClass::from_status(20), StatusClass::Success);
        assert_eq!(StatusClass::from_status(31), StatusClass::Redirect);
        assert_eq!(StatusClass::from_status(44), StatusClass::Failure);
        assert_eq!(StatusClass::from_status(51), StatusClass::Failure);
        assert_eq!(StatusClass::from_status(62), StatusClass::Failure);
    }

    #[test]
    fn test_title_skips_leading_blank_lines() {
        assert_eq!(page(&["", "# Hello World"]).title(), "Hello World");
    }

    #[test]
    fn test_title_first_heading_wins() {
        let p = page(&["Intro text", "## Sub heading", "# Main"]);
        assert_eq!(p.title(), "Sub heading");
    }

    #[test]
    fn test_title_strips_whole_marker_run() {
        assert_eq!(page(&["### Deep heading"]).title(), "Deep heading");
        assert_eq!(page(&["###Tight"]).title(), "Tight");
    }

    #[test]
    fn test_title_without_space_after_marker() {
        assert_eq!(page(&["#Compact"]).title(), "Compact");
    }

    #[test]
    fn test_title_empty_heading_falls_back_to_url() {
        assert_eq!(
            page(&["#   ", "# Later"]).title(),
            "gemini://capsule.example:1965/gemlog/"
        );
    }

    #[test]
    fn test_title_no_heading_falls_back_to_host() {
        assert_eq!(page(&["just text", "=> /a.gmi"]).title(), "capsule.example");
        assert_eq!(page(&[]).title(), "capsule.example");
    }

    #[test]
    fn test_links_resolve_and_label() {
        let p = page(&[
            "# Log",
            "=> gemini://x.example/a 2024-01-02 - My Post",
            "=>  post.gmi   Relative post  ",
            "=> /about.gmi",
            "Not => a link",
        ]);
        let links = p.links();
        assert_eq!(links.len(), 3);

        assert_eq!(links[0].url.to_string(), "gemini://x.example:1965/a");
        assert_eq!(links[0].label.as_deref(), Some("2024-01-02 - My Post"));

        assert_eq!(
            links[1].url.to_string(),
            "gemini://capsule.example:1965/gemlog/post.gmi"
        );
        assert_eq!(links[1].label.as_deref(), Some("Relative post"));

        assert_eq!(links[2].url.to_string(), "gemini://capsule.example:1965/about.gmi");
        assert_eq!(links[2].label, None);
    }

    #[test]
    fn test_links_skip_only_bad_lines() {
        let p = page(&[
            "=> gemini://bad.example:port/ Broken",
            "=>",
            "=> mailto:someone@example.org Mail",
            "=> good.gmi Good",
        ]);
        let links = p.links();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].label.as_deref(), Some("Good"));
    }

    #[test]
    fn test_links_are_cached() {
        let p = page(&["=> a.gmi A"]);
        let first = p.links().as_ptr();
        assert_eq!(p.links().as_ptr(), first);
    }

    #[test]
    fn test_parse_line_without_base_requires_absolute() {
        assert!(Link::parse_line("=> relative.gmi", None).is_err());
        let link = Link::parse_line("=>gemini://a.example/feed", None)
            .unwrap()
            .unwrap();
        assert_eq!(link.url.host(), "a.example");
        assert_eq!(link.label, None);
    }

    #[test]
    fn test_empty_label_normalized() {
        let url = Url::parse("gemini://a.example/").unwrap();
        assert_eq!(Link::new(url, "").label, None);
    }

    #[test]
    fn test_raw_body() {
        assert_eq!(page(&["<feed>", "</feed>"]).raw_body(), "<feed>\n</feed>");
    }
}
