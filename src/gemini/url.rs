use std::fmt;
use std::str::FromStr;

use super::GeminiError;

/// Well-known Gemini port, used when the address text omits one.
pub const DEFAULT_PORT: u16 = 1965;

/// A Gemini address of the form `scheme://host:port/path`.
///
/// The port is always present after construction (defaulting to
/// [`DEFAULT_PORT`]) and the path keeps everything after the authority,
/// including any query or fragment. The authority ends at the first `/`,
/// `?` or `#`. An address without a path has an empty path, not `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Url {
    scheme: String,
    host: String,
    port: u16,
    path: String,
}

impl Url {
    /// Parses `<scheme>://<host>[:<port>][/<path>]`.
    ///
    /// The host may be empty here; the client refuses to connect to such
    /// addresses. A port that is present but not a positive decimal number
    /// is an error rather than a fallback to the default.
    ///
    /// # Examples
    ///
    /// ```
    /// use glean::gemini::Url;
    ///
    /// let url = Url::parse("gemini://example.org/gemlog/").unwrap();
    /// assert_eq!(url.port(), 1965);
    /// assert_eq!(url.to_string(), "gemini://example.org:1965/gemlog/");
    /// ```
    pub fn parse(text: &str) -> Result<Self, GeminiError> {
        let malformed = || GeminiError::MalformedUrl(text.to_string());

        if text.chars().any(char::is_whitespace) {
            return Err(malformed());
        }

        let (scheme, rest) = text.split_once("://").ok_or_else(malformed)?;
        let scheme_ok = scheme
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic())
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if !scheme_ok {
            return Err(malformed());
        }

        let (authority, path) = match rest.find(|c: char| matches!(c, '/' | '?' | '#')) {
            Some(idx) => rest.split_at(idx),
            None => (rest, ""),
        };

        let (host, port) = match authority.split_once(':') {
            Some((host, port_text)) => {
                if port_text.is_empty() || !port_text.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(malformed());
                }
                let port = port_text
                    .parse::<u16>()
                    .ok()
                    .filter(|p| *p > 0)
                    .ok_or_else(malformed)?;
                (host, port)
            }
            None => (authority, DEFAULT_PORT),
        };

        Ok(Self {
            scheme: scheme.to_string(),
            host: host.to_string(),
            port,
            path: path.to_string(),
        })
    }

    /// Resolves `reference` against `base`.
    ///
    /// An absolute reference is returned as parsed and the base is ignored.
    /// Anything else is joined with RFC 3986 rules and the result carries the
    /// base scheme.
    pub fn resolve(base: &Url, reference: &str) -> Result<Url, GeminiError> {
        if let Ok(absolute) = Url::parse(reference) {
            return Ok(absolute);
        }

        let base_text = base.to_string();
        let base_url = ::url::Url::parse(&base_text)
            .map_err(|e| GeminiError::MalformedUrl(format!("{base_text} ({e})")))?;
        let joined = base_url
            .join(reference)
            .map_err(|e| GeminiError::MalformedUrl(format!("{reference} ({e})")))?;

        let resolved = Url::parse(joined.as_str())?;
        Ok(Url {
            scheme: base.scheme.clone(),
            ..resolved
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}{}", self.scheme, self.host, self.port, self.path)
    }
}

impl FromStr for Url {
    type Err = GeminiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Url::parse(s)
    }
}
