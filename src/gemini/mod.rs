//! Gemini protocol support: addresses, the fetch client, and gemtext pages.
//!
//! - [`url`] - Address parsing, canonical serialization, relative resolution
//! - [`client`] - Request/response state machine with redirect following
//! - [`tls`] - The `rustls` connector used for real network fetches
//! - [`page`] - Title and link-line extraction from a fetched body
//!
//! # Example
//!
//! ```ignore
//! use glean::gemini::{GeminiClient, Url};
//!
//! let client = GeminiClient::new(TlsConnector::new(Duration::from_secs(2))?);
//! let page = client.fetch(&Url::parse("gemini://example.org/gemlog/")?).await?;
//! for link in page.links() {
//!     println!("{} {:?}", link.url, link.label);
//! }
//! ```

mod client;
mod page;
mod tls;
mod url;

#[cfg(test)]
pub(crate) mod testing;

use thiserror::Error;

pub use self::client::{Connector, GeminiClient, DEFAULT_MAX_REDIRECTS, DEFAULT_MAX_RESPONSE_SIZE};
pub use self::page::{Link, Page, StatusClass};
pub use self::tls::TlsConnector;
pub use self::url::{Url, DEFAULT_PORT};

/// Errors produced while addressing, fetching, or decoding a Gemini resource.
#[derive(Debug, Error)]
pub enum GeminiError {
    /// Address text does not match `scheme://host[:port][/path]`
    #[error("Malformed URL: {0}")]
    MalformedUrl(String),
    /// TCP connect, TLS handshake, timeout, or socket I/O failed
    #[error("Connection failed: {0}")]
    ConnectionFailure(#[from] std::io::Error),
    /// Response header is not `<2-digit status> <meta>`
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    /// Response body exceeded the configured size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Server answered with an input, failure, or certificate status
    #[error("Page load failed: {code} {meta}")]
    ProtocolStatusFailure { code: u8, meta: String },
    /// Redirect chain longer than the allowed number of hops
    #[error("Too many redirects (limit {0})")]
    RedirectLoopExceeded(usize),
}
