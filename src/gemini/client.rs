use std::future::Future;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::page::{Page, StatusClass};
use super::tls::TlsConnector;
use super::{GeminiError, Url};

/// Redirect hops followed before a fetch gives up.
pub const DEFAULT_MAX_REDIRECTS: usize = 10;
/// Largest response accepted from a single request (10MB).
pub const DEFAULT_MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024;

const READ_CHUNK_SIZE: usize = 4096;

/// Opens the byte stream a single Gemini request is sent over.
///
/// [`TlsConnector`] is the network implementation; tests substitute
/// in-memory streams.
pub trait Connector: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    fn connect(
        &self,
        url: &Url,
    ) -> impl Future<Output = Result<Self::Stream, GeminiError>> + Send;
}

/// Fetches Gemini pages, following redirects up to a fixed hop limit.
///
/// A fetch either yields a page with a success status or an error; redirect
/// and failure responses are never returned as pages.
#[derive(Clone)]
pub struct GeminiClient<C = TlsConnector> {
    connector: C,
    max_redirects: usize,
    max_response_size: usize,
}

impl<C: Connector> GeminiClient<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            max_response_size: DEFAULT_MAX_RESPONSE_SIZE,
        }
    }

    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    pub fn with_max_response_size(mut self, max_response_size: usize) -> Self {
        self.max_response_size = max_response_size;
        self
    }

    /// Fetches `url`, following redirects.
    ///
    /// # Errors
    ///
    /// - [`GeminiError::ConnectionFailure`] - Connect, handshake, or I/O failed
    /// - [`GeminiError::MalformedResponse`] - Header is not `<status> <meta>`
    /// - [`GeminiError::ResponseTooLarge`] - Body exceeded the size limit
    /// - [`GeminiError::MalformedUrl`] - A redirect target is not an absolute address
    /// - [`GeminiError::RedirectLoopExceeded`] - More hops than allowed
    /// - [`GeminiError::ProtocolStatusFailure`] - Any non-success, non-redirect status
    pub async fn fetch(&self, url: &Url) -> Result<Page, GeminiError> {
        let mut url = url.clone();
        let mut redirects = 0;

        loop {
            let page = self.fetch_once(&url).await?;

            match page.status_class() {
                StatusClass::Success => return Ok(page),
                StatusClass::Redirect => {
                    // Relative redirect targets are not followed
                    let target = Url::parse(page.meta())?;
                    redirects += 1;
                    if redirects > self.max_redirects {
                        return Err(GeminiError::RedirectLoopExceeded(self.max_redirects));
                    }
                    tracing::debug!(from = %url, to = %target, hop = redirects, "Following redirect");
                    url = target;
                }
                StatusClass::Input | StatusClass::Failure => {
                    return Err(GeminiError::ProtocolStatusFailure {
                        code: page.status(),
                        meta: page.meta().to_string(),
                    });
                }
            }
        }
    }

    /// Performs one request/response exchange without interpreting the status.
    async fn fetch_once(&self, url: &Url) -> Result<Page, GeminiError> {
        tracing::debug!(url = %url, "Requesting");

        let mut stream = self.connector.connect(url).await?;
        stream.write_all(format!("{url}\r\n").as_bytes()).await?;
        stream.flush().await?;

        let bytes = read_response(&mut stream, self.max_response_size).await?;
        parse_response(url.clone(), &bytes)
    }
}

/// Reads until the server closes the connection.
async fn read_response<S: AsyncRead + Unpin>(
    stream: &mut S,
    limit: usize,
) -> Result<Vec<u8>, GeminiError> {
    let mut bytes = Vec::new();
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    loop {
        let n = match stream.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => n,
            // Many servers close the socket without sending close_notify
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        };
        if bytes.len().saturating_add(n) > limit {
            return Err(GeminiError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk[..n]);
    }

    Ok(bytes)
}

fn parse_response(url: Url, bytes: &[u8]) -> Result<Page, GeminiError> {
    let text = String::from_utf8_lossy(bytes);
    let mut lines = text.lines();

    let header = lines
        .next()
        .ok_or_else(|| GeminiError::MalformedResponse("empty response".to_string()))?;
    let (status, meta) = parse_header(header)?;
    let body = lines.map(str::to_string).collect();

    Ok(Page::new(url, status, meta, body))
}

fn parse_header(header: &str) -> Result<(u8, String), GeminiError> {
    if header.chars().count() < 3 {
        return Err(GeminiError::MalformedResponse(format!(
            "header too short: {header:?}"
        )));
    }

    let status = header
        .get(..2)
        .filter(|code| code.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|code| code.parse::<u8>().ok())
        .ok_or_else(|| GeminiError::MalformedResponse(format!("invalid status: {header:?}")))?;

    Ok((status, header[2..].trim().to_string()))
}
