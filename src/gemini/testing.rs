//! In-memory connector that serves canned responses keyed by address.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

use super::client::Connector;
use super::{GeminiError, Url};

#[derive(Clone, Default)]
pub(crate) struct ScriptedConnector {
    responses: HashMap<String, Vec<u8>>,
    delays: HashMap<String, Duration>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl ScriptedConnector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Serves `response` verbatim to every request for `url`.
    pub(crate) fn respond(mut self, url: &str, response: impl Into<Vec<u8>>) -> Self {
        let key = Url::parse(url).unwrap().to_string();
        self.responses.insert(key, response.into());
        self
    }

    /// Like [`respond`](Self::respond), but the connection opens only after `delay`.
    pub(crate) fn respond_after(
        self,
        url: &str,
        delay: Duration,
        response: impl Into<Vec<u8>>,
    ) -> Self {
        let mut connector = self.respond(url, response);
        let key = Url::parse(url).unwrap().to_string();
        connector.delays.insert(key, delay);
        connector
    }

    /// Request lines received so far, in arrival order.
    pub(crate) fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl Connector for ScriptedConnector {
    type Stream = DuplexStream;

    async fn connect(&self, url: &Url) -> Result<DuplexStream, GeminiError> {
        if let Some(delay) = self.delays.get(&url.to_string()) {
            tokio::time::sleep(*delay).await;
        }

        let response = self.responses.get(&url.to_string()).cloned().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                format!("no server for {url}"),
            )
        })?;

        let (client, mut server) = tokio::io::duplex(64 * 1024);
        let requests = Arc::clone(&self.requests);

        tokio::spawn(async move {
            let mut request = Vec::new();
            let mut byte = [0u8; 1];
            while !request.ends_with(b"\r\n") {
                match server.read(&mut byte).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => request.push(byte[0]),
                }
            }
            requests
                .lock()
                .unwrap()
                .push(String::from_utf8_lossy(&request).into_owned());
            let _ = server.write_all(&response).await;
        });

        Ok(client)
    }
}
