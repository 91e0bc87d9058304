use std::sync::Arc;
use std::time::Duration;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{ring, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

use super::client::Connector;
use super::url::DEFAULT_PORT;
use super::{GeminiError, Url};

/// Connects to Gemini servers over TLS without validating their certificates.
///
/// Gemini capsules overwhelmingly use self-signed certificates, so the
/// connection is encrypted but the peer identity is not checked. The
/// handshake signature is still verified against whatever certificate the
/// server presents.
#[derive(Clone)]
pub struct TlsConnector {
    inner: tokio_rustls::TlsConnector,
    connect_timeout: Duration,
    /// Dialed for every address; the address port only appears in the request line.
    port: u16,
}

impl TlsConnector {
    pub fn new(connect_timeout: Duration) -> Result<Self, GeminiError> {
        let provider = Arc::new(ring::default_provider());
        let config = ClientConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()
            .map_err(|e| GeminiError::ConnectionFailure(std::io::Error::other(e)))?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate(provider)))
            .with_no_client_auth();

        Ok(Self {
            inner: tokio_rustls::TlsConnector::from(Arc::new(config)),
            connect_timeout,
            port: DEFAULT_PORT,
        })
    }
}

impl Connector for TlsConnector {
    type Stream = TlsStream<TcpStream>;

    async fn connect(&self, url: &Url) -> Result<Self::Stream, GeminiError> {
        if url.host().is_empty() {
            return Err(GeminiError::MalformedUrl(url.to_string()));
        }

        let server_name = ServerName::try_from(url.host())
            .map(|name| name.to_owned())
            .map_err(|_| GeminiError::MalformedUrl(url.to_string()))?;

        let handshake = async move {
            let tcp = TcpStream::connect((url.host(), self.port)).await?;
            self.inner.connect(server_name, tcp).await
        };

        tokio::time::timeout(self.connect_timeout, handshake)
            .await
            .map_err(|_| {
                std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("no connection within {:?}", self.connect_timeout),
                )
            })?
            .map_err(GeminiError::ConnectionFailure)
    }
}

#[derive(Debug)]
struct AcceptAnyCertificate(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
