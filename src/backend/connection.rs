//! Connection establishment utilities for the upstream link
//!
//! Handles TCP connection setup and the optional TLS handshake.

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, RootCertStore, SignatureScheme};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

use crate::session::Host;

/// Every way the upstream link can fail; all of them end in a disconnect
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("TCP connection to {addr} failed: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },
    #[error("invalid server name for TLS: {0}")]
    ServerName(String),
    #[error("TLS handshake with {addr} failed: {source}")]
    Handshake {
        addr: String,
        source: std::io::Error,
    },
    #[error("line of {0} bytes exceeds the maximum length")]
    LineTooLong(usize),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A usable upstream stream, before line framing
pub enum UpstreamStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

/// Create a TLS connector.
///
/// With `verify` set, certificates are checked against the webpki roots.
/// Otherwise any certificate is accepted, which is what most bouncer users
/// pointing at self-signed networks expect.
pub fn create_tls_connector(verify: bool) -> TlsConnector {
    let config = if verify {
        let mut root_store = RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth()
    } else {
        rustls::ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoVerification))
            .with_no_client_auth()
    };

    TlsConnector::from(Arc::new(config))
}

/// Establish a connection to one upstream host with optional TLS
///
/// Returns once the stream is usable: immediately after TCP connect for
/// plain links, after the TLS handshake completes otherwise.
pub async fn establish_connection(host: &Host) -> Result<UpstreamStream, TransportError> {
    let addr = format!("{}:{}", host.host, host.port);

    let stream = TcpStream::connect(&addr)
        .await
        .map_err(|source| TransportError::Connect {
            addr: addr.clone(),
            source,
        })?;

    if !host.tls {
        return Ok(UpstreamStream::Plain(stream));
    }

    tracing::debug!(%addr, verify = host.verify_tls, "starting TLS");
    let connector = create_tls_connector(host.verify_tls);
    let server_name = ServerName::try_from(host.host.clone())
        .map_err(|e| TransportError::ServerName(format!("{}: {}", host.host, e)))?;

    let tls_stream = connector
        .connect(server_name, stream)
        .await
        .map_err(|source| TransportError::Handshake { addr, source })?;

    Ok(UpstreamStream::Tls(Box::new(tls_stream)))
}

#[derive(Debug)]
struct NoVerification;

impl ServerCertVerifier for NoVerification {
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
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        rustls::crypto::aws_lc_rs::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_refused_connection_is_connect_error() {
        // Bind then drop to get a port nobody listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let host = Host::new("127.0.0.1", port, false);
        let err = establish_connection(&host).await.err().unwrap();
        assert!(matches!(err, TransportError::Connect { .. }));
    }

    #[tokio::test]
    async fn test_plain_connection_is_usable_immediately() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let host = Host::new("127.0.0.1", port, false);
        let stream = establish_connection(&host).await.unwrap();
        assert!(matches!(stream, UpstreamStream::Plain(_)));
    }

    #[test]
    fn test_tls_connectors_build_in_both_modes() {
        let _verifying = create_tls_connector(true);
        let _accepting = create_tls_connector(false);
    }

    #[tokio::test]
    async fn test_tls_against_plaintext_server_is_handshake_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            let (mut sock, _) = listener.accept().await.unwrap();
            sock.write_all(b"NOTICE * :plain text\r\n").await.unwrap();
            sock
        });

        let host = Host::new("127.0.0.1", port, true).with_verification(true);
        assert!(host.verify_tls);
        let err = establish_connection(&host).await.err().unwrap();
        assert!(matches!(err, TransportError::Handshake { .. }));
        drop(server.await.unwrap());
    }
}
