//! QUIC front end for the worker pool.
//!
//! Jobs arrive over Quinn: one bidirectional stream per job, TLS 1.3, ALPN
//! `keyhose/1`. Production deployments load a certificate chain and key from
//! PEM files. Without them the transport generates a self-signed certificate
//! for `localhost` and exposes its DER so local clients and tests can pin it.

use std::{net::SocketAddr, path::Path, sync::Arc};

use keyhose_proto::ALPN_PROTOCOL;
use quinn::{Endpoint, RecvStream, SendStream, ServerConfig};
use rustls::pki_types::{CertificateDer, PrivatePkcs8KeyDer};

use crate::error::WorkerError;

/// QUIC endpoint accepting job connections.
pub struct QuinnTransport {
    endpoint: Endpoint,
    /// Present only when the certificate was generated at bind time
    self_signed: Option<CertificateDer<'static>>,
}

impl QuinnTransport {
    /// Create and bind a new QUIC transport.
    ///
    /// Both `cert_path` and `key_path` must be given to use a real
    /// certificate. Otherwise a self-signed one is generated.
    pub fn bind(
        address: &str,
        cert_path: Option<&Path>,
        key_path: Option<&Path>,
    ) -> Result<Self, WorkerError> {
        let addr: SocketAddr = address
            .parse()
            .map_err(|e| WorkerError::Config(format!("invalid bind address '{address}': {e}")))?;

        let (server_config, self_signed) = match (cert_path, key_path) {
            (Some(cert), Some(key)) => (load_tls_config(cert, key)?, None),
            (None, None) => {
                let (config, cert) = generate_self_signed_config()?;
                (config, Some(cert))
            },
            _ => {
                return Err(WorkerError::Config(
                    "certificate and key must be given together".to_string(),
                ));
            },
        };

        let endpoint = Endpoint::server(server_config, addr)
            .map_err(|e| WorkerError::Transport(format!("failed to create endpoint: {e}")))?;

        tracing::info!(%addr, "QUIC transport bound");

        Ok(Self { endpoint, self_signed })
    }

    /// Accept the next connection.
    ///
    /// Returns `Ok(None)` once the endpoint has been closed. A failed
    /// handshake is an error for that connection only.
    pub async fn accept(&self) -> Result<Option<QuinnConnection>, WorkerError> {
        let Some(incoming) = self.endpoint.accept().await else {
            return Ok(None);
        };

        let connection = incoming
            .await
            .map_err(|e| WorkerError::Transport(format!("connection failed: {e}")))?;

        Ok(Some(QuinnConnection { connection }))
    }

    /// Local address the transport is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, WorkerError> {
        self.endpoint
            .local_addr()
            .map_err(|e| WorkerError::Transport(format!("failed to get local address: {e}")))
    }

    /// DER of the generated certificate, if the transport made one.
    pub fn certificate_der(&self) -> Option<&CertificateDer<'static>> {
        self.self_signed.as_ref()
    }

    /// Stop accepting connections and close existing ones.
    pub fn close(&self) {
        self.endpoint.close(quinn::VarInt::from_u32(0), b"shutdown");
    }
}

/// An accepted QUIC connection.
///
/// Clones share the underlying connection.
#[derive(Clone)]
pub struct QuinnConnection {
    connection: quinn::Connection,
}

impl QuinnConnection {
    /// Accept the next job stream.
    pub async fn accept_bi(&self) -> Result<(SendStream, RecvStream), WorkerError> {
        self.connection
            .accept_bi()
            .await
            .map_err(|e| WorkerError::Transport(format!("accept_bi failed: {e}")))
    }

    /// Remote peer address.
    pub fn remote_addr(&self) -> SocketAddr {
        self.connection.remote_address()
    }
}

fn quic_server_config(tls_config: rustls::ServerConfig) -> Result<ServerConfig, WorkerError> {
    let crypto = quinn::crypto::rustls::QuicServerConfig::try_from(tls_config)
        .map_err(|e| WorkerError::Config(format!("QUIC config error: {e}")))?;
    Ok(ServerConfig::with_crypto(Arc::new(crypto)))
}

/// Load TLS configuration from certificate and key files.
fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<ServerConfig, WorkerError> {
    let cert_pem = std::fs::read(cert_path).map_err(|e| {
        WorkerError::Config(format!("failed to read cert '{}': {e}", cert_path.display()))
    })?;
    let key_pem = std::fs::read(key_path).map_err(|e| {
        WorkerError::Config(format!("failed to read key '{}': {e}", key_path.display()))
    })?;

    let certs = rustls_pemfile::certs(&mut &cert_pem[..])
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| WorkerError::Config(format!("failed to parse certificates: {e}")))?;
    if certs.is_empty() {
        return Err(WorkerError::Config(format!(
            "no certificates found in '{}'",
            cert_path.display()
        )));
    }

    let key = rustls_pemfile::private_key(&mut &key_pem[..])
        .map_err(|e| WorkerError::Config(format!("failed to parse private key: {e}")))?
        .ok_or_else(|| WorkerError::Config("no private key found".to_string()))?;

    let mut tls_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| WorkerError::Config(format!("invalid TLS config: {e}")))?;
    tls_config.alpn_protocols = vec![ALPN_PROTOCOL.to_vec()];

    quic_server_config(tls_config)
}

/// Generate a self-signed certificate for `localhost`.
fn generate_self_signed_config() -> Result<(ServerConfig, CertificateDer<'static>), WorkerError> {
    let generated = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
        .map_err(|e| WorkerError::Config(format!("failed to generate self-signed cert: {e}")))?;

    let cert_der = generated.cert.der().clone();
    let key = PrivatePkcs8KeyDer::from(generated.key_pair.serialize_der());

    let mut tls_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![cert_der.clone()], key.into())
        .map_err(|e| WorkerError::Config(format!("invalid TLS config: {e}")))?;
    tls_config.alpn_protocols = vec![ALPN_PROTOCOL.to_vec()];

    tracing::warn!("using self-signed certificate, not for production use");

    Ok((quic_server_config(tls_config)?, cert_der))
}
