//! QUIC client for submitting jobs to a remote worker.

use std::{
    net::{Ipv4Addr, Ipv6Addr, SocketAddr},
    sync::Arc,
};

use bytes::Bytes;
use keyhose_proto::{ALPN_PROTOCOL, DerivationResponse, JobReply, JobRequest, MAX_MESSAGE_SIZE};
use quinn::Endpoint;
use rustls::pki_types::CertificateDer;

use crate::{error::WorkerError, operations::DERIVE_SECRET};

/// Connection to a worker.
///
/// Each call opens its own stream, so one client may run many jobs
/// concurrently.
pub struct WorkerClient {
    endpoint: Endpoint,
    connection: quinn::Connection,
}

impl WorkerClient {
    /// Connect to `server_addr`, trusting only `trusted_certs`.
    ///
    /// `server_name` must match the certificate (`localhost` for the
    /// self-signed one).
    pub async fn connect(
        server_addr: SocketAddr,
        server_name: &str,
        trusted_certs: &[CertificateDer<'static>],
    ) -> Result<Self, WorkerError> {
        let mut roots = rustls::RootCertStore::empty();
        for cert in trusted_certs {
            roots
                .add(cert.clone())
                .map_err(|e| WorkerError::Config(format!("invalid trusted certificate: {e}")))?;
        }

        let mut crypto =
            rustls::ClientConfig::builder().with_root_certificates(roots).with_no_client_auth();
        crypto.alpn_protocols = vec![ALPN_PROTOCOL.to_vec()];

        let quic_crypto = quinn::crypto::rustls::QuicClientConfig::try_from(crypto)
            .map_err(|e| WorkerError::Config(format!("QUIC client config error: {e}")))?;
        let client_config = quinn::ClientConfig::new(Arc::new(quic_crypto));

        let bind_addr = if server_addr.is_ipv6() {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        };

        let mut endpoint = Endpoint::client(bind_addr)
            .map_err(|e| WorkerError::Transport(format!("failed to create endpoint: {e}")))?;
        endpoint.set_default_client_config(client_config);

        let connection = endpoint
            .connect(server_addr, server_name)
            .map_err(|e| WorkerError::Transport(format!("connect failed: {e}")))?
            .await
            .map_err(|e| WorkerError::Transport(format!("handshake failed: {e}")))?;

        tracing::debug!(%server_addr, "connected to worker");

        Ok(Self { endpoint, connection })
    }

    /// Run `operation` remotely and return the worker's reply.
    pub async fn execute(
        &self,
        operation: &str,
        data: impl Into<Bytes>,
    ) -> Result<JobReply, WorkerError> {
        let request = JobRequest::new(operation, data).encode()?;
        self.send_encoded(&request).await
    }

    /// Send a pre-encoded request envelope and return the decoded reply.
    pub async fn send_encoded(&self, request: &[u8]) -> Result<JobReply, WorkerError> {
        let (mut send, mut recv) = self
            .connection
            .open_bi()
            .await
            .map_err(|e| WorkerError::Transport(format!("open_bi failed: {e}")))?;

        send.write_all(request)
            .await
            .map_err(|e| WorkerError::Transport(format!("write failed: {e}")))?;
        send.finish().map_err(|e| WorkerError::Transport(format!("finish failed: {e}")))?;

        let reply = recv
            .read_to_end(MAX_MESSAGE_SIZE)
            .await
            .map_err(|e| WorkerError::Transport(format!("read failed: {e}")))?;

        Ok(JobReply::decode(&reply)?)
    }

    /// Run `derive_secret` and decode its output.
    ///
    /// # Errors
    ///
    /// - `WorkerError::Job` if the worker reports a failure
    /// - `WorkerError::Protocol` if the output is not a valid response
    pub async fn derive_secret(&self, job_id: &str) -> Result<DerivationResponse, WorkerError> {
        let reply = self.execute(DERIVE_SECRET, job_id.as_bytes().to_vec()).await?;
        let result = reply.into_result().map_err(WorkerError::Job)?;
        Ok(DerivationResponse::decode(&result)?)
    }

    /// Close the connection and wait for the endpoint to drain.
    pub async fn close(self) {
        self.connection.close(quinn::VarInt::from_u32(0), b"done");
        self.endpoint.wait_idle().await;
    }
}
