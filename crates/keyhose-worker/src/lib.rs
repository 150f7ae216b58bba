//! keyhose worker runtime.
//!
//! Runs named operations, `derive_secret` first among them, on a fixed-size
//! pool and serves them over QUIC.
//!
//! # Architecture
//!
//! [`keyhose_crypto`] holds the derivation logic and never does I/O. This
//! crate wraps it in a [`WorkerPool`] (bounded queue, `workers` concurrent
//! jobs, per-job timeout) and puts a [`Server`] in front: one
//! [`JobRequest`](keyhose_proto::JobRequest) per bidirectional QUIC stream, one
//! [`JobReply`] back.
//!
//! # Components
//!
//! - [`OperationTable`]: name to [`Operation`] registry, fixed at startup
//! - [`WorkerPool`] / [`PoolHandle`]: worker tasks and job submission
//! - [`Server`]: QUIC front end feeding the pool
//! - [`WorkerClient`]: QUIC client for submitting jobs remotely
//! - [`QuinnTransport`]: endpoint and TLS setup

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod client;
mod error;
mod job_error;
mod operation;
pub mod operations;
mod pool;
mod transport;

use std::{future::Future, net::SocketAddr, path::PathBuf};

pub use client::WorkerClient;
pub use error::WorkerError;
pub use job_error::JobError;
use keyhose_crypto::DerivationParams;
use keyhose_proto::{JobReply, JobRequest, MAX_MESSAGE_SIZE};
pub use operation::{Job, Operation, OperationFn, OperationTable};
pub use operations::default_operations;
pub use pool::{
    DEFAULT_JOB_TIMEOUT, DEFAULT_QUEUE_DEPTH, DEFAULT_WORKERS, PoolConfig, PoolHandle, WorkerPool,
};
use quinn::{RecvStream, SendStream};
use rustls::pki_types::CertificateDer;
pub use transport::{QuinnConnection, QuinnTransport};

/// Default listen address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:4455";

/// Error type reported when a request envelope cannot be decoded.
pub const PROTOCOL_ERROR_TYPE: &str = "protocol_error";

/// Worker process configuration.
#[derive(Debug, Clone)]
pub struct WorkerRuntimeConfig {
    /// Address to bind to (e.g., "0.0.0.0:4455")
    pub bind_address: String,
    /// Path to TLS certificate (PEM format)
    pub cert_path: Option<PathBuf>,
    /// Path to TLS private key (PEM format)
    pub key_path: Option<PathBuf>,
    /// Pool sizing and timeouts
    pub pool: PoolConfig,
    /// Salt length, output length and HKDF info for `derive_secret`
    pub derivation: DerivationParams,
}

impl Default for WorkerRuntimeConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            cert_path: None,
            key_path: None,
            pool: PoolConfig::default(),
            derivation: DerivationParams::default(),
        }
    }
}

/// QUIC front end for a [`WorkerPool`].
pub struct Server {
    transport: QuinnTransport,
    pool: PoolHandle,
}

impl Server {
    /// Bind the transport. Must be called from within a tokio runtime.
    pub fn bind(config: &WorkerRuntimeConfig, pool: PoolHandle) -> Result<Self, WorkerError> {
        let transport = QuinnTransport::bind(
            &config.bind_address,
            config.cert_path.as_deref(),
            config.key_path.as_deref(),
        )?;

        Ok(Self { transport, pool })
    }

    /// Address the server is listening on.
    pub fn local_addr(&self) -> Result<SocketAddr, WorkerError> {
        self.transport.local_addr()
    }

    /// DER of the self-signed certificate, if one was generated.
    pub fn certificate_der(&self) -> Option<&CertificateDer<'static>> {
        self.transport.certificate_der()
    }

    /// Accept connections until the endpoint closes.
    pub async fn run(self) -> Result<(), WorkerError> {
        self.run_until(std::future::pending()).await
    }

    /// Accept connections until `shutdown` resolves, then close the endpoint.
    ///
    /// Closing the endpoint aborts every open connection, so clients see the
    /// worker go away instead of a silent drop.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> Result<(), WorkerError> {
        tracing::info!(addr = %self.transport.local_addr()?, "worker server starting");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("closing QUIC endpoint");
                    self.transport.close();
                    break;
                },
                accepted = self.transport.accept() => match accepted {
                    Ok(Some(conn)) => {
                        let pool = self.pool.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, pool).await {
                                tracing::error!(error = %e, "connection error");
                            }
                        });
                    },
                    Ok(None) => break,
                    Err(e) => tracing::warn!(error = %e, "accept error"),
                },
            }
        }

        tracing::info!("worker server stopped");
        Ok(())
    }
}

async fn handle_connection(conn: QuinnConnection, pool: PoolHandle) -> Result<(), WorkerError> {
    let peer = conn.remote_addr();
    tracing::debug!(%peer, "new connection");

    loop {
        match conn.accept_bi().await {
            Ok((send, recv)) => {
                let pool = pool.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_stream(send, recv, pool).await {
                        tracing::debug!(%peer, error = %e, "stream error");
                    }
                });
            },
            Err(e) => {
                tracing::debug!(%peer, error = %e, "connection closed");
                break;
            },
        }
    }

    Ok(())
}

/// Read one request, run it, write one reply.
async fn handle_stream(
    mut send: SendStream,
    mut recv: RecvStream,
    pool: PoolHandle,
) -> Result<(), WorkerError> {
    let request = recv
        .read_to_end(MAX_MESSAGE_SIZE)
        .await
        .map_err(|e| WorkerError::Transport(format!("read failed: {e}")))?;

    let reply = match JobRequest::decode(&request) {
        Ok(request) => match pool.execute(&request.operation, request.data).await {
            Ok(result) => JobReply::ok(result),
            Err(e) => JobReply::failed(e.error_type(), e.to_string()),
        },
        Err(e) => {
            tracing::warn!(error_type = PROTOCOL_ERROR_TYPE, error = %e, "undecodable request");
            JobReply::failed(PROTOCOL_ERROR_TYPE, e.to_string())
        },
    };

    let encoded = match reply.encode() {
        Ok(encoded) => encoded,
        Err(e) => {
            tracing::warn!(error = %e, "reply too large to encode");
            JobReply::failed("encoding_failure", e.to_string()).encode()?
        },
    };

    send.write_all(&encoded)
        .await
        .map_err(|e| WorkerError::Transport(format!("write failed: {e}")))?;
    send.finish().map_err(|e| WorkerError::Transport(format!("finish failed: {e}")))?;

    Ok(())
}
