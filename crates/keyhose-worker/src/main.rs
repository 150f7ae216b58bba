//! keyhose worker binary.
//!
//! # Usage
//!
//! ```bash
//! # Self-signed certificate and reference master key (development only)
//! keyhose-worker --bind 127.0.0.1:4455
//!
//! # Production: real certificate, master key from a file
//! keyhose-worker --bind 0.0.0.0:4455 --cert cert.pem --key key.pem \
//!     --master-key-file /etc/keyhose/master.key
//! ```

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use keyhose_crypto::{
    DerivationParams, EnvMasterKey, FileMasterKey, MasterKeySource, OsEntropy, SecretDeriver,
    StaticMasterKey, load_master_key,
};
use keyhose_worker::{
    DEFAULT_BIND_ADDRESS, PoolConfig, Server, WorkerPool, WorkerRuntimeConfig, default_operations,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// keyhose secret derivation worker
#[derive(Parser, Debug)]
#[command(name = "keyhose-worker")]
#[command(about = "HKDF secret derivation worker pool")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = DEFAULT_BIND_ADDRESS)]
    bind: String,

    /// Path to TLS certificate (PEM format)
    #[arg(short, long, requires = "key")]
    cert: Option<PathBuf>,

    /// Path to TLS private key (PEM format)
    #[arg(short, long, requires = "cert")]
    key: Option<PathBuf>,

    /// Number of concurrent workers
    #[arg(short, long, default_value = "10")]
    workers: usize,

    /// Jobs that may wait for a free worker
    #[arg(long, default_value = "1024")]
    queue_depth: usize,

    /// Per-job timeout in milliseconds
    #[arg(long, default_value = "5000")]
    job_timeout_ms: u64,

    /// How long to wait for the OS entropy source at startup, in milliseconds
    #[arg(long, default_value = "10000")]
    entropy_timeout_ms: u64,

    /// File holding the raw master key bytes (wins over --master-key-env)
    #[arg(long)]
    master_key_file: Option<PathBuf>,

    /// Environment variable holding the hex-encoded master key
    #[arg(long)]
    master_key_env: Option<String>,

    /// HKDF info (context) string for derive_secret
    #[arg(long, default_value = "")]
    hkdf_info: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("keyhose worker starting");

    let source: Box<dyn MasterKeySource> = match (&args.master_key_file, &args.master_key_env) {
        (Some(path), _) => Box::new(FileMasterKey::new(path)),
        (None, Some(var)) => Box::new(EnvMasterKey::new(var)),
        (None, None) => {
            tracing::warn!("no master key configured, using the built-in reference key");
            tracing::warn!("this is NOT suitable for production use!");
            Box::new(StaticMasterKey::reference())
        },
    };
    let master = load_master_key(source.as_ref())?;

    let entropy_timeout = Duration::from_millis(args.entropy_timeout_ms);
    let entropy = tokio::task::spawn_blocking(move || OsEntropy::ready(entropy_timeout)).await??;

    let config = WorkerRuntimeConfig {
        bind_address: args.bind,
        cert_path: args.cert,
        key_path: args.key,
        pool: PoolConfig {
            workers: args.workers,
            queue_depth: args.queue_depth,
            job_timeout: Duration::from_millis(args.job_timeout_ms),
        },
        derivation: DerivationParams {
            info: args.hkdf_info.into_bytes(),
            ..DerivationParams::default()
        },
    };

    let deriver = SecretDeriver::new(master, entropy, config.derivation.clone())?;
    let pool = WorkerPool::start(config.pool.clone(), default_operations(deriver)?)?;
    let server = Server::bind(&config, pool.handle())?;

    tracing::info!(addr = %server.local_addr()?, workers = pool.size(), "worker listening");

    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("shutdown requested"),
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for ctrl-c, serving until killed");
                std::future::pending::<()>().await;
            },
        }
    };
    server.run_until(shutdown).await?;

    pool.shutdown().await;

    Ok(())
}
