//! Worker pool behaviour under concurrent load.
//!
//! Every test drives the pool through `PoolHandle::execute`, the same path
//! the QUIC front end uses.

use std::{
    collections::HashSet,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use bytes::Bytes;
use keyhose_crypto::{
    DerivationError, DerivationParams, EntropySource, OKM_LEN, OsEntropy, SALT_LEN, SecretDeriver,
    derive, reference_master_key,
};
use keyhose_proto::{DEFAULT_HASH, DerivateKeyRequest, DerivateKeyResponse, DerivationResponse};
use keyhose_worker::{
    JobError, OperationTable, PoolConfig, PoolHandle, WorkerPool, default_operations,
    operations::{DERIVATE_KEY, DERIVE_SECRET},
};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Deterministic entropy so two runs see the same salts.
struct SeededEntropy(Mutex<ChaCha20Rng>);

impl SeededEntropy {
    fn with_seed(seed: u64) -> Self {
        Self(Mutex::new(ChaCha20Rng::seed_from_u64(seed)))
    }
}

impl EntropySource for SeededEntropy {
    fn fill(&self, buf: &mut [u8]) -> Result<(), DerivationError> {
        self.0.lock().unwrap().fill_bytes(buf);
        Ok(())
    }
}

/// Entropy source whose reads block for the given time before succeeding.
struct Stalled(Duration);

impl EntropySource for Stalled {
    fn fill(&self, buf: &mut [u8]) -> Result<(), DerivationError> {
        std::thread::sleep(self.0);
        buf.fill(0x5a);
        Ok(())
    }
}

/// Entropy source that never produces anything.
struct Starved;

impl EntropySource for Starved {
    fn fill(&self, _buf: &mut [u8]) -> Result<(), DerivationError> {
        Err(DerivationError::EntropyUnavailable { reason: "pool drained".to_string() })
    }
}

fn deriver<E: EntropySource>(entropy: E) -> SecretDeriver<E> {
    SecretDeriver::new(Arc::new(reference_master_key()), entropy, DerivationParams::default())
        .unwrap()
}

fn start_pool<E: EntropySource + 'static>(entropy: E, config: PoolConfig) -> WorkerPool {
    WorkerPool::start(config, default_operations(deriver(entropy)).unwrap()).unwrap()
}

async fn derive_one(handle: &PoolHandle, job_id: &str) -> DerivationResponse {
    let output = handle.execute(DERIVE_SECRET, Bytes::from(job_id.to_string())).await.unwrap();
    DerivationResponse::decode(&output).unwrap()
}

#[tokio::test]
async fn responses_have_fixed_lengths_and_nonzero_secrets() {
    let pool = start_pool(OsEntropy::new(), PoolConfig::default());
    let handle = pool.handle();

    let tasks: Vec<_> = (0..100)
        .map(|i| {
            let handle = handle.clone();
            tokio::spawn(async move { derive_one(&handle, &format!("job-{i}")).await })
        })
        .collect();

    for task in tasks {
        let response = task.await.unwrap();
        assert_eq!(response.salt().len(), SALT_LEN);
        assert_eq!(response.secret().len(), OKM_LEN);
        assert!(response.secret().iter().any(|&b| b != 0), "secret must not be all zero");
    }

    pool.shutdown().await;
}

#[tokio::test]
async fn concurrent_jobs_get_distinct_salts() {
    let pool = start_pool(OsEntropy::new(), PoolConfig::default());
    let handle = pool.handle();

    let tasks: Vec<_> = (0..1000)
        .map(|i| {
            let handle = handle.clone();
            tokio::spawn(async move { derive_one(&handle, &i.to_string()).await })
        })
        .collect();

    let mut salts = HashSet::new();
    let mut secrets = HashSet::new();
    for task in tasks {
        let response = task.await.unwrap();
        salts.insert(response.salt().to_vec());
        secrets.insert(response.secret().to_vec());
    }

    assert_eq!(salts.len(), 1000);
    assert_eq!(secrets.len(), 1000);

    pool.shutdown().await;
}

#[tokio::test]
async fn secret_replays_from_returned_salt() {
    let pool = start_pool(OsEntropy::new(), PoolConfig::default());
    let response = derive_one(&pool.handle(), "replay").await;

    let replayed = derive(reference_master_key().expose(), response.salt(), OKM_LEN).unwrap();
    assert_eq!(replayed.expose(), response.secret());

    pool.shutdown().await;
}

#[tokio::test]
async fn pool_output_matches_direct_derivation() {
    let pool = start_pool(SeededEntropy::with_seed(7), PoolConfig::default());
    let direct = deriver(SeededEntropy::with_seed(7));

    // Sequential so both sides draw salts in the same order
    for i in 0..5 {
        let response = derive_one(&pool.handle(), &i.to_string()).await;
        let expected = direct.derive_secret().unwrap();

        assert_eq!(response.salt(), expected.salt.as_bytes());
        assert_eq!(response.secret(), expected.secret.expose());
    }

    pool.shutdown().await;
}

#[tokio::test]
async fn starved_entropy_fails_without_payload() {
    let pool = start_pool(Starved, PoolConfig::default());

    let result = pool.handle().execute(DERIVE_SECRET, Bytes::new()).await;

    let err = result.unwrap_err();
    assert_eq!(err.error_type(), "entropy_unavailable");
    assert!(err.is_transient());

    pool.shutdown().await;
}

#[tokio::test]
async fn unknown_operation_is_rejected() {
    let pool = start_pool(OsEntropy::new(), PoolConfig::default());

    let result = pool.handle().execute("mint_coins", Bytes::new()).await;
    assert_eq!(result, Err(JobError::UnknownOperation("mint_coins".to_string())));

    pool.shutdown().await;
}

#[tokio::test]
async fn derivate_key_runs_through_the_pool() {
    let pool = start_pool(OsEntropy::new(), PoolConfig::default());
    let request = DerivateKeyRequest {
        ikm: Bytes::from(vec![0x0b; 22]),
        salt: Bytes::new(),
        info: Bytes::new(),
        length: 42,
        hash: DEFAULT_HASH.to_string(),
    };

    // Empty salt is rejected by the engine, not silently replaced
    let result = pool.handle().execute(DERIVATE_KEY, Bytes::from(request.encode().unwrap())).await;
    assert_eq!(result.unwrap_err().error_type(), "invalid_salt");

    let request = DerivateKeyRequest { salt: Bytes::from_static(b"salt"), ..request };
    let output =
        pool.handle().execute(DERIVATE_KEY, Bytes::from(request.encode().unwrap())).await.unwrap();
    let response = DerivateKeyResponse::decode(&output).unwrap();
    assert_eq!(response.okm.len(), 42);

    let request = DerivateKeyRequest { hash: "whirlpool".to_string(), ..request };
    let result = pool.handle().execute(DERIVATE_KEY, Bytes::from(request.encode().unwrap())).await;
    assert_eq!(result.unwrap_err().error_type(), "invalid_job");

    pool.shutdown().await;
}

#[tokio::test]
async fn slow_job_times_out() {
    let mut table = OperationTable::new();
    table
        .register_fn("slow", |_job| {
            std::thread::sleep(Duration::from_millis(500));
            Ok(vec![1])
        })
        .unwrap();

    let config = PoolConfig { job_timeout: Duration::from_millis(50), ..PoolConfig::default() };
    let pool = WorkerPool::start(config, table).unwrap();

    let result = pool.handle().execute("slow", Bytes::new()).await;
    assert!(matches!(result, Err(JobError::TimedOut { .. })), "{result:?}");

    pool.shutdown().await;
}

#[tokio::test]
async fn stalled_entropy_reports_entropy_unavailable() {
    let config = PoolConfig { job_timeout: Duration::from_millis(50), ..PoolConfig::default() };
    let pool = start_pool(Stalled(Duration::from_millis(300)), config);

    let err = pool.handle().execute(DERIVE_SECRET, Bytes::new()).await.unwrap_err();
    assert_eq!(err.error_type(), "entropy_unavailable");
    assert!(err.is_transient());

    pool.shutdown().await;
}

#[tokio::test]
async fn timed_out_jobs_keep_their_worker_busy() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut table = OperationTable::new();
    {
        let in_flight = Arc::clone(&in_flight);
        let peak = Arc::clone(&peak);
        table
            .register_fn("stuck", move |_job| {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(200));
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(Vec::new())
            })
            .unwrap();
    }

    let config =
        PoolConfig { workers: 1, job_timeout: Duration::from_millis(50), ..PoolConfig::default() };
    let pool = WorkerPool::start(config, table).unwrap();
    let handle = pool.handle();

    // Each caller gives up after 50ms, but the worker only moves on once
    // the abandoned call returns
    for _ in 0..5 {
        let result = handle.execute("stuck", Bytes::new()).await;
        assert!(matches!(result, Err(JobError::TimedOut { .. })), "{result:?}");
    }

    pool.shutdown().await;

    assert_eq!(peak.load(Ordering::SeqCst), 1);
    assert_eq!(in_flight.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn panicking_operation_is_reported() {
    let mut table = OperationTable::new();
    table.register_fn("explode", |_job| panic!("operation exploded")).unwrap();
    table.register_fn("echo", |job| Ok(job.data.to_vec())).unwrap();

    let pool = WorkerPool::start(PoolConfig { workers: 1, ..PoolConfig::default() }, table).unwrap();
    let handle = pool.handle();

    assert_eq!(handle.execute("explode", Bytes::new()).await, Err(JobError::WorkerPanicked));

    // The single worker survives the panic
    let output = handle.execute("echo", Bytes::from_static(b"still here")).await.unwrap();
    assert_eq!(&output[..], b"still here");

    pool.shutdown().await;
}

#[tokio::test]
async fn in_flight_jobs_never_exceed_pool_size() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut table = OperationTable::new();
    {
        let in_flight = Arc::clone(&in_flight);
        let peak = Arc::clone(&peak);
        table
            .register_fn("busy", move |_job| {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(10));
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(Vec::new())
            })
            .unwrap();
    }

    let pool = WorkerPool::start(PoolConfig { workers: 3, ..PoolConfig::default() }, table).unwrap();
    let handle = pool.handle();

    let tasks: Vec<_> = (0..30)
        .map(|_| {
            let handle = handle.clone();
            tokio::spawn(async move { handle.execute("busy", Bytes::new()).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let peak = peak.load(Ordering::SeqCst);
    assert!((1..=3).contains(&peak), "peak concurrency {peak}");

    pool.shutdown().await;
}

#[tokio::test]
async fn shutdown_closes_outstanding_handles() {
    let pool = start_pool(OsEntropy::new(), PoolConfig::default());
    let handle = pool.handle();
    assert!(!handle.is_closed());

    pool.shutdown().await;

    assert!(handle.is_closed());
    assert_eq!(handle.execute(DERIVE_SECRET, Bytes::new()).await, Err(JobError::PoolClosed));
}
