//! Named operations and the table the pool dispatches through.
//!
//! An [`Operation`] is a synchronous function from a [`Job`] to serialized
//! output bytes. Operations run on tokio's blocking pool, so they may do
//! CPU-bound work or block on the entropy source without stalling the
//! runtime. The table is built once at startup and is read-only afterwards.

use std::{collections::HashMap, fmt, sync::Arc, time::Duration};

use bytes::Bytes;

use crate::{error::WorkerError, job_error::JobError};

/// One unit of work handed to an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Pool-assigned identifier, unique for the pool's lifetime
    pub id: u64,
    /// Opaque input from the caller
    pub data: Bytes,
}

/// A named unit of work the pool can run.
pub trait Operation: Send + Sync + 'static {
    /// Run the job to completion and return its serialized output.
    ///
    /// Implementations return either the full output or an error, never a
    /// partially filled buffer.
    fn execute(&self, job: &Job) -> Result<Vec<u8>, JobError>;

    /// Error reported when a job runs past the pool's timeout.
    ///
    /// Operations whose only blocking point is known can name it here.
    fn timeout_error(&self, elapsed: Duration) -> JobError {
        JobError::TimedOut { elapsed }
    }
}

/// Adapts a closure into an [`Operation`].
pub struct OperationFn<F>(pub F);

impl<F> Operation for OperationFn<F>
where
    F: Fn(&Job) -> Result<Vec<u8>, JobError> + Send + Sync + 'static,
{
    fn execute(&self, job: &Job) -> Result<Vec<u8>, JobError> {
        (self.0)(job)
    }
}

/// Registry mapping operation names to implementations.
#[derive(Default, Clone)]
pub struct OperationTable {
    operations: HashMap<String, Arc<dyn Operation>>,
}

impl OperationTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `operation` under `name`.
    ///
    /// # Errors
    ///
    /// - `WorkerError::Config` if the name is empty or already registered
    pub fn register(
        &mut self,
        name: impl Into<String>,
        operation: impl Operation,
    ) -> Result<(), WorkerError> {
        let name = name.into();
        if name.is_empty() {
            return Err(WorkerError::Config("operation name must not be empty".to_string()));
        }
        if self.operations.contains_key(&name) {
            return Err(WorkerError::Config(format!("operation '{name}' is already registered")));
        }

        tracing::debug!(operation = %name, "operation registered");
        self.operations.insert(name, Arc::new(operation));
        Ok(())
    }

    /// Register a closure under `name`.
    pub fn register_fn<F>(&mut self, name: impl Into<String>, f: F) -> Result<(), WorkerError>
    where
        F: Fn(&Job) -> Result<Vec<u8>, JobError> + Send + Sync + 'static,
    {
        self.register(name, OperationFn(f))
    }

    /// Look up an operation.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Operation>> {
        self.operations.get(name).cloned()
    }

    /// True if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.operations.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

impl fmt::Debug for OperationTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationTable").field("operations", &self.names()).finish()
    }
}
