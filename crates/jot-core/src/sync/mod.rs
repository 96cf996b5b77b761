//! Outbound sync: queue drain, retry policy and the background worker.

mod executor;
mod policy;
mod worker;

pub use executor::{DrainMode, DrainReport, SyncExecutor};
pub use policy::RetryPolicy;
pub use worker::{SyncHandle, SyncWorker};
