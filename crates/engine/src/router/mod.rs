#![forbid(unsafe_code)]

mod dispatch;
mod registry;

pub use dispatch::{RetryPolicy, WorkerCtx, WorkerFailure, WorkerOutcome, dispatch};
pub use registry::{Table, WorkerName, WorkerRegistry, WorkerSpec, check_single_writer};

pub(crate) use dispatch::store_failure;
