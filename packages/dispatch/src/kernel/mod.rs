//! Kernel module - store infrastructure and dependencies.

pub mod deps;
pub mod memory_store;
pub mod postgres_store;
pub mod request_locks;
pub mod retry;
pub mod traits;

pub use deps::DispatchDeps;
pub use memory_store::MemoryStore;
pub use postgres_store::PgStore;
pub use request_locks::{RequestGuard, RequestLocks};
pub use retry::{retry_transient, with_timeout, RetryPolicy};
pub use traits::*;
