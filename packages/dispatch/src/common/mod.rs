// Common types and utilities shared across the kernel and the blood domain

pub mod entity_ids;
pub mod errors;
pub mod id;
pub mod utils;

pub use entity_ids::*;
pub use errors::{DispatchError, StoreError};
pub use id::Id;
