//! Blood domain - dispatches urgent blood requests to nearby compatible donors
//!
//! Responsibilities:
//! - The compatibility cascade (which donor types a request searches, in order)
//! - Neighbourhood, registry and ledger views over the store
//! - The dispatch round, capped per request and deduplicated across rounds
//! - Request lifecycle and donor registration actions

pub mod actions;
pub mod compatibility;
pub mod effects;
pub mod geo_index;
pub mod ledger;
pub mod models;
pub mod registry;

pub use compatibility::CompatibilityPlan;
pub use effects::DispatchExecutor;
pub use geo_index::{GeoIndex, Neighbourhood};
pub use ledger::RequestMatchLedger;
pub use registry::{DonorRegistry, TierMembers};
