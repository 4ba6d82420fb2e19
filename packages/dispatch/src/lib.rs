// Blood Donation Dispatch - Core
//
// Matches urgent blood requests to nearby compatible donors, tier by tier,
// under a per-request cap. Infrastructure (store traits and adapters) lives
// in kernel/, the matching domain in domains/blood/.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;

pub use config::*;
