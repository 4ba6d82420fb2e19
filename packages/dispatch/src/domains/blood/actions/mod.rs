//! Blood domain actions - the operations callers invoke
//!
//! Actions are async functions taking `&DispatchDeps`; they validate input,
//! resolve records and serialize work per request before calling effects.

mod disable_request;
mod dispatch;
mod donors;
mod open_request;
mod outcome_size;

pub use disable_request::disable_request;
pub use dispatch::dispatch;
pub use donors::{register_donor, remove_donor, update_donor, RegisterDonor, UpdateDonor};
pub use open_request::{open_request, OpenRequest};
pub use outcome_size::outcome_size;
