pub mod blood_request;
pub mod blood_type;
pub mod dispatch_round;
pub mod donor;

pub use blood_request::{BloodRequest, RequestState};
pub use blood_type::{BloodGroup, RhesusFactor, Tier, TierRhesus};
pub use dispatch_round::{DispatchRound, Outcome};
pub use donor::{Donor, DonorDistance};
