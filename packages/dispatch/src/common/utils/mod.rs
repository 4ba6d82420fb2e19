pub mod geo;

pub use geo::{distance_meters, Position};
