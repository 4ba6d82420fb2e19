use serde::{Deserialize, Serialize};

/// Mean Earth radius used by the geo index, in meters.
pub const EARTH_RADIUS_M: f64 = 6_372_797.560_856;

/// Latitude bound of the Web Mercator projection used by geo indexes.
pub const MAX_LATITUDE: f64 = 85.051_128_78;

/// A point on the Earth's surface, longitude first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub longitude: f64,
    pub latitude: f64,
}

impl Position {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    /// Longitude within [-180, 180] and latitude within the indexable band.
    pub fn is_valid(&self) -> bool {
        self.longitude.is_finite()
            && self.latitude.is_finite()
            && (-180.0..=180.0).contains(&self.longitude)
            && (-MAX_LATITUDE..=MAX_LATITUDE).contains(&self.latitude)
    }

    pub fn distance_to(&self, other: &Position) -> f64 {
        distance_meters(self, other)
    }
}

/// Great-circle distance between two positions in meters (Haversine).
pub fn distance_meters(from: &Position, to: &Position) -> f64 {
    let dlat = (to.latitude - from.latitude).to_radians();
    let dlng = (to.longitude - from.longitude).to_radians();

    let a = (dlat / 2.0).sin().powi(2)
        + from.latitude.to_radians().cos()
            * to.latitude.to_radians().cos()
            * (dlng / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_M * a.sqrt().asin()
}

/// Offsets `origin` northwards by `meters` along its meridian.
///
/// Handy for placing fixtures at an exact distance from a point.
pub fn north_of(origin: &Position, meters: f64) -> Position {
    let dlat = (meters / EARTH_RADIUS_M).to_degrees();
    Position::new(origin.longitude, origin.latitude + dlat)
}
