//! Compatibility cascade for blood requests.
//!
//! Each requested (group, rhesus) pair maps to the ordered list of tiers a
//! dispatch round searches. This is the product's simplified cascade, not the
//! full ABO/Rh matrix: AB recipients are never offered A or B donors.
//!
//! | Requested | Tiers, in order                    |
//! |-----------|------------------------------------|
//! | O-        | O-                                 |
//! | O+        | O+, O-, O*                         |
//! | A-        | A-, O-, A*                         |
//! | A+        | A+, O+, A-, O-, A*, O*             |
//! | B-        | B-, O-, B*                         |
//! | B+        | B+, O+, B-, O-, B*, O*             |
//! | AB-       | AB-, O-, AB*                       |
//! | AB+       | AB+, O+, AB-, O-, AB*, O*          |
//!
//! `*` tiers put no constraint on rhesus. They run after the exact tiers of
//! the same group, so in practice they surface donors with no recorded rhesus
//! plus anyone the earlier tiers did not capture.

use super::models::{BloodGroup, RhesusFactor, Tier};

use BloodGroup::{A, AB, B, O};
use RhesusFactor::{Negative as NEG, Positive as POS};

const O_NEGATIVE: &[Tier] = &[Tier::exact(O, NEG)];

const O_POSITIVE: &[Tier] = &[Tier::exact(O, POS), Tier::exact(O, NEG), Tier::any(O)];

const A_NEGATIVE: &[Tier] = &[Tier::exact(A, NEG), Tier::exact(O, NEG), Tier::any(A)];

const A_POSITIVE: &[Tier] = &[
    Tier::exact(A, POS),
    Tier::exact(O, POS),
    Tier::exact(A, NEG),
    Tier::exact(O, NEG),
    Tier::any(A),
    Tier::any(O),
];

const B_NEGATIVE: &[Tier] = &[Tier::exact(B, NEG), Tier::exact(O, NEG), Tier::any(B)];

const B_POSITIVE: &[Tier] = &[
    Tier::exact(B, POS),
    Tier::exact(O, POS),
    Tier::exact(B, NEG),
    Tier::exact(O, NEG),
    Tier::any(B),
    Tier::any(O),
];

const AB_NEGATIVE: &[Tier] = &[Tier::exact(AB, NEG), Tier::exact(O, NEG), Tier::any(AB)];

const AB_POSITIVE: &[Tier] = &[
    Tier::exact(AB, POS),
    Tier::exact(O, POS),
    Tier::exact(AB, NEG),
    Tier::exact(O, NEG),
    Tier::any(AB),
    Tier::any(O),
];

/// Data-driven lookup from a requested blood type to its search cascade.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompatibilityPlan;

impl CompatibilityPlan {
    /// Ordered tiers to search for a request of `group`/`rhesus`.
    ///
    /// Total over the closed enumerations; there is no unsupported pair.
    pub fn tiers_for(group: BloodGroup, rhesus: RhesusFactor) -> &'static [Tier] {
        match (group, rhesus) {
            (O, NEG) => O_NEGATIVE,
            (O, POS) => O_POSITIVE,
            (A, NEG) => A_NEGATIVE,
            (A, POS) => A_POSITIVE,
            (B, NEG) => B_NEGATIVE,
            (B, POS) => B_POSITIVE,
            (AB, NEG) => AB_NEGATIVE,
            (AB, POS) => AB_POSITIVE,
        }
    }
}
