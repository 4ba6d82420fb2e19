use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// ABO blood group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BloodGroup {
    A,
    B,
    AB,
    O,
}

impl BloodGroup {
    pub const ALL: [BloodGroup; 4] = [BloodGroup::A, BloodGroup::B, BloodGroup::AB, BloodGroup::O];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::AB => "AB",
            Self::O => "O",
        }
    }
}

impl fmt::Display for BloodGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BloodGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(Self::A),
            "B" => Ok(Self::B),
            "AB" => Ok(Self::AB),
            "O" => Ok(Self::O),
            other => Err(format!("unknown blood group '{}'", other)),
        }
    }
}

/// Rhesus factor, written `+` / `-`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RhesusFactor {
    #[serde(rename = "+")]
    Positive,
    #[serde(rename = "-")]
    Negative,
}

impl RhesusFactor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "+",
            Self::Negative => "-",
        }
    }
}

impl fmt::Display for RhesusFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RhesusFactor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "+" => Ok(Self::Positive),
            "-" => Ok(Self::Negative),
            other => Err(format!("unknown rhesus factor '{}'", other)),
        }
    }
}

/// Rhesus constraint of a search tier: an exact factor, or none at all (`*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TierRhesus {
    Exact(RhesusFactor),
    Any,
}

impl TierRhesus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact(rhesus) => rhesus.as_str(),
            Self::Any => "*",
        }
    }

    pub fn factor(&self) -> Option<RhesusFactor> {
        match self {
            Self::Exact(rhesus) => Some(*rhesus),
            Self::Any => None,
        }
    }
}

impl From<RhesusFactor> for TierRhesus {
    fn from(rhesus: RhesusFactor) -> Self {
        Self::Exact(rhesus)
    }
}

impl fmt::Display for TierRhesus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TierRhesus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "*" => Ok(Self::Any),
            other => other.parse().map(Self::Exact),
        }
    }
}

impl Serialize for TierRhesus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TierRhesus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One step of a compatibility cascade: a blood group and a rhesus constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tier {
    pub group: BloodGroup,
    pub rhesus: TierRhesus,
}

impl Tier {
    pub const fn exact(group: BloodGroup, rhesus: RhesusFactor) -> Self {
        Self {
            group,
            rhesus: TierRhesus::Exact(rhesus),
        }
    }

    pub const fn any(group: BloodGroup) -> Self {
        Self {
            group,
            rhesus: TierRhesus::Any,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.group, self.rhesus)
    }
}
