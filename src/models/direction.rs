use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the two synchronized systems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SystemId {
    #[serde(rename = "a")]
    A,
    #[serde(rename = "b")]
    B,
}

impl SystemId {
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemId::A => "a",
            SystemId::B => "b",
        }
    }
}

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a sync run; each direction owns its own watermark
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    AToB,
    BToA,
}

impl SyncDirection {
    pub const ALL: [SyncDirection; 2] = [SyncDirection::AToB, SyncDirection::BToA];

    pub fn source(&self) -> SystemId {
        match self {
            SyncDirection::AToB => SystemId::A,
            SyncDirection::BToA => SystemId::B,
        }
    }

    pub fn destination(&self) -> SystemId {
        match self {
            SyncDirection::AToB => SystemId::B,
            SyncDirection::BToA => SystemId::A,
        }
    }

    pub fn opposite(&self) -> SyncDirection {
        match self {
            SyncDirection::AToB => SyncDirection::BToA,
            SyncDirection::BToA => SyncDirection::AToB,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncDirection::AToB => "a_to_b",
            SyncDirection::BToA => "b_to_a",
        }
    }
}

impl fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "a_to_b" | "ab" => Ok(SyncDirection::AToB),
            "b_to_a" | "ba" => Ok(SyncDirection::BToA),
            _ => Err(format!("Unknown sync direction: {s}")),
        }
    }
}
