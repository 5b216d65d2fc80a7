//! SNMP protocol versions.

use std::fmt;
use std::str::FromStr;

/// Message version as carried in the first INTEGER of every SNMP message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Version {
    V1,
    V2c,
    V3,
}

impl Version {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::V1),
            1 => Some(Self::V2c),
            3 => Some(Self::V3),
            _ => None,
        }
    }

    pub fn as_i32(self) -> i32 {
        match self {
            Self::V1 => 0,
            Self::V2c => 1,
            Self::V3 => 3,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V1 => write!(f, "1"),
            Self::V2c => write!(f, "2c"),
            Self::V3 => write!(f, "3"),
        }
    }
}

impl FromStr for Version {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "1" | "v1" => Ok(Self::V1),
            "2c" | "v2c" | "2" => Ok(Self::V2c),
            "3" | "v3" => Ok(Self::V3),
            other => Err(format!("unknown SNMP version '{}'", other)),
        }
    }
}
