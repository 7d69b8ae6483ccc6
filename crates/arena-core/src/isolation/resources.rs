//! Compute and memory budgets in platform quantity notation

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// CPU quantity in millicores (`250m`, `1`, `0.5`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cpu(u64);

impl Cpu {
    #[must_use]
    pub const fn millis(m: u64) -> Self {
        Self(m)
    }

    /// Saturates at `u64::MAX` millicores
    #[must_use]
    pub const fn cores(n: u64) -> Self {
        Self(n.saturating_mul(1000))
    }

    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0
    }
}

impl FromStr for Cpu {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::Quantity(s.to_string());
        if let Some(m) = s.strip_suffix('m') {
            return m.parse().map(Self).map_err(|_| invalid());
        }
        match s.split_once('.') {
            None => s
                .parse::<u64>()
                .ok()
                .and_then(|n| n.checked_mul(1000))
                .map(Self)
                .ok_or_else(invalid),
            Some((whole, frac)) => {
                if frac.is_empty() || frac.len() > 3 || !frac.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid());
                }
                let whole: u64 = if whole.is_empty() { 0 } else { whole.parse().map_err(|_| invalid())? };
                let frac: u64 = format!("{frac:0<3}").parse().map_err(|_| invalid())?;
                whole
                    .checked_mul(1000)
                    .and_then(|w| w.checked_add(frac))
                    .map(Self)
                    .ok_or_else(invalid)
            }
        }
    }
}

impl fmt::Display for Cpu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % 1000 == 0 {
            write!(f, "{}", self.0 / 1000)
        } else {
            write!(f, "{}m", self.0)
        }
    }
}

impl TryFrom<String> for Cpu {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Cpu> for String {
    fn from(cpu: Cpu) -> Self {
        cpu.to_string()
    }
}

const BINARY_SUFFIXES: [(&str, u64); 4] = [
    ("Ti", 1 << 40),
    ("Gi", 1 << 30),
    ("Mi", 1 << 20),
    ("Ki", 1 << 10),
];

/// Memory quantity in bytes (`256Mi`, `1Gi`, `1048576`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Memory(u64);

impl Memory {
    #[must_use]
    pub const fn bytes(b: u64) -> Self {
        Self(b)
    }

    #[must_use]
    pub const fn mebibytes(mb: u64) -> Self {
        Self(mb << 20)
    }

    #[must_use]
    pub const fn gibibytes(gb: u64) -> Self {
        Self(gb << 30)
    }

    #[must_use]
    pub const fn as_bytes(self) -> u64 {
        self.0
    }
}

impl FromStr for Memory {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::Quantity(s.to_string());
        for (suffix, scale) in BINARY_SUFFIXES {
            if let Some(n) = s.strip_suffix(suffix) {
                let n: u64 = n.parse().map_err(|_| invalid())?;
                return n.checked_mul(scale).map(Self).ok_or_else(invalid);
            }
        }
        s.parse().map(Self).map_err(|_| invalid())
    }
}

impl fmt::Display for Memory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (suffix, scale) in BINARY_SUFFIXES {
            if self.0 >= scale && self.0 % scale == 0 {
                return write!(f, "{}{suffix}", self.0 / scale);
            }
        }
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Memory {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Memory> for String {
    fn from(memory: Memory) -> Self {
        memory.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    pub cpu: Cpu,
    pub memory: Memory,
}

impl Resources {
    #[must_use]
    pub const fn new(cpu: Cpu, memory: Memory) -> Self {
        Self { cpu, memory }
    }
}

/// Guaranteed request and hard limit for one execution unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceBudget {
    pub request: Resources,
    pub limit: Resources,
}

impl ResourceBudget {
    #[must_use]
    pub const fn new(request: Resources, limit: Resources) -> Self {
        Self { request, limit }
    }

    /// Check request ≤ limit for both resources
    pub fn validate(&self, unit: &str) -> Result<(), ConfigError> {
        if self.request.cpu > self.limit.cpu {
            return Err(ConfigError::Budget {
                unit: unit.to_string(),
                resource: "cpu",
                request: self.request.cpu.to_string(),
                limit: self.limit.cpu.to_string(),
            });
        }
        if self.request.memory > self.limit.memory {
            return Err(ConfigError::Budget {
                unit: unit.to_string(),
                resource: "memory",
                request: self.request.memory.to_string(),
                limit: self.limit.memory.to_string(),
            });
        }
        Ok(())
    }
}
