//! Core domain types

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::error::ValidationError;

/// A validated application port.
///
/// Constructed through [`Port::new`] (default managed range) or
/// [`PortRange::port`] (custom range); the value never changes afterwards.
///
/// Deserialization only rejects port 0. The managed range is a property of
/// the orchestrator configuration, so a stored port is checked against it
/// where the orchestrator accepts a header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(into = "u16")]
pub struct Port(u16);

impl Port {
    /// First port the application listens on
    pub const MIN: u16 = 19723;
    /// Last port the application listens on
    pub const MAX: u16 = 19744;

    /// Create a port inside the default managed range
    pub fn new(value: u16) -> Result<Self, ValidationError> {
        PortRange::default().port(value)
    }

    /// Get the raw port number
    pub fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for Port {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match u16::deserialize(deserializer)? {
            0 => Err(serde::de::Error::custom("port must be non-zero")),
            value => Ok(Port(value)),
        }
    }
}

impl TryFrom<u16> for Port {
    type Error = ValidationError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Port::new(value)
    }
}

impl From<Port> for u16 {
    fn from(port: Port) -> Self {
        port.0
    }
}

/// Inclusive range of ports an application instance may bind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRange", into = "RawRange")]
pub struct PortRange {
    start: u16,
    end: u16,
}

#[derive(Serialize, Deserialize)]
struct RawRange {
    start: u16,
    end: u16,
}

impl PortRange {
    /// Create a range, rejecting `start > end`
    pub fn new(start: u16, end: u16) -> Result<Self, ValidationError> {
        if start > end {
            return Err(ValidationError::InvalidPortRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// First port of the range
    pub fn start(&self) -> u16 {
        self.start
    }

    /// Last port of the range
    pub fn end(&self) -> u16 {
        self.end
    }

    /// Whether `value` lies inside the range
    pub fn contains(&self, value: u16) -> bool {
        (self.start..=self.end).contains(&value)
    }

    /// Validate `value` against this range
    pub fn port(&self, value: u16) -> Result<Port, ValidationError> {
        if !self.contains(value) {
            return Err(ValidationError::PortOutOfRange {
                port: value,
                start: self.start,
                end: self.end,
            });
        }
        Ok(Port(value))
    }

    /// All ports of the range in ascending order
    pub fn ports(&self) -> impl Iterator<Item = Port> {
        (self.start..=self.end).map(Port)
    }

    /// Number of ports in the range
    pub fn len(&self) -> usize {
        usize::from(self.end - self.start) + 1
    }

    /// A valid range is never empty
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl Default for PortRange {
    fn default() -> Self {
        Self {
            start: Port::MIN,
            end: Port::MAX,
        }
    }
}

impl TryFrom<RawRange> for PortRange {
    type Error = ValidationError;

    fn try_from(raw: RawRange) -> Result<Self, Self::Error> {
        PortRange::new(raw.start, raw.end)
    }
}

impl From<PortRange> for RawRange {
    fn from(range: PortRange) -> Self {
        Self {
            start: range.start,
            end: range.end,
        }
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Lifecycle status of a connection header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Registered but not connected
    #[default]
    Pending,
    /// Connected and usable
    Active,
    /// Metadata fetch or connect failed
    Failed,
    /// Deliberately detached while remaining registered
    Unassigned,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Pending => write!(f, "pending"),
            Status::Active => write!(f, "active"),
            Status::Failed => write!(f, "failed"),
            Status::Unassigned => write!(f, "unassigned"),
        }
    }
}
