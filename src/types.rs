//! Core types shared by the registry, the service and providers.

use crate::error::{LocationError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Unique identifier for a subscription.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

impl fmt::Debug for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriptionId({})", self.0)
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Milliseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp(duration.as_millis() as i64)
    }

    /// This timestamp shifted forward by `duration`, saturating at the maximum.
    pub fn saturating_add(self, duration: Duration) -> Self {
        let millis = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
        Timestamp(self.0.saturating_add(millis))
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// Accuracy/power tradeoff hint passed to the provider.
///
/// The provider codes are the values hosts use when crossing the
/// integer boundary (see [`Priority::from_code`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    HighAccuracy,
    BalancedPower,
    LowPower,
    Passive,
}

impl Priority {
    pub const HIGH_ACCURACY_CODE: i32 = 100;
    pub const BALANCED_POWER_CODE: i32 = 102;
    pub const LOW_POWER_CODE: i32 = 104;
    pub const PASSIVE_CODE: i32 = 105;

    /// Parse a provider priority code.
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            Self::HIGH_ACCURACY_CODE => Ok(Priority::HighAccuracy),
            Self::BALANCED_POWER_CODE => Ok(Priority::BalancedPower),
            Self::LOW_POWER_CODE => Ok(Priority::LowPower),
            Self::PASSIVE_CODE => Ok(Priority::Passive),
            other => Err(LocationError::InvalidArgument(format!(
                "unrecognized priority code {}",
                other
            ))),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Priority::HighAccuracy => Self::HIGH_ACCURACY_CODE,
            Priority::BalancedPower => Self::BALANCED_POWER_CODE,
            Priority::LowPower => Self::LOW_POWER_CODE,
            Priority::Passive => Self::PASSIVE_CODE,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::BalancedPower
    }
}

/// A single location fix produced by a provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub altitude: Option<f64>,
    /// Horizontal accuracy radius in meters.
    #[serde(default)]
    pub accuracy: Option<f64>,
    pub timestamp: Timestamp,
}

impl Position {
    /// A fix at `(latitude, longitude)` stamped with the current time.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: None,
            accuracy: None,
            timestamp: Timestamp::now(),
        }
    }

    pub fn at(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    pub fn with_accuracy(mut self, meters: f64) -> Self {
        self.accuracy = Some(meters);
        self
    }
}

/// Error codes reported to subscribers.
///
/// The discriminants are part of the host boundary and must not change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionErrorCode {
    Access = 0,
    Closed = 1,
    UnknownSource = 2,
    NoError = 3,
}

impl From<PositionErrorCode> for i32 {
    fn from(code: PositionErrorCode) -> Self {
        code as i32
    }
}

impl TryFrom<i32> for PositionErrorCode {
    type Error = LocationError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(PositionErrorCode::Access),
            1 => Ok(PositionErrorCode::Closed),
            2 => Ok(PositionErrorCode::UnknownSource),
            3 => Ok(PositionErrorCode::NoError),
            other => Err(LocationError::InvalidArgument(format!(
                "unrecognized position error code {}",
                other
            ))),
        }
    }
}
