//! Subscription types for location updates.

use crate::error::{LocationError, Result};
use crate::types::{Position, PositionErrorCode, Priority, SubscriptionId, Timestamp};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Deadline after which a subscription ends on its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expiration {
    /// Relative to when delivery starts.
    After(Duration),
    /// Absolute wall-clock deadline.
    At(Timestamp),
}

impl Expiration {
    /// Resolve to an absolute deadline given the start time.
    pub fn deadline(&self, started: Timestamp) -> Timestamp {
        match *self {
            Expiration::After(duration) => started.saturating_add(duration),
            Expiration::At(at) => at,
        }
    }
}

/// Desired update cadence for a subscription.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    pub priority: Priority,

    /// Preferred interval between updates.
    pub interval: Duration,

    /// Fastest interval the subscriber can handle.
    pub fastest_interval: Duration,

    /// Maximum time updates may be batched before delivery.
    pub max_wait_time: Duration,

    /// Stop after this many updates (None = unbounded).
    pub num_updates: Option<u32>,

    /// Optional deadline (None = never expires).
    pub expiration: Option<Expiration>,
}

impl SubscriptionRequest {
    /// Create a request with the given priority and interval.
    ///
    /// `fastest_interval` defaults to `interval`, `max_wait_time` to zero.
    pub fn new(priority: Priority, interval: Duration) -> Self {
        Self {
            priority,
            interval,
            fastest_interval: interval,
            max_wait_time: Duration::ZERO,
            num_updates: None,
            expiration: None,
        }
    }

    pub fn with_fastest_interval(mut self, fastest: Duration) -> Self {
        self.fastest_interval = fastest;
        self
    }

    pub fn with_max_wait_time(mut self, max_wait: Duration) -> Self {
        self.max_wait_time = max_wait;
        self
    }

    pub fn with_num_updates(mut self, count: u32) -> Self {
        self.num_updates = Some(count);
        self
    }

    pub fn expires_after(mut self, duration: Duration) -> Self {
        self.expiration = Some(Expiration::After(duration));
        self
    }

    pub fn expires_at(mut self, at: Timestamp) -> Self {
        self.expiration = Some(Expiration::At(at));
        self
    }

    /// Check the fields a `Duration` cannot rule out by construction.
    pub fn validate(&self) -> Result<()> {
        if self.num_updates == Some(0) {
            return Err(LocationError::InvalidArgument(
                "num_updates must be positive when set".to_string(),
            ));
        }

        match self.expiration {
            Some(Expiration::After(d)) if d.is_zero() => Err(LocationError::InvalidArgument(
                "expiration duration must be positive when set".to_string(),
            )),
            Some(Expiration::At(Timestamp(at))) if at <= 0 => {
                Err(LocationError::InvalidArgument(format!(
                    "expiration time must be positive, got {}",
                    at
                )))
            }
            _ => Ok(()),
        }
    }

    /// Build a request from the host boundary form.
    ///
    /// Zero means "unset" for `num_updates`, `expiration_duration` and
    /// `expiration_time`. Setting both expiration fields is rejected.
    pub fn from_raw(raw: RawRequest) -> Result<Self> {
        let priority = Priority::from_code(raw.priority)?;
        let interval = millis("interval", raw.interval)?;
        let fastest_interval = millis("fastest_interval", raw.fastest_interval)?;
        let max_wait_time = millis("max_wait_time", raw.max_wait_time)?;

        let num_updates = match raw.num_updates {
            0 => None,
            n if n < 0 => {
                return Err(LocationError::InvalidArgument(format!(
                    "num_updates must not be negative, got {}",
                    n
                )))
            }
            n => Some(n as u32),
        };

        let expiration = match (raw.expiration_duration, raw.expiration_time) {
            (0, 0) => None,
            (d, 0) => Some(Expiration::After(millis("expiration_duration", d)?)),
            (0, t) if t > 0 => Some(Expiration::At(Timestamp(t))),
            (0, t) => {
                return Err(LocationError::InvalidArgument(format!(
                    "expiration_time must not be negative, got {}",
                    t
                )))
            }
            (d, t) => {
                return Err(LocationError::InvalidArgument(format!(
                    "expiration_duration ({}) and expiration_time ({}) are mutually exclusive",
                    d, t
                )))
            }
        };

        let request = Self {
            priority,
            interval,
            fastest_interval,
            max_wait_time,
            num_updates,
            expiration,
        };
        request.validate()?;
        Ok(request)
    }
}

fn millis(field: &str, value: i64) -> Result<Duration> {
    if value < 0 {
        return Err(LocationError::InvalidArgument(format!(
            "{} must not be negative, got {}",
            field, value
        )));
    }
    Ok(Duration::from_millis(value as u64))
}

/// Untyped request as it arrives from a host environment.
///
/// All durations are milliseconds; `priority` is a provider code.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawRequest {
    pub priority: i32,
    pub interval: i64,
    pub fastest_interval: i64,
    pub max_wait_time: i64,
    pub num_updates: i32,
    pub expiration_duration: i64,
    pub expiration_time: i64,
}

/// A live registry record.
///
/// The registry holds `handle` only so it can be given back on removal.
#[derive(Clone, Debug)]
pub struct Subscription<H> {
    pub id: SubscriptionId,
    pub request: SubscriptionRequest,
    pub handle: H,
}

/// Events delivered to a subscriber.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LocationEvent {
    /// A new location fix.
    Update { position: Position },

    /// The provider reported a problem.
    Error { code: PositionErrorCode },

    /// Subscription ended; no further events follow.
    Dropped { reason: DropReason },
}

/// Why a subscription ended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Explicitly stopped by the caller.
    Unsubscribed,
    /// Requested number of updates delivered.
    Completed,
    /// Expiration deadline reached.
    Expired,
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Service deactivated.
    Deactivated,
    /// Provider connection failed.
    ConnectionLost(String),
}

/// Handle to receive a subscription's events.
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
    /// Channel to receive events.
    pub receiver: crossbeam_channel::Receiver<LocationEvent>,
}

impl SubscriptionHandle {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> std::result::Result<LocationEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> std::result::Result<LocationEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: Duration,
    ) -> std::result::Result<LocationEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}
