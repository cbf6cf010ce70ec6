//! Contract with the component that actually produces location fixes.
//!
//! The service never computes positions itself. A [`LocationProvider`]
//! starts and stops update streams per subscription id and reports back
//! through the [`DeliverySink`] it receives on connect.

mod simulated;

pub use simulated::SimulatedProvider;

use crate::error::Result;
use crate::subscriptions::SubscriptionRequest;
use crate::types::SubscriptionId;
use crate::worker::DeliverySink;
use serde::{Deserialize, Serialize};
use tracing::error;

/// Outcome of probing whether the provider can be used.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Available,
    ServiceMissing,
    UpdateRequired,
    Disabled,
    Invalid,
}

/// Provider connection changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "reason", rename_all = "snake_case")]
pub enum ConnectionEvent {
    Connected,
    /// Temporarily interrupted; the provider is expected to reconnect.
    Suspended,
    /// Connection lost for good.
    Failed(String),
}

/// Why the provider ended a subscription on its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    /// `num_updates` fixes delivered.
    Exhausted,
    /// Expiration deadline reached.
    Expired,
}

/// A source of location updates.
///
/// Implementations must not block in any of these calls; delivery happens
/// later through the sink passed to [`connect`](LocationProvider::connect).
pub trait LocationProvider: Send + Sync + 'static {
    /// Check whether the provider can be used at all.
    fn availability(&self) -> Result<Availability>;

    /// Start connecting. Progress is reported as [`ConnectionEvent`]s.
    fn connect(&self, sink: DeliverySink) -> Result<()>;

    /// Drop the connection and every update stream.
    fn disconnect(&self);

    /// Whether the provider currently holds a live connection.
    fn is_connected(&self) -> bool;

    /// Start delivering fixes matching `request`, tagged with `id`.
    fn request_updates(&self, id: SubscriptionId, request: &SubscriptionRequest) -> Result<()>;

    /// Stop delivering for `id`. Unknown ids are ignored.
    fn remove_updates(&self, id: SubscriptionId);
}

/// Whether `provider` reports itself usable.
///
/// Errors from the availability check are logged and treated as unavailable.
pub fn is_available<P: LocationProvider + ?Sized>(provider: &P) -> bool {
    match provider.availability() {
        Ok(availability) => availability == Availability::Available,
        Err(e) => {
            error!(error = %e, "failed to check location provider availability");
            false
        }
    }
}
