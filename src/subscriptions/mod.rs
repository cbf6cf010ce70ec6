//! Subscription bookkeeping for location updates.
//!
//! The [`SubscriptionRegistry`] is the single place that knows which update
//! streams are active:
//! - Ids are issued from 1, strictly increasing, never reused
//! - Records are kept in insertion order
//! - Removal of an unknown id is a no-op, so cancellation races are harmless
//!
//! # Example
//!
//! ```ignore
//! let registry = SubscriptionRegistry::new();
//!
//! let request = SubscriptionRequest::new(Priority::HighAccuracy, Duration::from_secs(1));
//! let id = registry.subscribe(request, sender)?;
//!
//! // Later, stop delivery for the returned handle
//! if let Some(sub) = registry.unsubscribe(id) {
//!     provider.remove_updates(sub.id);
//! }
//! ```

mod registry;
mod types;

pub use registry::SubscriptionRegistry;
pub use types::{
    DropReason, Expiration, LocationEvent, RawRequest, Subscription, SubscriptionHandle,
    SubscriptionRequest,
};
