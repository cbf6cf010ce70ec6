//! # Location Registry
//!
//! Concurrent location-update subscriptions over a pluggable provider.
//!
//! ## Core Concepts
//!
//! - **Registry**: Issues unique, never-reused ids and tracks active subscriptions
//! - **Provider**: Produces fixes and enforces update counts and expiration
//! - **Worker**: Single delivery thread on which provider reports are handled
//! - **Service**: Starts, stops and tears down update streams
//!
//! ## Example
//!
//! ```ignore
//! use location_registry::{LocationService, Priority, ServiceConfig, SubscriptionRequest};
//!
//! let service = LocationService::new(provider, ServiceConfig::default())?;
//! if service.is_available() {
//!     service.activate(true)?;
//! }
//!
//! let handle = service.start_updates(
//!     SubscriptionRequest::new(Priority::HighAccuracy, Duration::from_secs(1))
//!         .with_num_updates(10),
//! )?;
//!
//! while let Ok(event) = handle.recv() {
//!     println!("{:?}", event);
//! }
//! ```

pub mod error;
pub mod provider;
pub mod service;
pub mod subscriptions;
pub mod types;
pub mod worker;

// Re-exports
pub use error::{LocationError, Result};
pub use provider::{
    is_available, Availability, CompletionReason, ConnectionEvent, LocationProvider,
    SimulatedProvider,
};
pub use service::{LocationService, ServiceConfig};
pub use subscriptions::{
    DropReason, Expiration, LocationEvent, RawRequest, Subscription, SubscriptionHandle,
    SubscriptionRegistry, SubscriptionRequest,
};
pub use types::*;
pub use worker::{DeliverySink, DeliveryTask, DeliveryWorker};
