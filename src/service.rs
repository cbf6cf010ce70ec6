//! Location service tying the registry, a provider and the delivery worker
//! together.

use crate::error::{LocationError, Result};
use crate::provider::{
    self, Availability, CompletionReason, ConnectionEvent, LocationProvider,
};
use crate::subscriptions::{
    DropReason, LocationEvent, RawRequest, SubscriptionHandle, SubscriptionRegistry,
    SubscriptionRequest,
};
use crate::types::{Position, PositionErrorCode, SubscriptionId};
use crate::worker::{DeliveryTask, DeliveryWorker};
use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Service configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Max buffered events per subscriber before it is dropped.
    /// Default: 64
    pub subscriber_buffer: usize,

    /// Name of the delivery thread.
    pub worker_name: String,

    /// Check provider availability before every subscription.
    pub require_availability: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer: 64,
            worker_name: "location-updates".to_string(),
            require_availability: true,
        }
    }
}

impl ServiceConfig {
    /// Parse a JSON configuration; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.subscriber_buffer == 0 {
            return Err(LocationError::Config(
                "subscriber_buffer must be at least 1".to_string(),
            ));
        }
        if self.worker_name.is_empty() {
            return Err(LocationError::Config(
                "worker_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// State reachable from both callers and the delivery thread.
struct Shared<P> {
    registry: SubscriptionRegistry<Sender<LocationEvent>>,
    provider: Arc<P>,
    active: AtomicBool,
    /// Current connection generation. Bumped on every activate/deactivate.
    generation: AtomicU64,
    /// Write: activate, deactivate, connection failure.
    /// Read: the check-subscribe-request sequence in `start_updates`.
    activation: RwLock<()>,
}

impl<P: LocationProvider> Shared<P> {
    fn handle_task(&self, task: DeliveryTask) {
        match task {
            DeliveryTask::Position { id, position } => self.deliver(id, position),
            DeliveryTask::Completed { id, reason } => {
                let reason = match reason {
                    CompletionReason::Exhausted => DropReason::Completed,
                    CompletionReason::Expired => DropReason::Expired,
                };
                self.stop(id, reason);
            }
            DeliveryTask::Connection {
                event: ConnectionEvent::Connected,
                generation,
            } => {
                info!(generation, "location provider connected");
            }
            DeliveryTask::Connection {
                event: ConnectionEvent::Suspended,
                generation,
            } => {
                warn!(generation, "location provider connection suspended");
            }
            DeliveryTask::Connection {
                event: ConnectionEvent::Failed(reason),
                generation,
            } => self.connection_failed(generation, reason),
            DeliveryTask::Shutdown => {}
        }
    }

    fn connection_failed(&self, generation: u64, reason: String) {
        let _guard = self.activation.write();

        if generation != self.generation.load(Ordering::SeqCst) {
            debug!(generation, %reason, "ignoring failure of a previous connection");
            return;
        }

        warn!(generation, %reason, "location provider connection failed");
        self.active.store(false, Ordering::SeqCst);
        self.teardown_all(
            Some(PositionErrorCode::UnknownSource),
            DropReason::ConnectionLost(reason),
        );
    }

    /// Start a new connection generation; events stamped with older ones
    /// are ignored from here on. Caller holds the activation write guard.
    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Route a fix to its subscriber. Drops subscribers that can't keep up.
    fn deliver(&self, id: SubscriptionId, position: Position) {
        let outcome = self
            .registry
            .with_handle(id, |sender| sender.try_send(LocationEvent::Update { position }));

        match outcome {
            None => trace!(id = id.0, "fix for inactive subscription discarded"),
            Some(Ok(())) => {}
            Some(Err(TrySendError::Full(_))) => {
                warn!(id = id.0, "subscriber buffer full, dropping subscription");
                self.stop(id, DropReason::BufferOverflow);
            }
            Some(Err(TrySendError::Disconnected(_))) => {
                debug!(id = id.0, "subscriber went away");
                self.stop(id, DropReason::Unsubscribed);
            }
        }
    }

    /// Remove one subscription and stop its delivery.
    ///
    /// The registry removal comes first so the delivery thread can no
    /// longer find the handle once the provider is told to stop.
    fn stop(&self, id: SubscriptionId, reason: DropReason) -> bool {
        match self.registry.unsubscribe(id) {
            Some(sub) => {
                self.provider.remove_updates(id);
                // Best effort
                let _ = sub.handle.try_send(LocationEvent::Dropped { reason });
                true
            }
            None => false,
        }
    }

    fn teardown_all(&self, error: Option<PositionErrorCode>, reason: DropReason) -> usize {
        let removed = self.registry.reset();
        for sub in &removed {
            self.provider.remove_updates(sub.id);
            if let Some(code) = error {
                let _ = sub.handle.try_send(LocationEvent::Error { code });
            }
            let _ = sub.handle.try_send(LocationEvent::Dropped {
                reason: reason.clone(),
            });
        }
        removed.len()
    }
}

/// Location updates for many concurrent subscribers over one provider.
///
/// Provides:
/// - Availability probing and provider activation
/// - Starting and stopping per-subscriber update streams
/// - Teardown of every stream when the provider goes away
pub struct LocationService<P: LocationProvider> {
    config: ServiceConfig,
    shared: Arc<Shared<P>>,
    worker: DeliveryWorker,
}

impl<P: LocationProvider> LocationService<P> {
    /// Create a service over `provider` and start its delivery thread.
    ///
    /// The provider is not connected until [`activate`](Self::activate).
    pub fn new(provider: Arc<P>, config: ServiceConfig) -> Result<Self> {
        config.validate()?;

        let shared = Arc::new(Shared {
            registry: SubscriptionRegistry::new(),
            provider,
            active: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            activation: RwLock::new(()),
        });

        let handler = Arc::clone(&shared);
        let worker = DeliveryWorker::spawn(config.worker_name.clone(), move |task| {
            handler.handle_task(task)
        })?;

        Ok(Self {
            config,
            shared,
            worker,
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.shared.provider
    }

    /// Whether the provider reports itself usable.
    pub fn is_available(&self) -> bool {
        provider::is_available(self.shared.provider.as_ref())
    }

    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::SeqCst)
    }

    /// Connect (`true`) or disconnect (`false`) the provider.
    ///
    /// Disconnecting ends every subscription with
    /// [`DropReason::Deactivated`]. Both directions are idempotent.
    ///
    /// Enabling checks the provider's own connection state, so a connection
    /// that dropped before its failure was handled is re-established and
    /// its subscriptions end with [`DropReason::ConnectionLost`].
    pub fn activate(&self, enable: bool) -> Result<()> {
        let shared = &self.shared;
        let _guard = shared.activation.write();

        if enable {
            if self.is_active() {
                if shared.provider.is_connected() {
                    return Ok(());
                }
                warn!("location provider connection lost before reactivation");
                shared.teardown_all(
                    Some(PositionErrorCode::UnknownSource),
                    DropReason::ConnectionLost("connection lost".to_string()),
                );
            }

            shared.active.store(false, Ordering::SeqCst);
            let generation = shared.next_generation();
            shared.provider.connect(self.worker.sink_for(generation))?;
            shared.active.store(true, Ordering::SeqCst);
            info!(generation, "location service activated");
        } else {
            shared.active.store(false, Ordering::SeqCst);
            shared.next_generation();
            shared.provider.disconnect();
            let removed = shared.teardown_all(None, DropReason::Deactivated);
            info!(removed, "location service deactivated");
        }

        Ok(())
    }

    /// Start an update stream for `request`.
    ///
    /// Nothing is left registered if the provider refuses the request.
    pub fn start_updates(&self, request: SubscriptionRequest) -> Result<SubscriptionHandle> {
        request.validate()?;

        if self.config.require_availability {
            let availability = self.shared.provider.availability()?;
            if availability != Availability::Available {
                return Err(LocationError::ProviderUnavailable(availability));
            }
        }

        // Held until the provider has the request, so a concurrent
        // deactivate can't reset the registry in between.
        let _guard = self.shared.activation.read();
        if !self.is_active() {
            return Err(LocationError::NotActive);
        }

        let (sender, receiver) = bounded(self.config.subscriber_buffer);
        let id = self.shared.registry.subscribe(request.clone(), sender)?;

        if let Err(e) = self.shared.provider.request_updates(id, &request) {
            warn!(id = id.0, error = %e, "provider refused update request");
            self.shared.registry.unsubscribe(id);
            return Err(e);
        }

        let interval_ms = u64::try_from(request.interval.as_millis()).unwrap_or(u64::MAX);
        info!(
            id = id.0,
            priority = ?request.priority,
            interval_ms,
            "location updates started"
        );
        Ok(SubscriptionHandle { id, receiver })
    }

    /// Start an update stream from the host boundary form.
    pub fn start_updates_raw(&self, raw: RawRequest) -> Result<SubscriptionHandle> {
        self.start_updates(SubscriptionRequest::from_raw(raw)?)
    }

    /// Stop an update stream. Returns false if `id` was not active.
    pub fn stop_updates(&self, id: SubscriptionId) -> bool {
        let stopped = self.shared.stop(id, DropReason::Unsubscribed);
        if stopped {
            info!(id = id.0, "location updates stopped");
        }
        stopped
    }

    /// Active subscriptions in the order they were started.
    pub fn active_subscriptions(&self) -> Vec<(SubscriptionId, SubscriptionRequest)> {
        self.shared.registry.active()
    }

    pub fn subscription_count(&self) -> usize {
        self.shared.registry.len()
    }
}

impl<P: LocationProvider> Drop for LocationService<P> {
    fn drop(&mut self) {
        if self.is_active() {
            let _ = self.activate(false);
        }
        self.worker.shutdown();
    }
}
