//! In-process provider driven by explicit fixes.

use crate::error::{LocationError, Result};
use crate::subscriptions::SubscriptionRequest;
use crate::types::{Position, SubscriptionId, Timestamp};
use crate::worker::DeliverySink;
use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::{Availability, CompletionReason, ConnectionEvent, LocationProvider};

/// Per-request delivery limits.
struct Tracker {
    remaining: Option<u32>,
    deadline: Option<Timestamp>,
}

struct State {
    sink: Option<DeliverySink>,
    requests: IndexMap<SubscriptionId, Tracker>,
    availability: Availability,
    check_error: Option<String>,
    reject_requests: bool,
}

/// A provider whose fixes come from [`push`](SimulatedProvider::push).
///
/// It enforces `num_updates` and expiration the way a real provider would:
/// a request past its deadline completes with `Expired` instead of
/// receiving the fix, and a request that has received its last fix
/// completes with `Exhausted`.
pub struct SimulatedProvider {
    state: Mutex<State>,
}

impl SimulatedProvider {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                sink: None,
                requests: IndexMap::new(),
                availability: Availability::Available,
                check_error: None,
                reject_requests: false,
            }),
        }
    }

    /// Change what the availability check reports.
    pub fn set_availability(&self, availability: Availability) {
        let mut state = self.state.lock();
        state.availability = availability;
        state.check_error = None;
    }

    /// Make the availability check itself fail.
    pub fn fail_availability_check(&self, message: impl Into<String>) {
        self.state.lock().check_error = Some(message.into());
    }

    /// Reject subsequent `request_updates` calls.
    pub fn reject_requests(&self, reject: bool) {
        self.state.lock().reject_requests = reject;
    }

    /// Ids with an active update stream, in request order.
    pub fn active_requests(&self) -> Vec<SubscriptionId> {
        self.state.lock().requests.keys().copied().collect()
    }

    /// Fan a fix out to every active request.
    ///
    /// The fix's timestamp is the clock used for expiration. Returns how
    /// many requests received it. Finished requests are removed even when
    /// the sink fails partway through.
    pub fn push(&self, position: Position) -> Result<usize> {
        let mut state = self.state.lock();
        let sink = state
            .sink
            .clone()
            .ok_or_else(|| LocationError::Provider("not connected".to_string()))?;

        let mut delivered = 0;
        let mut finished = Vec::new();
        let mut failure = None;

        for (id, tracker) in state.requests.iter_mut() {
            if tracker.deadline.map_or(false, |d| d <= position.timestamp) {
                finished.push((*id, CompletionReason::Expired));
                continue;
            }

            if let Err(e) = sink.position(*id, position.clone()) {
                failure = Some(e);
                break;
            }
            delivered += 1;

            if let Some(remaining) = tracker.remaining.as_mut() {
                *remaining = remaining.saturating_sub(1);
                if *remaining == 0 {
                    finished.push((*id, CompletionReason::Exhausted));
                }
            }
        }

        for (id, reason) in finished {
            state.requests.shift_remove(&id);
            debug!(id = id.0, ?reason, "simulated request finished");
            if let Err(e) = sink.completed(id, reason) {
                if failure.is_none() {
                    failure = Some(e);
                }
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(delivered),
        }
    }

    /// Report a temporary interruption.
    pub fn suspend(&self) -> Result<()> {
        match self.state.lock().sink.as_ref() {
            Some(sink) => sink.connection(ConnectionEvent::Suspended),
            None => Err(LocationError::Provider("not connected".to_string())),
        }
    }

    /// Lose the connection, dropping every update stream.
    pub fn fail(&self, reason: impl Into<String>) -> Result<()> {
        let mut state = self.state.lock();
        state.requests.clear();
        match state.sink.take() {
            Some(sink) => sink.connection(ConnectionEvent::Failed(reason.into())),
            None => Err(LocationError::Provider("not connected".to_string())),
        }
    }
}

impl Default for SimulatedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl LocationProvider for SimulatedProvider {
    fn availability(&self) -> Result<Availability> {
        let state = self.state.lock();
        match &state.check_error {
            Some(message) => Err(LocationError::Provider(message.clone())),
            None => Ok(state.availability),
        }
    }

    fn connect(&self, sink: DeliverySink) -> Result<()> {
        let mut state = self.state.lock();
        if state.sink.is_some() {
            warn!("simulated provider already connected");
        }
        sink.connection(ConnectionEvent::Connected)?;
        state.sink = Some(sink);
        Ok(())
    }

    fn disconnect(&self) {
        let mut state = self.state.lock();
        state.sink = None;
        state.requests.clear();
    }

    fn is_connected(&self) -> bool {
        self.state.lock().sink.is_some()
    }

    fn request_updates(&self, id: SubscriptionId, request: &SubscriptionRequest) -> Result<()> {
        let mut state = self.state.lock();
        if state.sink.is_none() {
            return Err(LocationError::Provider("not connected".to_string()));
        }
        if state.reject_requests {
            return Err(LocationError::Provider(format!(
                "request {} rejected",
                id
            )));
        }

        let started = Timestamp::now();
        state.requests.insert(
            id,
            Tracker {
                remaining: request.num_updates,
                deadline: request.expiration.map(|e| e.deadline(started)),
            },
        );
        Ok(())
    }

    fn remove_updates(&self, id: SubscriptionId) {
        self.state.lock().requests.shift_remove(&id);
    }
}
