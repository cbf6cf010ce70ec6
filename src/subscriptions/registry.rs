//! Registry of active subscriptions.

use crate::error::Result;
use crate::types::SubscriptionId;
use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::{debug, trace};

use super::types::{Subscription, SubscriptionRequest};

/// Id allocator and records, guarded together so that allocate-and-insert
/// is a single critical section.
struct Inner<H> {
    /// Next id to hand out. Never decreases.
    next_id: u64,
    /// Active subscriptions in insertion order.
    entries: IndexMap<SubscriptionId, Subscription<H>>,
}

/// Tracks which subscriptions are currently active.
///
/// `H` is the opaque delivery handle; the registry stores it and gives it
/// back on removal but never looks inside it.
pub struct SubscriptionRegistry<H> {
    inner: RwLock<Inner<H>>,
}

impl<H> SubscriptionRegistry<H> {
    /// Create an empty registry. The first id issued is 1.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                next_id: 1,
                entries: IndexMap::new(),
            }),
        }
    }

    /// Register a new subscription and return its id.
    ///
    /// Fails with `InvalidArgument` before touching any state if the request
    /// does not validate.
    pub fn subscribe(&self, request: SubscriptionRequest, handle: H) -> Result<SubscriptionId> {
        request.validate()?;

        let mut inner = self.inner.write();
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        debug!(id = id.0, priority = ?request.priority, "subscription registered");
        inner.entries.insert(id, Subscription { id, request, handle });

        Ok(id)
    }

    /// Remove a subscription, returning its record.
    ///
    /// Unknown ids return `None`; calling this twice for the same id is
    /// harmless.
    pub fn unsubscribe(&self, id: SubscriptionId) -> Option<Subscription<H>> {
        let removed = self.inner.write().entries.shift_remove(&id);
        match removed {
            Some(_) => debug!(id = id.0, "subscription removed"),
            None => trace!(id = id.0, "unsubscribe for unknown id ignored"),
        }
        removed
    }

    /// Remove every subscription, returning them in insertion order.
    pub fn reset(&self) -> Vec<Subscription<H>> {
        let drained: Vec<_> = {
            let mut inner = self.inner.write();
            inner.entries.drain(..).map(|(_, sub)| sub).collect()
        };
        if !drained.is_empty() {
            debug!(count = drained.len(), "registry reset");
        }
        drained
    }

    /// Get the request for a subscription.
    pub fn get(&self, id: SubscriptionId) -> Option<SubscriptionRequest> {
        self.inner.read().entries.get(&id).map(|s| s.request.clone())
    }

    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.inner.read().entries.contains_key(&id)
    }

    /// Number of active subscriptions.
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    /// Active ids in insertion order.
    pub fn ids(&self) -> Vec<SubscriptionId> {
        self.inner.read().entries.keys().copied().collect()
    }

    /// Snapshot of active subscriptions in insertion order.
    pub fn active(&self) -> Vec<(SubscriptionId, SubscriptionRequest)> {
        self.inner
            .read()
            .entries
            .values()
            .map(|s| (s.id, s.request.clone()))
            .collect()
    }

    /// Run `f` against a live subscription's handle.
    ///
    /// Holds the read lock for the duration of `f`, so `f` must not call
    /// back into the registry.
    pub fn with_handle<R>(&self, id: SubscriptionId, f: impl FnOnce(&H) -> R) -> Option<R> {
        self.inner.read().entries.get(&id).map(|s| f(&s.handle))
    }
}

impl<H> Default for SubscriptionRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LocationError;
    use crate::types::Priority;
    use std::time::Duration;

    fn request() -> SubscriptionRequest {
        SubscriptionRequest::new(Priority::HighAccuracy, Duration::from_secs(1))
            .with_fastest_interval(Duration::from_millis(500))
            .with_max_wait_time(Duration::from_secs(2))
    }

    #[test]
    fn test_subscribe_unsubscribe() {
        let registry = SubscriptionRegistry::new();

        let id = registry.subscribe(request(), "handle").unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(id), Some(request()));

        let removed = registry.unsubscribe(id).unwrap();
        assert_eq!(removed.id, id);
        assert_eq!(removed.handle, "handle");
        assert!(registry.is_empty());
    }

    #[test]
    fn test_ids_start_at_one_and_increase() {
        let registry = SubscriptionRegistry::new();

        let first = registry.subscribe(request(), ()).unwrap();
        let second = registry.subscribe(request(), ()).unwrap();
        assert_eq!(first, SubscriptionId(1));
        assert_eq!(second, SubscriptionId(2));
    }

    #[test]
    fn test_ids_not_reused_after_unsubscribe() {
        let registry = SubscriptionRegistry::new();

        let first = registry.subscribe(request(), ()).unwrap();
        registry.unsubscribe(first);
        let second = registry.subscribe(request(), ()).unwrap();
        assert!(second > first);

        registry.reset();
        let third = registry.subscribe(request(), ()).unwrap();
        assert!(third > second);
    }

    #[test]
    fn test_unsubscribe_unknown_is_noop() {
        let registry: SubscriptionRegistry<()> = SubscriptionRegistry::new();
        let id = registry.subscribe(request(), ()).unwrap();

        assert!(registry.unsubscribe(SubscriptionId(99)).is_none());
        assert!(registry.unsubscribe(id).is_some());
        assert!(registry.unsubscribe(id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_invalid_request_creates_no_state() {
        let registry = SubscriptionRegistry::new();

        let result = registry.subscribe(request().with_num_updates(0), ());
        assert!(matches!(result, Err(LocationError::InvalidArgument(_))));
        assert!(registry.is_empty());

        // The failed call must not have consumed an id
        let id = registry.subscribe(request(), ()).unwrap();
        assert_eq!(id, SubscriptionId(1));
    }

    #[test]
    fn test_enumeration_preserves_insertion_order() {
        let registry = SubscriptionRegistry::new();

        let ids: Vec<_> = (0..5)
            .map(|i| registry.subscribe(request(), i).unwrap())
            .collect();
        registry.unsubscribe(ids[1]);
        registry.unsubscribe(ids[3]);

        assert_eq!(registry.ids(), vec![ids[0], ids[2], ids[4]]);

        let handles: Vec<_> = registry.reset().into_iter().map(|s| s.handle).collect();
        assert_eq!(handles, vec![0, 2, 4]);
    }

    #[test]
    fn test_with_handle() {
        let registry = SubscriptionRegistry::new();
        let id = registry.subscribe(request(), String::from("sink")).unwrap();

        assert_eq!(registry.with_handle(id, |h| h.len()), Some(4));
        registry.unsubscribe(id);
        assert_eq!(registry.with_handle(id, |h| h.len()), None);
    }
}
