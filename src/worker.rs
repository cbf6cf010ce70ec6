//! Dedicated delivery thread.
//!
//! Providers report positions, completions and connection changes from
//! whatever context they run on. Those reports are queued here and handled
//! one at a time on a single named thread, so subscriber delivery never
//! runs on the provider's own callback path.

use crate::error::{LocationError, Result};
use crate::provider::{CompletionReason, ConnectionEvent};
use crate::types::{Position, SubscriptionId};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Work item for the delivery thread.
#[derive(Clone, Debug)]
pub enum DeliveryTask {
    /// A fix for one subscription.
    Position {
        id: SubscriptionId,
        position: Position,
    },
    /// A subscription reached its natural end.
    Completed {
        id: SubscriptionId,
        reason: CompletionReason,
    },
    /// The provider connection changed.
    ///
    /// `generation` identifies the connection the event belongs to.
    Connection {
        generation: u64,
        event: ConnectionEvent,
    },
    /// Stop the worker. Not forwarded to the handler.
    Shutdown,
}

/// Producer side of the delivery queue, handed to providers.
///
/// Each sink is stamped with the connection generation it was created for,
/// so events from an earlier connection can be told apart from current ones.
#[derive(Clone, Debug)]
pub struct DeliverySink {
    sender: Sender<DeliveryTask>,
    generation: u64,
}

impl DeliverySink {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Queue a fix for subscription `id`.
    pub fn position(&self, id: SubscriptionId, position: Position) -> Result<()> {
        self.send(DeliveryTask::Position { id, position })
    }

    /// Report that subscription `id` has finished on its own.
    pub fn completed(&self, id: SubscriptionId, reason: CompletionReason) -> Result<()> {
        self.send(DeliveryTask::Completed { id, reason })
    }

    /// Report a connection change.
    pub fn connection(&self, event: ConnectionEvent) -> Result<()> {
        self.send(DeliveryTask::Connection {
            generation: self.generation,
            event,
        })
    }

    fn send(&self, task: DeliveryTask) -> Result<()> {
        self.sender
            .send(task)
            .map_err(|_| LocationError::WorkerStopped)
    }
}

/// Single-consumer task queue running on its own thread.
///
/// Dropping the worker stops the thread after the tasks already queued
/// have been handled.
pub struct DeliveryWorker {
    sender: Sender<DeliveryTask>,
    thread: Option<JoinHandle<()>>,
}

impl DeliveryWorker {
    /// Spawn a worker thread named `name` that feeds every task to `handler`.
    pub fn spawn<F>(name: impl Into<String>, mut handler: F) -> Result<Self>
    where
        F: FnMut(DeliveryTask) + Send + 'static,
    {
        let (sender, receiver): (Sender<DeliveryTask>, Receiver<DeliveryTask>) = unbounded();
        let name = name.into();

        let thread = thread::Builder::new().name(name.clone()).spawn(move || {
            debug!(worker = %name, "delivery worker started");
            for task in receiver.iter() {
                if matches!(task, DeliveryTask::Shutdown) {
                    break;
                }
                handler(task);
            }
            debug!(worker = %name, "delivery worker stopped");
        })?;

        Ok(Self {
            sender,
            thread: Some(thread),
        })
    }

    /// A new producer handle for this worker's queue.
    pub fn sink(&self) -> DeliverySink {
        self.sink_for(0)
    }

    /// A producer handle stamped with connection `generation`.
    pub fn sink_for(&self, generation: u64) -> DeliverySink {
        DeliverySink {
            sender: self.sender.clone(),
            generation,
        }
    }

    /// Stop the worker and wait for it to exit.
    pub fn shutdown(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.sender.send(DeliveryTask::Shutdown);
            if thread.join().is_err() {
                warn!("delivery worker panicked");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().map_or(false, |t| !t.is_finished())
    }
}

impl Drop for DeliveryWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use std::time::Duration;

    #[test]
    fn test_tasks_handled_in_order() {
        let (tx, rx) = bounded(16);
        let worker = DeliveryWorker::spawn("test-worker", move |task| {
            if let DeliveryTask::Position { id, .. } = task {
                let _ = tx.send(id);
            }
        })
        .unwrap();

        let sink = worker.sink();
        for i in 1..=5 {
            sink.position(SubscriptionId(i), Position::new(0.0, 0.0))
                .unwrap();
        }

        let received: Vec<_> = (0..5)
            .map(|_| rx.recv_timeout(Duration::from_secs(1)).unwrap())
            .collect();
        assert_eq!(received, (1..=5).map(SubscriptionId).collect::<Vec<_>>());
    }

    #[test]
    fn test_runs_on_named_thread() {
        let (tx, rx) = bounded(1);
        let worker = DeliveryWorker::spawn("location-updates", move |_| {
            let _ = tx.send(thread::current().name().map(str::to_string));
        })
        .unwrap();

        worker
            .sink()
            .connection(ConnectionEvent::Connected)
            .unwrap();
        let name = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(name.as_deref(), Some("location-updates"));
    }

    #[test]
    fn test_connection_events_carry_generation() {
        let (tx, rx) = bounded(2);
        let worker = DeliveryWorker::spawn("test-worker", move |task| {
            if let DeliveryTask::Connection { generation, .. } = task {
                let _ = tx.send(generation);
            }
        })
        .unwrap();

        worker.sink().connection(ConnectionEvent::Suspended).unwrap();
        let sink = worker.sink_for(7);
        assert_eq!(sink.generation(), 7);
        sink.connection(ConnectionEvent::Connected).unwrap();

        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), 0);
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), 7);
    }

    #[test]
    fn test_send_after_shutdown_fails() {
        let mut worker = DeliveryWorker::spawn("test-worker", |_| {}).unwrap();
        let sink = worker.sink();

        worker.shutdown();
        assert!(!worker.is_running());

        // Receiver is gone once the thread exits
        let result = sink.connection(ConnectionEvent::Connected);
        assert!(matches!(result, Err(LocationError::WorkerStopped)));
    }
}
