//! The change stream: one [`ChangeBatch`] per update cycle.
//!
//! A [`ChangeStream`] is a push stream that can only complete, never fail.
//! It broadcasts: every connected slot and every pull subscription receives
//! every batch published after it was attached. Nothing is replayed.
//!
//! Consumers can listen in two ways:
//!
//! - connect a slot to [`ChangeStream::on_batch`] (and
//!   [`ChangeStream::on_completed`]) for synchronous delivery
//! - call [`ChangeStream::subscribe`] for a queue they drain themselves
//!
//! ```
//! use horizon_fetch::{ChangeBatch, ChangeEvent, ChangeStream};
//!
//! let stream = ChangeStream::new();
//! let subscription = stream.subscribe();
//!
//! stream.publish(ChangeBatch::from_events(vec![ChangeEvent::SectionInserted(0)]));
//! stream.complete();
//!
//! assert_eq!(subscription.drain().len(), 1);
//! assert!(subscription.is_completed());
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use horizon_fetch_core::Signal;
use horizon_fetch_core::logging::targets;
use parking_lot::Mutex;

use crate::change::{ChangeBatch, ChangeEvent};

/// Broadcast stream of change batches with a single completion.
pub struct ChangeStream {
    batches: Signal<ChangeBatch>,
    completed: Signal<()>,
    subscribers: Mutex<Vec<Sender<ChangeBatch>>>,
    // Flipped under the `subscribers` lock, so no send follows it.
    finished: Arc<AtomicBool>,
    published: AtomicU64,
}

impl Default for ChangeStream {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeStream {
    /// Creates an open stream with no listeners.
    pub fn new() -> Self {
        Self {
            batches: Signal::new(),
            completed: Signal::new(),
            subscribers: Mutex::new(Vec::new()),
            finished: Arc::new(AtomicBool::new(false)),
            published: AtomicU64::new(0),
        }
    }

    /// Signal emitted once per published batch.
    pub fn on_batch(&self) -> &Signal<ChangeBatch> {
        &self.batches
    }

    /// Signal emitted exactly once, when the stream completes.
    ///
    /// Slots connected after completion are never called; check
    /// [`is_completed`](Self::is_completed) first.
    pub fn on_completed(&self) -> &Signal<()> {
        &self.completed
    }

    /// Opens a pull subscription.
    ///
    /// Subscribing to a completed stream yields a subscription that is
    /// already completed.
    pub fn subscribe(&self) -> ChangeSubscription {
        let (sender, receiver) = unbounded();
        let mut subscribers = self.subscribers.lock();
        if !self.is_completed() {
            subscribers.push(sender);
        }
        ChangeSubscription {
            receiver,
            finished: self.finished.clone(),
        }
    }

    /// Returns the number of live pull subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Delivers `batch` to every listener.
    ///
    /// Publishing to a completed stream drops the batch. Debug builds
    /// assert that no move has equal source and destination.
    pub fn publish(&self, batch: ChangeBatch) {
        debug_assert!(
            !batch
                .iter()
                .any(|event| matches!(event, ChangeEvent::ItemMoved { from, to } if from == to)),
            "batch contains a move onto its own path: {batch:?}"
        );
        {
            let mut subscribers = self.subscribers.lock();
            if self.is_completed() {
                tracing::warn!(
                    target: targets::STREAM,
                    events = batch.len(),
                    "batch published after completion, dropping"
                );
                return;
            }

            let sequence = self.published.fetch_add(1, Ordering::SeqCst) + 1;
            tracing::trace!(target: targets::STREAM, sequence, events = batch.len(), "publishing batch");
            subscribers.retain(|subscriber| subscriber.send(batch.clone()).is_ok());
        }
        self.batches.emit(batch);
    }

    /// Completes the stream.
    ///
    /// The first call emits [`on_completed`](Self::on_completed), closes
    /// every pull subscription and disconnects every slot. Later calls do
    /// nothing.
    pub fn complete(&self) {
        {
            let mut subscribers = self.subscribers.lock();
            if self.finished.swap(true, Ordering::SeqCst) {
                return;
            }
            subscribers.clear();
        }
        tracing::debug!(
            target: targets::STREAM,
            published = self.published_count(),
            "change stream completed"
        );

        self.completed.emit(());
        self.batches.disconnect_all();
        self.completed.disconnect_all();
    }

    /// Returns `true` once [`complete`](Self::complete) has been called.
    pub fn is_completed(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// Returns the number of batches published so far.
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::SeqCst)
    }
}

static_assertions::assert_impl_all!(ChangeStream: Send, Sync);

/// A pull-style view of a [`ChangeStream`].
///
/// Batches queue up until read. Once the stream completes and the queue is
/// drained, every read reports completion.
#[derive(Debug, Clone)]
pub struct ChangeSubscription {
    receiver: Receiver<ChangeBatch>,
    finished: Arc<AtomicBool>,
}

impl ChangeSubscription {
    /// Returns the next queued batch without blocking.
    pub fn try_recv(&self) -> Option<ChangeBatch> {
        self.receiver.try_recv().ok()
    }

    /// Blocks until a batch arrives. Returns `None` once the stream has
    /// completed and every queued batch has been read.
    pub fn recv(&self) -> Option<ChangeBatch> {
        self.receiver.recv().ok()
    }

    /// Blocks up to `timeout` for the next batch.
    pub fn recv_timeout(&self, timeout: std::time::Duration) -> Result<ChangeBatch, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Takes every queued batch.
    pub fn drain(&self) -> Vec<ChangeBatch> {
        self.receiver.try_iter().collect()
    }

    /// Returns the number of queued batches.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Returns `true` if the stream has completed and nothing is queued.
    ///
    /// Never takes a batch off the queue.
    pub fn is_completed(&self) -> bool {
        self.finished.load(Ordering::SeqCst) && self.receiver.is_empty()
    }

    /// Iterates over batches, blocking between them, until completion.
    pub fn iter(&self) -> impl Iterator<Item = ChangeBatch> + '_ {
        self.receiver.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{ChangeEvent, IndexPath};
    use std::sync::Arc;

    fn batch(section: usize) -> ChangeBatch {
        ChangeBatch::from_events(vec![ChangeEvent::SectionInserted(section)])
    }

    #[test]
    fn test_broadcast_to_all_listeners() {
        let stream = ChangeStream::new();
        let first = Arc::new(Mutex::new(Vec::new()));
        let second = Arc::new(Mutex::new(Vec::new()));

        let first_clone = first.clone();
        stream
            .on_batch()
            .connect(move |batch| first_clone.lock().push(batch.clone()));
        let second_clone = second.clone();
        stream
            .on_batch()
            .connect(move |batch| second_clone.lock().push(batch.clone()));
        let subscription = stream.subscribe();

        stream.publish(batch(0));
        stream.publish(batch(1));

        assert_eq!(*first.lock(), vec![batch(0), batch(1)]);
        assert_eq!(*second.lock(), vec![batch(0), batch(1)]);
        assert_eq!(subscription.drain(), vec![batch(0), batch(1)]);
        assert_eq!(stream.published_count(), 2);
    }

    #[test]
    fn test_no_replay_for_late_subscribers() {
        let stream = ChangeStream::new();
        stream.publish(batch(0));

        let late = stream.subscribe();
        assert_eq!(late.pending(), 0);

        stream.publish(batch(1));
        assert_eq!(late.drain(), vec![batch(1)]);
    }

    #[test]
    fn test_completion_fires_once() {
        let stream = ChangeStream::new();
        let completions = Arc::new(Mutex::new(0));

        let completions_clone = completions.clone();
        stream
            .on_completed()
            .connect(move |_| *completions_clone.lock() += 1);

        stream.complete();
        stream.complete();

        assert_eq!(*completions.lock(), 1);
        assert!(stream.is_completed());
        assert_eq!(stream.on_batch().connection_count(), 0);
        assert_eq!(stream.on_completed().connection_count(), 0);
    }

    #[test]
    fn test_publish_after_completion_is_dropped() {
        let stream = ChangeStream::new();
        let received = Arc::new(Mutex::new(0));

        let received_clone = received.clone();
        stream.on_batch().connect(move |_| *received_clone.lock() += 1);
        let subscription = stream.subscribe();

        stream.complete();
        stream.publish(batch(0));

        assert_eq!(*received.lock(), 0);
        assert_eq!(stream.published_count(), 0);
        assert!(subscription.is_completed());
        assert_eq!(subscription.recv(), None);
    }

    #[test]
    fn test_subscription_drains_before_completing() {
        let stream = ChangeStream::new();
        let subscription = stream.subscribe();

        stream.publish(ChangeBatch::from_events(vec![ChangeEvent::ItemInserted(
            IndexPath::new(0, 3),
        )]));
        stream.complete();

        assert!(!subscription.is_completed());
        assert_eq!(subscription.iter().count(), 1);
        assert!(subscription.is_completed());
        assert_eq!(stream.subscriber_count(), 0);
    }

    #[test]
    fn test_completion_check_keeps_queued_batches() {
        let stream = ChangeStream::new();
        let subscription = stream.subscribe();

        stream.publish(batch(0));
        for _ in 0..3 {
            assert!(!subscription.is_completed());
        }
        assert_eq!(subscription.pending(), 1);

        stream.publish(batch(1));
        stream.complete();
        assert!(!subscription.is_completed());
        assert!(!subscription.is_completed());
        assert_eq!(subscription.drain(), vec![batch(0), batch(1)]);
        assert!(subscription.is_completed());
    }

    #[test]
    fn test_completion_check_while_publishing_elsewhere() {
        let stream = Arc::new(ChangeStream::new());
        let subscription = stream.subscribe();

        let publisher = stream.clone();
        let worker = std::thread::spawn(move || {
            for section in 0..200 {
                publisher.publish(batch(section));
            }
            publisher.complete();
        });
        let mut received = Vec::new();
        while !subscription.is_completed() {
            received.extend(subscription.drain());
            std::thread::yield_now();
        }
        worker.join().unwrap();

        assert_eq!(received.len(), 200);
        assert_eq!(received[199], batch(199));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "batch contains a move onto its own path")]
    fn test_publishing_trivial_move_asserts() {
        let stream = ChangeStream::new();
        let path = IndexPath::new(1, 2);
        stream.publish(ChangeBatch::from_events(vec![ChangeEvent::ItemMoved {
            from: path,
            to: path,
        }]));
    }

    #[test]
    fn test_subscribe_after_completion() {
        let stream = ChangeStream::new();
        stream.complete();

        let subscription = stream.subscribe();
        assert!(subscription.is_completed());
        assert_eq!(stream.subscriber_count(), 0);
    }

    #[test]
    fn test_dropped_subscriptions_are_pruned() {
        let stream = ChangeStream::new();
        let kept = stream.subscribe();
        drop(stream.subscribe());
        assert_eq!(stream.subscriber_count(), 2);

        stream.publish(batch(0));
        assert_eq!(stream.subscriber_count(), 1);
        assert_eq!(kept.pending(), 1);
    }
}
