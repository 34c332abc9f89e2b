//! Batching of raw collaborator notifications.
//!
//! The [`NotificationCollector`] is the listener a data source registers with
//! its collaborator. It turns one update cycle of raw notifications into
//! exactly one [`ChangeBatch`]:
//!
//! ```text
//! begin_cycle          clear the pending buffer
//! notify_*             append a validated event, or drop the notification
//! end_cycle            publish the buffer as one batch, clear it
//! ```
//!
//! # Filtering Rules
//!
//! - A change-kind tag of zero or any unrecognised value is dropped
//!   silently. Collaborators are known to deliver such tags occasionally;
//!   they carry no usable path pairing and are never repaired.
//! - Section notifications other than insert/delete are ignored.
//! - A move whose old and new paths are equal produces no event.
//! - A recognised kind without the paths it requires is a contract
//!   violation and panics.
//!
//! # Ordering Contract
//!
//! The collector does not serialize cycles itself. Callers deliver
//! `begin → notifications → end` on one thread, and never interleave two
//! cycles. Notifications outside a cycle are still buffered (and logged)
//! so that nothing is lost if a collaborator skips `begin`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use horizon_fetch_core::ThreadAffinity;
use horizon_fetch_core::logging::targets;
use parking_lot::Mutex;

use crate::change::{ChangeBatch, ChangeEvent, IndexPath, RawChangeKind};
use crate::config::DataSourceConfig;
use crate::results::ResultsListener;
use crate::stream::ChangeStream;

/// Accumulates one update cycle of notifications into a [`ChangeBatch`].
pub struct NotificationCollector {
    name: String,
    pending: Mutex<Vec<ChangeEvent>>,
    in_cycle: AtomicBool,
    detached: AtomicBool,
    cycles: AtomicU64,
    log_batches: bool,
    affinity: ThreadAffinity,
    changes: Arc<ChangeStream>,
}

impl NotificationCollector {
    /// Creates a collector that publishes to `changes`.
    pub fn new(changes: Arc<ChangeStream>, config: &DataSourceConfig) -> Self {
        let affinity = if config.check_thread_affinity {
            ThreadAffinity::current()
        } else {
            ThreadAffinity::disabled()
        };
        Self {
            name: config.name.clone(),
            pending: Mutex::new(Vec::new()),
            in_cycle: AtomicBool::new(false),
            detached: AtomicBool::new(false),
            cycles: AtomicU64::new(0),
            log_batches: config.log_batches,
            affinity,
            changes,
        }
    }

    /// Starts an update cycle, discarding anything left in the buffer.
    pub fn begin_cycle(&self) {
        if !self.accepting("begin_cycle") {
            return;
        }
        if self.in_cycle.swap(true, Ordering::SeqCst) {
            tracing::warn!(
                target: targets::COLLECTOR,
                source = %self.name,
                "update cycle began while another was open"
            );
        }
        let discarded = {
            let mut pending = self.pending.lock();
            let discarded = pending.len();
            pending.clear();
            discarded
        };
        tracing::debug!(target: targets::COLLECTOR, source = %self.name, discarded, "update cycle begin");
    }

    /// Records a section-level notification.
    ///
    /// Only insertions and deletions produce events; every other tag is
    /// ignored.
    pub fn notify_section_change(&self, index: usize, kind: RawChangeKind) {
        if !self.accepting("notify_section_change") {
            return;
        }
        let event = kind.kind().and_then(|kind| ChangeEvent::for_section(index, kind));
        match event {
            Some(event) => self.push(event),
            None => tracing::trace!(
                target: targets::COLLECTOR,
                source = %self.name,
                index,
                raw_kind = kind.value(),
                "ignoring section notification"
            ),
        }
    }

    /// Records an item-level notification.
    ///
    /// # Panics
    ///
    /// Panics if a recognised kind arrives without the path(s) it requires.
    pub fn notify_item_change(
        &self,
        old_path: Option<IndexPath>,
        new_path: Option<IndexPath>,
        kind: RawChangeKind,
    ) {
        if !self.accepting("notify_item_change") {
            return;
        }
        let Some(change_kind) = kind.kind() else {
            tracing::trace!(
                target: targets::COLLECTOR,
                source = %self.name,
                raw_kind = kind.value(),
                ?old_path,
                ?new_path,
                "dropping item notification with unrecognised kind"
            );
            return;
        };

        match ChangeEvent::for_item(old_path, new_path, change_kind) {
            Ok(Some(event)) => self.push(event),
            Ok(None) => tracing::trace!(
                target: targets::COLLECTOR,
                source = %self.name,
                ?old_path,
                "dropping move to the same path"
            ),
            Err(err) => {
                tracing::error!(
                    target: targets::COLLECTOR,
                    source = %self.name,
                    ?old_path,
                    ?new_path,
                    "{err}"
                );
                panic!("result-set contract violation: {err}");
            }
        }
    }

    /// Ends the update cycle and publishes the buffered events as one batch.
    pub fn end_cycle(&self) {
        if !self.accepting("end_cycle") {
            return;
        }
        if !self.in_cycle.swap(false, Ordering::SeqCst) {
            tracing::warn!(
                target: targets::COLLECTOR,
                source = %self.name,
                "update cycle ended without a matching begin"
            );
        }

        let batch = ChangeBatch::from_events(std::mem::take(&mut *self.pending.lock()));
        let cycle = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(
            target: targets::COLLECTOR,
            source = %self.name,
            cycle,
            events = batch.len(),
            "update cycle end"
        );
        if self.log_batches {
            for event in &batch {
                tracing::debug!(target: targets::COLLECTOR, source = %self.name, cycle, %event);
            }
        }

        self.changes.publish(batch);
    }

    /// Stops accepting notifications. Later callbacks are ignored.
    pub fn detach(&self) {
        if !self.detached.swap(true, Ordering::SeqCst) {
            self.pending.lock().clear();
            self.in_cycle.store(false, Ordering::SeqCst);
            tracing::debug!(target: targets::COLLECTOR, source = %self.name, "collector detached");
        }
    }

    /// Returns `true` once [`detach`](Self::detach) has been called.
    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::SeqCst)
    }

    /// Returns `true` between `begin_cycle` and `end_cycle`.
    pub fn is_in_cycle(&self) -> bool {
        self.in_cycle.load(Ordering::SeqCst)
    }

    /// Returns the number of events buffered in the current cycle.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Returns the number of completed update cycles.
    pub fn cycle_count(&self) -> u64 {
        self.cycles.load(Ordering::SeqCst)
    }

    fn accepting(&self, callback: &'static str) -> bool {
        self.affinity.debug_check(callback);
        if self.is_detached() {
            tracing::warn!(
                target: targets::COLLECTOR,
                source = %self.name,
                callback,
                "notification after detach, ignoring"
            );
            return false;
        }
        true
    }

    fn push(&self, event: ChangeEvent) {
        if !self.is_in_cycle() {
            tracing::warn!(
                target: targets::COLLECTOR,
                source = %self.name,
                %event,
                "notification outside an update cycle"
            );
        }
        tracing::trace!(target: targets::COLLECTOR, source = %self.name, %event, "buffered");
        self.pending.lock().push(event);
    }
}

impl ResultsListener for NotificationCollector {
    fn will_change_content(&self) {
        self.begin_cycle();
    }

    fn did_change_section(&self, index: usize, kind: RawChangeKind) {
        self.notify_section_change(index, kind);
    }

    fn did_change_object(
        &self,
        old_path: Option<IndexPath>,
        new_path: Option<IndexPath>,
        kind: RawChangeKind,
    ) {
        self.notify_item_change(old_path, new_path, kind);
    }

    fn did_change_content(&self) {
        self.end_cycle();
    }
}

static_assertions::assert_impl_all!(NotificationCollector: Send, Sync);
