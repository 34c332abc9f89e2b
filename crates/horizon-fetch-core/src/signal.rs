//! Synchronous signals with connectable slots.
//!
//! A [`Signal`] fans a value out to every connected slot, on the emitting
//! thread, before `emit` returns. Change streams are built on it: a batch
//! published by a data source reaches every view slot inside the
//! notification cycle that produced it.
//!
//! Slots run in connection order until a connection is removed; a freed
//! connection slot is reused by the next `connect`. Emission works on a copy
//! of the slot list, so a slot may connect or disconnect (itself included)
//! mid-emission. Such changes apply from the next emission.
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! use horizon_fetch_core::Signal;
//!
//! let rows_inserted = Signal::<Vec<usize>>::new();
//! let total = Arc::new(AtomicUsize::new(0));
//!
//! let counter = total.clone();
//! let id = rows_inserted.connect(move |rows| {
//!     counter.fetch_add(rows.len(), Ordering::SeqCst);
//! });
//!
//! rows_inserted.emit(vec![0, 1, 2]);
//! assert!(rows_inserted.disconnect(id));
//! rows_inserted.emit(vec![3]);
//!
//! assert_eq!(total.load(Ordering::SeqCst), 3);
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

use crate::error::SignalError;
use crate::logging::targets;

new_key_type! {
    /// Handle for one slot connected to a [`Signal`].
    pub struct ConnectionId;
}

type Slot<Args> = Arc<dyn Fn(&Args) + Send + Sync>;

/// A list of slots invoked with `&Args` on every emission.
pub struct Signal<Args> {
    slots: Mutex<SlotMap<ConnectionId, Slot<Args>>>,
}

impl<Args: 'static> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args: 'static> Signal<Args> {
    /// Creates a signal without slots.
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(SlotMap::with_key()),
        }
    }

    /// Connects `slot`, returning the handle that disconnects it.
    pub fn connect<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        let id = self.slots.lock().insert(Arc::new(slot));
        tracing::trace!(target: targets::SIGNAL, ?id, "slot connected");
        id
    }

    /// Removes the slot behind `id`. Returns `false` if it was already gone.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.slots.lock().remove(id).is_some()
    }

    /// Like [`disconnect`](Self::disconnect), but reports a stale handle.
    pub fn try_disconnect(&self, id: ConnectionId) -> Result<(), SignalError> {
        self.slots
            .lock()
            .remove(id)
            .map(drop)
            .ok_or(SignalError::InvalidConnection)
    }

    /// Removes every slot.
    pub fn disconnect_all(&self) {
        self.slots.lock().clear();
    }

    /// Returns the number of connected slots.
    pub fn connection_count(&self) -> usize {
        self.slots.lock().len()
    }

    /// Calls every connected slot with `args`.
    #[tracing::instrument(skip_all, target = "horizon_fetch_core::signal", level = "trace")]
    pub fn emit(&self, args: Args) {
        let slots: Vec<Slot<Args>> = self.slots.lock().values().cloned().collect();
        tracing::trace!(target: targets::SIGNAL, slots = slots.len(), "emit");
        for slot in &slots {
            slot(&args);
        }
    }
}

static_assertions::assert_impl_all!(Signal<()>: Send, Sync);
