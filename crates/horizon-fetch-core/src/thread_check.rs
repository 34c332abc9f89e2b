//! Owner-thread checks.
//!
//! A live result set delivers every notification cycle on one logical
//! thread, and its snapshot is only coherent for readers on that thread.
//! [`ThreadAffinity`] remembers the owner thread of a component so that
//! entry points can verify they are being called from it.

use std::thread::ThreadId;

use crate::logging::targets;

/// The thread that owns a component, and whether that ownership is checked.
///
/// ```
/// use horizon_fetch_core::ThreadAffinity;
///
/// let owner = ThreadAffinity::current();
/// owner.check("snapshot read");
///
/// let unchecked = ThreadAffinity::disabled();
/// std::thread::spawn(move || unchecked.check("never fires"))
///     .join()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadAffinity {
    owner: ThreadId,
    enabled: bool,
}

impl Default for ThreadAffinity {
    fn default() -> Self {
        Self::current()
    }
}

impl ThreadAffinity {
    /// Binds to the calling thread with checks enabled.
    pub fn current() -> Self {
        Self {
            owner: std::thread::current().id(),
            enabled: true,
        }
    }

    /// Binds to the calling thread with checks turned off.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::current()
        }
    }

    /// Returns the owner thread.
    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    /// Returns `true` if [`check`](Self::check) can fail.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns `true` when called from the owner thread.
    pub fn on_owner_thread(&self) -> bool {
        std::thread::current().id() == self.owner
    }

    /// Verifies the caller is on the owner thread. `context` names the
    /// operation for the failure message.
    ///
    /// # Panics
    ///
    /// Panics if checks are enabled and the caller is on another thread.
    #[inline]
    pub fn check(&self, context: &str) {
        if self.enabled && !self.on_owner_thread() {
            self.violation(context);
        }
    }

    /// [`check`](Self::check) in debug builds, nothing in release builds.
    #[inline]
    pub fn debug_check(&self, context: &str) {
        #[cfg(debug_assertions)]
        self.check(context);
        #[cfg(not(debug_assertions))]
        let _ = context;
    }

    #[cold]
    #[inline(never)]
    fn violation(&self, context: &str) -> ! {
        let caller = std::thread::current();
        tracing::error!(
            target: targets::THREAD,
            owner = ?self.owner,
            caller = ?caller.id(),
            context,
            "owner thread check failed"
        );
        panic!(
            "THREAD AFFINITY VIOLATION: {context} called on thread \"{}\" ({:?}), owner is {:?}",
            caller.name().unwrap_or("<unnamed>"),
            caller.id(),
            self.owner
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_owner_thread_passes() {
        let affinity = ThreadAffinity::default();
        assert!(affinity.is_enabled());
        assert!(affinity.on_owner_thread());
        assert_eq!(affinity.owner(), thread::current().id());
        affinity.check("read");
        affinity.debug_check("read");
    }

    #[test]
    fn test_other_thread_is_detected() {
        let affinity = ThreadAffinity::current();
        let on_owner = thread::spawn(move || affinity.on_owner_thread())
            .join()
            .unwrap();
        assert!(!on_owner);
    }

    #[test]
    fn test_check_panics_off_thread() {
        let affinity = ThreadAffinity::current();
        let outcome = thread::Builder::new()
            .name("intruder".into())
            .spawn(move || affinity.check("item_count"))
            .unwrap()
            .join();

        let payload = outcome.unwrap_err();
        let message = payload
            .downcast_ref::<String>()
            .cloned()
            .unwrap_or_default();
        assert!(message.starts_with("THREAD AFFINITY VIOLATION: item_count"));
        assert!(message.contains("intruder"));
    }

    #[test]
    fn test_disabled_never_panics() {
        let affinity = ThreadAffinity::disabled();
        assert!(!affinity.is_enabled());
        thread::spawn(move || affinity.check("end_cycle"))
            .join()
            .unwrap();
    }
}
