//! Core systems for Horizon Fetch.
//!
//! This crate provides the infrastructure shared by the Horizon Fetch data
//! sources:
//!
//! - **Signal/Slot System**: Type-safe synchronous notification
//! - **Thread Affinity**: Verification that single-threaded components stay
//!   on the thread that created them
//! - **Logging**: `tracing` targets for every subsystem
//!
//! # Example
//!
//! ```
//! use horizon_fetch_core::{Signal, ThreadAffinity};
//!
//! let cycle_finished = Signal::<u64>::new();
//! let owner = ThreadAffinity::current();
//!
//! let id = cycle_finished.connect(move |cycle| {
//!     owner.check("cycle_finished");
//!     assert!(*cycle > 0);
//! });
//!
//! cycle_finished.emit(1);
//! cycle_finished.disconnect(id);
//! ```

mod error;
pub mod logging;
pub mod signal;
pub mod thread_check;

pub use error::{Result, SignalError};
pub use signal::{ConnectionId, Signal};
pub use thread_check::ThreadAffinity;
