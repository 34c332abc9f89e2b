//! Horizon Fetch - live result sets as sectioned data sources.
//!
//! A live query (a [`FetchedResults`] collaborator) reports its changes as
//! fine-grained notifications grouped into update cycles. Horizon Fetch
//! turns each cycle into one ordered [`ChangeBatch`] and exposes the results
//! to views through the [`SectionedDataSource`] read contract.
//!
//! # Example
//!
//! ```
//! use horizon_fetch::{
//!     ChangeEvent, IndexPath, MemoryResults, ResultSetDataSource, Section, SectionedDataSource,
//! };
//!
//! let results = MemoryResults::from_sections(vec![
//!     Section::named("Today", vec!["standup", "review"]),
//!     Section::named("Tomorrow", vec!["planning"]),
//! ]);
//! let source = ResultSetDataSource::new(results).unwrap();
//! let subscription = source.changes().subscribe();
//!
//! source.results().update(|tx| {
//!     tx.delete_section(1);
//!     tx.update_item(IndexPath::new(0, 1), "code review");
//! });
//!
//! let batch = subscription.try_recv().unwrap();
//! assert_eq!(
//!     batch.events(),
//!     &[
//!         ChangeEvent::SectionDeleted(1),
//!         ChangeEvent::ItemReloaded(IndexPath::new(0, 1)),
//!     ]
//! );
//! assert_eq!(source.section_count(), 1);
//!
//! drop(source);
//! assert!(subscription.is_completed());
//! ```

pub mod change;
pub mod collector;
pub mod composite;
pub mod config;
mod error;
pub mod memory;
pub mod results;
pub mod source;
pub mod stream;

pub use change::{BatchCounts, ChangeBatch, ChangeEvent, ChangeKind, IndexPath, RawChangeKind};
pub use collector::NotificationCollector;
pub use composite::{CompositeDataSource, SharedSource};
pub use config::DataSourceConfig;
pub use error::{ConfigError, Error, FetchError, NotificationError, Result};
pub use memory::{MemoryResults, MemoryStore, MemoryTransaction, Record};
pub use results::{FetchRequest, FetchedResults, ResultStore, ResultsListener, Section, Snapshot};
pub use source::{LeafRef, ResultSetDataSource, SectionedDataSource, SupplementaryKind};
pub use stream::{ChangeStream, ChangeSubscription};

pub use horizon_fetch_core::logging;
