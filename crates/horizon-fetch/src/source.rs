//! Sectioned data sources.
//!
//! [`SectionedDataSource`] is the read contract presentation layers consume:
//! sections, items, supplementary (header) content, a change stream, and
//! leaf resolution for composite sources. [`ResultSetDataSource`] implements
//! it on top of a live [`FetchedResults`] collaborator.
//!
//! # Example
//!
//! ```
//! use horizon_fetch::{
//!     ChangeEvent, IndexPath, MemoryResults, ResultSetDataSource, Section, SectionedDataSource,
//! };
//!
//! let results = MemoryResults::from_sections(vec![
//!     Section::named("Fruit", vec!["apple", "pear", "plum"]),
//!     Section::named("Nuts", vec!["almond", "pecan"]),
//! ]);
//! let source = ResultSetDataSource::new(results).unwrap();
//! let subscription = source.changes().subscribe();
//!
//! assert_eq!(source.section_count(), 2);
//! assert_eq!(source.item_count(0), 3);
//!
//! source.results().update(|tx| tx.insert_item(IndexPath::new(0, 3), "quince"));
//!
//! let batch = subscription.try_recv().unwrap();
//! assert_eq!(batch.events(), &[ChangeEvent::ItemInserted(IndexPath::new(0, 3))]);
//! ```

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use horizon_fetch_core::ThreadAffinity;
use horizon_fetch_core::logging::targets;

use crate::change::IndexPath;
use crate::collector::NotificationCollector;
use crate::config::DataSourceConfig;
use crate::error::FetchError;
use crate::results::{FetchRequest, FetchedResults, ResultStore, Snapshot};
use crate::stream::ChangeStream;

/// The kind of supplementary content a view asks for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SupplementaryKind {
    /// The header shown above a section.
    SectionHeader,
    /// The footer shown below a section.
    SectionFooter,
    /// Any other view-defined kind.
    Custom(String),
}

/// The terminal source that owns a path, and the path in its own coordinates.
pub struct LeafRef<'a, T> {
    /// The source holding the item.
    pub source: &'a dyn SectionedDataSource<Item = T>,
    /// The item's path within `source`.
    pub path: IndexPath,
}

impl<T> LeafRef<'_, T> {
    /// Returns `true` if the leaf is `other` (by identity).
    pub fn is_source(&self, other: &dyn SectionedDataSource<Item = T>) -> bool {
        std::ptr::addr_eq(self.source, other)
    }
}

impl<T> std::fmt::Debug for LeafRef<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeafRef")
            .field("source", &std::ptr::from_ref(self.source).cast::<()>())
            .field("path", &self.path)
            .finish()
    }
}

/// Read contract for sectioned, item-based data.
///
/// Index arguments must be in range; out-of-range access is a programmer
/// error and panics.
pub trait SectionedDataSource: Send + Sync {
    /// The item handle type.
    type Item;

    /// Returns the number of sections.
    fn section_count(&self) -> usize;

    /// Returns the number of items in `section`.
    fn item_count(&self, section: usize) -> usize;

    /// Returns the item at `path`.
    fn item_at(&self, path: IndexPath) -> Self::Item;

    /// Returns supplementary content of `kind` for `section`, if any.
    fn supplementary(&self, kind: &SupplementaryKind, section: usize) -> Option<String>;

    /// Returns the stream of change batches.
    fn changes(&self) -> &ChangeStream;

    /// Maps `path` to the terminal source that owns it.
    fn resolve_leaf(&self, path: IndexPath) -> LeafRef<'_, Self::Item>;

    /// Returns the header for `section`, if any.
    fn section_header(&self, section: usize) -> Option<String> {
        self.supplementary(&SupplementaryKind::SectionHeader, section)
    }
}

/// A data source backed by a live result set.
///
/// Construction registers a [`NotificationCollector`] with the collaborator
/// and performs the initial fetch. Afterwards every update cycle of the
/// collaborator becomes one batch on [`changes`](SectionedDataSource::changes),
/// while reads always go straight to the collaborator's latest snapshot.
///
/// Dropping the data source (or calling [`detach`](Self::detach)) first
/// unregisters the collector, then completes the change stream.
pub struct ResultSetDataSource<R: FetchedResults> {
    results: R,
    collector: Arc<NotificationCollector>,
    changes: Arc<ChangeStream>,
    config: DataSourceConfig,
    affinity: ThreadAffinity,
    detached: AtomicBool,
}

impl<R: FetchedResults> ResultSetDataSource<R> {
    /// Binds to `results` with the default configuration.
    pub fn new(results: R) -> Result<Self, FetchError> {
        Self::with_config(results, DataSourceConfig::default())
    }

    /// Binds to `results` and performs the initial fetch.
    ///
    /// On failure the collaborator is left without a listener and the error
    /// is returned; no data source is produced.
    pub fn with_config(results: R, config: DataSourceConfig) -> Result<Self, FetchError> {
        let span = tracing::debug_span!(target: targets::SOURCE, "fetch", source = %config.name);
        let _enter = span.enter();

        let changes = Arc::new(ChangeStream::new());
        let collector = Arc::new(NotificationCollector::new(changes.clone(), &config));
        results.set_listener(Some(collector.clone()));

        if let Err(err) = results.perform_fetch() {
            tracing::warn!(target: targets::SOURCE, source = %config.name, error = %err, "initial fetch failed");
            results.set_listener(None);
            collector.detach();
            changes.complete();
            return Err(err);
        }

        let affinity = if config.check_thread_affinity {
            ThreadAffinity::current()
        } else {
            ThreadAffinity::disabled()
        };
        let source = Self {
            results,
            collector,
            changes,
            config,
            affinity,
            detached: AtomicBool::new(false),
        };
        tracing::debug!(
            target: targets::SOURCE,
            source = %source.config.name,
            sections = source.section_count(),
            "result set fetched"
        );
        Ok(source)
    }

    /// Opens `request` on `store` and binds to the resulting live query.
    pub fn initialize<S>(
        store: &S,
        request: &FetchRequest,
        config: DataSourceConfig,
    ) -> Result<Self, FetchError>
    where
        S: ResultStore<Results = R>,
    {
        let results = store.open(request)?;
        Self::with_config(results, config)
    }

    /// Reads the configuration at `config_path`, then behaves like
    /// [`initialize`](Self::initialize).
    ///
    /// Fails with [`Error::Config`](crate::Error::Config) before the store
    /// is touched if the file is missing or malformed.
    pub fn initialize_from_config_file<S>(
        store: &S,
        request: &FetchRequest,
        config_path: impl AsRef<Path>,
    ) -> crate::Result<Self>
    where
        S: ResultStore<Results = R>,
    {
        let config = DataSourceConfig::load(config_path)?;
        Ok(Self::initialize(store, request, config)?)
    }

    /// Returns the collaborator.
    pub fn results(&self) -> &R {
        &self.results
    }

    /// Returns the collector registered with the collaborator.
    pub fn collector(&self) -> &Arc<NotificationCollector> {
        &self.collector
    }

    /// Returns the configuration.
    pub fn config(&self) -> &DataSourceConfig {
        &self.config
    }

    /// Returns the latest snapshot (empty before any results materialized).
    pub fn snapshot(&self) -> Arc<Snapshot<R::Item>> {
        self.affinity.debug_check("snapshot read");
        self.results.snapshot().unwrap_or_default()
    }

    /// Unregisters from the collaborator and completes the change stream.
    ///
    /// Idempotent. Reads keep working against the last snapshot.
    pub fn detach(&self) {
        if self.detached.swap(true, Ordering::SeqCst) {
            return;
        }
        self.results.set_listener(None);
        self.collector.detach();
        self.changes.complete();
        tracing::debug!(target: targets::SOURCE, source = %self.config.name, "data source detached");
    }

    /// Returns `true` once the data source has been detached.
    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::SeqCst)
    }
}

impl<R: FetchedResults> SectionedDataSource for ResultSetDataSource<R> {
    type Item = R::Item;

    fn section_count(&self) -> usize {
        self.affinity.debug_check("section_count");
        self.results
            .snapshot()
            .map_or(0, |snapshot| snapshot.section_count())
    }

    fn item_count(&self, section: usize) -> usize {
        self.snapshot().section(section).len()
    }

    fn item_at(&self, path: IndexPath) -> R::Item {
        self.snapshot().object_at(path).clone()
    }

    fn supplementary(&self, kind: &SupplementaryKind, section: usize) -> Option<String> {
        match kind {
            SupplementaryKind::SectionHeader => {
                self.snapshot().section(section).name().map(str::to_owned)
            }
            SupplementaryKind::SectionFooter | SupplementaryKind::Custom(_) => None,
        }
    }

    fn changes(&self) -> &ChangeStream {
        &self.changes
    }

    fn resolve_leaf(&self, path: IndexPath) -> LeafRef<'_, R::Item> {
        LeafRef { source: self, path }
    }
}

impl<R: FetchedResults> Drop for ResultSetDataSource<R> {
    fn drop(&mut self) {
        self.detach();
    }
}
