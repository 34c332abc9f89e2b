//! An in-memory result store.
//!
//! [`MemoryStore`] and [`MemoryResults`] implement the collaborator traits
//! without any persistence. They back the crate's own tests and are handy
//! for prototyping views before a real store exists.
//!
//! ```
//! use horizon_fetch::{
//!     DataSourceConfig, FetchRequest, MemoryStore, Record, ResultSetDataSource,
//!     SectionedDataSource,
//! };
//!
//! #[derive(Clone)]
//! struct Contact {
//!     name: &'static str,
//! }
//!
//! impl Record for Contact {
//!     fn group_value(&self, key: &str) -> Option<String> {
//!         match key {
//!             "initial" => self.name.chars().next().map(String::from),
//!             _ => None,
//!         }
//!     }
//! }
//!
//! let store = MemoryStore::new();
//! store.insert_entity("Contact", [
//!     Contact { name: "Ada" },
//!     Contact { name: "Brian" },
//!     Contact { name: "Alan" },
//! ]);
//!
//! let request = FetchRequest::new("Contact").with_grouping_key("initial");
//! let source = ResultSetDataSource::initialize(&store, &request, DataSourceConfig::default())
//!     .unwrap();
//!
//! assert_eq!(source.section_count(), 2);
//! assert_eq!(source.section_header(0).as_deref(), Some("A"));
//! assert_eq!(source.item_count(0), 2);
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use horizon_fetch_core::logging::targets;
use parking_lot::{Mutex, RwLock};

use crate::change::{ChangeKind, IndexPath, RawChangeKind};
use crate::error::FetchError;
use crate::results::{FetchRequest, FetchedResults, ResultStore, ResultsListener, Section, Snapshot};

/// A record a [`MemoryStore`] can group into sections.
pub trait Record: Clone + Send + Sync + 'static {
    /// Returns the value of `key` used as a section name, or `None` if the
    /// record has no such key.
    fn group_value(&self, key: &str) -> Option<String>;
}

/// An in-memory store of named entities.
pub struct MemoryStore<T> {
    entities: RwLock<HashMap<String, Vec<T>>>,
    caches: Mutex<HashMap<String, FetchRequest>>,
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self {
            entities: RwLock::new(HashMap::new()),
            caches: Mutex::new(HashMap::new()),
        }
    }
}

impl<T: Record> MemoryStore<T> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `records` under `entity`, replacing any previous records.
    pub fn insert_entity(&self, entity: impl Into<String>, records: impl IntoIterator<Item = T>) {
        let entity = entity.into();
        let records: Vec<T> = records.into_iter().collect();
        tracing::trace!(target: targets::MEMORY, %entity, records = records.len(), "entity stored");
        self.entities.write().insert(entity, records);
    }

    fn bind_cache(&self, request: &FetchRequest) -> Result<(), FetchError> {
        let Some(cache_name) = request.cache_name() else {
            return Ok(());
        };
        let mut caches = self.caches.lock();
        match caches.get(cache_name) {
            Some(bound) if bound != request => Err(FetchError::cache_conflict(cache_name)),
            Some(_) => Ok(()),
            None => {
                caches.insert(cache_name.to_owned(), request.clone());
                Ok(())
            }
        }
    }
}

impl<T: Record> ResultStore for MemoryStore<T> {
    type Results = MemoryResults<T>;

    fn open(&self, request: &FetchRequest) -> Result<MemoryResults<T>, FetchError> {
        let sections = {
            let entities = self.entities.read();
            let records = entities
                .get(request.entity())
                .ok_or_else(|| FetchError::unknown_entity(request.entity()))?;
            match request.grouping_key() {
                Some(key) => group_by(records, key),
                None => Ok(vec![Section::unnamed(records.clone())]),
            }
        };
        self.bind_cache(request)?;

        Ok(MemoryResults {
            pending: Mutex::new(Some(sections)),
            ..MemoryResults::default()
        })
    }
}

/// Groups records by `key`, keeping sections in order of first appearance.
fn group_by<T: Record>(records: &[T], key: &str) -> Result<Vec<Section<T>>, FetchError> {
    let mut sections: Vec<Section<T>> = Vec::new();
    for record in records {
        let value = record
            .group_value(key)
            .ok_or_else(|| FetchError::invalid_grouping_key(key))?;
        match sections.iter_mut().find(|section| section.name() == Some(value.as_str())) {
            Some(section) => section.objects.push(record.clone()),
            None => sections.push(Section::named(value, vec![record.clone()])),
        }
    }
    Ok(sections)
}

/// A live, in-memory result set.
///
/// Contents change only through [`update`](Self::update), which runs one
/// notification cycle.
pub struct MemoryResults<T> {
    snapshot: RwLock<Option<Arc<Snapshot<T>>>>,
    pending: Mutex<Option<Result<Vec<Section<T>>, FetchError>>>,
    listener: RwLock<Option<Arc<dyn ResultsListener>>>,
}

impl<T> std::fmt::Debug for MemoryResults<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryResults").finish_non_exhaustive()
    }
}

impl<T> Default for MemoryResults<T> {
    fn default() -> Self {
        Self {
            snapshot: RwLock::new(None),
            pending: Mutex::new(None),
            listener: RwLock::new(None),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> MemoryResults<T> {
    /// Creates results that materialize `sections` on the first fetch.
    pub fn from_sections(sections: Vec<Section<T>>) -> Self {
        Self {
            pending: Mutex::new(Some(Ok(sections))),
            ..Self::default()
        }
    }

    /// Creates results whose every fetch fails with `error`.
    pub fn failing(error: FetchError) -> Self {
        Self {
            pending: Mutex::new(Some(Err(error))),
            ..Self::default()
        }
    }

    /// Returns `true` if a listener is registered.
    pub fn has_listener(&self) -> bool {
        self.listener.read().is_some()
    }

    /// Runs one update cycle.
    ///
    /// `f` mutates a working copy of the current contents through a
    /// [`MemoryTransaction`]. The result is committed as the new snapshot,
    /// then the listener (if any) receives the cycle's notifications.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut MemoryTransaction<T>),
    {
        let base = self.snapshot.read().as_deref().cloned().unwrap_or_default();
        let mut tx = MemoryTransaction::begin(base.into_sections());
        f(&mut tx);

        let (sections, notifications) = tx.finish();
        *self.snapshot.write() = Some(Arc::new(Snapshot::new(sections)));

        let listener = self.listener.read().clone();
        let Some(listener) = listener else {
            tracing::trace!(
                target: targets::MEMORY,
                notifications = notifications.len(),
                "update committed without a listener"
            );
            return;
        };

        listener.will_change_content();
        for notification in notifications {
            match notification {
                Notification::Section { index, kind } => listener.did_change_section(index, kind),
                Notification::Object { old, new, kind } => {
                    listener.did_change_object(old, new, kind)
                }
            }
        }
        listener.did_change_content();
    }
}

impl<T: Clone + Send + Sync + 'static> FetchedResults for MemoryResults<T> {
    type Item = T;

    fn perform_fetch(&self) -> Result<(), FetchError> {
        let mut pending = self.pending.lock();
        match pending.take() {
            Some(Ok(sections)) => {
                tracing::trace!(target: targets::MEMORY, sections = sections.len(), "results materialized");
                *self.snapshot.write() = Some(Arc::new(Snapshot::new(sections)));
                Ok(())
            }
            Some(Err(err)) => {
                *pending = Some(Err(err.clone()));
                Err(err)
            }
            None => Ok(()),
        }
    }

    fn snapshot(&self) -> Option<Arc<Snapshot<T>>> {
        self.snapshot.read().clone()
    }

    fn set_listener(&self, listener: Option<Arc<dyn ResultsListener>>) {
        *self.listener.write() = listener;
    }
}

#[derive(Debug, Clone, Copy)]
enum Notification {
    Section {
        index: usize,
        kind: RawChangeKind,
    },
    Object {
        old: Option<IndexPath>,
        new: Option<IndexPath>,
        kind: RawChangeKind,
    },
}

/// A row of the working copy, tagged with where it sat before the cycle.
struct Row<T> {
    value: T,
    origin: Option<IndexPath>,
    updated: bool,
    moved: bool,
}

struct WorkingSection<T> {
    origin: Option<usize>,
    name: Option<String>,
    rows: Vec<Row<T>>,
}

/// Mutations applied during one [`MemoryResults::update`] cycle.
///
/// Arguments refer to the working copy as it stands when the call is made,
/// so later calls see the effect of earlier ones. The notifications are
/// derived once the closure returns, by comparing each row's position before
/// the cycle with its position after it:
///
/// - deletions, reloads and move sources carry paths in the snapshot before
///   the cycle;
/// - insertions and move destinations carry paths in the snapshot after it.
///
/// A row inserted and deleted in the same cycle produces nothing. A row
/// inserted and then updated or moved is reported as one insertion. A row
/// that is both updated and moved is reported as a move. Rows inside an
/// inserted or deleted section are covered by the section notification.
///
/// # Panics
///
/// Mutating methods panic on out-of-range indices.
pub struct MemoryTransaction<T> {
    base_counts: Vec<usize>,
    sections: Vec<WorkingSection<T>>,
    raw: Vec<Notification>,
}

impl<T> MemoryTransaction<T> {
    fn begin(base: Vec<Section<T>>) -> Self {
        let base_counts = base.iter().map(Section::len).collect();
        let sections = base
            .into_iter()
            .enumerate()
            .map(|(s, section)| WorkingSection {
                origin: Some(s),
                name: section.name,
                rows: section
                    .objects
                    .into_iter()
                    .enumerate()
                    .map(|(i, value)| Row {
                        value,
                        origin: Some(IndexPath::new(s, i)),
                        updated: false,
                        moved: false,
                    })
                    .collect(),
            })
            .collect();
        Self {
            base_counts,
            sections,
            raw: Vec::new(),
        }
    }

    /// Returns the number of sections in the working copy.
    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// Inserts `section` at `index`.
    pub fn insert_section(&mut self, index: usize, section: Section<T>) {
        assert!(
            index <= self.sections.len(),
            "section insert index {index} out of range (section count {})",
            self.sections.len()
        );
        let rows = section.objects.into_iter().map(Row::inserted).collect();
        self.sections.insert(
            index,
            WorkingSection {
                origin: None,
                name: section.name,
                rows,
            },
        );
    }

    /// Removes the section at `index` along with its items.
    pub fn delete_section(&mut self, index: usize) {
        let _ = self.section_mut(index);
        self.sections.remove(index);
    }

    /// Inserts `item` at `path`.
    pub fn insert_item(&mut self, path: IndexPath, item: T) {
        let rows = &mut self.section_mut(path.section()).rows;
        assert!(
            path.item() <= rows.len(),
            "item insert index {} out of range in section {} (item count {})",
            path.item(),
            path.section(),
            rows.len()
        );
        rows.insert(path.item(), Row::inserted(item));
    }

    /// Removes the item at `path`.
    pub fn delete_item(&mut self, path: IndexPath) {
        let _ = self.row_mut(path);
        self.section_mut(path.section()).rows.remove(path.item());
    }

    /// Replaces the item at `path`.
    pub fn update_item(&mut self, path: IndexPath, item: T) {
        let row = self.row_mut(path);
        row.value = item;
        row.updated = true;
    }

    /// Moves the item at `from` so that it ends up at `to`.
    ///
    /// `to` is interpreted after the item has been removed from `from`.
    pub fn move_item(&mut self, from: IndexPath, to: IndexPath) {
        let _ = self.row_mut(from);
        let mut row = self.section_mut(from.section()).rows.remove(from.item());
        row.moved = true;
        let rows = &mut self.section_mut(to.section()).rows;
        assert!(
            to.item() <= rows.len(),
            "item move target {to} out of range (item count {})",
            rows.len()
        );
        rows.insert(to.item(), row);
    }

    /// Records an item notification without touching the working copy.
    ///
    /// Lets tests deliver tags and path combinations the typed methods
    /// never produce. Raw notifications follow the derived ones, in the
    /// order they were recorded.
    pub fn raw_object_change(
        &mut self,
        old: Option<IndexPath>,
        new: Option<IndexPath>,
        kind: RawChangeKind,
    ) {
        self.raw.push(Notification::Object { old, new, kind });
    }

    /// Records a section notification without touching the working copy.
    pub fn raw_section_change(&mut self, index: usize, kind: RawChangeKind) {
        self.raw.push(Notification::Section { index, kind });
    }

    /// Splits the working copy into the committed sections and the cycle's
    /// notifications.
    ///
    /// Notifications come out grouped: section deletions, section
    /// insertions, item deletions, item insertions, moves, then reloads.
    fn finish(self) -> (Vec<Section<T>>, Vec<Notification>) {
        let Self {
            base_counts,
            sections,
            raw,
        } = self;

        let mut survivors = vec![false; base_counts.len()];
        let mut kept = HashSet::new();
        for section in &sections {
            if let Some(s) = section.origin {
                survivors[s] = true;
            }
            kept.extend(section.rows.iter().filter_map(|row| row.origin));
        }

        let object = |old, new, kind: ChangeKind| Notification::Object {
            old,
            new,
            kind: kind.into(),
        };
        let mut section_deletes = Vec::new();
        let mut item_deletes = Vec::new();
        for (s, &count) in base_counts.iter().enumerate() {
            if !survivors[s] {
                section_deletes.push(Notification::Section {
                    index: s,
                    kind: ChangeKind::Deleted.into(),
                });
                continue;
            }
            item_deletes.extend(
                (0..count)
                    .map(|i| IndexPath::new(s, i))
                    .filter(|path| !kept.contains(path))
                    .map(|path| object(Some(path), None, ChangeKind::Deleted)),
            );
        }

        let mut section_inserts = Vec::new();
        let mut item_inserts = Vec::new();
        let mut moves = Vec::new();
        let mut reloads = Vec::new();
        for (s, section) in sections.iter().enumerate() {
            let new_section = section.origin.is_none();
            if new_section {
                section_inserts.push(Notification::Section {
                    index: s,
                    kind: ChangeKind::Inserted.into(),
                });
            }
            for (i, row) in section.rows.iter().enumerate() {
                let to = IndexPath::new(s, i);
                match row.origin {
                    Some(from) if survivors[from.section()] => {
                        if row.moved {
                            moves.push(object(Some(from), Some(to), ChangeKind::Moved));
                        } else if row.updated {
                            reloads.push(object(Some(from), None, ChangeKind::Updated));
                        }
                    }
                    // New rows, and rows rescued from a deleted section.
                    _ if !new_section => {
                        item_inserts.push(object(None, Some(to), ChangeKind::Inserted));
                    }
                    _ => {}
                }
            }
        }

        let committed = sections
            .into_iter()
            .map(|section| Section {
                name: section.name,
                objects: section.rows.into_iter().map(|row| row.value).collect(),
            })
            .collect();
        let notifications = section_deletes
            .into_iter()
            .chain(section_inserts)
            .chain(item_deletes)
            .chain(item_inserts)
            .chain(moves)
            .chain(reloads)
            .chain(raw)
            .collect();
        (committed, notifications)
    }

    fn section_mut(&mut self, index: usize) -> &mut WorkingSection<T> {
        let count = self.sections.len();
        match self.sections.get_mut(index) {
            Some(section) => section,
            None => panic!("section index {index} out of range (section count {count})"),
        }
    }

    fn row_mut(&mut self, path: IndexPath) -> &mut Row<T> {
        let section = self.section_mut(path.section());
        let count = section.rows.len();
        match section.rows.get_mut(path.item()) {
            Some(row) => row,
            None => panic!(
                "item index {} out of range in section {} (item count {count})",
                path.item(),
                path.section()
            ),
        }
    }
}

impl<T> Row<T> {
    fn inserted(value: T) -> Self {
        Self {
            value,
            origin: None,
            updated: false,
            moved: false,
        }
    }
}

static_assertions::assert_impl_all!(MemoryResults<String>: Send, Sync);
