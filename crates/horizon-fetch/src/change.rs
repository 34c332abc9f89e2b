//! Change events and batches.
//!
//! A [`ChangeBatch`] describes everything that happened to a result set during
//! one update cycle, as an ordered list of [`ChangeEvent`]s.
//!
//! # Index Semantics
//!
//! Paths carried by events refer to two different snapshots:
//!
//! | Event | Path is valid in |
//! |-------|------------------|
//! | `SectionDeleted`, `ItemDeleted`, `ItemReloaded`, `ItemMoved::from` | snapshot *before* the batch |
//! | `SectionInserted`, `ItemInserted`, `ItemMoved::to` | snapshot *after* the batch |
//!
//! A consumer applying a batch to its previous copy of the data must honor
//! this split: remove and reload against the old indices, insert against the
//! new ones.

use std::fmt;

use crate::error::NotificationError;

/// A (section, item) coordinate into a result-set snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct IndexPath {
    section: usize,
    item: usize,
}

impl IndexPath {
    /// Creates a path to `item` within `section`.
    #[inline]
    pub const fn new(section: usize, item: usize) -> Self {
        Self { section, item }
    }

    /// Returns the section index.
    #[inline]
    pub const fn section(&self) -> usize {
        self.section
    }

    /// Returns the item index within the section.
    #[inline]
    pub const fn item(&self) -> usize {
        self.item
    }

    /// Returns the same item position in another section.
    #[inline]
    pub const fn with_section(self, section: usize) -> Self {
        Self { section, ..self }
    }
}

impl From<(usize, usize)> for IndexPath {
    fn from((section, item): (usize, usize)) -> Self {
        Self::new(section, item)
    }
}

impl fmt::Display for IndexPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.section, self.item)
    }
}

/// The kind of structural mutation a notification reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// A new element appeared.
    Inserted,
    /// An element was removed.
    Deleted,
    /// An element changed position.
    Moved,
    /// An element's content changed in place.
    Updated,
}

/// The change-type tag exactly as the collaborator delivers it.
///
/// Collaborators encode the kind as a small integer. Zero and any value not
/// listed below carry no meaning; [`RawChangeKind::kind`] maps them to `None`
/// and the collector drops such notifications without inferring intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RawChangeKind(pub u32);

impl RawChangeKind {
    /// Tag for an insertion.
    pub const INSERT: Self = Self(1);
    /// Tag for a deletion.
    pub const DELETE: Self = Self(2);
    /// Tag for a move.
    pub const MOVE: Self = Self(3);
    /// Tag for an in-place update.
    pub const UPDATE: Self = Self(4);

    /// Decodes the tag, returning `None` for zero and unrecognised values.
    pub const fn kind(self) -> Option<ChangeKind> {
        match self.0 {
            1 => Some(ChangeKind::Inserted),
            2 => Some(ChangeKind::Deleted),
            3 => Some(ChangeKind::Moved),
            4 => Some(ChangeKind::Updated),
            _ => None,
        }
    }

    /// Returns the raw tag value.
    #[inline]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl From<ChangeKind> for RawChangeKind {
    fn from(kind: ChangeKind) -> Self {
        match kind {
            ChangeKind::Inserted => Self::INSERT,
            ChangeKind::Deleted => Self::DELETE,
            ChangeKind::Moved => Self::MOVE,
            ChangeKind::Updated => Self::UPDATE,
        }
    }
}

/// One atomic structural mutation of a sectioned result set.
///
/// `ItemMoved` always has `from != to`; build moves through
/// [`ChangeEvent::moved`] or [`ChangeEvent::for_item`], which collapse a
/// round-trip move to no event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeEvent {
    /// A section was inserted at this index (post-batch).
    SectionInserted(usize),
    /// The section at this index (pre-batch) was deleted.
    SectionDeleted(usize),
    /// An item was inserted at this path (post-batch).
    ItemInserted(IndexPath),
    /// The item at this path (pre-batch) was deleted.
    ItemDeleted(IndexPath),
    /// The item at this path (pre-batch) changed in place.
    ItemReloaded(IndexPath),
    /// An item moved from a pre-batch path to a post-batch path.
    ///
    /// The fields are public, so nothing stops a caller from writing
    /// `from == to`. Such a value is not a valid event, and
    /// [`ChangeStream::publish`](crate::ChangeStream::publish) rejects it
    /// in debug builds.
    ItemMoved {
        /// Source path, pre-batch.
        from: IndexPath,
        /// Destination path, post-batch.
        to: IndexPath,
    },
}

impl ChangeEvent {
    /// Builds the event for a section-level notification.
    ///
    /// Only insertions and deletions are section mutations; `Moved` and
    /// `Updated` yield `None`.
    pub fn for_section(index: usize, kind: ChangeKind) -> Option<Self> {
        match kind {
            ChangeKind::Inserted => Some(Self::SectionInserted(index)),
            ChangeKind::Deleted => Some(Self::SectionDeleted(index)),
            ChangeKind::Moved | ChangeKind::Updated => None,
        }
    }

    /// Builds the event for an item-level notification.
    ///
    /// Each kind requires specific paths:
    ///
    /// - `Updated` and `Deleted` need `old`
    /// - `Inserted` needs `new`
    /// - `Moved` needs both, and yields `Ok(None)` when they are equal
    ///
    /// A missing required path is a contract violation by the collaborator
    /// and is reported as an error rather than guessed.
    pub fn for_item(
        old: Option<IndexPath>,
        new: Option<IndexPath>,
        kind: ChangeKind,
    ) -> Result<Option<Self>, NotificationError> {
        let old_path = || old.ok_or(NotificationError::MissingOldPath { kind });
        let new_path = || new.ok_or(NotificationError::MissingNewPath { kind });

        match kind {
            ChangeKind::Updated => Ok(Some(Self::ItemReloaded(old_path()?))),
            ChangeKind::Inserted => Ok(Some(Self::ItemInserted(new_path()?))),
            ChangeKind::Deleted => Ok(Some(Self::ItemDeleted(old_path()?))),
            ChangeKind::Moved => {
                let from = old_path()?;
                let to = new_path()?;
                Ok(Self::moved(from, to))
            }
        }
    }

    /// Builds a move event, or `None` when the item stays where it was.
    pub fn moved(from: IndexPath, to: IndexPath) -> Option<Self> {
        (from != to).then_some(Self::ItemMoved { from, to })
    }

    /// Returns `true` for section insertions and deletions.
    pub fn is_section_event(&self) -> bool {
        matches!(self, Self::SectionInserted(_) | Self::SectionDeleted(_))
    }

    /// Returns the section this event touches (the source section for moves).
    pub fn section(&self) -> usize {
        match *self {
            Self::SectionInserted(index) | Self::SectionDeleted(index) => index,
            Self::ItemInserted(path) | Self::ItemDeleted(path) | Self::ItemReloaded(path) => {
                path.section()
            }
            Self::ItemMoved { from, .. } => from.section(),
        }
    }

    /// Returns a copy of this event with every section index shifted by `by`.
    pub fn offset_sections(self, by: usize) -> Self {
        let shift = |path: IndexPath| path.with_section(path.section() + by);
        match self {
            Self::SectionInserted(index) => Self::SectionInserted(index + by),
            Self::SectionDeleted(index) => Self::SectionDeleted(index + by),
            Self::ItemInserted(path) => Self::ItemInserted(shift(path)),
            Self::ItemDeleted(path) => Self::ItemDeleted(shift(path)),
            Self::ItemReloaded(path) => Self::ItemReloaded(shift(path)),
            Self::ItemMoved { from, to } => Self::ItemMoved {
                from: shift(from),
                to: shift(to),
            },
        }
    }
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SectionInserted(index) => write!(f, "+section {index}"),
            Self::SectionDeleted(index) => write!(f, "-section {index}"),
            Self::ItemInserted(path) => write!(f, "+item {path}"),
            Self::ItemDeleted(path) => write!(f, "-item {path}"),
            Self::ItemReloaded(path) => write!(f, "~item {path}"),
            Self::ItemMoved { from, to } => write!(f, "item {from} -> {to}"),
        }
    }
}

/// Per-kind tallies of the events in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchCounts {
    pub sections_inserted: usize,
    pub sections_deleted: usize,
    pub items_inserted: usize,
    pub items_deleted: usize,
    pub items_reloaded: usize,
    pub items_moved: usize,
}

/// Everything that happened to a result set during one update cycle.
///
/// Events keep the order in which the collaborator reported them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChangeBatch {
    events: Vec<ChangeEvent>,
}

impl ChangeBatch {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a batch from events in order.
    pub fn from_events(events: Vec<ChangeEvent>) -> Self {
        Self { events }
    }

    /// Returns the number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns `true` if the cycle produced no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Returns the events in order.
    pub fn events(&self) -> &[ChangeEvent] {
        &self.events
    }

    /// Iterates over the events in order.
    pub fn iter(&self) -> std::slice::Iter<'_, ChangeEvent> {
        self.events.iter()
    }

    /// Consumes the batch, returning its events.
    pub fn into_events(self) -> Vec<ChangeEvent> {
        self.events
    }

    /// Returns `true` if any section was inserted or deleted.
    pub fn has_section_changes(&self) -> bool {
        self.events.iter().any(ChangeEvent::is_section_event)
    }

    /// Tallies the events by kind.
    pub fn counts(&self) -> BatchCounts {
        let mut counts = BatchCounts::default();
        for event in &self.events {
            match event {
                ChangeEvent::SectionInserted(_) => counts.sections_inserted += 1,
                ChangeEvent::SectionDeleted(_) => counts.sections_deleted += 1,
                ChangeEvent::ItemInserted(_) => counts.items_inserted += 1,
                ChangeEvent::ItemDeleted(_) => counts.items_deleted += 1,
                ChangeEvent::ItemReloaded(_) => counts.items_reloaded += 1,
                ChangeEvent::ItemMoved { .. } => counts.items_moved += 1,
            }
        }
        counts
    }

    /// Returns a copy with every section index shifted by `by`.
    ///
    /// Used when a source's sections sit after other sections in a larger,
    /// concatenated view.
    pub fn offset_sections(&self, by: usize) -> Self {
        if by == 0 {
            return self.clone();
        }
        self.events.iter().map(|event| event.offset_sections(by)).collect()
    }
}

impl FromIterator<ChangeEvent> for ChangeBatch {
    fn from_iter<I: IntoIterator<Item = ChangeEvent>>(iter: I) -> Self {
        Self {
            events: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ChangeBatch {
    type Item = ChangeEvent;
    type IntoIter = std::vec::IntoIter<ChangeEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

impl<'a> IntoIterator for &'a ChangeBatch {
    type Item = &'a ChangeEvent;
    type IntoIter = std::slice::Iter<'a, ChangeEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(section: usize, item: usize) -> IndexPath {
        IndexPath::new(section, item)
    }

    #[test]
    fn test_raw_kind_decoding() {
        assert_eq!(RawChangeKind::INSERT.kind(), Some(ChangeKind::Inserted));
        assert_eq!(RawChangeKind::DELETE.kind(), Some(ChangeKind::Deleted));
        assert_eq!(RawChangeKind::MOVE.kind(), Some(ChangeKind::Moved));
        assert_eq!(RawChangeKind::UPDATE.kind(), Some(ChangeKind::Updated));
        assert_eq!(RawChangeKind(0).kind(), None);
        assert_eq!(RawChangeKind(5).kind(), None);
        assert_eq!(RawChangeKind(u32::MAX).kind(), None);
        assert_eq!(RawChangeKind::from(ChangeKind::Moved), RawChangeKind::MOVE);
    }

    #[test]
    fn test_section_factory_rejects_moves_and_updates() {
        assert_eq!(
            ChangeEvent::for_section(2, ChangeKind::Inserted),
            Some(ChangeEvent::SectionInserted(2))
        );
        assert_eq!(
            ChangeEvent::for_section(0, ChangeKind::Deleted),
            Some(ChangeEvent::SectionDeleted(0))
        );
        assert_eq!(ChangeEvent::for_section(1, ChangeKind::Moved), None);
        assert_eq!(ChangeEvent::for_section(1, ChangeKind::Updated), None);
    }

    #[test]
    fn test_item_factory_uses_kind_specific_paths() {
        let old = Some(path(1, 2));
        let new = Some(path(3, 4));

        assert_eq!(
            ChangeEvent::for_item(old, new, ChangeKind::Updated),
            Ok(Some(ChangeEvent::ItemReloaded(path(1, 2))))
        );
        assert_eq!(
            ChangeEvent::for_item(old, new, ChangeKind::Inserted),
            Ok(Some(ChangeEvent::ItemInserted(path(3, 4))))
        );
        assert_eq!(
            ChangeEvent::for_item(old, new, ChangeKind::Deleted),
            Ok(Some(ChangeEvent::ItemDeleted(path(1, 2))))
        );
        assert_eq!(
            ChangeEvent::for_item(old, new, ChangeKind::Moved),
            Ok(Some(ChangeEvent::ItemMoved {
                from: path(1, 2),
                to: path(3, 4)
            }))
        );
    }

    #[test]
    fn test_item_factory_reports_missing_paths() {
        assert_eq!(
            ChangeEvent::for_item(None, Some(path(0, 0)), ChangeKind::Updated),
            Err(NotificationError::MissingOldPath {
                kind: ChangeKind::Updated
            })
        );
        assert_eq!(
            ChangeEvent::for_item(Some(path(0, 0)), None, ChangeKind::Inserted),
            Err(NotificationError::MissingNewPath {
                kind: ChangeKind::Inserted
            })
        );
        assert_eq!(
            ChangeEvent::for_item(Some(path(0, 0)), None, ChangeKind::Moved),
            Err(NotificationError::MissingNewPath {
                kind: ChangeKind::Moved
            })
        );
        assert_eq!(
            ChangeEvent::for_item(None, Some(path(0, 0)), ChangeKind::Moved),
            Err(NotificationError::MissingOldPath {
                kind: ChangeKind::Moved
            })
        );
    }

    #[test]
    fn test_round_trip_move_collapses() {
        assert_eq!(
            ChangeEvent::for_item(Some(path(0, 0)), Some(path(0, 0)), ChangeKind::Moved),
            Ok(None)
        );
        assert_eq!(ChangeEvent::moved(path(2, 5), path(2, 5)), None);
    }

    #[test]
    fn test_batch_counts_and_section_detection() {
        let batch = ChangeBatch::from_events(vec![
            ChangeEvent::SectionDeleted(1),
            ChangeEvent::ItemDeleted(path(1, 0)),
            ChangeEvent::ItemInserted(path(0, 3)),
            ChangeEvent::ItemReloaded(path(0, 1)),
        ]);

        let counts = batch.counts();
        assert_eq!(counts.sections_deleted, 1);
        assert_eq!(counts.items_deleted, 1);
        assert_eq!(counts.items_inserted, 1);
        assert_eq!(counts.items_reloaded, 1);
        assert_eq!(counts.items_moved, 0);
        assert!(batch.has_section_changes());

        let items_only: ChangeBatch = batch
            .iter()
            .copied()
            .filter(|event| !event.is_section_event())
            .collect();
        assert_eq!(items_only.len(), 3);
        assert!(!items_only.has_section_changes());
    }

    #[test]
    fn test_offset_sections() {
        let batch = ChangeBatch::from_events(vec![
            ChangeEvent::SectionInserted(0),
            ChangeEvent::ItemMoved {
                from: path(0, 1),
                to: path(1, 0),
            },
        ]);

        assert_eq!(
            batch.offset_sections(3).into_events(),
            vec![
                ChangeEvent::SectionInserted(3),
                ChangeEvent::ItemMoved {
                    from: path(3, 1),
                    to: path(4, 0)
                },
            ]
        );
        assert_eq!(batch.offset_sections(0), batch);
    }

    #[test]
    fn test_event_section_and_display() {
        let event = ChangeEvent::ItemMoved {
            from: path(2, 0),
            to: path(0, 1),
        };
        assert_eq!(event.section(), 2);
        assert_eq!(event.to_string(), "item (2, 0) -> (0, 1)");
        assert_eq!(ChangeEvent::SectionDeleted(4).to_string(), "-section 4");
        assert_eq!(IndexPath::from((1, 9)), path(1, 9));
    }
}
