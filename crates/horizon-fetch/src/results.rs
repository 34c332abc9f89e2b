//! The collaborator interface: a live, persistent query.
//!
//! Horizon Fetch does not execute queries. It drives a collaborator that
//! does, through three small traits:
//!
//! - [`ResultStore`] opens a live result set for a [`FetchRequest`]
//! - [`FetchedResults`] materializes it and keeps it current
//! - [`ResultsListener`] receives the collaborator's raw notifications
//!
//! # Notification Protocol
//!
//! For every update cycle the collaborator calls its single registered
//! listener in this order, on one thread:
//!
//! ```text
//! will_change_content()
//!     did_change_section(..) / did_change_object(..)   zero or more, any mix
//! did_change_content()
//! ```
//!
//! Cycles never interleave. The snapshot returned by
//! [`FetchedResults::snapshot`] already reflects the new state by the time
//! `did_change_content` is called.

use std::sync::Arc;

use crate::change::{IndexPath, RawChangeKind};
use crate::error::FetchError;

/// One group of results, with an optional display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section<T> {
    pub(crate) name: Option<String>,
    pub(crate) objects: Vec<T>,
}

impl<T> Section<T> {
    /// Creates a section.
    pub fn new(name: Option<String>, objects: Vec<T>) -> Self {
        Self { name, objects }
    }

    /// Creates an unnamed section.
    pub fn unnamed(objects: Vec<T>) -> Self {
        Self::new(None, objects)
    }

    /// Creates a named section.
    pub fn named(name: impl Into<String>, objects: Vec<T>) -> Self {
        Self::new(Some(name.into()), objects)
    }

    /// Returns the display name, if the results are grouped by a key.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the items in order.
    pub fn objects(&self) -> &[T] {
        &self.objects
    }

    /// Returns the number of items.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns `true` if the section holds no items.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// The collaborator's materialized result: ordered sections of ordered items.
///
/// Snapshots are immutable; the collaborator publishes a new one per cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot<T> {
    sections: Vec<Section<T>>,
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self {
            sections: Vec::new(),
        }
    }
}

impl<T> Snapshot<T> {
    /// Creates a snapshot from sections in order.
    pub fn new(sections: Vec<Section<T>>) -> Self {
        Self { sections }
    }

    /// Returns the sections in order.
    pub fn sections(&self) -> &[Section<T>] {
        &self.sections
    }

    /// Returns the number of sections.
    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// Consumes the snapshot, returning its sections.
    pub fn into_sections(self) -> Vec<Section<T>> {
        self.sections
    }

    /// Returns the section at `index`, or `None` if out of range.
    pub fn get(&self, index: usize) -> Option<&Section<T>> {
        self.sections.get(index)
    }

    /// Returns the section at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= section_count()`.
    pub fn section(&self, index: usize) -> &Section<T> {
        match self.sections.get(index) {
            Some(section) => section,
            None => panic!(
                "section index {index} out of range (section count {})",
                self.sections.len()
            ),
        }
    }

    /// Returns the item at `path`.
    ///
    /// # Panics
    ///
    /// Panics if either coordinate is out of range.
    pub fn object_at(&self, path: IndexPath) -> &T {
        let section = self.section(path.section());
        match section.objects.get(path.item()) {
            Some(object) => object,
            None => panic!(
                "item index {} out of range in section {} (item count {})",
                path.item(),
                path.section(),
                section.len()
            ),
        }
    }
}

/// Receives a collaborator's raw change notifications.
///
/// Kinds arrive as raw tags; see [`RawChangeKind`].
pub trait ResultsListener: Send + Sync {
    /// An update cycle is starting.
    fn will_change_content(&self);

    /// A section was inserted or deleted.
    fn did_change_section(&self, index: usize, kind: RawChangeKind);

    /// An item was inserted, deleted, moved or updated.
    fn did_change_object(
        &self,
        old_path: Option<IndexPath>,
        new_path: Option<IndexPath>,
        kind: RawChangeKind,
    );

    /// The update cycle is complete.
    fn did_change_content(&self);
}

/// A live query handle.
pub trait FetchedResults: Send + Sync + 'static {
    /// The opaque item handle the results hold.
    type Item: Clone + Send + Sync + 'static;

    /// Materializes the results synchronously.
    fn perform_fetch(&self) -> Result<(), FetchError>;

    /// Returns the current materialized results, or `None` before the first
    /// successful fetch.
    fn snapshot(&self) -> Option<Arc<Snapshot<Self::Item>>>;

    /// Registers the single listener, replacing any previous one. `None`
    /// halts delivery.
    fn set_listener(&self, listener: Option<Arc<dyn ResultsListener>>);
}

impl<R: FetchedResults> FetchedResults for Arc<R> {
    type Item = R::Item;

    fn perform_fetch(&self) -> Result<(), FetchError> {
        (**self).perform_fetch()
    }

    fn snapshot(&self) -> Option<Arc<Snapshot<Self::Item>>> {
        (**self).snapshot()
    }

    fn set_listener(&self, listener: Option<Arc<dyn ResultsListener>>) {
        (**self).set_listener(listener)
    }
}

/// Describes the query a [`ResultStore`] should open.
///
/// Predicates and sort order are the store's business; the request only
/// names what the data source layer needs to hand over.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchRequest {
    entity: String,
    grouping_key: Option<String>,
    cache_name: Option<String>,
}

impl FetchRequest {
    /// Creates a request for all records of `entity`, in one section.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            grouping_key: None,
            cache_name: None,
        }
    }

    /// Groups results into sections by the value of `key`.
    pub fn with_grouping_key(mut self, key: impl Into<String>) -> Self {
        self.grouping_key = Some(key.into());
        self
    }

    /// Names the cache the store may use for this request.
    pub fn with_cache_name(mut self, name: impl Into<String>) -> Self {
        self.cache_name = Some(name.into());
        self
    }

    /// Returns the entity name.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Returns the grouping key, if any.
    pub fn grouping_key(&self) -> Option<&str> {
        self.grouping_key.as_deref()
    }

    /// Returns the cache name, if any.
    pub fn cache_name(&self) -> Option<&str> {
        self.cache_name.as_deref()
    }
}

/// A persistent store that can open live result sets.
pub trait ResultStore {
    /// The live query handle this store produces.
    type Results: FetchedResults;

    /// Opens a live result set for `request`. The results are not fetched
    /// yet.
    fn open(&self, request: &FetchRequest) -> Result<Self::Results, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> Snapshot<&'static str> {
        Snapshot::new(vec![
            Section::named("A", vec!["apple", "avocado"]),
            Section::unnamed(vec!["banana"]),
        ])
    }

    #[test]
    fn test_snapshot_access() {
        let snapshot = snapshot();
        assert_eq!(snapshot.section_count(), 2);
        assert_eq!(snapshot.section(0).name(), Some("A"));
        assert_eq!(snapshot.section(1).name(), None);
        assert_eq!(snapshot.section(0).len(), 2);
        assert_eq!(*snapshot.object_at(IndexPath::new(0, 1)), "avocado");
        assert!(snapshot.get(2).is_none());
        assert!(Snapshot::<u8>::default().sections().is_empty());
    }

    #[test]
    #[should_panic(expected = "section index 2 out of range")]
    fn test_section_out_of_range() {
        snapshot().section(2);
    }

    #[test]
    #[should_panic(expected = "item index 1 out of range in section 1")]
    fn test_item_out_of_range() {
        snapshot().object_at(IndexPath::new(1, 1));
    }

    #[test]
    fn test_fetch_request_builder() {
        let request = FetchRequest::new("Contact")
            .with_grouping_key("initial")
            .with_cache_name("contacts");
        assert_eq!(request.entity(), "Contact");
        assert_eq!(request.grouping_key(), Some("initial"));
        assert_eq!(request.cache_name(), Some("contacts"));
        assert_eq!(FetchRequest::new("Contact").grouping_key(), None);
    }
}
