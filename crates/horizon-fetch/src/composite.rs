//! Section-wise concatenation of data sources.
//!
//! A [`CompositeDataSource`] presents its children one after another: the
//! sections of the first child come first, then those of the second, and so
//! on. Global section indices are mapped to a child and a local section on
//! every access, so children may grow or shrink independently.

use std::sync::{Arc, Weak};

use horizon_fetch_core::ConnectionId;
use horizon_fetch_core::logging::targets;

use crate::change::{ChangeBatch, ChangeEvent, IndexPath};
use crate::source::{LeafRef, SectionedDataSource, SupplementaryKind};
use crate::stream::ChangeStream;

/// A shared child data source.
pub type SharedSource<T> = Arc<dyn SectionedDataSource<Item = T>>;

struct Child<T> {
    source: SharedSource<T>,
    connection: ConnectionId,
}

/// A data source made of child sources laid end to end.
///
/// Children are append-only. Each child's batches are republished on the
/// composite's own stream with their section indices shifted past the
/// sections of the children before it.
pub struct CompositeDataSource<T> {
    children: Vec<Child<T>>,
    changes: Arc<ChangeStream>,
}

impl<T: 'static> Default for CompositeDataSource<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> CompositeDataSource<T> {
    /// Creates an empty composite.
    pub fn new() -> Self {
        Self {
            children: Vec::new(),
            changes: Arc::new(ChangeStream::new()),
        }
    }

    /// Appends `child`.
    ///
    /// The child's current sections are announced as inserted, and its later
    /// batches are forwarded with offset section indices.
    pub fn push(&mut self, child: SharedSource<T>) {
        let preceding: Vec<SharedSource<T>> = self
            .children
            .iter()
            .map(|existing| existing.source.clone())
            .collect();
        let stream: Weak<ChangeStream> = Arc::downgrade(&self.changes);
        let connection = child.changes().on_batch().connect(move |batch: &ChangeBatch| {
            let Some(stream) = stream.upgrade() else {
                return;
            };
            let offset: usize = preceding.iter().map(|source| source.section_count()).sum();
            tracing::trace!(target: targets::COMPOSITE, offset, events = batch.len(), "forwarding child batch");
            stream.publish(batch.offset_sections(offset));
        });

        let offset = self.section_count();
        let inserted: ChangeBatch = (offset..offset + child.section_count())
            .map(ChangeEvent::SectionInserted)
            .collect();
        tracing::debug!(
            target: targets::COMPOSITE,
            child = self.children.len(),
            sections = inserted.len(),
            "child appended"
        );

        self.children.push(Child {
            source: child,
            connection,
        });
        if !inserted.is_empty() {
            self.changes.publish(inserted);
        }
    }

    /// Returns the number of children.
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Returns the child at `index`, if any.
    pub fn child(&self, index: usize) -> Option<&SharedSource<T>> {
        self.children.get(index).map(|child| &child.source)
    }

    /// Maps a global section to the owning child and its local section.
    ///
    /// # Panics
    ///
    /// Panics if `section` is past the last section of the last child.
    fn locate(&self, section: usize) -> (&SharedSource<T>, usize) {
        let mut local = section;
        for child in &self.children {
            let count = child.source.section_count();
            if local < count {
                return (&child.source, local);
            }
            local -= count;
        }
        panic!(
            "section index {section} out of range (section count {})",
            self.section_count()
        );
    }
}

impl<T: 'static> SectionedDataSource for CompositeDataSource<T> {
    type Item = T;

    fn section_count(&self) -> usize {
        self.children
            .iter()
            .map(|child| child.source.section_count())
            .sum()
    }

    fn item_count(&self, section: usize) -> usize {
        let (source, local) = self.locate(section);
        source.item_count(local)
    }

    fn item_at(&self, path: IndexPath) -> T {
        let (source, local) = self.locate(path.section());
        source.item_at(path.with_section(local))
    }

    fn supplementary(&self, kind: &SupplementaryKind, section: usize) -> Option<String> {
        let (source, local) = self.locate(section);
        source.supplementary(kind, local)
    }

    fn changes(&self) -> &ChangeStream {
        &self.changes
    }

    fn resolve_leaf(&self, path: IndexPath) -> LeafRef<'_, T> {
        let (source, local) = self.locate(path.section());
        source.resolve_leaf(path.with_section(local))
    }
}

impl<T> Drop for CompositeDataSource<T> {
    fn drop(&mut self) {
        for (index, child) in self.children.iter().enumerate() {
            // A completed child has already dropped its slots.
            if let Err(err) = child.source.changes().on_batch().try_disconnect(child.connection) {
                tracing::trace!(target: targets::COMPOSITE, child = index, %err, "child already disconnected");
            }
        }
        self.changes.complete();
    }
}
