// Change Types
//
// The partition of sources and the other initial change sets the first
// invalidation round consumes.

use crate::invalidation::ApiChange;
use flint_core::names::{LibraryFile, ProductFile, SourceFile};
use std::collections::BTreeSet;

/// Current versus previous sources, partitioned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceChanges {
    pub added: BTreeSet<SourceFile>,
    pub removed: BTreeSet<SourceFile>,
    pub changed: BTreeSet<SourceFile>,
    pub unmodified: BTreeSet<SourceFile>,
}

impl SourceChanges {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    /// Every source that needs recompiling outright.
    pub fn invalidated(&self) -> BTreeSet<SourceFile> {
        self.added
            .iter()
            .chain(self.removed.iter())
            .chain(self.changed.iter())
            .cloned()
            .collect()
    }
}

/// Everything the change detector found before the first cycle.
#[derive(Debug, Default)]
pub struct InitialChanges {
    pub source_changes: SourceChanges,
    /// Previous products whose stamp drifted or that are gone.
    pub removed_products: BTreeSet<ProductFile>,
    /// Libraries judged changed under the classpath rules.
    pub library_deps: BTreeSet<LibraryFile>,
    pub external_api_changes: Vec<ApiChange>,
}

impl InitialChanges {
    pub fn is_empty(&self) -> bool {
        self.source_changes.is_empty()
            && self.removed_products.is_empty()
            && self.library_deps.is_empty()
            && self.external_api_changes.is_empty()
    }
}
