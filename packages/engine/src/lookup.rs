// External Lookup
//
// The hook points the build tool supplies: classpath queries, analyses of
// other sub-projects, precomputed change answers, and the incremental
// veto. Defaults are the conservative answers.

use crate::changes::SourceChanges;
use flint_core::analysis::Analysis;
use flint_core::api::AnalyzedClass;
use flint_core::names::{BinaryClassName, ClassName, LibraryFile};
use std::collections::HashSet;
use std::sync::Arc;

// The lookup is consulted from compiler threads through the analysis
// callback, hence the Sync bound.
pub trait ExternalLookup: Sync {
    /// The current API of an external class; `None` when nothing is
    /// known. Callers substitute the empty record where a value is
    /// needed.
    fn analyzed_class(&self, _binary: &BinaryClassName) -> Option<AnalyzedClass> {
        None
    }

    /// The classpath entry currently providing a binary class name.
    fn on_classpath(&self, _binary: &BinaryClassName) -> Option<LibraryFile> {
        None
    }

    /// The Analysis of another sub-project producing the given name.
    fn analysis_for(&self, _binary: &BinaryClassName) -> Option<Arc<Analysis>> {
        None
    }

    /// Whether the overall classpath hash changed since the previous
    /// build. `None` means unknown.
    fn changed_classpath_hash(&self) -> Option<bool> {
        None
    }

    /// A precomputed source-change partition; honored over stamp probing
    /// when supplied.
    fn changed_sources(&self, _previous: &Analysis) -> Option<SourceChanges> {
        None
    }

    /// Veto hook: returning false stops further incremental rounds.
    fn should_do_incremental_compilation(
        &self,
        _invalidations: &HashSet<ClassName>,
        _analysis: &Analysis,
    ) -> bool {
        true
    }
}

/// The conservative defaults: nothing external is known.
pub struct DefaultLookup;

impl ExternalLookup for DefaultLookup {}
