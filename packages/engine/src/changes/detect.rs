// Initial Change Detection
//
// Stamps decide whether a source changed; products and libraries are
// judged against the previous Analysis; external classes are re-fetched
// through the lookup and diffed by hash.

use crate::changes::api::{InitialChanges, SourceChanges};
use crate::config::IncOptions;
use crate::invalidation::{single_api_change, ApiChange};
use crate::logging::Logger;
use crate::lookup::ExternalLookup;
use flint_core::analysis::Analysis;
use flint_core::api::AnalyzedClass;
use flint_core::names::{BinaryClassName, ClassName, LibraryFile, SourceFile};
use flint_core::stamps::StampReader;
use rayon::prelude::*;
use std::collections::{BTreeSet, HashSet};

pub struct InitialChangesDetector<'a> {
    options: &'a IncOptions,
    logger: &'a dyn Logger,
}

impl<'a> InitialChangesDetector<'a> {
    pub fn new(options: &'a IncOptions, logger: &'a dyn Logger) -> InitialChangesDetector<'a> {
        InitialChangesDetector { options, logger }
    }

    pub fn detect<R: StampReader>(
        &self,
        sources: &BTreeSet<SourceFile>,
        previous: &Analysis,
        reader: &R,
        lookup: &dyn ExternalLookup,
    ) -> InitialChanges {
        let source_changes = lookup
            .changed_sources(previous)
            .unwrap_or_else(|| self.source_changes(sources, previous, reader));

        let removed_products: BTreeSet<_> = previous
            .stamps
            .products()
            .filter(|(product, stamp)| reader.product(product) != **stamp)
            .map(|(product, _)| product.clone())
            .collect();

        let library_deps = self.changed_libraries(previous, reader, lookup);
        let external_api_changes = self.external_api_changes(previous, lookup);

        let changes = InitialChanges {
            source_changes,
            removed_products,
            library_deps,
            external_api_changes,
        };
        self.logger.debug(&format!(
            "initial changes: {} added, {} removed, {} changed sources, {} removed products, {} changed libraries, {} external API changes",
            changes.source_changes.added.len(),
            changes.source_changes.removed.len(),
            changes.source_changes.changed.len(),
            changes.removed_products.len(),
            changes.library_deps.len(),
            changes.external_api_changes.len(),
        ));
        changes
    }

    fn source_changes<R: StampReader>(
        &self,
        sources: &BTreeSet<SourceFile>,
        previous: &Analysis,
        reader: &R,
    ) -> SourceChanges {
        let previous_sources = previous.sources();
        let added: BTreeSet<_> = sources.difference(&previous_sources).cloned().collect();
        let removed: BTreeSet<_> = previous_sources.difference(sources).cloned().collect();

        let common: Vec<&SourceFile> = sources.intersection(&previous_sources).collect();
        let changed: BTreeSet<SourceFile> = common
            .par_iter()
            .copied()
            .filter(|source| reader.source(source) != previous.stamps.source(source))
            .cloned()
            .collect();
        let unmodified = common
            .iter()
            .filter(|source| !changed.contains(**source))
            .map(|source| (*source).clone())
            .collect();

        SourceChanges { added, removed, changed, unmodified }
    }

    /// A previously recorded library is changed when its own stamp
    /// drifted, or, with the classpath lookup enabled, when the classpath
    /// hash moved and a name it supplied is no longer answered by the
    /// same entry, or when a supplied name is now shadowed by an
    /// in-project product.
    fn changed_libraries<R: StampReader>(
        &self,
        previous: &Analysis,
        reader: &R,
        lookup: &dyn ExternalLookup,
    ) -> BTreeSet<LibraryFile> {
        let classpath_hash_changed = lookup.changed_classpath_hash().unwrap_or(false);
        previous
            .stamps
            .libraries()
            .filter(|(library, stamp)| {
                if reader.library(library) != **stamp {
                    return true;
                }
                if self.options.skip_classpath_lookup {
                    return false;
                }
                let supplied = previous.relations.library_class_name.forward_iter(library);
                let mut moved_or_shadowed = supplied.filter(|binary| {
                    self.supplied_name_moved(previous, library, binary, lookup, classpath_hash_changed)
                });
                moved_or_shadowed.next().is_some()
            })
            .map(|(library, _)| library.clone())
            .collect()
    }

    fn supplied_name_moved(
        &self,
        previous: &Analysis,
        library: &LibraryFile,
        binary: &BinaryClassName,
        lookup: &dyn ExternalLookup,
        classpath_hash_changed: bool,
    ) -> bool {
        // Shadowing: the name is now produced by an in-project source.
        if previous.relations.product_class_name.reverse(binary).is_some() {
            self.logger.debug(&format!(
                "binary name {binary} from {library} is shadowed by a project class"
            ));
            return true;
        }
        if classpath_hash_changed {
            return match lookup.on_classpath(binary) {
                None => true,
                Some(entry) => entry != *library,
            };
        }
        false
    }

    /// Re-fetches every external class recorded in the previous Analysis
    /// and diffs the hashes. When the lookup vetoes the whole change set,
    /// it is cleared.
    fn external_api_changes(
        &self,
        previous: &Analysis,
        lookup: &dyn ExternalLookup,
    ) -> Vec<ApiChange> {
        let mut changes = Vec::new();
        for (class, recorded) in &previous.apis.external {
            let binary = BinaryClassName::new(class.as_str());
            let current = lookup
                .analyzed_class(&binary)
                .unwrap_or_else(|| AnalyzedClass::empty(class.clone()));
            if recorded.same_api(&current) {
                continue;
            }
            if let Some(change) = single_api_change(recorded, &current, self.options) {
                changes.push(change);
            }
        }

        if !changes.is_empty() {
            let changed: HashSet<ClassName> = changes
                .iter()
                .map(|change| change.modified_class().clone())
                .collect();
            if !lookup.should_do_incremental_compilation(&changed, previous) {
                self.logger.debug("external API changes vetoed, clearing the set");
                changes.clear();
            }
        }
        changes
    }
}
