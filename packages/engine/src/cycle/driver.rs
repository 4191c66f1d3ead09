// Cycle Driver
//
// Owns the Analysis across cycles: detect initial changes, invalidate,
// map to sources, prune, hand the set to the compile function, merge the
// fresh facts back, detect API drift, and go around until nothing new is
// invalidated. Single-threaded and cooperative; cancellation is observed
// between cycles only.

use crate::callback::AnalysisCallback;
use crate::changes::{InitialChanges, InitialChangesDetector};
use crate::classfiles::ClassFileManager;
use crate::config::IncOptions;
use crate::cycle::api::{CompileResult, CycleState};
use crate::errors::{EngineError, EngineResult};
use crate::invalidation::{api_changes, ApiChange, Invalidator};
use crate::logging::Logger;
use crate::lookup::ExternalLookup;
use flint_core::analysis::Analysis;
use flint_core::names::{ClassName, ProductFile, SourceFile};
use flint_core::stamps::StampReader;
use std::collections::{BTreeSet, HashSet};
use std::time::{SystemTime, UNIX_EPOCH};

/// The caller-supplied compiler: compiles a source set, reporting every
/// fact through the callback. A distinguished `Cancelled` error signals
/// cooperative cancellation.
pub type CompileFn<'c> =
    dyn FnMut(&BTreeSet<SourceFile>, &AnalysisCallback<'_>) -> EngineResult<()> + 'c;

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// One-line rendering of an API change for the debug log, listing at
/// most `context_size` modified names.
fn describe_change(change: &ApiChange, context_size: usize) -> String {
    match change {
        ApiChange::MacroDefinition(class) => format!("macro definition changed in {class}"),
        ApiChange::TraitPrivateMembersModified(class) => {
            format!("private trait members changed in {class}")
        }
        ApiChange::NamesChange { class, names } => {
            let shown: Vec<&str> = names
                .iter()
                .take(context_size)
                .map(|(name, _)| name.as_str())
                .collect();
            let elided = names.len().saturating_sub(context_size);
            if elided > 0 {
                format!("{class} changed names: {} (+{elided} more)", shown.join(", "))
            } else {
                format!("{class} changed names: {}", shown.join(", "))
            }
        }
    }
}

pub struct IncrementalCompiler<'a, R: StampReader> {
    options: IncOptions,
    logger: &'a dyn Logger,
    stamp_reader: &'a R,
    lookup: &'a dyn ExternalLookup,
    output_dir: String,
}

impl<'a, R: StampReader> IncrementalCompiler<'a, R> {
    pub fn new(
        options: IncOptions,
        logger: &'a dyn Logger,
        stamp_reader: &'a R,
        lookup: &'a dyn ExternalLookup,
    ) -> IncrementalCompiler<'a, R> {
        IncrementalCompiler {
            options: options.normalized(),
            logger,
            stamp_reader,
            lookup,
            output_dir: String::new(),
        }
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<String>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    /// Runs the engine over the current sources against the previous
    /// Analysis. The class-file manager is completed on every exit path:
    /// committed on success, rolled back on cancellation or failure.
    pub fn compile(
        &self,
        sources: &BTreeSet<SourceFile>,
        previous: Analysis,
        compile_fn: &mut CompileFn<'_>,
        classfiles: &mut dyn ClassFileManager,
    ) -> EngineResult<CompileResult> {
        let detector = InitialChangesDetector::new(&self.options, self.logger);
        let changes = detector.detect(sources, &previous, self.stamp_reader, self.lookup);
        let invalidator = Invalidator::new(&self.options, self.logger);

        let initial = match self.initial_state(&previous, &changes, &invalidator) {
            Ok(state) => state,
            Err(err) => {
                classfiles.complete(false);
                return Err(err);
            }
        };
        if !initial.has_work() {
            self.logger.info("no changes detected, previous analysis is up to date");
            classfiles.complete(true);
            return Ok(CompileResult { analysis: previous, compiled: false });
        }

        let mut last_good = previous;
        let mut compiled = false;
        let outcome = self.run_cycles(
            sources,
            initial,
            &invalidator,
            compile_fn,
            classfiles,
            &mut last_good,
            &mut compiled,
        );
        match outcome {
            Ok(()) => {
                classfiles.complete(true);
                Ok(CompileResult { analysis: last_good, compiled })
            }
            Err(EngineError::Cancelled) => {
                // No partial state escapes: the in-flight Analysis is
                // dropped and the file system rolls back.
                self.logger.warn("compilation cancelled, keeping the previous analysis");
                classfiles.complete(false);
                Ok(CompileResult { analysis: last_good, compiled: false })
            }
            Err(err) => {
                classfiles.complete(false);
                Err(err)
            }
        }
    }

    /// The first `Running` state: external invalidations plus every
    /// source-level change, with product and library changes folded onto
    /// their owning sources.
    fn initial_state(
        &self,
        previous: &Analysis,
        changes: &InitialChanges,
        invalidator: &Invalidator<'_>,
    ) -> EngineResult<CycleState> {
        let mut invalidated_classes =
            invalidator.invalidate_external(previous, &changes.external_api_changes)?;
        invalidated_classes
            .extend(invalidator.invalidate_duplicate_products(&previous.relations));

        let mut changed_sources = changes.source_changes.invalidated();
        for product in &changes.removed_products {
            changed_sources.extend(previous.relations.src_prod.reverse_iter(product).cloned());
        }
        for library in &changes.library_deps {
            changed_sources.extend(previous.relations.library_dep.reverse_iter(library).cloned());
        }

        Ok(CycleState::running(invalidated_classes, changed_sources))
    }

    #[allow(clippy::too_many_arguments)]
    fn run_cycles(
        &self,
        sources: &BTreeSet<SourceFile>,
        initial: CycleState,
        invalidator: &Invalidator<'_>,
        compile_fn: &mut CompileFn<'_>,
        classfiles: &mut dyn ClassFileManager,
        last_good: &mut Analysis,
        compiled: &mut bool,
    ) -> EngineResult<()> {
        let mut state = initial;
        // Collisions are retried once; a collision that survives its own
        // recompilation would otherwise ping-pong forever.
        let mut seen_collisions: HashSet<ClassName> = HashSet::new();

        while let CycleState::Running { invalidated_classes, changed_sources, cycle } = state {
            if invalidated_classes.is_empty() && changed_sources.is_empty() {
                state = CycleState::Done;
                continue;
            }

            let mut classes_to_recompile = invalidated_classes;
            classes_to_recompile
                .extend(invalidator.expand_package_objects(last_good, &classes_to_recompile));

            // Sources to prune include removed ones; only sources still
            // present get compiled.
            let mut pruned_sources = invalidator.map_to_sources(
                &last_good.relations,
                &classes_to_recompile,
                sources,
            );
            pruned_sources.extend(changed_sources.iter().cloned());
            let compiled_sources: BTreeSet<SourceFile> =
                pruned_sources.intersection(sources).cloned().collect();

            self.logger.info(&format!(
                "cycle {cycle}: compiling {} of {} sources ({} invalidated classes)",
                compiled_sources.len(),
                sources.len(),
                classes_to_recompile.len(),
            ));

            let pruned_products: Vec<ProductFile> =
                last_good.products_of(&pruned_sources).into_iter().collect();
            classfiles.delete(&pruned_products);
            let pruned = last_good.remove_sources(&pruned_sources);

            // A cycle with only removed sources prunes without compiling.
            let fresh = if compiled_sources.is_empty() {
                Analysis::empty()
            } else {
                let callback = AnalysisCallback::new(
                    self.lookup,
                    self.stamp_reader,
                    &self.options,
                    last_good,
                    now_ms(),
                    &self.output_dir,
                );
                compile_fn(&compiled_sources, &callback)?;
                callback.get_once()?
            };

            let fresh_products: Vec<ProductFile> = fresh
                .products_of(&fresh.sources())
                .into_iter()
                .collect();
            let merged = pruned.merge(&fresh);
            classfiles.generated(&fresh_products);
            *compiled = true;

            // A full recompile has nothing left to invalidate.
            if compiled_sources == *sources {
                *last_good = merged;
                state = CycleState::Done;
                continue;
            }

            if self.options.relations_debug {
                self.logger.debug(&format!(
                    "relations after cycle {cycle}: {} member refs, {} inheritance edges, {} products",
                    merged.relations.member_ref_internal.len(),
                    merged.relations.inheritance_internal.len(),
                    merged.relations.src_prod.len(),
                ));
            }

            let mut recompiled_classes = classes_to_recompile;
            recompiled_classes.extend(last_good.classes_of(&pruned_sources));
            recompiled_classes.extend(merged.classes_of(&pruned_sources));

            let drift = api_changes(last_good, &merged, &recompiled_classes, &self.options);
            for change in &drift {
                self.logger
                    .debug(&describe_change(change, self.options.api_diff_context_size));
            }
            let mut next = if cycle >= self.options.transitive_step {
                invalidator.invalidate_saturated(&merged.relations, &drift)
            } else {
                invalidator.invalidate_internal(&merged, &drift)?
            };

            // Classes just compiled already saw the new APIs.
            let just_compiled = merged.classes_of(&compiled_sources);
            next.retain(|class| !just_compiled.contains(class));

            let collisions = invalidator.invalidate_duplicate_products(&merged.relations);
            next.extend(collisions.difference(&seen_collisions).cloned());
            seen_collisions.extend(collisions);

            *last_good = merged;

            if next.is_empty() {
                state = CycleState::Done;
            } else if !self
                .lookup
                .should_do_incremental_compilation(&next, last_good)
            {
                self.logger.info("incremental compilation vetoed by the external lookup");
                state = CycleState::Done;
            } else {
                state = CycleState::Running {
                    invalidated_classes: next,
                    changed_sources: BTreeSet::new(),
                    cycle: cycle + 1,
                };
            }
        }
        Ok(())
    }
}
