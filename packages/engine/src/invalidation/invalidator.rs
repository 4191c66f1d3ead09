// Invalidator
//
// Expands API changes into invalidated class sets. Member-reference
// dependencies break only at the immediate user; inheritance changes
// propagate structurally, so the inheritance closure runs transitively.
// The walkers are cycle-safe: a seed re-enters the result only when a
// dependency cycle leads back to it.

use crate::config::IncOptions;
use crate::errors::{EngineError, EngineResult};
use crate::invalidation::api::ApiChange;
use crate::logging::Logger;
use flint_core::analysis::Analysis;
use flint_core::api::AnalyzedClass;
use flint_core::names::{ClassName, SourceFile, UseScope, UseScopes};
use flint_core::relations::{Relation, Relations};
use std::collections::{BTreeSet, HashSet};

pub struct Invalidator<'a> {
    options: &'a IncOptions,
    logger: &'a dyn Logger,
}

type ClassRelation = Relation<ClassName, ClassName>;

/// Reachable set from `seeds` along `edges`, excluding the seeds
/// themselves unless a cycle revisits them.
fn transitive_closure<'r>(
    seeds: impl IntoIterator<Item = ClassName>,
    edges: impl Fn(&ClassName) -> Box<dyn Iterator<Item = &'r ClassName> + 'r>,
) -> HashSet<ClassName> {
    let mut result: HashSet<ClassName> = HashSet::new();
    let mut worklist: Vec<ClassName> = seeds.into_iter().collect();
    while let Some(current) = worklist.pop() {
        for next in edges(&current) {
            if result.insert(next.clone()) {
                worklist.push(next.clone());
            }
        }
    }
    result
}

impl<'a> Invalidator<'a> {
    pub fn new(options: &'a IncOptions, logger: &'a dyn Logger) -> Invalidator<'a> {
        Invalidator { options, logger }
    }

    /// Invalidated classes for API changes observed inside the project.
    pub fn invalidate_internal(
        &self,
        analysis: &Analysis,
        changes: &[ApiChange],
    ) -> EngineResult<HashSet<ClassName>> {
        let mut invalidated = HashSet::new();
        for change in changes {
            let for_change = self.invalidate_change(
                analysis,
                change,
                &analysis.relations.member_ref_internal,
                &analysis.relations.inheritance_internal,
                &analysis.relations.local_inheritance_internal,
            )?;
            self.logger.debug(&format!(
                "change in {} invalidates {} classes",
                change.modified_class(),
                for_change.len(),
            ));
            invalidated.extend(for_change);
        }
        Ok(invalidated)
    }

    /// Invalidated classes for changes in external dependencies. The
    /// first hop runs over the external relations into in-project users,
    /// the inheritance closure then continues internally.
    pub fn invalidate_external(
        &self,
        analysis: &Analysis,
        changes: &[ApiChange],
    ) -> EngineResult<HashSet<ClassName>> {
        let mut invalidated = HashSet::new();
        for change in changes {
            invalidated.extend(self.invalidate_change(
                analysis,
                change,
                &analysis.relations.member_ref_external,
                &analysis.relations.inheritance_external,
                &analysis.relations.local_inheritance_external,
            )?);
        }
        Ok(invalidated)
    }

    fn invalidate_change(
        &self,
        analysis: &Analysis,
        change: &ApiChange,
        member_ref: &ClassRelation,
        inheritance: &ClassRelation,
        local_inheritance: &ClassRelation,
    ) -> EngineResult<HashSet<ClassName>> {
        let relations = &analysis.relations;
        match change {
            // Macro expansions are invisible to the API model: every user
            // is suspect, and a user that itself provides macros passes
            // the suspicion on.
            ApiChange::MacroDefinition(class) => {
                let mut result = HashSet::new();
                let mut worklist = vec![class.clone()];
                while let Some(current) = worklist.pop() {
                    let users = member_ref
                        .reverse_iter(&current)
                        .chain(relations.member_ref_internal.reverse_iter(&current));
                    for user in users {
                        if result.insert(user.clone())
                            && self.internal_api(analysis, user)?.has_macro
                        {
                            worklist.push(user.clone());
                        }
                    }
                }
                Ok(result)
            }
            // Private members cannot leak past the classes that link
            // against the trait, so no inheritance pass runs here.
            ApiChange::TraitPrivateMembersModified(class) => {
                Ok(member_ref.reverse_iter(class).cloned().collect())
            }
            ApiChange::NamesChange { class, names } => {
                let changed_api = analysis.internal_api(class).or_else(|| analysis.external_api(class));
                let mut direct = HashSet::new();
                for user in member_ref.reverse_iter(class) {
                    if self.name_use_affected(analysis, user, names, changed_api)? {
                        direct.insert(user.clone());
                    }
                }

                let mut seeds: Vec<ClassName> = direct.iter().cloned().collect();
                seeds.push(class.clone());
                // First hop over the (possibly external) inheritance
                // edges, then the closure continues over the internal
                // ones.
                let closure = transitive_closure(seeds, |current| {
                    Box::new(
                        inheritance
                            .reverse_iter(current)
                            .chain(local_inheritance.reverse_iter(current))
                            .chain(relations.inheritance_internal.reverse_iter(current))
                            .chain(relations.local_inheritance_internal.reverse_iter(current)),
                    )
                });
                // The changed class itself lands in the result only when
                // the closure loops back to it.
                direct.extend(closure);
                Ok(direct)
            }
        }
    }

    fn internal_api<'b>(
        &self,
        analysis: &'b Analysis,
        class: &ClassName,
    ) -> EngineResult<&'b AnalyzedClass> {
        analysis.internal_api(class).ok_or_else(|| {
            EngineError::contract(format!("no recorded API for class {class}"))
        })
    }

    /// Whether `user` references any of the modified names under a
    /// matching scope. A user from another language family is affected
    /// regardless of names.
    fn name_use_affected(
        &self,
        analysis: &Analysis,
        user: &ClassName,
        names: &BTreeSet<(String, UseScope)>,
        changed_api: Option<&AnalyzedClass>,
    ) -> EngineResult<bool> {
        // A change with no name rows carries no shape information at
        // all, e.g. an external class without per-name hashes; every
        // user is affected.
        if names.is_empty() {
            return Ok(true);
        }
        let user_api = self.internal_api(analysis, user)?;
        if let Some(changed) = changed_api {
            if !user_api.same_family(changed) {
                return Ok(true);
            }
        }

        let used = analysis.relations.used_names.forward(user);
        let Some(used) = used else { return Ok(false) };
        for (name, scope) in names {
            let required = match scope {
                // Without the sealed optimization a pattern-target change
                // behaves like any other change to the name.
                UseScope::PatternTarget if !self.options.use_optimized_sealed => UseScopes::all(),
                other => other.mask(),
            };
            if used
                .iter()
                .any(|candidate| candidate.name == *name && candidate.scopes.intersects(required))
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Classes whose product is claimed by more than one source in the
    /// merged relations. One of the claimants must lose, so all of them
    /// recompile.
    pub fn invalidate_duplicate_products(&self, relations: &Relations) -> HashSet<ClassName> {
        let mut invalidated = HashSet::new();
        for product in relations.src_prod.reverse_keys() {
            let owners: Vec<&SourceFile> = relations.src_prod.reverse_iter(product).collect();
            if owners.len() > 1 {
                self.logger.warn(&format!(
                    "product {product} is claimed by {} sources",
                    owners.len(),
                ));
                for owner in owners {
                    invalidated.extend(relations.declared_classes.forward_iter(owner).cloned());
                    invalidated.extend(relations.classes.forward_iter(owner).cloned());
                }
            }
        }
        invalidated
    }

    /// Package-level scoping objects inheriting, directly or transitively,
    /// from an invalidated class. Recompiling them up front avoids
    /// "class needed by package is missing" failures.
    pub fn expand_package_objects(
        &self,
        analysis: &Analysis,
        invalidated: &HashSet<ClassName>,
    ) -> HashSet<ClassName> {
        let relations = &analysis.relations;
        let mut expanded = HashSet::new();
        for package_module in analysis.package_modules() {
            if invalidated.contains(package_module) {
                continue;
            }
            let ancestors = transitive_closure([package_module.clone()], |current| {
                Box::new(
                    relations
                        .inheritance_internal
                        .forward_iter(current)
                        .chain(relations.local_inheritance_internal.forward_iter(current)),
                )
            });
            if !ancestors.is_disjoint(invalidated) {
                expanded.insert(package_module.clone());
            }
        }
        expanded
    }

    /// Termination safety net: the brute-force closure over reverse
    /// member references, used once a compilation has looped past the
    /// transitive-step threshold.
    pub fn invalidate_saturated(
        &self,
        relations: &Relations,
        changes: &[ApiChange],
    ) -> HashSet<ClassName> {
        self.logger.debug("falling back to the member-reference closure");
        transitive_closure(
            changes.iter().map(|change| change.modified_class().clone()),
            |current| Box::new(relations.member_ref_internal.reverse_iter(current)),
        )
    }

    /// Maps invalidated classes to the sources defining them. A result
    /// larger than `recompile_all_fraction` of all sources widens to the
    /// whole project.
    pub fn map_to_sources(
        &self,
        relations: &Relations,
        invalidated: &HashSet<ClassName>,
        all_sources: &BTreeSet<SourceFile>,
    ) -> BTreeSet<SourceFile> {
        let sources = relations.sources_of(invalidated);
        if sources.is_empty() {
            return sources;
        }
        let threshold = self.options.recompile_all_fraction * all_sources.len() as f64;
        if sources.len() as f64 > threshold {
            self.logger.info(&format!(
                "{} invalidated sources exceed {:.0}% of the project, recompiling everything",
                sources.len(),
                self.options.recompile_all_fraction * 100.0,
            ));
            return all_sources.clone();
        }
        sources
    }
}
