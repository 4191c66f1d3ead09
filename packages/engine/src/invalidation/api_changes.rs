// API Change Detection
//
// Compares the recorded fingerprints of a class between two Analyses and
// collapses the difference into an ApiChange kind.

use crate::config::IncOptions;
use crate::invalidation::api::ApiChange;
use flint_core::analysis::Analysis;
use flint_core::api::{AnalyzedClass, NameHash};
use flint_core::names::{ClassName, UseScope};
use std::collections::{BTreeSet, HashSet};

/// The change between two records of the same class, `None` when the APIs
/// are equivalent.
pub fn single_api_change(
    old: &AnalyzedClass,
    new: &AnalyzedClass,
    options: &IncOptions,
) -> Option<ApiChange> {
    let hashes_equal = old.same_api(new) && old.name_hashes == new.name_hashes;
    if hashes_equal && old.has_macro == new.has_macro {
        return None;
    }

    let class = old.name.clone();
    if (old.has_macro || new.has_macro) && options.recompile_on_macro_def {
        return Some(ApiChange::MacroDefinition(class));
    }
    if old.api_hash == new.api_hash && old.extra_hash != new.extra_hash {
        return Some(ApiChange::TraitPrivateMembersModified(class));
    }

    let old_rows: HashSet<&NameHash> = old.name_hashes.iter().collect();
    let new_rows: HashSet<&NameHash> = new.name_hashes.iter().collect();
    let mut names: BTreeSet<(String, UseScope)> = old_rows
        .symmetric_difference(&new_rows)
        .map(|row| (row.name.clone(), row.scope))
        .collect();
    if names.is_empty() {
        // The whole-API hash moved without any name row following; fall
        // back to treating every known name as modified.
        names = old
            .name_hashes
            .iter()
            .chain(new.name_hashes.iter())
            .map(|row| (row.name.clone(), row.scope))
            .collect();
    }
    Some(ApiChange::NamesChange { class, names })
}

/// API changes for a set of recompiled classes between the previous and
/// the merged Analysis. A class absent on either side diffs against the
/// empty record.
pub fn api_changes(
    old: &Analysis,
    new: &Analysis,
    classes: &HashSet<ClassName>,
    options: &IncOptions,
) -> Vec<ApiChange> {
    let mut changes = Vec::new();
    for class in classes {
        let empty = || AnalyzedClass::empty(class.clone());
        let old_api = old.internal_api(class).cloned().unwrap_or_else(empty);
        let new_api = new.internal_api(class).cloned().unwrap_or_else(empty);
        if let Some(change) = single_api_change(&old_api, &new_api, options) {
            changes.push(change);
        }
    }
    changes
}
