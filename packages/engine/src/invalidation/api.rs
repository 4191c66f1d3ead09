// API Change Kinds
//
// The three shapes an observed API difference collapses into. Macro
// definitions pre-empt the name-level diff; a trait whose public hash
// held steady while the extra hash drifted modified only private
// members; everything else is a per-name change set.

use flint_core::names::{ClassName, UseScope};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiChange {
    /// A class providing macros changed in any way.
    MacroDefinition(ClassName),
    /// Only private trait members changed.
    TraitPrivateMembersModified(ClassName),
    /// The names whose hashes differ, with their use scopes.
    NamesChange {
        class: ClassName,
        names: BTreeSet<(String, UseScope)>,
    },
}

impl ApiChange {
    pub fn modified_class(&self) -> &ClassName {
        match self {
            ApiChange::MacroDefinition(class) => class,
            ApiChange::TraitPrivateMembersModified(class) => class,
            ApiChange::NamesChange { class, .. } => class,
        }
    }
}
