// Cycle Types
//
// The driver's state machine and its result value.

use flint_core::analysis::Analysis;
use flint_core::names::{ClassName, SourceFile};
use std::collections::{BTreeSet, HashSet};

/// One step of the invalidate-compile-merge loop.
#[derive(Debug)]
pub enum CycleState {
    /// Work remains: these classes and sources go into the next cycle.
    Running {
        invalidated_classes: HashSet<ClassName>,
        changed_sources: BTreeSet<SourceFile>,
        cycle: u32,
    },
    Done,
}

impl CycleState {
    pub fn running(
        invalidated_classes: HashSet<ClassName>,
        changed_sources: BTreeSet<SourceFile>,
    ) -> CycleState {
        CycleState::Running { invalidated_classes, changed_sources, cycle: 1 }
    }

    pub fn has_work(&self) -> bool {
        match self {
            CycleState::Running { invalidated_classes, changed_sources, .. } => {
                !invalidated_classes.is_empty() || !changed_sources.is_empty()
            }
            CycleState::Done => false,
        }
    }
}

/// The engine's answer: the resulting Analysis and whether any compile
/// cycle actually ran to completion. Cancellation returns the previous
/// Analysis with `compiled = false`.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileResult {
    pub analysis: Analysis,
    pub compiled: bool,
}
