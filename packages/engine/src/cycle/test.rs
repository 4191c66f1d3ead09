// Cycle State Tests

use crate::cycle::CycleState;
use flint_core::names::{ClassName, SourceFile};
use std::collections::{BTreeSet, HashSet};

#[test]
fn should_report_work_for_invalidated_classes() {
    let state = CycleState::running(
        HashSet::from([ClassName::from("a.A")]),
        BTreeSet::new(),
    );
    assert!(state.has_work());
}

#[test]
fn should_report_work_for_changed_sources() {
    let state = CycleState::running(
        HashSet::new(),
        BTreeSet::from([SourceFile::from("A.x")]),
    );
    assert!(state.has_work());
}

#[test]
fn should_be_idle_when_both_sets_are_empty() {
    assert!(!CycleState::running(HashSet::new(), BTreeSet::new()).has_work());
    assert!(!CycleState::Done.has_work());
}
