// Invalidation Tests

use crate::callback::AnalysisCallback;
use crate::config::IncOptions;
use crate::invalidation::{ApiChange, Invalidator};
use crate::logging::NullLogger;
use crate::testing::{ConstantStampReader, FixedLookup, ScriptedClass, ScriptedCompiler};
use flint_core::analysis::Analysis;
use flint_core::api::{ClassLike, DefinitionType, Member};
use flint_core::names::{ClassName, SourceFile, UseScope, UseScopes};
use flint_core::relations::DependencyContext;
use std::collections::{BTreeSet, HashSet};

fn class(name: &str) -> ClassName {
    ClassName::from(name)
}

fn plain_class(name: &str) -> ClassLike {
    let mut side = ClassLike::new(name, DefinitionType::ClassDef);
    side.structure.declared.push(Member::new("run", "()Unit"));
    side
}

/// Runs the scripted sources through the real callback and returns the
/// materialized Analysis.
fn build_analysis(compiler: &mut ScriptedCompiler, sources: &[&str]) -> Analysis {
    let lookup = FixedLookup::new();
    let reader = ConstantStampReader::new();
    let options = IncOptions::default();
    let previous = Analysis::empty();
    let callback = AnalysisCallback::new(&lookup, &reader, &options, &previous, 0, "");
    let set: BTreeSet<SourceFile> = sources.iter().map(|s| SourceFile::from(*s)).collect();
    compiler.compile(&set, &callback).unwrap();
    callback.get_once().unwrap()
}

fn names_change(name: &str, rows: &[(&str, UseScope)]) -> ApiChange {
    ApiChange::NamesChange {
        class: class(name),
        names: rows.iter().map(|(n, s)| (n.to_string(), *s)).collect(),
    }
}

fn invalidate(analysis: &Analysis, options: &IncOptions, change: ApiChange) -> HashSet<ClassName> {
    let logger = NullLogger::new();
    let invalidator = Invalidator::new(options, &logger);
    invalidator.invalidate_internal(analysis, &[change]).unwrap()
}

#[test]
fn should_invalidate_name_users_and_inheritors() {
    let mut compiler = ScriptedCompiler::new();
    compiler.set_source("C.x", vec![ScriptedClass::new(plain_class("a.C"))]);
    compiler.set_source(
        "U.x",
        vec![ScriptedClass::new(plain_class("a.U"))
            .with_dep("a.C", DependencyContext::MemberRef)
            .with_used_name("foo", UseScopes::DEFAULT)],
    );
    compiler.set_source(
        "V.x",
        vec![ScriptedClass::new(plain_class("a.V")).with_dep("a.C", DependencyContext::Inheritance)],
    );
    compiler.set_source(
        "W.x",
        vec![ScriptedClass::new(plain_class("a.W"))
            .with_dep("a.C", DependencyContext::MemberRef)
            .with_used_name("bar", UseScopes::DEFAULT)],
    );
    let analysis = build_analysis(&mut compiler, &["C.x", "U.x", "V.x", "W.x"]);

    let invalidated = invalidate(
        &analysis,
        &IncOptions::default(),
        names_change("a.C", &[("foo", UseScope::Default)]),
    );

    assert!(invalidated.contains(&class("a.U")), "name user must be invalidated");
    assert!(invalidated.contains(&class("a.V")), "inheritor must be invalidated");
    assert!(!invalidated.contains(&class("a.W")), "user of an untouched name must survive");
}

#[test]
fn should_walk_inheritance_transitively_but_member_refs_directly() {
    let mut compiler = ScriptedCompiler::new();
    compiler.set_source("C.x", vec![ScriptedClass::new(plain_class("a.C"))]);
    compiler.set_source(
        "Mid.x",
        vec![ScriptedClass::new(plain_class("a.Mid"))
            .with_dep("a.C", DependencyContext::Inheritance)],
    );
    compiler.set_source(
        "Leaf.x",
        vec![ScriptedClass::new(plain_class("a.Leaf"))
            .with_dep("a.Mid", DependencyContext::Inheritance)],
    );
    compiler.set_source(
        "UserOfMid.x",
        vec![ScriptedClass::new(plain_class("a.UserOfMid"))
            .with_dep("a.Mid", DependencyContext::MemberRef)
            .with_used_name("run", UseScopes::DEFAULT)],
    );
    let analysis = build_analysis(&mut compiler, &["C.x", "Mid.x", "Leaf.x", "UserOfMid.x"]);

    let invalidated = invalidate(
        &analysis,
        &IncOptions::default(),
        names_change("a.C", &[("run", UseScope::Default)]),
    );

    assert!(invalidated.contains(&class("a.Mid")));
    assert!(invalidated.contains(&class("a.Leaf")), "inheritance propagates structurally");
    assert!(
        !invalidated.contains(&class("a.UserOfMid")),
        "member references of an inheritor break at the immediate user",
    );
}

#[test]
fn should_limit_trait_private_changes_to_direct_users() {
    let mut compiler = ScriptedCompiler::new();
    compiler.set_source("T.x", vec![ScriptedClass::new(plain_class("a.T"))]);
    compiler.set_source(
        "U.x",
        vec![ScriptedClass::new(plain_class("a.U")).with_dep("a.T", DependencyContext::MemberRef)],
    );
    compiler.set_source(
        "V.x",
        vec![ScriptedClass::new(plain_class("a.V")).with_dep("a.T", DependencyContext::Inheritance)],
    );
    compiler.set_source(
        "X.x",
        vec![ScriptedClass::new(plain_class("a.X")).with_dep("a.V", DependencyContext::Inheritance)],
    );
    let analysis = build_analysis(&mut compiler, &["T.x", "U.x", "V.x", "X.x"]);

    let invalidated = invalidate(
        &analysis,
        &IncOptions::default(),
        ApiChange::TraitPrivateMembersModified(class("a.T")),
    );

    assert_eq!(invalidated, HashSet::from([class("a.U"), class("a.V")]));
}

#[test]
fn should_chase_macro_users_through_macro_providers_only() {
    let mut compiler = ScriptedCompiler::new();
    let mut macro_provider = plain_class("a.M");
    macro_provider.has_macro = true;
    compiler.set_source("M.x", vec![ScriptedClass::new(macro_provider)]);
    compiler.set_source(
        "U1.x",
        vec![ScriptedClass::new(plain_class("a.U1")).with_dep("a.M", DependencyContext::MemberRef)],
    );
    let mut relaying = plain_class("a.U2");
    relaying.has_macro = true;
    compiler.set_source(
        "U2.x",
        vec![ScriptedClass::new(relaying).with_dep("a.M", DependencyContext::MemberRef)],
    );
    compiler.set_source(
        "U3.x",
        vec![ScriptedClass::new(plain_class("a.U3")).with_dep("a.U2", DependencyContext::MemberRef)],
    );
    compiler.set_source(
        "U4.x",
        vec![ScriptedClass::new(plain_class("a.U4")).with_dep("a.U1", DependencyContext::MemberRef)],
    );
    let analysis = build_analysis(&mut compiler, &["M.x", "U1.x", "U2.x", "U3.x", "U4.x"]);

    let invalidated = invalidate(
        &analysis,
        &IncOptions::default(),
        ApiChange::MacroDefinition(class("a.M")),
    );

    assert_eq!(
        invalidated,
        HashSet::from([class("a.U1"), class("a.U2"), class("a.U3")]),
        "the walk passes through macro providers but stops at plain users",
    );
}

#[test]
fn should_widen_across_language_families() {
    let mut compiler = ScriptedCompiler::new();
    compiler.set_source("C.scala", vec![ScriptedClass::new(plain_class("a.C"))]);
    // The user references no modified name, but it comes from another
    // language family.
    compiler.set_source(
        "U.java",
        vec![ScriptedClass::new(plain_class("a.U")).with_dep("a.C", DependencyContext::MemberRef)],
    );
    let analysis = build_analysis(&mut compiler, &["C.scala", "U.java"]);

    let invalidated = invalidate(
        &analysis,
        &IncOptions::default(),
        names_change("a.C", &[("foo", UseScope::Default)]),
    );
    assert!(invalidated.contains(&class("a.U")));
}

#[test]
fn should_restrict_sealed_changes_to_pattern_users_when_optimized() {
    let mut compiler = ScriptedCompiler::new();
    compiler.set_source("S.x", vec![ScriptedClass::new(plain_class("a.S"))]);
    compiler.set_source(
        "Pattern.x",
        vec![ScriptedClass::new(plain_class("a.Pattern"))
            .with_dep("a.S", DependencyContext::MemberRef)
            .with_used_name("S", UseScopes::PATTERN_TARGET)],
    );
    compiler.set_source(
        "Plain.x",
        vec![ScriptedClass::new(plain_class("a.Plain"))
            .with_dep("a.S", DependencyContext::MemberRef)
            .with_used_name("S", UseScopes::DEFAULT)],
    );
    let analysis = build_analysis(&mut compiler, &["S.x", "Pattern.x", "Plain.x"]);
    let change = names_change("a.S", &[("S", UseScope::PatternTarget)]);

    let optimized = IncOptions { use_optimized_sealed: true, ..IncOptions::default() };
    let restricted = invalidate(&analysis, &optimized, change.clone());
    assert_eq!(restricted, HashSet::from([class("a.Pattern")]));

    let conservative = invalidate(&analysis, &IncOptions::default(), change);
    assert_eq!(
        conservative,
        HashSet::from([class("a.Pattern"), class("a.Plain")]),
    );
}

#[test]
fn should_invalidate_all_claimants_of_a_shared_product() {
    let mut compiler = ScriptedCompiler::new();
    compiler.set_source("A.x", vec![ScriptedClass::new(plain_class("p.Q"))]);
    compiler.set_source("B.x", vec![ScriptedClass::new(plain_class("p.Q"))]);
    let analysis = build_analysis(&mut compiler, &["A.x", "B.x"]);

    let options = IncOptions::default();
    let logger = NullLogger::new();
    let invalidator = Invalidator::new(&options, &logger);
    let invalidated = invalidator.invalidate_duplicate_products(&analysis.relations);
    assert!(invalidated.contains(&class("p.Q")));
}

#[test]
fn should_pull_package_objects_inheriting_from_invalidated_classes() {
    let mut compiler = ScriptedCompiler::new();
    compiler.set_source("B.x", vec![ScriptedClass::new(plain_class("a.B"))]);
    let package_object = ClassLike::new("a.package", DefinitionType::PackageModule);
    compiler.set_source(
        "package.x",
        vec![ScriptedClass::new(package_object).with_dep("a.B", DependencyContext::Inheritance)],
    );
    let analysis = build_analysis(&mut compiler, &["B.x", "package.x"]);

    let options = IncOptions::default();
    let logger = NullLogger::new();
    let invalidator = Invalidator::new(&options, &logger);
    let expanded =
        invalidator.expand_package_objects(&analysis, &HashSet::from([class("a.B")]));
    assert_eq!(expanded, HashSet::from([class("a.package")]));
}

#[test]
fn should_saturate_through_member_references() {
    let mut compiler = ScriptedCompiler::new();
    compiler.set_source("A.x", vec![ScriptedClass::new(plain_class("a.A"))]);
    compiler.set_source(
        "B.x",
        vec![ScriptedClass::new(plain_class("a.B")).with_dep("a.A", DependencyContext::MemberRef)],
    );
    compiler.set_source(
        "C.x",
        vec![ScriptedClass::new(plain_class("a.C")).with_dep("a.B", DependencyContext::MemberRef)],
    );
    let analysis = build_analysis(&mut compiler, &["A.x", "B.x", "C.x"]);

    let options = IncOptions::default();
    let logger = NullLogger::new();
    let invalidator = Invalidator::new(&options, &logger);
    let saturated = invalidator.invalidate_saturated(
        &analysis.relations,
        &[names_change("a.A", &[("run", UseScope::Default)])],
    );
    assert_eq!(saturated, HashSet::from([class("a.B"), class("a.C")]));
}

#[test]
fn should_widen_to_all_sources_past_the_fraction() {
    let mut compiler = ScriptedCompiler::new();
    let mut paths = Vec::new();
    for index in 0..10 {
        let path = format!("S{index}.x");
        compiler.set_source(
            path.as_str(),
            vec![ScriptedClass::new(plain_class(&format!("a.S{index}")))],
        );
        paths.push(path);
    }
    let path_refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    let analysis = build_analysis(&mut compiler, &path_refs);
    let all: BTreeSet<SourceFile> = paths.iter().map(|p| SourceFile::from(p.as_str())).collect();

    let options = IncOptions { recompile_all_fraction: 0.3, ..IncOptions::default() };
    let logger = NullLogger::new();
    let invalidator = Invalidator::new(&options, &logger);

    let four: HashSet<ClassName> = (0..4).map(|i| class(&format!("a.S{i}"))).collect();
    assert_eq!(
        invalidator.map_to_sources(&analysis.relations, &four, &all),
        all,
        "4 of 10 sources exceed the 0.3 fraction",
    );

    let two: HashSet<ClassName> = (0..2).map(|i| class(&format!("a.S{i}"))).collect();
    assert_eq!(invalidator.map_to_sources(&analysis.relations, &two, &all).len(), 2);

    assert!(invalidator
        .map_to_sources(&analysis.relations, &HashSet::new(), &all)
        .is_empty());
}

#[test]
fn should_raise_a_contract_violation_for_a_class_without_api() {
    let mut analysis = Analysis::empty();
    analysis
        .relations
        .member_ref_internal
        .insert(class("a.Ghost"), class("a.C"));

    let options = IncOptions::default();
    let logger = NullLogger::new();
    let invalidator = Invalidator::new(&options, &logger);
    let result = invalidator.invalidate_internal(
        &analysis,
        &[names_change("a.C", &[("run", UseScope::Default)])],
    );
    let err = result.unwrap_err();
    assert!(err.to_string().contains("a.Ghost"));
}
