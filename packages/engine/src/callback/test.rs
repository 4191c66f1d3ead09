// Callback Tests

use crate::callback::AnalysisCallback;
use crate::config::IncOptions;
use crate::errors::EngineError;
use crate::testing::{binary_of, product_of, ConstantStampReader, FixedLookup};
use flint_core::analysis::Analysis;
use flint_core::api::{ClassLike, DefinitionType, Member};
use flint_core::infos::Severity;
use flint_core::names::{BinaryClassName, ClassName, LibraryFile, SourceFile, UseScopes};
use flint_core::relations::DependencyContext;
use flint_core::stamps::Stamp;

fn class(name: &str) -> ClassName {
    ClassName::from(name)
}

struct Fixture {
    lookup: FixedLookup,
    reader: ConstantStampReader,
    options: IncOptions,
    previous: Analysis,
}

impl Fixture {
    fn new() -> Fixture {
        let mut reader = ConstantStampReader::new();
        reader.set_source("A.x", Stamp::hash("v1"));
        Fixture {
            lookup: FixedLookup::new(),
            reader,
            options: IncOptions::default(),
            previous: Analysis::empty(),
        }
    }

    fn callback(&self) -> AnalysisCallback<'_> {
        AnalysisCallback::new(&self.lookup, &self.reader, &self.options, &self.previous, 5, "out")
    }
}

fn register_class(callback: &AnalysisCallback<'_>, source: &SourceFile, name: &str) {
    let class = class(name);
    callback.generated_non_local_class(source, &product_of(&class), &binary_of(&class), &class);
    callback.api(source, ClassLike::new(name, DefinitionType::ClassDef));
}

#[test]
fn should_pair_class_and_object_definitions_under_one_name() {
    let fixture = Fixture::new();
    let callback = fixture.callback();
    let source = SourceFile::from("A.x");
    callback.start_source(&source);
    register_class(&callback, &source, "a.A");

    let mut object_side = ClassLike::new("a.A", DefinitionType::ModuleDef);
    object_side.structure.declared.push(Member::new("apply", "(Int)A"));
    callback.api(&source, object_side);

    let analysis = callback.get_once().unwrap();
    let recorded = analysis.internal_api(&class("a.A")).unwrap();
    assert!(recorded.api().object_like.is_some());
    assert!(recorded.name_hashes.iter().any(|row| row.name == "apply"));
}

#[test]
fn should_classify_same_cycle_names_as_internal() {
    let fixture = Fixture::new();
    let callback = fixture.callback();
    let source = SourceFile::from("A.x");
    callback.start_source(&source);
    register_class(&callback, &source, "a.A");
    register_class(&callback, &source, "a.B");

    callback.binary_dependency(
        &product_of(&class("a.B")),
        &binary_of(&class("a.B")),
        &class("a.A"),
        &source,
        DependencyContext::MemberRef,
    );

    let analysis = callback.get_once().unwrap();
    assert!(analysis.relations.member_ref_internal.contains(&class("a.A"), &class("a.B")));
    assert!(analysis.relations.member_ref_external.is_empty());
}

#[test]
fn should_classify_previous_cycle_names_as_internal() {
    let mut fixture = Fixture::new();
    // a.Old was produced by an earlier cycle of this project.
    let mut previous = Analysis::empty();
    previous
        .relations
        .product_class_name
        .insert(class("a.Old"), binary_of(&class("a.Old")));
    fixture.previous = previous;

    let callback = fixture.callback();
    let source = SourceFile::from("A.x");
    callback.start_source(&source);
    register_class(&callback, &source, "a.A");
    callback.binary_dependency(
        &product_of(&class("a.Old")),
        &binary_of(&class("a.Old")),
        &class("a.A"),
        &source,
        DependencyContext::Inheritance,
    );

    let analysis = callback.get_once().unwrap();
    assert!(analysis.relations.inheritance_internal.contains(&class("a.A"), &class("a.Old")));
    assert!(analysis.relations.member_ref_internal.contains(&class("a.A"), &class("a.Old")));
}

#[test]
fn should_record_external_deps_with_their_library() {
    let mut fixture = Fixture::new();
    fixture.lookup.classpath.insert(
        BinaryClassName::from("lib/Base"),
        LibraryFile::from("deps/base.jar"),
    );

    let callback = fixture.callback();
    let source = SourceFile::from("A.x");
    callback.start_source(&source);
    register_class(&callback, &source, "a.A");
    callback.binary_dependency(
        &flint_core::names::ProductFile::from("deps/base.jar!lib/Base.class"),
        &BinaryClassName::from("lib/Base"),
        &class("a.A"),
        &source,
        DependencyContext::MemberRef,
    );

    let analysis = callback.get_once().unwrap();
    assert!(analysis
        .relations
        .member_ref_external
        .contains(&class("a.A"), &class("lib/Base")));
    assert!(analysis
        .relations
        .library_dep
        .contains(&source, &LibraryFile::from("deps/base.jar")));
    assert!(analysis
        .relations
        .library_class_name
        .contains(&LibraryFile::from("deps/base.jar"), &BinaryClassName::from("lib/Base")));
    assert!(analysis.external_api(&class("lib/Base")).is_some());
}

#[test]
fn should_merge_used_name_scopes_per_class() {
    let fixture = Fixture::new();
    let callback = fixture.callback();
    let source = SourceFile::from("A.x");
    callback.start_source(&source);
    register_class(&callback, &source, "a.A");
    callback.used_name(&class("a.A"), "Base", UseScopes::DEFAULT);
    callback.used_name(&class("a.A"), "Base", UseScopes::PATTERN_TARGET);

    let analysis = callback.get_once().unwrap();
    let rows: Vec<_> = analysis
        .relations
        .used_names
        .forward_iter(&class("a.A"))
        .filter(|used| used.name == "Base")
        .collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].scopes, UseScopes::DEFAULT | UseScopes::PATTERN_TARGET);
}

#[test]
fn should_split_problems_by_reported_flag() {
    let fixture = Fixture::new();
    let callback = fixture.callback();
    let source = SourceFile::from("A.x");
    callback.start_source(&source);
    register_class(&callback, &source, "a.A");
    callback.problem("typer", "A.x:3", "type mismatch", Severity::Error, true);
    callback.problem("typer", "A.x:9", "unused import", Severity::Warn, false);

    let analysis = callback.get_once().unwrap();
    let info = analysis.infos.get(&source).unwrap();
    assert_eq!(info.reported_problems.len(), 1);
    assert_eq!(info.unreported_problems.len(), 1);
    assert_eq!(info.reported_problems[0].message, "type mismatch");
}

#[test]
fn should_stamp_sources_and_products() {
    let mut fixture = Fixture::new();
    fixture
        .reader
        .set_product(product_of(&class("a.A")), Stamp::hash("p1"));
    let callback = fixture.callback();
    let source = SourceFile::from("A.x");
    callback.start_source(&source);
    register_class(&callback, &source, "a.A");

    let analysis = callback.get_once().unwrap();
    assert_eq!(analysis.stamps.source(&source), Stamp::hash("v1"));
    assert_eq!(analysis.stamps.product(&product_of(&class("a.A"))), Stamp::hash("p1"));
    assert_eq!(analysis.compilations.entries().len(), 1);
    assert_eq!(analysis.compilations.entries()[0].output_dir, "out");
}

#[test]
fn should_fail_a_second_finalization() {
    let fixture = Fixture::new();
    let callback = fixture.callback();
    callback.get_once().unwrap();
    let err = callback.get_once().unwrap_err();
    assert!(matches!(err, EngineError::ContractViolation(_)));
}

#[test]
fn should_accept_reports_from_many_threads() {
    let fixture = Fixture::new();
    let callback = fixture.callback();
    let source = SourceFile::from("A.x");
    callback.start_source(&source);
    register_class(&callback, &source, "a.A");

    std::thread::scope(|scope| {
        for worker in 0..4 {
            let callback = &callback;
            let source = &source;
            scope.spawn(move || {
                for index in 0..50 {
                    callback.used_name(
                        &class("a.A"),
                        &format!("name{}", index % 10),
                        UseScopes::DEFAULT,
                    );
                    // Idempotent re-registration from a racing thread.
                    if worker % 2 == 0 {
                        register_class(callback, source, "a.A");
                    }
                }
            });
        }
    });

    let analysis = callback.get_once().unwrap();
    assert_eq!(
        analysis
            .relations
            .used_names
            .forward_iter(&class("a.A"))
            .count(),
        10,
    );
}
