// Change Detection Tests

use crate::changes::{InitialChanges, InitialChangesDetector, SourceChanges};
use crate::config::IncOptions;
use crate::logging::NullLogger;
use crate::testing::{ConstantStampReader, FixedLookup};
use flint_core::analysis::{Analysis, SourceEntry};
use flint_core::api::AnalyzedClass;
use flint_core::names::{
    BinaryClassName, ClassName, LibraryFile, ProductFile, SourceFile,
};
use flint_core::relations::NonLocalProduct;
use flint_core::stamps::Stamp;
use smallvec::SmallVec;
use std::collections::BTreeSet;

fn previous_with_sources(sources: &[(&str, &str)]) -> Analysis {
    let mut analysis = Analysis::empty();
    for (path, stamp) in sources {
        analysis = analysis.add_source(
            &SourceFile::from(*path),
            SourceEntry { stamp: Stamp::hash(*stamp), ..SourceEntry::default() },
        );
    }
    analysis
}

fn detect_with(
    sources: &[&str],
    previous: &Analysis,
    reader: &ConstantStampReader,
    lookup: &FixedLookup,
) -> InitialChanges {
    let options = IncOptions::default();
    let logger = NullLogger::new();
    let detector = InitialChangesDetector::new(&options, &logger);
    let sources: BTreeSet<SourceFile> = sources.iter().map(|s| SourceFile::from(*s)).collect();
    detector.detect(&sources, previous, reader, lookup)
}

mod source_changes {
    use super::*;

    #[test]
    fn should_partition_sources_by_stamp() {
        let previous = previous_with_sources(&[("A.x", "v1"), ("B.x", "v1"), ("C.x", "v1")]);
        let mut reader = ConstantStampReader::new();
        reader.set_source("A.x", Stamp::hash("v2"));
        reader.set_source("C.x", Stamp::hash("v1"));
        reader.set_source("D.x", Stamp::hash("v1"));

        let changes = detect_with(
            &["A.x", "C.x", "D.x"],
            &previous,
            &reader,
            &FixedLookup::new(),
        );
        let partition = &changes.source_changes;
        assert_eq!(partition.added, BTreeSet::from([SourceFile::from("D.x")]));
        assert_eq!(partition.removed, BTreeSet::from([SourceFile::from("B.x")]));
        assert_eq!(partition.changed, BTreeSet::from([SourceFile::from("A.x")]));
        assert_eq!(partition.unmodified, BTreeSet::from([SourceFile::from("C.x")]));
    }

    #[test]
    fn should_honor_a_precomputed_partition() {
        let previous = previous_with_sources(&[("A.x", "v1")]);
        let hint = SourceChanges {
            changed: BTreeSet::from([SourceFile::from("A.x")]),
            ..SourceChanges::default()
        };
        let lookup = FixedLookup { source_hint: Some(hint.clone()), ..FixedLookup::new() };

        // The reader would report A.x unchanged; the hint wins.
        let mut reader = ConstantStampReader::new();
        reader.set_source("A.x", Stamp::hash("v1"));

        let changes = detect_with(&["A.x"], &previous, &reader, &lookup);
        assert_eq!(changes.source_changes, hint);
    }
}

mod product_changes {
    use super::*;

    #[test]
    fn should_flag_products_whose_stamp_drifted() {
        let entry = SourceEntry {
            stamp: Stamp::hash("v1"),
            non_local_products: vec![NonLocalProduct {
                class_name: ClassName::from("A"),
                binary_name: BinaryClassName::from("A"),
                product: ProductFile::from("out/A.class"),
            }],
            product_stamps: vec![(ProductFile::from("out/A.class"), Stamp::hash("p1"))],
            ..SourceEntry::default()
        };
        let previous = Analysis::empty().add_source(&SourceFile::from("A.x"), entry);

        let mut reader = ConstantStampReader::new();
        reader.set_source("A.x", Stamp::hash("v1"));
        // The product is gone: the reader answers Absent.

        let changes = detect_with(&["A.x"], &previous, &reader, &FixedLookup::new());
        assert_eq!(
            changes.removed_products,
            BTreeSet::from([ProductFile::from("out/A.class")]),
        );
    }
}

mod library_changes {
    use super::*;

    fn previous_with_library() -> Analysis {
        let mut analysis = previous_with_sources(&[("A.x", "v1")]);
        analysis.stamps.add_library(LibraryFile::from("dep.jar"), Stamp::hash("jar1"));
        analysis
            .relations
            .library_dep
            .insert(SourceFile::from("A.x"), LibraryFile::from("dep.jar"));
        analysis
            .relations
            .library_class_name
            .insert(LibraryFile::from("dep.jar"), BinaryClassName::from("lib/Base"));
        analysis
    }

    fn fresh_reader() -> ConstantStampReader {
        let mut reader = ConstantStampReader::new();
        reader.set_source("A.x", Stamp::hash("v1"));
        reader.set_library("dep.jar", Stamp::hash("jar1"));
        reader
    }

    #[test]
    fn should_flag_a_library_whose_stamp_drifted() {
        let previous = previous_with_library();
        let mut reader = fresh_reader();
        reader.set_library("dep.jar", Stamp::hash("jar2"));

        let changes = detect_with(&["A.x"], &previous, &reader, &FixedLookup::new());
        assert_eq!(changes.library_deps, BTreeSet::from([LibraryFile::from("dep.jar")]));
    }

    #[test]
    fn should_flag_a_supplied_name_answered_by_another_entry() {
        let previous = previous_with_library();
        let lookup = FixedLookup {
            classpath_hash_changed: Some(true),
            classpath: [(BinaryClassName::from("lib/Base"), LibraryFile::from("other.jar"))]
                .into_iter()
                .collect(),
            ..FixedLookup::new()
        };

        let changes = detect_with(&["A.x"], &previous, &fresh_reader(), &lookup);
        assert_eq!(changes.library_deps, BTreeSet::from([LibraryFile::from("dep.jar")]));
    }

    #[test]
    fn should_keep_a_library_whose_entry_still_answers() {
        let previous = previous_with_library();
        let lookup = FixedLookup {
            classpath_hash_changed: Some(true),
            classpath: [(BinaryClassName::from("lib/Base"), LibraryFile::from("dep.jar"))]
                .into_iter()
                .collect(),
            ..FixedLookup::new()
        };

        let changes = detect_with(&["A.x"], &previous, &fresh_reader(), &lookup);
        assert!(changes.library_deps.is_empty());
    }

    #[test]
    fn should_only_consult_stamps_when_lookup_is_skipped() {
        let previous = previous_with_library();
        let lookup = FixedLookup {
            classpath_hash_changed: Some(true),
            ..FixedLookup::new()
        };
        let options = IncOptions { skip_classpath_lookup: true, ..IncOptions::default() };
        let logger = NullLogger::new();
        let detector = InitialChangesDetector::new(&options, &logger);
        let sources = BTreeSet::from([SourceFile::from("A.x")]);

        let changes = detector.detect(&sources, &previous, &fresh_reader(), &lookup);
        assert!(changes.library_deps.is_empty());
    }

    #[test]
    fn should_flag_a_name_shadowed_by_a_project_class() {
        let mut previous = previous_with_library();
        // An in-project class now claims the binary name the jar supplies.
        previous
            .relations
            .product_class_name
            .insert(ClassName::from("lib.Base"), BinaryClassName::from("lib/Base"));

        let changes = detect_with(&["A.x"], &previous, &fresh_reader(), &FixedLookup::new());
        assert_eq!(changes.library_deps, BTreeSet::from([LibraryFile::from("dep.jar")]));
    }
}

mod external_changes {
    use super::*;

    fn external_record(hash: u64) -> AnalyzedClass {
        AnalyzedClass::restored(
            0,
            ClassName::from("lib.Base"),
            flint_core::api::Companions::empty("lib.Base"),
            hash,
            SmallVec::new(),
            false,
            0,
            String::new(),
        )
    }

    fn previous_with_external(hash: u64) -> Analysis {
        let mut analysis = previous_with_sources(&[("A.x", "v1")]);
        analysis.set_external_api(ClassName::from("lib.Base"), external_record(hash));
        analysis
    }

    fn reader() -> ConstantStampReader {
        let mut reader = ConstantStampReader::new();
        reader.set_source("A.x", Stamp::hash("v1"));
        reader
    }

    #[test]
    fn should_emit_a_change_when_the_external_hash_drifted() {
        let previous = previous_with_external(1);
        let lookup = FixedLookup {
            analyzed: [(BinaryClassName::from("lib.Base"), external_record(2))]
                .into_iter()
                .collect(),
            ..FixedLookup::new()
        };

        let changes = detect_with(&["A.x"], &previous, &reader(), &lookup);
        assert_eq!(changes.external_api_changes.len(), 1);
        assert_eq!(
            changes.external_api_changes[0].modified_class(),
            &ClassName::from("lib.Base"),
        );
    }

    #[test]
    fn should_stay_quiet_when_the_external_hash_held() {
        let previous = previous_with_external(1);
        let lookup = FixedLookup {
            analyzed: [(BinaryClassName::from("lib.Base"), external_record(1))]
                .into_iter()
                .collect(),
            ..FixedLookup::new()
        };

        let changes = detect_with(&["A.x"], &previous, &reader(), &lookup);
        assert!(changes.external_api_changes.is_empty());
    }

    #[test]
    fn should_clear_the_set_when_the_lookup_vetoes() {
        let previous = previous_with_external(1);
        let lookup = FixedLookup {
            analyzed: [(BinaryClassName::from("lib.Base"), external_record(2))]
                .into_iter()
                .collect(),
            veto_incremental: true,
            ..FixedLookup::new()
        };

        let changes = detect_with(&["A.x"], &previous, &reader(), &lookup);
        assert!(changes.external_api_changes.is_empty());
    }
}

#[test]
fn should_report_nothing_for_an_untouched_project() {
    let previous = previous_with_sources(&[("A.x", "v1")]);
    let mut reader = ConstantStampReader::new();
    reader.set_source("A.x", Stamp::hash("v1"));

    let changes = detect_with(&["A.x"], &previous, &reader, &FixedLookup::new());
    assert!(changes.is_empty());
}
