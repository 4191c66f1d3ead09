// Persisted Analysis Format
//
// The on-disk shape of an Analysis: a header, exactly thirteen named
// relation sections in a fixed order (legacy sections persist empty to
// keep the layout readable by older tooling), then APIs, stamps, source
// infos and the compilations log. Readers refuse any payload whose
// section count differs from thirteen; callers treat that as "no previous
// Analysis".

use crate::analysis::{Analysis, Apis};
use crate::api::{AnalyzedClass, Companions, NameHash};
use crate::infos::{Compilations, SourceInfo, SourceInfos};
use crate::names::{
    BinaryClassName, ClassName, LibraryFile, ProductFile, SourceFile, UsedName,
};
use crate::relations::{Relation, Relations};
use crate::stamps::{Stamp, Stamps};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::hash::Hash;
use thiserror::Error;

pub const FORMAT_VERSION: u32 = 1;
pub const RELATION_COUNT: usize = 13;

const SECTION_NAMES: [&str; RELATION_COUNT] = [
    "products",
    "library dependencies",
    "direct source dependencies",
    "direct external dependencies",
    "public inherited internal",
    "public inherited external",
    "member ref internal",
    "member ref external",
    "inheritance internal",
    "inheritance external",
    "class names",
    "used names",
    "declared classes",
];

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("unsupported analysis header: {0}")]
    Header(String),
    #[error("expected {expected} relation sections, found {found}")]
    RelationCount { expected: usize, found: usize },
    #[error("malformed analysis payload: {0}")]
    Malformed(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    version: u32,
    /// Whether per-name hashing was in force when this Analysis was built.
    name_hashing: bool,
}

/// One named relation section. `pairs` is the section's primary relation;
/// `extra` carries the section-specific companion pairs (library class
/// names, local inheritance, generated classes by source).
#[derive(Debug, Serialize, Deserialize)]
struct RelationSection {
    name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pairs: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    extra: Vec<(String, String)>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredClass {
    compilation_timestamp: u64,
    name: String,
    api: Companions,
    api_hash: u64,
    name_hashes: Vec<NameHash>,
    has_macro: bool,
    extra_hash: u64,
    provenance: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredAnalysis {
    header: Header,
    relations: Vec<RelationSection>,
    internal_apis: IndexMap<String, StoredClass>,
    external_apis: IndexMap<String, StoredClass>,
    source_stamps: IndexMap<String, Stamp>,
    product_stamps: IndexMap<String, Stamp>,
    library_stamps: IndexMap<String, Stamp>,
    source_infos: IndexMap<String, SourceInfo>,
    compilations: Compilations,
}

fn sorted_pairs<K, V>(
    relation: &Relation<K, V>,
    key: impl Fn(&K) -> String,
    value: impl Fn(&V) -> String,
) -> Vec<(String, String)>
where
    K: Eq + Hash + Clone,
    V: Eq + Hash + Clone,
{
    let mut pairs: Vec<(String, String)> =
        relation.all().map(|(k, v)| (key(k), value(v))).collect();
    pairs.sort();
    pairs
}

fn stored_class(class: &AnalyzedClass) -> StoredClass {
    StoredClass {
        compilation_timestamp: class.compilation_timestamp,
        name: class.name.to_string(),
        api: class.api().clone(),
        api_hash: class.api_hash,
        name_hashes: class.name_hashes.iter().cloned().collect(),
        has_macro: class.has_macro,
        extra_hash: class.extra_hash,
        provenance: class.provenance.clone(),
    }
}

fn restored_class(stored: StoredClass) -> AnalyzedClass {
    AnalyzedClass::restored(
        stored.compilation_timestamp,
        ClassName::new(stored.name),
        stored.api,
        stored.api_hash,
        SmallVec::from_vec(stored.name_hashes),
        stored.has_macro,
        stored.extra_hash,
        stored.provenance,
    )
}

fn stored_apis(apis: &std::collections::HashMap<ClassName, AnalyzedClass>) -> IndexMap<String, StoredClass> {
    let mut keys: Vec<&ClassName> = apis.keys().collect();
    keys.sort();
    keys.into_iter()
        .map(|class| (class.to_string(), stored_class(&apis[class])))
        .collect()
}

fn stored_stamps<K: ToString>(
    stamps: impl Iterator<Item = (K, Stamp)>,
) -> IndexMap<String, Stamp> {
    let mut entries: Vec<(String, Stamp)> =
        stamps.map(|(k, stamp)| (k.to_string(), stamp)).collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries.into_iter().collect()
}

/// Serializes an Analysis into its persisted textual form.
pub fn write(analysis: &Analysis, name_hashing: bool) -> Result<String, FormatError> {
    let relations = &analysis.relations;
    let empty = Vec::new;
    let sections: Vec<RelationSection> = SECTION_NAMES
        .iter()
        .map(|&name| {
            let (pairs, extra) = match name {
                "products" => (
                    sorted_pairs(&relations.src_prod, SourceFile::to_string, ProductFile::to_string),
                    empty(),
                ),
                "library dependencies" => (
                    sorted_pairs(&relations.library_dep, SourceFile::to_string, LibraryFile::to_string),
                    sorted_pairs(
                        &relations.library_class_name,
                        LibraryFile::to_string,
                        BinaryClassName::to_string,
                    ),
                ),
                "member ref internal" => (
                    sorted_pairs(&relations.member_ref_internal, ClassName::to_string, ClassName::to_string),
                    empty(),
                ),
                "member ref external" => (
                    sorted_pairs(&relations.member_ref_external, ClassName::to_string, ClassName::to_string),
                    empty(),
                ),
                "inheritance internal" => (
                    sorted_pairs(&relations.inheritance_internal, ClassName::to_string, ClassName::to_string),
                    sorted_pairs(
                        &relations.local_inheritance_internal,
                        ClassName::to_string,
                        ClassName::to_string,
                    ),
                ),
                "inheritance external" => (
                    sorted_pairs(&relations.inheritance_external, ClassName::to_string, ClassName::to_string),
                    sorted_pairs(
                        &relations.local_inheritance_external,
                        ClassName::to_string,
                        ClassName::to_string,
                    ),
                ),
                "class names" => (
                    sorted_pairs(
                        &relations.product_class_name,
                        ClassName::to_string,
                        BinaryClassName::to_string,
                    ),
                    sorted_pairs(&relations.classes, SourceFile::to_string, ClassName::to_string),
                ),
                "used names" => (
                    sorted_pairs(&relations.used_names, ClassName::to_string, UsedName::encode),
                    empty(),
                ),
                "declared classes" => (
                    sorted_pairs(&relations.declared_classes, SourceFile::to_string, ClassName::to_string),
                    empty(),
                ),
                // Legacy sections persist empty to keep the thirteen-slot
                // layout stable for older readers.
                _ => (empty(), empty()),
            };
            RelationSection { name: name.to_string(), pairs, extra }
        })
        .collect();

    let mut infos: Vec<(String, SourceInfo)> = analysis
        .infos
        .iter()
        .map(|(source, info)| (source.to_string(), info.clone()))
        .collect();
    infos.sort_by(|a, b| a.0.cmp(&b.0));

    let stored = StoredAnalysis {
        header: Header { version: FORMAT_VERSION, name_hashing },
        relations: sections,
        internal_apis: stored_apis(&analysis.apis.internal),
        external_apis: stored_apis(&analysis.apis.external),
        source_stamps: stored_stamps(analysis.stamps.sources().map(|(k, v)| (k, v.clone()))),
        product_stamps: stored_stamps(analysis.stamps.products().map(|(k, v)| (k, v.clone()))),
        library_stamps: stored_stamps(analysis.stamps.libraries().map(|(k, v)| (k, v.clone()))),
        source_infos: infos.into_iter().collect(),
        compilations: analysis.compilations.clone(),
    };
    Ok(serde_json::to_string_pretty(&stored)?)
}

fn section<'a>(
    sections: &'a [RelationSection],
    index: usize,
) -> Result<&'a RelationSection, FormatError> {
    let section = &sections[index];
    if section.name != SECTION_NAMES[index] {
        return Err(FormatError::Malformed(format!(
            "relation section {index} is named '{}', expected '{}'",
            section.name, SECTION_NAMES[index],
        )));
    }
    Ok(section)
}

fn relation_of<K, V>(
    pairs: &[(String, String)],
    key: impl Fn(&str) -> K,
    value: impl Fn(&str) -> V,
) -> Relation<K, V>
where
    K: Eq + Hash + Clone,
    V: Eq + Hash + Clone,
{
    pairs.iter().map(|(k, v)| (key(k.as_str()), value(v.as_str()))).collect()
}

fn used_names_of(pairs: &[(String, String)]) -> Result<Relation<ClassName, UsedName>, FormatError> {
    let mut relation = Relation::new();
    for (class, encoded) in pairs {
        let used = UsedName::decode(encoded)
            .ok_or_else(|| FormatError::Malformed(format!("used name '{encoded}'")))?;
        relation.insert(ClassName::new(class.clone()), used);
    }
    Ok(relation)
}

/// Reads an Analysis back from its persisted form.
pub fn read(payload: &str) -> Result<Analysis, FormatError> {
    let stored: StoredAnalysis = serde_json::from_str(payload)?;
    if stored.header.version != FORMAT_VERSION {
        return Err(FormatError::Header(format!(
            "version {}",
            stored.header.version
        )));
    }
    if stored.relations.len() != RELATION_COUNT {
        return Err(FormatError::RelationCount {
            expected: RELATION_COUNT,
            found: stored.relations.len(),
        });
    }

    let sections = &stored.relations;
    let products = section(sections, 0)?;
    let libraries = section(sections, 1)?;
    for legacy in 2..6 {
        section(sections, legacy)?;
    }
    let member_ref_internal = section(sections, 6)?;
    let member_ref_external = section(sections, 7)?;
    let inheritance_internal = section(sections, 8)?;
    let inheritance_external = section(sections, 9)?;
    let class_names = section(sections, 10)?;
    let used_names = section(sections, 11)?;
    let declared_classes = section(sections, 12)?;

    let class = |s: &str| ClassName::new(s);
    let source_file = |s: &str| SourceFile::new(s);
    let product_file = |s: &str| ProductFile::new(s);
    let library_file = |s: &str| LibraryFile::new(s);
    let binary_class_name = |s: &str| BinaryClassName::new(s);
    let relations = Relations {
        src_prod: relation_of(&products.pairs, source_file, product_file),
        library_dep: relation_of(&libraries.pairs, source_file, library_file),
        library_class_name: relation_of(&libraries.extra, library_file, binary_class_name),
        classes: relation_of(&class_names.extra, source_file, class),
        product_class_name: relation_of(&class_names.pairs, class, binary_class_name),
        member_ref_internal: relation_of(&member_ref_internal.pairs, class, class),
        member_ref_external: relation_of(&member_ref_external.pairs, class, class),
        inheritance_internal: relation_of(&inheritance_internal.pairs, class, class),
        inheritance_external: relation_of(&inheritance_external.pairs, class, class),
        local_inheritance_internal: relation_of(&inheritance_internal.extra, class, class),
        local_inheritance_external: relation_of(&inheritance_external.extra, class, class),
        used_names: used_names_of(&used_names.pairs)?,
        declared_classes: relation_of(&declared_classes.pairs, source_file, class),
    };

    let mut apis = Apis::default();
    for (name, stored_api) in stored.internal_apis {
        apis.internal.insert(ClassName::new(name), restored_class(stored_api));
    }
    for (name, stored_api) in stored.external_apis {
        apis.external.insert(ClassName::new(name), restored_class(stored_api));
    }

    let mut stamps = Stamps::new();
    for (source, stamp) in stored.source_stamps {
        stamps.add_source(SourceFile::new(source), stamp);
    }
    for (product, stamp) in stored.product_stamps {
        stamps.add_product(ProductFile::new(product), stamp);
    }
    for (library, stamp) in stored.library_stamps {
        stamps.add_library(LibraryFile::new(library), stamp);
    }

    let mut infos = SourceInfos::new();
    for (source, info) in stored.source_infos {
        infos.add(SourceFile::new(source), info);
    }

    Ok(Analysis {
        relations,
        apis,
        stamps,
        infos,
        compilations: stored.compilations,
    })
}
