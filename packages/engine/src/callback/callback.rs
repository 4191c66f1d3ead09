// Analysis Callback
//
// Collects the facts compiler threads report during one cycle and
// materializes them into an immutable Analysis when the cycle ends.
//
// Every mutating method may be called concurrently from any thread; the
// stores are sharded concurrent maps of concurrent sets, insertions are
// idempotent, and no ordering is guaranteed between concurrent inserts.
// `get_once` freezes the stores exactly once, after the compile function
// has returned; the single-threaded driver calling it provides the
// happens-before edge.

use crate::config::IncOptions;
use crate::errors::{EngineError, EngineResult};
use crate::lookup::ExternalLookup;
use dashmap::{DashMap, DashSet};
use flint_core::analysis::{Analysis, SourceEntry};
use flint_core::api::{self, AnalyzedClass, ClassLike, Companions, DefinitionType};
use flint_core::infos::{Compilation, Problem, Severity, SourceInfo};
use flint_core::names::{
    BinaryClassName, ClassName, LibraryFile, ProductFile, SourceFile, UseScopes, UsedName,
};
use flint_core::relations::{
    DependencyContext, ExternalDependency, InternalDependency, LibraryDependency, NonLocalProduct,
};
use flint_core::stamps::StampReader;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

/// The language-family marker recorded for a source, derived from its
/// file extension.
fn provenance_of(source: &SourceFile) -> String {
    source.as_str().rsplit('.').next().unwrap_or_default().to_string()
}

pub struct AnalysisCallback<'a> {
    lookup: &'a dyn ExternalLookup,
    stamp_reader: &'a dyn StampReader,
    options: &'a IncOptions,
    /// The previous Analysis of this project; binary names it produced
    /// classify as internal dependencies.
    previous: &'a Analysis,
    start_time_ms: u64,
    output_dir: String,

    started: DashSet<SourceFile>,
    class_to_source: DashMap<ClassName, SourceFile>,
    binary_to_class: DashMap<BinaryClassName, ClassName>,
    internal_deps: DashSet<InternalDependency>,
    external_deps: DashSet<ExternalDependency>,
    external_apis: DashMap<ClassName, AnalyzedClass>,
    non_local_products: DashMap<SourceFile, DashSet<NonLocalProduct>>,
    local_products: DashMap<SourceFile, DashSet<ProductFile>>,
    library_deps: DashMap<SourceFile, DashSet<LibraryDependency>>,
    class_apis: DashMap<ClassName, ClassLike>,
    object_apis: DashMap<ClassName, ClassLike>,
    used_names: DashMap<ClassName, DashSet<UsedName>>,
    main_classes: DashMap<SourceFile, DashSet<ClassName>>,
    problems: DashMap<SourceFile, Vec<(Problem, bool)>>,

    dependency_phase_done: AtomicBool,
    api_phase_done: AtomicBool,
    finalized: AtomicBool,
}

impl<'a> AnalysisCallback<'a> {
    pub fn new(
        lookup: &'a dyn ExternalLookup,
        stamp_reader: &'a dyn StampReader,
        options: &'a IncOptions,
        previous: &'a Analysis,
        start_time_ms: u64,
        output_dir: impl Into<String>,
    ) -> AnalysisCallback<'a> {
        AnalysisCallback {
            lookup,
            stamp_reader,
            options,
            previous,
            start_time_ms,
            output_dir: output_dir.into(),
            started: DashSet::new(),
            class_to_source: DashMap::new(),
            binary_to_class: DashMap::new(),
            internal_deps: DashSet::new(),
            external_deps: DashSet::new(),
            external_apis: DashMap::new(),
            non_local_products: DashMap::new(),
            local_products: DashMap::new(),
            library_deps: DashMap::new(),
            class_apis: DashMap::new(),
            object_apis: DashMap::new(),
            used_names: DashMap::new(),
            main_classes: DashMap::new(),
            problems: DashMap::new(),
            dependency_phase_done: AtomicBool::new(false),
            api_phase_done: AtomicBool::new(false),
            finalized: AtomicBool::new(false),
        }
    }

    /// Called once per compiled source, before any fact about it.
    pub fn start_source(&self, source: &SourceFile) {
        self.started.insert(source.clone());
    }

    /// A source-level dependency between two classes of this unit.
    pub fn class_dependency(
        &self,
        on_class: &ClassName,
        from_class: &ClassName,
        context: DependencyContext,
    ) {
        if on_class == from_class {
            return;
        }
        self.internal_deps.insert(InternalDependency {
            from: from_class.clone(),
            on: on_class.clone(),
            context,
        });
    }

    /// A dependency on a compiled class file. Classified as
    /// internal-same-cycle (the name was generated in this cycle),
    /// internal to another sub-project (the lookup owns an Analysis for
    /// it), or external.
    pub fn binary_dependency(
        &self,
        class_file: &ProductFile,
        on_binary: &BinaryClassName,
        from_class: &ClassName,
        from_source: &SourceFile,
        context: DependencyContext,
    ) {
        if let Some(on_class) = self.binary_to_class.get(on_binary) {
            self.class_dependency(&on_class, from_class, context);
            return;
        }

        // A name this project produced in an earlier cycle is still an
        // internal dependency.
        if let Some(on_class) = self
            .previous
            .relations
            .product_class_name
            .reverse_iter(on_binary)
            .next()
        {
            if on_class != from_class {
                self.internal_deps.insert(InternalDependency {
                    from: from_class.clone(),
                    on: on_class.clone(),
                    context,
                });
            }
            return;
        }

        if let Some(other_project) = self.lookup.analysis_for(on_binary) {
            let on_class = other_project
                .relations
                .product_class_name
                .reverse_iter(on_binary)
                .next()
                .cloned()
                .unwrap_or_else(|| ClassName::new(on_binary.as_str()));
            if let Some(known) = other_project.internal_api(&on_class) {
                self.external_apis.insert(on_class.clone(), known.clone());
            }
            self.external_deps.insert(ExternalDependency {
                from: from_class.clone(),
                on: on_class,
                context,
            });
            return;
        }

        let on_class = ClassName::new(on_binary.as_str());
        self.external_apis.entry(on_class.clone()).or_insert_with(|| {
            self.lookup
                .analyzed_class(on_binary)
                .unwrap_or_else(|| AnalyzedClass::empty(on_class.clone()))
        });
        self.external_deps.insert(ExternalDependency {
            from: from_class.clone(),
            on: on_class,
            context,
        });

        let library = self
            .lookup
            .on_classpath(on_binary)
            .unwrap_or_else(|| LibraryFile::new(class_file.as_str()));
        self.library_deps
            .entry(from_source.clone())
            .or_default()
            .insert(LibraryDependency { library, binary_name: on_binary.clone() });
    }

    /// A generated class file with a top-level source name.
    pub fn generated_non_local_class(
        &self,
        source: &SourceFile,
        class_file: &ProductFile,
        binary_name: &BinaryClassName,
        src_name: &ClassName,
    ) {
        self.binary_to_class.insert(binary_name.clone(), src_name.clone());
        self.class_to_source.insert(src_name.clone(), source.clone());
        self.non_local_products
            .entry(source.clone())
            .or_default()
            .insert(NonLocalProduct {
                class_name: src_name.clone(),
                binary_name: binary_name.clone(),
                product: class_file.clone(),
            });
    }

    /// A generated class file scoped inside a method or block.
    pub fn generated_local_class(&self, source: &SourceFile, class_file: &ProductFile) {
        self.local_products
            .entry(source.clone())
            .or_default()
            .insert(class_file.clone());
    }

    /// Called once per top-level class or object definition.
    pub fn api(&self, source: &SourceFile, class_like: ClassLike) {
        let name = ClassName::new(class_like.name.clone());
        self.class_to_source.insert(name.clone(), source.clone());
        if class_like.definition_type == DefinitionType::ModuleDef {
            self.class_to_source.insert(name.companion(), source.clone());
            self.object_apis.insert(name, class_like);
        } else {
            self.class_apis.insert(name, class_like);
        }
    }

    /// An unqualified name referenced by a class.
    pub fn used_name(&self, class: &ClassName, name: &str, scopes: UseScopes) {
        self.used_names
            .entry(class.clone())
            .or_default()
            .insert(UsedName::new(name, scopes));
    }

    pub fn main_class(&self, source: &SourceFile, class: &ClassName) {
        self.main_classes
            .entry(source.clone())
            .or_default()
            .insert(class.clone());
    }

    pub fn problem(
        &self,
        category: &str,
        position: &str,
        message: &str,
        severity: Severity,
        reported: bool,
    ) {
        let problem = Problem {
            category: category.to_string(),
            severity,
            message: message.to_string(),
            position: position.to_string(),
        };
        self.problems
            .entry(self.source_of_position(position))
            .or_default()
            .push((problem, reported));
    }

    fn source_of_position(&self, position: &str) -> SourceFile {
        let path = position.split(':').next().unwrap_or(position);
        SourceFile::new(path)
    }

    pub fn dependency_phase_completed(&self) {
        self.dependency_phase_done.store(true, Ordering::Release);
    }

    pub fn api_phase_completed(&self) {
        self.api_phase_done.store(true, Ordering::Release);
    }

    /// Binary names recorded for the output jar so far.
    pub fn classes_in_output_jar(&self) -> HashSet<BinaryClassName> {
        self.binary_to_class.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Freezes the stores and materializes the cycle's Analysis. Must be
    /// called exactly once, after the compile function has returned.
    pub fn get_once(&self) -> EngineResult<Analysis> {
        if self.finalized.swap(true, Ordering::AcqRel) {
            return Err(EngineError::contract("get_once called twice on one cycle"));
        }

        if self.options.strict_mode {
            for products in self.non_local_products.iter() {
                for product in products.value().iter() {
                    let class = &product.class_name;
                    if !self.class_apis.contains_key(class) && !self.object_apis.contains_key(class)
                    {
                        return Err(EngineError::contract(format!(
                            "generated class {class} has no reported API"
                        )));
                    }
                }
            }
        }

        // Group the flat dependency sets by owning source.
        let mut internal_by_source: HashMap<SourceFile, Vec<InternalDependency>> = HashMap::new();
        for dep in self.internal_deps.iter() {
            let source = self.owner_of(&dep.from)?;
            internal_by_source.entry(source).or_default().push(dep.key().clone());
        }
        let mut external_by_source: HashMap<SourceFile, Vec<ExternalDependency>> = HashMap::new();
        for dep in self.external_deps.iter() {
            let source = self.owner_of(&dep.from)?;
            external_by_source.entry(source).or_default().push(dep.key().clone());
        }

        let mut classes_by_source: HashMap<SourceFile, Vec<ClassName>> = HashMap::new();
        for entry in self.class_to_source.iter() {
            classes_by_source
                .entry(entry.value().clone())
                .or_default()
                .push(entry.key().clone());
        }

        let mut analysis = Analysis::empty();
        for source in self.started.iter() {
            let source = source.key().clone();
            let entry = self.source_entry(
                &source,
                classes_by_source.remove(&source).unwrap_or_default(),
                internal_by_source.remove(&source).unwrap_or_default(),
                external_by_source.remove(&source).unwrap_or_default(),
            );
            analysis = analysis.add_source(&source, entry);
        }

        for entry in self.external_apis.iter() {
            analysis.set_external_api(entry.key().clone(), entry.value().clone());
        }
        for entry in self.library_deps.iter() {
            for dep in entry.value().iter() {
                analysis
                    .stamps
                    .add_library(dep.library.clone(), self.stamp_reader.library(&dep.library));
            }
        }
        analysis.compilations.add(Compilation {
            start_time_ms: self.start_time_ms,
            output_dir: self.output_dir.clone(),
        });
        Ok(analysis)
    }

    fn owner_of(&self, class: &ClassName) -> EngineResult<SourceFile> {
        self.class_to_source
            .get(class)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                EngineError::contract(format!("dependency from unknown class {class}"))
            })
    }

    fn source_entry(
        &self,
        source: &SourceFile,
        classes: Vec<ClassName>,
        internal_deps: Vec<InternalDependency>,
        external_deps: Vec<ExternalDependency>,
    ) -> SourceEntry {
        let provenance = provenance_of(source);
        let mut analyzed_classes = Vec::new();
        let mut used_names = Vec::new();
        for class in classes {
            if class.is_companion_form() {
                // The companion form shares the record stored under the
                // base name.
                continue;
            }
            let object_side = self.object_apis.get(&class).map(|side| side.value().clone());
            let class_side = self.class_apis.get(&class).map(|side| side.value().clone());
            let has_any_api = object_side.is_some() || class_side.is_some();
            let companions = Companions {
                class_like: class_side.unwrap_or_else(|| {
                    ClassLike::new(class.as_str(), DefinitionType::ClassDef)
                }),
                object_like: object_side,
            };
            if has_any_api {
                analyzed_classes.push(self.analyzed_class(&class, companions, &provenance));
            }
            if let Some(rows) = self.used_names.get(&class) {
                let mut merged: HashMap<String, UseScopes> = HashMap::new();
                for row in rows.iter() {
                    *merged.entry(row.name.clone()).or_insert(UseScopes::empty()) |= row.scopes;
                }
                for (name, scopes) in merged {
                    used_names.push((class.clone(), UsedName::new(name, scopes)));
                }
            }
        }

        let non_local_products: Vec<NonLocalProduct> = self
            .non_local_products
            .get(source)
            .map(|set| set.iter().map(|product| product.key().clone()).collect())
            .unwrap_or_default();
        let local_products: Vec<ProductFile> = self
            .local_products
            .get(source)
            .map(|set| set.iter().map(|product| product.key().clone()).collect())
            .unwrap_or_default();
        let product_stamps = non_local_products
            .iter()
            .map(|product| &product.product)
            .chain(local_products.iter())
            .map(|product| (product.clone(), self.stamp_reader.product(product)))
            .collect();

        let mut info = SourceInfo::default();
        if let Some(recorded) = self.problems.get(source) {
            for (problem, reported) in recorded.iter() {
                if *reported {
                    info.reported_problems.push(problem.clone());
                } else {
                    info.unreported_problems.push(problem.clone());
                }
            }
        }
        if let Some(mains) = self.main_classes.get(source) {
            info.main_classes = mains.iter().map(|class| class.key().clone()).collect();
            info.main_classes.sort();
        }

        SourceEntry {
            analyzed_classes,
            stamp: self.stamp_reader.source(source),
            info,
            non_local_products,
            local_products,
            product_stamps,
            internal_deps,
            external_deps,
            library_deps: self
                .library_deps
                .get(source)
                .map(|set| set.iter().map(|dep| dep.key().clone()).collect())
                .unwrap_or_default(),
            used_names,
        }
    }

    fn analyzed_class(
        &self,
        class: &ClassName,
        companions: Companions,
        provenance: &str,
    ) -> AnalyzedClass {
        // Hashes cover the full API; only the stored payload is minimized.
        let api_hash = api::api_hash(&companions);
        let extra_hash = api::extra_hash(&companions);
        let name_hashes = api::name_hashes(&companions);
        let has_macro = companions.has_macro();
        let minimized = api::minimize(&companions, self.options.api_debug);
        AnalyzedClass::restored(
            self.start_time_ms,
            class.clone(),
            minimized,
            api_hash,
            name_hashes,
            has_macro,
            extra_hash,
            provenance.to_string(),
        )
    }
}
