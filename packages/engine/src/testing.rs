// Testing Support
//
// In-memory doubles for driving the engine in tests: a scripted compiler
// that replays declarative per-source scripts through the real callback,
// a constant stamp reader, and a recording class-file manager.

use crate::callback::AnalysisCallback;
use crate::changes::SourceChanges;
use crate::classfiles::ClassFileManager;
use crate::config::IncOptions;
use crate::errors::{EngineError, EngineResult};
use crate::lookup::ExternalLookup;
use flint_core::analysis::Analysis;
use flint_core::api::{AnalyzedClass, ClassLike};
use flint_core::names::{
    BinaryClassName, ClassName, LibraryFile, ProductFile, SourceFile, UseScopes,
};
use flint_core::relations::DependencyContext;
use flint_core::stamps::{Stamp, StampReader};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// A stamp reader answering from fixed tables. Absent entries stamp as
/// `Absent`, so tests must seed every file they mention.
#[derive(Debug, Clone, Default)]
pub struct ConstantStampReader {
    sources: HashMap<SourceFile, Stamp>,
    products: HashMap<ProductFile, Stamp>,
    libraries: HashMap<LibraryFile, Stamp>,
}

impl ConstantStampReader {
    pub fn new() -> ConstantStampReader {
        ConstantStampReader::default()
    }

    pub fn set_source(&mut self, source: impl Into<SourceFile>, stamp: Stamp) {
        self.sources.insert(source.into(), stamp);
    }

    pub fn set_product(&mut self, product: impl Into<ProductFile>, stamp: Stamp) {
        self.products.insert(product.into(), stamp);
    }

    pub fn set_library(&mut self, library: impl Into<LibraryFile>, stamp: Stamp) {
        self.libraries.insert(library.into(), stamp);
    }
}

impl StampReader for ConstantStampReader {
    fn source(&self, source: &SourceFile) -> Stamp {
        self.sources.get(source).cloned().unwrap_or(Stamp::Absent)
    }

    fn product(&self, product: &ProductFile) -> Stamp {
        self.products.get(product).cloned().unwrap_or(Stamp::Absent)
    }

    fn library(&self, library: &LibraryFile) -> Stamp {
        self.libraries.get(library).cloned().unwrap_or(Stamp::Absent)
    }
}

/// One class of a scripted source: its API sides, its dependencies (all
/// reported as binary dependencies and triaged by the callback), and the
/// names it references.
#[derive(Debug, Clone)]
pub struct ScriptedClass {
    pub name: ClassName,
    pub class_like: ClassLike,
    pub object_like: Option<ClassLike>,
    pub deps: Vec<(ClassName, DependencyContext)>,
    pub used_names: Vec<(String, UseScopes)>,
}

impl ScriptedClass {
    pub fn new(class_like: ClassLike) -> ScriptedClass {
        ScriptedClass {
            name: ClassName::new(class_like.name.clone()),
            class_like,
            object_like: None,
            deps: Vec::new(),
            used_names: Vec::new(),
        }
    }

    pub fn with_object(mut self, object_like: ClassLike) -> ScriptedClass {
        self.object_like = Some(object_like);
        self
    }

    pub fn with_dep(mut self, on: impl Into<ClassName>, context: DependencyContext) -> ScriptedClass {
        self.deps.push((on.into(), context));
        self
    }

    pub fn with_used_name(mut self, name: impl Into<String>, scopes: UseScopes) -> ScriptedClass {
        self.used_names.push((name.into(), scopes));
        self
    }
}

/// Replays per-source scripts through the analysis callback, standing in
/// for a real compiler. Edits between builds are simulated by replacing a
/// source's script and bumping its stamp.
#[derive(Default)]
pub struct ScriptedCompiler {
    scripts: BTreeMap<SourceFile, Vec<ScriptedClass>>,
    /// Source sets handed to `compile`, in order, across all builds.
    pub compiled_log: Vec<BTreeSet<SourceFile>>,
    /// Cancel the nth `compile` call (1-based), counted across builds.
    pub cancel_at_run: Option<usize>,
    runs: usize,
}

impl ScriptedCompiler {
    pub fn new() -> ScriptedCompiler {
        ScriptedCompiler::default()
    }

    pub fn set_source(&mut self, source: impl Into<SourceFile>, classes: Vec<ScriptedClass>) {
        self.scripts.insert(source.into(), classes);
    }

    pub fn compile(
        &mut self,
        sources: &BTreeSet<SourceFile>,
        callback: &AnalysisCallback<'_>,
    ) -> EngineResult<()> {
        self.runs += 1;
        if self.cancel_at_run == Some(self.runs) {
            return Err(EngineError::Cancelled);
        }
        self.compiled_log.push(sources.clone());

        // First pass registers every generated class so that same-cycle
        // binary dependencies resolve internally.
        for source in sources {
            let Some(classes) = self.scripts.get(source) else { continue };
            callback.start_source(source);
            for class in classes {
                callback.generated_non_local_class(
                    source,
                    &product_of(&class.name),
                    &binary_of(&class.name),
                    &class.name,
                );
            }
        }

        for source in sources {
            let Some(classes) = self.scripts.get(source) else { continue };
            for class in classes {
                callback.api(source, class.class_like.clone());
                if let Some(object_like) = &class.object_like {
                    callback.api(source, object_like.clone());
                }
                for (on, context) in &class.deps {
                    callback.binary_dependency(
                        &product_of(on),
                        &binary_of(on),
                        &class.name,
                        source,
                        *context,
                    );
                }
                for (name, scopes) in &class.used_names {
                    callback.used_name(&class.name, name, *scopes);
                }
            }
        }
        callback.dependency_phase_completed();
        callback.api_phase_completed();
        Ok(())
    }
}

pub fn product_of(class: &ClassName) -> ProductFile {
    ProductFile::new(format!("out/{}.class", class.as_str().replace('.', "/")))
}

pub fn binary_of(class: &ClassName) -> BinaryClassName {
    BinaryClassName::new(class.as_str().replace('.', "/"))
}

/// An external lookup answering from fixed tables.
#[derive(Default)]
pub struct FixedLookup {
    pub analyzed: HashMap<BinaryClassName, AnalyzedClass>,
    pub classpath: HashMap<BinaryClassName, LibraryFile>,
    pub classpath_hash_changed: Option<bool>,
    pub source_hint: Option<SourceChanges>,
    pub veto_incremental: bool,
}

impl FixedLookup {
    pub fn new() -> FixedLookup {
        FixedLookup::default()
    }
}

impl ExternalLookup for FixedLookup {
    fn analyzed_class(&self, binary: &BinaryClassName) -> Option<AnalyzedClass> {
        self.analyzed.get(binary).cloned()
    }

    fn on_classpath(&self, binary: &BinaryClassName) -> Option<LibraryFile> {
        self.classpath.get(binary).cloned()
    }

    fn changed_classpath_hash(&self) -> Option<bool> {
        self.classpath_hash_changed
    }

    fn changed_sources(&self, _previous: &Analysis) -> Option<SourceChanges> {
        self.source_hint.clone()
    }

    fn should_do_incremental_compilation(
        &self,
        _invalidations: &std::collections::HashSet<ClassName>,
        _analysis: &Analysis,
    ) -> bool {
        !self.veto_incremental
    }
}

/// A whole scripted project driven through the real engine. Edits are
/// simulated by replacing a source's script and bumping its stamp; every
/// build starts from the Analysis the previous build produced.
#[derive(Default)]
pub struct ProjectFixture {
    pub compiler: ScriptedCompiler,
    pub reader: ConstantStampReader,
    pub lookup: FixedLookup,
    pub options: IncOptions,
    pub analysis: Analysis,
    pub sources: BTreeSet<SourceFile>,
}

impl ProjectFixture {
    pub fn new() -> ProjectFixture {
        ProjectFixture::default()
    }

    pub fn add_source(&mut self, path: &str, classes: Vec<ScriptedClass>) {
        self.compiler.set_source(path, classes);
        self.reader.set_source(path, Stamp::hash("v1"));
        self.sources.insert(SourceFile::from(path));
    }

    /// Replaces a source's script and bumps its stamp.
    pub fn edit_source(&mut self, path: &str, classes: Vec<ScriptedClass>, stamp: &str) {
        self.compiler.set_source(path, classes);
        self.reader.set_source(path, Stamp::hash(stamp));
    }

    pub fn remove_source(&mut self, path: &str) {
        self.sources.remove(&SourceFile::from(path));
    }

    pub fn build(&mut self) -> (crate::cycle::CompileResult, RecordingClassFileManager) {
        let ProjectFixture { compiler, reader, lookup, options, analysis, sources } = self;
        let logger = crate::logging::NullLogger::new();
        let engine =
            crate::cycle::IncrementalCompiler::new(options.clone(), &logger, reader, lookup);
        let mut manager = RecordingClassFileManager::new();
        let result = engine
            .compile(
                sources,
                analysis.clone(),
                &mut |set, callback| compiler.compile(set, callback),
                &mut manager,
            )
            .expect("engine run failed");
        *analysis = result.analysis.clone();
        (result, manager)
    }

    /// Source sets compiled so far, across every build.
    pub fn compiled_log(&self) -> &[BTreeSet<SourceFile>] {
        &self.compiler.compiled_log
    }
}

/// Records every manager call for later assertions.
#[derive(Debug, Default)]
pub struct RecordingClassFileManager {
    pub deleted: Vec<Vec<ProductFile>>,
    pub generated: Vec<Vec<ProductFile>>,
    pub completions: Vec<bool>,
}

impl RecordingClassFileManager {
    pub fn new() -> RecordingClassFileManager {
        RecordingClassFileManager::default()
    }

    /// Every product generated after the last rollback.
    pub fn live_products(&self) -> BTreeSet<ProductFile> {
        match self.completions.last() {
            Some(false) => BTreeSet::new(),
            _ => self.generated.iter().flatten().cloned().collect(),
        }
    }
}

impl ClassFileManager for RecordingClassFileManager {
    fn delete(&mut self, products: &[ProductFile]) {
        self.deleted.push(products.to_vec());
    }

    fn generated(&mut self, products: &[ProductFile]) {
        self.generated.push(products.to_vec());
    }

    fn complete(&mut self, success: bool) {
        self.completions.push(success);
    }
}
