// Analysis Snapshot
//
// The immutable record of one compilation outcome: relations, APIs,
// stamps and metadata aggregated into a single value. Mutation always
// returns a new value; a cycle builds a fresh Analysis and merges it into
// the pruned previous one.

use crate::api::AnalyzedClass;
use crate::infos::{SourceInfo, SourceInfos, Compilations};
use crate::names::{ClassName, ProductFile, SourceFile, UsedName};
use crate::relations::{
    ExternalDependency, InternalDependency, LibraryDependency, NonLocalProduct, Relations,
};
use crate::stamps::{Stamp, Stamps};
use std::collections::{BTreeSet, HashMap, HashSet};

/// The analyzed APIs of one Analysis, split into classes compiled in this
/// unit and external classes observed through the lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Apis {
    pub internal: HashMap<ClassName, AnalyzedClass>,
    pub external: HashMap<ClassName, AnalyzedClass>,
}

impl Apis {
    pub fn merge(&mut self, other: &Apis) {
        self.internal
            .extend(other.internal.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.external
            .extend(other.external.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
}

/// Everything one compiled source contributes to an Analysis.
#[derive(Debug, Clone, Default)]
pub struct SourceEntry {
    pub analyzed_classes: Vec<AnalyzedClass>,
    pub stamp: Stamp,
    pub info: SourceInfo,
    pub non_local_products: Vec<NonLocalProduct>,
    pub local_products: Vec<ProductFile>,
    pub product_stamps: Vec<(ProductFile, Stamp)>,
    pub internal_deps: Vec<InternalDependency>,
    pub external_deps: Vec<ExternalDependency>,
    pub library_deps: Vec<LibraryDependency>,
    pub used_names: Vec<(ClassName, UsedName)>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Analysis {
    pub relations: Relations,
    pub apis: Apis,
    pub stamps: Stamps,
    pub infos: SourceInfos,
    pub compilations: Compilations,
}

impl Analysis {
    pub fn empty() -> Analysis {
        Analysis::default()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty() && self.apis.internal.is_empty()
    }

    /// Records one source atomically: every relation, API, stamp and info
    /// it contributes lands in the returned snapshot.
    pub fn add_source(mut self, source: &SourceFile, entry: SourceEntry) -> Analysis {
        let mut declared: Vec<ClassName> = entry
            .analyzed_classes
            .iter()
            .map(|class| class.name.clone())
            .collect();
        for product in &entry.non_local_products {
            if !declared.contains(&product.class_name) {
                declared.push(product.class_name.clone());
            }
        }

        self.relations.add_source(
            source,
            &declared,
            &entry.non_local_products,
            &entry.local_products,
            &entry.internal_deps,
            &entry.external_deps,
            &entry.library_deps,
            &entry.used_names,
        );
        for class in entry.analyzed_classes {
            self.apis.internal.insert(class.name.clone(), class);
        }
        self.stamps.add_source(source.clone(), entry.stamp);
        for (product, stamp) in entry.product_stamps {
            self.stamps.add_product(product, stamp);
        }
        self.infos.add(source.clone(), entry.info);
        self
    }

    /// Records the API of an external class observed during compilation.
    pub fn set_external_api(&mut self, class: ClassName, api: AnalyzedClass) {
        self.apis.external.insert(class, api);
    }

    /// Removes all facts keyed on the given sources, including their
    /// declared classes from every dependency relation.
    pub fn remove_sources(&self, sources: &BTreeSet<SourceFile>) -> Analysis {
        let mut pruned = self.clone();
        let classes = pruned.relations.classes_of(sources);
        let products = pruned.products_of(sources);
        pruned.relations.remove_sources(sources);
        pruned.apis.internal.retain(|class, _| !classes.contains(class));
        pruned.stamps.remove(sources, &products);
        pruned.infos.remove(sources);
        pruned
    }

    /// Unions every constituent.
    pub fn merge(mut self, other: &Analysis) -> Analysis {
        self.relations.merge(&other.relations);
        self.apis.merge(&other.apis);
        self.stamps.merge(&other.stamps);
        self.infos.merge(&other.infos);
        self.compilations.merge(&other.compilations);
        self
    }

    /// Products owned by the given sources.
    pub fn products_of(&self, sources: &BTreeSet<SourceFile>) -> BTreeSet<ProductFile> {
        sources
            .iter()
            .flat_map(|source| self.relations.src_prod.forward_iter(source).cloned())
            .collect()
    }

    /// Class names declared or generated by the given sources.
    pub fn classes_of(&self, sources: &BTreeSet<SourceFile>) -> HashSet<ClassName> {
        self.relations.classes_of(sources)
    }

    pub fn internal_api(&self, class: &ClassName) -> Option<&AnalyzedClass> {
        self.apis.internal.get(class)
    }

    pub fn external_api(&self, class: &ClassName) -> Option<&AnalyzedClass> {
        self.apis.external.get(class)
    }

    /// All sources this Analysis has facts for.
    pub fn sources(&self) -> BTreeSet<SourceFile> {
        self.stamps.sources().map(|(source, _)| source.clone()).collect()
    }

    /// Internal classes whose API marks them as package-level scoping
    /// objects.
    pub fn package_modules(&self) -> impl Iterator<Item = &ClassName> {
        self.apis
            .internal
            .iter()
            .filter(|(_, api)| api.is_package_module())
            .map(|(class, _)| class)
    }
}
