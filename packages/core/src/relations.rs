// Relation Store
//
// Immutable-in-spirit binary relations with eagerly maintained forward and
// reverse indices, plus the aggregate of the named relations one Analysis
// carries.

use crate::names::{BinaryClassName, ClassName, LibraryFile, ProductFile, SourceFile, UsedName};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::hash::Hash;

/// A finite mapping from keys to sets of values with a reverse index kept
/// in sync on every mutation. Neither direction carries ordering.
#[derive(Debug, Clone)]
pub struct Relation<K, V> {
    forward: HashMap<K, HashSet<V>>,
    reverse: HashMap<V, HashSet<K>>,
}

impl<K, V> Relation<K, V>
where
    K: Eq + Hash + Clone,
    V: Eq + Hash + Clone,
{
    pub fn new() -> Relation<K, V> {
        Relation { forward: HashMap::new(), reverse: HashMap::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Number of (k, v) pairs.
    pub fn len(&self) -> usize {
        self.forward.values().map(HashSet::len).sum()
    }

    pub fn insert(&mut self, k: K, v: V) {
        self.reverse.entry(v.clone()).or_default().insert(k.clone());
        self.forward.entry(k).or_default().insert(v);
    }

    pub fn extend(&mut self, k: K, vs: impl IntoIterator<Item = V>) {
        for v in vs {
            self.insert(k.clone(), v);
        }
    }

    /// Values mapped from `k`; `None` when the key is absent.
    pub fn forward(&self, k: &K) -> Option<&HashSet<V>> {
        self.forward.get(k)
    }

    /// Keys mapping to `v`; `None` when the value is absent.
    pub fn reverse(&self, v: &V) -> Option<&HashSet<K>> {
        self.reverse.get(v)
    }

    /// Iterates the values of `k`, empty when the key is absent.
    pub fn forward_iter(&self, k: &K) -> impl Iterator<Item = &V> {
        self.forward.get(k).into_iter().flatten()
    }

    /// Iterates the keys of `v`, empty when the value is absent.
    pub fn reverse_iter(&self, v: &V) -> impl Iterator<Item = &K> {
        self.reverse.get(v).into_iter().flatten()
    }

    pub fn contains(&self, k: &K, v: &V) -> bool {
        self.forward.get(k).is_some_and(|vs| vs.contains(v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.forward.keys()
    }

    pub fn reverse_keys(&self) -> impl Iterator<Item = &V> {
        self.reverse.keys()
    }

    /// All (k, v) pairs, order unspecified.
    pub fn all(&self) -> impl Iterator<Item = (&K, &V)> {
        self.forward.iter().flat_map(|(k, vs)| vs.iter().map(move |v| (k, v)))
    }

    pub fn remove_key(&mut self, k: &K) {
        if let Some(vs) = self.forward.remove(k) {
            for v in vs {
                if let Some(ks) = self.reverse.get_mut(&v) {
                    ks.remove(k);
                    if ks.is_empty() {
                        self.reverse.remove(&v);
                    }
                }
            }
        }
    }

    pub fn remove_keys<'a>(&mut self, ks: impl IntoIterator<Item = &'a K>)
    where
        K: 'a,
    {
        for k in ks {
            self.remove_key(k);
        }
    }

    pub fn remove_value(&mut self, v: &V) {
        if let Some(ks) = self.reverse.remove(v) {
            for k in ks {
                if let Some(vs) = self.forward.get_mut(&k) {
                    vs.remove(v);
                    if vs.is_empty() {
                        self.forward.remove(&k);
                    }
                }
            }
        }
    }

    pub fn remove_values<'a>(&mut self, vs: impl IntoIterator<Item = &'a V>)
    where
        V: 'a,
    {
        for v in vs {
            self.remove_value(v);
        }
    }

    /// Union with `other`.
    pub fn merge(&mut self, other: &Relation<K, V>) {
        for (k, v) in other.all() {
            self.insert(k.clone(), v.clone());
        }
    }
}

impl<K, V> Default for Relation<K, V>
where
    K: Eq + Hash + Clone,
    V: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

// Content equality: the reverse index is derived, comparing forward maps
// is sufficient and cheaper.
impl<K, V> PartialEq for Relation<K, V>
where
    K: Eq + Hash + Clone,
    V: Eq + Hash + Clone,
{
    fn eq(&self, other: &Self) -> bool {
        self.forward == other.forward
    }
}

impl<K, V> Eq for Relation<K, V>
where
    K: Eq + Hash + Clone,
    V: Eq + Hash + Clone,
{
}

impl<K, V> FromIterator<(K, V)> for Relation<K, V>
where
    K: Eq + Hash + Clone,
    V: Eq + Hash + Clone,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut relation = Relation::new();
        for (k, v) in iter {
            relation.insert(k, v);
        }
        relation
    }
}

/// How one class depends on another, as reported by the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DependencyContext {
    /// The dependent class mentions a member of the target.
    MemberRef,
    /// The target appears in a parent position of the dependent class.
    Inheritance,
    /// Inheritance originating inside a local (non-top-level) scope.
    LocalInheritance,
}

/// A class-to-class dependency within the compiled unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InternalDependency {
    pub from: ClassName,
    pub on: ClassName,
    pub context: DependencyContext,
}

/// A class-to-class dependency on a class outside the compiled unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExternalDependency {
    pub from: ClassName,
    pub on: ClassName,
    pub context: DependencyContext,
}

/// A generated class file together with its names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NonLocalProduct {
    pub class_name: ClassName,
    pub binary_name: BinaryClassName,
    pub product: ProductFile,
}

/// A binary dependency resolved to its classpath entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LibraryDependency {
    pub library: LibraryFile,
    pub binary_name: BinaryClassName,
}

/// The named relations of one Analysis.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Relations {
    /// Which products came from which source.
    pub src_prod: Relation<SourceFile, ProductFile>,
    /// Binary (non-source-tracked) dependencies per source.
    pub library_dep: Relation<SourceFile, LibraryFile>,
    /// Binary names a library supplies.
    pub library_class_name: Relation<LibraryFile, BinaryClassName>,
    /// Non-local classes generated per source.
    pub classes: Relation<SourceFile, ClassName>,
    /// Source-level to binary name pairs.
    pub product_class_name: Relation<ClassName, BinaryClassName>,
    pub member_ref_internal: Relation<ClassName, ClassName>,
    pub member_ref_external: Relation<ClassName, ClassName>,
    pub inheritance_internal: Relation<ClassName, ClassName>,
    pub inheritance_external: Relation<ClassName, ClassName>,
    pub local_inheritance_internal: Relation<ClassName, ClassName>,
    pub local_inheritance_external: Relation<ClassName, ClassName>,
    /// Unqualified names referenced per class, tagged by use scope.
    pub used_names: Relation<ClassName, UsedName>,
    pub declared_classes: Relation<SourceFile, ClassName>,
}

impl Relations {
    pub fn new() -> Relations {
        Relations::default()
    }

    /// Records every fact of one compiled source in a single step.
    ///
    /// Inheritance edges are folded into the member-ref relations as well:
    /// to inherit a type the class must reference it.
    #[allow(clippy::too_many_arguments)]
    pub fn add_source(
        &mut self,
        source: &SourceFile,
        declared: &[ClassName],
        non_local_products: &[NonLocalProduct],
        local_products: &[ProductFile],
        internal_deps: &[InternalDependency],
        external_deps: &[ExternalDependency],
        library_deps: &[LibraryDependency],
        used_names: &[(ClassName, UsedName)],
    ) {
        self.declared_classes
            .extend(source.clone(), declared.iter().cloned());
        for product in local_products {
            self.src_prod.insert(source.clone(), product.clone());
        }
        for product in non_local_products {
            self.src_prod.insert(source.clone(), product.product.clone());
            self.classes.insert(source.clone(), product.class_name.clone());
            self.product_class_name
                .insert(product.class_name.clone(), product.binary_name.clone());
        }
        for dep in internal_deps {
            match dep.context {
                DependencyContext::MemberRef => {}
                DependencyContext::Inheritance => {
                    self.inheritance_internal.insert(dep.from.clone(), dep.on.clone());
                }
                DependencyContext::LocalInheritance => {
                    self.local_inheritance_internal.insert(dep.from.clone(), dep.on.clone());
                }
            }
            self.member_ref_internal.insert(dep.from.clone(), dep.on.clone());
        }
        for dep in external_deps {
            match dep.context {
                DependencyContext::MemberRef => {}
                DependencyContext::Inheritance => {
                    self.inheritance_external.insert(dep.from.clone(), dep.on.clone());
                }
                DependencyContext::LocalInheritance => {
                    self.local_inheritance_external.insert(dep.from.clone(), dep.on.clone());
                }
            }
            self.member_ref_external.insert(dep.from.clone(), dep.on.clone());
        }
        for dep in library_deps {
            self.library_dep.insert(source.clone(), dep.library.clone());
            self.library_class_name
                .insert(dep.library.clone(), dep.binary_name.clone());
        }
        for (class, used) in used_names {
            self.used_names.insert(class.clone(), used.clone());
        }
    }

    /// Every class a set of sources declares or generates.
    pub fn classes_of(&self, sources: &BTreeSet<SourceFile>) -> HashSet<ClassName> {
        let mut classes = HashSet::new();
        for source in sources {
            classes.extend(self.declared_classes.forward_iter(source).cloned());
            classes.extend(self.classes.forward_iter(source).cloned());
        }
        classes
    }

    /// Sources that declare or generate any of the given classes.
    pub fn sources_of(&self, classes: &HashSet<ClassName>) -> BTreeSet<SourceFile> {
        let mut sources = BTreeSet::new();
        for class in classes {
            sources.extend(self.declared_classes.reverse_iter(class).cloned());
            sources.extend(self.classes.reverse_iter(class).cloned());
        }
        sources
    }

    /// Removes every edge where one of the given sources, or any class it
    /// declares, is an endpoint.
    pub fn remove_sources(&mut self, sources: &BTreeSet<SourceFile>) {
        let classes = self.classes_of(sources);
        let libraries: HashSet<LibraryFile> = sources
            .iter()
            .flat_map(|source| self.library_dep.forward_iter(source).cloned())
            .collect();

        self.src_prod.remove_keys(sources.iter());
        self.library_dep.remove_keys(sources.iter());
        self.classes.remove_keys(sources.iter());
        self.declared_classes.remove_keys(sources.iter());

        for relation in [
            &mut self.member_ref_internal,
            &mut self.inheritance_internal,
            &mut self.local_inheritance_internal,
        ] {
            relation.remove_keys(classes.iter());
            relation.remove_values(classes.iter());
        }
        for relation in [
            &mut self.member_ref_external,
            &mut self.inheritance_external,
            &mut self.local_inheritance_external,
        ] {
            relation.remove_keys(classes.iter());
        }
        self.used_names.remove_keys(classes.iter());
        self.product_class_name.remove_keys(classes.iter());

        // A library entry survives only while some remaining source still
        // depends on it.
        for library in libraries {
            if self.library_dep.reverse(&library).is_none() {
                self.library_class_name.remove_key(&library);
            }
        }
    }

    pub fn merge(&mut self, other: &Relations) {
        self.src_prod.merge(&other.src_prod);
        self.library_dep.merge(&other.library_dep);
        self.library_class_name.merge(&other.library_class_name);
        self.classes.merge(&other.classes);
        self.product_class_name.merge(&other.product_class_name);
        self.member_ref_internal.merge(&other.member_ref_internal);
        self.member_ref_external.merge(&other.member_ref_external);
        self.inheritance_internal.merge(&other.inheritance_internal);
        self.inheritance_external.merge(&other.inheritance_external);
        self.local_inheritance_internal.merge(&other.local_inheritance_internal);
        self.local_inheritance_external.merge(&other.local_inheritance_external);
        self.used_names.merge(&other.used_names);
        self.declared_classes.merge(&other.declared_classes);
    }

    pub fn is_empty(&self) -> bool {
        self.src_prod.is_empty()
            && self.library_dep.is_empty()
            && self.library_class_name.is_empty()
            && self.classes.is_empty()
            && self.product_class_name.is_empty()
            && self.member_ref_internal.is_empty()
            && self.member_ref_external.is_empty()
            && self.inheritance_internal.is_empty()
            && self.inheritance_external.is_empty()
            && self.local_inheritance_internal.is_empty()
            && self.local_inheritance_external.is_empty()
            && self.used_names.is_empty()
            && self.declared_classes.is_empty()
    }
}
