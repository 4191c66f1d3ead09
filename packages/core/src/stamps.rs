// Stamps
//
// Opaque change-detection fingerprints. The engine never interprets a
// stamp; it only tests equivalence against the previously recorded one.

use crate::names::{LibraryFile, ProductFile, SourceFile};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// A fingerprint for a source, product or library file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stamp {
    /// A content hash.
    Hash(String),
    /// A modification time, milliseconds.
    LastModified(u64),
    /// The file exists but carries no finer fingerprint.
    Present,
    /// The file does not exist.
    Absent,
}

impl Stamp {
    pub fn hash(value: impl Into<String>) -> Stamp {
        Stamp::Hash(value.into())
    }
}

impl Default for Stamp {
    fn default() -> Stamp {
        Stamp::Absent
    }
}

/// Produces stamps for the three file domains. Implementations are
/// external collaborators; the engine only compares their answers.
/// Readers are shared with the concurrent analysis callback, hence the
/// `Sync` bound.
pub trait StampReader: Sync {
    fn source(&self, source: &SourceFile) -> Stamp;
    fn product(&self, product: &ProductFile) -> Stamp;
    fn library(&self, library: &LibraryFile) -> Stamp;
}

/// The recorded stamps of one Analysis.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stamps {
    sources: HashMap<SourceFile, Stamp>,
    products: HashMap<ProductFile, Stamp>,
    libraries: HashMap<LibraryFile, Stamp>,
}

impl Stamps {
    pub fn new() -> Stamps {
        Stamps::default()
    }

    pub fn source(&self, source: &SourceFile) -> Stamp {
        self.sources.get(source).cloned().unwrap_or(Stamp::Absent)
    }

    pub fn product(&self, product: &ProductFile) -> Stamp {
        self.products.get(product).cloned().unwrap_or(Stamp::Absent)
    }

    pub fn library(&self, library: &LibraryFile) -> Stamp {
        self.libraries.get(library).cloned().unwrap_or(Stamp::Absent)
    }

    pub fn sources(&self) -> impl Iterator<Item = (&SourceFile, &Stamp)> {
        self.sources.iter()
    }

    pub fn products(&self) -> impl Iterator<Item = (&ProductFile, &Stamp)> {
        self.products.iter()
    }

    pub fn libraries(&self) -> impl Iterator<Item = (&LibraryFile, &Stamp)> {
        self.libraries.iter()
    }

    pub fn add_source(&mut self, source: SourceFile, stamp: Stamp) {
        self.sources.insert(source, stamp);
    }

    pub fn add_product(&mut self, product: ProductFile, stamp: Stamp) {
        self.products.insert(product, stamp);
    }

    pub fn add_library(&mut self, library: LibraryFile, stamp: Stamp) {
        self.libraries.insert(library, stamp);
    }

    /// Union with `other`; entries of `other` win on conflict.
    pub fn merge(&mut self, other: &Stamps) {
        self.sources
            .extend(other.sources.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.products
            .extend(other.products.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.libraries
            .extend(other.libraries.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    /// Drops the given sources and products. Library stamps are keyed by
    /// classpath entry and survive source removal.
    pub fn remove(&mut self, sources: &BTreeSet<SourceFile>, products: &BTreeSet<ProductFile>) {
        self.sources.retain(|source, _| !sources.contains(source));
        self.products.retain(|product, _| !products.contains(product));
    }
}
