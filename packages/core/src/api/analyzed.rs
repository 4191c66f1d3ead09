// Analyzed Class
//
// The per-class record an Analysis stores: fingerprints, per-name hashes,
// macro presence, and the (lazily surfaced) minimized API payload.

use crate::api::hashing;
use crate::api::model::Companions;
use crate::names::{ClassName, UseScope};
use once_cell::sync::{Lazy, OnceCell};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

static EMPTY_COMPANIONS: Lazy<Companions> = Lazy::new(|| Companions::empty("<empty>"));

/// A hash of the API subset contributing to one exported name.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct NameHash {
    pub name: String,
    pub scope: UseScope,
    pub hash: u64,
}

/// The recorded outcome of analyzing one top-level class.
#[derive(Debug, Clone)]
pub struct AnalyzedClass {
    pub compilation_timestamp: u64,
    pub name: ClassName,
    api: OnceCell<Companions>,
    pub api_hash: u64,
    pub name_hashes: SmallVec<[NameHash; 8]>,
    pub has_macro: bool,
    pub extra_hash: u64,
    /// Origin marker, e.g. the language family the class was compiled from.
    pub provenance: String,
}

impl AnalyzedClass {
    /// Builds the record from a full API payload, computing every hash.
    pub fn of(
        compilation_timestamp: u64,
        name: ClassName,
        companions: Companions,
        provenance: impl Into<String>,
    ) -> AnalyzedClass {
        let api = OnceCell::new();
        let record = AnalyzedClass {
            compilation_timestamp,
            name,
            api_hash: hashing::api_hash(&companions),
            name_hashes: hashing::name_hashes(&companions),
            has_macro: companions.has_macro(),
            extra_hash: hashing::extra_hash(&companions),
            provenance: provenance.into(),
            api,
        };
        let _ = record.api.set(companions);
        record
    }

    /// Rebuilds a record from persisted fields. Hashes are taken as
    /// stored, never recomputed, so a persisted Analysis round-trips even
    /// across hasher revisions.
    #[allow(clippy::too_many_arguments)]
    pub fn restored(
        compilation_timestamp: u64,
        name: ClassName,
        companions: Companions,
        api_hash: u64,
        name_hashes: SmallVec<[NameHash; 8]>,
        has_macro: bool,
        extra_hash: u64,
        provenance: String,
    ) -> AnalyzedClass {
        let api = OnceCell::new();
        let _ = api.set(companions);
        AnalyzedClass {
            compilation_timestamp,
            name,
            api,
            api_hash,
            name_hashes,
            has_macro,
            extra_hash,
            provenance,
        }
    }

    /// The absent-class default: empty API, zero hashes.
    pub fn empty(name: ClassName) -> AnalyzedClass {
        AnalyzedClass {
            compilation_timestamp: 0,
            name,
            api: OnceCell::new(),
            api_hash: 0,
            name_hashes: SmallVec::new(),
            has_macro: false,
            extra_hash: 0,
            provenance: String::new(),
        }
    }

    /// The stored API payload; an empty companion pair when none was
    /// recorded.
    pub fn api(&self) -> &Companions {
        self.api.get().unwrap_or(&EMPTY_COMPANIONS)
    }

    pub fn is_package_module(&self) -> bool {
        self.api.get().is_some_and(Companions::is_package_module)
    }

    /// True when both whole-API fingerprints match.
    pub fn same_api(&self, other: &AnalyzedClass) -> bool {
        self.api_hash == other.api_hash && self.extra_hash == other.extra_hash
    }

    /// True when the two records came from the same language family.
    /// An unknown provenance is treated as matching.
    pub fn same_family(&self, other: &AnalyzedClass) -> bool {
        self.provenance.is_empty()
            || other.provenance.is_empty()
            || self.provenance == other.provenance
    }
}

// An unfilled api cell and a cell filled with the empty payload are the
// same record; equality goes through the accessor.
impl PartialEq for AnalyzedClass {
    fn eq(&self, other: &AnalyzedClass) -> bool {
        self.compilation_timestamp == other.compilation_timestamp
            && self.name == other.name
            && self.api_hash == other.api_hash
            && self.name_hashes == other.name_hashes
            && self.has_macro == other.has_macro
            && self.extra_hash == other.extra_hash
            && self.provenance == other.provenance
            && self.api() == other.api()
    }
}
