//! Core data model of the incremental compilation engine: the relation
//! store, the API model with its hashers, stamps, and the immutable
//! Analysis snapshot with its persisted format.

pub mod analysis;
pub mod api;
pub mod format;
pub mod infos;
pub mod names;
pub mod relations;
pub mod stamps;

pub use analysis::{Analysis, Apis, SourceEntry};
pub use api::{
    api_hash, extra_hash, minimize, name_hashes, AnalyzedClass, ClassLike, Companions,
    DefinitionType, Member, Modifiers, NameHash, Structure,
};
pub use format::FormatError;
pub use infos::{Compilation, Compilations, Problem, Severity, SourceInfo, SourceInfos};
pub use names::{
    BinaryClassName, ClassName, LibraryFile, ProductFile, SourceFile, UseScope, UseScopes,
    UsedName,
};
pub use relations::{
    DependencyContext, ExternalDependency, InternalDependency, LibraryDependency,
    NonLocalProduct, Relation, Relations,
};
pub use stamps::{Stamp, StampReader, Stamps};
