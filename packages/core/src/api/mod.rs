// API Module
//
// The class-API model the engine stores per analyzed class, and the
// hashers that reduce an API to comparable fingerprints.

pub mod analyzed;
pub mod hashing;
pub mod model;

pub use analyzed::{AnalyzedClass, NameHash};
pub use hashing::{api_hash, extra_hash, minimize, name_hashes};
pub use model::{ClassLike, Companions, DefinitionType, Member, Modifiers, Structure};
