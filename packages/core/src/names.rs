// Names
//
// Identifier newtypes shared by the relation store, the API model and the
// engine: source files, products, libraries, source-level and binary class
// names, and the use-scope tagging for referenced names.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel appended to a class name to form its companion-singleton name.
pub const COMPANION_SUFFIX: char = '$';

macro_rules! name_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

name_type! {
    /// Opaque reference to an input source (path-like).
    SourceFile
}

name_type! {
    /// Opaque reference to an emitted class file.
    ProductFile
}

name_type! {
    /// Reference to a classpath artifact, a jar or an external class file.
    LibraryFile
}

name_type! {
    /// The compiled, flattened class name as it appears inside a class file.
    BinaryClassName
}

/// A fully-qualified source-level class name.
///
/// A companion singleton is encoded by appending [`COMPANION_SUFFIX`]; both
/// forms are preserved wherever the engine stores names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassName(String);

impl ClassName {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The companion-singleton form of this name.
    pub fn companion(&self) -> ClassName {
        let mut name = self.0.clone();
        name.push(COMPANION_SUFFIX);
        ClassName(name)
    }

    pub fn is_companion_form(&self) -> bool {
        self.0.ends_with(COMPANION_SUFFIX)
    }

    /// The name with a trailing companion sentinel stripped, if present.
    pub fn base_form(&self) -> ClassName {
        match self.0.strip_suffix(COMPANION_SUFFIX) {
            Some(base) => ClassName(base.to_string()),
            None => self.clone(),
        }
    }
}

impl fmt::Display for ClassName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClassName {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ClassName {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// The syntactic role of an unqualified name reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UseScope {
    /// A plain reference.
    Default,
    /// A reference resolved through implicit search.
    Implicit,
    /// The target of a pattern match.
    PatternTarget,
}

impl UseScope {
    pub const ALL: [UseScope; 3] = [UseScope::Default, UseScope::Implicit, UseScope::PatternTarget];

    pub fn mask(self) -> UseScopes {
        match self {
            UseScope::Default => UseScopes::DEFAULT,
            UseScope::Implicit => UseScopes::IMPLICIT,
            UseScope::PatternTarget => UseScopes::PATTERN_TARGET,
        }
    }
}

bitflags! {
    /// A set of [`UseScope`]s attached to one referenced name.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct UseScopes: u8 {
        const DEFAULT = 1 << 0;
        const IMPLICIT = 1 << 1;
        const PATTERN_TARGET = 1 << 2;
    }
}

impl UseScopes {
    pub fn contains_scope(self, scope: UseScope) -> bool {
        self.contains(scope.mask())
    }
}

impl From<UseScope> for UseScopes {
    fn from(scope: UseScope) -> Self {
        scope.mask()
    }
}

/// An unqualified identifier referenced by a class, tagged with the scopes
/// it was used under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UsedName {
    pub name: String,
    pub scopes: UseScopes,
}

impl UsedName {
    pub fn new(name: impl Into<String>, scopes: UseScopes) -> Self {
        Self { name: name.into(), scopes }
    }

    /// Canonical textual form, `<scope bits in hex>:<name>`.
    pub fn encode(&self) -> String {
        format!("{:02x}:{}", self.scopes.bits(), self.name)
    }

    /// Inverse of [`UsedName::encode`]. Returns `None` on a malformed payload.
    pub fn decode(encoded: &str) -> Option<UsedName> {
        let (bits, name) = encoded.split_once(':')?;
        let bits = u8::from_str_radix(bits, 16).ok()?;
        let scopes = UseScopes::from_bits(bits)?;
        Some(UsedName { name: name.to_string(), scopes })
    }
}

impl Serialize for UsedName {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for UsedName {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        UsedName::decode(&encoded)
            .ok_or_else(|| serde::de::Error::custom(format!("malformed used name: {encoded}")))
    }
}
