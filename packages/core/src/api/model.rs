// API Model
//
// A hashing-oriented representation of a class-like definition: enough
// structure to fingerprint the public API and the per-name contributions,
// never enough to type-check.

use serde::{Deserialize, Serialize};

/// The flavor of a top-level definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DefinitionType {
    /// A plain class.
    ClassDef,
    /// A singleton object definition.
    ModuleDef,
    /// A trait or interface.
    Trait,
    /// A package-level scoping object.
    PackageModule,
}

/// Member modifiers that contribute to hashing decisions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Modifiers {
    pub is_private: bool,
    pub is_implicit: bool,
    pub is_sealed: bool,
}

/// One member of a class-like definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Member {
    pub name: String,
    pub modifiers: Modifiers,
    /// An opaque rendering of the member's type signature.
    pub signature: String,
}

impl Member {
    pub fn new(name: impl Into<String>, signature: impl Into<String>) -> Member {
        Member {
            name: name.into(),
            modifiers: Modifiers::default(),
            signature: signature.into(),
        }
    }

    pub fn private(mut self) -> Member {
        self.modifiers.is_private = true;
        self
    }

    pub fn implicit(mut self) -> Member {
        self.modifiers.is_implicit = true;
        self
    }
}

/// The structural part of a definition: parents in linearization order,
/// declared members, inherited members.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Structure {
    pub parents: Vec<String>,
    pub declared: Vec<Member>,
    pub inherited: Vec<Member>,
}

/// A top-level class-like definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassLike {
    pub name: String,
    pub definition_type: DefinitionType,
    pub modifiers: Modifiers,
    pub has_macro: bool,
    pub structure: Structure,
    /// Known direct children of a sealed definition.
    pub child_types: Vec<String>,
}

impl ClassLike {
    pub fn new(name: impl Into<String>, definition_type: DefinitionType) -> ClassLike {
        ClassLike {
            name: name.into(),
            definition_type,
            modifiers: Modifiers::default(),
            has_macro: false,
            structure: Structure::default(),
            child_types: Vec::new(),
        }
    }

    pub fn is_trait(&self) -> bool {
        self.definition_type == DefinitionType::Trait
    }

    pub fn is_package_module(&self) -> bool {
        self.definition_type == DefinitionType::PackageModule
    }

    /// The unqualified name of this definition.
    pub fn simple_name(&self) -> &str {
        simple_name_of(&self.name)
    }
}

/// A class-like and an object-like definition paired under one name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Companions {
    pub class_like: ClassLike,
    pub object_like: Option<ClassLike>,
}

impl Companions {
    pub fn of(class_like: ClassLike) -> Companions {
        Companions { class_like, object_like: None }
    }

    pub fn paired(class_like: ClassLike, object_like: ClassLike) -> Companions {
        Companions { class_like, object_like: Some(object_like) }
    }

    pub fn empty(name: impl Into<String>) -> Companions {
        Companions::of(ClassLike::new(name, DefinitionType::ClassDef))
    }

    pub fn sides(&self) -> impl Iterator<Item = &ClassLike> {
        std::iter::once(&self.class_like).chain(self.object_like.as_ref())
    }

    pub fn has_macro(&self) -> bool {
        self.sides().any(|side| side.has_macro)
    }

    pub fn is_package_module(&self) -> bool {
        self.sides().any(ClassLike::is_package_module)
    }
}

/// The last dot-separated segment of a qualified name, with a trailing
/// companion sentinel stripped.
pub fn simple_name_of(qualified: &str) -> &str {
    let base = qualified.strip_suffix(crate::names::COMPANION_SUFFIX).unwrap_or(qualified);
    base.rsplit('.').next().unwrap_or(base)
}
