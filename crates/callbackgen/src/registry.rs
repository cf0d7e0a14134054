//! Registry of well-known container and handle types.
//!
//! The registry tells the source front-end which fully-qualified Rust paths
//! act as callback storage (`Vec`, maps, `Option`) and which act as shared
//! callback handles (`Arc`, `Rc`). Built-in mappings cover `std`, `alloc`,
//! `hashbrown` and `indexmap`; users can register their own containers.

use std::collections::HashMap;

/// The role a well-known type plays in callback storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KnownType {
    /// Ordered, duplicate-permitting list: `Vec<T>`.
    Sequence,
    /// `Option<T>`
    Optional,
    /// Key-value map with an `entry` API: `HashMap<K, V>`.
    Mapping,
    /// Reference-counted handle with a `ptr_eq` associated function.
    SharedHandle,
    /// Owned string, treated as a built-in.
    Text,
}

/// A registry of fully-qualified Rust type path -> [`KnownType`] associations.
///
/// # Built-in mappings
///
/// | Rust type | Role |
/// |-----------|------|
/// | `std::vec::Vec<T>` | sequence |
/// | `std::option::Option<T>` | optional |
/// | `std::collections::HashMap<K, V>` | mapping |
/// | `std::collections::BTreeMap<K, V>` | mapping |
/// | `hashbrown::HashMap<K, V>` | mapping |
/// | `indexmap::IndexMap<K, V>` | mapping |
/// | `std::sync::Arc<T>` | shared handle |
/// | `std::rc::Rc<T>` | shared handle |
/// | `std::string::String` | built-in text |
///
/// `alloc::` and `core::` spellings are registered alongside the `std::` ones.
///
/// # Custom mappings
///
/// ```
/// # fn main() {
/// use callbackgen::{CodeGenerator, KnownType};
///
/// let mut generator = CodeGenerator::new();
/// generator.register_type("fxhash::FxHashMap", KnownType::Mapping);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    mappings: HashMap<String, KnownType>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl TypeRegistry {
    /// Create an empty registry with no mappings.
    pub fn new() -> Self {
        Self {
            mappings: HashMap::new(),
        }
    }

    /// Create a registry pre-populated with the built-in mappings.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_builtins();
        registry
    }

    /// Register all built-in mappings.
    pub fn register_builtins(&mut self) {
        for root in ["std", "alloc"] {
            self.register(format!("{root}::vec::Vec"), KnownType::Sequence);
            self.register(format!("{root}::string::String"), KnownType::Text);
            self.register(format!("{root}::collections::BTreeMap"), KnownType::Mapping);
            self.register(format!("{root}::sync::Arc"), KnownType::SharedHandle);
            self.register(format!("{root}::rc::Rc"), KnownType::SharedHandle);
        }
        for root in ["std", "core"] {
            self.register(format!("{root}::option::Option"), KnownType::Optional);
        }

        self.register("std::collections::HashMap", KnownType::Mapping);
        self.register("std::collections::hash_map::HashMap", KnownType::Mapping);
        self.register("std::collections::btree_map::BTreeMap", KnownType::Mapping);
        self.register("hashbrown::HashMap", KnownType::Mapping);
        self.register("indexmap::IndexMap", KnownType::Mapping);
        self.register("indexmap::map::IndexMap", KnownType::Mapping);
    }

    /// Register a mapping, replacing any previous one for `path`.
    pub fn register(&mut self, path: impl Into<String>, kind: KnownType) {
        self.mappings.insert(path.into(), kind);
    }

    /// Remove a mapping. Returns the removed role, if any.
    pub fn unregister(&mut self, path: &str) -> Option<KnownType> {
        self.mappings.remove(path)
    }

    /// Look up the role for a fully-qualified path.
    pub fn get(&self, path: &str) -> Option<KnownType> {
        self.mappings.get(path).copied()
    }

    /// Check if a path has a mapping.
    pub fn contains(&self, path: &str) -> bool {
        self.mappings.contains_key(path)
    }
}

/// Names in scope in every module, with the path they stand for.
pub(crate) const PRELUDE: &[(&str, &str)] = &[
    ("Vec", "std::vec::Vec"),
    ("Option", "std::option::Option"),
    ("String", "std::string::String"),
    ("Box", "std::boxed::Box"),
    ("Result", "std::result::Result"),
    ("Send", "std::marker::Send"),
    ("Sync", "std::marker::Sync"),
    ("Sized", "std::marker::Sized"),
];

/// Look up a prelude name.
pub(crate) fn prelude_path(name: &str) -> Option<&'static str> {
    PRELUDE
        .iter()
        .find(|(short, _)| *short == name)
        .map(|(_, path)| *path)
}

/// Built-in scalar types and `str`.
pub(crate) fn is_primitive(name: &str) -> bool {
    matches!(
        name,
        "u8" | "i8"
            | "u16"
            | "i16"
            | "u32"
            | "i32"
            | "u64"
            | "i64"
            | "u128"
            | "i128"
            | "usize"
            | "isize"
            | "f32"
            | "f64"
            | "bool"
            | "char"
            | "str"
    )
}
