//! Type model shared by the front-end, the classifier and the synthesizer.

use std::collections::BTreeMap;
use std::fmt;

/// Module-qualified identity of a declared type.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypePath {
    /// Absolute module path, e.g. `crate::user`.
    pub module: String,
    pub name: String,
}

impl TypePath {
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
        }
    }

    /// `module::Name`
    pub fn full(&self) -> String {
        join_path(&self.module, &self.name)
    }
}

impl fmt::Display for TypePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full())
    }
}

/// Join a module path and a name using `::`.
pub(crate) fn join_path(module: &str, name: &str) -> String {
    if module.is_empty() {
        name.to_string()
    } else {
        format!("{module}::{name}")
    }
}

/// How a named type entered scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NameOrigin {
    /// Always in scope: `Option`, `Result`, `Box`, `Send`, ...
    Prelude,
    /// Resolved to an absolute path.
    Path,
}

/// A reference to a declared (named) type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamedType {
    /// Absolute path, e.g. `crate::user::RequestId` or `std::sync::Arc`.
    /// For prelude names this is the bare name.
    pub path: String,
    pub args: Vec<GenericArg>,
    pub origin: NameOrigin,
    /// Expansion of the type alias this path names, if any.
    pub alias_of: Option<Box<ResolvedType>>,
}

impl NamedType {
    pub fn at(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            args: Vec::new(),
            origin: NameOrigin::Path,
            alias_of: None,
        }
    }

    pub fn prelude(name: impl Into<String>) -> Self {
        Self {
            origin: NameOrigin::Prelude,
            ..Self::at(name)
        }
    }

    #[must_use]
    pub fn with_args(mut self, args: Vec<GenericArg>) -> Self {
        self.args = args;
        self
    }

    #[must_use]
    pub fn aliasing(mut self, target: ResolvedType) -> Self {
        self.alias_of = Some(Box::new(target));
        self
    }

    /// Last path segment.
    pub fn name(&self) -> &str {
        self.path.rsplit("::").next().unwrap_or(&self.path)
    }

    /// Path without the last segment; `None` for single-segment paths.
    pub fn module(&self) -> Option<&str> {
        self.path.rsplit_once("::").map(|(module, _)| module)
    }
}

/// A generic argument of a named type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GenericArg {
    Lifetime(String),
    Type(ResolvedType),
    Const(String),
}

/// One callback parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Param {
    /// `None` for unnamed (`dyn Fn(u32)`) or `_` parameters.
    pub name: Option<String>,
    pub ty: ResolvedType,
}

/// A callable signature: bare `fn(..)` pointers and `dyn Fn(..)` bounds.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Signature {
    /// Higher-ranked lifetimes, from `for<'a>`.
    pub lifetimes: Vec<String>,
    pub params: Vec<Param>,
    pub output: Option<Box<ResolvedType>>,
}

impl Signature {
    /// Parameter names, with `arg{i}` standing in for unnamed ones.
    pub fn param_names(&self) -> Vec<String> {
        self.params
            .iter()
            .enumerate()
            .map(|(i, p)| p.name.clone().unwrap_or_else(|| format!("arg{i}")))
            .collect()
    }
}

/// The front-end's resolved view of a type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolvedType {
    /// Built-in scalar or `str` / `String`.
    Primitive(String),
    /// Generic parameter of the enclosing type.
    Param(String),
    Named(NamedType),
    /// `Vec<T>`
    Sequence(Box<ResolvedType>),
    /// `HashMap<K, V>`, `BTreeMap<K, V>`, `IndexMap<K, V>`
    Mapping {
        container: NamedType,
        key: Box<ResolvedType>,
        value: Box<ResolvedType>,
    },
    /// `Option<T>`
    Optional(Box<ResolvedType>),
    /// `fn(a: A) -> R`
    FnPointer(Signature),
    /// `Arc<dyn Fn(A) -> R + Send + Sync>` and the `Rc` equivalent.
    SharedFn {
        handle: NamedType,
        signature: Signature,
        /// Extra trait-object bounds, e.g. `Send`, `'static`.
        bounds: Vec<String>,
    },
    Reference {
        lifetime: Option<String>,
        mutable: bool,
        inner: Box<ResolvedType>,
    },
    Tuple(Vec<ResolvedType>),
    Array {
        elem: Box<ResolvedType>,
        len: String,
    },
    Slice(Box<ResolvedType>),
    /// Anything the model does not look into, kept as source text.
    Opaque(String),
}

impl ResolvedType {
    pub fn named(path: impl Into<String>) -> Self {
        Self::Named(NamedType::at(path))
    }

    /// Follow type-alias expansions down to the aliased type.
    pub fn peel(&self) -> &Self {
        let mut ty = self;
        while let Self::Named(NamedType {
            alias_of: Some(target),
            ..
        }) = ty
        {
            ty = target.as_ref();
        }
        ty
    }

    /// Whether this is a built-in type that cannot key a callback mapping.
    pub fn is_builtin(&self) -> bool {
        matches!(self, Self::Primitive(_))
    }
}

/// Declared field: one declaration may name several identifiers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDecl {
    pub names: Vec<String>,
    pub ty: ResolvedType,
}

impl FieldDecl {
    pub fn new(name: impl Into<String>, ty: ResolvedType) -> Self {
        Self {
            names: vec![name.into()],
            ty,
        }
    }
}

/// The module a target type lives in, with its import table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Package {
    /// Absolute module path, e.g. `crate::user`.
    pub path: String,
    /// Local name -> absolute path, from the module's `use` items.
    pub imports: BTreeMap<String, String>,
}

impl Package {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            imports: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_import(mut self, local: impl Into<String>, path: impl Into<String>) -> Self {
        self.imports.insert(local.into(), path.into());
        self
    }

    /// Local name under which this module imports `path`.
    pub fn alias_for(&self, path: &str) -> Option<&str> {
        self.imports
            .iter()
            .find(|(_, full)| full.as_str() == path)
            .map(|(local, _)| local.as_str())
    }
}

/// Generics of the target type, as source text split for an `impl` header.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Generics {
    /// `<T: Clone>`
    pub impl_generics: String,
    /// `<T>`
    pub type_generics: String,
    /// `where T: Send`
    pub where_clause: String,
}

/// A type selected for generation, as supplied by a [`TypeResolver`](crate::TypeResolver).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetType {
    pub path: TypePath,
    pub package: Package,
    pub generics: Generics,
    pub fields: Vec<FieldDecl>,
    /// Lock field named on the type itself (`#[callbacks(lock = "mu")]`).
    pub lock_field: Option<String>,
}

impl TargetType {
    pub fn new(path: TypePath, fields: Vec<FieldDecl>) -> Self {
        let package = Package::new(path.module.clone());
        Self {
            path,
            package,
            generics: Generics::default(),
            fields,
            lock_field: None,
        }
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields
            .iter()
            .any(|decl| decl.names.iter().any(|n| n == name))
    }
}

/// An existing operation bound to a type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperationDecl {
    /// Full path of the bound type.
    pub owner: String,
    pub name: String,
    /// Identifier of the receiver, `None` for associated functions without one.
    pub receiver: Option<String>,
}

///
/// CallbackField
///

/// How the remove operation compares a needle against registered callbacks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Identity {
    /// Code address of a fn pointer.
    CodeAddress,
    /// Allocation address of a shared handle (`Arc` / `Rc`).
    Handle(NamedType),
}

/// Storage shape of a callback field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Shape {
    /// `Vec<Callback>`
    Sequence,
    /// `Map<Key, Vec<Callback>>`; `lazy` when wrapped in `Option`.
    KeyedSequence { key: ResolvedType, lazy: bool },
}

/// One classified callback field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallbackField {
    pub owner: TypePath,
    /// Storage field identifier, e.g. `snapshot_callbacks`.
    pub field_name: String,
    /// PascalCase event, e.g. `Snapshot`.
    pub event_name: String,
    /// Callback element type as declared.
    pub callback: ResolvedType,
    pub signature: Signature,
    pub identity: Identity,
    pub shape: Shape,
}

impl CallbackField {
    pub fn is_keyed(&self) -> bool {
        matches!(self.shape, Shape::KeyedSequence { .. })
    }

    /// Name of the key type for keyed fields.
    pub fn key_name(&self) -> Option<&str> {
        match &self.shape {
            Shape::KeyedSequence {
                key: ResolvedType::Named(named),
                ..
            } => Some(named.name()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peel_follows_alias_chain() {
        let inner = ResolvedType::Sequence(Box::new(ResolvedType::Primitive("u32".into())));
        let first = ResolvedType::Named(NamedType::at("crate::Inner").aliasing(inner.clone()));
        let outer = ResolvedType::Named(NamedType::at("crate::Outer").aliasing(first));
        assert_eq!(outer.peel(), &inner);
    }

    #[test]
    fn test_named_type_segments() {
        let named = NamedType::at("crate::user::RequestId");
        assert_eq!(named.name(), "RequestId");
        assert_eq!(named.module(), Some("crate::user"));
        assert_eq!(NamedType::prelude("Option").module(), None);
    }

    #[test]
    fn test_param_names_fill_unnamed() {
        let signature = Signature {
            lifetimes: vec![],
            params: vec![
                Param {
                    name: Some("path".into()),
                    ty: ResolvedType::Primitive("str".into()),
                },
                Param {
                    name: None,
                    ty: ResolvedType::Primitive("u64".into()),
                },
            ],
            output: None,
        };
        assert_eq!(signature.param_names(), vec!["path", "arg1"]);
    }

    #[test]
    fn test_package_alias_lookup() {
        let package = Package::new("crate::user")
            .with_import("Buffer", "bytes::BytesMut")
            .with_import("Arc", "std::sync::Arc");
        assert_eq!(package.alias_for("bytes::BytesMut"), Some("Buffer"));
        assert_eq!(package.alias_for("std::rc::Rc"), None);
    }
}
