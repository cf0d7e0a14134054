//! Import resolution and type qualification for generated code.
//!
//! Generated code lives in a child module of the target's module, so every
//! reference is rendered in one of four ways:
//!
//! - types defined in the target's module are imported with `use` and named bare;
//! - types the target's module imports are imported the same way, under the
//!   same local name;
//! - prelude types and primitives are named bare;
//! - everything else is written out as an absolute path.
//!
//! Generation walks every type twice. The discovery pass fills an [`ImportSet`]
//! without keeping any text; the render pass must not need anything the
//! discovery pass didn't find.

use crate::types::{GenericArg, Identity, NameOrigin, NamedType, Package, ResolvedType, Signature};
use std::collections::BTreeMap;
use std::fmt;

/// One `use` declaration.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct UseDecl {
    pub path: String,
    /// Set when the local name differs from the last path segment.
    pub alias: Option<String>,
}

impl UseDecl {
    pub fn new(path: impl Into<String>, local: &str) -> Self {
        let path = path.into();
        let last = path.rsplit("::").next().unwrap_or(&path);
        let alias = (last != local).then(|| local.to_string());
        Self { path, alias }
    }

    /// Name the declaration binds.
    pub fn local(&self) -> &str {
        match &self.alias {
            Some(alias) => alias,
            None => self.path.rsplit("::").next().unwrap_or(&self.path),
        }
    }
}

impl fmt::Display for UseDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.alias {
            Some(alias) => write!(f, "use {} as {};", self.path, alias),
            None => write!(f, "use {};", self.path),
        }
    }
}

/// `use` declarations of one generated file, keyed by the name they bind.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportSet {
    by_local: BTreeMap<String, UseDecl>,
}

impl ImportSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `decl`. Fails when its name is already bound to a different path.
    pub fn bind(&mut self, decl: UseDecl) -> bool {
        match self.by_local.get(decl.local()) {
            Some(existing) => existing == &decl,
            None => {
                self.by_local.insert(decl.local().to_string(), decl);
                true
            }
        }
    }

    pub fn contains(&self, decl: &UseDecl) -> bool {
        self.by_local.get(decl.local()) == Some(decl)
    }

    /// Declarations in `self` that `other` lacks.
    pub fn missing_from(&self, other: &ImportSet) -> Vec<String> {
        self.by_local
            .values()
            .filter(|decl| !other.contains(decl))
            .map(ToString::to_string)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.by_local.is_empty()
    }

    /// Declarations sorted by path.
    pub fn sorted(&self) -> Vec<&UseDecl> {
        let mut decls: Vec<_> = self.by_local.values().collect();
        decls.sort();
        decls
    }
}

/// Renders types relative to a target module, recording the imports it relies on.
pub struct Qualifier<'a> {
    package: &'a Package,
    crate_alias: Option<&'a str>,
    imports: &'a mut ImportSet,
}

impl<'a> Qualifier<'a> {
    pub fn new(
        package: &'a Package,
        crate_alias: Option<&'a str>,
        imports: &'a mut ImportSet,
    ) -> Self {
        Self {
            package,
            crate_alias,
            imports,
        }
    }

    /// Render a named type (without its generic arguments).
    pub fn qualify(&mut self, named: &NamedType) -> String {
        let name = named.name();
        if named.origin == NameOrigin::Prelude || named.module().is_none() {
            return name.to_string();
        }

        let path = self.aliased(&named.path);
        if named.module() == Some(self.package.path.as_str()) {
            if self.imports.bind(UseDecl::new(path.clone(), name)) {
                return name.to_string();
            }
        } else if let Some(local) = self.package.alias_for(&named.path) {
            if self.imports.bind(UseDecl::new(path.clone(), local)) {
                return local.to_string();
            }
        }
        path
    }

    /// Render any resolved type.
    pub fn render(&mut self, ty: &ResolvedType) -> String {
        match ty {
            ResolvedType::Primitive(name) | ResolvedType::Param(name) => name.clone(),
            ResolvedType::Opaque(text) => text.clone(),
            ResolvedType::Named(named) => {
                let base = self.qualify(named);
                format!("{base}{}", self.render_args(&named.args))
            }
            ResolvedType::Sequence(elem) => format!("Vec<{}>", self.render(elem)),
            ResolvedType::Optional(inner) => format!("Option<{}>", self.render(inner)),
            ResolvedType::Mapping {
                container,
                key,
                value,
            } => {
                let base = self.qualify(container);
                let key = self.render(key);
                let value = self.render(value);
                format!("{base}<{key}, {value}>")
            }
            ResolvedType::FnPointer(signature) => {
                let for_lifetimes = for_clause(signature);
                let params = signature
                    .params
                    .iter()
                    .map(|param| {
                        let ty = self.render(&param.ty);
                        match &param.name {
                            Some(name) => format!("{name}: {ty}"),
                            None => ty,
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                let output = self.render_output(signature);
                format!("{for_lifetimes}fn({params}){output}")
            }
            ResolvedType::SharedFn {
                handle,
                signature,
                bounds,
            } => {
                let base = self.qualify(handle);
                let for_lifetimes = for_clause(signature);
                let params = signature
                    .params
                    .iter()
                    .map(|param| self.render(&param.ty))
                    .collect::<Vec<_>>()
                    .join(", ");
                let output = self.render_output(signature);
                let bounds: String = bounds.iter().map(|bound| format!(" + {bound}")).collect();
                format!("{base}<dyn {for_lifetimes}Fn({params}){output}{bounds}>")
            }
            ResolvedType::Reference {
                lifetime,
                mutable,
                inner,
            } => {
                let lifetime = lifetime
                    .as_ref()
                    .map(|l| format!("{l} "))
                    .unwrap_or_default();
                let mutability = if *mutable { "mut " } else { "" };
                format!("&{lifetime}{mutability}{}", self.render(inner))
            }
            ResolvedType::Tuple(elems) => {
                let rendered: Vec<_> = elems.iter().map(|elem| self.render(elem)).collect();
                if rendered.len() == 1 {
                    format!("({},)", rendered[0])
                } else {
                    format!("({})", rendered.join(", "))
                }
            }
            ResolvedType::Array { elem, len } => format!("[{}; {len}]", self.render(elem)),
            ResolvedType::Slice(elem) => format!("[{}]", self.render(elem)),
        }
    }

    /// Expression prefix comparing two callbacks by identity: a function taking
    /// the stored element by reference and the needle.
    pub fn identity_check(&mut self, identity: &Identity) -> String {
        match identity {
            Identity::CodeAddress => {
                let local = if self.imports.bind(UseDecl::new("std::ptr", "ptr")) {
                    "ptr"
                } else {
                    "std::ptr"
                };
                format!("{local}::fn_addr_eq")
            }
            Identity::Handle(handle) => format!("{}::ptr_eq", self.qualify(handle)),
        }
    }

    fn render_args(&mut self, args: &[GenericArg]) -> String {
        if args.is_empty() {
            return String::new();
        }
        let rendered: Vec<_> = args
            .iter()
            .map(|arg| match arg {
                GenericArg::Lifetime(lifetime) => lifetime.clone(),
                GenericArg::Type(ty) => self.render(ty),
                GenericArg::Const(text) => text.clone(),
            })
            .collect();
        format!("<{}>", rendered.join(", "))
    }

    fn render_output(&mut self, signature: &Signature) -> String {
        match &signature.output {
            Some(output) => format!(" -> {}", self.render(output)),
            None => String::new(),
        }
    }

    /// Apply the crate alias to a leading `crate` segment.
    fn aliased(&self, path: &str) -> String {
        match (self.crate_alias, path.strip_prefix("crate")) {
            (Some(alias), Some(rest)) if rest.is_empty() || rest.starts_with("::") => {
                format!("{alias}{rest}")
            }
            _ => path.to_string(),
        }
    }
}

fn for_clause(signature: &Signature) -> String {
    if signature.lifetimes.is_empty() {
        String::new()
    } else {
        format!("for<{}> ", signature.lifetimes.join(", "))
    }
}
