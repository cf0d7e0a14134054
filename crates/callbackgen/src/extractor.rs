//! Source front-end: builds a resolved type model from Rust source files.
//!
//! Files are parsed with `syn` and mapped to module paths (`src/lib.rs` is
//! `crate`, `src/user.rs` and `src/user/mod.rs` are `crate::user`). For each
//! module the front-end records:
//!
//! - `use` items, flattened into a local name -> absolute path table
//!   (`use std::sync::Arc` maps `"Arc"` to `"std::sync::Arc"`, renames map the
//!   alias, `self` / `super` / child-module prefixes are made absolute);
//! - locally declared types and child modules;
//! - structs, with the `#[derive(Callbacks)]` marker and `#[callbacks(..)]` options;
//! - type aliases, expanded when a field's shape is classified;
//! - impl blocks, recorded as operations for receiver inference.
//!
//! Glob imports can't be resolved statically: an unknown single-segment name
//! is assumed to live in the module that mentions it.

use crate::CodeGenerator;
use crate::error::{Error, Result};
use crate::registry::{KnownType, TypeRegistry, is_primitive, prelude_path};
use crate::resolver::TypeResolver;
use crate::types::{
    FieldDecl, GenericArg, Generics, NameOrigin, NamedType, OperationDecl, Package, Param,
    ResolvedType, Signature, TargetType, TypePath, join_path,
};
use quote::ToTokens;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use syn::{
    Attribute, Fields, FnArg, GenericArgument, GenericParam, ImplItem, Item, ItemImpl,
    ItemStruct, Pat, PathArguments, ReturnType, Type, TypeParamBound, UseTree,
};
use walkdir::WalkDir;

/// The fully-qualified derive marker path that selects a struct for generation.
const MARKER: &str = "callbackgen::Callbacks";

/// Alias expansion stops at this depth.
const MAX_ALIAS_DEPTH: usize = 16;

/// Per-module scope built from the module's items.
#[derive(Debug, Default)]
struct ModuleScope {
    /// Local name -> absolute path. Glob imports are not tracked.
    imports: BTreeMap<String, String>,
    /// Child modules declared with `mod`.
    children: BTreeSet<String>,
    /// Types declared in this module (structs, enums, unions, aliases, traits).
    items: BTreeSet<String>,
}

#[derive(Debug)]
struct StructDecl {
    path: TypePath,
    item: ItemStruct,
    marked: bool,
    lock_field: Option<String>,
}

#[derive(Debug)]
struct AliasDecl {
    module: String,
    item: syn::ItemType,
}

/// Resolution context: the module a type is written in and the generic
/// parameters in scope there.
struct Scope<'a> {
    module: &'a str,
    params: &'a [String],
}

///
/// SourceModel
///

/// Resolved model of the scanned sources; the default [`TypeResolver`].
#[derive(Debug, Default)]
pub struct SourceModel {
    pub(crate) registry: TypeRegistry,
    modules: BTreeMap<String, ModuleScope>,
    structs: Vec<StructDecl>,
    /// Non-struct types, for a precise "not a struct" error.
    others: Vec<TypePath>,
    aliases: HashMap<String, AliasDecl>,
    operations: Vec<OperationDecl>,
}

impl SourceModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one file as module `module`.
    pub fn add_module_file(&mut self, module: &str, path: impl AsRef<Path>) -> Result<&mut Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse_source(module, &source, &path.display().to_string())?;
        Ok(self)
    }

    /// Parse one file, deriving its module from the file name:
    /// `lib.rs` / `main.rs` are `crate`, anything else `crate::<stem>`.
    pub fn add_source_file(&mut self, path: impl AsRef<Path>) -> Result<&mut Self> {
        let path = path.as_ref();
        let module = match path.file_stem().and_then(|s| s.to_str()) {
            Some("lib" | "main") | None => "crate".to_string(),
            Some(stem) => format!("crate::{stem}"),
        };
        self.add_module_file(&module, path)
    }

    /// Parse source text as module `module`.
    pub fn add_module_str(&mut self, module: &str, source: &str) -> Result<&mut Self> {
        self.parse_source(module, source, module)?;
        Ok(self)
    }

    /// Parse source text as the crate root.
    pub fn add_source_str(&mut self, source: &str) -> Result<&mut Self> {
        self.add_module_str("crate", source)
    }

    /// Recursively scan a source root (usually `src/`) for `.rs` files.
    ///
    /// Files are visited in sorted order so that repeated runs see
    /// declarations in the same order. Files under `bin/` are skipped.
    pub fn add_source_dir(&mut self, root: impl AsRef<Path>) -> Result<&mut Self> {
        let root = root.as_ref();
        for entry in WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.extension().is_some_and(|e| e == "rs") {
                continue;
            }
            let Ok(relative) = path.strip_prefix(root) else {
                continue;
            };
            if relative.starts_with("bin") {
                continue;
            }
            let module = module_for_relative(relative);
            tracing::debug!(file = %path.display(), %module, "scanning source file");
            self.add_module_file(&module, path)?;
        }
        Ok(self)
    }

    fn parse_source(&mut self, module: &str, source: &str, origin: &str) -> Result<()> {
        let file = syn::parse_file(source).map_err(|source| Error::Parse {
            origin: origin.to_string(),
            source,
        })?;

        // Scopes first: item collection resolves paths against them.
        self.scan_scope(module, &file.items);
        self.scan_items(module, &file.items);
        Ok(())
    }

    /// Record imports, child modules and type names of `module` and its inline children.
    fn scan_scope(&mut self, module: &str, items: &[Item]) {
        let mut raw_imports = Vec::new();
        let mut children = Vec::new();
        let mut names = Vec::new();
        let mut inline = Vec::new();

        for item in items {
            match item {
                Item::Use(item_use) => {
                    collect_imports(
                        &item_use.tree,
                        &[],
                        item_use.leading_colon.is_some(),
                        &mut raw_imports,
                    );
                }
                Item::Mod(item_mod) => {
                    children.push(item_mod.ident.to_string());
                    if let Some((_, content)) = &item_mod.content {
                        inline.push((join_path(module, &item_mod.ident.to_string()), content));
                    }
                }
                Item::Struct(s) => names.push(s.ident.to_string()),
                Item::Enum(e) => names.push(e.ident.to_string()),
                Item::Union(u) => names.push(u.ident.to_string()),
                Item::Type(t) => names.push(t.ident.to_string()),
                Item::Trait(t) => names.push(t.ident.to_string()),
                _ => {}
            }
        }

        let scope = self.modules.entry(module.to_string()).or_default();
        scope.children.extend(children);
        scope.items.extend(names);

        let imports: Vec<_> = raw_imports
            .into_iter()
            .map(|raw| {
                let path = self.absolute(module, &raw.segments, raw.leading_colon, true);
                (raw.local, path)
            })
            .collect();
        let scope = self.modules.entry(module.to_string()).or_default();
        scope.imports.extend(imports);

        for (child, content) in inline {
            self.scan_scope(&child, content);
        }
    }

    /// Record structs, aliases and impl blocks of `module` and its inline children.
    fn scan_items(&mut self, module: &str, items: &[Item]) {
        for item in items {
            match item {
                Item::Struct(s) => {
                    let marked = self.has_marker_derive(module, &s.attrs);
                    self.structs.push(StructDecl {
                        path: TypePath::new(module, s.ident.to_string()),
                        item: s.clone(),
                        marked,
                        lock_field: extract_lock_field(&s.attrs),
                    });
                }
                Item::Enum(e) => self.others.push(TypePath::new(module, e.ident.to_string())),
                Item::Union(u) => self.others.push(TypePath::new(module, u.ident.to_string())),
                Item::Type(t) => {
                    self.aliases.insert(
                        join_path(module, &t.ident.to_string()),
                        AliasDecl {
                            module: module.to_string(),
                            item: t.clone(),
                        },
                    );
                }
                Item::Impl(item_impl) => self.collect_operations(module, item_impl),
                Item::Mod(item_mod) => {
                    if let Some((_, content)) = &item_mod.content {
                        let child = join_path(module, &item_mod.ident.to_string());
                        self.scan_items(&child, content);
                    }
                }
                _ => {}
            }
        }
    }

    /// Record every fn of an impl block as an operation of the implementing type.
    ///
    /// `impl T`, `impl Trait for T` and `impl Trait for &T` all bind to `T`.
    fn collect_operations(&mut self, module: &str, item_impl: &ItemImpl) {
        let self_ty = match &*item_impl.self_ty {
            Type::Reference(reference) => &*reference.elem,
            other => other,
        };
        let Type::Path(type_path) = self_ty else {
            return;
        };
        let Some(last) = type_path.path.segments.last() else {
            return;
        };
        let owner = self.resolve_path(module, &type_path.path).0;
        let owner_name = last.ident.to_string();

        for impl_item in &item_impl.items {
            let ImplItem::Fn(method) = impl_item else {
                continue;
            };
            let receiver = method
                .sig
                .inputs
                .first()
                .and_then(|arg| receiver_ident(arg, &owner_name));
            self.operations.push(OperationDecl {
                owner: owner.clone(),
                name: method.sig.ident.to_string(),
                receiver,
            });
        }
    }

    /// Check if a struct carries the `Callbacks` marker derive.
    ///
    /// Recognizes:
    /// - `#[derive(Callbacks)]` when `use callbackgen::Callbacks` is in scope
    /// - `#[derive(callbackgen::Callbacks)]` or any qualified path ending in `::Callbacks`
    /// - `#[derive(Observed)]` when `use callbackgen::Callbacks as Observed` is in scope
    fn has_marker_derive(&self, module: &str, attrs: &[Attribute]) -> bool {
        let imports = self.modules.get(module).map(|scope| &scope.imports);
        for attr in attrs {
            if attr.path().is_ident("derive")
                && let Ok(nested) = attr.parse_args_with(
                    syn::punctuated::Punctuated::<syn::Path, syn::Token![,]>::parse_terminated,
                )
            {
                for path in nested {
                    if path.segments.len() == 1 {
                        let ident = path.segments[0].ident.to_string();
                        if imports
                            .and_then(|imports| imports.get(&ident))
                            .is_some_and(|p| p == MARKER || p == "callbackgen_derive::Callbacks")
                        {
                            return true;
                        }
                    } else {
                        let qualified = path_string(&path);
                        if qualified == MARKER || qualified.ends_with("::Callbacks") {
                            return true;
                        }
                    }
                }
            }
        }
        false
    }

    /// Make a path written in `module` absolute.
    ///
    /// `use_path` is set for `use` items, whose first segment never refers to
    /// another import of the same module.
    fn absolute(
        &self,
        module: &str,
        segments: &[String],
        leading_colon: bool,
        use_path: bool,
    ) -> String {
        let Some(first) = segments.first() else {
            return String::new();
        };
        if leading_colon || first == "crate" {
            return segments.join("::");
        }

        let rest = &segments[1..];
        let with_rest = |base: &str| {
            rest.iter()
                .fold(base.to_string(), |acc, segment| join_path(&acc, segment))
        };

        if first == "self" {
            return with_rest(module);
        }
        if first == "super" {
            let supers = segments.iter().take_while(|s| *s == "super").count();
            let mut base: Vec<&str> = module.split("::").collect();
            for _ in 0..supers {
                if base.len() > 1 {
                    base.pop();
                }
            }
            return segments[supers..]
                .iter()
                .fold(base.join("::"), |acc, segment| join_path(&acc, segment));
        }

        let scope = self.modules.get(module);
        if !use_path
            && let Some(full) = scope.and_then(|scope| scope.imports.get(first))
        {
            return with_rest(full);
        }
        if scope.is_some_and(|scope| {
            scope.children.contains(first) || scope.items.contains(first)
        }) {
            return with_rest(&join_path(module, first));
        }

        // Extern crate (including `std`).
        segments.join("::")
    }

    /// Resolve a type path written in `module` to its absolute form.
    fn resolve_path(&self, module: &str, path: &syn::Path) -> (String, NameOrigin) {
        let segments: Vec<String> = path.segments.iter().map(|s| s.ident.to_string()).collect();

        if path.leading_colon.is_none() && segments.len() == 1 {
            let name = &segments[0];
            let scope = self.modules.get(module);
            if let Some(full) = scope.and_then(|scope| scope.imports.get(name)) {
                return (full.clone(), NameOrigin::Path);
            }
            if scope.is_some_and(|scope| scope.items.contains(name)) {
                return (join_path(module, name), NameOrigin::Path);
            }
            if let Some(full) = prelude_path(name) {
                return (full.to_string(), NameOrigin::Prelude);
            }
            tracing::debug!(module, %name, "unresolved name assumed local to its module");
            return (join_path(module, name), NameOrigin::Path);
        }

        (
            self.absolute(module, &segments, path.leading_colon.is_some(), false),
            NameOrigin::Path,
        )
    }

    /// Convert a syn type written in `scope` to the resolved model.
    fn resolve_type(&self, ty: &Type, scope: &Scope<'_>, depth: usize) -> ResolvedType {
        match ty {
            Type::Path(type_path) if type_path.qself.is_none() => {
                self.resolve_type_path(&type_path.path, scope, depth)
            }
            Type::Reference(reference) => ResolvedType::Reference {
                lifetime: reference.lifetime.as_ref().map(ToString::to_string),
                mutable: reference.mutability.is_some(),
                inner: Box::new(self.resolve_type(&reference.elem, scope, depth)),
            },
            Type::BareFn(bare_fn) => {
                let params = bare_fn
                    .inputs
                    .iter()
                    .map(|arg| Param {
                        name: arg
                            .name
                            .as_ref()
                            .map(|(ident, _)| ident.to_string())
                            .filter(|name| name != "_"),
                        ty: self.resolve_type(&arg.ty, scope, depth),
                    })
                    .collect();
                ResolvedType::FnPointer(Signature {
                    lifetimes: bound_lifetimes(bare_fn.lifetimes.as_ref()),
                    params,
                    output: self.resolve_output(&bare_fn.output, scope, depth),
                })
            }
            Type::Tuple(tuple) => ResolvedType::Tuple(
                tuple
                    .elems
                    .iter()
                    .map(|elem| self.resolve_type(elem, scope, depth))
                    .collect(),
            ),
            Type::Array(array) => ResolvedType::Array {
                elem: Box::new(self.resolve_type(&array.elem, scope, depth)),
                len: tokens_to_string(&array.len),
            },
            Type::Slice(slice) => {
                ResolvedType::Slice(Box::new(self.resolve_type(&slice.elem, scope, depth)))
            }
            Type::Paren(paren) => self.resolve_type(&paren.elem, scope, depth),
            Type::Group(group) => self.resolve_type(&group.elem, scope, depth),
            other => ResolvedType::Opaque(tokens_to_string(other)),
        }
    }

    fn resolve_type_path(&self, path: &syn::Path, scope: &Scope<'_>, depth: usize) -> ResolvedType {
        let Some(segment) = path.segments.last() else {
            return ResolvedType::Opaque(tokens_to_string(path));
        };

        if path.leading_colon.is_none() && path.segments.len() == 1 {
            let ident = segment.ident.to_string();
            if scope.params.contains(&ident) {
                return ResolvedType::Param(ident);
            }
            let shadowed = self
                .modules
                .get(scope.module)
                .is_some_and(|m| m.items.contains(&ident) || m.imports.contains_key(&ident));
            if is_primitive(&ident) && !shadowed {
                return ResolvedType::Primitive(ident);
            }
            if ident == "Self" {
                return ResolvedType::Opaque(ident);
            }
        }

        let (full, origin) = self.resolve_path(scope.module, path);
        let type_args = collect_type_args(segment);

        match self.registry.get(&full) {
            Some(KnownType::Text) => return ResolvedType::Primitive("String".to_string()),
            Some(KnownType::Sequence) => {
                if let Some(elem) = type_args.first() {
                    return ResolvedType::Sequence(Box::new(self.resolve_type(elem, scope, depth)));
                }
            }
            Some(KnownType::Optional) => {
                if let Some(inner) = type_args.first() {
                    return ResolvedType::Optional(Box::new(self.resolve_type(inner, scope, depth)));
                }
            }
            Some(KnownType::Mapping) => {
                if let [key, value, ..] = type_args.as_slice() {
                    return ResolvedType::Mapping {
                        container: NamedType {
                            origin,
                            ..NamedType::at(full)
                        },
                        key: Box::new(self.resolve_type(key, scope, depth)),
                        value: Box::new(self.resolve_type(value, scope, depth)),
                    };
                }
            }
            Some(KnownType::SharedHandle) => {
                if let [Type::TraitObject(object)] = type_args.as_slice()
                    && let Some((signature, bounds)) = self.fn_bound(&object.bounds, scope, depth)
                {
                    return ResolvedType::SharedFn {
                        handle: NamedType {
                            origin,
                            ..NamedType::at(full)
                        },
                        signature,
                        bounds,
                    };
                }
            }
            None => {}
        }

        let args = self.resolve_generic_args(segment, scope, depth);
        let mut named = NamedType {
            origin,
            ..NamedType::at(full.clone())
        }
        .with_args(args);
        if let Some(target) = self.expand_alias(&full, depth) {
            named = named.aliasing(target);
        }
        ResolvedType::Named(named)
    }

    fn resolve_generic_args(
        &self,
        segment: &syn::PathSegment,
        scope: &Scope<'_>,
        depth: usize,
    ) -> Vec<GenericArg> {
        let PathArguments::AngleBracketed(args) = &segment.arguments else {
            return Vec::new();
        };
        args.args
            .iter()
            .map(|arg| match arg {
                GenericArgument::Lifetime(lifetime) => GenericArg::Lifetime(lifetime.to_string()),
                GenericArgument::Type(ty) => GenericArg::Type(self.resolve_type(ty, scope, depth)),
                other => GenericArg::Const(tokens_to_string(other)),
            })
            .collect()
    }

    /// Expand a non-generic type alias declared anywhere in the scanned sources.
    fn expand_alias(&self, full: &str, depth: usize) -> Option<ResolvedType> {
        let alias = self.aliases.get(full)?;
        if depth >= MAX_ALIAS_DEPTH {
            tracing::warn!(
                alias = full,
                "type alias expansion too deep; left unexpanded"
            );
            return None;
        }
        if !alias.item.generics.params.is_empty() {
            tracing::debug!(alias = full, "generic type alias left unexpanded");
            return None;
        }
        let scope = Scope {
            module: &alias.module,
            params: &[],
        };
        Some(self.resolve_type(&alias.item.ty, &scope, depth + 1))
    }

    /// Extract the signature from a `dyn Fn(..) -> R + Bounds` trait object.
    fn fn_bound(
        &self,
        bounds: &syn::punctuated::Punctuated<TypeParamBound, syn::Token![+]>,
        scope: &Scope<'_>,
        depth: usize,
    ) -> Option<(Signature, Vec<String>)> {
        let mut signature = None;
        let mut extra = Vec::new();
        for bound in bounds {
            match bound {
                TypeParamBound::Trait(trait_bound) => {
                    let last = trait_bound.path.segments.last()?;
                    match (&last.arguments, signature.is_none()) {
                        (PathArguments::Parenthesized(args), true) if last.ident == "Fn" => {
                            let params = args
                                .inputs
                                .iter()
                                .map(|ty| Param {
                                    name: None,
                                    ty: self.resolve_type(ty, scope, depth),
                                })
                                .collect();
                            signature = Some(Signature {
                                lifetimes: bound_lifetimes(trait_bound.lifetimes.as_ref()),
                                params,
                                output: self.resolve_output(&args.output, scope, depth),
                            });
                        }
                        (PathArguments::Parenthesized(_), _) => return None,
                        _ => extra.push(tokens_to_string(trait_bound)),
                    }
                }
                TypeParamBound::Lifetime(lifetime) => extra.push(lifetime.to_string()),
                other => extra.push(tokens_to_string(other)),
            }
        }
        signature.map(|signature| (signature, extra))
    }

    fn resolve_output(
        &self,
        output: &ReturnType,
        scope: &Scope<'_>,
        depth: usize,
    ) -> Option<Box<ResolvedType>> {
        match output {
            ReturnType::Default => None,
            ReturnType::Type(_, ty) => match self.resolve_type(ty, scope, depth) {
                ResolvedType::Tuple(elems) if elems.is_empty() => None,
                resolved => Some(Box::new(resolved)),
            },
        }
    }

    fn find_structs(&self, type_name: &str) -> Vec<&StructDecl> {
        if type_name.contains("::") {
            let qualified = if type_name.starts_with("crate::") {
                type_name.to_string()
            } else {
                format!("crate::{type_name}")
            };
            self.structs
                .iter()
                .filter(|s| {
                    let full = s.path.full();
                    full == type_name || full == qualified
                })
                .collect()
        } else {
            self.structs
                .iter()
                .filter(|s| s.path.name == type_name)
                .collect()
        }
    }

    fn build_target(&self, decl: &StructDecl) -> Result<TargetType> {
        let Fields::Named(named) = &decl.item.fields else {
            return Err(Error::UnsupportedTarget(decl.path.full()));
        };

        let params: Vec<String> = decl
            .item
            .generics
            .params
            .iter()
            .filter_map(|param| match param {
                GenericParam::Type(t) => Some(t.ident.to_string()),
                GenericParam::Const(c) => Some(c.ident.to_string()),
                GenericParam::Lifetime(_) => None,
            })
            .collect();
        let scope = Scope {
            module: &decl.path.module,
            params: &params,
        };

        let fields = named
            .named
            .iter()
            .filter_map(|field| {
                let name = field.ident.as_ref()?.to_string();
                Some(FieldDecl::new(name, self.resolve_type(&field.ty, &scope, 0)))
            })
            .collect();

        let (impl_generics, type_generics, where_clause) = decl.item.generics.split_for_impl();
        let generics = Generics {
            impl_generics: tokens_to_string(&impl_generics),
            type_generics: tokens_to_string(&type_generics),
            where_clause: where_clause.map(tokens_to_string).unwrap_or_default(),
        };

        let imports = self
            .modules
            .get(&decl.path.module)
            .map(|scope| scope.imports.clone())
            .unwrap_or_default();

        Ok(TargetType {
            path: decl.path.clone(),
            package: Package {
                path: decl.path.module.clone(),
                imports,
            },
            generics,
            fields,
            lock_field: decl.lock_field.clone(),
        })
    }
}

impl TypeResolver for SourceModel {
    fn resolve(&self, type_name: &str) -> Result<TargetType> {
        let candidates = self.find_structs(type_name);
        match candidates.as_slice() {
            [decl] => self.build_target(decl),
            [] => {
                let is_other = self.others.iter().any(|other| {
                    other.name == type_name || other.full() == type_name
                });
                if is_other {
                    Err(Error::UnsupportedTarget(type_name.to_string()))
                } else {
                    Err(Error::TypeNotFound(type_name.to_string()))
                }
            }
            many => {
                let mut candidates: Vec<String> = many.iter().map(|s| s.path.full()).collect();
                candidates.sort();
                Err(Error::AmbiguousType {
                    name: type_name.to_string(),
                    candidates,
                })
            }
        }
    }

    fn operations(&self) -> &[OperationDecl] {
        &self.operations
    }

    fn marked_types(&self) -> Vec<String> {
        let mut marked: Vec<String> = self
            .structs
            .iter()
            .filter(|s| s.marked)
            .map(|s| s.path.full())
            .collect();
        marked.sort();
        marked
    }
}

/// A `use` entry before its path is made absolute.
struct RawImport {
    local: String,
    segments: Vec<String>,
    leading_colon: bool,
}

/// Recursively flatten a `UseTree` into import entries.
///
/// `use a::b::{self, C}` yields `b -> a::b` and `C -> a::b::C`.
fn collect_imports(
    tree: &UseTree,
    prefix: &[String],
    leading_colon: bool,
    imports: &mut Vec<RawImport>,
) {
    match tree {
        UseTree::Path(p) => {
            let mut new_prefix = prefix.to_vec();
            new_prefix.push(p.ident.to_string());
            collect_imports(&p.tree, &new_prefix, leading_colon, imports);
        }
        UseTree::Name(n) => {
            let name = n.ident.to_string();
            if name == "self" {
                if let Some(last) = prefix.last() {
                    imports.push(RawImport {
                        local: last.clone(),
                        segments: prefix.to_vec(),
                        leading_colon,
                    });
                }
            } else {
                let mut segments = prefix.to_vec();
                segments.push(name.clone());
                imports.push(RawImport {
                    local: name,
                    segments,
                    leading_colon,
                });
            }
        }
        UseTree::Rename(r) => {
            let alias = r.rename.to_string();
            if alias == "_" {
                return;
            }
            let mut segments = prefix.to_vec();
            if r.ident != "self" {
                segments.push(r.ident.to_string());
            }
            imports.push(RawImport {
                local: alias,
                segments,
                leading_colon,
            });
        }
        UseTree::Glob(_) => {
            // Glob imports can't be resolved statically
        }
        UseTree::Group(g) => {
            for item in &g.items {
                collect_imports(item, prefix, leading_colon, imports);
            }
        }
    }
}

/// Module path for a file relative to the source root.
fn module_for_relative(relative: &Path) -> String {
    let mut segments = vec!["crate".to_string()];
    let components: Vec<String> = relative
        .with_extension("")
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    let count = components.len();
    for (i, component) in components.into_iter().enumerate() {
        let is_last = i + 1 == count;
        if is_last
            && (component == "mod" || (count == 1 && (component == "lib" || component == "main")))
        {
            continue;
        }
        segments.push(component);
    }
    segments.join("::")
}

/// Identifier bound to the receiver of an operation, if it has one.
///
/// `self` receivers yield `"self"`; a first parameter typed `Self`, `&Self`,
/// `&mut Self` or the owner type itself yields its binding name.
fn receiver_ident(arg: &FnArg, owner_name: &str) -> Option<String> {
    match arg {
        FnArg::Receiver(_) => Some("self".to_string()),
        FnArg::Typed(pat_type) => {
            let Pat::Ident(binding) = &*pat_type.pat else {
                return None;
            };
            let ty = match &*pat_type.ty {
                Type::Reference(reference) => &*reference.elem,
                other => other,
            };
            let Type::Path(type_path) = ty else {
                return None;
            };
            let last = type_path.path.segments.last()?;
            (last.ident == "Self" || last.ident == owner_name).then(|| binding.ident.to_string())
        }
    }
}

/// Extract the lock field from `#[callbacks(lock = "mu")]` or `#[callbacks(lock = mu)]`.
fn extract_lock_field(attrs: &[Attribute]) -> Option<String> {
    for attr in attrs {
        if !attr.path().is_ident("callbacks") {
            continue;
        }
        if let Ok(nested) = attr.parse_args_with(
            syn::punctuated::Punctuated::<syn::Meta, syn::Token![,]>::parse_terminated,
        ) {
            for meta in &nested {
                let syn::Meta::NameValue(nv) = meta else {
                    continue;
                };
                if !nv.path.is_ident("lock") {
                    continue;
                }
                match &nv.value {
                    syn::Expr::Lit(syn::ExprLit {
                        lit: syn::Lit::Str(lit),
                        ..
                    }) => return Some(lit.value()),
                    syn::Expr::Path(expr_path) => {
                        if let Some(ident) = expr_path.path.get_ident() {
                            return Some(ident.to_string());
                        }
                    }
                    _ => {}
                }
            }
        }
    }
    None
}

/// Collect all type arguments from a path segment's angle brackets.
fn collect_type_args(segment: &syn::PathSegment) -> Vec<&Type> {
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return vec![];
    };
    args.args
        .iter()
        .filter_map(|arg| match arg {
            GenericArgument::Type(ty) => Some(ty),
            _ => None,
        })
        .collect()
}

fn bound_lifetimes(lifetimes: Option<&syn::BoundLifetimes>) -> Vec<String> {
    lifetimes
        .map(|bound| {
            bound
                .lifetimes
                .iter()
                .filter_map(|param| match param {
                    GenericParam::Lifetime(l) => Some(l.lifetime.to_string()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

fn path_string(path: &syn::Path) -> String {
    path.segments
        .iter()
        .map(|s| s.ident.to_string())
        .collect::<Vec<_>>()
        .join("::")
}

/// Render tokens as compact source text (`Vec < T >` becomes `Vec<T>`).
pub(crate) fn tokens_to_string(tokens: &impl ToTokens) -> String {
    let mut text = tokens.to_token_stream().to_string();
    for (from, to) in [
        (" :: ", "::"),
        (":: ", "::"),
        (" ::", "::"),
        (" ,", ","),
        ("< ", "<"),
        (" <", "<"),
        (" >", ">"),
        ("& '", "&'"),
        ("& ", "&"),
        ("( ", "("),
        (" (", "("),
        (" )", ")"),
        (" ;", ";"),
        (" : ", ": "),
    ] {
        text = text.replace(from, to);
    }
    text
}

impl CodeGenerator {
    /// Parse a single Rust source file and record its types.
    ///
    /// `lib.rs` and `main.rs` are the crate root; any other file becomes
    /// `crate::<file stem>`. Use [`add_module_file`](Self::add_module_file)
    /// to place a file elsewhere.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # fn main() -> Result<(), callbackgen::Error> {
    /// use callbackgen::CodeGenerator;
    ///
    /// let mut generator = CodeGenerator::new();
    /// generator.add_source_file("src/user.rs")?;
    /// generator.add_type("User");
    /// generator.write_to_file("src/user_callbacks.rs")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn add_source_file(&mut self, path: impl AsRef<Path>) -> Result<&mut Self> {
        self.sources.add_source_file(path)?;
        Ok(self)
    }

    /// Parse a single Rust source file as module `module` (e.g. `crate::net::peer`).
    pub fn add_module_file(&mut self, module: &str, path: impl AsRef<Path>) -> Result<&mut Self> {
        self.sources.add_module_file(module, path)?;
        Ok(self)
    }

    /// Parse Rust source from a string as the crate root.
    pub fn add_source_str(&mut self, source: &str) -> Result<&mut Self> {
        self.sources.add_source_str(source)?;
        Ok(self)
    }

    /// Parse Rust source from a string as module `module`.
    pub fn add_module_str(&mut self, module: &str, source: &str) -> Result<&mut Self> {
        self.sources.add_module_str(module, source)?;
        Ok(self)
    }

    /// Recursively scan a source root for `.rs` files.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # fn main() -> Result<(), callbackgen::Error> {
    /// use callbackgen::CodeGenerator;
    ///
    /// let mut generator = CodeGenerator::new();
    /// generator.add_source_dir("src/")?;
    /// generator.write_to_file("src/user_callbacks.rs")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn add_source_dir(&mut self, path: impl AsRef<Path>) -> Result<&mut Self> {
        self.sources.add_source_dir(path)?;
        Ok(self)
    }
}
