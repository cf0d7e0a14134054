//! Rust code generator for observer-style callback fields.

use crate::classifier::classify;
use crate::error::{Diagnostic, Error, Result};
use crate::extractor::SourceModel;
use crate::imports::{ImportSet, Qualifier};
use crate::receiver::ReceiverBinding;
use crate::registry::KnownType;
use crate::resolver::TypeResolver;
use crate::template::{Context, LockPolicy, render_field};
use crate::types::{CallbackField, NamedType, Shape, TargetType};
use convert_case::{Case, Casing};
use std::fs;
use std::io::Write;
use std::path::Path;

const DEFAULT_HEADER: &str = "Code generated by callbackgen; DO NOT EDIT.";

/// Output of a generation run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Generated {
    /// Generated Rust source.
    pub code: String,
    /// Fields and types that were skipped, in the order they were found.
    pub diagnostics: Vec<Diagnostic>,
}

/// Code generator that reads Rust sources and emits `on_*` / `emit_*` /
/// `remove_on_*` methods for their callback fields.
///
/// # Example
///
/// ```no_run
/// # fn main() -> Result<(), callbackgen::Error> {
/// use callbackgen::CodeGenerator;
///
/// let mut generator = CodeGenerator::new();
/// generator.add_source_dir("src/")?;
/// generator.add_type("User").lock_field("mu");
///
/// let generated = generator.write_to_file("src/user/user_callbacks.rs")?;
/// for diagnostic in &generated.diagnostics {
///     println!("cargo:warning={diagnostic}");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct CodeGenerator {
    /// Parsed sources; the default type resolver.
    pub(crate) sources: SourceModel,

    /// Requested target types (bare or module-qualified names)
    targets: Vec<String>,

    /// Lock field used when the type doesn't name one itself
    lock_field: Option<String>,

    lock_policy: LockPolicy,

    /// Replacement for a leading `crate` in emitted paths
    crate_alias: Option<String>,

    /// Custom header comment
    header: Option<String>,
}

/// One target type ready for rendering.
struct Unit {
    target: TargetType,
    fields: Vec<CallbackField>,
    receiver: String,
    lock: Option<String>,
}

impl CodeGenerator {
    /// Create a new code generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a target type by bare (`User`) or module-qualified (`crate::user::User`) name.
    ///
    /// With no target types, every struct marked `#[derive(Callbacks)]` is generated.
    pub fn add_type(&mut self, name: impl Into<String>) -> &mut Self {
        self.targets.push(name.into());
        self
    }

    /// Lock field guarding keyed registration, e.g. a `mu: Mutex<()>` field.
    ///
    /// A type's own `#[callbacks(lock = "...")]` attribute takes precedence.
    pub fn lock_field(&mut self, field: impl Into<String>) -> &mut Self {
        self.lock_field = Some(field.into());
        self
    }

    /// Choose which keyed operations take the lock. Defaults to [`LockPolicy::RegisterOnly`].
    pub fn lock_policy(&mut self, policy: LockPolicy) -> &mut Self {
        self.lock_policy = policy;
        self
    }

    /// Emit `alias::...` instead of `crate::...`, for code compiled in another crate.
    pub fn crate_alias(&mut self, alias: impl Into<String>) -> &mut Self {
        self.crate_alias = Some(alias.into());
        self
    }

    /// Set a custom header comment for the generated file.
    pub fn set_header(&mut self, header: impl Into<String>) -> &mut Self {
        self.header = Some(header.into());
        self
    }

    /// Register a custom container or handle type, e.g. a third-party map.
    pub fn register_type(&mut self, path: impl Into<String>, kind: KnownType) -> &mut Self {
        self.sources.registry.register(path, kind);
        self
    }

    /// Generate code for the scanned sources.
    pub fn generate(&self) -> Result<Generated> {
        self.generate_with(&self.sources)
    }

    /// Generate code from any type resolver.
    pub fn generate_with(&self, resolver: &impl TypeResolver) -> Result<Generated> {
        let names = if self.targets.is_empty() {
            resolver.marked_types()
        } else {
            self.targets.clone()
        };
        if names.is_empty() {
            return Err(Error::NoTargets);
        }

        let receivers = ReceiverBinding::from_operations(resolver.operations());
        let mut diagnostics = Vec::new();
        let mut units = Vec::new();

        for name in &names {
            let target = resolver.resolve(name)?;
            let fields = classify(&target, &mut diagnostics);
            if fields.is_empty() {
                diagnostics.push(Diagnostic::owner(
                    target.path.full(),
                    "no callback fields found; nothing generated",
                ));
                continue;
            }
            tracing::debug!(ty = %target.path, fields = fields.len(), "classified callback fields");

            let lock = self.effective_lock(&target, &mut diagnostics);
            let receiver = receivers.resolve(&target.path);
            units.push(Unit {
                target,
                fields,
                receiver,
                lock,
            });
        }

        // Discovery pass: walk every type the templates render.
        let mut discovered = ImportSet::new();
        for unit in &units {
            let mut q = self.qualifier(&unit.target, &mut discovered);
            discover(unit, &mut q);
        }

        // Render pass.
        let mut used = ImportSet::new();
        let mut blocks = Vec::new();
        for unit in &units {
            let mut q = self.qualifier(&unit.target, &mut used);
            blocks.push(self.render_impl(unit, &mut q)?);
        }

        let missing = used.missing_from(&discovered);
        if !missing.is_empty() {
            return Err(Error::IncompleteImports { missing });
        }

        let mut code = self.render_header();
        if !discovered.is_empty() {
            for decl in discovered.sorted() {
                code.push_str(&decl.to_string());
                code.push('\n');
            }
            code.push('\n');
        }
        code.push_str(&blocks.join("\n"));

        Ok(Generated { code, diagnostics })
    }

    /// Write the generated code to a file, creating parent directories.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<Generated> {
        let path = path.as_ref();
        let generated = self.generate()?;
        let write_err = |source| Error::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        fs::write(path, &generated.code).map_err(write_err)?;
        tracing::debug!(path = %path.display(), "wrote generated callbacks");
        Ok(generated)
    }

    /// Write the generated code to a writer.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<Generated> {
        let generated = self.generate()?;
        writer
            .write_all(generated.code.as_bytes())
            .map_err(Error::Output)?;
        Ok(generated)
    }

    /// Conventional output file name for a type: `User` -> `user_callbacks.rs`.
    pub fn default_output_name(type_name: &str) -> String {
        let name = type_name.rsplit("::").next().unwrap_or(type_name);
        format!("{}_callbacks.rs", name.to_case(Case::Snake))
    }

    fn effective_lock(
        &self,
        target: &TargetType,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<String> {
        let lock = target.lock_field.as_ref().or(self.lock_field.as_ref())?;
        if target.has_field(lock) {
            Some(lock.clone())
        } else {
            diagnostics.push(Diagnostic::owner(
                target.path.full(),
                format!("lock field `{lock}` is not declared on the type; no lock is taken"),
            ));
            None
        }
    }

    fn qualifier<'a>(
        &'a self,
        target: &'a TargetType,
        imports: &'a mut ImportSet,
    ) -> Qualifier<'a> {
        Qualifier::new(&target.package, self.crate_alias.as_deref(), imports)
    }

    fn render_impl(&self, unit: &Unit, q: &mut Qualifier<'_>) -> Result<String> {
        let generics = &unit.target.generics;
        let owner = q.qualify(&owner_type(&unit.target));
        let where_clause = if generics.where_clause.is_empty() {
            String::new()
        } else {
            format!(" {}", generics.where_clause)
        };

        let ctx = Context {
            receiver: &unit.receiver,
            lock: unit.lock.as_deref(),
            policy: self.lock_policy,
        };
        let methods = unit
            .fields
            .iter()
            .map(|field| render_field(field, &ctx, q))
            .collect::<Result<Vec<_>>>()?;

        Ok(format!(
            "#[allow(dead_code)]\nimpl{} {owner}{}{where_clause} {{\n{}}}\n",
            generics.impl_generics,
            generics.type_generics,
            methods.join("\n"),
        ))
    }

    fn render_header(&self) -> String {
        let header = self.header.as_deref().unwrap_or(DEFAULT_HEADER);
        let mut output = String::new();
        for line in header.lines() {
            if line.is_empty() {
                output.push_str("//\n");
            } else {
                output.push_str("// ");
                output.push_str(line);
                output.push('\n');
            }
        }
        output.push('\n');
        output
    }
}

fn owner_type(target: &TargetType) -> NamedType {
    NamedType::at(target.path.full())
}

/// Qualify everything `render_impl` will, in the same order, keeping only the imports.
fn discover(unit: &Unit, q: &mut Qualifier<'_>) {
    q.qualify(&owner_type(&unit.target));
    for field in &unit.fields {
        q.render(&field.callback);
        for param in &field.signature.params {
            q.render(&param.ty);
        }
        q.identity_check(&field.identity);
        if let Shape::KeyedSequence { key, .. } = &field.shape {
            q.render(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FieldDecl, OperationDecl, Param, ResolvedType, Signature, TypePath};

    const USER: &str = r#"
        use std::collections::HashMap;
        use std::sync::Mutex;

        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub struct RequestId(u64);

        pub struct Snapshot;

        pub struct User {
            mu: Mutex<()>,
            name: String,
            snapshot_callbacks: Vec<fn(snapshot: &Snapshot)>,
            message_callbacks: Vec<fn(text: &str)>,
            message_by_request_id_callbacks: HashMap<RequestId, Vec<fn(text: &str)>>,
            patch_callbacks: Vec<fn(a1: i32, b1: i32)>,
            progress_by_id_callbacks: HashMap<u64, Vec<fn(u64)>>,
        }

        impl User {
            pub fn name(&self) -> &str {
                &self.name
            }
        }
    "#;

    fn user_generator() -> CodeGenerator {
        let mut codegen = CodeGenerator::new();
        codegen.add_module_str("crate::user", USER).unwrap();
        codegen.add_type("User");
        codegen
    }

    #[test]
    fn test_generate_user_callbacks() {
        let mut codegen = user_generator();
        codegen.lock_field("mu");
        let generated = codegen.generate().unwrap();
        let code = &generated.code;

        assert!(code.starts_with("// Code generated by callbackgen; DO NOT EDIT.\n\n"));
        assert!(code.contains(concat!(
            "use crate::user::RequestId;\n",
            "use crate::user::Snapshot;\n",
            "use crate::user::User;\n",
            "use std::ptr;\n"
        )));
        assert!(code.contains("#[allow(dead_code)]\nimpl User {\n"));
        assert!(code.contains("pub fn on_snapshot(&mut self, cb: fn(snapshot: &Snapshot)) {"));
        assert!(code.contains("pub fn emit_snapshot(&self, snapshot: &Snapshot) {"));
        assert!(code.contains(
            "pub fn remove_on_message(&mut self, needle: fn(text: &str)) -> bool {"
        ));
        assert!(code.contains(concat!(
            "pub fn on_message_by_request_id(&mut self, request_id: RequestId, ",
            "cb: fn(text: &str)) {"
        )));
        assert!(code.contains("pub fn emit_patch(&self, a1: i32, b1: i32) {"));
        assert!(code.contains("cb(a1, b1);"));
        assert_eq!(code.matches("let _guard = self.mu.lock();").count(), 1);
        assert!(!code.contains("progress"));
    }

    #[test]
    fn test_builtin_key_warning_does_not_stop_generation() {
        let generated = user_generator().generate().unwrap();
        assert_eq!(generated.diagnostics.len(), 1);
        assert_eq!(generated.diagnostics[0].owner, "crate::user::User");
        assert_eq!(
            generated.diagnostics[0].field.as_deref(),
            Some("progress_by_id_callbacks")
        );
        assert!(generated.code.contains("pub fn on_patch("));
    }

    #[test]
    fn test_generation_is_deterministic() {
        let codegen = user_generator();
        let first = codegen.generate().unwrap();
        let second = codegen.generate().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_without_lock_field_no_guard() {
        let code = user_generator().generate().unwrap().code;
        assert!(!code.contains("_guard"));
    }

    #[test]
    fn test_missing_lock_field_warns() {
        let mut codegen = user_generator();
        codegen.lock_field("lock");
        let generated = codegen.generate().unwrap();
        assert!(!generated.code.contains("_guard"));
        assert!(generated
            .diagnostics
            .iter()
            .any(|d| d.message.contains("lock field `lock`")));
    }

    #[test]
    fn test_lock_attribute_wins_over_global() {
        let mut codegen = CodeGenerator::new();
        codegen
            .add_module_str(
                "crate::room",
                r#"
                use callbackgen::Callbacks;
                use std::collections::BTreeMap;

                pub struct Topic(String);

                #[derive(Callbacks)]
                #[callbacks(lock = "guard")]
                pub struct Room {
                    guard: std::sync::Mutex<()>,
                    mu: std::sync::Mutex<()>,
                    post_by_topic_callbacks: BTreeMap<Topic, Vec<fn(&str)>>,
                }
            "#,
            )
            .unwrap();
        codegen.lock_field("mu");
        let code = codegen.generate().unwrap().code;
        assert!(code.contains("impl Room {"));
        assert!(code.contains("let _guard = r.guard.lock();"));
        assert!(code.contains(
            "pub fn on_post_by_topic(r: &mut Self, topic: Topic, cb: fn(&str)) {"
        ));
        assert!(code.contains("pub fn emit_post_by_topic(r: &Self, topic: &Topic, arg0: &str) {"));
    }

    #[test]
    fn test_this_style_receiver() {
        let mut codegen = CodeGenerator::new();
        codegen
            .add_module_str(
                "crate::feed",
                r#"
                pub struct Feed { item_callbacks: Vec<fn(u32)> }
                impl Feed {
                    pub fn len(feed: &Self) -> usize { feed.item_callbacks.len() }
                }
            "#,
            )
            .unwrap();
        codegen.add_type("Feed");
        let code = codegen.generate().unwrap().code;
        assert!(code.contains("pub fn on_item(feed: &mut Self, cb: fn(u32)) {"));
        assert!(code.contains("feed.item_callbacks.push(cb);"));
        assert!(code.contains("pub fn emit_item(feed: &Self, arg0: u32) {"));
    }

    #[test]
    fn test_trailing_helper_keeps_self_receiver() {
        let mut codegen = CodeGenerator::new();
        codegen
            .add_module_str(
                "crate::feed",
                r#"
                pub struct Feed { item_callbacks: Vec<fn(u32)> }
                impl Feed {
                    pub fn len(&self) -> usize { self.item_callbacks.len() }
                    pub fn merge(base: &Self, other: &Self) -> usize { base.len() + other.len() }
                }
            "#,
            )
            .unwrap();
        codegen.add_type("Feed");
        let code = codegen.generate().unwrap().code;
        assert!(code.contains("pub fn on_item(&mut self, cb: fn(u32)) {"));
        assert!(code.contains("pub fn emit_item(&self, arg0: u32) {"));
    }

    #[test]
    fn test_imported_alias_and_foreign_types() {
        let mut codegen = CodeGenerator::new();
        codegen
            .add_module_str(
                "crate::net::peer",
                r#"
                use bytes::BytesMut as Buffer;
                use std::sync::Arc;

                pub struct Peer {
                    data_callbacks: Vec<fn(&Buffer, crate::net::Addr)>,
                    close_callbacks: Vec<Arc<dyn Fn(u16) + Send + Sync>>,
                }
            "#,
            )
            .unwrap();
        codegen
            .add_type("crate::net::peer::Peer")
            .crate_alias("netlib");
        let code = codegen.generate().unwrap().code;

        assert!(code.contains(concat!(
            "use bytes::BytesMut as Buffer;\n",
            "use netlib::net::peer::Peer;\n",
            "use std::ptr;\n",
            "use std::sync::Arc;\n"
        )));
        assert!(code.contains(
            "pub fn emit_data(p: &Self, arg0: &Buffer, arg1: netlib::net::Addr) {"
        ));
        assert!(code.contains("needle: &Arc<dyn Fn(u16) + Send + Sync>) -> bool"));
        assert!(code.contains("retain(|cb| !Arc::ptr_eq(cb, needle));"));
    }

    #[test]
    fn test_marked_types_are_default_targets() {
        let mut codegen = CodeGenerator::new();
        codegen
            .add_module_str(
                "crate::b",
                "#[derive(callbackgen::Callbacks)] pub struct Beta { tick_callbacks: Vec<fn()> }",
            )
            .unwrap();
        codegen
            .add_module_str(
                "crate::a",
                "#[derive(callbackgen::Callbacks)] pub struct Alpha { tick_callbacks: Vec<fn()> }",
            )
            .unwrap();
        let code = codegen.generate().unwrap().code;
        let alpha = code.find("impl Alpha").unwrap();
        let beta = code.find("impl Beta").unwrap();
        assert!(alpha < beta);
        assert!(code.contains("pub fn emit_tick(a: &Self) {"));
        assert!(code.contains("pub fn emit_tick(b: &Self) {"));
    }

    #[test]
    fn test_owned_and_clashing_params_render_valid_emit() {
        let mut codegen = CodeGenerator::new();
        codegen
            .add_module_str(
                "crate::chat",
                r#"
                use std::collections::HashMap;

                pub struct Key(u8);

                pub struct Upstream {
                    text_callbacks: Vec<fn(String)>,
                    tick_callbacks: Vec<fn(u: u32, cb: u32)>,
                    post_by_key_callbacks: HashMap<Key, Vec<fn(callbacks: Vec<u8>)>>,
                }
            "#,
            )
            .unwrap();
        codegen.add_type("Upstream");
        let code = codegen.generate().unwrap().code;

        assert!(code.contains("pub fn emit_text(u: &Self, arg0: String) {"));
        assert!(code.contains("cb(Clone::clone(&arg0));"));
        assert!(code.contains("pub fn emit_tick(u: &Self, arg0: u32, arg1: u32) {"));
        assert!(code.contains("cb(arg0, arg1);"));
        assert!(code.contains("pub fn emit_post_by_key(u: &Self, key: &Key, arg0: Vec<u8>) {"));
        assert!(code.contains("let Some(callbacks) = u.post_by_key_callbacks.get(key) else {"));
    }

    #[test]
    fn test_no_targets_is_an_error() {
        let mut codegen = CodeGenerator::new();
        codegen
            .add_source_str("pub struct Plain { a: u8 }")
            .unwrap();
        assert!(matches!(codegen.generate(), Err(Error::NoTargets)));
    }

    #[test]
    fn test_missing_target_is_an_error() {
        let mut codegen = user_generator();
        codegen.add_type("Ghost");
        assert!(matches!(codegen.generate(), Err(Error::TypeNotFound(name)) if name == "Ghost"));
    }

    #[test]
    fn test_custom_header_and_resolver() {
        struct Fixed(Vec<OperationDecl>);

        impl TypeResolver for Fixed {
            fn resolve(&self, type_name: &str) -> Result<TargetType> {
                let ty = ResolvedType::Sequence(Box::new(ResolvedType::FnPointer(Signature {
                    lifetimes: vec![],
                    params: vec![Param {
                        name: Some("level".into()),
                        ty: ResolvedType::Primitive("u8".into()),
                    }],
                    output: None,
                })));
                Ok(TargetType::new(
                    TypePath::new("crate", type_name),
                    vec![FieldDecl::new("levelCallbacks", ty)],
                ))
            }

            fn operations(&self) -> &[OperationDecl] {
                &self.0
            }
        }

        let mut codegen = CodeGenerator::new();
        codegen
            .add_type("Meter")
            .set_header("Generated for tests.\nDo not edit.");
        let code = codegen.generate_with(&Fixed(vec![])).unwrap().code;
        assert!(code.starts_with("// Generated for tests.\n// Do not edit.\n\n"));
        assert!(code.contains("use crate::Meter;"));
        assert!(code.contains("pub fn on_level(m: &mut Self, cb: fn(level: u8)) {"));
    }

    #[test]
    fn test_write_to_file_and_writer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir
            .path()
            .join("gen")
            .join(CodeGenerator::default_output_name("User"));
        let codegen = user_generator();

        let generated = codegen.write_to_file(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), generated.code);

        let mut buffer = Vec::new();
        codegen.write_to(&mut buffer).unwrap();
        assert_eq!(String::from_utf8(buffer).unwrap(), generated.code);
    }

    #[test]
    fn test_default_output_name() {
        assert_eq!(
            CodeGenerator::default_output_name("User"),
            "user_callbacks.rs"
        );
        assert_eq!(
            CodeGenerator::default_output_name("crate::net::PeerSession"),
            "peer_session_callbacks.rs"
        );
    }
}
