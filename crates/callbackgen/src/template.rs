//! The two method templates: sequence fields and keyed-sequence fields.
//!
//! Both emit three methods per field (`on_*`, `emit_*`, `remove_on_*`). The
//! receiver is `&self` / `&mut self` when the type's other methods use `self`;
//! otherwise the methods are associated functions taking `<ident>: &Self` /
//! `<ident>: &mut Self`.

use crate::error::{Error, Result};
use crate::imports::Qualifier;
use crate::types::{CallbackField, Identity, ResolvedType, Shape, Signature};
use convert_case::{Case, Casing};

/// Which keyed operations take the lock guard.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LockPolicy {
    /// Only `on_*_by_*` locks; emit and remove rely on the caller's discipline.
    #[default]
    RegisterOnly,
    /// Register, emit and remove on keyed fields all lock.
    AllOperations,
}

/// Per-type rendering parameters.
#[derive(Clone, Copy, Debug)]
pub struct Context<'a> {
    /// Receiver identifier, `self` or a `this`-style binding.
    pub receiver: &'a str,
    /// Lock field guarding keyed operations.
    pub lock: Option<&'a str>,
    pub policy: LockPolicy,
}

impl Context<'_> {
    fn by_ref(&self) -> String {
        if self.receiver == "self" {
            "&self".to_string()
        } else {
            format!("{}: &Self", self.receiver)
        }
    }

    fn by_mut(&self) -> String {
        if self.receiver == "self" {
            "&mut self".to_string()
        } else {
            format!("{}: &mut Self", self.receiver)
        }
    }

    fn guard(&self, register: bool) -> String {
        match self.lock {
            Some(lock) if register || self.policy == LockPolicy::AllOperations => {
                format!("        let _guard = {}.{lock}.lock();\n", self.receiver)
            }
            _ => String::new(),
        }
    }
}

/// Render the three methods for `field`.
pub fn render_field(
    field: &CallbackField,
    ctx: &Context<'_>,
    q: &mut Qualifier<'_>,
) -> Result<String> {
    match &field.shape {
        Shape::Sequence => Ok(render_sequence(field, ctx, q)),
        Shape::KeyedSequence {
            key: ResolvedType::Named(_),
            lazy,
        } => Ok(render_keyed(field, *lazy, ctx, q)),
        Shape::KeyedSequence { .. } => Err(Error::UnrecognizedShape {
            owner: field.owner.full(),
            field: field.field_name.clone(),
            reason: "keyed shape without a named key type".to_string(),
        }),
    }
}

/// Identifiers the method bodies bind themselves.
const BODY_BINDINGS: &[&str] = &["_", "_guard", "cb", "callbacks", "needle", "before", "map"];

/// Parts shared by both templates.
struct Parts {
    event: String,
    callback: String,
    /// `name: Type` list for emit.
    params: String,
    /// Argument list passed to each callback.
    args: String,
    /// `let _ = ` when callbacks return a value.
    discard: &'static str,
    needle: String,
    /// Retain predicate keeping everything but `needle`.
    keep: String,
    identity_doc: &'static str,
}

impl Parts {
    /// `taken` lists the identifiers the emit signature already binds.
    fn new(field: &CallbackField, taken: &[&str], q: &mut Qualifier<'_>) -> Self {
        let callback = q.render(&field.callback);
        let names = emit_param_names(&field.signature, taken);
        let params = names
            .iter()
            .zip(&field.signature.params)
            .map(|(name, param)| format!(", {name}: {}", q.render(&param.ty)))
            .collect();
        let args = names
            .iter()
            .zip(&field.signature.params)
            .map(|(name, param)| {
                if passes_by_copy(&param.ty) {
                    name.clone()
                } else {
                    format!("Clone::clone(&{name})")
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        let check = q.identity_check(&field.identity);
        let (needle, keep, identity_doc) = match &field.identity {
            Identity::CodeAddress => (
                callback.clone(),
                format!("|cb| !{check}(*cb, needle)"),
                "Callbacks compare by code address; closures from the same code are equal.",
            ),
            Identity::Handle(_) => (
                format!("&{callback}"),
                format!("|cb| !{check}(cb, needle)"),
                "Callbacks compare by handle: pass a clone of the handle that was registered.",
            ),
        };
        Self {
            event: field.event_name.to_case(Case::Snake),
            callback,
            params,
            args,
            discard: if field.signature.output.is_some() {
                "let _ = "
            } else {
                ""
            },
            needle,
            keep,
            identity_doc,
        }
    }
}

/// Parameter names for emit, with names that would clash with `taken`, the
/// body's own bindings or each other replaced by `argN`.
fn emit_param_names(signature: &Signature, taken: &[&str]) -> Vec<String> {
    let declared = signature.param_names();
    let mut names: Vec<String> = Vec::with_capacity(declared.len());
    for (i, name) in declared.iter().enumerate() {
        let clashes = |candidate: &str, names: &[String]| {
            taken.iter().any(|t| *t == candidate)
                || BODY_BINDINGS.iter().any(|b| *b == candidate)
                || names.iter().any(|n| n == candidate)
                || declared[i + 1..].iter().any(|n| n == candidate)
        };
        if !clashes(name.as_str(), names.as_slice()) {
            names.push(name.clone());
            continue;
        }
        let mut candidate = format!("arg{i}");
        while clashes(candidate.as_str(), names.as_slice()) {
            candidate.push('_');
        }
        names.push(candidate);
    }
    names
}

/// Whether an emit argument can be handed to every callback as is.
///
/// References reborrow and scalars copy; anything else is cloned per call.
fn passes_by_copy(ty: &ResolvedType) -> bool {
    match ty.peel() {
        ResolvedType::Reference { .. } | ResolvedType::FnPointer(_) => true,
        ResolvedType::Primitive(name) => name != "String",
        ResolvedType::Tuple(elems) => elems.iter().all(passes_by_copy),
        ResolvedType::Array { elem, .. } => passes_by_copy(elem),
        _ => false,
    }
}

fn render_sequence(field: &CallbackField, ctx: &Context<'_>, q: &mut Qualifier<'_>) -> String {
    let p = Parts::new(field, &[ctx.receiver], q);
    let recv = ctx.receiver;
    let storage = format!("{recv}.{}", field.field_name);
    let event_name = &field.event_name;

    let mut out = String::new();
    out.push_str(&format!(
        "    /// Registers `cb` for `{event_name}` events.\n\
         \x20   pub fn on_{event}({by_mut}, cb: {callback}) {{\n\
         \x20       {storage}.push(cb);\n\
         \x20   }}\n\n",
        event = p.event,
        by_mut = ctx.by_mut(),
        callback = p.callback,
    ));
    out.push_str(&format!(
        "    /// Calls every `{event_name}` callback in registration order.\n\
         \x20   pub fn emit_{event}({by_ref}{params}) {{\n\
         \x20       for cb in &{storage} {{\n\
         \x20           {discard}cb({args});\n\
         \x20       }}\n\
         \x20   }}\n\n",
        event = p.event,
        by_ref = ctx.by_ref(),
        params = p.params,
        discard = p.discard,
        args = p.args,
    ));
    out.push_str(&format!(
        "    /// Removes every `{event_name}` callback identical to `needle` and\n\
         \x20   /// returns whether there was one.\n\
         \x20   ///\n\
         \x20   /// {identity_doc}\n\
         \x20   pub fn remove_on_{event}({by_mut}, needle: {needle}) -> bool {{\n\
         \x20       let before = {storage}.len();\n\
         \x20       {storage}.retain({keep});\n\
         \x20       {storage}.len() != before\n\
         \x20   }}\n",
        identity_doc = p.identity_doc,
        event = p.event,
        by_mut = ctx.by_mut(),
        needle = p.needle,
        keep = p.keep,
    ));
    out
}

fn render_keyed(
    field: &CallbackField,
    lazy: bool,
    ctx: &Context<'_>,
    q: &mut Qualifier<'_>,
) -> String {
    let Shape::KeyedSequence { key, .. } = &field.shape else {
        return String::new();
    };
    let key_name = field.key_name().unwrap_or("Key");

    let mut key_param = key_name.to_case(Case::Snake);
    if key_param == ctx.receiver
        || BODY_BINDINGS.iter().any(|b| *b == key_param)
        || field.signature.param_names().contains(&key_param)
    {
        key_param = "key".to_string();
    }

    let p = Parts::new(field, &[ctx.receiver, key_param.as_str()], q);
    let key_ty = q.render(key);
    let method = format!("{}_by_{}", p.event, key_name.to_case(Case::Snake));

    let recv = ctx.receiver;
    let storage = format!("{recv}.{}", field.field_name);
    let (entry, lookup, lookup_mut) = if lazy {
        (
            format!("{storage}.get_or_insert_with(Default::default)"),
            format!("{storage}.as_ref().and_then(|map| map.get({key_param}))"),
            format!("{storage}.as_mut().and_then(|map| map.get_mut({key_param}))"),
        )
    } else {
        (
            storage.clone(),
            format!("{storage}.get({key_param})"),
            format!("{storage}.get_mut({key_param})"),
        )
    };
    let event_name = &field.event_name;

    let mut out = String::new();
    out.push_str(&format!(
        "    /// Registers `cb` for `{event_name}` events under `{key_param}`.\n\
         \x20   pub fn on_{method}({by_mut}, {key_param}: {key_ty}, cb: {callback}) {{\n\
         {guard}\
         \x20       {entry}.entry({key_param}).or_default().push(cb);\n\
         \x20   }}\n\n",
        by_mut = ctx.by_mut(),
        callback = p.callback,
        guard = ctx.guard(true),
    ));
    out.push_str(&format!(
        "    /// Calls every `{event_name}` callback registered under `{key_param}`, in\n\
         \x20   /// registration order. Does nothing for an unknown key.\n\
         \x20   pub fn emit_{method}({by_ref}, {key_param}: &{key_ty}{params}) {{\n\
         {guard}\
         \x20       let Some(callbacks) = {lookup} else {{\n\
         \x20           return;\n\
         \x20       }};\n\
         \x20       for cb in callbacks {{\n\
         \x20           {discard}cb({args});\n\
         \x20       }}\n\
         \x20   }}\n\n",
        by_ref = ctx.by_ref(),
        params = p.params,
        guard = ctx.guard(false),
        discard = p.discard,
        args = p.args,
    ));
    out.push_str(&format!(
        "    /// Removes every `{event_name}` callback under `{key_param}` identical to\n\
         \x20   /// `needle` and returns whether there was one.\n\
         \x20   ///\n\
         \x20   /// {identity_doc}\n\
         \x20   pub fn remove_on_{method}({by_mut}, {key_param}: &{key_ty}, \
         needle: {needle}) -> bool {{\n\
         {guard}\
         \x20       let Some(callbacks) = {lookup_mut} else {{\n\
         \x20           return false;\n\
         \x20       }};\n\
         \x20       let before = callbacks.len();\n\
         \x20       callbacks.retain({keep});\n\
         \x20       callbacks.len() != before\n\
         \x20   }}\n",
        identity_doc = p.identity_doc,
        by_mut = ctx.by_mut(),
        needle = p.needle,
        guard = ctx.guard(false),
        keep = p.keep,
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imports::ImportSet;
    use crate::types::{NamedType, Package, Param, Signature, TypePath};

    fn field(name: &str, event: &str, shape: Shape, identity: Identity) -> CallbackField {
        let signature = Signature {
            lifetimes: vec![],
            params: vec![Param {
                name: Some("text".into()),
                ty: ResolvedType::Reference {
                    lifetime: None,
                    mutable: false,
                    inner: Box::new(ResolvedType::Primitive("str".into())),
                },
            }],
            output: None,
        };
        let callback = match &identity {
            Identity::CodeAddress => ResolvedType::FnPointer(signature.clone()),
            Identity::Handle(handle) => ResolvedType::SharedFn {
                handle: handle.clone(),
                signature: signature.clone(),
                bounds: vec![],
            },
        };
        CallbackField {
            owner: TypePath::new("crate::user", "User"),
            field_name: name.into(),
            event_name: event.into(),
            callback,
            signature,
            identity,
            shape,
        }
    }

    fn plain(name: &str, event: &str) -> CallbackField {
        field(name, event, Shape::Sequence, Identity::CodeAddress)
    }

    fn keyed_field(name: &str, event: &str, lazy: bool) -> CallbackField {
        field(name, event, keyed(lazy), Identity::CodeAddress)
    }

    fn keyed(lazy: bool) -> Shape {
        Shape::KeyedSequence {
            key: ResolvedType::named("crate::user::RequestId"),
            lazy,
        }
    }

    fn render(field: &CallbackField, ctx: &Context<'_>) -> Result<String> {
        let package = Package::new("crate::user");
        let mut imports = ImportSet::new();
        let mut q = Qualifier::new(&package, None, &mut imports);
        render_field(field, ctx, &mut q)
    }

    const SELF_CTX: Context<'static> = Context {
        receiver: "self",
        lock: Some("mu"),
        policy: LockPolicy::RegisterOnly,
    };

    #[test]
    fn test_sequence_methods() {
        let f = plain("message_callbacks", "Message");
        let code = render(&f, &SELF_CTX).unwrap();

        assert!(code.contains("pub fn on_message(&mut self, cb: fn(text: &str)) {"));
        assert!(code.contains("self.message_callbacks.push(cb);"));
        assert!(code.contains("pub fn emit_message(&self, text: &str) {"));
        assert!(code.contains("for cb in &self.message_callbacks {"));
        assert!(code.contains("cb(text);"));
        assert!(code.contains(
            "pub fn remove_on_message(&mut self, needle: fn(text: &str)) -> bool {"
        ));
        assert!(code.contains(
            "self.message_callbacks.retain(|cb| !ptr::fn_addr_eq(*cb, needle));"
        ));
        assert!(!code.contains("lock()"));
    }

    #[test]
    fn test_keyed_methods_lock_register_only() {
        let f = keyed_field("message_by_request_id_callbacks", "Message", false);
        let code = render(&f, &SELF_CTX).unwrap();

        assert!(code.contains(concat!(
            "pub fn on_message_by_request_id(&mut self, request_id: RequestId, ",
            "cb: fn(text: &str)) {"
        )));
        assert!(code.contains(
            "self.message_by_request_id_callbacks.entry(request_id).or_default().push(cb);"
        ));
        assert!(code.contains(
            "pub fn emit_message_by_request_id(&self, request_id: &RequestId, text: &str) {"
        ));
        assert!(code.contains(
            "let Some(callbacks) = self.message_by_request_id_callbacks.get(request_id) else {"
        ));
        assert!(code.contains(concat!(
            "pub fn remove_on_message_by_request_id(&mut self, request_id: &RequestId, ",
            "needle: fn(text: &str)) -> bool {"
        )));
        assert_eq!(code.matches("let _guard = self.mu.lock();").count(), 1);
    }

    #[test]
    fn test_all_operations_policy_locks_everywhere() {
        let f = keyed_field("message_by_request_id_callbacks", "Message", false);
        let ctx = Context {
            policy: LockPolicy::AllOperations,
            ..SELF_CTX
        };
        let code = render(&f, &ctx).unwrap();
        assert_eq!(code.matches("let _guard = self.mu.lock();").count(), 3);
    }

    #[test]
    fn test_lazy_map_and_this_receiver() {
        let f = keyed_field("message_by_request_id_callbacks", "Message", true);
        let ctx = Context {
            receiver: "this",
            lock: None,
            policy: LockPolicy::RegisterOnly,
        };
        let code = render(&f, &ctx).unwrap();

        assert!(code.contains(
            "pub fn on_message_by_request_id(this: &mut Self, request_id: RequestId"
        ));
        assert!(code.contains(concat!(
            "this.message_by_request_id_callbacks",
            ".get_or_insert_with(Default::default).entry(request_id)"
        )));
        assert!(code.contains(
            "pub fn emit_message_by_request_id(this: &Self, request_id: &RequestId"
        ));
        assert!(code.contains(".as_ref().and_then(|map| map.get(request_id))"));
        assert!(code.contains(".as_mut().and_then(|map| map.get_mut(request_id))"));
        assert!(!code.contains("_guard"));
    }

    #[test]
    fn test_shared_handle_identity() {
        let f = field(
            "message_callbacks",
            "Message",
            Shape::Sequence,
            Identity::Handle(NamedType::at("std::sync::Arc")),
        );
        let code = render(&f, &SELF_CTX).unwrap();
        assert!(code.contains("needle: &std::sync::Arc<dyn Fn(&str)>) -> bool"));
        assert!(code.contains("retain(|cb| !std::sync::Arc::ptr_eq(cb, needle));"));
    }

    #[test]
    fn test_returned_values_are_discarded() {
        let mut f = plain("message_callbacks", "Message");
        f.signature.output = Some(Box::new(ResolvedType::Primitive("bool".into())));
        let code = render(&f, &SELF_CTX).unwrap();
        assert!(code.contains("let _ = cb(text);"));
    }

    fn with_params(mut f: CallbackField, params: &[(&str, ResolvedType)]) -> CallbackField {
        f.signature.params = params
            .iter()
            .map(|(name, ty)| Param {
                name: Some((*name).to_string()),
                ty: ty.clone(),
            })
            .collect();
        f.callback = ResolvedType::FnPointer(f.signature.clone());
        f
    }

    fn prim(name: &str) -> ResolvedType {
        ResolvedType::Primitive(name.into())
    }

    #[test]
    fn test_owned_arguments_are_cloned_per_callback() {
        let f = with_params(
            plain("text_callbacks", "Text"),
            &[
                ("text", prim("String")),
                ("payload", ResolvedType::Sequence(Box::new(prim("u8")))),
                ("snapshot", ResolvedType::named("crate::user::Snapshot")),
                ("count", prim("u32")),
                (
                    "label",
                    ResolvedType::Reference {
                        lifetime: None,
                        mutable: false,
                        inner: Box::new(prim("str")),
                    },
                ),
            ],
        );
        let code = render(&f, &SELF_CTX).unwrap();

        assert!(code.contains(concat!(
            "pub fn emit_text(&self, text: String, payload: Vec<u8>, ",
            "snapshot: Snapshot, count: u32, label: &str) {"
        )));
        assert!(code.contains(concat!(
            "cb(Clone::clone(&text), Clone::clone(&payload), Clone::clone(&snapshot), ",
            "count, label);"
        )));
    }

    #[test]
    fn test_param_names_clashing_with_body_are_renamed() {
        let f = with_params(
            plain("tick_callbacks", "Tick"),
            &[
                ("u", prim("u32")),
                ("cb", prim("u32")),
                ("needle", prim("u32")),
                ("_", prim("u8")),
                ("arg0", prim("u8")),
            ],
        );
        let ctx = Context {
            receiver: "u",
            lock: None,
            policy: LockPolicy::RegisterOnly,
        };
        let code = render(&f, &ctx).unwrap();

        assert!(code.contains(
            "pub fn emit_tick(u: &Self, arg0_: u32, arg1: u32, arg2: u32, arg3: u8, arg0: u8) {"
        ));
        assert!(code.contains("cb(arg0_, arg1, arg2, arg3, arg0);"));
        // The callback type keeps its declared names.
        assert!(code.contains(
            "pub fn on_tick(u: &mut Self, cb: fn(u: u32, cb: u32, needle: u32, _: u8, arg0: u8)) {"
        ));
    }

    #[test]
    fn test_keyed_param_names_avoid_bucket_and_key() {
        let f = with_params(
            keyed_field("post_by_request_id_callbacks", "Post", false),
            &[
                ("callbacks", prim("u32")),
                ("request_id", prim("u64")),
                ("key", prim("u8")),
            ],
        );
        let code = render(&f, &SELF_CTX).unwrap();

        assert!(code.contains(concat!(
            "pub fn emit_post_by_request_id(&self, key: &RequestId, ",
            "arg0: u32, request_id: u64, arg2: u8) {"
        )));
        assert!(code.contains(
            "let Some(callbacks) = self.post_by_request_id_callbacks.get(key) else {"
        ));
        assert!(code.contains("cb(arg0, request_id, arg2);"));
    }

    #[test]
    fn test_keyed_shape_without_named_key_is_fatal() {
        let f = field(
            "message_by_id_callbacks",
            "Message",
            Shape::KeyedSequence {
                key: ResolvedType::Primitive("u64".into()),
                lazy: false,
            },
            Identity::CodeAddress,
        );
        assert!(matches!(render(&f, &SELF_CTX), Err(Error::UnrecognizedShape { .. })));
    }
}
