//! Field classification: turns declared fields into [`CallbackField`]s.
//!
//! A field takes part when its name ends in `_callbacks` (or `Callbacks` for
//! camelCase names). The stem, minus any `_by_<key>` / `By<Key>` infix, is the
//! event name. The field's resolved type then decides the storage shape:
//!
//! | Field type | Shape |
//! |------------|-------|
//! | `Vec<C>` | sequence |
//! | `HashMap<K, Vec<C>>` (or `BTreeMap`, `IndexMap`, ...) | keyed sequence |
//! | `Option<HashMap<K, Vec<C>>>` | keyed sequence, lazily created |
//!
//! where `C` is a `fn(..)` pointer or an `Arc<dyn Fn(..)>` / `Rc<dyn Fn(..)>`
//! handle and `K` is a named type. Fields that carry the suffix but fail these
//! checks are skipped with a [`Diagnostic`].

use crate::error::Diagnostic;
use crate::types::{CallbackField, Identity, ResolvedType, Shape, Signature, TargetType};
use convert_case::{Case, Casing};

const SNAKE_SUFFIX: &str = "_callbacks";
const CAMEL_SUFFIX: &str = "Callbacks";

/// Classify every callback field of `target`, in declaration order.
///
/// Skipped fields are reported through `diagnostics`; fields without the
/// naming suffix are ignored silently.
pub fn classify(target: &TargetType, diagnostics: &mut Vec<Diagnostic>) -> Vec<CallbackField> {
    let owner = target.path.full();
    let mut fields = Vec::new();

    for decl in &target.fields {
        for name in &decl.names {
            let Some(stem) = event_stem(name) else {
                continue;
            };
            if stem.is_empty() {
                diagnostics.push(Diagnostic::field(
                    &owner,
                    name,
                    "field name has no event before the `callbacks` suffix; skipped",
                ));
                continue;
            }

            match classify_field(target, name, stem, &decl.ty) {
                Ok(field) => fields.push(field),
                Err(reason) => {
                    diagnostics.push(Diagnostic::field(&owner, name, format!("{reason}; skipped")))
                }
            }
        }
    }

    fields
}

/// Event stem of a field name, with the suffix and any key infix removed.
///
/// Returns `None` when the name doesn't end in the callbacks suffix.
///
/// ```text
/// snapshot_callbacks                -> snapshot
/// message_by_request_id_callbacks   -> message
/// messageByRequestIDCallbacks       -> message
/// callbacks                         -> (empty)
/// ```
pub fn event_stem(field_name: &str) -> Option<&str> {
    if field_name == "callbacks" {
        return Some("");
    }
    if let Some(stem) = field_name.strip_suffix(SNAKE_SUFFIX) {
        let stem = match stem.find("_by_") {
            Some(at) => &stem[..at],
            None => stem,
        };
        return Some(stem);
    }
    let stem = field_name.strip_suffix(CAMEL_SUFFIX)?;
    Some(strip_camel_key(stem))
}

/// PascalCase event name for a field, if it is a callback field with a non-empty stem.
pub fn event_name(field_name: &str) -> Option<String> {
    event_stem(field_name)
        .filter(|stem| !stem.is_empty())
        .map(|stem| stem.to_case(Case::Pascal))
}

/// Cut `stem` at the first `By` that starts a capitalized word.
fn strip_camel_key(stem: &str) -> &str {
    let bytes = stem.as_bytes();
    let mut from = 0;
    while let Some(offset) = stem[from..].find("By") {
        let at = from + offset;
        if bytes.get(at + 2).is_some_and(u8::is_ascii_uppercase) {
            return &stem[..at];
        }
        from = at + 2;
    }
    stem
}

fn classify_field(
    target: &TargetType,
    name: &str,
    stem: &str,
    ty: &ResolvedType,
) -> Result<CallbackField, String> {
    let (element, shape) = match ty.peel() {
        ResolvedType::Sequence(element) => (element.as_ref(), Shape::Sequence),
        ResolvedType::Mapping { key, value, .. } => keyed(key, value, false)?,
        ResolvedType::Optional(inner) => match inner.peel() {
            ResolvedType::Mapping { key, value, .. } => keyed(key, value, true)?,
            _ => return Err("`Option` must wrap a map of `Vec` callbacks".to_string()),
        },
        _ => {
            return Err(
                "expected `Vec<Callback>` or a map from a named key to `Vec<Callback>`".to_string(),
            );
        }
    };

    let (signature, identity) = callable(element)?;

    Ok(CallbackField {
        owner: target.path.clone(),
        field_name: name.to_string(),
        event_name: stem.to_case(Case::Pascal),
        callback: element.clone(),
        signature,
        identity,
        shape,
    })
}

fn keyed<'a>(
    key: &ResolvedType,
    value: &'a ResolvedType,
    lazy: bool,
) -> Result<(&'a ResolvedType, Shape), String> {
    let ResolvedType::Sequence(element) = value.peel() else {
        return Err("map values must be `Vec<Callback>`".to_string());
    };
    match key {
        ResolvedType::Named(_) => {}
        ResolvedType::Primitive(name) => {
            return Err(format!(
                "map is keyed by built-in type `{name}`; key callbacks by a named type"
            ));
        }
        ResolvedType::Param(name) => {
            return Err(format!(
                "map is keyed by generic parameter `{name}`; key callbacks by a named type"
            ));
        }
        _ => return Err("map key must be a named type".to_string()),
    }
    Ok((
        element.as_ref(),
        Shape::KeyedSequence {
            key: key.clone(),
            lazy,
        },
    ))
}

/// Signature and identity of a callback element type.
fn callable(element: &ResolvedType) -> Result<(Signature, Identity), String> {
    match element.peel() {
        ResolvedType::FnPointer(signature) => Ok((signature.clone(), Identity::CodeAddress)),
        ResolvedType::SharedFn {
            handle, signature, ..
        } => Ok((signature.clone(), Identity::Handle(handle.clone()))),
        ResolvedType::Named(named) if named.name() == "Box" => Err(
            "boxed callbacks can't be compared for removal; use `fn` pointers or `Arc<dyn Fn>`"
                .to_string(),
        ),
        ResolvedType::Named(named) if matches!(named.name(), "Arc" | "Rc") => {
            Err(format!("`{}` callbacks must be `dyn Fn(..)`", named.name()))
        }
        _ => Err("callbacks must be `fn` pointers or `Arc<dyn Fn>` / `Rc<dyn Fn>`".to_string()),
    }
}
