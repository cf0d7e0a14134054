//! Receiver name inference.

use crate::types::{OperationDecl, TypePath};
use std::collections::HashMap;

/// Identifier each type's existing operations use for their receiver.
#[derive(Debug, Default, Clone)]
pub struct ReceiverBinding {
    receivers: HashMap<String, String>,
}

impl ReceiverBinding {
    /// Build from operations in declaration order.
    ///
    /// A `self` receiver on any operation wins. Otherwise the last `this`-style
    /// binding seen for the type wins, so a helper like
    /// `fn merge(base: &Self, other: &Self)` only matters for types with no
    /// methods.
    pub fn from_operations(operations: &[OperationDecl]) -> Self {
        let mut receivers: HashMap<String, String> = HashMap::new();
        for op in operations {
            let Some(receiver) = &op.receiver else {
                continue;
            };
            let bound = receivers.get(&op.owner);
            if bound.is_some_and(|bound| bound == "self") {
                continue;
            }
            receivers.insert(op.owner.clone(), receiver.clone());
        }
        Self { receivers }
    }

    /// Receiver identifier for `ty`: `self`, a `this`-style binding, or the
    /// lowercase first letter of the type name when the type has no operations.
    pub fn resolve(&self, ty: &TypePath) -> String {
        if let Some(receiver) = self.receivers.get(&ty.full()) {
            return receiver.clone();
        }
        let fallback: String = ty
            .name
            .chars()
            .next()
            .map(|c| c.to_lowercase().collect())
            .unwrap_or_else(|| "this".to_string());
        tracing::debug!(
            ty = %ty,
            receiver = %fallback,
            "no operations found; using fallback receiver"
        );
        fallback
    }
}
