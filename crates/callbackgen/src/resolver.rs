//! Front-end contract consumed by the engine.

use crate::Result;
use crate::types::{OperationDecl, TargetType};

/// Supplies resolved type information to the classifier.
///
/// [`SourceModel`](crate::SourceModel) implements this on top of `syn`; other
/// front-ends only need to produce [`TargetType`]s with resolved field types.
pub trait TypeResolver {
    /// Look up a target type by bare (`User`) or module-qualified
    /// (`crate::user::User`) name.
    fn resolve(&self, type_name: &str) -> Result<TargetType>;

    /// Every operation bound to any known type, in declaration order.
    fn operations(&self) -> &[OperationDecl];

    /// Full paths of types marked for generation, in a stable order.
    fn marked_types(&self) -> Vec<String> {
        Vec::new()
    }
}
