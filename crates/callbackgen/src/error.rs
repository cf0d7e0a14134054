//! Errors and non-fatal diagnostics.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error as ThisError;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

///
/// Error
///
/// Every variant aborts the whole generation run.
///

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("failed to read `{}`: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse `{origin}`: {source}")]
    Parse {
        origin: String,
        #[source]
        source: syn::Error,
    },

    #[error("type `{0}` not found in the scanned sources")]
    TypeNotFound(String),

    #[error("type `{name}` is ambiguous; candidates: {}", candidates.join(", "))]
    AmbiguousType {
        name: String,
        candidates: Vec<String>,
    },

    #[error("type `{0}` is not a struct with named fields")]
    UnsupportedTarget(String),

    #[error(
        "no target types: add one with `add_type` or mark a struct with `#[derive(Callbacks)]`"
    )]
    NoTargets,

    #[error("field `{owner}.{field}` reached synthesis with an unrecognized shape: {reason}")]
    UnrecognizedShape {
        owner: String,
        field: String,
        reason: String,
    },

    #[error("import discovery missed {}", missing.join(", "))]
    IncompleteImports { missing: Vec<String> },

    #[error("failed to write `{}`: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write generated output: {0}")]
    Output(#[source] io::Error),
}

///
/// Diagnostic
///
/// A non-fatal finding; the affected field is skipped and generation goes on.
///

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    /// Full path of the type the finding belongs to.
    pub owner: String,
    /// Field the finding belongs to, if any.
    pub field: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub(crate) fn field(
        owner: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let diagnostic = Self {
            owner: owner.into(),
            field: Some(field.into()),
            message: message.into(),
        };
        tracing::warn!("{diagnostic}");
        diagnostic
    }

    pub(crate) fn owner(owner: impl Into<String>, message: impl Into<String>) -> Self {
        let diagnostic = Self {
            owner: owner.into(),
            field: None,
            message: message.into(),
        };
        tracing::warn!("{diagnostic}");
        diagnostic
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{}.{}: {}", self.owner, field, self.message),
            None => write!(f, "{}: {}", self.owner, self.message),
        }
    }
}
