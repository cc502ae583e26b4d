//! Error taxonomy for configuration resolution.
//!
//! Only conditions that abort a load surface as [`ConfigError`]. Declarations
//! that fail to converge are reported as
//! [`Diagnostic`](crate::resolver::Diagnostic)s on the resolution result, and
//! [`EvalError`] only ever becomes the reason attached to one of them.

use std::path::PathBuf;

use thiserror::Error;

/// Fatal errors surfaced to callers of the engine.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration source file could not be parsed.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: hcl::Error,
    },

    /// A file or directory could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An extractor's required top-level declaration is absent.
    #[error("config `{name}` not resolved")]
    NotResolved { name: String },

    /// A required declaration resolved to a value of the wrong shape.
    #[error("config `{name}` has unexpected shape: expected {expected}, found {found}")]
    UnexpectedShape {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A tenancy override file is malformed.
    #[error("failed to load tenancy overrides from {path}: {reason}")]
    OverrideLoad { path: PathBuf, reason: String },

    /// The tenant metadata catalog could not be loaded.
    #[error("failed to load tenant catalog from {path}: {reason}")]
    CatalogLoad { path: PathBuf, reason: String },

    /// The repository layout file is malformed.
    #[error("invalid repository layout {path}: {reason}")]
    Layout { path: PathBuf, reason: String },

    /// The caller cancelled before work started.
    #[error("operation cancelled")]
    Cancelled,

    /// A background load task failed to complete.
    #[error("load task failed: {0}")]
    Task(String),
}

impl ConfigError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias for fallible engine operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Errors raised while evaluating a single expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("call to unknown function `{0}`")]
    UnknownFunction(String),

    #[error("function `{function}` expects {expected} argument(s), got {actual}")]
    Arity {
        function: &'static str,
        expected: &'static str,
        actual: usize,
    },

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("object has no attribute `{0}`")]
    MissingAttribute(String),

    #[error("index {index} out of range for list of length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("key `{0}` not found")]
    MissingKey(String),

    #[error("duplicate key `{0}` in for expression")]
    DuplicateKey(String),

    #[error("invalid argument to `{function}`: {reason}")]
    InvalidArgument {
        function: &'static str,
        reason: String,
    },

    #[error("unsupported expression: {0}")]
    Unsupported(String),
}

/// Result alias for expression evaluation.
pub type EvalResult<T> = std::result::Result<T, EvalError>;
