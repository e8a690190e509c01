//! Error types of the proxy core.
//!
//! Build-time problems are `ConfigError` (the requested contract set cannot
//! be proxied) or `LinkageError` (the class backend refused the result).
//! Per-call problems are `Fault`s; they never poison a call site.

use indy_classfile::{LinkageError, Violation};
use indy_types::TypeError;

/// The requested interface set cannot be turned into a proxy type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("incompatible return types for `{method}`: `{existing}` and `{requested}`")]
    IncompatibleReturnTypes {
        method: String,
        existing: String,
        requested: String,
    },
    #[error("`{0}` is not an interface")]
    NotAnInterface(String),
    #[error("cannot proxy interfaces with restricted access from different namespaces: {}", .0.join(", "))]
    RestrictedNamespaces(Vec<String>),
    #[error("class verification failed:\n\t{}", format_violations(.0))]
    VerificationFailed(Vec<Violation>),
    #[error(transparent)]
    UnknownType(#[from] TypeError),
}

fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n\t")
}

/// A failure surfaced while invoking a proxy method or its handler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Fault {
    #[error("unsupported operation `{method}` (returns `{return_type}`)")]
    UnsupportedOperation { method: String, return_type: String },
    #[error("illegal state: {0}")]
    IllegalState(String),
    #[error("`{found}` cannot be cast to `{expected}`")]
    ClassCast { expected: String, found: String },
    #[error("no method `{method}` on `{class}`")]
    NoSuchMethod { class: String, method: String },
    #[error("call to `{method}` on `{class}` is ambiguous")]
    AmbiguousMethod { class: String, method: String },
    #[error("`{method}` expects {expected} arguments, got {found}")]
    WrongArity {
        method: String,
        expected: usize,
        found: usize,
    },
    #[error("linkage failed: {0}")]
    Linkage(String),
    /// A handler signalled an application-level exception.
    #[error("{exception}: {message}")]
    Thrown { exception: String, message: String },
}

impl Fault {
    pub fn thrown(exception: impl Into<String>, message: impl Into<String>) -> Self {
        Fault::Thrown {
            exception: exception.into(),
            message: message.into(),
        }
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Fault::UnsupportedOperation { .. })
    }
}

/// Error returned by the public factory surface.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProxyError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Linkage(#[from] LinkageError),
    #[error("failed to instantiate proxy: {source}")]
    Instantiation {
        #[source]
        source: Fault,
    },
}

impl From<TypeError> for ProxyError {
    fn from(err: TypeError) -> Self {
        ProxyError::Config(ConfigError::UnknownType(err))
    }
}
