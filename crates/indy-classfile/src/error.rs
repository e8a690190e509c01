use indy_types::TypeError;
use std::fmt;

/// The byte representation could not be read or written.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassFormatError {
    #[error("class image truncated ({0} bytes)")]
    Truncated(usize),
    #[error("bad magic number")]
    BadMagic,
    #[error("unsupported class format version {0}")]
    UnsupportedVersion(u16),
    #[error("malformed class body: {0}")]
    Malformed(String),
    #[error("failed to encode class: {0}")]
    Encode(String),
}

/// The runtime refused to install or wire up a class.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkageError {
    #[error(transparent)]
    ClassFormat(#[from] ClassFormatError),
    #[error("class bytes define `{found}`, expected `{expected}`")]
    NameMismatch { expected: String, found: String },
    #[error("class `{0}` is already defined")]
    DuplicateClass(String),
    #[error("class `{class}` references missing type `{missing}`")]
    NoClassDefFound { class: String, missing: String },
    #[error("class `{class}`: {message}")]
    IncompatibleClassChange { class: String, message: String },
    #[error("class `{class}` has no field `{field}`")]
    NoSuchField { class: String, field: String },
    #[error("field `{class}.{field}` is not static")]
    FieldNotStatic { class: String, field: String },
    #[error("static field `{class}.{field}` is already assigned")]
    AlreadyAssigned { class: String, field: String },
    #[error("class `{class}` has no method `{method}`")]
    NoSuchMethod { class: String, method: String },
    #[error(transparent)]
    Type(#[from] TypeError),
}

/// One structural problem found by the verifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// `name(descriptor)` of the offending method, if the problem is local
    /// to one.
    pub method: Option<String>,
    pub message: String,
}

impl Violation {
    pub fn class(message: impl Into<String>) -> Self {
        Self {
            method: None,
            message: message.into(),
        }
    }

    pub fn method(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            method: Some(method.into()),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.method {
            Some(method) => write!(f, "{method}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}
