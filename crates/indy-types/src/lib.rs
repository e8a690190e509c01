//! Runtime type universe for indy-proxy.
//!
//! This crate is the "platform" that synthesized proxy classes live in:
//! - Type definitions (`TypeId`, `TypeDef`, `TypeKind`, `Visibility`)
//! - Method declarations and method types (`MethodDecl`, `MethodType`)
//! - A concurrent registry with assignability queries (`TypeUniverse`)
//! - The dynamic value model passed through call sites (`Value`)

pub mod types;
pub use types::{MethodDecl, MethodType, TypeDef, TypeId, TypeKind, Visibility};

pub mod universe;
pub use universe::{INVOKE_NAMESPACE, LANG_NAMESPACE, TypeError, TypeUniverse};

pub mod value;
pub use value::{ObjectRef, RuntimeObject, Value};
