//! Class image format, structural verifier and class loader.
//!
//! This crate is the emission backend for synthesized proxy classes:
//! - `ClassImage`: an in-memory class with a type pool, fields, methods and
//!   a call-site table
//! - `emit` / `decode`: deterministic byte encoding of an image
//! - `verify`: structural checks run before loading in debug configurations
//! - `ClassLoader`: installs encoded classes into a `TypeUniverse` and hands
//!   out executable `LoadedClass` handles

pub mod error;
pub use error::{ClassFormatError, LinkageError, Violation};

pub mod image;
pub use image::{
    Access, CONSTRUCTOR_NAME, CallSiteImage, ClassImage, Descriptor, FieldImage, Insn,
    LINK_ENTRY_NAME, MethodImage, STATE_FIELD, STRATEGY_FIELD,
};

pub mod codec;
pub use codec::{FORMAT_VERSION, MAGIC, decode, emit};

pub mod verify;
pub use verify::{verify, verify_image};

pub mod loader;
pub use loader::{ClassLoader, LoadedClass, LoadedField, LoadedMethod, SiteDescriptor, StaticValue};

#[cfg(test)]
#[path = "../tests/support.rs"]
mod test_support;
