//! Opaque per-instance state.

use rustc_hash::FxHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A value a proxy instance can carry as its state.
///
/// The default object methods delegate to it: `toString` uses `Display`,
/// `equals` uses `Eq` and `hashCode` uses [`Payload::hash_code`].
pub trait Payload: Eq + Hash + fmt::Display + fmt::Debug + Send + Sync + 'static {
    /// 32-bit hash reported by `hashCode`.
    fn hash_code(&self) -> i32 {
        let mut hasher = FxHasher::default();
        self.hash(&mut hasher);
        let h = hasher.finish();
        (h ^ (h >> 32)) as i32
    }
}

/// `s[0]*31^(n-1) + ... + s[n-1]` over UTF-16 code units, wrapping.
pub fn string_hash(s: &str) -> i32 {
    s.encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

impl Payload for String {
    fn hash_code(&self) -> i32 {
        string_hash(self)
    }
}

impl Payload for Arc<str> {
    fn hash_code(&self) -> i32 {
        string_hash(self)
    }
}

impl Payload for i32 {
    fn hash_code(&self) -> i32 {
        *self
    }
}

impl Payload for i64 {
    fn hash_code(&self) -> i32 {
        let bits = *self as u64;
        (bits ^ (bits >> 32)) as i32
    }
}

impl Payload for u32 {
    fn hash_code(&self) -> i32 {
        *self as i32
    }
}

impl Payload for bool {
    fn hash_code(&self) -> i32 {
        if *self { 1231 } else { 1237 }
    }
}

impl Payload for char {
    fn hash_code(&self) -> i32 {
        *self as i32
    }
}

#[cfg(test)]
#[path = "tests/payload_tests.rs"]
mod tests;
