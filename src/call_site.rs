//! Write-once dispatch slots.
//!
//! A call site starts unlinked and is linked by the first invocation that
//! reaches it. Linking does not take a lock: racing first callers may each
//! consult the strategy, the first handler stored wins, and every caller
//! dispatches through the stored one.

use crate::bootstrap::MethodHandle;
use crate::error::Fault;
use indy_types::MethodType;
use once_cell::race::OnceBox;
use std::fmt;
use tracing::{trace, warn};

pub struct CallSite<S> {
    name: String,
    /// State type leading.
    signature: MethodType,
    target: OnceBox<MethodHandle<S>>,
}

impl<S> fmt::Debug for CallSite<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallSite")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .field("linked", &self.target.get().is_some())
            .finish()
    }
}

impl<S> CallSite<S> {
    pub fn new(name: impl Into<String>, signature: MethodType) -> Self {
        Self {
            name: name.into(),
            signature,
            target: OnceBox::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &MethodType {
        &self.signature
    }

    pub fn is_linked(&self) -> bool {
        self.target.get().is_some()
    }

    /// The bound handler, once linked.
    pub fn target(&self) -> Option<&MethodHandle<S>> {
        self.target.get()
    }

    /// The bound handler, linking it with `link` first if needed.
    ///
    /// A failed `link` leaves the site unlinked.
    pub fn get_or_link<F>(&self, link: F) -> Result<&MethodHandle<S>, Fault>
    where
        F: FnOnce() -> Result<MethodHandle<S>, Fault>,
    {
        if let Some(target) = self.target.get() {
            return Ok(target);
        }
        let handle = link()?;
        match self.target.set(Box::new(handle)) {
            Ok(()) => trace!(site = %self.name, "CallSite::get_or_link linked"),
            Err(_) => warn!(site = %self.name, "CallSite::get_or_link lost race, handler discarded"),
        }
        self.target
            .get()
            .ok_or_else(|| Fault::Linkage(format!("call site `{}` did not link", self.name)))
    }
}

#[cfg(test)]
#[path = "tests/call_site_tests.rs"]
mod tests;
