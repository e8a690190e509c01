//! Proxy factories.
//!
//! Building a factory runs the whole pipeline once:
//! merge -> name -> synthesize -> emit -> verify -> define -> install ->
//! constructor lookup. The resulting `IndyProxy` then turns payloads into
//! instances of the one synthesized class; all instances share its call
//! sites.

use crate::bootstrap::Bootstrap;
use crate::config::ProxyOptions;
use crate::contract::merge_contracts;
use crate::error::{ConfigError, ProxyError};
use crate::naming::{proxy_namespace, reserve_class_name};
use crate::payload::Payload;
use crate::runtime::{Proxy, ProxyClass};
use crate::synth::TypeDescriptor;
use indy_classfile::{ClassLoader, LinkageError, emit, verify};
use indy_types::TypeId;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub struct IndyProxy<S: Payload> {
    class: Arc<ProxyClass<S>>,
    constructor: u16,
    interfaces: Vec<TypeId>,
}

impl<S: Payload> fmt::Debug for IndyProxy<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndyProxy")
            .field("class", &self.class.name())
            .field("interfaces", &self.interfaces)
            .finish()
    }
}

impl<S: Payload> IndyProxy<S> {
    /// Build with default options.
    pub fn build<B>(loader: &ClassLoader, strategy: B, interfaces: &[TypeId]) -> Result<Self, ProxyError>
    where
        B: Bootstrap<S> + 'static,
    {
        Self::build_with(loader, strategy, interfaces, &ProxyOptions::default())
    }

    pub fn build_with<B>(
        loader: &ClassLoader,
        strategy: B,
        interfaces: &[TypeId],
        options: &ProxyOptions,
    ) -> Result<Self, ProxyError>
    where
        B: Bootstrap<S> + 'static,
    {
        let universe = loader.universe();
        let state_type = strategy.state_type();
        if !universe.contains(state_type) {
            return Err(indy_types::TypeError::UnknownType(state_type).into());
        }

        let merged = merge_contracts(universe, interfaces)?;
        let namespace = proxy_namespace(universe, state_type, interfaces, &options.default_namespace)?;
        let name = reserve_class_name(loader, &namespace, &options.class_prefix);

        let image = TypeDescriptor::new(&name, &namespace, state_type, interfaces, &merged).lower(universe)?;
        let bytes = emit(&image).map_err(LinkageError::from)?;
        debug!(class = %name, bytes = bytes.len(), "IndyProxy::build emitted");

        if options.verify.enabled() {
            let violations = verify(&bytes, universe);
            if !violations.is_empty() {
                return Err(ConfigError::VerificationFailed(violations).into());
            }
            debug!(class = %name, "IndyProxy::build verified");
        }

        let loaded = loader.define_class(&name, &bytes)?;
        let class = Arc::new(ProxyClass::new(loaded, Arc::clone(universe))?);
        class.install(Arc::new(strategy))?;
        let constructor = class.loaded().constructor()?;
        debug!(
            class = %name,
            call_sites = class.call_sites().len(),
            "IndyProxy::build installed"
        );

        Ok(Self {
            class,
            constructor,
            interfaces: interfaces.to_vec(),
        })
    }

    /// New instance carrying `payload`.
    pub fn create(&self, payload: S) -> Result<Proxy<S>, ProxyError> {
        self.class
            .construct(self.constructor, payload)
            .map_err(|source| ProxyError::Instantiation { source })
    }

    pub fn proxy_class(&self) -> &Arc<ProxyClass<S>> {
        &self.class
    }

    pub fn class_name(&self) -> &str {
        self.class.name()
    }

    pub fn interfaces(&self) -> &[TypeId] {
        &self.interfaces
    }
}

/// Build a proxy factory for `interfaces` backed by `strategy`.
pub fn create_proxy_factory<S, B>(
    loader: &ClassLoader,
    strategy: B,
    interfaces: &[TypeId],
) -> Result<IndyProxy<S>, ProxyError>
where
    S: Payload,
    B: Bootstrap<S> + 'static,
{
    IndyProxy::build(loader, strategy, interfaces)
}

#[cfg(test)]
#[path = "tests/factory_tests.rs"]
mod tests;
