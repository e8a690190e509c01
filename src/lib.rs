//! Interface proxies with lazily linked, write-once call sites.
//!
//! `create_proxy_factory` synthesizes one class implementing a set of
//! interfaces over an opaque payload type `S`. Every method of the class
//! dispatches through its own call site; the first call of a site asks the
//! installed `Bootstrap<S>` strategy for a handler and binds it for good.
//!
//! ```text
//! interfaces --merge--> MergedContracts --synthesize--> ClassImage
//!            --emit/verify/define--> LoadedClass --install--> IndyProxy<S>
//! IndyProxy::create(payload) -> Proxy<S> -> call site -> handler(&S, args)
//! ```

pub mod error;
pub use error::{ConfigError, Fault, ProxyError};

pub mod payload;
pub use payload::{Payload, string_hash};

pub mod contract;
pub use contract::{ContractMerger, MergedContracts, MergedMethod, SignatureKey, merge_contracts};

pub mod naming;
pub use naming::{DEFAULT_CLASS_PREFIX, DEFAULT_NAMESPACE, proxy_namespace};

pub mod synth;
pub use synth::{STRATEGY_NOT_ASSIGNED, TypeDescriptor, synthesize};

pub mod bootstrap;
pub use bootstrap::{Bootstrap, DefaultMethods, FnBootstrap, HandlerFn, LinkRequest, MethodHandle};

pub mod call_site;
pub use call_site::CallSite;

pub mod runtime;
pub use runtime::{InterfaceView, Proxy, ProxyClass, ProxyInstance};

pub mod factory;
pub use factory::{IndyProxy, create_proxy_factory};

pub mod config;
pub use config::{ProxyOptions, VerifyMode};

pub mod tracing_config;

pub use indy_classfile::ClassLoader;
pub use indy_types::{MethodDecl, MethodType, TypeDef, TypeId, TypeUniverse, Value};

#[cfg(test)]
#[path = "tests/test_fixtures.rs"]
pub(crate) mod test_fixtures;
