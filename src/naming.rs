//! Namespace and name selection for synthesized proxy classes.

use crate::error::ConfigError;
use indy_classfile::ClassLoader;
use indy_types::{TypeId, TypeUniverse};
use std::collections::BTreeSet;
use tracing::debug;

/// Namespace used when the participating types span several namespaces and
/// none of them restricts access.
pub const DEFAULT_NAMESPACE: &str = "indy_proxy.proxies";
/// Simple-name prefix of synthesized classes.
pub const DEFAULT_CLASS_PREFIX: &str = "IndyProxy";

/// Choose the namespace a proxy over `state_type` and `interfaces` must live
/// in.
///
/// A namespace-restricted type can only be implemented from inside its own
/// namespace, so all restricted participants must share one. Types without
/// a namespace (primitives) do not participate.
pub fn proxy_namespace(
    universe: &TypeUniverse,
    state_type: TypeId,
    interfaces: &[TypeId],
    default_namespace: &str,
) -> Result<String, ConfigError> {
    let mut namespaces = BTreeSet::new();
    let mut restricted = BTreeSet::new();
    for &ty in std::iter::once(&state_type).chain(interfaces) {
        let def = universe
            .get(ty)
            .ok_or(indy_types::TypeError::UnknownType(ty))?;
        if def.namespace.is_empty() {
            continue;
        }
        namespaces.insert(def.namespace.clone());
        if !def.is_public() {
            restricted.insert(def.namespace.clone());
        }
    }

    if namespaces.len() == 1 {
        return Ok(namespaces.into_iter().next().unwrap_or_default());
    }
    if restricted.is_empty() {
        return Ok(default_namespace.to_string());
    }
    if restricted.len() == 1 {
        return Ok(restricted.into_iter().next().unwrap_or_default());
    }
    Err(ConfigError::RestrictedNamespaces(restricted.into_iter().collect()))
}

/// Reserve the first free `<namespace>.<prefix>$<n>` in `loader`.
pub fn reserve_class_name(loader: &ClassLoader, namespace: &str, prefix: &str) -> String {
    let name = loader.reserve_name(namespace, prefix);
    debug!(name = %name, "reserve_class_name");
    name
}

#[cfg(test)]
#[path = "tests/naming_tests.rs"]
mod tests;
