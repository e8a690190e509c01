//! Contract merging.
//!
//! Every method the requested interfaces expose, plus the three object
//! methods, is folded into one `MergedMethod` per `(name, parameter types)`.
//! The merged method carries the most specific return type every
//! contribution accepts, every distinct requested return type (bridges are
//! generated for the extra ones) and the exceptions all contributions
//! declare.
//!
//! Folding is commutative and associative: the result depends only on the
//! multiset of contributions, never on their order.

use crate::error::ConfigError;
use indy_types::{MethodDecl, TypeId, TypeUniverse};
use smallvec::SmallVec;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, trace};

/// Identity of a merged method: name plus ordered parameter types.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignatureKey {
    pub name: String,
    pub params: SmallVec<[TypeId; 4]>,
}

impl SignatureKey {
    pub fn of(decl: &MethodDecl) -> Self {
        Self {
            name: decl.name.clone(),
            params: decl.params.iter().copied().collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergedMethod {
    pub key: SignatureKey,
    /// Most specific return type accepted by every contribution.
    pub ret: TypeId,
    /// Every requested return type, `ret` included.
    pub alternative_returns: BTreeSet<TypeId>,
    /// Exceptions declared by every contribution.
    pub exceptions: BTreeSet<TypeId>,
}

impl MergedMethod {
    fn new(decl: &MethodDecl) -> Self {
        Self {
            key: SignatureKey::of(decl),
            ret: decl.ret,
            alternative_returns: BTreeSet::from([decl.ret]),
            exceptions: decl.throws.iter().copied().collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.key.name
    }

    pub fn params(&self) -> &[TypeId] {
        &self.key.params
    }

    /// Return types that need a forwarding bridge.
    pub fn bridge_returns(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.alternative_returns
            .iter()
            .copied()
            .filter(move |&ret| ret != self.ret)
    }

    fn update(&mut self, decl: &MethodDecl, universe: &TypeUniverse) -> Result<(), ConfigError> {
        if universe.is_assignable(decl.ret, self.ret) {
            self.ret = decl.ret;
        } else if !universe.is_assignable(self.ret, decl.ret) {
            return Err(ConfigError::IncompatibleReturnTypes {
                method: self.key.name.clone(),
                existing: universe.type_name(self.ret),
                requested: universe.type_name(decl.ret),
            });
        }
        self.alternative_returns.insert(decl.ret);
        self.exceptions.retain(|ex| decl.throws.contains(ex));
        Ok(())
    }
}

/// Result of a merge, ordered by signature key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergedContracts {
    methods: BTreeMap<SignatureKey, MergedMethod>,
}

impl MergedContracts {
    pub fn get(&self, key: &SignatureKey) -> Option<&MergedMethod> {
        self.methods.get(key)
    }

    /// First merged method with the given name.
    pub fn find(&self, name: &str) -> Option<&MergedMethod> {
        self.methods.values().find(|m| m.key.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MergedMethod> {
        self.methods.values()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Number of bridges the merged set requires.
    pub fn bridge_count(&self) -> usize {
        self.methods.values().map(|m| m.bridge_returns().count()).sum()
    }
}

/// Incremental merger.
pub struct ContractMerger<'u> {
    universe: &'u TypeUniverse,
    merged: MergedContracts,
}

impl<'u> ContractMerger<'u> {
    pub fn new(universe: &'u TypeUniverse) -> Self {
        Self {
            universe,
            merged: MergedContracts::default(),
        }
    }

    /// Fold one declaration into the running result.
    pub fn add(&mut self, decl: &MethodDecl) -> Result<(), ConfigError> {
        let key = SignatureKey::of(decl);
        match self.merged.methods.get_mut(&key) {
            Some(existing) => existing.update(decl, self.universe)?,
            None => {
                trace!(method = %decl.name, "ContractMerger::add new signature");
                self.merged.methods.insert(key, MergedMethod::new(decl));
            }
        }
        Ok(())
    }

    /// Fold every method `interface` exposes, inherited ones included.
    pub fn add_interface(&mut self, interface: TypeId) -> Result<(), ConfigError> {
        if !self.universe.is_interface(interface) {
            return Err(ConfigError::NotAnInterface(self.universe.type_name(interface)));
        }
        for decl in self.universe.methods_of(interface)? {
            self.add(&decl)?;
        }
        Ok(())
    }

    pub fn finish(self) -> MergedContracts {
        self.merged
    }
}

/// Merge the object methods and every method of `interfaces`.
pub fn merge_contracts(
    universe: &TypeUniverse,
    interfaces: &[TypeId],
) -> Result<MergedContracts, ConfigError> {
    let mut merger = ContractMerger::new(universe);
    for decl in universe.methods_of(TypeId::OBJECT)? {
        merger.add(&decl)?;
    }
    for &interface in interfaces {
        merger.add_interface(interface)?;
    }
    let merged = merger.finish();
    debug!(
        interfaces = interfaces.len(),
        methods = merged.len(),
        bridges = merged.bridge_count(),
        "merge_contracts"
    );
    Ok(merged)
}

#[cfg(test)]
#[path = "tests/contract_tests.rs"]
mod tests;
