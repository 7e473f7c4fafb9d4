//! Central registry mapping type identities to their full definitions.
//!
//! The [`TypeRegistry`] is populated once, in the order the external metadata reader supplies
//! types, and is read-only afterwards. Lookups are pure: [`TypeRegistry::resolve`] never
//! mutates the registry, and a generic instance resolves to its template's definition.
//!
//! The registry also owns the interface-uniqueness memo. Naively listing every transitively
//! implemented interface as a C++ base class produces duplicate or ambiguous bases, so
//! [`TypeRegistry::unique_interfaces`] computes, once per type, the interfaces a type
//! contributes that are not already reachable through another declared interface or through
//! the parent chain. That set is what becomes the type's base-class list.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dashmap::DashMap;

use crate::{
    model::{
        identity::{TypeIdentity, TypeIdentityRc},
        types::{ResolvedType, ResolvedTypeRc},
    },
    Error, Result,
};

/// Lookup key for a definition: outermost namespace plus the declaring-chain name path.
///
/// Generic instances and templates share a key, which is what makes instance references
/// resolve to their template's definition. Array and pointer forms key through their element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DefinitionKey {
    /// Namespace of the outermost declaring type
    pub namespace: String,
    /// Simple names from the outermost declaring type down to the type itself
    pub path: Vec<String>,
}

impl DefinitionKey {
    /// Derive the key for an identity.
    #[must_use]
    pub fn of(identity: &TypeIdentity) -> DefinitionKey {
        let mut id = identity;
        while let Some(element) = &id.element {
            id = element;
        }
        let mut path = Vec::new();
        let mut t = id;
        loop {
            path.push(t.name.clone());
            match &t.declaring {
                Some(declaring) => t = declaring,
                None => break,
            }
        }
        path.reverse();
        DefinitionKey {
            namespace: t.namespace.clone(),
            path,
        }
    }
}

/// Registry of all resolved types in the model, plus the interface-uniqueness memo.
pub struct TypeRegistry {
    /// Types in ingestion order
    types: Vec<ResolvedTypeRc>,
    /// Definition lookup by key
    index: HashMap<DefinitionKey, ResolvedTypeRc>,
    /// Memoized unique-interface sets, safe for concurrent reads
    unique_memo: DashMap<DefinitionKey, Arc<Vec<TypeIdentityRc>>>,
}

impl TypeRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        TypeRegistry {
            types: Vec::new(),
            index: HashMap::new(),
            unique_memo: DashMap::new(),
        }
    }

    /// Register a new type definition.
    ///
    /// # Errors
    ///
    /// [`Error::TypeInsert`] when a definition is already registered under the same key.
    pub fn insert(&mut self, ty: ResolvedType) -> Result<ResolvedTypeRc> {
        let key = DefinitionKey::of(&ty.identity);
        if self.index.contains_key(&key) {
            return Err(Error::TypeInsert(ty.identity.clone()));
        }
        let rc = Arc::new(ty);
        self.index.insert(key, rc.clone());
        self.types.push(rc.clone());
        Ok(rc)
    }

    /// Resolve a reference to its definition.
    ///
    /// Pure lookup: generic parameters resolve to nothing, array/pointer forms resolve through
    /// their element, generic instances resolve to their template.
    #[must_use]
    pub fn resolve(&self, identity: &TypeIdentity) -> Option<ResolvedTypeRc> {
        if identity.is_generic_parameter() {
            return None;
        }
        self.index.get(&DefinitionKey::of(identity)).cloned()
    }

    /// Iterate all registered types in ingestion order.
    pub fn iter(&self) -> impl Iterator<Item = &ResolvedTypeRc> {
        self.types.iter()
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// `true` if no types are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Positional mapping from a generic instance's template parameters to its arguments.
    ///
    /// # Errors
    ///
    /// [`Error::UnresolvedType`] when the instance's template is not registered.
    pub fn generic_arg_map(
        &self,
        instance: &TypeIdentityRc,
    ) -> Result<HashMap<crate::model::identity::FastKey, TypeIdentityRc>> {
        let resolved = self
            .resolve(instance)
            .ok_or_else(|| Error::UnresolvedType {
                context: instance.clone(),
                reference: instance.clone(),
            })?;
        let mut map = HashMap::new();
        for (param, arg) in resolved
            .identity
            .generics_list()
            .iter()
            .zip(instance.generics_list())
        {
            map.insert(
                crate::model::identity::FastKey(param.clone()),
                arg.clone(),
            );
        }
        Ok(map)
    }

    /// The interfaces `ty` directly and uniquely contributes: its declared interface list
    /// minus anything already reachable through another declared interface or through the
    /// parent chain. Order follows the declared interface order. Memoized globally.
    ///
    /// # Errors
    ///
    /// [`Error::UnresolvedType`] when an interface or parent reference cannot be resolved.
    pub fn unique_interfaces(&self, ty: &ResolvedType) -> Result<Arc<Vec<TypeIdentityRc>>> {
        let key = DefinitionKey::of(&ty.identity);
        if let Some(cached) = self.unique_memo.get(&key) {
            return Ok(cached.clone());
        }

        let mut unique: Vec<TypeIdentityRc> = Vec::new();
        for face in &ty.interfaces {
            if !unique.contains(face) {
                unique.push(face.clone());
            }
        }

        // Everything reachable one step beyond the declared list: each interface's own
        // interfaces (with generic arguments propagated) plus the full parent chain's.
        let mut transitive: Vec<TypeIdentityRc> = Vec::new();
        for face in &ty.interfaces {
            self.collect_implemented(&ty.identity, face, &mut transitive)?;
        }
        let mut parent = ty.parent.clone();
        while let Some(p) = parent {
            let td = self.collect_implemented(&ty.identity, &p, &mut transitive)?;
            parent = td.parent.clone();
        }

        let reachable = self.interface_closure(&ty.identity, &transitive)?;
        unique.retain(|face| !reachable.contains(face));

        let result = Arc::new(unique);
        self.unique_memo.insert(key, result.clone());
        Ok(result)
    }

    /// Count the declared unique interfaces that are still reachable through more than one
    /// path. Duplicates force the writer to disambiguate casts, so the count is surfaced as a
    /// per-type diagnostic.
    ///
    /// # Errors
    ///
    /// [`Error::UnresolvedType`] when an interface reference cannot be resolved.
    pub fn duplicate_interface_count(&self, ty: &ResolvedType) -> Result<usize> {
        let mut count = 0;
        let mut seen: HashSet<TypeIdentityRc> = HashSet::new();
        for face in self.unique_interfaces(ty)?.iter() {
            if self.has_duplicate_interfaces(&ty.identity, &mut seen, face)? {
                count += 1;
            }
        }
        Ok(count)
    }

    fn has_duplicate_interfaces(
        &self,
        context: &TypeIdentityRc,
        seen: &mut HashSet<TypeIdentityRc>,
        face: &TypeIdentityRc,
    ) -> Result<bool> {
        if !seen.insert(face.clone()) {
            return Ok(true);
        }
        let td = self.resolve(face).ok_or_else(|| Error::UnresolvedType {
            context: context.clone(),
            reference: face.clone(),
        })?;
        let mut ret = false;
        for nested in self.unique_interfaces(&td)?.iter() {
            ret |= self.has_duplicate_interfaces(context, seen, nested)?;
        }
        Ok(ret)
    }

    /// Record the interfaces implemented by `face` into `out`, substituting generic arguments
    /// when `face` is a generic instance.
    fn collect_implemented(
        &self,
        context: &TypeIdentityRc,
        face: &TypeIdentityRc,
        out: &mut Vec<TypeIdentityRc>,
    ) -> Result<ResolvedTypeRc> {
        let td = self.resolve(face).ok_or_else(|| Error::UnresolvedType {
            context: context.clone(),
            reference: face.clone(),
        })?;
        let map = if face.is_generic_instance() {
            Some(self.generic_arg_map(face)?)
        } else {
            None
        };
        for implemented in &td.interfaces {
            match &map {
                Some(m) if implemented.is_generic() => out.push(implemented.instantiate(m)),
                _ => out.push(implemented.clone()),
            }
        }
        Ok(td)
    }

    /// Transitive closure over a starting interface list.
    fn interface_closure(
        &self,
        context: &TypeIdentityRc,
        list: &[TypeIdentityRc],
    ) -> Result<HashSet<TypeIdentityRc>> {
        let mut set: HashSet<TypeIdentityRc> = HashSet::new();
        let mut work: Vec<TypeIdentityRc> = list.to_vec();
        while let Some(face) = work.pop() {
            if set.insert(face.clone()) {
                let td = self.resolve(&face).ok_or_else(|| Error::UnresolvedType {
                    context: context.clone(),
                    reference: face,
                })?;
                work.extend(td.interfaces.iter().cloned());
            }
        }
        Ok(set)
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        TypeRegistry::new()
    }
}
