//! Per-type emission contexts and the arena that owns them.
//!
//! An [`EmissionContext`] tracks, for one type scheduled for emission, which other types it
//! needs as complete definitions versus mere forward declarations, and whether its body must
//! be emitted in place inside its declaring type's file. Contexts reference each other
//! through [`ContextId`] arena handles held by the [`ContextGraph`], so the declaring/nested
//! graph carries no ownership cycles.
//!
//! # The four dependency sets
//!
//! - `definitions`: complete types already satisfied by this file (self, in-place nested
//!   bodies, folded include contents).
//! - `definitions_to_get`: complete types that must arrive through an include.
//! - `declarations`: references satisfied by a definition recorded elsewhere in this context
//!   (typically a nested type whose enclosing type was escalated to a definition).
//! - `declarations_to_make`: pending forward declarations the file must print itself.
//!
//! The four sets are pairwise disjoint at every observation point after resolution; every
//! recording operation removes a reference from the weaker sets before adding it to a
//! stronger one, and never downgrades.

use std::collections::{HashMap, HashSet};

use crate::{
    model::{
        identity::{FastKey, TypeIdentityRc},
        registry::{DefinitionKey, TypeRegistry},
        types::ResolvedTypeRc,
    },
    emission::{EmitConfig, GenericHandling},
    Error, Result,
};

/// Stable arena handle for an [`EmissionContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(pub(crate) usize);

/// Dependency bookkeeping for one type being emitted.
///
/// Mutated only through [`ContextGraph`] methods during the resolution pass; read-only
/// afterwards.
#[derive(Debug)]
pub struct EmissionContext {
    /// This context's arena handle
    pub id: ContextId,
    /// The type this context emits
    pub resolved: ResolvedTypeRc,
    /// Shorthand for `resolved.identity`
    pub identity: TypeIdentityRc,
    /// Handle of the declaring context, absent for root types
    pub declaring: Option<ContextId>,
    /// Handles of directly nested contexts, in declaration order
    pub nested: Vec<ContextId>,
    /// `true` once this body must be emitted inside its declaring type's file
    pub in_place: bool,
    /// Complete types satisfied by this file
    pub definitions: HashSet<TypeIdentityRc>,
    /// Complete types that must arrive through an include
    pub definitions_to_get: HashSet<TypeIdentityRc>,
    /// References satisfied by a definition recorded elsewhere in this context
    pub declarations: HashSet<TypeIdentityRc>,
    /// Forward declarations this file must print itself
    pub declarations_to_make: HashSet<TypeIdentityRc>,
    /// Generic parameters visible here: own plus the whole declaring chain's
    pub generic_parameters: HashSet<FastKey>,
    /// De-duplicated interfaces, in registry-computed unique order
    pub unique_interfaces: Vec<TypeIdentityRc>,
    /// `true` once a fixed-width integer alias was requested
    pub needs_stdint: bool,
    /// Built-in wrapper types that need a forward declaration in this file
    pub primitive_declarations: HashSet<String>,
}

impl EmissionContext {
    /// The include path of this type's header, with extension.
    #[must_use]
    pub fn header_file(&self) -> String {
        format!("{}.hpp", self.identity.include_path())
    }

    /// The path of this type's source file, with extension.
    #[must_use]
    pub fn source_file(&self) -> String {
        format!("{}.cpp", self.identity.include_path())
    }

    /// `true` if `key` names a generic parameter visible in this context.
    #[must_use]
    pub fn is_known_generic_parameter(&self, reference: &TypeIdentityRc) -> bool {
        self.generic_parameters.contains(&FastKey(reference.clone()))
    }
}

/// Arena of emission contexts plus the registry they resolve against.
///
/// Construction and resolution form a single-threaded, strictly ordered pass; the graph is
/// read-only once planning begins.
pub struct ContextGraph<'a> {
    registry: &'a TypeRegistry,
    config: EmitConfig,
    contexts: Vec<EmissionContext>,
    by_type: HashMap<DefinitionKey, ContextId>,
}

impl<'a> ContextGraph<'a> {
    /// Create one context per emittable type in the registry, declaring types before their
    /// nested types.
    ///
    /// # Errors
    ///
    /// [`Error::UnresolvedType`] when a nested-type reference has no registry entry;
    /// [`Error::UnresolvedGenericBackref`] when a generic parameter chain cannot be
    /// collected.
    pub fn build(registry: &'a TypeRegistry, config: EmitConfig) -> Result<Self> {
        let mut graph = ContextGraph {
            registry,
            config,
            contexts: Vec::new(),
            by_type: HashMap::new(),
        };
        for ty in registry.iter() {
            if ty.identity.declaring.is_some() {
                continue;
            }
            if graph.skip_for_generics(ty) {
                continue;
            }
            graph.create_context(ty.clone(), None)?;
        }
        Ok(graph)
    }

    fn skip_for_generics(&self, ty: &ResolvedTypeRc) -> bool {
        self.config.generic_handling == GenericHandling::Skip
            && ty.identity.is_generic_template()
    }

    /// The registry this graph resolves against.
    #[must_use]
    pub fn registry(&self) -> &TypeRegistry {
        self.registry
    }

    /// The configuration the graph was built with.
    #[must_use]
    pub fn config(&self) -> EmitConfig {
        self.config
    }

    /// Borrow a context by handle.
    #[must_use]
    pub fn context(&self, id: ContextId) -> &EmissionContext {
        &self.contexts[id.0]
    }

    pub(crate) fn context_mut(&mut self, id: ContextId) -> &mut EmissionContext {
        &mut self.contexts[id.0]
    }

    /// All context handles, in creation order.
    pub fn ids(&self) -> impl Iterator<Item = ContextId> {
        (0..self.contexts.len()).map(ContextId)
    }

    /// The context emitting the definition behind `reference`, if one exists.
    #[must_use]
    pub fn context_of(&self, reference: &TypeIdentityRc) -> Option<ContextId> {
        self.by_type.get(&DefinitionKey::of(reference)).copied()
    }

    /// The static root of a context's nesting chain.
    #[must_use]
    pub fn root_of(&self, id: ContextId) -> ContextId {
        let mut cur = id;
        while let Some(declaring) = self.contexts[cur.0].declaring {
            cur = declaring;
        }
        cur
    }

    /// The context that physically owns `id`'s output file: the first ancestor (or `id`
    /// itself) that is not emitted in place.
    #[must_use]
    pub fn owning_file_of(&self, id: ContextId) -> ContextId {
        let mut cur = id;
        while self.contexts[cur.0].in_place {
            match self.contexts[cur.0].declaring {
                Some(declaring) => cur = declaring,
                None => break,
            }
        }
        cur
    }

    /// `true` if `target` is nested (transitively) inside `id`.
    #[must_use]
    pub fn has_in_nested_hierarchy(&self, id: ContextId, target: ContextId) -> bool {
        let mut cur = self.contexts[target.0].declaring;
        while let Some(declaring) = cur {
            if declaring == id {
                return true;
            }
            cur = self.contexts[declaring.0].declaring;
        }
        false
    }

    fn create_context(
        &mut self,
        resolved: ResolvedTypeRc,
        declaring: Option<ContextId>,
    ) -> Result<ContextId> {
        let id = ContextId(self.contexts.len());
        let identity = resolved.identity.clone();

        let mut generic_parameters: HashSet<FastKey> = HashSet::new();
        for param in identity.declared_generics(true)? {
            generic_parameters.insert(FastKey(param));
        }

        let unique_interfaces = self.registry.unique_interfaces(&resolved)?.as_ref().clone();

        let mut definitions = HashSet::new();
        definitions.insert(identity.clone());
        let mut definitions_to_get = HashSet::new();
        if let Some(declaring_id) = declaring {
            // A nested type cannot be named without its enclosing type being complete.
            definitions_to_get.insert(self.contexts[declaring_id.0].identity.clone());
        }

        self.contexts.push(EmissionContext {
            id,
            resolved: resolved.clone(),
            identity: identity.clone(),
            declaring,
            nested: Vec::new(),
            in_place: false,
            definitions,
            definitions_to_get,
            declarations: HashSet::new(),
            declarations_to_make: HashSet::new(),
            generic_parameters,
            unique_interfaces,
            needs_stdint: false,
            primitive_declarations: HashSet::new(),
        });
        self.by_type.insert(DefinitionKey::of(&identity), id);
        if let Some(declaring_id) = declaring {
            self.contexts[declaring_id.0].nested.push(id);
        }

        // A nested type of a generic template has no own translation unit; its body can only
        // live inside the template's.
        if let Some(declaring_id) = declaring {
            if self.contexts[declaring_id.0].identity.is_generic_template()
                || self.contexts[declaring_id.0].in_place
            {
                self.mark_in_place(id);
            }
        }

        for nested_ref in resolved.nested.clone() {
            let nested_type =
                self.registry
                    .resolve(&nested_ref)
                    .ok_or_else(|| Error::UnresolvedType {
                        context: identity.clone(),
                        reference: nested_ref.clone(),
                    })?;
            if self.skip_for_generics(&nested_type) {
                continue;
            }
            let nested_id = self.create_context(nested_type, Some(id))?;
            let nested_identity = self.contexts[nested_id.0].identity.clone();
            self.add_nested_declaration(id, nested_identity);
        }

        Ok(id)
    }

    /// Record that `id` needs `reference` as a complete definition.
    ///
    /// No-op for generic parameters and for references already recorded at definition
    /// strength. When the reference's context shares this context's static root, the target
    /// cannot be a separate translation unit: it is forced in place and folded into
    /// `definitions` directly. Otherwise the reference is queued for an include.
    pub fn add_definition(&mut self, id: ContextId, reference: TypeIdentityRc) {
        if reference.is_generic_parameter()
            || self.contexts[id.0].is_known_generic_parameter(&reference)
        {
            return;
        }
        {
            let ctx = &self.contexts[id.0];
            if ctx.definitions.contains(&reference) || ctx.definitions_to_get.contains(&reference)
            {
                return;
            }
        }
        // A definition subsumes any recorded declaration.
        let ctx = &mut self.contexts[id.0];
        ctx.declarations.remove(&reference);
        ctx.declarations_to_make.remove(&reference);

        if let Some(target) = self.context_of(&reference) {
            let root = self.root_of(id);
            if target != id && target != root && self.root_of(target) == root {
                self.in_place_nested(id, target);
                self.contexts[id.0].definitions.insert(reference);
                return;
            }
        }
        self.contexts[id.0].definitions_to_get.insert(reference);
    }

    /// Record that `id` needs `reference` at least as a forward declaration.
    ///
    /// No-op for generic parameters and for references already recorded at any strength. A
    /// nested reference whose declaring type is not yet a definition here cannot be legally
    /// forward-declared, so the declaring type is escalated to a required definition and the
    /// nested reference is recorded as satisfied by it.
    pub fn add_declaration(&mut self, id: ContextId, reference: TypeIdentityRc) {
        if reference.is_generic_parameter()
            || self.contexts[id.0].is_known_generic_parameter(&reference)
        {
            return;
        }
        {
            let ctx = &self.contexts[id.0];
            if ctx.definitions.contains(&reference)
                || ctx.definitions_to_get.contains(&reference)
                || ctx.declarations.contains(&reference)
                || ctx.declarations_to_make.contains(&reference)
            {
                return;
            }
        }
        if let Some(declaring) = reference.declaring.clone() {
            if !self.contexts[id.0].definitions.contains(&declaring) {
                self.add_definition(id, declaring);
            }
            self.contexts[id.0].declarations.insert(reference);
        } else {
            self.contexts[id.0].declarations_to_make.insert(reference);
        }
    }

    /// Record a pending declaration for one of `id`'s own immediate nested types.
    ///
    /// Nested types are declared inside the enclosing body, never as namespace-level forward
    /// declarations; the planner recognizes them by hierarchy membership.
    pub fn add_nested_declaration(&mut self, id: ContextId, nested: TypeIdentityRc) {
        let ctx = &mut self.contexts[id.0];
        if ctx.definitions.contains(&nested) {
            return;
        }
        ctx.declarations_to_make.insert(nested);
    }

    /// Force `target` (and every ancestor up to `id`'s static root) to be emitted in place.
    ///
    /// Idempotent. A context newly marked in place inherits its declaring context's existing
    /// definitions, which trivially satisfies any matching pending includes.
    pub fn in_place_nested(&mut self, id: ContextId, target: ContextId) {
        let root = self.root_of(id);
        let mut cur = target;
        while cur != root {
            self.mark_in_place(cur);
            match self.contexts[cur.0].declaring {
                Some(declaring) => cur = declaring,
                None => break,
            }
        }
    }

    fn mark_in_place(&mut self, id: ContextId) {
        if self.contexts[id.0].in_place {
            return;
        }
        self.contexts[id.0].in_place = true;
        if let Some(declaring) = self.contexts[id.0].declaring {
            let inherited: Vec<TypeIdentityRc> = self.contexts[declaring.0]
                .definitions
                .iter()
                .cloned()
                .collect();
            let ctx = &mut self.contexts[id.0];
            for def in inherited {
                ctx.definitions_to_get.remove(&def);
                ctx.declarations.remove(&def);
                ctx.declarations_to_make.remove(&def);
                ctx.definitions.insert(def);
            }
        }
    }

    /// Transitively adopt the unresolved needs of every in-place nested context.
    ///
    /// An in-place nested body's pending includes and forward declarations become the
    /// enclosing file's. Runs as an explicit worklist loop to a fixed point, since adopting a
    /// need can itself force further contexts in place.
    pub fn absorb_in_place_needs(&mut self, id: ContextId) {
        loop {
            let mut pending_defs: Vec<TypeIdentityRc> = Vec::new();
            let mut pending_decls: Vec<TypeIdentityRc> = Vec::new();
            let mut work: Vec<ContextId> = self.contexts[id.0].nested.clone();
            while let Some(nested) = work.pop() {
                if !self.contexts[nested.0].in_place {
                    continue;
                }
                work.extend(self.contexts[nested.0].nested.iter().copied());
                let ctx = &mut self.contexts[nested.0];
                pending_defs.extend(ctx.definitions_to_get.drain());
                pending_decls.extend(ctx.declarations_to_make.drain());
                let stdint = ctx.needs_stdint;
                let primitives: Vec<String> = ctx.primitive_declarations.drain().collect();
                if stdint {
                    self.contexts[id.0].needs_stdint = true;
                }
                self.contexts[id.0].primitive_declarations.extend(primitives);
            }
            if pending_defs.is_empty() && pending_decls.is_empty() {
                return;
            }
            for def in pending_defs {
                self.add_definition(id, def);
            }
            for decl in pending_decls {
                self.add_declaration(id, decl);
            }
        }
    }
}
