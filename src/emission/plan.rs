//! Final per-file planning: include sets, stratified forward declarations and the
//! in-place nesting tree.
//!
//! The [`Planner`] runs after every context's members have been reduced. For each
//! file-owning context (one that is not emitted in place) it produces one
//! [`FileEmissionPlan`] per output kind, computed once and cached; the header plan is
//! authoritative and absorbs in-place needs, while the source plan reads the settled sets
//! without mutating them again.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use crate::{
    emission::{
        context::{ContextGraph, ContextId},
        members::{fix_duplicate_definition, resolve_members, MemberPlan},
        naming::template_line,
        OutputKind,
    },
    model::identity::TypeIdentityRc,
    Error, Result,
};

/// One namespace-level forward declaration.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ForwardDeclare {
    /// The declared type's C++ name
    pub name: String,
    /// `class` or `struct`
    pub keyword: &'static str,
    /// Template introducer for generic templates
    pub template_line: Option<String>,
}

/// The final plan for one output file.
#[derive(Debug)]
pub struct FileEmissionPlan {
    /// The context this file belongs to
    pub context: ContextId,
    /// Header or source
    pub kind: OutputKind,
    /// Include paths, sorted for deterministic output
    pub includes: BTreeSet<String>,
    /// Forward declarations grouped by C++ namespace
    pub forward_declares: BTreeMap<String, BTreeSet<ForwardDeclare>>,
    /// Built-in wrapper types to forward-declare at global scope
    pub primitive_declarations: BTreeSet<String>,
    /// `true` if the file must include the fixed-width integer header
    pub needs_stdint: bool,
    /// Indices of methods that must be emitted as per-overload specializations to break a
    /// duplicate-definition conflict
    pub specialized_methods: Vec<usize>,
}

/// Everything the writer needs for one type: reduced members plus the file plans.
///
/// In-place contexts carry members only; their file plans are owned by the enclosing
/// file-owning ancestor.
#[derive(Debug)]
pub struct TypePlan {
    /// The planned context
    pub context: ContextId,
    /// Members reduced to text
    pub members: MemberPlan,
    /// Header plan, absent for in-place contexts
    pub header: Option<Arc<FileEmissionPlan>>,
    /// Source plan, absent for in-place contexts
    pub source: Option<Arc<FileEmissionPlan>>,
}

/// Computes and caches [`FileEmissionPlan`]s over a resolved [`ContextGraph`].
#[derive(Default)]
pub struct Planner {
    headers: HashMap<ContextId, Arc<FileEmissionPlan>>,
    sources: HashMap<ContextId, Arc<FileEmissionPlan>>,
}

impl Planner {
    /// Create an empty planner.
    #[must_use]
    pub fn new() -> Self {
        Planner::default()
    }

    /// Reduce every context's members, then plan every file-owning context.
    ///
    /// The member pass must complete for the whole graph before any file is planned, since
    /// in-place forcing triggered by one type's members can change which files exist at all.
    ///
    /// # Errors
    ///
    /// Propagates every planning failure; see [`Planner::resolve`].
    pub fn resolve_all(&mut self, graph: &mut ContextGraph) -> Result<Vec<TypePlan>> {
        let ids: Vec<ContextId> = graph.ids().collect();
        let mut members: HashMap<ContextId, MemberPlan> = HashMap::new();
        for id in &ids {
            members.insert(*id, resolve_members(graph, *id)?);
        }

        let mut plans = Vec::with_capacity(ids.len());
        for id in ids {
            let (header, source) = if graph.context(id).in_place {
                (None, None)
            } else {
                (
                    Some(self.resolve(graph, id, OutputKind::Header)?),
                    Some(self.resolve(graph, id, OutputKind::Source)?),
                )
            };
            let member_plan = members
                .remove(&id)
                .ok_or_else(|| Error::Error("member plan missing for context".to_string()))?;
            plans.push(TypePlan {
                context: id,
                members: member_plan,
                header,
                source,
            });
        }
        Ok(plans)
    }

    /// Compute (or fetch the cached) plan for one context and output kind.
    ///
    /// # Errors
    ///
    /// [`Error::UnresolvedType`] when a required definition's owning context cannot be
    /// found; [`Error::InvalidForwardDeclare`] when a declaration request survived for a
    /// nested type outside this context's hierarchy;
    /// [`Error::DuplicateDefinitionConflict`] when an include would define this type and the
    /// conflict is not confined to method signatures.
    pub fn resolve(
        &mut self,
        graph: &mut ContextGraph,
        id: ContextId,
        kind: OutputKind,
    ) -> Result<Arc<FileEmissionPlan>> {
        let cache = match kind {
            OutputKind::Header => &self.headers,
            OutputKind::Source => &self.sources,
        };
        if let Some(plan) = cache.get(&id) {
            return Ok(plan.clone());
        }

        // Plan nested file-owning contexts bottom-up; in-place descendants are drained into
        // this file by absorption instead.
        for nested in graph.context(id).nested.clone() {
            if !graph.context(nested).in_place {
                self.resolve(graph, nested, kind)?;
            }
        }

        let plan = match kind {
            OutputKind::Header => Arc::new(self.resolve_header(graph, id)?),
            OutputKind::Source => Arc::new(self.resolve_source(graph, id)?),
        };
        match kind {
            OutputKind::Header => self.headers.insert(id, plan.clone()),
            OutputKind::Source => self.sources.insert(id, plan.clone()),
        };
        Ok(plan)
    }

    fn resolve_header(&mut self, graph: &mut ContextGraph, id: ContextId) -> Result<FileEmissionPlan> {
        graph.absorb_in_place_needs(id);
        let self_identity = graph.context(id).identity.clone();
        let own_file = graph.context(id).header_file();

        let mut includes: BTreeSet<String> = BTreeSet::new();
        let mut specialized_methods: Vec<usize> = Vec::new();
        let mut satisfied: Vec<TypeIdentityRc> = Vec::new();

        for def in graph.context(id).definitions_to_get.clone() {
            let owner = graph
                .context_of(&def)
                .ok_or_else(|| Error::UnresolvedType {
                    context: self_identity.clone(),
                    reference: def.clone(),
                })?;
            let file = graph.owning_file_of(owner);
            let file_name = graph.context(file).header_file();
            if file == id || file_name == own_file {
                satisfied.push(def);
                continue;
            }
            if graph.context(file).definitions.contains(&self_identity) {
                // The include would define this type too. Demote the offender to a forward
                // declaration and specialize the methods that mention it; a field-level
                // occurrence makes this unrepairable.
                specialized_methods.extend(fix_duplicate_definition(graph, id, &def)?);
                graph.context_mut(id).definitions_to_get.remove(&def);
                graph.add_declaration(id, def);
                continue;
            }
            includes.insert(file_name);
            satisfied.push(def.clone());
            // Everything the include defines is now defined here as well.
            let folded: Vec<TypeIdentityRc> =
                graph.context(file).definitions.iter().cloned().collect();
            let ctx = graph.context_mut(id);
            for extra in folded {
                if extra == def {
                    continue;
                }
                ctx.definitions_to_get.remove(&extra);
                ctx.declarations.remove(&extra);
                ctx.declarations_to_make.remove(&extra);
                ctx.definitions.insert(extra);
            }
        }
        {
            let ctx = graph.context_mut(id);
            for def in satisfied {
                ctx.definitions_to_get.remove(&def);
                ctx.definitions.insert(def);
            }
        }

        let mut forward_declares: BTreeMap<String, BTreeSet<ForwardDeclare>> = BTreeMap::new();
        if graph.context(id).declaring.is_none() {
            // A root header forward-declares its own type ahead of the definition.
            let ctx = graph.context(id);
            forward_declares
                .entry(self_identity.cpp_namespace())
                .or_default()
                .insert(ForwardDeclare {
                    name: self_identity.cpp_name(),
                    keyword: ctx.resolved.kind.cpp_keyword(),
                    template_line: template_line(&self_identity)?,
                });
        }
        for decl in graph.context(id).declarations_to_make.clone() {
            if let Some(owner) = graph.context_of(&decl) {
                let file = graph.owning_file_of(owner);
                if includes.contains(&graph.context(file).header_file()) {
                    // Already covered by an include.
                    continue;
                }
            }
            if decl.declaring.is_some() {
                match graph.context_of(&decl) {
                    Some(target) if graph.has_in_nested_hierarchy(id, target) => continue,
                    _ => {
                        return Err(Error::InvalidForwardDeclare {
                            context: self_identity,
                            reference: decl,
                        })
                    }
                }
            }
            let keyword = graph
                .registry()
                .resolve(&decl)
                .map_or("class", |resolved| resolved.kind.cpp_keyword());
            forward_declares
                .entry(decl.cpp_namespace())
                .or_default()
                .insert(ForwardDeclare {
                    name: decl.cpp_name(),
                    keyword,
                    template_line: template_line(&decl)?,
                });
        }

        let ctx = graph.context(id);
        Ok(FileEmissionPlan {
            context: id,
            kind: OutputKind::Header,
            includes,
            forward_declares,
            primitive_declarations: ctx.primitive_declarations.iter().cloned().collect(),
            needs_stdint: ctx.needs_stdint,
            specialized_methods,
        })
    }

    /// The source plan: the context's own header plus a full definition for every type the
    /// header only forward-declared, since method bodies dereference what signatures could
    /// leave incomplete. No forward declarations of its own.
    fn resolve_source(&mut self, graph: &mut ContextGraph, id: ContextId) -> Result<FileEmissionPlan> {
        let header = self.resolve(graph, id, OutputKind::Header)?;
        let mut includes: BTreeSet<String> = BTreeSet::new();
        includes.insert(graph.context(id).header_file());

        let ctx = graph.context(id);
        let self_identity = ctx.identity.clone();
        let wanted: Vec<TypeIdentityRc> = ctx
            .declarations_to_make
            .iter()
            .chain(ctx.declarations.iter())
            .filter(|decl| !ctx.definitions.contains(*decl))
            .cloned()
            .collect();
        for decl in wanted {
            let owner = graph
                .context_of(&decl)
                .ok_or_else(|| Error::UnresolvedType {
                    context: self_identity.clone(),
                    reference: decl.clone(),
                })?;
            let file = graph.owning_file_of(owner);
            includes.insert(graph.context(file).header_file());
        }

        Ok(FileEmissionPlan {
            context: id,
            kind: OutputKind::Source,
            includes,
            forward_declares: BTreeMap::new(),
            primitive_declarations: header.primitive_declarations.clone(),
            needs_stdint: header.needs_stdint,
            specialized_methods: header.specialized_methods.clone(),
        })
    }
}
