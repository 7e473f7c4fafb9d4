//! Reduction of a type's members to resolved textual form.
//!
//! This pass walks bases, fields and methods through [`ContextGraph::request_name`], which
//! both produces the text the writer will print and records every dependency the members
//! imply. Base classes are structural: the parent must come first, then the de-duplicated
//! interfaces in registry order, because that order governs field-offset validity in the
//! generated layout. Member-level failures are subject to the configured
//! [`OnUnresolved`](crate::emission::OnUnresolved) policy; base-level failures never are.

use crate::{
    emission::{
        context::{ContextGraph, ContextId},
        naming::{template_line, NameRequest},
        OnUnresolved,
    },
    model::{identity::TypeIdentityRc, types::MemberSpecifiers},
    Error, Result,
};

/// One field reduced to text.
#[derive(Debug, Clone)]
pub struct FieldPlan {
    /// Field name
    pub name: String,
    /// Resolved C++ type text
    pub type_name: String,
    /// Metadata byte offset, `-1` if unknown
    pub offset: i32,
    /// `true` for static fields
    pub is_static: bool,
}

/// One method reduced to text.
#[derive(Debug, Clone)]
pub struct MethodPlan {
    /// Method name
    pub name: String,
    /// Resolved return type text
    pub return_type: String,
    /// Parameter (name, resolved type text) pairs in order
    pub parameters: Vec<(String, String)>,
}

/// One property reduced to text. Accessors become methods in the output, so only the type
/// and accessor shape survive planning.
#[derive(Debug, Clone)]
pub struct PropertyPlan {
    /// Property name
    pub name: String,
    /// Resolved C++ type text
    pub type_name: String,
    /// `true` if a getter exists
    pub has_getter: bool,
    /// `true` if a setter exists
    pub has_setter: bool,
}

/// The constraints of one generic parameter, reduced to text for the writer's
/// documentation block.
#[derive(Debug, Clone)]
pub struct ConstraintPlan {
    /// The constrained parameter's name
    pub parameter: String,
    /// Resolved constraint type names
    pub constraints: Vec<String>,
}

/// A member skipped under [`OnUnresolved::Stub`], kept for diagnostics.
#[derive(Debug, Clone)]
pub struct MemberStub {
    /// The skipped member's name
    pub member: String,
    /// The reference that failed to resolve
    pub reference: TypeIdentityRc,
}

/// A type's members reduced to resolved textual form, ready for the writer.
#[derive(Debug)]
pub struct MemberPlan {
    /// The context these members belong to
    pub context: ContextId,
    /// C++ template introducer, absent for non-generic types
    pub template_line: Option<String>,
    /// `class` or `struct`
    pub kind_keyword: &'static str,
    /// The type's own C++ name, unqualified
    pub name: String,
    /// Base-class names: parent first, then unique interfaces in registry order
    pub bases: Vec<String>,
    /// Fields in layout order
    pub fields: Vec<FieldPlan>,
    /// Methods in declaration order
    pub methods: Vec<MethodPlan>,
    /// Properties in declaration order
    pub properties: Vec<PropertyPlan>,
    /// Constraints of the generic parameters this type itself introduces
    pub constraints: Vec<ConstraintPlan>,
    /// Members skipped under the stub policy
    pub stubs: Vec<MemberStub>,
}

/// Reduce the members of context `id`, recording every implied dependency on it.
///
/// # Errors
///
/// [`Error::UnresolvedType`] for unresolvable bases always, and for unresolvable member
/// references under [`OnUnresolved::Fail`]; [`Error::InconsistentGenericArity`] and
/// [`Error::UnresolvedGenericBackref`] propagate unconditionally.
pub fn resolve_members(graph: &mut ContextGraph, id: ContextId) -> Result<MemberPlan> {
    let resolved = graph.context(id).resolved.clone();
    let identity = graph.context(id).identity.clone();
    let policy = graph.config().on_unresolved;

    let mut bases = Vec::new();
    if let Some(parent) = &resolved.parent {
        // System.ValueType is the one type that extends System.Object without the object
        // header fields; every other type names its real parent.
        if identity.namespace == "System" && identity.name == "ValueType" {
            bases.push("::System::Object".to_string());
        } else {
            bases.push(graph.request_name(id, parent, NameRequest::definition().literal())?);
        }
    }
    for interface in graph.context(id).unique_interfaces.clone() {
        bases.push(graph.request_name(id, &interface, NameRequest::definition().literal())?);
    }

    let mut fields = Vec::new();
    let mut stubs = Vec::new();
    for field in &resolved.fields {
        match graph.request_name(id, &field.ty, NameRequest::best_match()) {
            Ok(type_name) => fields.push(FieldPlan {
                name: field.name.clone(),
                type_name,
                offset: field.offset,
                is_static: field.specifiers.contains(MemberSpecifiers::STATIC),
            }),
            Err(Error::UnresolvedType { reference, .. }) if policy == OnUnresolved::Stub => {
                stubs.push(MemberStub {
                    member: field.name.clone(),
                    reference,
                });
            }
            Err(err) => return Err(err),
        }
    }

    let mut methods = Vec::new();
    for method in &resolved.methods {
        match reduce_method(graph, id, method) {
            Ok(plan) => methods.push(plan),
            Err(Error::UnresolvedType { reference, .. }) if policy == OnUnresolved::Stub => {
                stubs.push(MemberStub {
                    member: method.name.clone(),
                    reference,
                });
            }
            Err(err) => return Err(err),
        }
    }

    let mut properties = Vec::new();
    for property in &resolved.properties {
        match graph.request_name(id, &property.ty, NameRequest::best_match()) {
            Ok(type_name) => properties.push(PropertyPlan {
                name: property.name.clone(),
                type_name,
                has_getter: property.has_getter,
                has_setter: property.has_setter,
            }),
            Err(Error::UnresolvedType { reference, .. }) if policy == OnUnresolved::Stub => {
                stubs.push(MemberStub {
                    member: property.name.clone(),
                    reference,
                });
            }
            Err(err) => return Err(err),
        }
    }

    // Constraints are informational (the writer prints them as documentation), so an
    // unresolvable constraint falls back to its raw qualified form instead of failing.
    let mut constraints = Vec::new();
    for param in &resolved.generic_params {
        if param.constraints.is_empty() {
            continue;
        }
        let mut names = Vec::new();
        for constraint in &param.constraints {
            match graph.request_name(id, constraint, NameRequest::declaration()) {
                Ok(name) => names.push(name),
                Err(Error::UnresolvedType { .. }) => {
                    names.push(constraint.qualified_cpp_name());
                }
                Err(err) => return Err(err),
            }
        }
        constraints.push(ConstraintPlan {
            parameter: param.identity.name.clone(),
            constraints: names,
        });
    }

    Ok(MemberPlan {
        context: id,
        template_line: template_line(&identity)?,
        kind_keyword: resolved.kind.cpp_keyword(),
        name: identity.cpp_name(),
        bases,
        fields,
        methods,
        properties,
        constraints,
        stubs,
    })
}

fn reduce_method(
    graph: &mut ContextGraph,
    id: ContextId,
    method: &crate::model::types::Method,
) -> Result<MethodPlan> {
    let return_type = graph.request_name(id, &method.return_type, NameRequest::best_match())?;
    let mut parameters = Vec::new();
    for param in &method.parameters {
        let type_name = graph.request_name(id, &param.ty, NameRequest::best_match())?;
        parameters.push((param.name.clone(), type_name));
    }
    Ok(MethodPlan {
        name: method.name.clone(),
        return_type,
        parameters,
    })
}

/// Attempt to repair a duplicate-definition conflict by confining `offender` to method
/// signatures, which the writer can specialize per overload.
///
/// Returns the indices of the methods whose signatures mention the offender.
///
/// # Errors
///
/// [`Error::DuplicateDefinitionConflict`] when the offender appears in a field (fields pin
/// the layout and cannot be specialized) or in no member at all.
pub fn fix_duplicate_definition(
    graph: &ContextGraph,
    id: ContextId,
    offender: &TypeIdentityRc,
) -> Result<Vec<usize>> {
    let ctx = graph.context(id);
    for field in &ctx.resolved.fields {
        if field.ty.contains(offender) {
            return Err(Error::DuplicateDefinitionConflict {
                context: ctx.identity.clone(),
                offender: offender.clone(),
                member: field.name.clone(),
            });
        }
    }
    let mut specialized = Vec::new();
    for (index, method) in ctx.resolved.methods.iter().enumerate() {
        if method.return_type.contains(offender)
            || method.parameters.iter().any(|p| p.ty.contains(offender))
        {
            specialized.push(index);
        }
    }
    if specialized.is_empty() {
        return Err(Error::DuplicateDefinitionConflict {
            context: ctx.identity.clone(),
            offender: offender.clone(),
            member: "<none>".to_string(),
        });
    }
    Ok(specialized)
}
