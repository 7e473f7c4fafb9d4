//! Name resolution: turning a type reference into usable C++ text while recording the
//! dependency implied by using it.
//!
//! [`ContextGraph::request_name`] is the single entry point every consumer calls for field
//! types, method signatures and base lists. Asking for a name is never free: unless the
//! reference is a built-in substitution or a visible generic parameter, resolving it records
//! a definition or forward-declaration requirement on the requesting context.
//!
//! Qualified names are produced by walking the declaring chain from the outermost type
//! inward, substituting each level's generic parameters with the concrete arguments a
//! generic-instance reference supplies, or with the literal parameter names when the
//! reference is itself a template.

use std::collections::HashMap;

use crate::{
    emission::context::{ContextGraph, ContextId},
    model::{
        identity::{FastKey, TypeIdentityRc},
        types::{Refness, ResolvedTypeRc},
    },
    Error, Result,
};

/// How complete the requested reference must be at the use site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeedAs {
    /// A complete type is required
    Definition,
    /// A forward declaration suffices
    Declaration,
    /// Declaration when used through a pointer or with reference semantics, definition
    /// otherwise
    BestMatch,
}

/// Overrides applied to the rendered name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ForceAs {
    /// Normal rendering: primitive substitution, pointer suffix for reference semantics
    #[default]
    Default,
    /// The literal type name, as used in base-class lists: no primitive substitution and no
    /// pointer suffix
    Literal,
}

/// Parameters of one name request.
#[derive(Debug, Clone, Copy)]
pub struct NameRequest {
    /// Qualify through the namespace and declaring chain
    pub qualified: bool,
    /// Render the generic argument/parameter list
    pub generics: bool,
    /// Required completeness
    pub need_as: NeedAs,
    /// Rendering override
    pub force_as: ForceAs,
}

impl NameRequest {
    /// Qualified, generic name needed as a complete definition.
    #[must_use]
    pub fn definition() -> Self {
        NameRequest {
            qualified: true,
            generics: true,
            need_as: NeedAs::Definition,
            force_as: ForceAs::Default,
        }
    }

    /// Qualified, generic name needed only as a forward declaration.
    #[must_use]
    pub fn declaration() -> Self {
        NameRequest {
            need_as: NeedAs::Declaration,
            ..Self::definition()
        }
    }

    /// Qualified, generic name with completeness decided by usage shape.
    #[must_use]
    pub fn best_match() -> Self {
        NameRequest {
            need_as: NeedAs::BestMatch,
            ..Self::definition()
        }
    }

    /// Render as a literal (base-class) name.
    #[must_use]
    pub fn literal(mut self) -> Self {
        self.force_as = ForceAs::Literal;
        self
    }
}

/// The C++ template introducer for a (possibly nested) generic type, or `None` when the
/// identity declares no generics anywhere along its chain.
///
/// # Errors
///
/// [`Error::UnresolvedGenericBackref`] when the declaring chain's parameters cannot be
/// collected.
pub fn template_line(identity: &TypeIdentityRc) -> Result<Option<String>> {
    let params = identity.declared_generics(true)?;
    if params.is_empty() {
        return Ok(None);
    }
    let names: Vec<String> = params
        .iter()
        .map(|p| format!("typename {}", p.name))
        .collect();
    Ok(Some(format!("template<{}>", names.join(", "))))
}

impl ContextGraph<'_> {
    /// Produce a usable C++ name for `reference` within context `id`, recording the implied
    /// dependency.
    ///
    /// # Errors
    ///
    /// [`Error::UnresolvedType`] when the reference is neither a built-in substitution, a
    /// visible generic parameter, nor resolvable in the registry.
    /// [`Error::InconsistentGenericArity`] when a generic instance's argument count does not
    /// match its template's parameter count.
    pub fn request_name(
        &mut self,
        id: ContextId,
        reference: &TypeIdentityRc,
        request: NameRequest,
    ) -> Result<String> {
        if reference.is_void() {
            return Ok("void".to_string());
        }
        if request.force_as != ForceAs::Literal {
            if let Some(name) = self.convert_primitive(id, reference)? {
                return Ok(name);
            }
        }
        if reference.is_generic_parameter()
            || self.context(id).is_known_generic_parameter(reference)
        {
            return Ok(reference.name.clone());
        }

        let resolved = self
            .resolve_and_store(id, reference, request.need_as)?
            .ok_or_else(|| Error::UnresolvedType {
                context: self.context(id).identity.clone(),
                reference: reference.clone(),
            })?;

        let mut name = if request.qualified {
            self.qualified_generic_name(id, reference, &resolved, request.generics)?
        } else {
            let mut simple = reference.cpp_name();
            if request.generics && reference.is_generic() {
                simple.push_str(&self.rendered_generics(id, reference, &resolved)?);
            }
            simple
        };
        if request.force_as != ForceAs::Literal && resolved.refness == Refness::ReferenceType {
            name.push('*');
        }
        Ok(name)
    }

    /// Resolve `reference` and record it into the context's dependency sets.
    ///
    /// Returns `Ok(None)` when the registry has no entry, leaving the caller to decide
    /// whether that is fatal. Generic arguments are recursed as declarations; an argument
    /// that fails to resolve is tolerated, since the argument may be a foreign primitive the
    /// substitution layer already covers.
    pub fn resolve_and_store(
        &mut self,
        id: ContextId,
        reference: &TypeIdentityRc,
        need_as: NeedAs,
    ) -> Result<Option<ResolvedTypeRc>> {
        let Some(resolved) = self.registry().resolve(reference) else {
            return Ok(None);
        };
        match need_as {
            NeedAs::Definition => self.add_definition(id, reference.clone()),
            NeedAs::Declaration => self.add_declaration(id, reference.clone()),
            NeedAs::BestMatch => {
                if reference.is_pointer() || resolved.refness == Refness::ReferenceType {
                    self.add_declaration(id, reference.clone());
                } else {
                    self.add_definition(id, reference.clone());
                }
            }
        }
        for arg in reference.generics_list().to_vec() {
            if arg.is_generic_parameter() || self.context(id).is_known_generic_parameter(&arg) {
                continue;
            }
            let _ = self.resolve_and_store(id, &arg, NeedAs::Declaration)?;
        }
        Ok(Some(resolved))
    }

    /// Substitute built-in forms: `void`, fixed-width integer aliases, the managed
    /// object/string wrappers, and the array-wrapper template. These never enter the
    /// dependency graph as ordinary types, though array and pointer element types still
    /// recursively need (at least) a declaration.
    fn convert_primitive(
        &mut self,
        id: ContextId,
        reference: &TypeIdentityRc,
    ) -> Result<Option<String>> {
        let name = if reference.is_array() {
            let element = reference.element.clone().ok_or_else(|| {
                Error::Error(format!("array reference {reference} has no element type"))
            })?;
            let element_name = self.request_name(id, &element, NameRequest::best_match())?;
            Some(format!("::Array<{element_name}>"))
        } else if reference.is_pointer() {
            let element = reference.element.clone().ok_or_else(|| {
                Error::Error(format!("pointer reference {reference} has no element type"))
            })?;
            let element_name = self.request_name(id, &element, NameRequest::declaration())?;
            Some(format!("{element_name}*"))
        } else if reference.namespace == "System" {
            match reference.name.as_str() {
                "Void" => Some("void".to_string()),
                "Boolean" => Some("bool".to_string()),
                "Byte" => Some("uint8_t".to_string()),
                "SByte" => Some("int8_t".to_string()),
                "Char" => Some("char16_t".to_string()),
                "Int16" => Some("int16_t".to_string()),
                "UInt16" => Some("uint16_t".to_string()),
                "Int32" => Some("int32_t".to_string()),
                "UInt32" => Some("uint32_t".to_string()),
                "Int64" => Some("int64_t".to_string()),
                "UInt64" => Some("uint64_t".to_string()),
                "Single" => Some("float".to_string()),
                "Double" => Some("double".to_string()),
                "IntPtr" => Some("intptr_t".to_string()),
                "UIntPtr" => Some("uintptr_t".to_string()),
                "Object" => Some("::CsObject".to_string()),
                "String" => Some("::CsString".to_string()),
                _ => None,
            }
        } else {
            None
        };
        let Some(mut name) = name else {
            return Ok(None);
        };
        if name.ends_with("_t") {
            self.context_mut(id).needs_stdint = true;
        }
        if name.starts_with("::Cs") || name.starts_with("::Array<") {
            // The wrappers are reference types: forward-declare them and use them through a
            // pointer.
            let alias: String = name[2..]
                .chars()
                .take_while(|c| *c != '<' && *c != '*')
                .collect();
            self.context_mut(id).primitive_declarations.insert(alias);
            name.push('*');
        }
        Ok(Some(name))
    }

    /// The fully qualified name of `reference`, walking the declaring chain outward-in and
    /// substituting each level's generic parameters.
    fn qualified_generic_name(
        &mut self,
        id: ContextId,
        reference: &TypeIdentityRc,
        resolved: &ResolvedTypeRc,
        want_generics: bool,
    ) -> Result<String> {
        let template = resolved.identity.clone();
        let declared = template.declared_generics(true)?;
        let substitution = self.argument_substitution(reference, &declared)?;

        let levels = template.generic_map(true);
        let mut segments: Vec<String> = Vec::new();
        for (level, introduced) in levels.iter().rev() {
            let mut segment = level.cpp_name();
            if want_generics && !introduced.is_empty() {
                let mut rendered: Vec<String> = Vec::new();
                for param in introduced {
                    match &substitution {
                        Some(map) => {
                            let arg = map
                                .get(&FastKey(param.clone()))
                                .cloned()
                                .unwrap_or_else(|| param.clone());
                            rendered.push(self.request_name(
                                id,
                                &arg,
                                NameRequest::declaration(),
                            )?);
                        }
                        None => rendered.push(param.name.clone()),
                    }
                }
                segment.push_str(&format!("<{}>", rendered.join(", ")));
            }
            segments.push(segment);
        }
        let namespace = levels
            .last()
            .map_or_else(|| template.cpp_namespace(), |(outermost, _)| outermost.cpp_namespace());
        Ok(format!("::{namespace}::{}", segments.join("::")))
    }

    /// Positional mapping from the template's declared parameters to this reference's
    /// arguments, or `None` when the reference is the template itself.
    ///
    /// # Errors
    ///
    /// [`Error::InconsistentGenericArity`] when argument and parameter counts diverge after
    /// removing exact template parameters from the raw argument list.
    fn argument_substitution(
        &self,
        reference: &TypeIdentityRc,
        declared: &[TypeIdentityRc],
    ) -> Result<Option<HashMap<FastKey, TypeIdentityRc>>> {
        if !reference.is_generic_instance() {
            return Ok(None);
        }
        let args = reference.generics_list();
        let concrete: Vec<TypeIdentityRc> = args
            .iter()
            .filter(|a| !declared.iter().any(|d| d.fast_eq(a)))
            .cloned()
            .collect();
        if concrete.is_empty() {
            // Every argument is the template's own parameter: the reference is effectively
            // the template itself.
            return Ok(None);
        }
        if concrete.len() != args.len() || args.len() != declared.len() {
            return Err(Error::InconsistentGenericArity {
                reference: reference.clone(),
                params: declared.len(),
                args: concrete.len(),
            });
        }
        let mut map = HashMap::new();
        for (param, arg) in declared.iter().zip(args) {
            map.insert(FastKey(param.clone()), arg.clone());
        }
        Ok(Some(map))
    }

    /// The generic suffix (`<...>`) for an unqualified rendering of `reference`.
    fn rendered_generics(
        &mut self,
        id: ContextId,
        reference: &TypeIdentityRc,
        resolved: &ResolvedTypeRc,
    ) -> Result<String> {
        let declared = resolved.identity.declared_generics(true)?;
        let substitution = self.argument_substitution(reference, &declared)?;
        let mut rendered: Vec<String> = Vec::new();
        match substitution {
            Some(_) => {
                for arg in reference.generics_list().to_vec() {
                    rendered.push(self.request_name(id, &arg, NameRequest::declaration())?);
                }
            }
            None => {
                for param in reference.generics_list() {
                    rendered.push(param.name.clone());
                }
            }
        }
        Ok(format!("<{}>", rendered.join(", ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emission::EmitConfig;
    use crate::model::{
        builder::{IdentityBuilder, TypeBuilder},
        identity::TypeIdentity,
        TypeRegistry,
    };

    fn graph_fixture(registry: &TypeRegistry) -> ContextGraph<'_> {
        ContextGraph::build(registry, EmitConfig::default()).unwrap()
    }

    fn consumer(registry: &mut TypeRegistry) -> TypeIdentityRc {
        let identity = TypeIdentity::plain("Game", "Consumer");
        registry
            .insert(TypeBuilder::class(identity.clone()).build())
            .unwrap();
        identity
    }

    #[test]
    fn test_primitive_substitution() {
        let mut registry = TypeRegistry::new();
        let consumer = consumer(&mut registry);
        let mut graph = graph_fixture(&registry);
        let id = graph.context_of(&consumer).unwrap();

        let int32 = TypeIdentity::plain("System", "Int32");
        let name = graph
            .request_name(id, &int32, NameRequest::best_match())
            .unwrap();
        assert_eq!(name, "int32_t");
        assert!(graph.context(id).needs_stdint);
        // Built-ins never enter the dependency graph.
        assert!(!graph.context(id).definitions_to_get.contains(&int32));

        let string = TypeIdentity::plain("System", "String");
        let name = graph
            .request_name(id, &string, NameRequest::best_match())
            .unwrap();
        assert_eq!(name, "::CsString*");
        assert!(graph.context(id).primitive_declarations.contains("CsString"));
    }

    #[test]
    fn test_array_wraps_element() {
        let mut registry = TypeRegistry::new();
        let consumer = consumer(&mut registry);
        let mut graph = graph_fixture(&registry);
        let id = graph.context_of(&consumer).unwrap();

        let arr = TypeIdentity::array_of(TypeIdentity::plain("System", "Int32"));
        let name = graph
            .request_name(id, &arr, NameRequest::best_match())
            .unwrap();
        assert_eq!(name, "::Array<int32_t>*");
        assert!(graph.context(id).primitive_declarations.contains("Array"));
    }

    #[test]
    fn test_generic_parameters_bypass_the_graph() {
        let mut registry = TypeRegistry::new();
        let boxed = IdentityBuilder::new("Game", "Box`1")
            .generic_parameters(["T"])
            .build();
        registry
            .insert(TypeBuilder::class(boxed.clone()).build())
            .unwrap();
        let mut graph = graph_fixture(&registry);
        let id = graph.context_of(&boxed).unwrap();

        let t = boxed.generics_list()[0].clone();
        let name = graph
            .request_name(id, &t, NameRequest::best_match())
            .unwrap();
        assert_eq!(name, "T");
        assert!(graph.context(id).declarations_to_make.is_empty());
    }

    #[test]
    fn test_reference_semantics_append_pointer() {
        let mut registry = TypeRegistry::new();
        let consumer = consumer(&mut registry);
        let target = TypeIdentity::plain("Game", "Target");
        registry
            .insert(TypeBuilder::class(target.clone()).build())
            .unwrap();
        let mut graph = graph_fixture(&registry);
        let id = graph.context_of(&consumer).unwrap();

        let name = graph
            .request_name(id, &target, NameRequest::best_match())
            .unwrap();
        assert_eq!(name, "::Game::Target*");
        // Reference semantics resolve BestMatch to a declaration.
        assert!(graph.context(id).declarations_to_make.contains(&target));
        assert!(!graph.context(id).definitions_to_get.contains(&target));
    }

    #[test]
    fn test_value_semantics_need_a_definition() {
        let mut registry = TypeRegistry::new();
        let consumer = consumer(&mut registry);
        let target = TypeIdentity::plain("Game", "Pos");
        registry
            .insert(TypeBuilder::value_type(target.clone()).build())
            .unwrap();
        let mut graph = graph_fixture(&registry);
        let id = graph.context_of(&consumer).unwrap();

        let name = graph
            .request_name(id, &target, NameRequest::best_match())
            .unwrap();
        assert_eq!(name, "::Game::Pos");
        assert!(graph.context(id).definitions_to_get.contains(&target));
    }

    #[test]
    fn test_literal_rendering_for_bases() {
        let mut registry = TypeRegistry::new();
        let consumer = consumer(&mut registry);
        let object = TypeIdentity::plain("System", "Object");
        registry
            .insert(TypeBuilder::class(object.clone()).build())
            .unwrap();
        let mut graph = graph_fixture(&registry);
        let id = graph.context_of(&consumer).unwrap();

        let name = graph
            .request_name(id, &object, NameRequest::definition().literal())
            .unwrap();
        // Literal rendering skips the primitive substitution and the pointer suffix.
        assert_eq!(name, "::System::Object");
        assert!(graph.context(id).definitions_to_get.contains(&object));
    }

    #[test]
    fn test_generic_instance_substitutes_arguments() {
        let mut registry = TypeRegistry::new();
        let consumer = consumer(&mut registry);
        let list = IdentityBuilder::new("System.Collections.Generic", "List`1")
            .generic_parameters(["T"])
            .build();
        registry
            .insert(TypeBuilder::class(list.clone()).build())
            .unwrap();
        let mut graph = graph_fixture(&registry);
        let id = graph.context_of(&consumer).unwrap();

        let instance = IdentityBuilder::new("System.Collections.Generic", "List`1")
            .generic_arguments([TypeIdentity::plain("System", "Int32")])
            .build();
        let name = graph
            .request_name(id, &instance, NameRequest::best_match())
            .unwrap();
        assert_eq!(name, "::System::Collections::Generic::List_1<int32_t>*");
    }

    #[test]
    fn test_template_reference_uses_literal_parameters() {
        let mut registry = TypeRegistry::new();
        let consumer = consumer(&mut registry);
        let list = IdentityBuilder::new("System.Collections.Generic", "List`1")
            .generic_parameters(["T"])
            .build();
        registry
            .insert(TypeBuilder::class(list.clone()).build())
            .unwrap();
        let mut graph = graph_fixture(&registry);
        let id = graph.context_of(&consumer).unwrap();

        let name = graph
            .request_name(id, &list, NameRequest::best_match())
            .unwrap();
        assert_eq!(name, "::System::Collections::Generic::List_1<T>*");
    }

    #[test]
    fn test_unresolved_generic_argument_is_fatal() {
        let mut registry = TypeRegistry::new();
        let consumer = consumer(&mut registry);
        let list = IdentityBuilder::new("System.Collections.Generic", "List`1")
            .generic_parameters(["T"])
            .build();
        registry
            .insert(TypeBuilder::class(list).build())
            .unwrap();
        let mut graph = graph_fixture(&registry);
        let id = graph.context_of(&consumer).unwrap();

        // The instance resolves to its template, but the argument resolves to nothing.
        let instance = IdentityBuilder::new("System.Collections.Generic", "List`1")
            .generic_arguments([TypeIdentity::plain("Game", "Nowhere")])
            .build();
        let err = graph
            .request_name(id, &instance, NameRequest::best_match())
            .unwrap_err();
        assert!(matches!(err, Error::UnresolvedType { .. }));
    }

    #[test]
    fn test_arity_mismatch_is_fatal() {
        let mut registry = TypeRegistry::new();
        let consumer = consumer(&mut registry);
        let pair = IdentityBuilder::new("Game", "Pair`2")
            .generic_parameters(["K", "V"])
            .build();
        registry
            .insert(TypeBuilder::class(pair.clone()).build())
            .unwrap();
        let mut graph = graph_fixture(&registry);
        let id = graph.context_of(&consumer).unwrap();

        let bad = IdentityBuilder::new("Game", "Pair`2")
            .generic_arguments([TypeIdentity::plain("System", "Int32")])
            .build();
        let err = graph
            .request_name(id, &bad, NameRequest::best_match())
            .unwrap_err();
        assert!(matches!(err, Error::InconsistentGenericArity { .. }));
    }

    #[test]
    fn test_definition_then_declaration_is_stable() {
        let mut registry = TypeRegistry::new();
        let consumer = consumer(&mut registry);
        let target = TypeIdentity::plain("Game", "Pos");
        registry
            .insert(TypeBuilder::value_type(target.clone()).build())
            .unwrap();
        let mut graph = graph_fixture(&registry);
        let id = graph.context_of(&consumer).unwrap();

        graph
            .request_name(id, &target, NameRequest::definition())
            .unwrap();
        let snapshot = (
            graph.context(id).definitions.len(),
            graph.context(id).definitions_to_get.len(),
            graph.context(id).declarations.len(),
            graph.context(id).declarations_to_make.len(),
        );
        graph
            .request_name(id, &target, NameRequest::declaration())
            .unwrap();
        let after = (
            graph.context(id).definitions.len(),
            graph.context(id).definitions_to_get.len(),
            graph.context(id).declarations.len(),
            graph.context(id).declarations_to_make.len(),
        );
        assert_eq!(snapshot, after);
    }

    #[test]
    fn test_unresolved_reference_is_fatal() {
        let mut registry = TypeRegistry::new();
        let consumer = consumer(&mut registry);
        let mut graph = graph_fixture(&registry);
        let id = graph.context_of(&consumer).unwrap();

        let missing = TypeIdentity::plain("Game", "Nowhere");
        let err = graph
            .request_name(id, &missing, NameRequest::best_match())
            .unwrap_err();
        assert!(matches!(err, Error::UnresolvedType { .. }));
    }

    #[test]
    fn test_template_line() {
        let boxed = IdentityBuilder::new("Game", "Box`2")
            .generic_parameters(["T", "U"])
            .build();
        assert_eq!(
            template_line(&boxed).unwrap().unwrap(),
            "template<typename T, typename U>"
        );
        let plain = TypeIdentity::plain("Game", "Plain");
        assert!(template_line(&plain).unwrap().is_none());
    }
}
