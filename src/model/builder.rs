//! Fluent construction of identities and resolved types.
//!
//! The builders exist for the ingestion layer and for tests: they keep the struct literals for
//! [`TypeIdentity`] and [`ResolvedType`] out of calling code while preserving the invariant
//! that both are immutable once built.

use std::sync::Arc;

use crate::model::{
    identity::{Generics, IdentityForm, TypeIdentity, TypeIdentityRc},
    types::{
        Field, GenericParam, MemberSpecifiers, Method, Parameter, Property, Refness,
        ResolvedType, TypeKind,
    },
};

/// Builder for [`TypeIdentity`] values.
///
/// ```
/// use dotbridge::model::builder::IdentityBuilder;
///
/// let list = IdentityBuilder::new("System.Collections.Generic", "List`1")
///     .generic_parameters(["T"])
///     .build();
/// assert!(list.is_generic_template());
/// ```
#[derive(Debug)]
pub struct IdentityBuilder {
    namespace: String,
    name: String,
    declaring: Option<TypeIdentityRc>,
    generics: Generics,
    form: IdentityForm,
}

impl IdentityBuilder {
    /// Start building a plain identity.
    #[must_use]
    pub fn new(namespace: &str, name: &str) -> Self {
        IdentityBuilder {
            namespace: namespace.to_string(),
            name: name.to_string(),
            declaring: None,
            generics: Generics::None,
            form: IdentityForm::Plain,
        }
    }

    /// Set the declaring (enclosing) type.
    #[must_use]
    pub fn declaring(mut self, declaring: TypeIdentityRc) -> Self {
        self.declaring = Some(declaring);
        self
    }

    /// Declare unbound generic parameters by name. The parameters' declaring type is filled in
    /// at [`IdentityBuilder::build`] time.
    #[must_use]
    pub fn generic_parameters<'a>(mut self, names: impl IntoIterator<Item = &'a str>) -> Self {
        self.generics = Generics::Parameters(
            names
                .into_iter()
                .map(|n| TypeIdentity::generic_parameter(n, None))
                .collect(),
        );
        self
    }

    /// Supply concrete generic arguments, producing an instance reference.
    #[must_use]
    pub fn generic_arguments(mut self, args: impl IntoIterator<Item = TypeIdentityRc>) -> Self {
        self.generics = Generics::Arguments(args.into_iter().collect());
        self
    }

    /// Finish and share the identity.
    #[must_use]
    pub fn build(self) -> TypeIdentityRc {
        let shell = Arc::new(TypeIdentity {
            namespace: self.namespace.clone(),
            name: self.name.clone(),
            declaring: self.declaring.clone(),
            element: None,
            generics: Generics::None,
            form: self.form,
        });
        let generics = match self.generics {
            Generics::None => Generics::None,
            Generics::Parameters(params) => Generics::Parameters(
                params
                    .iter()
                    .map(|p| TypeIdentity::generic_parameter(&p.name, Some(shell.clone())))
                    .collect(),
            ),
            args @ Generics::Arguments(_) => args,
        };
        Arc::new(TypeIdentity {
            namespace: self.namespace,
            name: self.name,
            declaring: self.declaring,
            element: None,
            generics,
            form: self.form,
        })
    }
}

/// Builder for [`ResolvedType`] definitions.
///
/// The kind constructor fixes the reference/value semantics: classes and interfaces are
/// reference types, structs and enums are value types.
#[derive(Debug)]
pub struct TypeBuilder {
    identity: TypeIdentityRc,
    kind: TypeKind,
    parent: Option<TypeIdentityRc>,
    interfaces: Vec<TypeIdentityRc>,
    nested: Vec<TypeIdentityRc>,
    fields: Vec<Field>,
    methods: Vec<Method>,
    properties: Vec<Property>,
    refness: Refness,
    generic_params: Vec<GenericParam>,
}

impl TypeBuilder {
    fn with_kind(identity: TypeIdentityRc, kind: TypeKind, refness: Refness) -> Self {
        let generic_params = identity
            .generics_list()
            .iter()
            .filter(|g| g.is_generic_parameter())
            .map(|g| GenericParam {
                identity: g.clone(),
                constraints: Vec::new(),
            })
            .collect();
        TypeBuilder {
            identity,
            kind,
            parent: None,
            interfaces: Vec::new(),
            nested: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            properties: Vec::new(),
            refness,
            generic_params,
        }
    }

    /// Start building a class definition.
    #[must_use]
    pub fn class(identity: TypeIdentityRc) -> Self {
        Self::with_kind(identity, TypeKind::Class, Refness::ReferenceType)
    }

    /// Start building a struct definition.
    #[must_use]
    pub fn value_type(identity: TypeIdentityRc) -> Self {
        Self::with_kind(identity, TypeKind::Struct, Refness::ValueType)
    }

    /// Start building an interface definition.
    #[must_use]
    pub fn interface(identity: TypeIdentityRc) -> Self {
        Self::with_kind(identity, TypeKind::Interface, Refness::ReferenceType)
    }

    /// Start building an enum definition.
    #[must_use]
    pub fn enumeration(identity: TypeIdentityRc) -> Self {
        Self::with_kind(identity, TypeKind::Enum, Refness::ValueType)
    }

    /// Set the parent type.
    #[must_use]
    pub fn parent(mut self, parent: TypeIdentityRc) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Add a directly implemented interface.
    #[must_use]
    pub fn interface_ref(mut self, interface: TypeIdentityRc) -> Self {
        self.interfaces.push(interface);
        self
    }

    /// Alias of [`TypeBuilder::interface_ref`] reading naturally in chains.
    #[must_use]
    pub fn implements(self, interface: TypeIdentityRc) -> Self {
        self.interface_ref(interface)
    }

    /// Add a directly nested type reference.
    #[must_use]
    pub fn nested(mut self, nested: TypeIdentityRc) -> Self {
        self.nested.push(nested);
        self
    }

    /// Add an instance field at a known byte offset.
    #[must_use]
    pub fn field(mut self, name: &str, ty: TypeIdentityRc, offset: i32) -> Self {
        self.fields.push(Field {
            name: name.to_string(),
            ty,
            offset,
            specifiers: MemberSpecifiers::empty(),
        });
        self
    }

    /// Add a static field.
    #[must_use]
    pub fn static_field(mut self, name: &str, ty: TypeIdentityRc) -> Self {
        self.fields.push(Field {
            name: name.to_string(),
            ty,
            offset: -1,
            specifiers: MemberSpecifiers::STATIC,
        });
        self
    }

    /// Add a method.
    #[must_use]
    pub fn method(
        mut self,
        name: &str,
        return_type: TypeIdentityRc,
        parameters: Vec<(String, TypeIdentityRc)>,
    ) -> Self {
        self.methods.push(Method {
            name: name.to_string(),
            return_type,
            parameters: parameters
                .into_iter()
                .map(|(name, ty)| Parameter { name, ty })
                .collect(),
            specifiers: MemberSpecifiers::empty(),
        });
        self
    }

    /// Add a property with both accessors.
    #[must_use]
    pub fn property(mut self, name: &str, ty: TypeIdentityRc) -> Self {
        self.properties.push(Property {
            name: name.to_string(),
            ty,
            has_getter: true,
            has_setter: true,
            specifiers: MemberSpecifiers::empty(),
        });
        self
    }

    /// Add a constraint to a generic parameter declared by this type's identity.
    #[must_use]
    pub fn constraint(mut self, parameter: &str, constraint: TypeIdentityRc) -> Self {
        if let Some(param) = self
            .generic_params
            .iter_mut()
            .find(|p| p.identity.name == parameter)
        {
            param.constraints.push(constraint);
        }
        self
    }

    /// Finish the definition.
    #[must_use]
    pub fn build(self) -> ResolvedType {
        ResolvedType {
            identity: self.identity,
            kind: self.kind,
            parent: self.parent,
            interfaces: self.interfaces,
            nested: self.nested,
            fields: self.fields,
            methods: self.methods,
            properties: self.properties,
            refness: self.refness,
            generic_params: self.generic_params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_builder_rebinds_parameter_owners() {
        let list = IdentityBuilder::new("System.Collections.Generic", "List`1")
            .generic_parameters(["T"])
            .build();
        assert!(list.is_generic_template());
        let t = &list.generics_list()[0];
        assert!(t.is_generic_parameter());
        assert_eq!(t.declaring.as_ref().unwrap().name, "List`1");
    }

    #[test]
    fn test_type_builder_kinds_fix_refness() {
        let c = TypeBuilder::class(TypeIdentity::plain("Ns", "C")).build();
        assert_eq!(c.refness, Refness::ReferenceType);
        let s = TypeBuilder::value_type(TypeIdentity::plain("Ns", "S")).build();
        assert_eq!(s.refness, Refness::ValueType);
        let e = TypeBuilder::enumeration(TypeIdentity::plain("Ns", "E")).build();
        assert_eq!(e.kind, TypeKind::Enum);
    }

    #[test]
    fn test_type_builder_collects_generic_params() {
        let identity = IdentityBuilder::new("Ns", "Box`1")
            .generic_parameters(["T"])
            .build();
        let built = TypeBuilder::class(identity)
            .constraint("T", TypeIdentity::plain("System", "IDisposable"))
            .build();
        assert_eq!(built.generic_params.len(), 1);
        assert_eq!(built.generic_params[0].constraints.len(), 1);
    }
}
