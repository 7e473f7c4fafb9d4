//! Resolved type definitions as ingested from the external metadata reader.
//!
//! A [`ResolvedType`] is the full definition behind a [`TypeIdentity`]: kind, parent,
//! implemented interfaces, nested types, members and generic parameters. Instances are created
//! once per distinct type during model ingestion, are immutable afterwards, and are owned by
//! the [`crate::model::registry::TypeRegistry`] for the process lifetime.

use std::sync::Arc;

use bitflags::bitflags;

use crate::model::identity::TypeIdentityRc;

/// Shared reference to a [`ResolvedType`]
pub type ResolvedTypeRc = Arc<ResolvedType>;

/// Fundamental kind of a resolved type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum TypeKind {
    /// Reference type with fields and methods
    Class,
    /// Value type with inline layout
    Struct,
    /// Abstract contract; emitted as a base class
    Interface,
    /// Enumeration over a primitive backing type
    Enum,
}

impl TypeKind {
    /// The C++ keyword used when defining or forward-declaring this kind.
    #[must_use]
    pub fn cpp_keyword(&self) -> &'static str {
        match self {
            TypeKind::Class | TypeKind::Interface => "class",
            TypeKind::Struct | TypeKind::Enum => "struct",
        }
    }
}

/// Whether instances are accessed through a pointer or embedded inline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Refness {
    /// Embedded inline; a complete type is required wherever a value is placed
    ValueType,
    /// Accessed through a pointer; a forward declaration suffices at use sites
    ReferenceType,
}

bitflags! {
    /// Specifiers attached to fields, methods and properties.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MemberSpecifiers: u16 {
        /// Static member, no instance storage
        const STATIC = 0x0001;
        /// Compile-time constant
        const CONST = 0x0002;
        /// Assignable only during construction
        const READONLY = 0x0004;
        /// No implementation; must be overridden
        const ABSTRACT = 0x0008;
        /// Participates in dynamic dispatch
        const VIRTUAL = 0x0010;
        /// Overrides a base member
        const OVERRIDE = 0x0020;
        /// Cannot be overridden further
        const SEALED = 0x0040;
    }
}

/// A field with its metadata-recorded byte offset.
///
/// `offset` comes straight from the source model; `-1` means the reader had none. The layout
/// engine decides how far to trust it.
#[derive(Debug, Clone)]
pub struct Field {
    /// Field name
    pub name: String,
    /// Field type reference
    pub ty: TypeIdentityRc,
    /// Byte offset within the instance, `-1` if unknown
    pub offset: i32,
    /// Field specifiers
    pub specifiers: MemberSpecifiers,
}

impl Field {
    /// `true` if this field occupies instance storage
    #[must_use]
    pub fn is_instance(&self) -> bool {
        !self.specifiers.contains(MemberSpecifiers::STATIC)
    }
}

/// A method parameter.
#[derive(Debug, Clone)]
pub struct Parameter {
    /// Parameter name
    pub name: String,
    /// Parameter type reference
    pub ty: TypeIdentityRc,
}

/// A method signature.
#[derive(Debug, Clone)]
pub struct Method {
    /// Method name
    pub name: String,
    /// Return type reference
    pub return_type: TypeIdentityRc,
    /// Ordered parameters
    pub parameters: Vec<Parameter>,
    /// Method specifiers
    pub specifiers: MemberSpecifiers,
}

/// A property with optional accessors.
#[derive(Debug, Clone)]
pub struct Property {
    /// Property name
    pub name: String,
    /// Property type reference
    pub ty: TypeIdentityRc,
    /// `true` if a getter exists
    pub has_getter: bool,
    /// `true` if a setter exists
    pub has_setter: bool,
    /// Property specifiers
    pub specifiers: MemberSpecifiers,
}

/// A generic parameter declared by a type, with its constraints.
#[derive(Debug, Clone)]
pub struct GenericParam {
    /// The parameter identity (declaring type set to the owner)
    pub identity: TypeIdentityRc,
    /// Constraint type references
    pub constraints: Vec<TypeIdentityRc>,
}

/// Full definition of a type, immutable after ingestion.
#[derive(Debug)]
pub struct ResolvedType {
    /// This type's own identity
    pub identity: TypeIdentityRc,
    /// Fundamental kind
    pub kind: TypeKind,
    /// Parent type reference, absent for roots
    pub parent: Option<TypeIdentityRc>,
    /// Directly implemented interfaces, in declaration order
    pub interfaces: Vec<TypeIdentityRc>,
    /// Directly nested types, in declaration order
    pub nested: Vec<TypeIdentityRc>,
    /// Fields in layout order
    pub fields: Vec<Field>,
    /// Methods in declaration order
    pub methods: Vec<Method>,
    /// Properties in declaration order
    pub properties: Vec<Property>,
    /// Value or reference semantics
    pub refness: Refness,
    /// Generic parameters this type itself declares
    pub generic_params: Vec<GenericParam>,
}

impl ResolvedType {
    /// Iterate the fields that occupy instance storage, in layout order.
    pub fn instance_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.is_instance())
    }

    /// Returns the full dotted name (`Namespace.Name`) of the type.
    #[must_use]
    pub fn fullname(&self) -> String {
        format!("{}.{}", self.identity.namespace, self.identity.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::identity::TypeIdentity;

    #[test]
    fn test_cpp_keywords() {
        assert_eq!(TypeKind::Class.cpp_keyword(), "class");
        assert_eq!(TypeKind::Interface.cpp_keyword(), "class");
        assert_eq!(TypeKind::Struct.cpp_keyword(), "struct");
        assert_eq!(TypeKind::Enum.cpp_keyword(), "struct");
    }

    #[test]
    fn test_instance_fields_skip_statics() {
        let int = TypeIdentity::plain("System", "Int32");
        let ty = ResolvedType {
            identity: TypeIdentity::plain("Ns", "Holder"),
            kind: TypeKind::Struct,
            parent: None,
            interfaces: vec![],
            nested: vec![],
            fields: vec![
                Field {
                    name: "value".to_string(),
                    ty: int.clone(),
                    offset: 0,
                    specifiers: MemberSpecifiers::empty(),
                },
                Field {
                    name: "shared".to_string(),
                    ty: int,
                    offset: -1,
                    specifiers: MemberSpecifiers::STATIC,
                },
            ],
            methods: vec![],
            properties: vec![],
            refness: Refness::ValueType,
            generic_params: vec![],
        };
        let names: Vec<&str> = ty.instance_fields().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["value"]);
    }
}
