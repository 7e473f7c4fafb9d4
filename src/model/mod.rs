//! The ingested type model: identities, definitions and the registry that owns them.
//!
//! Everything in this module is immutable once ingestion finishes. Downstream components
//! (layout inference, emission planning) only ever read from here, which is what permits the
//! embarrassingly parallel precompute passes in [`crate::layout`].

pub mod builder;
pub mod identity;
pub mod registry;
pub mod types;

pub use builder::{IdentityBuilder, TypeBuilder};
pub use identity::{FastKey, Generics, IdentityForm, TypeIdentity, TypeIdentityRc};
pub use registry::{DefinitionKey, TypeRegistry};
pub use types::{
    Field, GenericParam, MemberSpecifiers, Method, Parameter, Property, Refness, ResolvedType,
    ResolvedTypeRc, TypeKind,
};
