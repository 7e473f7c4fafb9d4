//! # dotbridge Prelude
//!
//! Convenient re-exports of the types most callers need: build a registry, construct the
//! context graph, run the planner.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all dotbridge operations
pub use crate::Error;

/// The result type used throughout dotbridge
pub use crate::Result;

// ================================================================================================
// Type Model
// ================================================================================================

/// Identity construction and comparison
pub use crate::model::{IdentityBuilder, TypeIdentity, TypeIdentityRc};

/// Resolved definitions and their members
pub use crate::model::{
    Field, GenericParam, MemberSpecifiers, Method, Parameter, Property, Refness, ResolvedType,
    ResolvedTypeRc, TypeBuilder, TypeKind,
};

/// The registry owning every definition
pub use crate::model::TypeRegistry;

// ================================================================================================
// Layout Inference
// ================================================================================================

/// Memoized size inference
pub use crate::layout::{SizeTracker, UNKNOWN_SIZE};

// ================================================================================================
// Emission Planning
// ================================================================================================

/// Context graph construction and dependency recording
pub use crate::emission::{ContextGraph, ContextId, EmissionContext};

/// Name resolution requests
pub use crate::emission::naming::NameRequest;
pub use crate::emission::{ForceAs, NeedAs};

/// File planning
pub use crate::emission::{
    EmitConfig, FileEmissionPlan, GenericHandling, MemberPlan, OnUnresolved, OutputKind, Planner,
    TypePlan,
};
