//! Emission planning: deciding what every generated file must include, forward-declare and
//! define.
//!
//! The pipeline runs in three passes over an immutable [`crate::model::TypeRegistry`]:
//!
//! 1. [`ContextGraph::build`] creates one [`EmissionContext`] per type scheduled for
//!    emission, wiring declaring/nested relationships through arena handles.
//! 2. [`crate::emission::members::resolve_members`] walks every context's bases, fields and
//!    methods through [`ContextGraph::request_name`], which records each reference as a
//!    required definition or forward declaration as a side effect of naming it.
//! 3. [`Planner::resolve_all`] absorbs in-place nesting needs and turns the recorded sets
//!    into per-file [`FileEmissionPlan`]s for header and source outputs.

pub mod context;
pub mod members;
pub mod naming;
pub mod plan;

pub use context::{ContextGraph, ContextId, EmissionContext};
pub use members::{ConstraintPlan, FieldPlan, MemberPlan, MemberStub, MethodPlan, PropertyPlan};
pub use naming::{ForceAs, NeedAs};
pub use plan::{FileEmissionPlan, ForwardDeclare, Planner, TypePlan};

/// Which of the two outputs a plan targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputKind {
    /// The includable definition file
    Header,
    /// The method-body file, which includes its own header
    Source,
}

/// Policy for generic templates encountered during context creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenericHandling {
    /// Emit generic templates as C++ templates
    #[default]
    Process,
    /// Skip generic templates entirely; references to them fail as unresolved
    Skip,
}

/// Policy for unresolved references encountered while reducing members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnUnresolved {
    /// Abort the whole type; partial output must be discarded
    #[default]
    Fail,
    /// Skip the offending member, recording a stub entry, and continue with the rest
    Stub,
}

/// Knobs the caller passes into planning. This core owns no configuration of its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmitConfig {
    /// How to treat generic templates
    pub generic_handling: GenericHandling,
    /// How to treat unresolved member references
    pub on_unresolved: OnUnresolved,
}
