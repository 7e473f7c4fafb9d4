use std::sync::Arc;

use thiserror::Error;

use crate::model::identity::TypeIdentity;

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// This enum covers every failure mode of type-graph resolution and emission planning. Each
/// variant carries the identities involved so the caller can report which type reference broke
/// the generation run.
///
/// # Error Categories
///
/// ## Model Errors
/// - [`Error::TypeInsert`] - Failed to register a new type in the registry
/// - [`Error::UnresolvedGenericBackref`] - A `!n` generic back-reference could not be resolved
///
/// ## Resolution Errors
/// - [`Error::UnresolvedType`] - A reference could not be resolved against the registry, or its
///   owning context could not be found during planning
/// - [`Error::InconsistentGenericArity`] - Generic parameter/argument counts diverge after
///   substitution
///
/// ## Planning Errors
/// - [`Error::InvalidForwardDeclare`] - A declaration request survived to planning for a nested
///   type outside the current nesting hierarchy
/// - [`Error::DuplicateDefinitionConflict`] - A definition is required through two incompatible
///   paths and cannot be repaired by method specialization
#[derive(Error, Debug)]
pub enum Error {
    /// A type reference could not be resolved.
    ///
    /// Always fatal for the type being processed: emitting the file anyway would produce
    /// output that fails to compile with missing symbols. `context` is the type whose
    /// resolution requested the reference.
    #[error("Unresolved type reference {reference} requested by {context}")]
    UnresolvedType {
        /// The type whose context requested the resolution
        context: Arc<TypeIdentity>,
        /// The reference that could not be resolved
        reference: Arc<TypeIdentity>,
    },

    /// Generic parameter and argument counts do not match after substitution.
    ///
    /// This signals a bug in the ingested type model, not a recoverable condition; it must
    /// not be caught and masked.
    #[error("Generic arity mismatch for {reference}: {params} parameter(s) vs {args} argument(s)")]
    InconsistentGenericArity {
        /// The generic reference being substituted
        reference: Arc<TypeIdentity>,
        /// Number of declared generic parameters
        params: usize,
        /// Number of supplied generic arguments after template-parameter removal
        args: usize,
    },

    /// A forward-declaration request reached planning for a nested type that is not part of
    /// the requesting context's nesting hierarchy.
    ///
    /// Nested types cannot be forward-declared without their enclosing type being complete,
    /// so such a request is an invariant violation in the context graph.
    #[error("Cannot forward-declare nested type {reference} from {context}; it must be defined instead")]
    InvalidForwardDeclare {
        /// The context whose plan hit the invalid declaration
        context: Arc<TypeIdentity>,
        /// The nested type that was requested as a forward declaration
        reference: Arc<TypeIdentity>,
    },

    /// A definition is required by two incompatible paths (e.g. an include whose definitions
    /// contain the consumer itself).
    ///
    /// Only resolvable when confined to method signatures, via per-overload specialization;
    /// any field-level occurrence is unconditionally fatal.
    #[error("Duplicate definition of {offender} in {context} (member: {member})")]
    DuplicateDefinitionConflict {
        /// The context that would receive the duplicate definition
        context: Arc<TypeIdentity>,
        /// The type defined twice
        offender: Arc<TypeIdentity>,
        /// The member that pins the offender, or `<none>` when no occurrence was found
        member: String,
    },

    /// A numeric generic back-reference (`!n`) could not be mapped to a concrete declaring-type
    /// parameter by walking the declaring chain.
    #[error("Unresolvable generic back-reference !{index} in {reference}")]
    UnresolvedGenericBackref {
        /// The reference whose generics contain the back-reference
        reference: Arc<TypeIdentity>,
        /// The positional index that failed to resolve
        index: usize,
    },

    /// Failed to insert a new type into the [`crate::model::registry::TypeRegistry`].
    ///
    /// Occurs when a second definition is registered under an identity key that is already
    /// taken.
    #[error("Failed to insert type into registry, key already present - {0}")]
    TypeInsert(Arc<TypeIdentity>),

    /// Generic error for miscellaneous failures.
    ///
    /// Used for internal-consistency failures that do not fit the taxonomy above.
    #[error("{0}")]
    Error(String),
}
