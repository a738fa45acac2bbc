//! Error types for code model operations.

/// Discriminated programming-error kinds raised by the code model.
///
/// These are invariant violations, not expected conditions: "not found" in a
/// lookup is an `Option`, never an error. Callers propagate these upward and
/// typically abort the current translation; no local recovery is attempted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// Use bookkeeping violated: removing an entity with live uses, removing
    /// a use that was never registered, or a broken use edge.
    #[error("use invariant violated: {0}")]
    UseInvariant(String),

    /// Structural type constraint violated: reference to reference, pointer
    /// to reference, function returning a function type, invalid bitfield
    /// type, or a non-builtin vector element.
    #[error("type constraint violated: {0}")]
    TypeConstraint(String),

    /// A forward type reference was left unresolved at build time.
    #[error("unresolved lookup: {0}")]
    LookupMiss(String),

    /// Key collision on insertion: duplicate substitution argument list,
    /// duplicate nested namespace, duplicate record base, or a debug-info
    /// address/entity already registered.
    #[error("duplicate insertion: {0}")]
    DuplicateInsertion(String),

    /// Layout engine precondition failed: missing size information or a
    /// union with base classes.
    #[error("layout precondition failed: {0}")]
    LayoutPrecondition(String),
}

pub type Result<T, E = ModelError> = std::result::Result<T, E>;
