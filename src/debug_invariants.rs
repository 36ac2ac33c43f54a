//! Structural self-checks for mesh types.
//!
//! Every container that carries cross-field invariants (blocks, id maps,
//! the database itself) implements [`DebugInvariants`]. `validate_invariants`
//! is always available and returns the first violation as a [`MeshError`];
//! `debug_assert_invariants` panics on a violation, but only in debug builds
//! or with the `check-invariants`/`strict-invariants` features.

use crate::mesh_error::MeshError;

/// Trait for validating data structure invariants.
pub trait DebugInvariants {
    /// Assert invariants in debug builds or when invariant checking is enabled.
    fn debug_assert_invariants(&self);
    /// Validate invariants and return the first error encountered.
    fn validate_invariants(&self) -> Result<(), MeshError>;
}

/// Runs a fallible check and panics with `ctx` on error when invariant
/// checking is enabled; expands to nothing otherwise.
#[macro_export]
macro_rules! debug_invariants {
    ($expr:expr, $($ctx:tt)*) => {
        #[cfg(any(debug_assertions, feature = "strict-invariants", feature = "check-invariants"))]
        if let Err(e) = $expr {
            panic!(concat!("[invariants] ", $($ctx)*, ": {}"), e);
        }
    };
}
