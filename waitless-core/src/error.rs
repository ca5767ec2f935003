//! Errors reported by collection operations.
//!
//! Only caller mistakes are errors. A value that is not found, or a clear on
//! an already empty collection, is an ordinary `false`.

/// Error returned when an operation is called with arguments or in a state
/// it cannot accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CollectionError {
    /// The argument is not acceptable for this operation.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
}
