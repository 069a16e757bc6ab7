use thiserror::Error;

use crate::types::Rect;

/// Input or configuration rejected before any placement is attempted.
///
/// Rectangle types that cannot fit the bin are not errors; they are reported
/// through [`crate::types::PackingResult::unsatisfied`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PackError {
    #[error("bin dimensions must be non-zero, got {0}")]
    InvalidBin(Rect),

    #[error("rectangle type {id} has a zero dimension ({rect})")]
    InvalidDimensions { id: u32, rect: Rect },

    #[error("rectangle type {id} must request at least one instance")]
    InvalidCount { id: u32 },

    #[error("rectangle type id {0} appears more than once")]
    DuplicateId(u32),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
