//! Domain errors.

use thiserror::Error;

/// Value object validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueObjectError {
    /// Message text is empty after trimming
    #[error("message text must not be empty")]
    EmptyMessageText,
}
