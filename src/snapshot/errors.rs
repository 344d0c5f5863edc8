use thiserror::Error;

use crate::shared::AppError;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Malformed snapshot: missing required field `{field}`")]
    Malformed { field: &'static str },

    #[error("Payload tag {actual} does not match requested player {expected}")]
    TagMismatch { expected: String, actual: String },

    #[error(transparent)]
    Store(#[from] AppError),
}
