use framechain_core::error::CoreError;
use framechain_core::types::SegmentIndex;

/// Errors raised by the generation store and asset catalog.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: uuid::Uuid },

    #[error("Segment index {index} is out of range for a job with {total} segments")]
    InvalidSegmentIndex { index: SegmentIndex, total: u32 },

    #[error("Duplicate {entity} {id}")]
    Duplicate { entity: &'static str, id: uuid::Uuid },

    #[error("{column} value {value} does not fit the database column")]
    OutOfRange { column: &'static str, value: u32 },

    #[error("Stored row is inconsistent: {0}")]
    Corrupt(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => CoreError::not_found(entity, id),
            StoreError::InvalidSegmentIndex { index, total } => {
                CoreError::InvalidSegmentIndex { index, total }
            }
            StoreError::Duplicate { .. } => CoreError::Conflict(err.to_string()),
            StoreError::OutOfRange { .. } => CoreError::Validation(err.to_string()),
            StoreError::Corrupt(_) | StoreError::Database(_) => {
                CoreError::Internal(err.to_string())
            }
        }
    }
}
