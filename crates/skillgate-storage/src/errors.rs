use skillgate_errors::prelude::*;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct StorageError(pub ErrorObj);

impl StorageError {
    pub fn conflict(detail: &str) -> Self {
        StorageError(
            ErrorBuilder::new(codes::STORAGE_CONFLICT)
                .dev_msg(detail)
                .build(),
        )
    }

    pub fn internal(detail: &str) -> Self {
        StorageError(
            ErrorBuilder::new(codes::UNKNOWN_INTERNAL)
                .user_msg("Storage operation failed.")
                .dev_msg(detail)
                .build(),
        )
    }

    pub fn into_inner(self) -> ErrorObj {
        self.0
    }
}

impl From<StorageError> for ErrorObj {
    fn from(value: StorageError) -> Self {
        value.0
    }
}
