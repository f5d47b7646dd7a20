use skillgate_errors::prelude::*;
use skillgate_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct ConversationError(pub ErrorObj);

impl ConversationError {
    pub fn not_found(detail: &str) -> Self {
        ConversationError(
            ErrorBuilder::new(codes::CONVERSATION_NOT_FOUND)
                .dev_msg(detail)
                .build(),
        )
    }

    pub fn encoding(detail: &str) -> Self {
        ConversationError(
            ErrorBuilder::new(codes::UNKNOWN_INTERNAL)
                .user_msg("Conversation record could not be decoded.")
                .dev_msg(detail)
                .build(),
        )
    }

    pub fn into_inner(self) -> ErrorObj {
        self.0
    }
}

impl From<StorageError> for ConversationError {
    fn from(err: StorageError) -> Self {
        ConversationError(err.into_inner())
    }
}

impl From<ConversationError> for ErrorObj {
    fn from(value: ConversationError) -> Self {
        value.0
    }
}
