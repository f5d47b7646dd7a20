use skillgate_errors::prelude::*;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct AuthError(pub ErrorObj);

impl AuthError {
    pub fn unauthenticated(detail: &str) -> Self {
        AuthError(
            ErrorBuilder::new(codes::AUTH_UNAUTHENTICATED)
                .dev_msg(detail)
                .build(),
        )
    }

    pub fn forbidden(detail: &str) -> Self {
        AuthError(
            ErrorBuilder::new(codes::AUTH_FORBIDDEN)
                .dev_msg(detail)
                .build(),
        )
    }

    pub fn misconfigured(detail: &str) -> Self {
        AuthError(
            ErrorBuilder::new(codes::SCHEMA_VALIDATION)
                .user_msg("Caller authorization is misconfigured.")
                .dev_msg(detail)
                .build(),
        )
    }

    pub fn into_inner(self) -> ErrorObj {
        self.0
    }
}

impl From<AuthError> for ErrorObj {
    fn from(value: AuthError) -> Self {
        value.0
    }
}
