use skillgate_types::prelude::CallerIdentity;

use crate::allow_list::AllowList;
use crate::errors::AuthError;

/// Pure authorization predicate over a validated claim set. No claim passes
/// without the allow-list check; an absent app identifier is a rejection.
/// Holds only the immutable AllowList, so concurrent use needs no
/// synchronization.
#[derive(Clone, Debug)]
pub struct AllowedCallersValidator {
    allow: AllowList,
}

impl AllowedCallersValidator {
    pub fn new(allow: AllowList) -> Self {
        Self { allow }
    }

    pub fn validate(&self, claims: &CallerIdentity) -> Result<(), AuthError> {
        let app_id = match claims.app_id.as_deref() {
            Some(id) if !id.is_empty() => id,
            _ => return Err(AuthError::forbidden("caller claims carry no app identifier")),
        };
        if self.allow.contains(app_id) {
            Ok(())
        } else {
            Err(AuthError::forbidden("caller not in allow-list"))
        }
    }
}
