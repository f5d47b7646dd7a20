use async_trait::async_trait;
use skillgate_types::prelude::CallerIdentity;
use std::collections::HashMap;

use crate::errors::AuthError;

/// Identity-provider collaborator: turns a bearer credential into validated
/// claims. A verifier timeout is an authentication failure to this layer.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, bearer: &str) -> Result<CallerIdentity, AuthError>;
}

/// Config-backed verifier mapping known bearer tokens to caller identities.
/// Stands in for a real token-exchange provider in single-box deployments
/// and in tests.
#[derive(Clone, Default)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, CallerIdentity>,
}

impl StaticTokenVerifier {
    pub fn new(tokens: HashMap<String, CallerIdentity>) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl CredentialVerifier for StaticTokenVerifier {
    async fn verify(&self, bearer: &str) -> Result<CallerIdentity, AuthError> {
        self.tokens
            .get(bearer)
            .cloned()
            .ok_or_else(|| AuthError::unauthenticated("unknown bearer token"))
    }
}
