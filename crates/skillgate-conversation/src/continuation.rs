use serde::{Deserialize, Serialize};
use skillgate_storage::KvStore;
use skillgate_types::prelude::{CallerIdentity, ContinuationKey, ConversationReference};
use std::sync::Arc;

use crate::errors::ConversationError;

const STORE_CONTINUATIONS: &str = "continuations";

/// Everything needed to resume a conversation the skill did not initiate:
/// where to deliver, and a claims snapshot to re-check against the current
/// allow-list before acting.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContinuationParameters {
    pub conversation: ConversationReference,
    pub claims: CallerIdentity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<serde_json::Value>,
}

/// Replace-on-write store keyed by an application-chosen continuation key.
#[derive(Clone)]
pub struct ProactiveContinuationStore {
    kv: Arc<dyn KvStore>,
}

impl ProactiveContinuationStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Atomic overwrite; a concurrent reader sees the old value or the new
    /// one, never a blend.
    pub async fn put(
        &self,
        key: &ContinuationKey,
        params: &ContinuationParameters,
    ) -> Result<(), ConversationError> {
        let value = serde_json::to_value(params)
            .map_err(|err| ConversationError::encoding(&err.to_string()))?;
        self.kv.put(STORE_CONTINUATIONS, &key.0, value).await?;
        Ok(())
    }

    pub async fn get(
        &self,
        key: &ContinuationKey,
    ) -> Result<Option<ContinuationParameters>, ConversationError> {
        match self.kv.get(STORE_CONTINUATIONS, &key.0).await? {
            Some(value) => Ok(Some(
                serde_json::from_value(value)
                    .map_err(|err| ConversationError::encoding(&err.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    pub async fn delete(&self, key: &ContinuationKey) -> Result<(), ConversationError> {
        self.kv.delete(STORE_CONTINUATIONS, &key.0).await?;
        Ok(())
    }

    /// Drops every continuation anchored to the given caller conversation.
    /// Used at end-of-conversation teardown.
    pub async fn remove_for_reference(
        &self,
        reference: &ConversationReference,
    ) -> Result<usize, ConversationError> {
        let mut removed = 0;
        for (key, value) in self.kv.entries(STORE_CONTINUATIONS).await? {
            let params: ContinuationParameters = serde_json::from_value(value)
                .map_err(|err| ConversationError::encoding(&err.to_string()))?;
            if params.conversation.channel_id == reference.channel_id
                && params.conversation.conversation_id == reference.conversation_id
                && params.conversation.service_url == reference.service_url
            {
                self.kv.delete(STORE_CONTINUATIONS, &key).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
