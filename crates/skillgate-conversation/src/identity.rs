use serde::{Deserialize, Serialize};
use skillgate_storage::{InsertOutcome, KvStore};
use skillgate_types::prelude::{now_ms, ConversationReference, SkillConversationId};
use std::sync::Arc;

use crate::errors::ConversationError;

const STORE_REFERENCES: &str = "conversation_references";
const STORE_INDEX: &str = "conversation_index";

/// What the gateway knows about one caller conversation. One record per
/// issued SkillConversationId.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationReferenceRecord {
    pub skill_conversation_id: SkillConversationId,
    pub conversation: ConversationReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth_scope: Option<String>,
    pub created_at_ms: i64,
}

/// Maps caller conversation references to gateway-issued opaque ids. Records
/// are keyed by the equivalence class (channel, conversation id, service URL);
/// a reverse index resolves an issued id back to its record.
#[derive(Clone)]
pub struct ConversationIdentityStore {
    kv: Arc<dyn KvStore>,
}

impl ConversationIdentityStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    fn equivalence_key(reference: &ConversationReference) -> String {
        // JSON-array form: caller-supplied ids cannot forge a separator and
        // collide two equivalence classes.
        serde_json::json!([
            reference.channel_id,
            reference.conversation_id,
            reference.service_url,
        ])
        .to_string()
    }

    /// Idempotent per equivalence class. Under concurrent creation the
    /// record insert is the single atomic step: the first insert wins and
    /// every competitor returns the winner's id. The reverse index entry is
    /// written *before* the insert attempt so the winner is resolvable the
    /// instant its record lands; a loser removes its speculative entry.
    pub async fn get_or_create(
        &self,
        reference: &ConversationReference,
        oauth_scope: Option<String>,
    ) -> Result<SkillConversationId, ConversationError> {
        let eq_key = Self::equivalence_key(reference);

        if let Some(existing) = self.kv.get(STORE_REFERENCES, &eq_key).await? {
            return Ok(decode_record(existing)?.skill_conversation_id);
        }

        let id = SkillConversationId::new_random();
        let record = ConversationReferenceRecord {
            skill_conversation_id: id.clone(),
            conversation: reference.clone(),
            oauth_scope,
            created_at_ms: now_ms(),
        };
        let value = encode_record(&record)?;

        self.kv
            .put(
                STORE_INDEX,
                &id.0,
                serde_json::Value::String(eq_key.clone()),
            )
            .await?;

        match self
            .kv
            .insert_if_absent(STORE_REFERENCES, &eq_key, value)
            .await?
        {
            InsertOutcome::Inserted => Ok(id),
            InsertOutcome::Existing(winner) => {
                self.kv.delete(STORE_INDEX, &id.0).await?;
                Ok(decode_record(winner)?.skill_conversation_id)
            }
        }
    }

    /// Lookup without creation, for teardown paths.
    pub async fn find(
        &self,
        reference: &ConversationReference,
    ) -> Result<Option<SkillConversationId>, ConversationError> {
        let eq_key = Self::equivalence_key(reference);
        match self.kv.get(STORE_REFERENCES, &eq_key).await? {
            Some(value) => Ok(Some(decode_record(value)?.skill_conversation_id)),
            None => Ok(None),
        }
    }

    /// Unknown ids are expected churn: `None`, never an error.
    pub async fn get_reference(
        &self,
        id: &SkillConversationId,
    ) -> Result<Option<ConversationReferenceRecord>, ConversationError> {
        let Some(index) = self.kv.get(STORE_INDEX, &id.0).await? else {
            return Ok(None);
        };
        let Some(eq_key) = index.as_str().map(str::to_string) else {
            return Ok(None);
        };
        let Some(value) = self.kv.get(STORE_REFERENCES, &eq_key).await? else {
            return Ok(None);
        };
        let record = decode_record(value)?;
        // An orphaned index entry (lost race, partial teardown) must not
        // resolve to another conversation's record.
        if record.skill_conversation_id == *id {
            Ok(Some(record))
        } else {
            Ok(None)
        }
    }

    /// Idempotent removal of the record and its index entry.
    pub async fn delete(&self, id: &SkillConversationId) -> Result<(), ConversationError> {
        if let Some(index) = self.kv.get(STORE_INDEX, &id.0).await? {
            if let Some(eq_key) = index.as_str() {
                if let Some(value) = self.kv.get(STORE_REFERENCES, eq_key).await? {
                    if decode_record(value)?.skill_conversation_id == *id {
                        self.kv.delete(STORE_REFERENCES, eq_key).await?;
                    }
                }
            }
        }
        self.kv.delete(STORE_INDEX, &id.0).await?;
        Ok(())
    }

    /// Removes records older than `max_age_ms`. Returns how many went.
    pub async fn purge_idle(&self, max_age_ms: i64) -> Result<usize, ConversationError> {
        let cutoff = now_ms() - max_age_ms;
        let mut purged = 0;
        for (_, value) in self.kv.entries(STORE_REFERENCES).await? {
            let record = decode_record(value)?;
            if record.created_at_ms < cutoff {
                self.delete(&record.skill_conversation_id).await?;
                purged += 1;
            }
        }
        Ok(purged)
    }
}

fn encode_record(
    record: &ConversationReferenceRecord,
) -> Result<serde_json::Value, ConversationError> {
    serde_json::to_value(record).map_err(|err| ConversationError::encoding(&err.to_string()))
}

fn decode_record(value: serde_json::Value) -> Result<ConversationReferenceRecord, ConversationError> {
    serde_json::from_value(value).map_err(|err| ConversationError::encoding(&err.to_string()))
}
