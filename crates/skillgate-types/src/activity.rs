use serde::{Deserialize, Serialize};

use crate::conversation::{ChannelAccount, ConversationReference};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActivityKind {
    Message,
    Event,
    EndOfConversation,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationAccount {
    pub id: String,
}

/// The routing-relevant subset of an activity payload. Fields the routing
/// contract does not touch travel through `value` untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub channel_id: String,
    pub service_url: String,
    pub conversation: ConversationAccount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
}

impl Activity {
    /// The caller-side conversation reference carried by this activity.
    /// `None` when the payload does not name a recipient bot to anchor it.
    pub fn conversation_reference(&self) -> Option<ConversationReference> {
        let bot = self.recipient.clone()?;
        Some(ConversationReference {
            channel_id: self.channel_id.clone(),
            conversation_id: self.conversation.id.clone(),
            service_url: self.service_url.clone(),
            bot,
            user: self.from.clone(),
        })
    }
}
