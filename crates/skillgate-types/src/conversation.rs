use serde::{Deserialize, Serialize};

/// A party in the caller's conversation (bot or user).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelAccount {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// The tuple identifying one ongoing conversation in the caller's system.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationReference {
    pub channel_id: String,
    pub conversation_id: String,
    pub service_url: String,
    pub bot: ChannelAccount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<ChannelAccount>,
}
