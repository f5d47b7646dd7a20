pub use crate::activity::{Activity, ActivityKind, ConversationAccount};
pub use crate::conversation::{ChannelAccount, ConversationReference};
pub use crate::id::{ContinuationKey, Id, SkillConversationId};
pub use crate::identity::CallerIdentity;
pub use crate::time::{now_ms, Timestamp};
