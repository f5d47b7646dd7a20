pub use crate::continuation::{ContinuationParameters, ProactiveContinuationStore};
pub use crate::errors::ConversationError;
pub use crate::identity::{ConversationIdentityStore, ConversationReferenceRecord};
