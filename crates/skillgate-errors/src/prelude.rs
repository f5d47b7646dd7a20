pub use crate::codes::{self, ErrorCode, RetryClass};
pub use crate::{ErrorBuilder, ErrorObj};
