pub mod codes;
pub mod prelude;

use codes::ErrorCode;

/// Carries a stable public code plus a safe user-facing message. Internal
/// detail lives in `dev_msg` and is only ever written to the log.
#[derive(Clone, Debug, PartialEq)]
pub struct ErrorObj {
    pub code: ErrorCode,
    pub user_msg: String,
    pub dev_msg: Option<String>,
}

impl ErrorObj {
    pub fn http_status(&self) -> u16 {
        self.code.http_status
    }

    pub fn retry(&self) -> codes::RetryClass {
        self.code.retry
    }

    /// The caller-visible body. `dev_msg` is deliberately absent.
    pub fn to_public_json(&self) -> serde_json::Value {
        serde_json::json!({
            "code": self.code.code,
            "message": self.user_msg,
            "retry": self.code.retry.as_str(),
        })
    }
}

impl std::fmt::Display for ErrorObj {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.code, self.user_msg)
    }
}

impl std::error::Error for ErrorObj {}

pub struct ErrorBuilder {
    code: ErrorCode,
    user_msg: Option<String>,
    dev_msg: Option<String>,
}

impl ErrorBuilder {
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            user_msg: None,
            dev_msg: None,
        }
    }

    pub fn user_msg(mut self, msg: impl Into<String>) -> Self {
        self.user_msg = Some(msg.into());
        self
    }

    pub fn dev_msg(mut self, msg: impl Into<String>) -> Self {
        self.dev_msg = Some(msg.into());
        self
    }

    pub fn build(self) -> ErrorObj {
        let ErrorBuilder {
            code,
            user_msg,
            dev_msg,
        } = self;
        ErrorObj {
            user_msg: user_msg.unwrap_or_else(|| code.default_user_msg.to_string()),
            code,
            dev_msg,
        }
    }
}
