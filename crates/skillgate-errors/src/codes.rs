/// Whether a caller retrying the same request can ever succeed without an
/// operator or state change first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RetryClass {
    None,
    Transient,
    Permanent,
}

impl RetryClass {
    pub const fn as_str(self) -> &'static str {
        match self {
            RetryClass::None => "none",
            RetryClass::Transient => "transient",
            RetryClass::Permanent => "permanent",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ErrorCode {
    pub code: &'static str,
    pub http_status: u16,
    pub retry: RetryClass,
    pub default_user_msg: &'static str,
}

pub const AUTH_UNAUTHENTICATED: ErrorCode = ErrorCode {
    code: "AUTH.UNAUTHENTICATED",
    http_status: 401,
    retry: RetryClass::Permanent,
    default_user_msg: "Credential is missing, expired, or could not be verified.",
};

pub const AUTH_FORBIDDEN: ErrorCode = ErrorCode {
    code: "AUTH.FORBIDDEN",
    http_status: 403,
    retry: RetryClass::Permanent,
    default_user_msg: "Caller is not authorized to invoke this skill.",
};

pub const CONVERSATION_NOT_FOUND: ErrorCode = ErrorCode {
    code: "CONVERSATION.NOT_FOUND",
    http_status: 404,
    retry: RetryClass::None,
    default_user_msg: "The referenced conversation is not recognized.",
};

pub const SCHEMA_VALIDATION: ErrorCode = ErrorCode {
    code: "SCHEMA.VALIDATION",
    http_status: 400,
    retry: RetryClass::Permanent,
    default_user_msg: "Request payload failed validation.",
};

pub const STORAGE_CONFLICT: ErrorCode = ErrorCode {
    code: "STORAGE.CONFLICT",
    http_status: 409,
    retry: RetryClass::Transient,
    default_user_msg: "A conflicting record already exists.",
};

pub const UNKNOWN_INTERNAL: ErrorCode = ErrorCode {
    code: "UNKNOWN.INTERNAL",
    http_status: 500,
    retry: RetryClass::Transient,
    default_user_msg: "The skill encountered an internal error.",
};
