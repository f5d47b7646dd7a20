use crate::errors::AuthError;

pub const WILDCARD: &str = "*";

/// Caller app identifiers accepted by this skill. Built once at startup and
/// immutable for the process lifetime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AllowList {
    /// The configured list was exactly `["*"]`.
    Any,
    Explicit(Vec<String>),
}

impl AllowList {
    /// A list mixing the wildcard with explicit entries is a configuration
    /// error, not a silent allow-all.
    pub fn from_entries(entries: Vec<String>) -> Result<Self, AuthError> {
        if entries.is_empty() {
            return Err(AuthError::misconfigured(
                "allowed_callers must name at least one caller or the wildcard",
            ));
        }
        let has_wildcard = entries.iter().any(|e| e == WILDCARD);
        if has_wildcard {
            if entries.len() > 1 {
                return Err(AuthError::misconfigured(
                    "allowed_callers mixes the wildcard with explicit entries",
                ));
            }
            return Ok(AllowList::Any);
        }
        Ok(AllowList::Explicit(entries))
    }

    /// Exact, case-sensitive membership.
    pub fn contains(&self, app_id: &str) -> bool {
        match self {
            AllowList::Any => true,
            AllowList::Explicit(entries) => entries.iter().any(|e| e == app_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_list_matches_exactly() {
        let list = AllowList::from_entries(vec!["app-123".into(), "app-456".into()]).unwrap();
        assert!(list.contains("app-123"));
        assert!(!list.contains("APP-123"));
        assert!(!list.contains("app-999"));
    }

    #[test]
    fn sole_wildcard_accepts_anything() {
        let list = AllowList::from_entries(vec![WILDCARD.into()]).unwrap();
        assert_eq!(list, AllowList::Any);
        assert!(list.contains("anything-at-all"));
    }

    #[test]
    fn wildcard_mixed_with_entries_is_rejected() {
        let err = AllowList::from_entries(vec!["app-123".into(), WILDCARD.into()])
            .expect_err("mixed list");
        assert_eq!(err.0.code, skillgate_errors::codes::SCHEMA_VALIDATION);
    }

    #[test]
    fn empty_list_is_rejected() {
        assert!(AllowList::from_entries(Vec::new()).is_err());
    }
}
