pub use crate::allow_list::{AllowList, WILDCARD};
pub use crate::claims::AllowedCallersValidator;
pub use crate::errors::AuthError;
pub use crate::verify::{CredentialVerifier, StaticTokenVerifier};
