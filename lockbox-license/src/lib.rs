//! Premium key verification and activation for Lockbox.
//!
//! This crate handles:
//! - Verifying signed premium keys against the embedded RSA public key
//! - Extracting the licensee claims into a typed [`PremiumKey`]
//! - Persisting the raw key string through a [`ConfigStore`]
//! - Holding the active key as observable state for presentation layers
//!
//! # Premium Key Format
//!
//! Keys are compact RS256 tokens: `base64url(header).base64url(payload).base64url(signature)`.
//! The payload is a JSON object containing:
//! - `jti`: unique key id
//! - `name`, `email`: licensee
//! - `company`: optional organization
//! - `exp`: optional expiration (seconds since epoch)
//!
//! Only the raw token is ever persisted. It is re-verified every time it is
//! loaded, so a stored value is never trusted on its own.

mod error;
mod key;
mod public_key;
mod source;
mod state;
mod store;

pub use error::{ErrorCategory, LicenseError, LicenseResult, StoreError};
pub use key::{PremiumKey, PremiumKeyVerifier};
pub use public_key::{PREMIUM_PUBLIC_KEY_DER, PREMIUM_PUBLIC_KEY_VERSION};
pub use source::read_first_line;
pub use state::PremiumKeyState;
pub use store::{ConfigStore, JsonFileConfigStore, MemoryConfigStore, PREMIUM_KEY_CONFIG_KEY};
