//! Turn decrypted Authy TOTP tokens into `otpauth://` URIs, repairing
//! missing or mangled issuer and account names on the way.

pub mod config;
pub mod convert;
pub mod normalize;
pub mod prompt;
pub mod store;
pub mod token;
pub mod uri;
