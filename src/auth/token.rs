//! Cached access tokens and the secret wrapper guarding their values.

pub mod cached;
pub mod secret;
