//! Extension contracts for attaching resolved tokens to arbitrary HTTP clients.

pub mod request_signer;

pub use request_signer::*;
