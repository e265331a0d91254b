//! Token domain types: cached tokens, redacted secrets, and scope sets.

pub mod scope;
pub mod token;

pub use scope::*;
pub use token::{cached::*, secret::*};
