//! Shared message types, error plumbing, and the hook event system used across all
//! picsearch crates.

pub mod error;
pub mod hooks;
pub mod types;

pub use error::FromMessage;
