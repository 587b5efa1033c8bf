//! Shared utilities.
//!
//! Source hashing for the build cache and filesystem helpers.

pub mod fs;
pub mod hash;
