//! # ctctl-common
//!
//! Shared utilities and types for the ctctl container hooks.
//!
//! This crate provides common functionality used across all ctctl crates:
//! - Standard filesystem paths (LXC container store, lock file)
//! - Common error types and their failure taxonomy

#![warn(missing_docs)]

pub mod error;
pub mod paths;

pub use error::{CtctlError, CtctlResult, ErrorCategory};
pub use paths::CtctlPaths;
