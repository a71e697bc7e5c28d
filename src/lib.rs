//! Library entrypoint for ota-image-hook.
//!
//! The primary interface is the `ota-image-hook` binary. This lib target
//! exists to expose the artifact and config modules to integration tests.

pub mod artifact;
pub mod config;
