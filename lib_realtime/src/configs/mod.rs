//! # Configuration Modules
//!
//! Tunables for the real-time layer. File/CLI/env layering lives in the
//! binary; this module only defines the validated runtime shape.

/// The runtime configuration consumed by every component of the crate.
pub mod realtime_config;
