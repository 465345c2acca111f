//! Cairn Core
//!
//! Shared utilities for the Cairn engine crates: generation-checked storage,
//! fast hash collections, logging setup and profiling scopes.

pub mod alloc;
pub mod logging;
pub mod profiling;
