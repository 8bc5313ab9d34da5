//! Integration Tests Entry Point
//!
//! This file serves as the entry point for integration tests.
//! Tests are organized by module:
//! - `cache/` - Cache behaviour through the public API
//! - `common/` - Shared test utilities

mod cache;
mod common;

// Re-export common utilities for tests
pub use common::*;
