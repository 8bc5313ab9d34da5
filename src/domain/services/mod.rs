//! # Domain Services
//!
//! Logic that does not belong to a single model.
//!
//! ## Services
//!
//! - **PermissionCalculator**: Guild and channel permission calculation

mod permission_service;

pub use permission_service::*;
