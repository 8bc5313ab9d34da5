//! # Domain Value Objects
//!
//! Immutable value types that represent domain concepts without identity.
//!
//! ## Value Objects
//!
//! - **Snowflake**: Discord-style unique ID with embedded timestamp
//! - **Permissions**: 64-bit permission bitfield with helper methods
//! - **Scope**: Parent namespace under which child entities are stored

mod permissions;
mod scope;
mod snowflake;

pub use permissions::*;
pub use scope::*;
pub use snowflake::*;
