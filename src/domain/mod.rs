//! # Domain Layer
//!
//! Plain data and pure rules for the Discord object graph. Nothing here
//! knows about caching, handles or the gateway.
//!
//! ## Structure
//!
//! - **models**: Immutable wire records (GuildModel, ChannelModel, MessageModel, etc.)
//! - **value_objects**: Immutable value types (Snowflake, Permissions, Scope)
//! - **services**: Rules that span several models (permission calculation)

pub mod models;
pub mod services;
pub mod value_objects;

// Re-export commonly used types
pub use models::*;
pub use value_objects::*;
