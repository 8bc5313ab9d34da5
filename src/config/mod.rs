//! # Configuration Module
//!
//! This module handles client configuration loading and management.
//! Configuration can be loaded from:
//! - Environment variables (prefixed with APP__, plus DISCORD_TOKEN and DISCORD_API_URL)
//! - Configuration files (config/default.toml, config/{environment}.toml)
//! - .env files (via dotenvy)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use discord_state::config::Settings;
//!
//! let settings = Settings::load()?;
//! println!("Sharding dispatches onto {} lanes", settings.gateway.dispatch_lanes);
//! ```

mod settings;

pub use settings::*;
