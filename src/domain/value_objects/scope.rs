//! Store scopes.
//!
//! A scope is the parent namespace under which child entities of a kind are
//! keyed. Guild-owned kinds live under [`Scope::Guild`], messages under
//! [`Scope::Channel`], and top-level kinds (guilds, users, DM channels)
//! under [`Scope::Global`].

use std::fmt;

use super::Snowflake;

/// Parent namespace for a store entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    /// Unscoped entries.
    Global,
    /// Entries owned by a guild.
    Guild(Snowflake),
    /// Entries owned by a channel or thread.
    Channel(Snowflake),
}

/// The shape of a scope without its identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeShape {
    Global,
    Guild,
    Channel,
}

impl Scope {
    pub fn shape(&self) -> ScopeShape {
        match self {
            Scope::Global => ScopeShape::Global,
            Scope::Guild(_) => ScopeShape::Guild,
            Scope::Channel(_) => ScopeShape::Channel,
        }
    }

    /// The id of the owning entity, if any.
    pub fn owner_id(&self) -> Option<Snowflake> {
        match self {
            Scope::Global => None,
            Scope::Guild(id) | Scope::Channel(id) => Some(*id),
        }
    }

    /// The guild id for guild scopes.
    pub fn guild_id(&self) -> Option<Snowflake> {
        match self {
            Scope::Guild(id) => Some(*id),
            _ => None,
        }
    }

    /// Global scope for `None`, guild scope otherwise.
    pub fn guild_or_global(guild_id: Option<Snowflake>) -> Self {
        guild_id.map(Scope::Guild).unwrap_or(Scope::Global)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => write!(f, "global"),
            Scope::Guild(id) => write!(f, "guild:{}", id),
            Scope::Channel(id) => write!(f, "channel:{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Scope::Global.to_string(), "global");
        assert_eq!(Scope::Guild(Snowflake::new(7)).to_string(), "guild:7");
        assert_eq!(Scope::Channel(Snowflake::new(9)).to_string(), "channel:9");
    }

    #[test]
    fn test_guild_or_global() {
        assert_eq!(Scope::guild_or_global(None), Scope::Global);
        assert_eq!(
            Scope::guild_or_global(Some(Snowflake::new(1))),
            Scope::Guild(Snowflake::new(1))
        );
    }
}
