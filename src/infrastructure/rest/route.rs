//! REST routes used for cache-miss fetches.

use std::fmt;

use reqwest::Method;

use crate::domain::value_objects::Snowflake;

/// A single REST endpoint with its path parameters bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    GetGuild { guild_id: Snowflake },
    GetChannel { channel_id: Snowflake },
    GetUser { user_id: Snowflake },
    GetMember { guild_id: Snowflake, user_id: Snowflake },
    GetMessage { channel_id: Snowflake, message_id: Snowflake },
    /// All roles of a guild; there is no single-role read
    GetGuildRoles { guild_id: Snowflake },
    GetGuildEmoji { guild_id: Snowflake, emoji_id: Snowflake },
    GetScheduledEvent { guild_id: Snowflake, event_id: Snowflake },
}

impl Route {
    pub fn method(&self) -> Method {
        Method::GET
    }

    /// Path relative to the API base URL.
    pub fn path(&self) -> String {
        match self {
            Route::GetGuild { guild_id } => format!("/guilds/{guild_id}"),
            Route::GetChannel { channel_id } => format!("/channels/{channel_id}"),
            Route::GetUser { user_id } => format!("/users/{user_id}"),
            Route::GetMember { guild_id, user_id } => {
                format!("/guilds/{guild_id}/members/{user_id}")
            }
            Route::GetMessage { channel_id, message_id } => {
                format!("/channels/{channel_id}/messages/{message_id}")
            }
            Route::GetGuildRoles { guild_id } => format!("/guilds/{guild_id}/roles"),
            Route::GetGuildEmoji { guild_id, emoji_id } => {
                format!("/guilds/{guild_id}/emojis/{emoji_id}")
            }
            Route::GetScheduledEvent { guild_id, event_id } => {
                format!("/guilds/{guild_id}/scheduled-events/{event_id}")
            }
        }
    }

    /// Low-cardinality label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Route::GetGuild { .. } => "get_guild",
            Route::GetChannel { .. } => "get_channel",
            Route::GetUser { .. } => "get_user",
            Route::GetMember { .. } => "get_member",
            Route::GetMessage { .. } => "get_message",
            Route::GetGuildRoles { .. } => "get_guild_roles",
            Route::GetGuildEmoji { .. } => "get_guild_emoji",
            Route::GetScheduledEvent { .. } => "get_scheduled_event",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method(), self.path())
    }
}
