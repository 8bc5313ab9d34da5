//! Discord permission bitfield.
//!
//! Role payloads carry permissions as a decimal string (the value no longer
//! fits in a JSON double), so serialization goes through the string form.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Permission bitfield with Discord-compatible flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Permissions(pub u64);

impl Permissions {
    /// Allows creation of instant invites
    pub const CREATE_INSTANT_INVITE: u64 = 1 << 0;
    /// Allows kicking members
    pub const KICK_MEMBERS: u64 = 1 << 1;
    /// Allows banning members
    pub const BAN_MEMBERS: u64 = 1 << 2;
    /// Allows all permissions and bypasses channel overwrites
    pub const ADMINISTRATOR: u64 = 1 << 3;
    /// Allows management and editing of channels
    pub const MANAGE_CHANNELS: u64 = 1 << 4;
    /// Allows management and editing of the guild
    pub const MANAGE_GUILD: u64 = 1 << 5;
    /// Allows adding reactions to messages
    pub const ADD_REACTIONS: u64 = 1 << 6;
    /// Allows viewing the audit log
    pub const VIEW_AUDIT_LOG: u64 = 1 << 7;
    /// Allows using priority speaker in a voice channel
    pub const PRIORITY_SPEAKER: u64 = 1 << 8;
    /// Allows the user to go live
    pub const STREAM: u64 = 1 << 9;
    /// Allows viewing a channel
    pub const VIEW_CHANNEL: u64 = 1 << 10;
    /// Allows sending messages
    pub const SEND_MESSAGES: u64 = 1 << 11;
    /// Allows sending text-to-speech messages
    pub const SEND_TTS_MESSAGES: u64 = 1 << 12;
    /// Allows deleting messages of other users
    pub const MANAGE_MESSAGES: u64 = 1 << 13;
    /// Links sent will be auto-embedded
    pub const EMBED_LINKS: u64 = 1 << 14;
    /// Allows uploading files
    pub const ATTACH_FILES: u64 = 1 << 15;
    /// Allows reading message history
    pub const READ_MESSAGE_HISTORY: u64 = 1 << 16;
    /// Allows using @everyone and @here
    pub const MENTION_EVERYONE: u64 = 1 << 17;
    /// Allows using emojis from other guilds
    pub const USE_EXTERNAL_EMOJIS: u64 = 1 << 18;
    /// Allows viewing guild insights
    pub const VIEW_GUILD_INSIGHTS: u64 = 1 << 19;
    /// Allows joining a voice channel
    pub const CONNECT: u64 = 1 << 20;
    /// Allows speaking in a voice channel
    pub const SPEAK: u64 = 1 << 21;
    /// Allows muting members in voice
    pub const MUTE_MEMBERS: u64 = 1 << 22;
    /// Allows deafening members in voice
    pub const DEAFEN_MEMBERS: u64 = 1 << 23;
    /// Allows moving members between voice channels
    pub const MOVE_MEMBERS: u64 = 1 << 24;
    /// Allows using voice activity detection
    pub const USE_VAD: u64 = 1 << 25;
    /// Allows changing own nickname
    pub const CHANGE_NICKNAME: u64 = 1 << 26;
    /// Allows changing other members' nicknames
    pub const MANAGE_NICKNAMES: u64 = 1 << 27;
    /// Allows management of roles
    pub const MANAGE_ROLES: u64 = 1 << 28;
    /// Allows management of webhooks
    pub const MANAGE_WEBHOOKS: u64 = 1 << 29;
    /// Allows management of emojis and stickers
    pub const MANAGE_GUILD_EXPRESSIONS: u64 = 1 << 30;
    /// Allows using application commands
    pub const USE_APPLICATION_COMMANDS: u64 = 1 << 31;
    /// Allows requesting to speak in stage channels
    pub const REQUEST_TO_SPEAK: u64 = 1 << 32;
    /// Allows management of scheduled events
    pub const MANAGE_EVENTS: u64 = 1 << 33;
    /// Allows management of threads
    pub const MANAGE_THREADS: u64 = 1 << 34;
    /// Allows creating public threads
    pub const CREATE_PUBLIC_THREADS: u64 = 1 << 35;
    /// Allows creating private threads
    pub const CREATE_PRIVATE_THREADS: u64 = 1 << 36;
    /// Allows using stickers from other guilds
    pub const USE_EXTERNAL_STICKERS: u64 = 1 << 37;
    /// Allows sending messages in threads
    pub const SEND_MESSAGES_IN_THREADS: u64 = 1 << 38;
    /// Allows launching embedded activities
    pub const USE_EMBEDDED_ACTIVITIES: u64 = 1 << 39;
    /// Allows timing out members
    pub const MODERATE_MEMBERS: u64 = 1 << 40;

    /// All permission flags known to this crate
    pub const ALL: u64 = (1 << 41) - 1;

    /// Create a new Permissions instance.
    pub const fn new(bits: u64) -> Self {
        Self(bits)
    }

    /// Create empty permissions.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Create permissions with all flags set.
    pub const fn all() -> Self {
        Self(Self::ALL)
    }

    /// Check if a specific permission is set.
    pub const fn has(&self, permission: u64) -> bool {
        // Administrator overrides all
        if self.0 & Self::ADMINISTRATOR != 0 {
            return true;
        }
        self.0 & permission == permission
    }

    /// Check if administrator permission is set.
    pub const fn is_admin(&self) -> bool {
        self.0 & Self::ADMINISTRATOR != 0
    }

    /// Combine with another Permissions (union).
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Get the raw bits.
    pub const fn bits(&self) -> u64 {
        self.0
    }

    /// Compute effective permissions after applying an overwrite pair.
    pub const fn apply_overwrite(self, allow: u64, deny: u64) -> Self {
        Self((self.0 & !deny) | allow)
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Permissions {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl std::ops::BitOr for Permissions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitAnd for Permissions {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        Self(self.0 & rhs.0)
    }
}

impl Serialize for Permissions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

struct PermissionsVisitor;

impl<'de> Visitor<'de> for PermissionsVisitor {
    type Value = Permissions;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a permission bitfield as a decimal string or integer")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Permissions(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        v.parse().map(Permissions).map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Permissions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(PermissionsVisitor)
    }
}
