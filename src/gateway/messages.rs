//! Gateway frame types.
//!
//! Only what the cache consumes: op-0 dispatch frames. Connection handling
//! (identify, heartbeats, resume) belongs to the transport.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::domain::value_objects::Snowflake;
use crate::shared::error::CodecError;

/// Gateway opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    /// Event dispatch
    Dispatch = 0,
    /// Heartbeat
    Heartbeat = 1,
    /// Identify
    Identify = 2,
    /// Presence update
    PresenceUpdate = 3,
    /// Voice state update
    VoiceStateUpdate = 4,
    /// Resume
    Resume = 6,
    /// Reconnect
    Reconnect = 7,
    /// Request guild members
    RequestGuildMembers = 8,
    /// Invalid session
    InvalidSession = 9,
    /// Hello
    Hello = 10,
    /// Heartbeat ACK
    HeartbeatAck = 11,
}

impl TryFrom<u8> for OpCode {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => OpCode::Dispatch,
            1 => OpCode::Heartbeat,
            2 => OpCode::Identify,
            3 => OpCode::PresenceUpdate,
            4 => OpCode::VoiceStateUpdate,
            6 => OpCode::Resume,
            7 => OpCode::Reconnect,
            8 => OpCode::RequestGuildMembers,
            9 => OpCode::InvalidSession,
            10 => OpCode::Hello,
            11 => OpCode::HeartbeatAck,
            other => return Err(CodecError::UnsupportedOpcode(other)),
        })
    }
}

/// A raw gateway frame
#[derive(Debug, Deserialize)]
pub struct GatewayFrame {
    pub op: u8,
    #[serde(default)]
    pub d: Option<Value>,
    #[serde(default)]
    pub s: Option<u64>,
    #[serde(default)]
    pub t: Option<String>,
}

impl GatewayFrame {
    pub fn parse(text: &str) -> Result<Self, CodecError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn opcode(&self) -> Result<OpCode, CodecError> {
        OpCode::try_from(self.op)
    }

    /// The dispatch carried by this frame, or `None` for control frames.
    pub fn into_dispatch(self) -> Result<Option<GatewayDispatch>, CodecError> {
        if self.opcode()? != OpCode::Dispatch {
            return Ok(None);
        }
        let event_name = self
            .t
            .ok_or_else(|| CodecError::Validation("dispatch frame without event name".into()))?;

        Ok(Some(GatewayDispatch {
            event_name,
            payload: self.d.unwrap_or(Value::Null),
            sequence: self.s,
        }))
    }
}

/// One event as delivered to the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayDispatch {
    pub event_name: String,
    pub payload: Value,
    pub sequence: Option<u64>,
}

impl GatewayDispatch {
    pub fn new(event_name: impl Into<String>, payload: Value) -> Self {
        Self {
            event_name: event_name.into(),
            payload,
            sequence: None,
        }
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = Some(sequence);
        self
    }

    /// The id whose events must stay ordered relative to each other.
    ///
    /// Guild events key on the guild itself, everything else on its guild
    /// or, for DM traffic, its channel. `None` means the event touches
    /// state shared across guilds.
    pub fn routing_key(&self) -> Option<Snowflake> {
        let field = match self.event_name.as_str() {
            "GUILD_CREATE" | "GUILD_UPDATE" | "GUILD_DELETE" => "id",
            _ => "guild_id",
        };
        snowflake_field(&self.payload, field)
            .or_else(|| snowflake_field(&self.payload, "channel_id"))
    }
}

/// Parse one line of a replay file: either a full gateway frame or a bare
/// dispatch record. Control frames yield `None`.
pub fn parse_line(text: &str) -> Result<Option<GatewayDispatch>, CodecError> {
    let value: Value = serde_json::from_str(text)?;
    if value.get("op").is_some() {
        let frame = GatewayFrame::deserialize(&value)?;
        return frame.into_dispatch();
    }
    Ok(Some(GatewayDispatch::deserialize(&value)?))
}

fn snowflake_field(payload: &Value, field: &str) -> Option<Snowflake> {
    payload
        .get(field)
        .filter(|value| !value.is_null())
        .and_then(|value| Snowflake::deserialize(value).ok())
}

/// Accepts `{"t": ..., "d": ...}` frames and bare `{"event_name": ..., "payload": ...}`
/// records, which is what replay files contain.
impl<'de> Deserialize<'de> for GatewayDispatch {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Record {
            #[serde(alias = "t")]
            event_name: String,
            #[serde(default, alias = "d")]
            payload: Value,
            #[serde(default, alias = "s")]
            sequence: Option<u64>,
        }

        let record = Record::deserialize(deserializer)?;
        Ok(Self {
            event_name: record.event_name,
            payload: record.payload,
            sequence: record.sequence,
        })
    }
}
