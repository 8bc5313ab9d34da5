//! # Gateway Intake
//!
//! Turns the gateway's ordered dispatch stream into cache writes. The
//! transport (connection, heartbeats, resume) is external: it hands this
//! module decoded [`GatewayDispatch`] values through a channel.

pub mod event_loop;
pub mod messages;

pub use event_loop::{GatewayEventLoop, LoopSummary};
pub use messages::{parse_line, GatewayDispatch, GatewayFrame, OpCode};
