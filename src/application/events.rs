//! Domain events emitted by dispatch processors.
//!
//! Events carry ids and model snapshots, never entity handles, so a slow
//! consumer cannot pin cache entries.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::trace;

use crate::domain::models::{
    ChannelModel, GuildModel, MemberModel, MessageModel, PresenceModel, ReactionEmoji, RoleModel,
    ScheduledEventModel, StageInstanceModel, ThreadModel, UserModel, VoiceStateModel,
};
use crate::domain::value_objects::Snowflake;

/// A change applied to the cache.
#[derive(Debug, Clone)]
pub enum CacheEvent {
    Ready {
        user_id: Snowflake,
        guilds: usize,
    },
    UserUpdated(Arc<UserModel>),

    GuildCreated(Arc<GuildModel>),
    /// A guild recovered from an outage
    GuildAvailable(Arc<GuildModel>),
    GuildUpdated(Arc<GuildModel>),
    GuildUnavailable {
        guild_id: Snowflake,
    },
    GuildRemoved {
        guild_id: Snowflake,
        last: Option<Arc<GuildModel>>,
    },
    EmotesUpdated {
        guild_id: Snowflake,
        count: usize,
    },

    ChannelCreated(Arc<ChannelModel>),
    ChannelUpdated(Arc<ChannelModel>),
    ChannelDeleted {
        channel_id: Snowflake,
        last: Option<Arc<ChannelModel>>,
    },
    ThreadCreated(Arc<ThreadModel>),
    ThreadUpdated(Arc<ThreadModel>),
    ThreadDeleted {
        guild_id: Snowflake,
        thread_id: Snowflake,
    },

    RoleCreated {
        guild_id: Snowflake,
        role: Arc<RoleModel>,
    },
    RoleUpdated {
        guild_id: Snowflake,
        role: Arc<RoleModel>,
    },
    RoleDeleted {
        guild_id: Snowflake,
        role_id: Snowflake,
    },

    MemberJoined {
        guild_id: Snowflake,
        member: Arc<MemberModel>,
    },
    MemberUpdated {
        guild_id: Snowflake,
        member: Arc<MemberModel>,
    },
    MemberLeft {
        guild_id: Snowflake,
        user_id: Snowflake,
    },
    MembersChunk {
        guild_id: Snowflake,
        count: usize,
        last: bool,
    },
    PresenceUpdated {
        guild_id: Snowflake,
        presence: Arc<PresenceModel>,
    },

    MessageCreated(Arc<MessageModel>),
    MessageUpdated(Arc<MessageModel>),
    MessageDeleted {
        channel_id: Snowflake,
        message_id: Snowflake,
        last: Option<Arc<MessageModel>>,
    },
    MessagesBulkDeleted {
        channel_id: Snowflake,
        message_ids: Vec<Snowflake>,
    },
    ReactionAdded {
        channel_id: Snowflake,
        message_id: Snowflake,
        user_id: Snowflake,
        emoji: ReactionEmoji,
    },
    ReactionRemoved {
        channel_id: Snowflake,
        message_id: Snowflake,
        user_id: Snowflake,
        emoji: ReactionEmoji,
    },
    ReactionsCleared {
        channel_id: Snowflake,
        message_id: Snowflake,
    },

    VoiceStateUpdated {
        guild_id: Snowflake,
        state: Arc<VoiceStateModel>,
    },
    VoiceDisconnected {
        guild_id: Snowflake,
        user_id: Snowflake,
    },

    ScheduledEventUpserted(Arc<ScheduledEventModel>),
    ScheduledEventDeleted {
        guild_id: Snowflake,
        event_id: Snowflake,
    },
    StageInstanceUpserted(Arc<StageInstanceModel>),
    StageInstanceDeleted {
        guild_id: Snowflake,
        stage_id: Snowflake,
    },
}

impl CacheEvent {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ready { .. } => "ready",
            Self::UserUpdated(_) => "user_updated",
            Self::GuildCreated(_) => "guild_created",
            Self::GuildAvailable(_) => "guild_available",
            Self::GuildUpdated(_) => "guild_updated",
            Self::GuildUnavailable { .. } => "guild_unavailable",
            Self::GuildRemoved { .. } => "guild_removed",
            Self::EmotesUpdated { .. } => "emotes_updated",
            Self::ChannelCreated(_) => "channel_created",
            Self::ChannelUpdated(_) => "channel_updated",
            Self::ChannelDeleted { .. } => "channel_deleted",
            Self::ThreadCreated(_) => "thread_created",
            Self::ThreadUpdated(_) => "thread_updated",
            Self::ThreadDeleted { .. } => "thread_deleted",
            Self::RoleCreated { .. } => "role_created",
            Self::RoleUpdated { .. } => "role_updated",
            Self::RoleDeleted { .. } => "role_deleted",
            Self::MemberJoined { .. } => "member_joined",
            Self::MemberUpdated { .. } => "member_updated",
            Self::MemberLeft { .. } => "member_left",
            Self::MembersChunk { .. } => "members_chunk",
            Self::PresenceUpdated { .. } => "presence_updated",
            Self::MessageCreated(_) => "message_created",
            Self::MessageUpdated(_) => "message_updated",
            Self::MessageDeleted { .. } => "message_deleted",
            Self::MessagesBulkDeleted { .. } => "messages_bulk_deleted",
            Self::ReactionAdded { .. } => "reaction_added",
            Self::ReactionRemoved { .. } => "reaction_removed",
            Self::ReactionsCleared { .. } => "reactions_cleared",
            Self::VoiceStateUpdated { .. } => "voice_state_updated",
            Self::VoiceDisconnected { .. } => "voice_disconnected",
            Self::ScheduledEventUpserted(_) => "scheduled_event_upserted",
            Self::ScheduledEventDeleted { .. } => "scheduled_event_deleted",
            Self::StageInstanceUpserted(_) => "stage_instance_upserted",
            Self::StageInstanceDeleted { .. } => "stage_instance_deleted",
        }
    }
}

/// Create a bounded event queue.
pub fn channel(capacity: usize) -> (EventSink, EventHub) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let subscribed = Arc::new(AtomicBool::new(false));
    (
        EventSink {
            tx,
            subscribed: Arc::clone(&subscribed),
        },
        EventHub {
            rx: Mutex::new(Some(rx)),
            subscribed,
        },
    )
}

/// Producer side, held by the state controller.
///
/// Until a subscriber takes the stream, events are dropped. Afterwards
/// `emit` waits for queue capacity, so a slow consumer slows dispatch.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<CacheEvent>,
    subscribed: Arc<AtomicBool>,
}

impl EventSink {
    pub async fn emit(&self, event: CacheEvent) {
        if !self.subscribed.load(Ordering::Acquire) {
            return;
        }
        trace!(event = event.name(), "Emitting cache event");
        if self.tx.send(event).await.is_err() {
            // Subscriber dropped the stream
            self.subscribed.store(false, Ordering::Release);
        }
    }

    pub fn has_subscriber(&self) -> bool {
        self.subscribed.load(Ordering::Acquire)
    }
}

/// Hands out the single consumer stream.
#[derive(Debug)]
pub struct EventHub {
    rx: Mutex<Option<mpsc::Receiver<CacheEvent>>>,
    subscribed: Arc<AtomicBool>,
}

impl EventHub {
    /// Take the event stream. Returns `None` after the first call.
    pub fn take(&self) -> Option<EventStream> {
        let rx = self.rx.lock().take()?;
        self.subscribed.store(true, Ordering::Release);
        Some(EventStream { rx })
    }
}

/// Consumer side of the event queue.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::Receiver<CacheEvent>,
}

impl EventStream {
    pub async fn recv(&mut self) -> Option<CacheEvent> {
        self.rx.recv().await
    }

    /// Next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<CacheEvent> {
        self.rx.try_recv().ok()
    }
}

impl Stream for EventStream {
    type Item = CacheEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
