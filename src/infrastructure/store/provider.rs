//! One store per entity kind.

use std::sync::Arc;

use tracing::{debug, instrument};

use super::{EntityStore, StoreBackend};
use crate::domain::models::{
    ChannelModel, EmoteModel, GuildModel, MemberModel, MessageModel, PresenceModel, RoleModel,
    ScheduledEventModel, StageInstanceModel, ThreadModel, UserModel, VoiceStateModel,
};
use crate::domain::value_objects::{Scope, ScopeShape};
use crate::shared::error::StoreError;

/// The full set of stores backing a client.
#[derive(Clone)]
pub struct StoreProvider {
    pub guilds: Arc<dyn EntityStore<GuildModel>>,
    pub channels: Arc<dyn EntityStore<ChannelModel>>,
    pub threads: Arc<dyn EntityStore<ThreadModel>>,
    pub users: Arc<dyn EntityStore<UserModel>>,
    pub members: Arc<dyn EntityStore<MemberModel>>,
    pub roles: Arc<dyn EntityStore<RoleModel>>,
    pub emotes: Arc<dyn EntityStore<EmoteModel>>,
    pub messages: Arc<dyn EntityStore<MessageModel>>,
    pub voice_states: Arc<dyn EntityStore<VoiceStateModel>>,
    pub scheduled_events: Arc<dyn EntityStore<ScheduledEventModel>>,
    pub stage_instances: Arc<dyn EntityStore<StageInstanceModel>>,
    pub presences: Arc<dyn EntityStore<PresenceModel>>,
}

impl StoreProvider {
    pub fn new<B: StoreBackend>(backend: &B) -> Self {
        debug!(backend = backend.name(), "Opening entity stores");
        Self {
            guilds: backend.open(),
            channels: backend.open(),
            threads: backend.open(),
            users: backend.open(),
            members: backend.open(),
            roles: backend.open(),
            emotes: backend.open(),
            messages: backend.open(),
            voice_states: backend.open(),
            scheduled_events: backend.open(),
            stage_instances: backend.open(),
            presences: backend.open(),
        }
    }

    /// Scopes below `scope`, derived from stored channels and threads.
    ///
    /// A guild's descendants are the message scopes of its channels and
    /// threads. The global scope's descendants are every guild scope, every
    /// DM channel scope, and theirs in turn.
    pub async fn descendant_scopes(&self, scope: Scope) -> Result<Vec<Scope>, StoreError> {
        match scope {
            Scope::Guild(_) => self.channel_scopes_of(scope).await,
            Scope::Global => {
                let mut scopes = Vec::new();
                for guild_id in self.guilds.get_all_ids(Scope::Global).await? {
                    let guild = Scope::Guild(guild_id);
                    scopes.push(guild);
                    scopes.extend(self.channel_scopes_of(guild).await?);
                }
                scopes.extend(self.channel_scopes_of(Scope::Global).await?);
                Ok(scopes)
            }
            Scope::Channel(_) => Ok(Vec::new()),
        }
    }

    /// Message scopes opened by channels (and, under a guild, threads)
    /// stored directly in `scope`.
    async fn channel_scopes_of(&self, scope: Scope) -> Result<Vec<Scope>, StoreError> {
        let mut ids = self.channels.get_all_ids(scope).await?;
        if let Scope::Guild(_) = scope {
            ids.extend(self.threads.get_all_ids(scope).await?);
        }
        Ok(ids.into_iter().map(Scope::Channel).collect())
    }

    /// Remove every entry under `scope` and all of its descendant scopes.
    ///
    /// Returns the number of entries removed across all kinds.
    #[instrument(skip(self), level = "debug")]
    pub async fn purge_scope(&self, scope: Scope) -> Result<usize, StoreError> {
        let mut scopes = self.descendant_scopes(scope).await?;
        scopes.push(scope);

        let mut removed = 0;
        for target in scopes {
            removed += self.purge_single(target).await?;
        }

        debug!(%scope, removed, "Scope purged");
        Ok(removed)
    }

    async fn purge_single(&self, scope: Scope) -> Result<usize, StoreError> {
        let removed = match scope.shape() {
            ScopeShape::Global => {
                self.guilds.purge_scope(scope).await?.len()
                    + self.channels.purge_scope(scope).await?.len()
                    + self.users.purge_scope(scope).await?.len()
            }
            ScopeShape::Guild => {
                let (channels, threads, members, roles, emotes, voice, events, stages, presences) = tokio::try_join!(
                    self.channels.purge_scope(scope),
                    self.threads.purge_scope(scope),
                    self.members.purge_scope(scope),
                    self.roles.purge_scope(scope),
                    self.emotes.purge_scope(scope),
                    self.voice_states.purge_scope(scope),
                    self.scheduled_events.purge_scope(scope),
                    self.stage_instances.purge_scope(scope),
                    self.presences.purge_scope(scope),
                )?;
                channels.len()
                    + threads.len()
                    + members.len()
                    + roles.len()
                    + emotes.len()
                    + voice.len()
                    + events.len()
                    + stages.len()
                    + presences.len()
            }
            ScopeShape::Channel => self.messages.purge_scope(scope).await?.len(),
        };
        Ok(removed)
    }
}
