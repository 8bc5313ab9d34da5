//! Owner of every broker and the cross-kind cache state.

use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashSet;
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::broker::Broker;
use super::eviction::{EvictionPolicy, IdleFor, MaxEntriesPerScope, NeverEvict};
use crate::application::events::EventSink;
use crate::config::CacheSettings;
use crate::domain::models::{
    ChannelModel, EmoteModel, EntityKind, GuildModel, MemberModel, MessageModel, Model,
    PresenceModel, RoleModel, ScheduledEventModel, StageInstanceModel, ThreadModel, UserModel,
    VoiceStateModel,
};
use crate::domain::value_objects::{Scope, ScopeShape, Snowflake};
use crate::infrastructure::store::{ScopeRegistry, StoreProvider};
use crate::shared::error::CacheError;

/// Entity counts at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Stored models per kind
    pub entities: Vec<(EntityKind, usize)>,
    /// Live scopes, global included
    pub scopes: usize,
    pub unavailable_guilds: usize,
}

impl CacheStats {
    pub fn count(&self, kind: EntityKind) -> usize {
        self.entities
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.entities.iter().map(|(_, n)| n).sum()
    }
}

/// Shared cache state: one broker per kind plus the scope tree, the
/// unavailable-guild set and the current user.
///
/// Entities hold a weak reference back to the controller to resolve their
/// relations, so dropping the client frees the whole graph.
pub struct StateController {
    stores: StoreProvider,
    scopes: Arc<ScopeRegistry>,

    guilds: Broker<GuildModel>,
    channels: Broker<ChannelModel>,
    threads: Broker<ThreadModel>,
    users: Broker<UserModel>,
    members: Broker<MemberModel>,
    roles: Broker<RoleModel>,
    emotes: Broker<EmoteModel>,
    messages: Broker<MessageModel>,
    voice_states: Broker<VoiceStateModel>,
    scheduled_events: Broker<ScheduledEventModel>,
    stage_instances: Broker<StageInstanceModel>,
    presences: Broker<PresenceModel>,

    unavailable: DashSet<Snowflake>,
    current_user: RwLock<Option<Snowflake>>,
    events: EventSink,
}

impl StateController {
    pub fn new(stores: StoreProvider, cache: &CacheSettings, events: EventSink) -> Arc<Self> {
        let scopes = Arc::new(ScopeRegistry::new());
        let never: Arc<dyn EvictionPolicy> = Arc::new(NeverEvict);
        let recent: Arc<dyn EvictionPolicy> =
            Arc::new(MaxEntriesPerScope::new(cache.message_cache_size));
        let idle: Arc<dyn EvictionPolicy> = match cache.member_idle() {
            Some(idle) => Arc::new(IdleFor::new(idle)),
            None => Arc::clone(&never),
        };

        Arc::new_cyclic(|weak: &Weak<Self>| {
            macro_rules! broker {
                ($store:ident, $policy:expr) => {
                    Broker::new(
                        Arc::clone(&stores.$store),
                        Arc::clone(&scopes),
                        Arc::clone($policy),
                        weak.clone(),
                    )
                };
            }

            Self {
                guilds: broker!(guilds, &never),
                channels: broker!(channels, &never),
                threads: broker!(threads, &never),
                users: broker!(users, &idle),
                members: broker!(members, &idle),
                roles: broker!(roles, &never),
                emotes: broker!(emotes, &never),
                messages: broker!(messages, &recent),
                voice_states: broker!(voice_states, &never),
                scheduled_events: broker!(scheduled_events, &never),
                stage_instances: broker!(stage_instances, &never),
                presences: broker!(presences, &idle),
                stores: stores.clone(),
                scopes: Arc::clone(&scopes),
                unavailable: DashSet::new(),
                current_user: RwLock::new(None),
                events,
            }
        })
    }

    // ------------------------------------------------------------------------
    // Brokers
    // ------------------------------------------------------------------------

    pub fn guilds(&self) -> &Broker<GuildModel> {
        &self.guilds
    }

    pub fn channels(&self) -> &Broker<ChannelModel> {
        &self.channels
    }

    pub fn threads(&self) -> &Broker<ThreadModel> {
        &self.threads
    }

    pub fn users(&self) -> &Broker<UserModel> {
        &self.users
    }

    pub fn members(&self) -> &Broker<MemberModel> {
        &self.members
    }

    pub fn roles(&self) -> &Broker<RoleModel> {
        &self.roles
    }

    pub fn emotes(&self) -> &Broker<EmoteModel> {
        &self.emotes
    }

    pub fn messages(&self) -> &Broker<MessageModel> {
        &self.messages
    }

    pub fn voice_states(&self) -> &Broker<VoiceStateModel> {
        &self.voice_states
    }

    pub fn scheduled_events(&self) -> &Broker<ScheduledEventModel> {
        &self.scheduled_events
    }

    pub fn stage_instances(&self) -> &Broker<StageInstanceModel> {
        &self.stage_instances
    }

    pub fn presences(&self) -> &Broker<PresenceModel> {
        &self.presences
    }

    pub fn stores(&self) -> &StoreProvider {
        &self.stores
    }

    pub fn scopes(&self) -> &ScopeRegistry {
        &self.scopes
    }

    pub fn events(&self) -> &EventSink {
        &self.events
    }

    // ------------------------------------------------------------------------
    // Scopes
    // ------------------------------------------------------------------------

    /// Make sure `Guild(id)` exists, attaching a latent guild if needed.
    pub fn ensure_guild_scope(&self, id: Snowflake) -> Result<(), CacheError> {
        if self.scopes.contains(Scope::Guild(id)) {
            return Ok(());
        }
        self.guilds.attach_latent(Scope::Global, id).map(drop)
    }

    /// Make sure `Channel(id)` exists, attaching a latent channel under
    /// `parent` if needed. A guild parent is ensured first.
    pub fn ensure_channel_scope(&self, parent: Scope, id: Snowflake) -> Result<(), CacheError> {
        if self.scopes.contains(Scope::Channel(id)) {
            return Ok(());
        }
        if let Scope::Guild(guild_id) = parent {
            self.ensure_guild_scope(guild_id)?;
        }
        self.channels.attach_latent(parent, id).map(drop)
    }

    /// Make sure `scope` exists. A channel of unknown parentage is attached
    /// globally and re-parented when its model arrives.
    pub fn ensure_scope(&self, scope: Scope) -> Result<(), CacheError> {
        match scope {
            Scope::Global => Ok(()),
            Scope::Guild(id) => self.ensure_guild_scope(id),
            Scope::Channel(id) => self.ensure_channel_scope(Scope::Global, id),
        }
    }

    /// Drop every entity below and in `scope`, across all kinds.
    ///
    /// Descendant scopes are closed; `scope` itself stays registered.
    #[instrument(skip(self), level = "debug")]
    pub async fn purge_scope(&self, scope: Scope) -> Result<usize, CacheError> {
        let descendants = self.scopes.descendants(scope);

        let mut removed = 0;
        for target in descendants.iter().copied().chain(std::iter::once(scope)) {
            removed += self.purge_single(target).await?;
        }
        for target in descendants {
            self.scopes.unregister(target);
        }

        debug!(%scope, removed, "Scope purged");
        Ok(removed)
    }

    async fn purge_single(&self, scope: Scope) -> Result<usize, CacheError> {
        let removed = match scope.shape() {
            ScopeShape::Global => {
                let (guilds, channels, users) = tokio::try_join!(
                    self.guilds.purge_scope(scope),
                    self.channels.purge_scope(scope),
                    self.users.purge_scope(scope),
                )?;
                guilds + channels + users
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
                channels + threads + members + roles + emotes + voice + events + stages + presences
            }
            ScopeShape::Channel => self.messages.purge_scope(scope).await?,
        };
        Ok(removed)
    }

    /// Remove a guild with everything it owns.
    #[instrument(skip(self), level = "debug")]
    pub async fn remove_guild(&self, id: Snowflake) -> Result<Option<Arc<GuildModel>>, CacheError> {
        let scope = Scope::Guild(id);
        if self.scopes.contains(scope) {
            self.purge_scope(scope).await?;
        }
        let last = self.guilds.remove(Scope::Global, id).await?;
        self.scopes.unregister(scope);
        self.unavailable.remove(&id);
        Ok(last)
    }

    /// Remove a channel and its messages.
    pub async fn remove_channel(
        &self,
        scope: Scope,
        id: Snowflake,
    ) -> Result<Option<Arc<ChannelModel>>, CacheError> {
        self.close_channel_scope(id).await?;
        self.channels.remove(scope, id).await
    }

    /// Remove a thread and its messages.
    pub async fn remove_thread(
        &self,
        guild_id: Snowflake,
        id: Snowflake,
    ) -> Result<Option<Arc<ThreadModel>>, CacheError> {
        self.close_channel_scope(id).await?;
        self.threads.remove(Scope::Guild(guild_id), id).await
    }

    async fn close_channel_scope(&self, id: Snowflake) -> Result<(), CacheError> {
        let scope = Scope::Channel(id);
        if self.scopes.contains(scope) {
            self.messages.purge_scope(scope).await?;
            self.scopes.unregister(scope);
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Availability and session
    // ------------------------------------------------------------------------

    /// Returns `true` if the guild was not already marked.
    pub fn mark_unavailable(&self, id: Snowflake) -> bool {
        self.unavailable.insert(id)
    }

    /// Returns `true` if the guild had been marked unavailable.
    pub fn mark_available(&self, id: Snowflake) -> bool {
        self.unavailable.remove(&id).is_some()
    }

    pub fn is_unavailable(&self, id: Snowflake) -> bool {
        self.unavailable.contains(&id)
    }

    pub fn unavailable_guilds(&self) -> Vec<Snowflake> {
        let mut ids: Vec<Snowflake> = self.unavailable.iter().map(|id| *id).collect();
        ids.sort();
        ids
    }

    pub fn set_current_user(&self, id: Snowflake) {
        *self.current_user.write() = Some(id);
    }

    pub fn current_user_id(&self) -> Option<Snowflake> {
        *self.current_user.read()
    }

    // ------------------------------------------------------------------------
    // Eviction and stats
    // ------------------------------------------------------------------------

    /// Run every broker's eviction policy once.
    pub async fn run_eviction(&self) -> Result<usize, CacheError> {
        let evicted = self.messages.evict().await?
            + self.presences.evict().await?
            + self.members.evict().await?
            + self.users.evict().await?
            + self.guilds.evict().await?
            + self.channels.evict().await?
            + self.threads.evict().await?
            + self.roles.evict().await?
            + self.emotes.evict().await?
            + self.voice_states.evict().await?
            + self.scheduled_events.evict().await?
            + self.stage_instances.evict().await?;
        Ok(evicted)
    }

    pub async fn stats(&self) -> CacheStats {
        let entities = vec![
            (GuildModel::KIND, self.guilds.stored().await),
            (ChannelModel::KIND, self.channels.stored().await),
            (ThreadModel::KIND, self.threads.stored().await),
            (UserModel::KIND, self.users.stored().await),
            (MemberModel::KIND, self.members.stored().await),
            (RoleModel::KIND, self.roles.stored().await),
            (EmoteModel::KIND, self.emotes.stored().await),
            (MessageModel::KIND, self.messages.stored().await),
            (VoiceStateModel::KIND, self.voice_states.stored().await),
            (ScheduledEventModel::KIND, self.scheduled_events.stored().await),
            (StageInstanceModel::KIND, self.stage_instances.stored().await),
            (PresenceModel::KIND, self.presences.stored().await),
        ];
        CacheStats {
            entities,
            scopes: self.scopes.count(),
            unavailable_guilds: self.unavailable.len(),
        }
    }

    /// Sweep eviction policies every `interval` until `token` is cancelled.
    ///
    /// The task holds only a weak reference and stops once the controller
    /// is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration, token: CancellationToken) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(state) = weak.upgrade() else { break };
                        match state.run_eviction().await {
                            Ok(0) => {}
                            Ok(evicted) => debug!(evicted, "Eviction sweep finished"),
                            Err(e) => warn!(error = %e, "Eviction sweep failed"),
                        }
                    }
                }
            }
            info!("Eviction sweeper stopped");
        })
    }
}
