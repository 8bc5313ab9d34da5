//! Client Façade
//!
//! The application's entry point into the cache. Reads go to the cache
//! first and, when allowed, fall back to REST. A REST result is written
//! through the same broker path gateway events use, so a model arriving
//! from either side canonicalizes the same way.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

use crate::application::dispatch::ProcessorRegistry;
use crate::application::events::{self, EventHub, EventStream};
use crate::application::state::{Broker, EntityHandle, StateController};
use crate::config::Settings;
use crate::domain::models::{
    ChannelModel, EmoteModel, GuildModel, MemberModel, MessageModel, Model, PresenceModel,
    RoleModel, ScheduledEventModel, StageInstanceModel, ThreadModel, UserModel, VoiceStateModel,
};
use crate::domain::value_objects::{Scope, ScopeShape, Snowflake};
use crate::gateway::GatewayEventLoop;
use crate::infrastructure::codec;
use crate::infrastructure::rest::{HttpRestExecutor, RequestOptions, RestExecutor, Route};
use crate::infrastructure::store::{MemoryBackend, StoreBackend, StoreProvider};
use crate::shared::error::{ClientError, RestError};

/// How a read may reach beyond the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Query the cache first, then REST on a miss, populating the cache
    #[default]
    AllowDownload,
    /// Never touch the network; a miss is `None`
    CacheOnly,
}

/// A kind the façade can serve: where its broker lives, and how to fetch
/// one over REST.
pub trait Fetchable: Model + DeserializeOwned + Validate + Sized {
    fn broker(state: &StateController) -> &Broker<Self>;

    /// The route that reads `id`, if the kind has one.
    fn route(scope: Option<Scope>, id: Snowflake) -> Option<Route>;

    /// Pick the record for `id` out of a response body.
    fn select(body: Value, _id: Snowflake) -> Option<Value> {
        Some(body)
    }
}

fn guild_of(scope: Option<Scope>) -> Option<Snowflake> {
    scope.and_then(|s| s.guild_id())
}

impl Fetchable for GuildModel {
    fn broker(state: &StateController) -> &Broker<Self> {
        state.guilds()
    }

    fn route(_scope: Option<Scope>, id: Snowflake) -> Option<Route> {
        Some(Route::GetGuild { guild_id: id })
    }
}

impl Fetchable for ChannelModel {
    fn broker(state: &StateController) -> &Broker<Self> {
        state.channels()
    }

    fn route(_scope: Option<Scope>, id: Snowflake) -> Option<Route> {
        Some(Route::GetChannel { channel_id: id })
    }
}

impl Fetchable for ThreadModel {
    fn broker(state: &StateController) -> &Broker<Self> {
        state.threads()
    }

    fn route(_scope: Option<Scope>, id: Snowflake) -> Option<Route> {
        Some(Route::GetChannel { channel_id: id })
    }
}

impl Fetchable for UserModel {
    fn broker(state: &StateController) -> &Broker<Self> {
        state.users()
    }

    fn route(_scope: Option<Scope>, id: Snowflake) -> Option<Route> {
        Some(Route::GetUser { user_id: id })
    }
}

impl Fetchable for MemberModel {
    fn broker(state: &StateController) -> &Broker<Self> {
        state.members()
    }

    fn route(scope: Option<Scope>, id: Snowflake) -> Option<Route> {
        guild_of(scope).map(|guild_id| Route::GetMember { guild_id, user_id: id })
    }
}

impl Fetchable for RoleModel {
    fn broker(state: &StateController) -> &Broker<Self> {
        state.roles()
    }

    fn route(scope: Option<Scope>, _id: Snowflake) -> Option<Route> {
        guild_of(scope).map(|guild_id| Route::GetGuildRoles { guild_id })
    }

    fn select(body: Value, id: Snowflake) -> Option<Value> {
        let Value::Array(roles) = body else {
            return None;
        };
        let wanted = id.to_string();
        roles
            .into_iter()
            .find(|role| role.get("id").and_then(Value::as_str) == Some(wanted.as_str()))
    }
}

impl Fetchable for EmoteModel {
    fn broker(state: &StateController) -> &Broker<Self> {
        state.emotes()
    }

    fn route(scope: Option<Scope>, id: Snowflake) -> Option<Route> {
        guild_of(scope).map(|guild_id| Route::GetGuildEmoji { guild_id, emoji_id: id })
    }
}

impl Fetchable for MessageModel {
    fn broker(state: &StateController) -> &Broker<Self> {
        state.messages()
    }

    fn route(scope: Option<Scope>, id: Snowflake) -> Option<Route> {
        match scope {
            Some(Scope::Channel(channel_id)) => Some(Route::GetMessage {
                channel_id,
                message_id: id,
            }),
            _ => None,
        }
    }
}

impl Fetchable for ScheduledEventModel {
    fn broker(state: &StateController) -> &Broker<Self> {
        state.scheduled_events()
    }

    fn route(scope: Option<Scope>, id: Snowflake) -> Option<Route> {
        guild_of(scope).map(|guild_id| Route::GetScheduledEvent { guild_id, event_id: id })
    }
}

/// Kinds that only ever arrive over the gateway.
macro_rules! cache_only {
    ($($model:ty => $broker:ident),* $(,)?) => {
        $(
            impl Fetchable for $model {
                fn broker(state: &StateController) -> &Broker<Self> {
                    state.$broker()
                }

                fn route(_scope: Option<Scope>, _id: Snowflake) -> Option<Route> {
                    None
                }
            }
        )*
    };
}

cache_only! {
    VoiceStateModel => voice_states,
    PresenceModel => presences,
    StageInstanceModel => stage_instances,
}

/// Cache-or-fetch access to one kind, optionally within one scope.
pub struct EntityAccessor<'a, M: Fetchable> {
    client: &'a Client,
    /// `None` when entries of the kind live under several scope shapes
    scope: Option<Scope>,
    _kind: std::marker::PhantomData<fn() -> M>,
}

impl<'a, M: Fetchable> EntityAccessor<'a, M> {
    fn new(client: &'a Client, scope: Option<Scope>) -> Self {
        Self {
            client,
            scope,
            _kind: std::marker::PhantomData,
        }
    }

    fn broker(&self) -> &'a Broker<M> {
        M::broker(&self.client.state)
    }

    /// The cached entity, without touching the network.
    pub async fn cached(&self, id: Snowflake) -> Result<Option<EntityHandle<M>>, ClientError> {
        let handle = match self.scope {
            Some(scope) => self.broker().get(scope, id).await?,
            None => self.broker().get_by_id(id).await?,
        };
        Ok(handle)
    }

    /// Read `id` from the cache, falling back to REST on a miss when `mode`
    /// allows it.
    ///
    /// # Errors
    /// REST failures are returned as-is and leave the cache untouched.
    #[instrument(skip(self, token), fields(kind = %M::KIND, scope = ?self.scope))]
    pub async fn get(
        &self,
        id: Snowflake,
        mode: CacheMode,
        token: &CancellationToken,
    ) -> Result<Option<EntityHandle<M>>, ClientError> {
        if let Some(handle) = self.cached(id).await? {
            return Ok(Some(handle));
        }
        if mode == CacheMode::CacheOnly {
            return Ok(None);
        }
        if M::route(self.scope, id).is_none() || self.client.rest.is_none() {
            debug!(%id, "Cache miss with no REST route");
            return Ok(None);
        }

        self.fetch(id, token).await.map(Some)
    }

    /// Read `id` over REST, bypassing the cache, and store the result.
    #[instrument(skip(self, token), fields(kind = %M::KIND, scope = ?self.scope))]
    pub async fn fetch(
        &self,
        id: Snowflake,
        token: &CancellationToken,
    ) -> Result<EntityHandle<M>, ClientError> {
        let route = M::route(self.scope, id).ok_or(ClientError::NotFetchable(M::KIND))?;
        let rest = self
            .client
            .rest
            .as_ref()
            .ok_or_else(|| ClientError::Config("REST is disabled".into()))?;
        if token.is_cancelled() {
            return Err(ClientError::Cancelled);
        }

        let body = rest
            .execute(route.clone(), RequestOptions::bypassing_cache(), token.clone())
            .await
            .map_err(|e| match e {
                RestError::Cancelled => ClientError::Cancelled,
                other => ClientError::Rest(other),
            })?;

        let record = M::select(body, id).ok_or_else(|| RestError::NotFound {
            route: route.path(),
        })?;
        let model: M = codec::decode(record)?;
        let scope = self.client.open_scope_for(self.scope, &model)?;

        Ok(self.broker().create_or_update(scope, model).await?)
    }

    /// Every cached entity in this accessor's scope.
    pub async fn all(&self) -> Result<Vec<EntityHandle<M>>, ClientError> {
        if let Some(scope) = self.scope {
            return Ok(self.broker().get_all(scope).await?);
        }

        let mut handles = Vec::new();
        for scope in self.client.top_level_scopes() {
            if M::KIND.accepts(scope.shape()) {
                handles.extend(self.broker().get_all(scope).await?);
            }
        }
        Ok(handles)
    }
}

/// Assembles a [`Client`].
pub struct ClientBuilder {
    settings: Settings,
    rest: Option<Arc<dyn RestExecutor>>,
    processors: Option<ProcessorRegistry>,
}

impl ClientBuilder {
    /// Use `rest` instead of an HTTP executor built from the settings.
    pub fn rest(mut self, rest: Arc<dyn RestExecutor>) -> Self {
        self.rest = Some(rest);
        self
    }

    /// Replace the default event processors.
    pub fn processors(mut self, processors: ProcessorRegistry) -> Self {
        self.processors = Some(processors);
        self
    }

    /// Build on in-memory stores.
    pub fn build(self) -> Result<Client, ClientError> {
        self.build_with(&MemoryBackend)
    }

    /// Build on stores opened from `backend`.
    pub fn build_with<B: StoreBackend>(self, backend: &B) -> Result<Client, ClientError> {
        self.settings
            .validate()
            .map_err(|e| ClientError::Config(e.to_string()))?;

        let rest = match (self.rest, self.settings.rest.enabled) {
            (Some(rest), _) => Some(rest),
            (None, true) => {
                let http = HttpRestExecutor::new(&self.settings.rest)?;
                Some(Arc::new(http) as Arc<dyn RestExecutor>)
            }
            (None, false) => None,
        };

        let (sink, hub) = events::channel(self.settings.gateway.event_buffer);
        let state = StateController::new(StoreProvider::new(backend), &self.settings.cache, sink);
        let shutdown = CancellationToken::new();

        let sweeper = match (self.settings.cache.eviction_interval(), tokio::runtime::Handle::try_current()) {
            (Some(interval), Ok(_)) => Some(state.spawn_sweeper(interval, shutdown.child_token())),
            (Some(_), Err(_)) => {
                warn!("No async runtime, eviction sweeper not started");
                None
            }
            (None, _) => None,
        };

        info!(
            environment = %self.settings.environment,
            rest = rest.is_some(),
            backend = backend.name(),
            "Client built"
        );

        Ok(Client {
            settings: Arc::new(self.settings),
            state,
            rest,
            processors: Arc::new(self.processors.unwrap_or_else(ProcessorRegistry::with_defaults)),
            events: hub,
            shutdown,
            sweeper,
        })
    }
}

/// The cache client.
pub struct Client {
    settings: Arc<Settings>,
    state: Arc<StateController>,
    rest: Option<Arc<dyn RestExecutor>>,
    processors: Arc<ProcessorRegistry>,
    events: EventHub,
    shutdown: CancellationToken,
    sweeper: Option<JoinHandle<()>>,
}

impl Client {
    pub fn builder(settings: Settings) -> ClientBuilder {
        ClientBuilder {
            settings,
            rest: None,
            processors: None,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn state(&self) -> &Arc<StateController> {
        &self.state
    }

    /// A loop that applies gateway dispatches to this client's cache.
    pub fn gateway_loop(&self) -> GatewayEventLoop {
        GatewayEventLoop::new(
            Arc::clone(&self.state),
            Arc::clone(&self.processors),
            &self.settings.gateway,
        )
    }

    /// The cache event stream. Only the first call gets it.
    pub fn take_events(&self) -> Option<EventStream> {
        self.events.take()
    }

    pub fn guilds(&self) -> EntityAccessor<'_, GuildModel> {
        EntityAccessor::new(self, Some(Scope::Global))
    }

    /// Guild channels and DM channels alike.
    pub fn channels(&self) -> EntityAccessor<'_, ChannelModel> {
        EntityAccessor::new(self, None)
    }

    pub fn users(&self) -> EntityAccessor<'_, UserModel> {
        EntityAccessor::new(self, Some(Scope::Global))
    }

    pub fn threads(&self, guild_id: Snowflake) -> EntityAccessor<'_, ThreadModel> {
        EntityAccessor::new(self, Some(Scope::Guild(guild_id)))
    }

    pub fn members(&self, guild_id: Snowflake) -> EntityAccessor<'_, MemberModel> {
        EntityAccessor::new(self, Some(Scope::Guild(guild_id)))
    }

    pub fn roles(&self, guild_id: Snowflake) -> EntityAccessor<'_, RoleModel> {
        EntityAccessor::new(self, Some(Scope::Guild(guild_id)))
    }

    pub fn emotes(&self, guild_id: Snowflake) -> EntityAccessor<'_, EmoteModel> {
        EntityAccessor::new(self, Some(Scope::Guild(guild_id)))
    }

    pub fn messages(&self, channel_id: Snowflake) -> EntityAccessor<'_, MessageModel> {
        EntityAccessor::new(self, Some(Scope::Channel(channel_id)))
    }

    pub fn scheduled_events(&self, guild_id: Snowflake) -> EntityAccessor<'_, ScheduledEventModel> {
        EntityAccessor::new(self, Some(Scope::Guild(guild_id)))
    }

    pub fn stage_instances(&self, guild_id: Snowflake) -> EntityAccessor<'_, StageInstanceModel> {
        EntityAccessor::new(self, Some(Scope::Guild(guild_id)))
    }

    pub fn voice_states(&self, guild_id: Snowflake) -> EntityAccessor<'_, VoiceStateModel> {
        EntityAccessor::new(self, Some(Scope::Guild(guild_id)))
    }

    pub fn presences(&self, guild_id: Snowflake) -> EntityAccessor<'_, PresenceModel> {
        EntityAccessor::new(self, Some(Scope::Guild(guild_id)))
    }

    /// Stop background work. Idempotent; also runs on drop.
    pub async fn shutdown(&mut self) {
        self.shutdown.cancel();
        if let Some(sweeper) = self.sweeper.take() {
            if let Err(e) = sweeper.await {
                warn!(error = %e, "Eviction sweeper failed");
            }
        }
    }

    /// The global scope and every guild scope.
    fn top_level_scopes(&self) -> Vec<Scope> {
        let mut scopes = vec![Scope::Global];
        scopes.extend(
            self.state
                .scopes()
                .children(Scope::Global)
                .into_iter()
                .filter(|scope| scope.shape() == ScopeShape::Guild),
        );
        scopes
    }

    /// The scope a fetched model is written under, registered if needed.
    fn open_scope_for<M: Model>(&self, scope: Option<Scope>, model: &M) -> Result<Scope, ClientError> {
        let parent = Scope::guild_or_global(model.owning_guild());
        let scope = scope.unwrap_or(parent);
        match scope {
            Scope::Global => {}
            Scope::Guild(id) => self.state.ensure_guild_scope(id)?,
            Scope::Channel(id) => self.state.ensure_channel_scope(parent, id)?,
        }
        Ok(scope)
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
