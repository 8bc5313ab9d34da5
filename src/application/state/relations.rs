//! Relations between entities and typed read accessors.
//!
//! Relations are resolved by id through the state controller on every call;
//! an entity never holds a pointer to another entity. When the controller
//! has been dropped every relation resolves to nothing.

use async_trait::async_trait;

use super::entity::Entity;
use super::handle::EntityHandle;
use crate::domain::models::{
    ChannelModel, ChannelType, EntityKind, GuildModel, MemberModel, MessageModel, Model,
    ReactionModel, RoleModel, ThreadModel, UserModel,
};
use crate::domain::services::PermissionCalculator;
use crate::domain::value_objects::{Permissions, Scope, Snowflake};
use crate::shared::error::CacheError;

type Handles<M> = Result<Vec<EntityHandle<M>>, CacheError>;

/// Entities that belong to a guild.
#[async_trait]
pub trait GuildScoped {
    fn guild_id(&self) -> Option<Snowflake>;

    async fn guild(&self) -> Result<Option<EntityHandle<GuildModel>>, CacheError>;
}

#[async_trait]
impl<M: Model> GuildScoped for Entity<M> {
    fn guild_id(&self) -> Option<Snowflake> {
        if M::KIND == EntityKind::Guild {
            return Some(self.id());
        }
        self.scope()
            .guild_id()
            .or_else(|| self.with_model(|m| m.owning_guild()).flatten())
    }

    async fn guild(&self) -> Result<Option<EntityHandle<GuildModel>>, CacheError> {
        let (Some(id), Some(state)) = (self.guild_id(), self.controller()) else {
            return Ok(None);
        };
        state.guilds().get(Scope::Global, id).await
    }
}

#[async_trait]
pub trait HasChannels {
    async fn channels(&self) -> Handles<ChannelModel>;
}

#[async_trait]
impl HasChannels for Entity<GuildModel> {
    async fn channels(&self) -> Handles<ChannelModel> {
        match self.controller() {
            Some(state) => state.channels().get_all(Scope::Guild(self.id())).await,
            None => Ok(Vec::new()),
        }
    }
}

/// Guild roles, or the roles assigned to a member.
#[async_trait]
pub trait HasRoles {
    async fn roles(&self) -> Handles<RoleModel>;
}

#[async_trait]
impl HasRoles for Entity<GuildModel> {
    async fn roles(&self) -> Handles<RoleModel> {
        match self.controller() {
            Some(state) => state.roles().get_all(Scope::Guild(self.id())).await,
            None => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl HasRoles for Entity<MemberModel> {
    async fn roles(&self) -> Handles<RoleModel> {
        let (Some(guild_id), Some(state)) = (self.guild_id(), self.controller()) else {
            return Ok(Vec::new());
        };
        let assigned = self.role_ids();
        let scope = Scope::Guild(guild_id);

        let mut roles = Vec::with_capacity(assigned.len());
        for id in assigned {
            if let Some(role) = state.roles().get(scope, id).await? {
                roles.push(role);
            }
        }
        Ok(roles)
    }
}

#[async_trait]
pub trait HasMembers {
    async fn members(&self) -> Handles<MemberModel>;
}

#[async_trait]
impl HasMembers for Entity<GuildModel> {
    async fn members(&self) -> Handles<MemberModel> {
        match self.controller() {
            Some(state) => state.members().get_all(Scope::Guild(self.id())).await,
            None => Ok(Vec::new()),
        }
    }
}

/// Cached messages of a channel or thread.
#[async_trait]
pub trait HasMessages {
    async fn messages(&self) -> Handles<MessageModel>;
}

#[async_trait]
impl HasMessages for Entity<ChannelModel> {
    async fn messages(&self) -> Handles<MessageModel> {
        match self.controller() {
            Some(state) => state.messages().get_all(Scope::Channel(self.id())).await,
            None => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl HasMessages for Entity<ThreadModel> {
    async fn messages(&self) -> Handles<MessageModel> {
        match self.controller() {
            Some(state) => state.messages().get_all(Scope::Channel(self.id())).await,
            None => Ok(Vec::new()),
        }
    }
}

/// Threads of a guild, or the threads started under a channel.
#[async_trait]
pub trait HasThreads {
    async fn threads(&self) -> Handles<ThreadModel>;
}

#[async_trait]
impl HasThreads for Entity<GuildModel> {
    async fn threads(&self) -> Handles<ThreadModel> {
        match self.controller() {
            Some(state) => state.threads().get_all(Scope::Guild(self.id())).await,
            None => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl HasThreads for Entity<ChannelModel> {
    async fn threads(&self) -> Handles<ThreadModel> {
        let (Some(guild_id), Some(state)) = (self.guild_id(), self.controller()) else {
            return Ok(Vec::new());
        };
        let parent = self.id();
        let threads = state.threads().get_all(Scope::Guild(guild_id)).await?;
        Ok(threads
            .into_iter()
            .filter(|t| t.with_model(|m| m.parent_id == Some(parent)).unwrap_or(false))
            .collect())
    }
}

// ----------------------------------------------------------------------------
// Typed accessors
// ----------------------------------------------------------------------------

impl Entity<GuildModel> {
    pub fn name(&self) -> Option<String> {
        self.with_model(|g| g.name.clone())
    }

    pub fn owner_id(&self) -> Option<Snowflake> {
        self.with_model(|g| g.owner_id)
    }

    pub async fn owner(&self) -> Result<Option<EntityHandle<MemberModel>>, CacheError> {
        let (Some(owner), Some(state)) = (self.owner_id(), self.controller()) else {
            return Ok(None);
        };
        state.members().get(Scope::Guild(self.id()), owner).await
    }
}

impl Entity<ChannelModel> {
    pub fn name(&self) -> Option<String> {
        self.with_model(|c| c.display_name())
    }

    pub fn kind(&self) -> Option<ChannelType> {
        self.with_model(|c| c.kind)
    }

    pub fn parent_id(&self) -> Option<Snowflake> {
        self.with_model(|c| c.parent_id).flatten()
    }
}

impl Entity<ThreadModel> {
    pub fn name(&self) -> Option<String> {
        self.with_model(|t| t.name.clone()).flatten()
    }

    pub fn parent_id(&self) -> Option<Snowflake> {
        self.with_model(|t| t.parent_id).flatten()
    }
}

impl Entity<UserModel> {
    pub fn username(&self) -> Option<String> {
        self.with_model(|u| u.username.clone())
    }
}

impl Entity<MemberModel> {
    pub fn nick(&self) -> Option<String> {
        self.with_model(|m| m.nick.clone()).flatten()
    }

    pub fn display_name(&self) -> Option<String> {
        self.with_model(|m| m.display_name().to_owned())
    }

    pub fn role_ids(&self) -> Vec<Snowflake> {
        self.with_model(|m| m.roles.clone()).unwrap_or_default()
    }

    /// The global user record behind this membership.
    pub async fn user(&self) -> Result<Option<EntityHandle<UserModel>>, CacheError> {
        match self.controller() {
            Some(state) => state.users().get(Scope::Global, self.id()).await,
            None => Ok(None),
        }
    }

    /// Guild-level permissions from the cached guild and roles.
    pub async fn permissions(&self) -> Result<Option<Permissions>, CacheError> {
        let Some(guild) = self.guild().await? else {
            return Ok(None);
        };
        let (Some(guild), Some(member)) = (guild.model(), self.model()) else {
            return Ok(None);
        };
        let roles = self.guild_roles().await?;
        Ok(Some(PermissionCalculator::guild_permissions(&guild, &member, &roles)))
    }

    /// Permissions in `channel` after its overwrites.
    pub async fn permissions_in(
        &self,
        channel: &Entity<ChannelModel>,
    ) -> Result<Option<Permissions>, CacheError> {
        let Some(guild) = self.guild().await? else {
            return Ok(None);
        };
        let (Some(guild), Some(member), Some(channel)) = (guild.model(), self.model(), channel.model())
        else {
            return Ok(None);
        };
        let roles = self.guild_roles().await?;
        Ok(Some(PermissionCalculator::channel_permissions(
            &guild, &member, &roles, &channel,
        )))
    }

    async fn guild_roles(&self) -> Result<Vec<RoleModel>, CacheError> {
        let (Some(guild_id), Some(state)) = (self.guild_id(), self.controller()) else {
            return Ok(Vec::new());
        };
        let roles = state.roles().get_all(Scope::Guild(guild_id)).await?;
        Ok(roles
            .iter()
            .filter_map(|role| role.model())
            .map(|role| (*role).clone())
            .collect())
    }
}

impl Entity<MessageModel> {
    pub fn content(&self) -> Option<String> {
        self.with_model(|m| m.content.clone())
    }

    pub fn author_id(&self) -> Option<Snowflake> {
        self.with_model(|m| m.author.id)
    }

    pub fn reactions(&self) -> Vec<ReactionModel> {
        self.with_model(|m| m.reactions.clone()).unwrap_or_default()
    }

    pub fn channel_id(&self) -> Snowflake {
        self.scope().owner_id().unwrap_or_default()
    }

    pub async fn author(&self) -> Result<Option<EntityHandle<UserModel>>, CacheError> {
        let (Some(author), Some(state)) = (self.author_id(), self.controller()) else {
            return Ok(None);
        };
        state.users().get(Scope::Global, author).await
    }

    pub async fn channel(&self) -> Result<Option<EntityHandle<ChannelModel>>, CacheError> {
        let Some(state) = self.controller() else {
            return Ok(None);
        };
        state.channels().get_by_id(self.channel_id()).await
    }
}
