//! Permission calculation over cached models.

use crate::domain::models::{ChannelModel, GuildModel, MemberModel, OverwriteType, RoleModel};
use crate::domain::value_objects::Permissions;

/// Computes effective permissions from guild, role and channel models.
pub struct PermissionCalculator;

impl PermissionCalculator {
    /// Calculate a member's base permissions in a guild.
    ///
    /// This combines permissions from all roles the member has.
    pub fn guild_permissions(
        guild: &GuildModel,
        member: &MemberModel,
        roles: &[RoleModel],
    ) -> Permissions {
        // Owner has all permissions
        if guild.is_owner(member.user.id) {
            return Permissions::all();
        }

        let mut permissions = Permissions::empty();

        for role in roles {
            // @everyone shares the guild's id
            if member.has_role(role.id) || role.id == guild.everyone_role_id() {
                permissions = permissions | role.permissions;
            }
        }

        if permissions.is_admin() {
            return Permissions::all();
        }

        permissions
    }

    /// Calculate a member's permissions in a specific channel.
    ///
    /// Overwrites apply in order: @everyone, then the union of the member's
    /// roles, then the member itself.
    pub fn channel_permissions(
        guild: &GuildModel,
        member: &MemberModel,
        roles: &[RoleModel],
        channel: &ChannelModel,
    ) -> Permissions {
        let mut permissions = Self::guild_permissions(guild, member, roles);

        // Administrator bypasses overwrites
        if permissions.is_admin() {
            return Permissions::all();
        }

        let overwrites = &channel.permission_overwrites;

        for overwrite in overwrites {
            if overwrite.kind == OverwriteType::Role && overwrite.id == guild.everyone_role_id() {
                permissions = permissions.apply_overwrite(overwrite.allow.bits(), overwrite.deny.bits());
            }
        }

        let mut allow = 0u64;
        let mut deny = 0u64;

        for overwrite in overwrites {
            if overwrite.kind == OverwriteType::Role && member.has_role(overwrite.id) {
                allow |= overwrite.allow.bits();
                deny |= overwrite.deny.bits();
            }
        }

        permissions = permissions.apply_overwrite(allow, deny);

        for overwrite in overwrites {
            if overwrite.kind == OverwriteType::Member && overwrite.id == member.user.id {
                permissions = permissions.apply_overwrite(overwrite.allow.bits(), overwrite.deny.bits());
            }
        }

        permissions
    }

    /// Highest position among the member's roles; 0 with none.
    pub fn highest_role_position(member: &MemberModel, roles: &[RoleModel]) -> i32 {
        roles
            .iter()
            .filter(|r| member.has_role(r.id))
            .map(|r| r.position)
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ChannelType, PermissionOverwrite, UserModel};
    use crate::domain::value_objects::Snowflake;

    const GUILD: u64 = 100;
    const OWNER: u64 = 1;

    fn guild() -> GuildModel {
        serde_json::from_value(serde_json::json!({
            "id": GUILD.to_string(),
            "name": "test",
            "owner_id": OWNER.to_string()
        }))
        .unwrap()
    }

    fn create_test_member(user_id: u64, role_ids: &[u64]) -> MemberModel {
        MemberModel {
            user: UserModel {
                id: Snowflake::new(user_id),
                username: format!("user{user_id}"),
                global_name: None,
                discriminator: None,
                avatar: None,
                bot: false,
                system: false,
            },
            nick: None,
            avatar: None,
            roles: role_ids.iter().copied().map(Snowflake::new).collect(),
            joined_at: None,
            premium_since: None,
            deaf: false,
            mute: false,
            pending: false,
            communication_disabled_until: None,
        }
    }

    fn create_test_role(id: u64, position: i32, permissions: u64) -> RoleModel {
        RoleModel {
            id: Snowflake::new(id),
            name: format!("role{id}"),
            color: 0,
            hoist: false,
            icon: None,
            position,
            permissions: Permissions::new(permissions),
            managed: false,
            mentionable: false,
        }
    }

    fn channel(overwrites: Vec<PermissionOverwrite>) -> ChannelModel {
        ChannelModel {
            id: Snowflake::new(10),
            kind: ChannelType::GuildText,
            guild_id: Some(Snowflake::new(GUILD)),
            name: Some("general".into()),
            topic: None,
            position: Some(0),
            parent_id: None,
            nsfw: false,
            rate_limit_per_user: None,
            last_message_id: None,
            bitrate: None,
            user_limit: None,
            recipients: vec![],
            permission_overwrites: overwrites,
        }
    }

    fn overwrite(id: u64, kind: OverwriteType, allow: u64, deny: u64) -> PermissionOverwrite {
        PermissionOverwrite {
            id: Snowflake::new(id),
            kind,
            allow: Permissions::new(allow),
            deny: Permissions::new(deny),
        }
    }

    #[test]
    fn test_owner_has_all_permissions() {
        let member = create_test_member(OWNER, &[]);
        let perms = PermissionCalculator::guild_permissions(&guild(), &member, &[]);
        assert_eq!(perms, Permissions::all());
    }

    #[test]
    fn test_admin_has_all_permissions() {
        let member = create_test_member(2, &[101]);
        let roles = vec![create_test_role(101, 1, Permissions::ADMINISTRATOR)];

        let perms = PermissionCalculator::guild_permissions(&guild(), &member, &roles);
        assert_eq!(perms, Permissions::all());
    }

    #[test]
    fn test_role_permissions_combine_with_everyone() {
        let member = create_test_member(2, &[101]);
        let roles = vec![
            create_test_role(GUILD, 0, Permissions::VIEW_CHANNEL),
            create_test_role(101, 1, Permissions::SEND_MESSAGES),
            create_test_role(102, 2, Permissions::BAN_MEMBERS),
        ];

        let perms = PermissionCalculator::guild_permissions(&guild(), &member, &roles);
        assert!(perms.has(Permissions::VIEW_CHANNEL));
        assert!(perms.has(Permissions::SEND_MESSAGES));
        assert!(!perms.has(Permissions::BAN_MEMBERS));
    }

    #[test]
    fn test_channel_overwrite_order() {
        let member = create_test_member(2, &[101]);
        let roles = vec![
            create_test_role(GUILD, 0, Permissions::VIEW_CHANNEL),
            create_test_role(101, 1, 0),
        ];
        let channel = channel(vec![
            overwrite(GUILD, OverwriteType::Role, 0, Permissions::VIEW_CHANNEL),
            overwrite(101, OverwriteType::Role, Permissions::VIEW_CHANNEL, Permissions::SEND_MESSAGES),
            overwrite(2, OverwriteType::Member, Permissions::SEND_MESSAGES, 0),
        ]);

        let perms = PermissionCalculator::channel_permissions(&guild(), &member, &roles, &channel);
        assert!(perms.has(Permissions::VIEW_CHANNEL));
        assert!(perms.has(Permissions::SEND_MESSAGES));
    }

    #[test]
    fn test_everyone_deny_applies_without_roles() {
        let member = create_test_member(3, &[]);
        let roles = vec![create_test_role(GUILD, 0, Permissions::VIEW_CHANNEL)];
        let channel = channel(vec![overwrite(GUILD, OverwriteType::Role, 0, Permissions::VIEW_CHANNEL)]);

        let perms = PermissionCalculator::channel_permissions(&guild(), &member, &roles, &channel);
        assert!(!perms.has(Permissions::VIEW_CHANNEL));
    }

    #[test]
    fn test_highest_role_position() {
        let member = create_test_member(2, &[101, 102]);
        let roles = vec![create_test_role(101, 3, 0), create_test_role(102, 7, 0), create_test_role(103, 9, 0)];
        assert_eq!(PermissionCalculator::highest_role_position(&member, &roles), 7);
    }
}
