//! User model.

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{EntityKind, Model};
use crate::domain::value_objects::Snowflake;

/// A global user record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct UserModel {
    pub id: Snowflake,

    #[validate(length(min = 1, max = 32))]
    pub username: String,

    /// Display name chosen by the user
    #[serde(default)]
    pub global_name: Option<String>,

    /// Legacy four-digit tag; "0" for migrated accounts
    #[serde(default)]
    pub discriminator: Option<String>,

    #[serde(default)]
    pub avatar: Option<String>,

    #[serde(default)]
    pub bot: bool,

    #[serde(default)]
    pub system: bool,
}

impl UserModel {
    /// The name shown in clients: global name, falling back to the username.
    pub fn display_name(&self) -> &str {
        self.global_name.as_deref().unwrap_or(&self.username)
    }

    /// `name#1234` for legacy accounts, the plain username otherwise.
    pub fn tag(&self) -> String {
        match self.discriminator.as_deref() {
            Some(d) if d != "0" => format!("{}#{}", self.username, d),
            _ => self.username.clone(),
        }
    }
}

impl Model for UserModel {
    const KIND: EntityKind = EntityKind::User;

    fn id(&self) -> Snowflake {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(discriminator: Option<&str>, global_name: Option<&str>) -> UserModel {
        UserModel {
            id: Snowflake::new(1),
            username: "quokka".into(),
            global_name: global_name.map(Into::into),
            discriminator: discriminator.map(Into::into),
            avatar: None,
            bot: false,
            system: false,
        }
    }

    #[test]
    fn test_tag_legacy_and_migrated() {
        assert_eq!(user(Some("0420"), None).tag(), "quokka#0420");
        assert_eq!(user(Some("0"), None).tag(), "quokka");
        assert_eq!(user(None, None).tag(), "quokka");
    }

    #[test]
    fn test_display_name_prefers_global_name() {
        assert_eq!(user(None, Some("Quokka")).display_name(), "Quokka");
        assert_eq!(user(None, None).display_name(), "quokka");
    }
}
