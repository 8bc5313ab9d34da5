//! Message model and its reaction sub-models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{EntityKind, Model, UserModel};
use crate::domain::value_objects::Snowflake;

/// The emoji a reaction was made with. Unicode emoji have no id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReactionEmoji {
    #[serde(default)]
    pub id: Option<Snowflake>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub animated: bool,
}

impl ReactionEmoji {
    /// Two emoji match by id for custom emoji, by name for unicode.
    pub fn same_as(&self, other: &ReactionEmoji) -> bool {
        match (self.id, other.id) {
            (Some(a), Some(b)) => a == b,
            (None, None) => self.name == other.name,
            _ => false,
        }
    }
}

/// Aggregated reactions of one emoji on a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionModel {
    pub count: u32,

    /// Whether the current user reacted
    #[serde(default)]
    pub me: bool,

    pub emoji: ReactionEmoji,
}

/// Reply/crosspost reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageReference {
    #[serde(default)]
    pub message_id: Option<Snowflake>,

    #[serde(default)]
    pub channel_id: Option<Snowflake>,

    #[serde(default)]
    pub guild_id: Option<Snowflake>,
}

/// A message in a channel or thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct MessageModel {
    pub id: Snowflake,

    pub channel_id: Snowflake,

    #[serde(default)]
    pub guild_id: Option<Snowflake>,

    #[validate(nested)]
    pub author: UserModel,

    #[serde(default)]
    #[validate(length(max = 4000))]
    pub content: String,

    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub edited_timestamp: Option<DateTime<Utc>>,

    #[serde(default)]
    pub tts: bool,

    #[serde(default)]
    pub mention_everyone: bool,

    #[serde(default)]
    pub mentions: Vec<UserModel>,

    #[serde(default)]
    pub mention_roles: Vec<Snowflake>,

    #[serde(default)]
    pub pinned: bool,

    /// Message type as numbered on the wire
    #[serde(rename = "type", default)]
    pub kind: u8,

    #[serde(default)]
    pub reactions: Vec<ReactionModel>,

    #[serde(default)]
    pub message_reference: Option<MessageReference>,

    #[serde(default)]
    pub webhook_id: Option<Snowflake>,
}

impl MessageModel {
    pub fn is_edited(&self) -> bool {
        self.edited_timestamp.is_some()
    }

    pub fn reaction(&self, emoji: &ReactionEmoji) -> Option<&ReactionModel> {
        self.reactions.iter().find(|r| r.emoji.same_as(emoji))
    }

    /// A copy with one more reaction of `emoji`.
    pub fn with_reaction_added(&self, emoji: &ReactionEmoji, by_me: bool) -> Self {
        let mut next = self.clone();
        match next.reactions.iter_mut().find(|r| r.emoji.same_as(emoji)) {
            Some(reaction) => {
                reaction.count += 1;
                reaction.me |= by_me;
            }
            None => next.reactions.push(ReactionModel {
                count: 1,
                me: by_me,
                emoji: emoji.clone(),
            }),
        }
        next
    }

    /// A copy with one reaction of `emoji` taken away. Empty groups are dropped.
    pub fn with_reaction_removed(&self, emoji: &ReactionEmoji, by_me: bool) -> Self {
        let mut next = self.clone();
        if let Some(reaction) = next.reactions.iter_mut().find(|r| r.emoji.same_as(emoji)) {
            reaction.count = reaction.count.saturating_sub(1);
            if by_me {
                reaction.me = false;
            }
        }
        next.reactions.retain(|r| r.count > 0);
        next
    }

    pub fn without_reactions(&self) -> Self {
        let mut next = self.clone();
        next.reactions.clear();
        next
    }

    pub fn without_reaction_emoji(&self, emoji: &ReactionEmoji) -> Self {
        let mut next = self.clone();
        next.reactions.retain(|r| !r.emoji.same_as(emoji));
        next
    }
}

impl Model for MessageModel {
    const KIND: EntityKind = EntityKind::Message;

    fn id(&self) -> Snowflake {
        self.id
    }

    fn owning_guild(&self) -> Option<Snowflake> {
        self.guild_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn message() -> MessageModel {
        serde_json::from_value(serde_json::json!({
            "id": "1",
            "channel_id": "10",
            "author": { "id": "5", "username": "quokka" },
            "content": "hello",
            "timestamp": "2024-01-01T00:00:00Z"
        }))
        .unwrap()
    }

    fn unicode(name: &str) -> ReactionEmoji {
        ReactionEmoji {
            id: None,
            name: Some(name.into()),
            animated: false,
        }
    }

    #[test]
    fn test_reaction_add_and_remove() {
        let thumbs = unicode("👍");
        let msg = message()
            .with_reaction_added(&thumbs, false)
            .with_reaction_added(&thumbs, true);

        let reaction = msg.reaction(&thumbs).unwrap();
        assert_eq!(reaction.count, 2);
        assert!(reaction.me);

        let msg = msg.with_reaction_removed(&thumbs, true);
        let reaction = msg.reaction(&thumbs).unwrap();
        assert_eq!(reaction.count, 1);
        assert!(!reaction.me);

        let msg = msg.with_reaction_removed(&thumbs, false);
        assert!(msg.reactions.is_empty());
    }

    #[test]
    fn test_reaction_updates_do_not_touch_original() {
        let original = message();
        let _ = original.with_reaction_added(&unicode("🔥"), false);
        assert!(original.reactions.is_empty());
    }

    #[test]
    fn test_remove_emoji_keeps_others() {
        let msg = message()
            .with_reaction_added(&unicode("a"), false)
            .with_reaction_added(&unicode("b"), false)
            .without_reaction_emoji(&unicode("a"));
        assert_eq!(msg.reactions.len(), 1);
        assert_eq!(msg.reactions[0].emoji.name.as_deref(), Some("b"));
    }

    #[test]
    fn test_custom_emoji_match_by_id() {
        let a = ReactionEmoji {
            id: Some(Snowflake::new(9)),
            name: Some("party".into()),
            animated: false,
        };
        let renamed = ReactionEmoji {
            name: Some("partyy".into()),
            ..a.clone()
        };
        assert!(a.same_as(&renamed));
        assert!(!a.same_as(&unicode("party")));
    }
}
