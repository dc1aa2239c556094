//! Scope flags: who may trigger a message handler, and where.

use std::collections::BTreeSet;

use relay_core::MessageEvent;

/// A set of permitted users or channels.
///
/// Entries are matched case-insensitively against either the id or the name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AllowList {
    /// No restriction.
    #[default]
    Any,
    /// Only the listed ids or names.
    Only(BTreeSet<String>),
}

impl AllowList {
    /// Builds a restricted list. An empty iterator still yields `Any`.
    pub fn only<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set: BTreeSet<String> = entries
            .into_iter()
            .map(|s| s.as_ref().trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        if set.is_empty() {
            Self::Any
        } else {
            Self::Only(set)
        }
    }

    pub fn is_restricted(&self) -> bool {
        matches!(self, Self::Only(_))
    }

    /// Whether an entity with the given id and name is on the list.
    pub fn permits(&self, id: &str, name: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Only(set) => set.contains(&id.to_lowercase()) || set.contains(&name.to_lowercase()),
        }
    }
}

/// Conditions a message must satisfy before a handler's pattern is tried.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeFlags {
    /// The bot must be mentioned, in direct messages too.
    pub needs_mention: bool,
    /// The message must be sent in a direct conversation.
    pub direct_only: bool,
    /// Permitted senders.
    pub allowed_users: AllowList,
    /// Permitted channels.
    pub allowed_channels: AllowList,
}

impl ScopeFlags {
    pub fn permits(&self, event: &MessageEvent, bot_user_id: &str) -> bool {
        let direct = event.is_direct_message();

        if self.needs_mention && !event.mentions_user(bot_user_id) {
            return false;
        }
        if self.direct_only && !direct {
            return false;
        }

        self.allowed_users.permits(&event.sender_id, &event.sender_name)
            && self
                .allowed_channels
                .permits(&event.channel_id, &event.channel_name)
    }
}

#[cfg(test)]
mod tests {
    use relay_core::ChannelType;

    use super::*;

    const BOT: &str = "bot-id";

    fn channel_msg() -> MessageEvent {
        MessageEvent::new("hi")
            .with_sender("u1", "Alice")
            .with_channel("c1", "town-square", ChannelType::Open)
    }

    fn direct_msg() -> MessageEvent {
        MessageEvent::new("hi")
            .with_sender("u1", "Alice")
            .with_channel("d1", "bot__alice", ChannelType::Direct)
    }

    #[test]
    fn test_unrestricted_scope() {
        let scope = ScopeFlags::default();
        assert!(scope.permits(&channel_msg(), BOT));
        assert!(scope.permits(&direct_msg(), BOT));
    }

    #[test]
    fn test_needs_mention() {
        let scope = ScopeFlags {
            needs_mention: true,
            ..Default::default()
        };
        assert!(!scope.permits(&channel_msg(), BOT));
        assert!(scope.permits(&channel_msg().with_mention(BOT), BOT));
        assert!(!scope.permits(&channel_msg().with_mention("other"), BOT));
        assert!(!scope.permits(&direct_msg(), BOT));
        assert!(scope.permits(&direct_msg().with_mention(BOT), BOT));
    }

    #[test]
    fn test_direct_only() {
        let scope = ScopeFlags {
            direct_only: true,
            ..Default::default()
        };
        assert!(!scope.permits(&channel_msg().with_mention(BOT), BOT));
        assert!(scope.permits(&direct_msg(), BOT));
    }

    #[test]
    fn test_allowed_users_by_id_or_name() {
        let by_name = ScopeFlags {
            allowed_users: AllowList::only(["alice"]),
            ..Default::default()
        };
        assert!(by_name.permits(&channel_msg(), BOT));
        assert!(!by_name.permits(&channel_msg().with_sender("u2", "bob"), BOT));

        let by_id = ScopeFlags {
            allowed_users: AllowList::only(["u2"]),
            ..Default::default()
        };
        assert!(by_id.permits(&channel_msg().with_sender("u2", "bob"), BOT));
        assert!(by_id.permits(&channel_msg().with_sender("U2", "bob"), BOT));
        assert!(!by_id.permits(&channel_msg(), BOT));
    }

    #[test]
    fn test_allowed_channels() {
        let scope = ScopeFlags {
            allowed_channels: AllowList::only(["Town-Square"]),
            ..Default::default()
        };
        assert!(scope.permits(&channel_msg(), BOT));
        assert!(!scope.permits(&direct_msg(), BOT));
    }

    #[test]
    fn test_empty_allow_list_is_unrestricted() {
        assert_eq!(AllowList::only(Vec::<String>::new()), AllowList::Any);
        assert!(!AllowList::only(["  "]).is_restricted());
    }
}
