//! Mention lookup
//!
//! The parser only sees raw ids (`<@123>`, `<#42>`, `<@&7>`); a resolver turns
//! them into names. Unresolved ids are left as plain text.

use serde::Deserialize;
use std::collections::HashMap;

use super::elements::GuildUser;

/// Looks up chat entities by id
pub trait MentionResolver {
    fn user(&self, id: &str) -> Option<GuildUser>;
    fn channel(&self, id: &str) -> Option<String>;
    fn role(&self, id: &str) -> Option<String>;
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NamedEntity {
    pub name: String,
}

/// Fixed id -> entity tables, usually loaded from config
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StaticMentions {
    pub users: HashMap<String, GuildUser>,
    pub channels: HashMap<String, NamedEntity>,
    pub roles: HashMap<String, NamedEntity>,
}

impl StaticMentions {
    pub fn with_user(mut self, id: impl Into<String>, user: GuildUser) -> Self {
        self.users.insert(id.into(), user);
        self
    }

    pub fn with_channel(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.channels.insert(id.into(), NamedEntity { name: name.into() });
        self
    }

    pub fn with_role(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.roles.insert(id.into(), NamedEntity { name: name.into() });
        self
    }
}

impl MentionResolver for StaticMentions {
    fn user(&self, id: &str) -> Option<GuildUser> {
        self.users.get(id).cloned()
    }

    fn channel(&self, id: &str) -> Option<String> {
        self.channels.get(id).map(|c| c.name.clone())
    }

    fn role(&self, id: &str) -> Option<String> {
        self.roles.get(id).map(|r| r.name.clone())
    }
}
