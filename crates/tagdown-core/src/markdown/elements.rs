//! Document tree types
//!
//! Text-bearing nodes hold byte spans into the source buffer instead of owned
//! strings, so a tree is only meaningful next to the source it was built from.

use std::ops::Range;

/// Byte span into the source buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment(pub Range<usize>);

impl Segment {
    pub fn new(start: usize, end: usize) -> Self {
        Self(start..end)
    }

    /// Slice the span out of `source`
    pub fn value<'a>(&self, source: &'a str) -> &'a str {
        &source[self.0.clone()]
    }
}

/// A node in the document tree
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            children: Vec::new(),
        }
    }

    pub fn with_children(kind: NodeKind, children: Vec<Node>) -> Self {
        Self { kind, children }
    }

    /// Plain text node without line breaks
    pub fn text(segment: Segment) -> Self {
        Self::new(NodeKind::Text {
            segment,
            soft_break: false,
            hard_break: false,
        })
    }
}

/// Every node kind the renderer knows about
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Document,
    Paragraph,
    /// Heading with level (1-6)
    Heading { level: usize },
    Text {
        segment: Segment,
        soft_break: bool,
        hard_break: bool,
    },
    /// Fenced code block; each line keeps its trailing newline
    FencedCodeBlock {
        language: Option<Segment>,
        lines: Vec<Segment>,
    },
    /// `<https://...>` or a bare URL in text
    AutoLink { url: Segment },
    Link { destination: String },
    /// Image; children are the alt text
    Image { destination: String },
    List { ordered: bool, start: u64 },
    ListItem,
    /// Chat-style inline span (bold, underline, spoiler...)
    Inline(Attribute),
    Mention(Mention),
    Emoji(Emoji),
    /// Anything else the parser produces (block quotes, rules, HTML).
    /// Walked through without output.
    Other,
}

/// Inline text attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    Bold,
    Italics,
    Underline,
    Strikethrough,
    Monospace,
    Spoiler,
}

/// A resolved mention
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mention {
    Channel { name: String },
    User(GuildUser),
    Role { name: String },
}

/// A user as seen from inside a guild
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GuildUser {
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    /// Guild-specific nickname, wins over everything else
    #[serde(default)]
    pub nick: Option<String>,
}

impl GuildUser {
    pub fn display_or_username(&self) -> &str {
        match self.display_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.username,
        }
    }

    /// Name shown in a rendered mention
    pub fn mention_name(&self) -> &str {
        match self.nick.as_deref() {
            Some(nick) if !nick.is_empty() => nick,
            _ => self.display_or_username(),
        }
    }
}

/// Custom emoji `<:name:id>` / `<a:name:id>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emoji {
    pub name: String,
    pub id: String,
    pub animated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mention_name_precedence() {
        let mut user = GuildUser {
            username: "alice".to_string(),
            display_name: None,
            nick: None,
        };
        assert_eq!(user.mention_name(), "alice");

        user.display_name = Some("Alice A.".to_string());
        assert_eq!(user.mention_name(), "Alice A.");

        user.nick = Some("ally".to_string());
        assert_eq!(user.mention_name(), "ally");

        // Empty nickname falls back
        user.nick = Some(String::new());
        assert_eq!(user.mention_name(), "Alice A.");
    }

    #[test]
    fn test_segment_value() {
        let source = "hello world";
        assert_eq!(Segment::new(6, 11).value(source), "world");
        assert_eq!(Segment::new(3, 3).value(source), "");
    }
}
