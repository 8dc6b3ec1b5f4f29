//! Chat markdown rendering
//!
//! `parse` builds a document tree from source text, `Renderer` walks it and
//! writes style-tagged text for the terminal widget.

mod elements;
mod mentions;
mod parser;
mod renderer;
mod tags;
mod walk;

pub use elements::{Attribute, Emoji, GuildUser, Mention, Node, NodeKind, Segment};
pub use mentions::{MentionResolver, NamedEntity, StaticMentions};
pub use parser::parse;
pub use renderer::{RenderError, Renderer};
pub use tags::{attribute_tags, open_colors, open_link, open_mention};
pub use tags::{CLOSE_COLORS, CLOSE_LINK, CLOSE_MENTION};
pub use walk::{walk, WalkStatus};
