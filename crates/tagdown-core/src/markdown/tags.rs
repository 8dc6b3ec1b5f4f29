//! Style tags understood by the terminal text widget
//!
//! Tags are bracket-delimited and come in open/close pairs. A close tag always
//! has the same number of fields as its open tag:
//!
//! | element     | open            | close       |
//! |-------------|-----------------|-------------|
//! | colours     | `[fg:bg]`       | `[-:-]`     |
//! | link        | `[fg:bg::dest]` | `[-:-::-]`  |
//! | mention     | `[fg:bg:b]`     | `[-:-:B]`   |
//! | attribute   | `[::b]`         | `[::B]`     |

use super::elements::Attribute;
use crate::config::StyleConfig;

pub const CLOSE_COLORS: &str = "[-:-]";
pub const CLOSE_LINK: &str = "[-:-::-]";
pub const CLOSE_MENTION: &str = "[-:-:B]";

/// `[fg:bg]`
pub fn open_colors(style: &StyleConfig) -> String {
    format!("[{}:{}]", style.foreground, style.background)
}

/// `[fg:bg::dest]` - the destination rides along as the click target
pub fn open_link(style: &StyleConfig, destination: &str) -> String {
    format!("[{}:{}::{}]", style.foreground, style.background, destination)
}

/// `[fg:bg:b]`
pub fn open_mention(style: &StyleConfig) -> String {
    format!("[{}:{}:b]", style.foreground, style.background)
}

/// Open/close pair for an inline attribute, `None` for attributes the widget
/// can't express
pub fn attribute_tags(attr: Attribute) -> Option<(&'static str, &'static str)> {
    match attr {
        Attribute::Bold => Some(("[::b]", "[::B]")),
        Attribute::Italics => Some(("[::i]", "[::I]")),
        Attribute::Underline => Some(("[::u]", "[::U]")),
        Attribute::Strikethrough => Some(("[::s]", "[::S]")),
        Attribute::Monospace => Some(("[::r]", "[::R]")),
        Attribute::Spoiler => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arity(tag: &str) -> usize {
        tag.trim_start_matches('[').trim_end_matches(']').split(':').count()
    }

    #[test]
    fn test_open_close_arity_matches() {
        let style = StyleConfig::new("blue", "black");
        assert_eq!(open_colors(&style), "[blue:black]");
        assert_eq!(arity(&open_colors(&style)), arity(CLOSE_COLORS));

        let link = open_link(&style, "dest");
        assert_eq!(link, "[blue:black::dest]");
        assert_eq!(arity(&link), arity(CLOSE_LINK));

        assert_eq!(open_mention(&style), "[blue:black:b]");
        assert_eq!(arity(&open_mention(&style)), arity(CLOSE_MENTION));
    }

    #[test]
    fn test_attribute_tags() {
        let attrs = [
            Attribute::Bold,
            Attribute::Italics,
            Attribute::Underline,
            Attribute::Strikethrough,
            Attribute::Monospace,
        ];
        for attr in attrs {
            let (open, close) = attribute_tags(attr).unwrap();
            assert_eq!(arity(open), arity(close));
            assert_eq!(open.to_uppercase(), close);
        }
        assert!(attribute_tags(Attribute::Spoiler).is_none());
    }
}
