//! Tag renderer
//!
//! Walks a document tree and writes plain text interleaved with the widget's
//! style tags. Images go through the [`ImageResolver`].

use std::io::{self, Write};

use thiserror::Error;

use super::elements::{Mention, Node, NodeKind};
use super::tags::{self, CLOSE_COLORS, CLOSE_LINK, CLOSE_MENTION};
use super::walk::{walk, WalkStatus};
use crate::config::{Config, Theme};
use crate::graphics::{GraphicsSupport, ImageCache, ImageResolver};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

/// Per-list state; one frame per list currently being walked
#[derive(Debug, Clone, Copy)]
struct ListFrame {
    /// Next item number, `None` for unordered lists
    index: Option<u64>,
}

pub struct Renderer {
    theme: Theme,
    images: ImageResolver,
    lists: Vec<ListFrame>,
}

impl Renderer {
    pub fn new(theme: Theme, images: ImageResolver) -> Self {
        Self {
            theme,
            images,
            lists: Vec::new(),
        }
    }

    /// Renderer for `config`. Graphics support comes from `$TERM` unless the
    /// config overrides it; downloads go through the process-wide registry.
    pub fn from_config(config: &Config) -> Self {
        let support = match config.term.as_deref() {
            Some(term) => GraphicsSupport::from_term(Some(term)),
            None => GraphicsSupport::detect(),
        };
        let images = ImageResolver::new(support, ImageCache::new(config.cache_root()));
        Self::new(config.theme.clone(), images)
    }

    pub fn images(&self) -> &ImageResolver {
        &self.images
    }

    /// Render `root` (built from `source`) into `w`
    pub fn render<W: Write + ?Sized>(
        &mut self,
        w: &mut W,
        source: &str,
        root: &Node,
    ) -> Result<(), RenderError> {
        self.lists.clear();
        walk(root, &mut |node, entering| self.visit(&mut *w, source, node, entering))
    }

    /// Convenience: render into a `String`
    pub fn render_to_string(&mut self, source: &str, root: &Node) -> Result<String, RenderError> {
        let mut out = Vec::new();
        self.render(&mut out, source, root)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    fn visit<W: Write + ?Sized>(
        &mut self,
        w: &mut W,
        source: &str,
        node: &Node,
        entering: bool,
    ) -> Result<WalkStatus, RenderError> {
        match &node.kind {
            NodeKind::Heading { level } => self.render_heading(w, *level, entering)?,
            NodeKind::Text {
                segment,
                soft_break,
                hard_break,
            } => {
                if entering {
                    w.write_all(segment.value(source).as_bytes())?;
                    if *hard_break {
                        w.write_all(b"\n\n")?;
                    } else if *soft_break {
                        w.write_all(b"\n")?;
                    }
                }
            }
            NodeKind::FencedCodeBlock { language, lines } => {
                if entering {
                    w.write_all(b"\n")?;
                    if let Some(language) = language {
                        writeln!(w, "|=> {}", language.value(source))?;
                    }
                    for line in lines {
                        write!(w, "| {}", line.value(source))?;
                    }
                }
            }
            NodeKind::AutoLink { url } => {
                if entering {
                    w.write_all(tags::open_colors(&self.theme.url_style).as_bytes())?;
                    w.write_all(url.value(source).as_bytes())?;
                } else {
                    w.write_all(CLOSE_COLORS.as_bytes())?;
                }
            }
            NodeKind::Link { destination } => {
                if entering {
                    let open = tags::open_link(&self.theme.url_style, destination);
                    w.write_all(open.as_bytes())?;
                } else {
                    w.write_all(CLOSE_LINK.as_bytes())?;
                }
            }
            NodeKind::Image { destination } => {
                return Ok(self.images.resolve(w, destination, entering)?);
            }
            NodeKind::List { ordered, start } => {
                if entering {
                    self.lists.push(ListFrame {
                        index: ordered.then_some(*start),
                    });
                    w.write_all(b"\n")?;
                } else {
                    self.lists.pop();
                }
            }
            NodeKind::ListItem => self.render_list_item(w, entering)?,
            NodeKind::Inline(attr) => {
                if let Some((open, close)) = tags::attribute_tags(*attr) {
                    w.write_all(if entering { open } else { close }.as_bytes())?;
                }
            }
            NodeKind::Mention(mention) => {
                if entering {
                    w.write_all(tags::open_mention(&self.theme.mention_style).as_bytes())?;
                    match mention {
                        Mention::Channel { name } => write!(w, "#{name}")?,
                        Mention::User(user) => write!(w, "@{}", user.mention_name())?,
                        Mention::Role { name } => write!(w, "@{name}")?,
                    }
                } else {
                    w.write_all(CLOSE_MENTION.as_bytes())?;
                }
            }
            NodeKind::Emoji(emoji) => {
                if entering {
                    w.write_all(tags::open_colors(&self.theme.emoji_style).as_bytes())?;
                    write!(w, ":{}:", emoji.name)?;
                } else {
                    w.write_all(CLOSE_COLORS.as_bytes())?;
                }
            }
            NodeKind::Document | NodeKind::Paragraph | NodeKind::Other => {}
        }

        Ok(WalkStatus::Continue)
    }

    fn render_heading<W: Write + ?Sized>(
        &self,
        w: &mut W,
        level: usize,
        entering: bool,
    ) -> io::Result<()> {
        if entering {
            write!(w, "{} ", "#".repeat(level))
        } else {
            w.write_all(b"\n")
        }
    }

    fn render_list_item<W: Write + ?Sized>(&mut self, w: &mut W, entering: bool) -> io::Result<()> {
        if !entering {
            return w.write_all(b"\n");
        }

        let depth = self.lists.len();
        w.write_all("  ".repeat(depth.saturating_sub(1)).as_bytes())?;

        match self.lists.last_mut().and_then(|frame| frame.index.as_mut()) {
            Some(index) => {
                write!(w, "{index}. ")?;
                *index += 1;
            }
            None => w.write_all(b"- ")?,
        }
        Ok(())
    }
}
