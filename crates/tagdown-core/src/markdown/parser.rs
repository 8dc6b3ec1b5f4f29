//! Markdown parsing using pulldown-cmark
//!
//! Builds a [`Node`] tree whose text nodes point back into the source. Chat
//! entities (mentions, custom emoji, spoilers, bare URLs) are split out of
//! text runs after pulldown-cmark is done with them.

use once_cell::sync::Lazy;
use pulldown_cmark::{CodeBlockKind, Event, LinkType, Options, Parser, Tag};
use regex::{Captures, Regex};
use std::ops::Range;

use super::elements::{Attribute, Emoji, Mention, Node, NodeKind, Segment};
use super::mentions::MentionResolver;

/// Chat entities inside a text run, plus bare URLs
static ENTITY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"<(?P<sigil>@!?|@&|#)(?P<id>\d+)>",
        r"|<(?P<animated>a?):(?P<emoji>\w+):(?P<emoji_id>\d+)>",
        r"|\|\|(?P<spoiler>.+?)\|\|",
        r"|(?P<url>https?://[^\s<>\[\]()]+)",
    ))
    .unwrap()
});

const URL_TRAILING: &[char] = &['.', ',', ';', ':', '!', '?'];

/// Parse chat markdown into a document tree
pub fn parse(source: &str, mentions: &dyn MentionResolver) -> Node {
    let options = Options::ENABLE_STRIKETHROUGH;
    let mut builder = TreeBuilder::new(source, mentions);

    for (event, range) in Parser::new_ext(source, options).into_offset_iter() {
        builder.event(event, range);
    }

    builder.finish()
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum CodeState {
    None,
    Fenced,
    Indented,
}

struct TreeBuilder<'a> {
    source: &'a str,
    mentions: &'a dyn MentionResolver,
    /// Open nodes; `stack[0]` is the document
    stack: Vec<Node>,
    /// Adjacent text events, merged so entities split across them are found
    pending_text: Option<Range<usize>>,
    /// Fenced code collected so far, split into lines when the block closes
    fence_run: Option<Range<usize>>,
    code: CodeState,
    /// Inside an autolink; its text child is the URL we already have
    in_autolink: bool,
    /// Inside a link or image; bare URLs are not linkified there
    link_depth: usize,
}

impl<'a> TreeBuilder<'a> {
    fn new(source: &'a str, mentions: &'a dyn MentionResolver) -> Self {
        Self {
            source,
            mentions,
            stack: vec![Node::new(NodeKind::Document)],
            pending_text: None,
            fence_run: None,
            code: CodeState::None,
            in_autolink: false,
            link_depth: 0,
        }
    }

    fn event(&mut self, event: Event<'_>, range: Range<usize>) {
        match event {
            Event::Start(tag) => {
                self.flush_text();
                self.start(tag, range);
            }
            Event::End(_) => {
                self.flush_text();
                self.flush_fence();
                self.end();
            }
            Event::Text(text) => self.text(&text, range),
            Event::Code(_) => {
                self.flush_text();
                let code = Node::with_children(
                    NodeKind::Inline(Attribute::Monospace),
                    vec![Node::text(self.code_span_content(range))],
                );
                self.push(code);
            }
            Event::SoftBreak => {
                self.flush_text();
                self.mark_break(range.start, false);
            }
            Event::HardBreak => {
                self.flush_text();
                self.mark_break(range.start, true);
            }
            // Raw HTML, rules, footnotes, task markers: nothing to render
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>, range: Range<usize>) {
        let kind = match tag {
            Tag::Paragraph => NodeKind::Paragraph,
            Tag::Heading { level, .. } => NodeKind::Heading {
                level: level as usize,
            },
            Tag::CodeBlock(CodeBlockKind::Fenced(_)) => {
                self.code = CodeState::Fenced;
                NodeKind::FencedCodeBlock {
                    language: self.fence_language(range.start),
                    lines: Vec::new(),
                }
            }
            Tag::CodeBlock(CodeBlockKind::Indented) => {
                self.code = CodeState::Indented;
                NodeKind::Other
            }
            Tag::List(start) => NodeKind::List {
                ordered: start.is_some(),
                start: start.unwrap_or(1),
            },
            Tag::Item => NodeKind::ListItem,
            Tag::Emphasis => NodeKind::Inline(Attribute::Italics),
            Tag::Strong => {
                // Chat flavour: `__text__` underlines instead of bolding
                if self.source[range.start..].starts_with("__") {
                    NodeKind::Inline(Attribute::Underline)
                } else {
                    NodeKind::Inline(Attribute::Bold)
                }
            }
            Tag::Strikethrough => NodeKind::Inline(Attribute::Strikethrough),
            Tag::Link {
                link_type: LinkType::Autolink | LinkType::Email,
                ..
            } => {
                self.in_autolink = true;
                // `<url>`: the URL is everything between the angle brackets
                let end = range.end.saturating_sub(1).max(range.start + 1);
                NodeKind::AutoLink {
                    url: Segment::new(range.start + 1, end),
                }
            }
            Tag::Link { dest_url, .. } => {
                self.link_depth += 1;
                NodeKind::Link {
                    destination: dest_url.to_string(),
                }
            }
            Tag::Image { dest_url, .. } => {
                self.link_depth += 1;
                NodeKind::Image {
                    destination: dest_url.to_string(),
                }
            }
            _ => NodeKind::Other,
        };

        self.stack.push(Node::new(kind));
    }

    fn end(&mut self) {
        // The document itself is never closed by an event
        if self.stack.len() < 2 {
            return;
        }
        let Some(node) = self.stack.pop() else {
            return;
        };

        match node.kind {
            NodeKind::FencedCodeBlock { .. } => self.code = CodeState::None,
            NodeKind::Other if self.code == CodeState::Indented => self.code = CodeState::None,
            NodeKind::AutoLink { .. } => self.in_autolink = false,
            NodeKind::Link { .. } | NodeKind::Image { .. } => {
                self.link_depth = self.link_depth.saturating_sub(1)
            }
            _ => {}
        }

        self.push(node);
    }

    fn text(&mut self, text: &str, range: Range<usize>) {
        match self.code {
            CodeState::Fenced => self.fenced_text(text, range),
            CodeState::Indented => self.push(Node::text(Segment(range))),
            CodeState::None if self.in_autolink => {}
            CodeState::None => match self.pending_text.take() {
                Some(pending) if pending.end == range.start => {
                    self.pending_text = Some(pending.start..range.end);
                }
                Some(pending) => {
                    self.push_text_run(pending);
                    self.pending_text = Some(range);
                }
                None => self.pending_text = Some(range),
            },
        }
    }

    /// pulldown-cmark hands fenced code over in pieces: CRLF endings arrive
    /// with the `\r` outside every range, and the padding left from a tab
    /// that a container only partly consumed comes as text with an empty range.
    fn fenced_text(&mut self, text: &str, range: Range<usize>) {
        let range = if range.is_empty() {
            if text.is_empty() {
                return;
            }
            match self.tab_near(range.start) {
                Some(tab) => tab,
                None => return,
            }
        } else {
            range
        };

        match self.fence_run.take() {
            Some(run) if range.start < run.end => {
                self.fence_run = Some(run.start..run.end.max(range.end));
            }
            Some(run) if self.source[run.end..range.start].bytes().all(|b| b == b'\r') => {
                self.fence_run = Some(run.start..range.end);
            }
            Some(run) => {
                self.push_fence_lines(run);
                self.fence_run = Some(range);
            }
            None => self.fence_run = Some(range),
        }
    }

    /// The tab byte at or just before `at`
    fn tab_near(&self, at: usize) -> Option<Range<usize>> {
        let bytes = self.source.as_bytes();
        [at.checked_sub(1), Some(at)]
            .into_iter()
            .flatten()
            .find(|&i| bytes.get(i) == Some(&b'\t'))
            .map(|i| i..i + 1)
    }

    fn flush_fence(&mut self) {
        if let Some(run) = self.fence_run.take() {
            self.push_fence_lines(run);
        }
    }

    fn push_fence_lines(&mut self, run: Range<usize>) {
        let source = self.source;
        let mut offset = run.start;
        let mut new_lines = Vec::new();
        for line in source[run].split_inclusive('\n') {
            new_lines.push(Segment::new(offset, offset + line.len()));
            offset += line.len();
        }
        if let Some(Node {
            kind: NodeKind::FencedCodeBlock { lines, .. },
            ..
        }) = self.stack.last_mut()
        {
            lines.extend(new_lines);
        }
    }

    fn flush_text(&mut self) {
        if let Some(range) = self.pending_text.take() {
            self.push_text_run(range);
        }
    }

    /// Split a run of plain text into text and entity nodes
    fn push_text_run(&mut self, range: Range<usize>) {
        let source = self.source;
        let base = range.start;
        let text = &source[range];
        let mut last = 0;

        for caps in ENTITY_REGEX.captures_iter(text) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            let Some((node, end)) = self.entity_node(&caps, base) else {
                continue;
            };

            if whole.start() > last {
                self.push(Node::text(Segment::new(base + last, base + whole.start())));
            }
            self.push(node);
            last = end;
        }

        if last < text.len() {
            self.push(Node::text(Segment::new(base + last, base + text.len())));
        }
    }

    /// Node for one regex match and where it ends in the run, `None` to keep
    /// the match as plain text
    fn entity_node(&self, caps: &Captures<'_>, base: usize) -> Option<(Node, usize)> {
        let end = caps.get(0)?.end();

        if let (Some(sigil), Some(id)) = (caps.name("sigil"), caps.name("id")) {
            let id = id.as_str();
            let mention = match sigil.as_str() {
                "#" => Mention::Channel {
                    name: self.mentions.channel(id)?,
                },
                "@&" => Mention::Role {
                    name: self.mentions.role(id)?,
                },
                _ => Mention::User(self.mentions.user(id)?),
            };
            return Some((Node::new(NodeKind::Mention(mention)), end));
        }

        if let (Some(name), Some(id)) = (caps.name("emoji"), caps.name("emoji_id")) {
            let emoji = Emoji {
                name: name.as_str().to_string(),
                id: id.as_str().to_string(),
                animated: caps.name("animated").is_some_and(|a| !a.as_str().is_empty()),
            };
            return Some((Node::new(NodeKind::Emoji(emoji)), end));
        }

        if let Some(inner) = caps.name("spoiler") {
            let spoiler = Node::with_children(
                NodeKind::Inline(Attribute::Spoiler),
                vec![Node::text(Segment::new(
                    base + inner.start(),
                    base + inner.end(),
                ))],
            );
            return Some((spoiler, end));
        }

        if let Some(url) = caps.name("url") {
            if self.link_depth > 0 {
                return None;
            }
            // Sentence punctuation after a URL stays text
            let url_end = url.start() + url.as_str().trim_end_matches(URL_TRAILING).len();
            let link = Node::new(NodeKind::AutoLink {
                url: Segment::new(base + url.start(), base + url_end),
            });
            return Some((link, url_end));
        }

        None
    }

    /// Attach a line break to the preceding text node
    fn mark_break(&mut self, at: usize, hard: bool) {
        let needs_carrier = !matches!(
            self.top().children.last(),
            Some(Node {
                kind: NodeKind::Text { .. },
                ..
            })
        );
        if needs_carrier {
            self.push(Node::text(Segment::new(at, at)));
        }

        if let Some(Node {
            kind:
                NodeKind::Text {
                    soft_break,
                    hard_break,
                    ..
                },
            ..
        }) = self.top_mut().children.last_mut()
        {
            if hard {
                *hard_break = true;
            } else {
                *soft_break = true;
            }
        }
    }

    /// Language tag from the opening fence line: first word of the info string
    fn fence_language(&self, start: usize) -> Option<Segment> {
        let rest = &self.source[start..];
        let line = rest.split('\n').next().unwrap_or("");
        let is_fence = |c: char| c == '`' || c == '~';
        let fence_at = line.find(is_fence)?;
        let after_fence = line[fence_at..].trim_start_matches(is_fence);
        let info_offset = line.len() - after_fence.len();
        let info = after_fence.trim_start();
        let lang_start = info_offset + (after_fence.len() - info.len());
        let lang_len = info
            .find(|c: char| c.is_whitespace())
            .unwrap_or(info.len());

        (lang_len > 0).then(|| Segment::new(start + lang_start, start + lang_start + lang_len))
    }

    /// Content of an inline code span, without the backtick fences
    fn code_span_content(&self, range: Range<usize>) -> Segment {
        let raw = &self.source[range.clone()];
        let ticks = raw.len() - raw.trim_start_matches('`').len();
        let mut start = range.start + ticks;
        let mut end = range.end.saturating_sub(ticks).max(start);

        // One space of padding on both sides is stripped
        let inner = &self.source[start..end];
        if inner.len() >= 2
            && inner.starts_with(' ')
            && inner.ends_with(' ')
            && !inner.trim().is_empty()
        {
            start += 1;
            end -= 1;
        }

        Segment::new(start, end)
    }

    fn top(&self) -> &Node {
        // The document is never popped
        &self.stack[self.stack.len() - 1]
    }

    fn top_mut(&mut self) -> &mut Node {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    fn push(&mut self, node: Node) {
        self.top_mut().children.push(node);
    }

    fn finish(mut self) -> Node {
        self.flush_text();
        self.flush_fence();
        while self.stack.len() > 1 {
            self.end();
        }
        self.stack.pop().unwrap_or_else(|| Node::new(NodeKind::Document))
    }
}
