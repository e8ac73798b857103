//! Markdown to node tree.
//!
//! Parsing is done by pulldown-cmark with tables, strikethrough and task
//! lists enabled. Its event stream is folded into a [`Document`] by a frame
//! stack. Raw HTML events are tokenized by [`crate::sanitize`] and fed into
//! the same stack, so sanitized markup ends up as ordinary nodes.
use std::collections::HashMap;

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use tracing::debug;

use crate::node::{Code, Document, Node};
use crate::sanitize::{self, ElementKind, HtmlToken, StartTag, TagPolicy};
use crate::slug::slugify;

/// Largest ordered-list start kept from raw `<ol start>`, the same nine-digit
/// cap markdown list markers have.
const MAX_LIST_START: u64 = 999_999_999;

/// Turn literal `\n` (and `\r\n`) escape sequences left over from storage into line breaks.
pub fn normalize_newlines(source: &str) -> String {
    source.replace("\\r\\n", "\n").replace("\\n", "\n")
}

fn parser_options() -> Options {
    let mut opts = Options::empty();
    opts.insert(Options::ENABLE_TABLES);
    opts.insert(Options::ENABLE_STRIKETHROUGH);
    opts.insert(Options::ENABLE_TASKLISTS);
    opts
}

/// Render a card body to a sanitized node tree.
///
/// Pure and deterministic. Blank input, or input whose every fragment is
/// stripped by the sanitizer, yields [`Document::placeholder`].
pub fn render_markdown(source: &str) -> Document {
    let normalized = normalize_newlines(source);
    if normalized.trim().is_empty() {
        return Document::placeholder();
    }

    let mut builder = TreeBuilder::new();
    for event in Parser::new_ext(&normalized, parser_options()) {
        builder.event(event);
    }
    let blocks = builder.finish();

    if blocks.is_empty() {
        debug!("rendered document is empty after sanitizing");
        return Document::placeholder();
    }
    Document { blocks }
}

enum FrameKind {
    Root,
    Heading(u8),
    Paragraph,
    List { ordered: bool, start: Option<u64> },
    ListItem { checked: Option<bool> },
    Table { head: Vec<Node>, rows: Vec<Vec<Node>> },
    TableHead,
    TableRow,
    TableCell { header: bool },
    BlockQuote,
    CodeBlock { language: Option<String> },
    InlineCode,
    Emphasis,
    Strong,
    Strikethrough,
    Link { href: String, title: Option<String> },
    Image { src: String, title: Option<String> },
    /// Children flow into the parent, the wrapper disappears.
    Unwrap,
    /// Children are discarded.
    Drop,
}

struct Frame {
    kind: FrameKind,
    children: Vec<Node>,
    /// Tag name for frames opened by raw markup, `None` for markdown structure.
    html_tag: Option<String>,
}

/// Per-render record of which headings produced which anchor.
#[derive(Default)]
struct AnchorRegistry {
    headings: HashMap<String, Vec<String>>,
}

impl AnchorRegistry {
    fn register(&mut self, anchor: &str, text: &str) {
        let texts = self.headings.entry(anchor.to_string()).or_default();
        texts.push(text.to_string());
        if texts.len() > 1 {
            debug!(anchor, occurrences = texts.len(), "duplicate heading anchor");
        }
    }
}

struct TreeBuilder {
    stack: Vec<Frame>,
    anchors: AnchorRegistry,
    /// Raw HTML of the block-level HTML element being read.
    html_block: Option<String>,
}

impl TreeBuilder {
    fn new() -> Self {
        Self {
            stack: vec![Frame {
                kind: FrameKind::Root,
                children: Vec::new(),
                html_tag: None,
            }],
            anchors: AnchorRegistry::default(),
            html_block: None,
        }
    }

    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(Tag::HtmlBlock) => self.html_block = Some(String::new()),
            Event::End(TagEnd::HtmlBlock) => {
                if let Some(html) = self.html_block.take() {
                    self.raw_block(&html);
                }
            }
            Event::Start(tag) => self.start(tag),
            Event::End(_) => self.close_markdown_frame(),
            Event::Text(text) => self.push_text(&text),
            Event::Code(code) => self.push_node(Node::Code(Code::Inline(code.to_string()))),
            Event::Html(html) => match self.html_block.as_mut() {
                Some(buffer) => buffer.push_str(&html),
                None => self.raw_block(&html),
            },
            Event::InlineHtml(html) => self.raw_inline(&html),
            Event::SoftBreak => self.push_text("\n"),
            Event::HardBreak => self.push_node(Node::LineBreak),
            Event::Rule => self.push_node(Node::Rule),
            Event::TaskListMarker(checked) => self.mark_task(checked),
            Event::FootnoteReference(label) => self.push_text(&format!("[{label}]")),
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        let kind = match tag {
            Tag::Paragraph => FrameKind::Paragraph,
            Tag::Heading { level, .. } => FrameKind::Heading(heading_level(level)),
            Tag::BlockQuote(_) => FrameKind::BlockQuote,
            Tag::CodeBlock(CodeBlockKind::Fenced(info)) => FrameKind::CodeBlock {
                language: info.split_whitespace().next().map(str::to_string),
            },
            Tag::CodeBlock(CodeBlockKind::Indented) => FrameKind::CodeBlock { language: None },
            Tag::List(start) => FrameKind::List {
                ordered: start.is_some(),
                start,
            },
            Tag::Item => FrameKind::ListItem { checked: None },
            Tag::Table(_) => FrameKind::Table {
                head: Vec::new(),
                rows: Vec::new(),
            },
            Tag::TableHead => FrameKind::TableHead,
            Tag::TableRow => FrameKind::TableRow,
            Tag::TableCell => FrameKind::TableCell {
                header: matches!(self.top().kind, FrameKind::TableHead),
            },
            Tag::Emphasis => FrameKind::Emphasis,
            Tag::Strong => FrameKind::Strong,
            Tag::Strikethrough => FrameKind::Strikethrough,
            Tag::Link { dest_url, title, .. } => FrameKind::Link {
                href: sanitize::safe_url(&dest_url, false),
                title: non_empty(&title),
            },
            Tag::Image { dest_url, title, .. } => FrameKind::Image {
                src: sanitize::safe_url(&dest_url, true),
                title: non_empty(&title),
            },
            _ => FrameKind::Unwrap,
        };
        self.push_frame(kind, None);
    }

    fn top(&self) -> &Frame {
        // The root frame is never popped.
        &self.stack[self.stack.len() - 1]
    }

    fn push_frame(&mut self, kind: FrameKind, html_tag: Option<String>) {
        self.stack.push(Frame {
            kind,
            children: Vec::new(),
            html_tag,
        });
    }

    fn push_node(&mut self, node: Node) {
        if let Node::Text(text) = node {
            self.push_text(&text);
            return;
        }
        if let Some(top) = self.stack.last_mut() {
            top.children.push(node);
        }
    }

    fn push_text(&mut self, text: &str) {
        let Some(top) = self.stack.last_mut() else {
            return;
        };
        if let Some(Node::Text(prev)) = top.children.last_mut() {
            prev.push_str(text);
        } else {
            top.children.push(Node::Text(text.to_string()));
        }
    }

    fn extend_top(&mut self, children: Vec<Node>) {
        for child in children {
            self.push_node(child);
        }
    }

    fn mark_task(&mut self, checked: bool) {
        let item = self
            .stack
            .iter_mut()
            .rev()
            .find(|f| matches!(f.kind, FrameKind::ListItem { .. }));
        if let Some(Frame {
            kind: FrameKind::ListItem { checked: slot },
            ..
        }) = item
        {
            *slot = Some(checked);
        }
    }

    /// Close frames opened by raw markup, then the innermost markdown frame.
    fn close_markdown_frame(&mut self) {
        while self.stack.len() > 1 {
            let opened_by_markup = self.top().html_tag.is_some();
            self.close_top();
            if !opened_by_markup {
                return;
            }
        }
    }

    fn close_to(&mut self, depth: usize) {
        while self.stack.len() > depth.max(1) {
            self.close_top();
        }
    }

    fn close_top(&mut self) {
        if self.stack.len() <= 1 {
            return;
        }
        let Some(Frame { kind, children, .. }) = self.stack.pop() else {
            return;
        };

        let node = match kind {
            FrameKind::Root | FrameKind::Unwrap => {
                self.extend_top(children);
                return;
            }
            FrameKind::Drop => return,
            FrameKind::Heading(level) => {
                let mut heading = Node::Heading {
                    level,
                    anchor: String::new(),
                    children,
                };
                let text = heading.flattened_text();
                let slug = slugify(&text);
                self.anchors.register(&slug, &text);
                if let Node::Heading { anchor, .. } = &mut heading {
                    *anchor = slug;
                }
                heading
            }
            FrameKind::Paragraph => {
                if children.iter().all(is_blank_text) {
                    return;
                }
                Node::Paragraph(children)
            }
            FrameKind::List { ordered, start } => Node::List {
                ordered,
                start,
                items: without_blank_text(children),
            },
            FrameKind::ListItem { checked } => Node::ListItem { checked, children },
            FrameKind::Table { head, mut rows } => {
                let stray = without_blank_text(children);
                if !stray.is_empty() {
                    rows.push(stray);
                }
                Node::Table { head, rows }
            }
            FrameKind::TableHead => {
                let cells = without_blank_text(children);
                if let Some(Frame {
                    kind: FrameKind::Table { head, .. },
                    ..
                }) = self.stack.last_mut()
                {
                    head.extend(cells);
                } else {
                    self.extend_top(cells);
                }
                return;
            }
            FrameKind::TableRow => {
                let cells = without_blank_text(children);
                match self.stack.last_mut() {
                    Some(Frame {
                        kind: FrameKind::Table { rows, .. },
                        ..
                    }) => rows.push(cells),
                    Some(Frame {
                        kind: FrameKind::TableHead,
                        children: head_cells,
                        ..
                    }) => head_cells.extend(cells),
                    _ => self.extend_top(cells),
                }
                return;
            }
            FrameKind::TableCell { header } => Node::TableCell { header, children },
            FrameKind::BlockQuote => Node::BlockQuote(children),
            FrameKind::CodeBlock { language } => Node::Code(Code::Block {
                language,
                content: concat_text(&children),
            }),
            FrameKind::InlineCode => Node::Code(Code::Inline(concat_text(&children))),
            FrameKind::Emphasis => Node::Emphasis(children),
            FrameKind::Strong => Node::Strong(children),
            FrameKind::Strikethrough => Node::Strikethrough(children),
            FrameKind::Link { href, title } => Node::Link {
                href,
                title,
                children,
            },
            FrameKind::Image { src, title } => Node::Image {
                src,
                alt: concat_text(&children),
                title,
                lazy: true,
            },
        };
        self.push_node(node);
    }

    /// A complete block of raw HTML. Elements it leaves open are closed at its end.
    fn raw_block(&mut self, html: &str) {
        let depth = self.stack.len();
        self.raw_inline(html);
        self.close_to(depth);
    }

    fn raw_inline(&mut self, html: &str) {
        for token in sanitize::tokenize(html) {
            match token {
                HtmlToken::Text(text) => self.push_text(&text),
                HtmlToken::Start(tag) => self.open_element(tag),
                HtmlToken::End(name) => self.close_element(&name),
            }
        }
    }

    fn open_element(&mut self, tag: StartTag) {
        let void = tag.self_closing || sanitize::is_void(&tag.name);
        let kind = match sanitize::policy_for(&tag.name) {
            TagPolicy::Drop => {
                debug!(tag = %tag.name, "dropping unsafe element");
                FrameKind::Drop
            }
            TagPolicy::Unwrap => FrameKind::Unwrap,
            TagPolicy::Map(ElementKind::Image) => {
                self.push_node(Node::Image {
                    src: tag.attr("src").unwrap_or_default().to_string(),
                    alt: tag.attr("alt").unwrap_or_default().to_string(),
                    title: tag.attr("title").and_then(non_empty),
                    lazy: true,
                });
                return;
            }
            TagPolicy::Map(ElementKind::LineBreak) => {
                self.push_node(Node::LineBreak);
                return;
            }
            TagPolicy::Map(ElementKind::Rule) => {
                self.push_node(Node::Rule);
                return;
            }
            TagPolicy::Map(ElementKind::Code)
                if matches!(self.top().kind, FrameKind::CodeBlock { .. }) =>
            {
                if let Some(Frame {
                    kind: FrameKind::CodeBlock { language },
                    ..
                }) = self.stack.last_mut()
                {
                    if language.is_none() {
                        *language = tag.attr("class").and_then(class_language);
                    }
                }
                FrameKind::Unwrap
            }
            TagPolicy::Map(element) => element_frame(element, &tag, self.top()),
        };
        if !void {
            self.push_frame(kind, Some(tag.name));
        }
    }

    /// Close the innermost open element named `name`, if it was opened by
    /// raw markup inside the current markdown frame. Stray end tags are ignored.
    fn close_element(&mut self, name: &str) {
        let mut target = None;
        for (index, frame) in self.stack.iter().enumerate().rev() {
            match frame.html_tag.as_deref() {
                Some(tag) if tag == name => {
                    target = Some(index);
                    break;
                }
                Some(_) => continue,
                None => break,
            }
        }
        if let Some(index) = target {
            self.close_to(index);
        }
    }

    fn finish(mut self) -> Vec<Node> {
        self.close_to(1);
        let root = self.stack.pop().map(|f| f.children).unwrap_or_default();
        wrap_loose_inlines(root)
    }
}

fn list_start(tag: &StartTag) -> u64 {
    tag.attr("start")
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map_or(1, |n| n.min(MAX_LIST_START))
}

fn element_frame(element: ElementKind, tag: &StartTag, parent: &Frame) -> FrameKind {
    match element {
        ElementKind::Heading(level) => FrameKind::Heading(level),
        ElementKind::Paragraph => FrameKind::Paragraph,
        ElementKind::List { ordered } => FrameKind::List {
            ordered,
            start: ordered.then(|| list_start(tag)),
        },
        ElementKind::ListItem => FrameKind::ListItem { checked: None },
        ElementKind::Table => FrameKind::Table {
            head: Vec::new(),
            rows: Vec::new(),
        },
        ElementKind::TableHead => FrameKind::TableHead,
        ElementKind::TableRow => FrameKind::TableRow,
        ElementKind::TableCell { header } => FrameKind::TableCell {
            header: header || matches!(parent.kind, FrameKind::TableHead),
        },
        ElementKind::BlockQuote => FrameKind::BlockQuote,
        ElementKind::Pre => FrameKind::CodeBlock { language: None },
        ElementKind::Code => FrameKind::InlineCode,
        ElementKind::Link => FrameKind::Link {
            href: tag.attr("href").unwrap_or_default().to_string(),
            title: tag.attr("title").and_then(non_empty),
        },
        ElementKind::Emphasis => FrameKind::Emphasis,
        ElementKind::Strong => FrameKind::Strong,
        ElementKind::Strikethrough => FrameKind::Strikethrough,
        // Void elements are handled before a frame is considered.
        ElementKind::Image | ElementKind::Rule | ElementKind::LineBreak => FrameKind::Unwrap,
    }
}

fn heading_level(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn class_language(class: &str) -> Option<String> {
    class.split_whitespace().find_map(|c| {
        c.strip_prefix("language-")
            .or_else(|| c.strip_prefix("lang-"))
            .filter(|l| !l.is_empty())
            .map(str::to_string)
    })
}

fn concat_text(children: &[Node]) -> String {
    children.iter().map(Node::flattened_text).collect()
}

fn is_blank_text(node: &Node) -> bool {
    matches!(node, Node::Text(t) if t.trim().is_empty())
}

fn without_blank_text(children: Vec<Node>) -> Vec<Node> {
    children.into_iter().filter(|n| !is_blank_text(n)).collect()
}

fn is_inline(node: &Node) -> bool {
    matches!(
        node,
        Node::Text(_)
            | Node::Code(Code::Inline(_))
            | Node::Image { .. }
            | Node::Link { .. }
            | Node::LineBreak
            | Node::Emphasis(_)
            | Node::Strong(_)
            | Node::Strikethrough(_)
    )
}

/// Top-level inline content (left behind by unwrapped raw blocks) is grouped
/// into paragraphs; whitespace-only runs are dropped.
fn wrap_loose_inlines(nodes: Vec<Node>) -> Vec<Node> {
    let mut blocks = Vec::new();
    let mut pending: Vec<Node> = Vec::new();
    for node in nodes {
        if is_inline(&node) {
            pending.push(node);
            continue;
        }
        flush_inlines(&mut pending, &mut blocks);
        blocks.push(node);
    }
    flush_inlines(&mut pending, &mut blocks);
    blocks
}

fn flush_inlines(pending: &mut Vec<Node>, blocks: &mut Vec<Node>) {
    if pending.iter().all(is_blank_text) {
        pending.clear();
        return;
    }
    let mut inlines = std::mem::take(pending);
    if let Some(Node::Text(first)) = inlines.first_mut() {
        *first = first.trim_start().to_string();
    }
    if let Some(Node::Text(last)) = inlines.last_mut() {
        *last = last.trim_end().to_string();
    }
    inlines.retain(|n| !matches!(n, Node::Text(t) if t.is_empty()));
    blocks.push(Node::Paragraph(inlines));
}
