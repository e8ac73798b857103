//! The render node tree.
//!
//! A closed set of node kinds. Presentation code matches on [`Node`]
//! exhaustively, so adding a kind is a compile-checked change everywhere it
//! is rendered.

/// Text of the block produced for blank input.
pub const PLACEHOLDER_MESSAGE: &str = "Content not available.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// `level` is 1..=6. `anchor` is the slug of the flattened text and may be empty.
    Heading {
        level: u8,
        anchor: String,
        children: Vec<Node>,
    },
    Paragraph(Vec<Node>),
    /// `items` are [`Node::ListItem`]s. `start` is set for ordered lists.
    List {
        ordered: bool,
        start: Option<u64>,
        items: Vec<Node>,
    },
    /// `checked` is `Some` for task-list items.
    ListItem {
        checked: Option<bool>,
        children: Vec<Node>,
    },
    /// `head` holds the header cells, each row holds body cells.
    Table {
        head: Vec<Node>,
        rows: Vec<Vec<Node>>,
    },
    TableCell {
        header: bool,
        children: Vec<Node>,
    },
    BlockQuote(Vec<Node>),
    Code(Code),
    /// `alt` is always present (possibly empty); `lazy` asks the surface to
    /// defer loading until visible.
    Image {
        src: String,
        alt: String,
        title: Option<String>,
        lazy: bool,
    },
    /// Every link opens as an isolated external navigation.
    Link {
        href: String,
        title: Option<String>,
        children: Vec<Node>,
    },
    Text(String),
    LineBreak,
    Rule,
    Emphasis(Vec<Node>),
    Strong(Vec<Node>),
    Strikethrough(Vec<Node>),
    /// Stand-in block for content that is empty or fully stripped.
    Placeholder(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Code {
    Inline(String),
    /// Fenced or indented block. The language tag is display-only and never validated.
    Block {
        language: Option<String>,
        content: String,
    },
}

impl Node {
    /// Child nodes, for container kinds. Table rows are flattened in order.
    pub fn children(&self) -> Vec<&Node> {
        match self {
            Node::Heading { children, .. }
            | Node::ListItem { children, .. }
            | Node::TableCell { children, .. }
            | Node::Link { children, .. }
            | Node::Paragraph(children)
            | Node::BlockQuote(children)
            | Node::Emphasis(children)
            | Node::Strong(children)
            | Node::Strikethrough(children) => children.iter().collect(),
            Node::List { items, .. } => items.iter().collect(),
            Node::Table { head, rows } => head.iter().chain(rows.iter().flatten()).collect(),
            Node::Code(_)
            | Node::Image { .. }
            | Node::Text(_)
            | Node::LineBreak
            | Node::Rule
            | Node::Placeholder(_) => Vec::new(),
        }
    }

    /// All visible text under this node concatenated, ignoring markup.
    pub fn flattened_text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            Node::Text(text) | Node::Code(Code::Inline(text)) => out.push_str(text),
            Node::Code(Code::Block { content, .. }) => out.push_str(content),
            Node::LineBreak => out.push('\n'),
            _ => {
                for child in self.children() {
                    child.collect_text(out);
                }
            }
        }
    }
}

/// One heading in a rendered document, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineEntry {
    pub level: u8,
    pub anchor: String,
    pub text: String,
}

/// A rendered card body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub blocks: Vec<Node>,
}

impl Document {
    pub fn placeholder() -> Self {
        Self {
            blocks: vec![Node::Placeholder(PLACEHOLDER_MESSAGE.to_string())],
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.blocks.as_slice(), [Node::Placeholder(_)])
    }

    /// Headings with their anchors, for a table of contents.
    pub fn outline(&self) -> Vec<OutlineEntry> {
        let mut entries = Vec::new();
        for block in &self.blocks {
            collect_headings(block, &mut entries);
        }
        entries
    }
}

fn collect_headings(node: &Node, entries: &mut Vec<OutlineEntry>) {
    if let Node::Heading { level, anchor, .. } = node {
        entries.push(OutlineEntry {
            level: *level,
            anchor: anchor.clone(),
            text: node.flattened_text().trim().to_string(),
        });
        return;
    }
    for child in node.children() {
        collect_headings(child, entries);
    }
}
