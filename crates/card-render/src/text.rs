//! Plain-text presentation for terminals.
use crate::node::{Code, Document, Node};

/// Render a document as readable plain text.
///
/// Headings are prefixed with `#` marks and followed by their anchor, links
/// are shown as `text <href>`, images as `[image: alt]`.
pub fn to_plain_text(doc: &Document) -> String {
    let mut out = String::new();
    for block in &doc.blocks {
        write_block(block, 0, &mut out);
    }
    out.trim_end().to_string() + "\n"
}

fn write_block(node: &Node, indent: usize, out: &mut String) {
    let pad = "  ".repeat(indent);
    match node {
        Node::Heading {
            level,
            anchor,
            children,
        } => {
            out.push_str(&format!(
                "{pad}{} {}",
                "#".repeat(usize::from(*level)),
                inline_text(children)
            ));
            if !anchor.is_empty() {
                out.push_str(&format!("  {{#{anchor}}}"));
            }
            out.push_str("\n\n");
        }
        Node::Paragraph(children) => {
            out.push_str(&format!("{pad}{}\n\n", inline_text(children)));
        }
        Node::List {
            ordered,
            start,
            items,
        } => {
            let first = start.unwrap_or(1);
            for (i, item) in items.iter().enumerate() {
                let marker = if *ordered {
                    format!("{}.", first.saturating_add(i as u64))
                } else {
                    "-".to_string()
                };
                write_list_item(item, &marker, indent, out);
            }
            out.push('\n');
        }
        Node::ListItem { .. } => write_list_item(node, "-", indent, out),
        Node::Table { head, rows } => {
            if !head.is_empty() {
                out.push_str(&format!("{pad}| {} |\n", cells_text(head)));
                out.push_str(&format!("{pad}|{}|\n", vec!["---"; head.len()].join("|")));
            }
            for row in rows {
                out.push_str(&format!("{pad}| {} |\n", cells_text(row)));
            }
            out.push('\n');
        }
        Node::BlockQuote(children) => {
            let mut inner = String::new();
            for child in children {
                write_block(child, 0, &mut inner);
            }
            for line in inner.trim_end().lines() {
                out.push_str(&format!("{pad}> {line}\n"));
            }
            out.push('\n');
        }
        Node::Code(Code::Block { language, content }) => {
            out.push_str(&format!("{pad}```{}\n", language.as_deref().unwrap_or("")));
            for line in content.lines() {
                out.push_str(&format!("{pad}{line}\n"));
            }
            out.push_str(&format!("{pad}```\n\n"));
        }
        Node::Rule => out.push_str(&format!("{pad}----\n\n")),
        Node::Placeholder(message) => out.push_str(&format!("{pad}{message}\n\n")),
        Node::TableCell { children, .. } => {
            out.push_str(&format!("{pad}{}\n", inline_text(children)));
        }
        Node::Code(Code::Inline(_))
        | Node::Image { .. }
        | Node::Link { .. }
        | Node::Text(_)
        | Node::LineBreak
        | Node::Emphasis(_)
        | Node::Strong(_)
        | Node::Strikethrough(_) => {
            out.push_str(&format!("{pad}{}\n\n", inline_text(std::slice::from_ref(node))));
        }
    }
}

fn write_list_item(item: &Node, marker: &str, indent: usize, out: &mut String) {
    let pad = "  ".repeat(indent);
    let Node::ListItem { checked, children } = item else {
        write_block(item, indent + 1, out);
        return;
    };
    let check = match checked {
        Some(true) => "[x] ",
        Some(false) => "[ ] ",
        None => "",
    };

    let (inline, blocks): (Vec<&Node>, Vec<&Node>) = children.iter().partition(|c| is_inline(c));
    let mut lead: Vec<Node> = inline.into_iter().cloned().collect();
    let mut rest = blocks.into_iter();
    if lead.is_empty() {
        if let Some(Node::Paragraph(first)) = children.first() {
            lead = first.clone();
            rest.next();
        }
    }
    out.push_str(&format!("{pad}{marker} {check}{}\n", inline_text(&lead).trim()));
    for block in rest {
        let mut nested = String::new();
        write_block(block, indent + 1, &mut nested);
        out.push_str(nested.trim_end_matches('\n'));
        out.push('\n');
    }
}

fn is_inline(node: &Node) -> bool {
    !matches!(
        node,
        Node::Heading { .. }
            | Node::Paragraph(_)
            | Node::List { .. }
            | Node::ListItem { .. }
            | Node::Table { .. }
            | Node::TableCell { .. }
            | Node::BlockQuote(_)
            | Node::Code(Code::Block { .. })
            | Node::Rule
            | Node::Placeholder(_)
    )
}

fn cells_text(cells: &[Node]) -> String {
    cells
        .iter()
        .map(|cell| match cell {
            Node::TableCell { children, .. } => inline_text(children),
            other => inline_text(std::slice::from_ref(other)),
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

fn inline_text(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Code(Code::Inline(code)) => out.push_str(&format!("`{code}`")),
            Node::Emphasis(children) => out.push_str(&format!("_{}_", inline_text(children))),
            Node::Strong(children) => out.push_str(&format!("*{}*", inline_text(children))),
            Node::Strikethrough(children) => out.push_str(&format!("~{}~", inline_text(children))),
            Node::Link { href, children, .. } => {
                let label = inline_text(children);
                if href.is_empty() || label == *href {
                    out.push_str(&label);
                } else {
                    out.push_str(&format!("{label} <{href}>"));
                }
            }
            Node::Image { alt, .. } if alt.is_empty() => out.push_str("[image]"),
            Node::Image { alt, .. } => out.push_str(&format!("[image: {alt}]")),
            Node::LineBreak => out.push('\n'),
            other => out.push_str(&other.flattened_text()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::render_markdown;

    #[test]
    fn headings_show_anchor() {
        let text = to_plain_text(&render_markdown("## Section One: Overview!!\n\nBody with a [link](https://x.test)."));
        assert_eq!(
            text,
            "## Section One: Overview!!  {#section-one-overview}\n\nBody with a link <https://x.test>.\n"
        );
    }

    #[test]
    fn lists_and_tasks() {
        let text = to_plain_text(&render_markdown("- [x] signed\n- [ ] ratified\n\n2. two\n3. three"));
        assert!(text.contains("- [x] signed\n- [ ] ratified\n"));
        assert!(text.contains("2. two\n3. three\n"));
    }

    #[test]
    fn oversized_list_start_is_capped() {
        let doc = render_markdown(r#"<ol start="18446744073709551615"><li>a</li><li>b</li></ol>"#);
        let text = to_plain_text(&doc);
        assert!(text.contains("999999999. a\n1000000000. b\n"), "{text}");
    }

    #[test]
    fn list_numbering_saturates() {
        let item = |s: &str| Node::ListItem {
            checked: None,
            children: vec![Node::Paragraph(vec![Node::Text(s.to_string())])],
        };
        let doc = Document {
            blocks: vec![Node::List {
                ordered: true,
                start: Some(u64::MAX),
                items: vec![item("a"), item("b")],
            }],
        };
        let text = to_plain_text(&doc);
        assert!(text.contains(&format!("{}. a\n{}. b\n", u64::MAX, u64::MAX)), "{text}");
    }

    #[test]
    fn placeholder_text() {
        assert_eq!(to_plain_text(&render_markdown("")), "Content not available.\n");
    }
}
