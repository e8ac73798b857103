//! HTML presentation of a rendered document.
use crate::node::{Code, Document, Node};

/// Attributes every link carries: a new browsing context with no opener or referrer.
const LINK_ISOLATION: &str = r#" target="_blank" rel="noopener noreferrer""#;

/// Map a document to an HTML fragment.
///
/// Text and attribute values are escaped. Headings expose their anchor as
/// `id` so they can be deep-linked, even when the anchor is empty.
pub fn to_html(doc: &Document) -> String {
    let mut out = String::new();
    for block in &doc.blocks {
        write_node(block, &mut out);
    }
    out
}

fn write_children(children: &[Node], out: &mut String) {
    for child in children {
        write_node(child, out);
    }
}

fn write_node(node: &Node, out: &mut String) {
    match node {
        Node::Heading {
            level,
            anchor,
            children,
        } => {
            out.push_str(&format!("<h{level} id=\"{}\">", escape_html(anchor)));
            write_children(children, out);
            out.push_str(&format!("</h{level}>\n"));
        }
        Node::Paragraph(children) => wrap("p", children, out, true),
        Node::List {
            ordered,
            start,
            items,
        } => {
            if *ordered {
                match start {
                    Some(n) if *n != 1 => out.push_str(&format!("<ol start=\"{n}\">\n")),
                    _ => out.push_str("<ol>\n"),
                }
                write_children(items, out);
                out.push_str("</ol>\n");
            } else {
                out.push_str("<ul>\n");
                write_children(items, out);
                out.push_str("</ul>\n");
            }
        }
        Node::ListItem { checked, children } => {
            out.push_str("<li>");
            match checked {
                Some(true) => out.push_str(r#"<input type="checkbox" checked disabled> "#),
                Some(false) => out.push_str(r#"<input type="checkbox" disabled> "#),
                None => {}
            }
            write_children(children, out);
            out.push_str("</li>\n");
        }
        Node::Table { head, rows } => {
            out.push_str("<table>\n");
            if !head.is_empty() {
                out.push_str("<thead>\n<tr>");
                write_children(head, out);
                out.push_str("</tr>\n</thead>\n");
            }
            if !rows.is_empty() {
                out.push_str("<tbody>\n");
                for row in rows {
                    out.push_str("<tr>");
                    write_children(row, out);
                    out.push_str("</tr>\n");
                }
                out.push_str("</tbody>\n");
            }
            out.push_str("</table>\n");
        }
        Node::TableCell { header, children } => {
            let tag = if *header { "th" } else { "td" };
            wrap(tag, children, out, false);
        }
        Node::BlockQuote(children) => {
            out.push_str("<blockquote>\n");
            write_children(children, out);
            out.push_str("</blockquote>\n");
        }
        Node::Code(Code::Inline(code)) => {
            out.push_str("<code>");
            out.push_str(&escape_html(code));
            out.push_str("</code>");
        }
        Node::Code(Code::Block { language, content }) => {
            match language {
                Some(lang) => out.push_str(&format!(
                    "<pre><code class=\"language-{}\">",
                    escape_html(lang)
                )),
                None => out.push_str("<pre><code>"),
            }
            out.push_str(&escape_html(content));
            out.push_str("</code></pre>\n");
        }
        Node::Image {
            src,
            alt,
            title,
            lazy,
        } => {
            out.push_str(&format!(
                "<img src=\"{}\" alt=\"{}\"",
                escape_html(src),
                escape_html(alt)
            ));
            if let Some(title) = title {
                out.push_str(&format!(" title=\"{}\"", escape_html(title)));
            }
            if *lazy {
                out.push_str(r#" loading="lazy""#);
            }
            out.push('>');
        }
        Node::Link {
            href,
            title,
            children,
        } => {
            out.push_str(&format!("<a href=\"{}\"", escape_html(href)));
            if let Some(title) = title {
                out.push_str(&format!(" title=\"{}\"", escape_html(title)));
            }
            out.push_str(LINK_ISOLATION);
            out.push('>');
            write_children(children, out);
            out.push_str("</a>");
        }
        Node::Text(text) => out.push_str(&escape_html(text)),
        Node::LineBreak => out.push_str("<br>\n"),
        Node::Rule => out.push_str("<hr>\n"),
        Node::Emphasis(children) => wrap("em", children, out, false),
        Node::Strong(children) => wrap("strong", children, out, false),
        Node::Strikethrough(children) => wrap("del", children, out, false),
        Node::Placeholder(message) => {
            out.push_str("<p class=\"content-unavailable\">");
            out.push_str(&escape_html(message));
            out.push_str("</p>\n");
        }
    }
}

fn wrap(tag: &str, children: &[Node], out: &mut String, block: bool) {
    out.push_str(&format!("<{tag}>"));
    write_children(children, out);
    out.push_str(&format!("</{tag}>"));
    if block {
        out.push('\n');
    }
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
