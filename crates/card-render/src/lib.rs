//! Card body rendering.
//!
//! Turns a generated card description (markdown with embedded raw HTML) into
//! a sanitized [`Document`] of [`Node`]s with deterministic heading anchors,
//! and maps that tree to HTML or terminal text.
//!
//! - [`slug`]: heading text to URL-safe anchor ids
//! - [`sanitize`]: raw-markup tokenizer and allowlist policy
//! - [`markdown`]: parser events to node tree
//! - [`html`] / [`text`]: presentation mappings

pub mod html;
pub mod markdown;
pub mod node;
pub mod sanitize;
pub mod slug;
pub mod text;

pub use html::{escape_html, to_html};
pub use markdown::{normalize_newlines, render_markdown};
pub use node::{Code, Document, Node, OutlineEntry, PLACEHOLDER_MESSAGE};
pub use slug::slugify;
pub use text::to_plain_text;
