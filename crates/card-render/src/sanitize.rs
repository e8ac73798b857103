//! Raw-markup sanitizer.
//!
//! Raw HTML embedded in a card body is tokenized here and filtered through an
//! allowlist before the tree builder sees it:
//!
//! - elements that can execute code or load active content are dropped along
//!   with everything inside them
//! - elements that map onto a [`crate::Node`] kind are kept as that kind
//! - any other element is unwrapped: the tag goes, its text stays
//! - comments, doctypes and processing instructions are dropped
//! - event-handler (`on*`) and `style` attributes are never retained, and
//!   URL attributes with executable schemes are blanked
use std::cell::{Cell, RefCell};

use html5ever::tendril::StrTendril;
use html5ever::tokenizer::states::RawKind;
use html5ever::tokenizer::{
    BufferQueue, Tag, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts,
};
use tracing::debug;

/// Elements removed together with their content.
const DROPPED_ELEMENTS: &[&str] = &[
    "script", "style", "iframe", "object", "embed", "frame", "frameset", "applet", "link", "meta",
    "base", "form", "input", "button", "textarea", "select", "option", "noscript", "template",
    "svg", "math", "title", "xmp", "noembed", "noframes", "plaintext", "audio", "video", "canvas",
];

/// Elements whose body is raw text: nothing inside is markup.
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "textarea", "title", "xmp", "iframe", "noembed", "noframes", "noscript",
];

fn raw_kind(tag: &str) -> RawKind {
    match tag {
        "script" => RawKind::ScriptData,
        "textarea" | "title" => RawKind::Rcdata,
        _ => RawKind::Rawtext,
    }
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Attributes that carry a URL and get scheme-checked.
const URL_ATTRIBUTES: &[&str] = &["href", "src", "cite", "action", "formaction", "poster", "background"];

/// How a raw element is represented in the node tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Heading(u8),
    Paragraph,
    List { ordered: bool },
    ListItem,
    Table,
    TableHead,
    TableRow,
    TableCell { header: bool },
    BlockQuote,
    Pre,
    Code,
    Image,
    Link,
    Emphasis,
    Strong,
    Strikethrough,
    Rule,
    LineBreak,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagPolicy {
    Map(ElementKind),
    Unwrap,
    Drop,
}

/// Decide what happens to an element, by lowercase tag name.
pub fn policy_for(tag: &str) -> TagPolicy {
    if DROPPED_ELEMENTS.contains(&tag) {
        return TagPolicy::Drop;
    }
    let kind = match tag {
        "h1" => ElementKind::Heading(1),
        "h2" => ElementKind::Heading(2),
        "h3" => ElementKind::Heading(3),
        "h4" => ElementKind::Heading(4),
        "h5" => ElementKind::Heading(5),
        "h6" => ElementKind::Heading(6),
        "p" => ElementKind::Paragraph,
        "ul" => ElementKind::List { ordered: false },
        "ol" => ElementKind::List { ordered: true },
        "li" => ElementKind::ListItem,
        "table" => ElementKind::Table,
        "thead" => ElementKind::TableHead,
        "tr" => ElementKind::TableRow,
        "th" => ElementKind::TableCell { header: true },
        "td" => ElementKind::TableCell { header: false },
        "blockquote" => ElementKind::BlockQuote,
        "pre" => ElementKind::Pre,
        "code" | "kbd" | "samp" | "tt" => ElementKind::Code,
        "img" => ElementKind::Image,
        "a" => ElementKind::Link,
        "em" | "i" | "cite" | "var" => ElementKind::Emphasis,
        "strong" | "b" => ElementKind::Strong,
        "del" | "s" | "strike" => ElementKind::Strikethrough,
        "hr" => ElementKind::Rule,
        "br" => ElementKind::LineBreak,
        _ => return TagPolicy::Unwrap,
    };
    TagPolicy::Map(kind)
}

pub fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

/// A start tag that survived attribute filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartTag {
    /// Lowercase tag name.
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub self_closing: bool,
}

impl StartTag {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HtmlToken {
    Start(StartTag),
    /// Lowercase tag name.
    End(String),
    Text(String),
}

/// Tokenize a fragment of raw HTML.
///
/// Comments and declarations are dropped. A raw-text element such as
/// `script` that is closed within `html` is skipped entirely, body included.
/// Character references are decoded in text and attribute values.
pub fn tokenize(html: &str) -> Vec<HtmlToken> {
    let tokenizer = Tokenizer::new(FragmentSink::default(), TokenizerOpts::default());
    let queue = BufferQueue::default();
    queue.push_back(StrTendril::from_slice(html));
    let _ = tokenizer.feed(&queue);
    tokenizer.end();
    tokenizer.sink.tokens.take()
}

#[derive(Default)]
struct FragmentSink {
    tokens: RefCell<Vec<HtmlToken>>,
    /// Index of the start token of the open raw-text element.
    raw_start: Cell<Option<usize>>,
}

impl FragmentSink {
    fn start_tag(&self, tag: Tag) -> TokenSinkResult<()> {
        let name = tag.name.to_string();
        let attrs = sanitize_attributes(
            &name,
            tag.attrs
                .into_iter()
                .map(|attr| (attr.name.local.to_string(), attr.value.to_string())),
        );
        let raw_text = RAW_TEXT_ELEMENTS.contains(&name.as_str()) && !tag.self_closing;
        let kind = raw_kind(&name);

        let mut tokens = self.tokens.borrow_mut();
        if raw_text {
            self.raw_start.set(Some(tokens.len()));
        }
        tokens.push(HtmlToken::Start(StartTag {
            name,
            attrs,
            self_closing: tag.self_closing,
        }));

        // Inline markup arrives one tag at a time, so the closing tag may
        // live in a later fragment. Then the start tag stays and the tree
        // builder suppresses what follows.
        if raw_text {
            TokenSinkResult::RawData(kind)
        } else {
            TokenSinkResult::Continue
        }
    }

    fn end_tag(&self, tag: Tag) {
        let name = tag.name.to_string();
        let mut tokens = self.tokens.borrow_mut();
        if let Some(start) = self.raw_start.take() {
            debug!(tag = %name, "dropping raw-text element and its content");
            tokens.truncate(start);
            return;
        }
        tokens.push(HtmlToken::End(name));
    }

    fn text(&self, text: &str) {
        let mut tokens = self.tokens.borrow_mut();
        if let Some(HtmlToken::Text(prev)) = tokens.last_mut() {
            prev.push_str(text);
        } else {
            tokens.push(HtmlToken::Text(text.to_string()));
        }
    }
}

impl TokenSink for FragmentSink {
    type Handle = ();

    fn process_token(&self, token: Token, _line_number: u64) -> TokenSinkResult<()> {
        match token {
            Token::TagToken(tag) => match tag.kind {
                TagKind::StartTag => return self.start_tag(tag),
                TagKind::EndTag => self.end_tag(tag),
            },
            Token::CharacterTokens(text) => self.text(&text),
            Token::CommentToken(_) | Token::DoctypeToken(_) => {
                debug!("dropping comment or declaration");
            }
            _ => {}
        }
        TokenSinkResult::Continue
    }
}

fn sanitize_attributes(
    tag: &str,
    raw: impl IntoIterator<Item = (String, String)>,
) -> Vec<(String, String)> {
    let mut attrs = Vec::new();
    for (name, value) in raw {
        if name.starts_with("on") || name == "style" || name == "srcdoc" {
            debug!(tag, attribute = %name, "dropping unsafe attribute");
            continue;
        }
        if URL_ATTRIBUTES.contains(&name.as_str()) {
            let allow_data_image = tag == "img" && name == "src";
            let safe = safe_url(&value, allow_data_image);
            if safe.is_empty() && !value.trim().is_empty() {
                debug!(tag, attribute = %name, "blanking unsafe url");
            }
            attrs.push((name, safe));
            continue;
        }
        attrs.push((name, value));
    }
    attrs
}

/// Return `url` if its scheme is safe to navigate to, otherwise an empty string.
///
/// Relative URLs and fragments pass. Absolute URLs must be `http`, `https`,
/// `mailto` or `tel`; `data:image/...` passes only when `allow_data_image`.
pub fn safe_url(url: &str, allow_data_image: bool) -> String {
    let trimmed = url.trim();
    // Browsers ignore embedded whitespace and control characters in schemes.
    let compact: String = trimmed
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();

    let scheme_end = compact.find(':');
    let path_start = compact.find(['/', '?', '#']);
    let scheme = match (scheme_end, path_start) {
        (Some(colon), Some(slash)) if slash < colon => None,
        (Some(colon), _) => Some(&compact[..colon]),
        (None, _) => None,
    };

    match scheme {
        None => trimmed.to_string(),
        Some("http" | "https" | "mailto" | "tel") => trimmed.to_string(),
        Some("data") if allow_data_image && compact.starts_with("data:image/") => trimmed.to_string(),
        Some(_) => String::new(),
    }
}
