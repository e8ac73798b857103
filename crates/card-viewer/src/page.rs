//! Card page composition: title, keyword tags and rendered body.

use card_common::model::Card;
use card_render::{escape_html, render_markdown, to_html, to_plain_text};

pub fn card_html(card: &Card) -> String {
    let body = to_html(&render_markdown(&card.description));
    let mut out = String::from("<article class=\"card\">\n");
    out.push_str(&format!("<h1>{}</h1>\n", escape_html(&card.title)));
    if !card.keywords.is_empty() {
        out.push_str("<ul class=\"keywords\">\n");
        for keyword in &card.keywords {
            out.push_str(&format!("<li class=\"tag\">{}</li>\n", escape_html(keyword)));
        }
        out.push_str("</ul>\n");
    }
    out.push_str(&body);
    out.push_str("</article>\n");
    out
}

pub fn card_text(card: &Card) -> String {
    let doc = render_markdown(&card.description);
    let mut out = format!("{}\n{}\n", card.title, "=".repeat(card.title.chars().count()));
    if !card.keywords.is_empty() {
        out.push_str(&format!("tags: {}\n", card.keywords.join(", ")));
    }

    let outline = doc.outline();
    if outline.len() > 1 {
        out.push_str("\ncontents:\n");
        for entry in &outline {
            let indent = "  ".repeat(usize::from(entry.level.saturating_sub(1)));
            out.push_str(&format!("{indent}- {} (#{})\n", entry.text, entry.anchor));
        }
    }

    out.push('\n');
    out.push_str(&to_plain_text(&doc));
    out
}

/// One line per card: id, title and tags.
pub fn card_list(cards: &[Card]) -> String {
    if cards.is_empty() {
        return "no cards\n".to_string();
    }
    let mut out = String::new();
    for card in cards {
        out.push_str(&format!("{}  {}", card.id, card.title));
        if !card.keywords.is_empty() {
            out.push_str(&format!("  [{}]", card.keywords.join(", ")));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn treaty() -> Card {
        Card {
            id: "7f1c".to_string(),
            title: "Treaty of <X>".to_string(),
            description: "## Background\\n\\nSigned in 1648.\\n\\n## Terms\\n\\nSee [text](https://example.org).".to_string(),
            keywords: vec!["diplomacy".to_string(), "1648".to_string()],
        }
    }

    #[test]
    fn html_page_has_title_tags_and_body() {
        let html = card_html(&treaty());
        assert!(html.starts_with("<article class=\"card\">\n<h1>Treaty of &lt;X&gt;</h1>\n"));
        assert!(html.contains("<li class=\"tag\">diplomacy</li>"));
        assert!(html.contains("<h2 id=\"background\">Background</h2>"));
        assert!(html.contains(r#"target="_blank" rel="noopener noreferrer""#));
        assert!(html.ends_with("</article>\n"));
    }

    #[test]
    fn html_page_for_empty_body_shows_placeholder() {
        let card = Card {
            description: "  ".to_string(),
            keywords: vec![],
            ..treaty()
        };
        let html = card_html(&card);
        assert!(html.contains("content-unavailable"));
        assert!(!html.contains("keywords"));
    }

    #[test]
    fn text_page_lists_outline() {
        let text = card_text(&treaty());
        assert!(text.starts_with("Treaty of <X>\n=============\ntags: diplomacy, 1648\n"));
        assert!(text.contains("  - Background (#background)\n  - Terms (#terms)\n"));
        assert!(text.contains("Signed in 1648."));
    }

    #[test]
    fn list_lines() {
        assert_eq!(card_list(&[]), "no cards\n");
        assert_eq!(card_list(&[treaty()]), "7f1c  Treaty of <X>  [diplomacy, 1648]\n");
    }
}
