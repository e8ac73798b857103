use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tracing::{debug, info};

use card_common::api::AiAssistApi;
use card_common::model::{
    BiasJudgeRequest, ContextFile, CopilotRequest, CreateCardFormData, MAX_QUESTION_CHARS,
    MIN_BIAS_CONTENT_CHARS, MIN_COPILOT_CONTEXT_CHARS,
};
use card_render::{normalize_newlines, render_markdown, to_html, to_plain_text};
use card_store::{CardError, CardPage, CardStore, Debouncer, StoreState};

use crate::page;

/// Exit status for a card that does not exist.
const NOT_FOUND: u8 = 2;

const RETRY_HINT: &str = "the backend may be temporarily unavailable; run the command again to retry";

pub async fn list(store: &CardStore, title: Option<&str>) -> anyhow::Result<ExitCode> {
    if let Err(e) = store.fetch_cards(title).await {
        return Ok(report(&e));
    }
    print!("{}", page::card_list(&store.state().cards));
    Ok(ExitCode::SUCCESS)
}

pub async fn show(store: &CardStore, id: &str, html: bool) -> anyhow::Result<ExitCode> {
    match store.load_card(id).await {
        CardPage::Loaded(card) => {
            let out = if html {
                page::card_html(&card)
            } else {
                page::card_text(&card)
            };
            print!("{out}");
            Ok(ExitCode::SUCCESS)
        }
        CardPage::NotFound(id) => {
            eprintln!("card not found: {id}");
            Ok(ExitCode::from(NOT_FOUND))
        }
        CardPage::Failed(message) => {
            eprintln!("error: {message}");
            Ok(ExitCode::FAILURE)
        }
    }
}

pub async fn render(path: &str, html: bool) -> anyhow::Result<ExitCode> {
    let source = if path == "-" {
        let mut buf = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buf)
            .await
            .context("failed to read stdin")?;
        buf
    } else {
        tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {path}"))?
    };

    let doc = render_markdown(&source);
    debug!(blocks = doc.blocks.len(), headings = doc.outline().len(), "rendered document");
    if html {
        print!("{}", to_html(&doc));
    } else {
        print!("{}", to_plain_text(&doc));
    }
    Ok(ExitCode::SUCCESS)
}

pub async fn create(
    store: &CardStore,
    form: CreateCardFormData,
    context_file: Option<&Path>,
) -> anyhow::Result<ExitCode> {
    let mut form = form;
    if let Some(path) = context_file {
        match ContextFile::from_path(path).await {
            Ok(file) => form.context_file = Some(file),
            Err(e) => return Ok(report(&CardError::from(e))),
        }
    }

    store.open_dialog();
    match store.create_card(&form).await {
        Ok(card) => {
            println!("created {}  {}", card.id, card.title);
            let state = store.state();
            if let Some(error) = &state.error {
                eprintln!("warning: {error}");
            }
            print!("{}", page::card_list(&state.cards));
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => Ok(report(&e)),
    }
}

/// Read queries from stdin and fetch after each pause in typing.
pub async fn search(store: CardStore, debounce: Duration) -> anyhow::Result<ExitCode> {
    let mut updates = store.subscribe();
    let printer = tokio::spawn(async move {
        let mut last: Option<StoreState> = None;
        while updates.changed().await.is_ok() {
            let state = updates.borrow_and_update().clone();
            if state.is_loading {
                continue;
            }
            let unchanged = last
                .as_ref()
                .is_some_and(|prev| prev.cards == state.cards && prev.error == state.error);
            if unchanged {
                continue;
            }
            match &state.error {
                Some(error) => eprintln!("error: {error}"),
                None => print!("{}", page::card_list(&state.cards)),
            }
            last = Some(state);
        }
    });

    let mut debouncer = Debouncer::new(debounce);
    debug!(delay_ms = debouncer.delay().as_millis(), "reading search terms from stdin");
    let mut last_query = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let query = line.trim().to_string();
        debug!(query = %query, "search input");
        last_query = Some(query.clone());
        let store = store.clone();
        debouncer.schedule(async move {
            let _ = store.fetch_cards(Some(query.as_str())).await;
        });
    }

    // Input ended: run a still-waiting search now instead of dropping it.
    if debouncer.is_pending() {
        debouncer.cancel();
        let _ = store.fetch_cards(last_query.as_deref()).await;
    }
    drop(debouncer);

    let mut idle = store.subscribe();
    let _ = idle.wait_for(|s| !s.is_loading).await;
    drop(idle);
    drop(store);
    let _ = printer.await;
    info!("search finished");
    Ok(ExitCode::SUCCESS)
}

pub async fn ask<A: AiAssistApi>(
    store: &CardStore,
    ai: &A,
    id: &str,
    question: String,
) -> anyhow::Result<ExitCode> {
    let question = question.trim().to_string();
    let length = question.chars().count();
    if length == 0 || length > MAX_QUESTION_CHARS {
        eprintln!("question must be 1 to {MAX_QUESTION_CHARS} characters");
        return Ok(ExitCode::FAILURE);
    }

    let card = match store.load_card(id).await {
        CardPage::Loaded(card) => card,
        other => return Ok(report_page(other)),
    };
    let request = CopilotRequest {
        question,
        context: normalize_newlines(&card.description),
    };
    if request.context.trim().chars().count() < MIN_COPILOT_CONTEXT_CHARS {
        eprintln!("card {id} has too little content to answer questions about");
        return Ok(ExitCode::FAILURE);
    }
    match ai.ask_copilot(&request).await {
        Ok(response) => {
            println!("{}", response.answer.trim_end());
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => Ok(report(&CardError::from(e))),
    }
}

pub async fn bias<A: AiAssistApi>(store: &CardStore, ai: &A, id: &str) -> anyhow::Result<ExitCode> {
    let card = match store.load_card(id).await {
        CardPage::Loaded(card) => card,
        other => return Ok(report_page(other)),
    };
    let request = BiasJudgeRequest {
        blog_content: normalize_newlines(&card.description),
    };
    if request.blog_content.trim().chars().count() < MIN_BIAS_CONTENT_CHARS {
        eprintln!("card {id} is too short to judge (at least {MIN_BIAS_CONTENT_CHARS} characters)");
        return Ok(ExitCode::FAILURE);
    }
    match ai.judge_bias(&request).await {
        Ok(verdict) => {
            println!("bias score: {:.0}/100", verdict.bias_score.clamp(0.0, 100.0));
            println!("{}", verdict.explanation.trim_end());
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => Ok(report(&CardError::from(e))),
    }
}

fn report(err: &CardError) -> ExitCode {
    debug!(error = %err, "command failed");
    for line in failure_lines(err) {
        eprintln!("{line}");
    }
    match err {
        CardError::NotFound(_) => ExitCode::from(NOT_FOUND),
        _ => ExitCode::FAILURE,
    }
}

/// What a failed command prints to stderr.
fn failure_lines(err: &CardError) -> Vec<String> {
    let mut lines = Vec::new();
    match err {
        CardError::Validation(errors) => {
            lines.push(err.user_message().to_string());
            for (field, message) in errors.iter() {
                lines.push(format!("  {field}: {message}"));
            }
        }
        CardError::NotFound(id) => lines.push(format!("card not found: {id}")),
        CardError::Network(_) | CardError::Unknown(_) => {
            lines.push(format!("error: {}", err.user_message()));
        }
    }
    if err.is_recoverable() {
        lines.push(RETRY_HINT.to_string());
    }
    lines
}

fn report_page(page: CardPage) -> ExitCode {
    match page {
        CardPage::NotFound(id) => {
            eprintln!("card not found: {id}");
            ExitCode::from(NOT_FOUND)
        }
        CardPage::Failed(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
        CardPage::Loaded(_) => ExitCode::SUCCESS,
    }
}

#[cfg(test)]
mod tests {
    use card_store::{FormField, ValidationErrors};

    use super::*;

    #[test]
    fn network_failures_suggest_retry() {
        let lines = failure_lines(&CardError::Network("connection refused".into()));
        assert_eq!(
            lines,
            vec![
                "error: Could not reach the card service. Check your connection and try again.".to_string(),
                RETRY_HINT.to_string(),
            ]
        );
    }

    #[test]
    fn other_failures_do_not_suggest_retry() {
        let mut errors = ValidationErrors::new();
        errors.add(FormField::Title, "required");
        let lines = failure_lines(&CardError::Validation(errors));
        assert_eq!(lines.last().map(String::as_str), Some("  title: required"));

        let lines = failure_lines(&CardError::NotFound("42".into()));
        assert_eq!(lines, vec!["card not found: 42".to_string()]);

        let lines = failure_lines(&CardError::Unknown("boom".into()));
        assert!(!lines.contains(&RETRY_HINT.to_string()));
    }
}
