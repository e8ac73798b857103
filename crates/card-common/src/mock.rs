//! In-memory [`CardApi`] with canned responses, for tests and offline demos.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use reqwest::StatusCode;
use tokio::sync::oneshot;

use crate::api::CardApi;
use crate::error::ApiError;
use crate::model::{Card, CreateCardFormData};

/// Mock backend.
///
/// Without scripting, `list_cards` serves the stored cards (filtered by a
/// case-insensitive title substring) and `create_card` appends a generated
/// card. Scripted list responses are served first, in order, and may be
/// held open until the returned sender fires, which lets tests control the
/// order in which overlapping calls resolve.
#[derive(Clone, Default)]
pub struct MockCardApi {
    state: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    cards: Vec<Card>,
    list_script: VecDeque<ScriptedList>,
    create_failure: Option<String>,
    create_gate: Option<oneshot::Receiver<()>>,
    list_filters: Vec<Option<String>>,
    get_calls: usize,
    created: Vec<CreateCardFormData>,
}

struct ScriptedList {
    response: Result<Vec<Card>, String>,
    gate: Option<oneshot::Receiver<()>>,
}

impl MockCardApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cards(cards: Vec<Card>) -> Self {
        let api = Self::new();
        api.lock().cards = cards;
        api
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue a list response that is returned immediately.
    pub fn script_list(&self, response: Result<Vec<Card>, String>) {
        self.lock().list_script.push_back(ScriptedList {
            response,
            gate: None,
        });
    }

    /// Queue a list response that resolves only once the returned sender fires
    /// (or is dropped).
    pub fn hold_list(&self, response: Result<Vec<Card>, String>) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.lock().list_script.push_back(ScriptedList {
            response,
            gate: Some(rx),
        });
        tx
    }

    /// Hold the next `create_card` until the returned sender fires (or is dropped).
    pub fn hold_create(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.lock().create_gate = Some(rx);
        tx
    }

    /// Make every following `create_card` fail with the given detail.
    pub fn fail_creates(&self, detail: impl Into<String>) {
        self.lock().create_failure = Some(detail.into());
    }

    pub fn list_calls(&self) -> usize {
        self.lock().list_filters.len()
    }

    pub fn list_filters(&self) -> Vec<Option<String>> {
        self.lock().list_filters.clone()
    }

    pub fn get_calls(&self) -> usize {
        self.lock().get_calls
    }

    pub fn created(&self) -> Vec<CreateCardFormData> {
        self.lock().created.clone()
    }
}

#[async_trait]
impl CardApi for MockCardApi {
    async fn list_cards(&self, title: Option<&str>) -> Result<Vec<Card>, ApiError> {
        let scripted = {
            let mut state = self.lock();
            state.list_filters.push(title.map(str::to_string));
            match state.list_script.pop_front() {
                Some(scripted) => scripted,
                None => {
                    let needle = title.unwrap_or_default().to_lowercase();
                    let cards = state
                        .cards
                        .iter()
                        .filter(|c| c.title.to_lowercase().contains(&needle))
                        .cloned()
                        .collect();
                    return Ok(cards);
                }
            }
        };

        if let Some(gate) = scripted.gate {
            let _ = gate.await;
        }
        scripted.response.map_err(|detail| ApiError::Backend {
            status: StatusCode::SERVICE_UNAVAILABLE,
            detail,
        })
    }

    async fn get_card(&self, id: &str) -> Result<Card, ApiError> {
        let mut state = self.lock();
        state.get_calls += 1;
        state
            .cards
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(id.to_string()))
    }

    async fn create_card(&self, form: &CreateCardFormData) -> Result<Card, ApiError> {
        let gate = {
            let mut state = self.lock();
            state.created.push(form.clone());
            state.create_gate.take()
        };
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        let mut state = self.lock();
        if let Some(detail) = &state.create_failure {
            return Err(ApiError::Backend {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                detail: detail.clone(),
            });
        }
        let card = Card {
            id: format!("mock-{}", state.created.len()),
            title: form.title.clone(),
            description: format!("# {}\\n\\n{}", form.title, form.topics_to_cover),
            keywords: vec!["generated".to_string()],
        };
        state.cards.push(card.clone());
        Ok(card)
    }
}
