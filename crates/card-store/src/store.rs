//! Client state store.
//!
//! One [`CardStore`] is built at start-up and cloned into every consumer.
//! State lives in a `watch` channel: each operation applies its changes in a
//! single `send_modify`, so subscribers are notified once per step and never
//! observe a half-applied update.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use card_common::api::CardApi;
use card_common::model::{Card, CreateCardFormData};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::dialog::{DialogEvent, DialogState};
use crate::error::CardError;
use crate::validation::validate_form;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreOptions {
    /// Ignore list results from a `fetch_cards` call that was superseded by a
    /// later one. Off by default: the last call to resolve wins.
    pub discard_stale_fetches: bool,
}

impl StoreOptions {
    pub fn from_env() -> Self {
        let discard_stale_fetches = std::env::var("CARDS_DISCARD_STALE_FETCHES")
            .ok()
            .and_then(|v| parse_flag(&v))
            .unwrap_or(false);
        Self {
            discard_stale_fetches,
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Snapshot of everything the UI renders from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreState {
    pub cards: Vec<Card>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub dialog: DialogState,
    pub submit_error: Option<String>,
}

impl StoreState {
    pub fn is_dialog_open(&self) -> bool {
        self.dialog.is_open()
    }

    pub fn is_submitting(&self) -> bool {
        self.dialog.is_submitting()
    }

    fn apply(&mut self, event: DialogEvent) {
        self.dialog = self.dialog.on(event);
    }
}

/// Outcome of loading a single card for its detail page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardPage {
    Loaded(Card),
    NotFound(String),
    Failed(String),
}

#[derive(Clone)]
pub struct CardStore {
    inner: Arc<Inner>,
}

struct Inner {
    api: Arc<dyn CardApi>,
    state: watch::Sender<StoreState>,
    options: StoreOptions,
    fetch_seq: AtomicU64,
}

impl CardStore {
    pub fn new(api: Arc<dyn CardApi>) -> Self {
        Self::with_options(api, StoreOptions::default())
    }

    pub fn with_options(api: Arc<dyn CardApi>, options: StoreOptions) -> Self {
        let (state, _) = watch::channel(StoreState::default());
        Self {
            inner: Arc::new(Inner {
                api,
                state,
                options,
                fetch_seq: AtomicU64::new(0),
            }),
        }
    }

    pub fn options(&self) -> StoreOptions {
        self.inner.options
    }

    /// Current state.
    pub fn state(&self) -> StoreState {
        self.inner.state.borrow().clone()
    }

    /// Receive every published state.
    pub fn subscribe(&self) -> watch::Receiver<StoreState> {
        self.inner.state.subscribe()
    }

    /// Replace `cards` with the backend listing, optionally filtered by title.
    ///
    /// Overlapping calls are not sequenced unless
    /// [`StoreOptions::discard_stale_fetches`] is set. A blank filter lists
    /// everything.
    pub async fn fetch_cards(&self, title: Option<&str>) -> Result<(), CardError> {
        let title = title.map(str::trim).filter(|t| !t.is_empty());
        let seq = self.inner.fetch_seq.fetch_add(1, Ordering::SeqCst) + 1;

        self.inner.state.send_modify(|s| {
            s.is_loading = true;
            s.error = None;
        });
        debug!(seq, title = title.unwrap_or_default(), "fetching cards");

        let result = self.inner.api.list_cards(title).await;

        if self.inner.options.discard_stale_fetches
            && self.inner.fetch_seq.load(Ordering::SeqCst) != seq
        {
            debug!(seq, "discarding superseded card listing");
            return Ok(());
        }

        match result {
            Ok(cards) => {
                debug!(seq, count = cards.len(), "cards fetched");
                self.inner.state.send_modify(|s| {
                    s.cards = cards;
                    s.is_loading = false;
                    s.error = None;
                });
                Ok(())
            }
            Err(e) => {
                let err = CardError::from(e);
                warn!(seq, error = %err, "failed to fetch cards");
                let message = err.user_message().to_string();
                self.inner.state.send_modify(|s| {
                    s.is_loading = false;
                    s.error = Some(message);
                });
                Err(err)
            }
        }
    }

    /// Submit the create form.
    ///
    /// Invalid forms never reach the backend. On success the dialog closes and
    /// the list is refreshed from the backend once; the created card is
    /// returned. On failure the dialog stays as it is, with `submit_error` set.
    pub async fn create_card(&self, form: &CreateCardFormData) -> Result<Card, CardError> {
        if let Err(errors) = validate_form(form) {
            debug!(%errors, "create blocked by validation");
            let err = CardError::from(errors);
            let message = err.user_message().to_string();
            self.inner.state.send_modify(|s| s.submit_error = Some(message));
            return Err(err);
        }

        self.inner.state.send_modify(|s| {
            s.apply(DialogEvent::Submit);
            s.submit_error = None;
        });
        info!(title = %form.title, attachment = form.context_file.is_some(), "creating card");

        match self.inner.api.create_card(form).await {
            Ok(card) => {
                info!(card_id = %card.id, "card created");
                self.inner.state.send_modify(|s| {
                    s.apply(DialogEvent::Succeeded);
                    s.submit_error = None;
                });
                if let Err(e) = self.fetch_cards(None).await {
                    debug!(error = %e, "refresh after create failed");
                }
                Ok(card)
            }
            Err(e) => {
                let err = CardError::from(e);
                warn!(error = %err, "failed to create card");
                let message = err.user_message().to_string();
                self.inner.state.send_modify(|s| {
                    s.apply(DialogEvent::Failed);
                    s.submit_error = Some(message);
                });
                Err(err)
            }
        }
    }

    /// Open the create dialog on a clean form.
    pub fn open_dialog(&self) {
        self.inner.state.send_modify(|s| {
            reset_create_state(s);
            s.apply(DialogEvent::Open);
        });
    }

    /// Close the dialog. A create call still in flight keeps running.
    pub fn close_dialog(&self) {
        self.inner.state.send_modify(|s| {
            s.apply(DialogEvent::Close);
            s.submit_error = None;
        });
    }

    /// Clear `submit_error` and the submitting flag, leaving visibility alone.
    pub fn reset_create_card_state(&self) {
        self.inner.state.send_modify(reset_create_state);
    }

    /// Load one card for its detail page. Shared state is not touched.
    pub async fn load_card(&self, id: &str) -> CardPage {
        match self.inner.api.get_card(id).await.map_err(CardError::from) {
            Ok(card) => CardPage::Loaded(card),
            Err(CardError::NotFound(id)) => {
                debug!(card_id = %id, "card not found");
                CardPage::NotFound(id)
            }
            Err(err) => {
                warn!(card_id = %id, error = %err, "failed to load card");
                CardPage::Failed(err.user_message().to_string())
            }
        }
    }
}

fn reset_create_state(s: &mut StoreState) {
    s.submit_error = None;
    s.apply(DialogEvent::Reset);
}

#[cfg(test)]
mod tests {
    use card_common::mock::MockCardApi;

    use super::*;

    fn card(id: &str, title: &str) -> Card {
        Card {
            id: id.to_string(),
            title: title.to_string(),
            description: format!("# {title}"),
            keywords: vec![],
        }
    }

    fn treaty() -> CreateCardFormData {
        CreateCardFormData {
            title: "Treaty of X".to_string(),
            system_prompt: "...".to_string(),
            topics_to_cover: "...".to_string(),
            context_file: None,
        }
    }

    fn store_over(api: &MockCardApi, options: StoreOptions) -> CardStore {
        CardStore::with_options(Arc::new(api.clone()), options)
    }

    fn titles(store: &CardStore) -> Vec<String> {
        store.state().cards.into_iter().map(|c| c.title).collect()
    }

    async fn wait_for_list_calls(api: &MockCardApi, n: usize) {
        while api.list_calls() < n {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn fetch_success_clears_previous_error() {
        let api = MockCardApi::with_cards(vec![card("1", "Peace of Westphalia")]);
        api.script_list(Err("database unavailable".to_string()));
        let store = store_over(&api, StoreOptions::default());

        assert!(store.fetch_cards(None).await.is_err());
        let failed = store.state();
        assert!(!failed.is_loading);
        assert!(failed.error.as_deref().is_some_and(|m| !m.is_empty()));
        assert!(failed.cards.is_empty());

        store.fetch_cards(None).await.unwrap();
        let state = store.state();
        assert!(!state.is_loading);
        assert_eq!(state.error, None);
        assert_eq!(titles(&store), ["Peace of Westphalia"]);
    }

    #[tokio::test]
    async fn fetch_passes_trimmed_filter() {
        let api = MockCardApi::with_cards(vec![card("1", "Edict of Nantes"), card("2", "Peace of Augsburg")]);
        let store = store_over(&api, StoreOptions::default());

        store.fetch_cards(Some("  nantes ")).await.unwrap();
        store.fetch_cards(Some("   ")).await.unwrap();

        assert_eq!(api.list_filters(), vec![Some("nantes".to_string()), None]);
        assert_eq!(titles(&store).len(), 2);
    }

    #[tokio::test]
    async fn overlapping_fetches_last_resolved_wins() {
        let api = MockCardApi::new();
        let first = api.hold_list(Ok(vec![card("1", "Old")]));
        let second = api.hold_list(Ok(vec![card("2", "New")]));
        let store = store_over(&api, StoreOptions::default());

        let a = tokio::spawn({
            let store = store.clone();
            async move { store.fetch_cards(Some("old")).await }
        });
        wait_for_list_calls(&api, 1).await;
        let b = tokio::spawn({
            let store = store.clone();
            async move { store.fetch_cards(Some("new")).await }
        });
        wait_for_list_calls(&api, 2).await;

        second.send(()).unwrap();
        b.await.unwrap().unwrap();
        assert_eq!(titles(&store), ["New"]);

        first.send(()).unwrap();
        a.await.unwrap().unwrap();
        assert_eq!(titles(&store), ["Old"]);
        assert!(!store.state().is_loading);
    }

    #[tokio::test]
    async fn stale_fetches_are_discarded_when_enabled() {
        let api = MockCardApi::new();
        let first = api.hold_list(Ok(vec![card("1", "Old")]));
        let second = api.hold_list(Ok(vec![card("2", "New")]));
        let store = store_over(
            &api,
            StoreOptions {
                discard_stale_fetches: true,
            },
        );
        assert!(store.options().discard_stale_fetches);

        let a = tokio::spawn({
            let store = store.clone();
            async move { store.fetch_cards(Some("old")).await }
        });
        wait_for_list_calls(&api, 1).await;
        let b = tokio::spawn({
            let store = store.clone();
            async move { store.fetch_cards(Some("new")).await }
        });
        wait_for_list_calls(&api, 2).await;

        second.send(()).unwrap();
        b.await.unwrap().unwrap();
        first.send(()).unwrap();
        a.await.unwrap().unwrap();

        assert_eq!(titles(&store), ["New"]);
        assert!(!store.state().is_loading);
    }

    #[tokio::test]
    async fn create_success_closes_dialog_and_refetches_once() {
        let api = MockCardApi::new();
        let store = store_over(&api, StoreOptions::default());

        store.open_dialog();
        let created = store.create_card(&treaty()).await.unwrap();

        assert_eq!(api.list_calls(), 1);
        let state = store.state();
        assert_eq!(state.dialog, DialogState::Closed);
        assert!(!state.is_submitting());
        assert_eq!(state.submit_error, None);
        assert!(state.cards.contains(&created));
        assert_eq!(titles(&store), ["Treaty of X"]);
    }

    #[tokio::test]
    async fn create_failure_keeps_dialog_and_sets_error() {
        let api = MockCardApi::new();
        api.fail_creates("generation failed");
        let store = store_over(&api, StoreOptions::default());

        store.open_dialog();
        let err = store.create_card(&treaty()).await.unwrap_err();
        assert!(matches!(err, CardError::Network(_)));

        let state = store.state();
        assert!(state.is_dialog_open());
        assert!(!state.is_submitting());
        assert!(state.submit_error.as_deref().is_some_and(|m| !m.is_empty()));
        assert_eq!(api.list_calls(), 0);
    }

    #[tokio::test]
    async fn create_failure_while_closed_leaves_dialog_closed() {
        let api = MockCardApi::new();
        api.fail_creates("generation failed");
        let store = store_over(&api, StoreOptions::default());

        assert!(store.create_card(&treaty()).await.is_err());
        let state = store.state();
        assert!(!state.is_dialog_open());
        assert!(state.submit_error.is_some());
        assert_eq!(api.created().len(), 1);
    }

    #[tokio::test]
    async fn invalid_form_never_reaches_backend() {
        let api = MockCardApi::new();
        let store = store_over(&api, StoreOptions::default());

        store.open_dialog();
        let form = CreateCardFormData {
            title: " ".to_string(),
            ..treaty()
        };
        let err = store.create_card(&form).await.unwrap_err();

        assert!(matches!(err, CardError::Validation(_)));
        assert!(api.created().is_empty());
        let state = store.state();
        assert_eq!(state.dialog, DialogState::Open);
        assert!(state.submit_error.is_some());
    }

    #[tokio::test]
    async fn close_during_submit_clears_flags_without_cancelling() {
        let api = MockCardApi::new();
        let release = api.hold_create();
        let store = store_over(&api, StoreOptions::default());

        store.open_dialog();
        let submit = tokio::spawn({
            let store = store.clone();
            async move { store.create_card(&treaty()).await }
        });
        while !store.state().is_submitting() {
            tokio::task::yield_now().await;
        }

        store.close_dialog();
        let closed = store.state();
        assert!(!closed.is_dialog_open());
        assert!(!closed.is_submitting());

        release.send(()).unwrap();
        submit.await.unwrap().unwrap();
        assert_eq!(titles(&store), ["Treaty of X"]);
        assert_eq!(store.state().dialog, DialogState::Closed);
    }

    #[tokio::test]
    async fn reopening_clears_stale_submit_error() {
        let api = MockCardApi::new();
        api.fail_creates("generation failed");
        let store = store_over(&api, StoreOptions::default());

        store.open_dialog();
        assert!(store.create_card(&treaty()).await.is_err());
        store.close_dialog();
        store.open_dialog();

        let state = store.state();
        assert!(state.is_dialog_open());
        assert_eq!(state.submit_error, None);
    }

    #[tokio::test]
    async fn reset_keeps_visibility() {
        let api = MockCardApi::new();
        api.fail_creates("generation failed");
        let store = store_over(&api, StoreOptions::default());

        store.open_dialog();
        assert!(store.create_card(&treaty()).await.is_err());
        store.reset_create_card_state();

        let state = store.state();
        assert!(state.is_dialog_open());
        assert!(!state.is_submitting());
        assert_eq!(state.submit_error, None);
    }

    #[tokio::test]
    async fn subscribers_see_each_operation() {
        let api = MockCardApi::new();
        let store = store_over(&api, StoreOptions::default());
        let mut rx = store.subscribe();

        store.open_dialog();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_dialog_open());

        store.close_dialog();
        rx.changed().await.unwrap();
        assert!(!rx.borrow_and_update().is_dialog_open());
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn load_card_distinguishes_not_found() {
        let api = MockCardApi::with_cards(vec![card("abc", "Edict of Nantes")]);
        let store = store_over(&api, StoreOptions::default());

        assert!(matches!(store.load_card("abc").await, CardPage::Loaded(c) if c.title == "Edict of Nantes"));
        assert_eq!(store.load_card("zzz").await, CardPage::NotFound("zzz".to_string()));
        assert_eq!(api.get_calls(), 2);
        assert_eq!(store.state(), StoreState::default());
    }

    #[test]
    fn flag_parsing() {
        assert_eq!(parse_flag(" TRUE "), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
