use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::api::{AiAssistApi, CardApi};
use crate::error::ApiError;
use crate::model::{
    BiasJudgeRequest, BiasJudgeResponse, Card, CopilotRequest, CopilotResponse, CreateCardFormData,
};

#[derive(Clone, Debug)]
pub struct HttpCardClientConfig {
    pub base_url: String,
    pub default_timeout: Duration,
    pub create_timeout: Duration,
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub max_error_body_bytes: usize,
}

impl Default for HttpCardClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api/v1".to_string(),
            default_timeout: Duration::from_secs(30),
            create_timeout: Duration::from_secs(120),
            max_retries: 2,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_millis(2_000),
            max_error_body_bytes: 8 * 1024,
        }
    }
}

impl HttpCardClientConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let base_url = std::env::var("CARDS_API_URL").unwrap_or(defaults.base_url);

        let default_timeout = env_parse::<u64>("CARDS_API_TIMEOUT_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.default_timeout);

        let create_timeout = env_parse::<u64>("CARDS_API_CREATE_TIMEOUT_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.create_timeout);

        let max_retries = env_parse::<u32>("CARDS_API_MAX_RETRIES").unwrap_or(defaults.max_retries);

        let initial_backoff = env_parse::<u64>("CARDS_API_RETRY_INITIAL_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.initial_backoff);

        let max_backoff = env_parse::<u64>("CARDS_API_RETRY_MAX_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.max_backoff);

        let max_error_body_bytes = env_parse::<usize>("CARDS_API_MAX_ERROR_BODY_BYTES")
            .unwrap_or(defaults.max_error_body_bytes);

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            default_timeout,
            create_timeout,
            max_retries,
            initial_backoff,
            max_backoff,
            max_error_body_bytes,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse::<T>().ok())
}

/// reqwest-backed client for the card backend (`/cards` and `/ai` routes).
#[derive(Clone)]
pub struct HttpCardClient {
    config: HttpCardClientConfig,
    http: reqwest::Client,
}

impl HttpCardClient {
    pub fn new(config: HttpCardClientConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .user_agent("card-viewer/0.1")
            .build()?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &HttpCardClientConfig {
        &self.config
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = Url::parse(&self.config.base_url)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {e}", self.config.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.config.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn parse_json_response<T: for<'de> Deserialize<'de>>(
        resp: reqwest::Response,
        max_error_body_bytes: usize,
    ) -> Result<T, ApiError> {
        if resp.status().is_success() {
            let bytes = resp.bytes().await?;
            return Ok(serde_json::from_slice(&bytes)?);
        }
        Err(Self::to_backend_error(resp, max_error_body_bytes).await)
    }

    async fn to_backend_error(resp: reqwest::Response, max_error_body_bytes: usize) -> ApiError {
        let status = resp.status();
        let body = read_limited_text(resp, max_error_body_bytes).await;
        ApiError::Backend {
            status,
            detail: extract_detail(&body),
        }
    }

    async fn request_with_retry<T, Fut, F>(&self, mut f: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, ApiError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match f().await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    if attempt > self.config.max_retries || !e.is_retryable() {
                        return Err(e);
                    }
                    let delay = backoff_delay(
                        self.config.initial_backoff,
                        self.config.max_backoff,
                        attempt - 1,
                    );
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "card backend request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[async_trait]
impl CardApi for HttpCardClient {
    async fn list_cards(&self, title: Option<&str>) -> Result<Vec<Card>, ApiError> {
        let url = self.url(&["cards", ""])?;
        debug!(%url, title, "listing cards");
        self.request_with_retry(|| async {
            let mut req = self.http.get(url.clone()).timeout(self.config.default_timeout);
            if let Some(title) = title.filter(|t| !t.is_empty()) {
                req = req.query(&[("title", title)]);
            }
            let resp = req.send().await?;
            Self::parse_json_response(resp, self.config.max_error_body_bytes).await
        })
        .await
    }

    async fn get_card(&self, id: &str) -> Result<Card, ApiError> {
        let url = self.url(&["cards", id])?;
        debug!(%url, card_id = id, "fetching card");
        self.request_with_retry(|| async {
            let resp = self
                .http
                .get(url.clone())
                .timeout(self.config.default_timeout)
                .send()
                .await?;
            if resp.status() == StatusCode::NOT_FOUND {
                return Err(ApiError::NotFound(id.to_string()));
            }
            Self::parse_json_response(resp, self.config.max_error_body_bytes).await
        })
        .await
    }

    async fn create_card(&self, form: &CreateCardFormData) -> Result<Card, ApiError> {
        let url = self.url(&["cards", ""])?;
        let mut body = Form::new()
            .text("title", form.title.clone())
            .text("system_prompt", form.system_prompt.clone())
            .text("topics_to_cover", form.topics_to_cover.clone());
        if let Some(file) = &form.context_file {
            let part = Part::bytes(file.bytes.clone())
                .file_name(file.file_name.clone())
                .mime_str(&file.content_type)?;
            body = body.part("context_file", part);
        }
        debug!(
            %url,
            title = %form.title,
            attachment = form.context_file.is_some(),
            "creating card"
        );

        // Generation is not idempotent, so no retry here.
        let resp = self
            .http
            .post(url)
            .timeout(self.config.create_timeout)
            .multipart(body)
            .send()
            .await?;
        Self::parse_json_response(resp, self.config.max_error_body_bytes).await
    }
}

#[async_trait]
impl AiAssistApi for HttpCardClient {
    async fn ask_copilot(&self, request: &CopilotRequest) -> Result<CopilotResponse, ApiError> {
        let url = self.url(&["ai", "copilot"])?;
        let resp = self
            .http
            .post(url)
            .timeout(self.config.create_timeout)
            .json(request)
            .send()
            .await?;
        Self::parse_json_response(resp, self.config.max_error_body_bytes).await
    }

    async fn judge_bias(&self, request: &BiasJudgeRequest) -> Result<BiasJudgeResponse, ApiError> {
        let url = self.url(&["ai", "bias-judge"])?;
        let resp = self
            .http
            .post(url)
            .timeout(self.config.create_timeout)
            .json(request)
            .send()
            .await?;
        Self::parse_json_response(resp, self.config.max_error_body_bytes).await
    }
}

/// Pull a readable message out of a `{"detail": ...}` error body.
///
/// `detail` is a string for handled errors and an array of objects for
/// request validation failures. Anything else is returned verbatim.
fn extract_detail(body: &str) -> String {
    #[derive(Deserialize)]
    struct DetailEnvelope {
        detail: serde_json::Value,
    }

    let Ok(envelope) = serde_json::from_str::<DetailEnvelope>(body) else {
        return body.to_string();
    };
    match envelope.detail {
        serde_json::Value::String(s) => s,
        serde_json::Value::Array(items) => items
            .iter()
            .map(|item| {
                item.get("msg")
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| item.to_string())
            })
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    }
}

/// Exponential delay for retry `attempt` (0-based), capped at `max`, plus up
/// to a quarter of that as jitter.
fn backoff_delay(initial: Duration, max: Duration, attempt: u32) -> Duration {
    let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
    let capped = initial.saturating_mul(factor).min(max);
    let spread = (capped / 4).max(Duration::from_millis(1));
    capped + jitter(spread)
}

/// A clock-derived offset in `0..=spread`; good enough to desynchronise retries.
fn jitter(spread: Duration) -> Duration {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::from(d.subsec_nanos()))
        .unwrap_or(0);
    let spread_ms = u64::try_from(spread.as_millis()).unwrap_or(u64::MAX);
    Duration::from_millis(nanos % spread_ms.saturating_add(1))
}

/// Read at most `max_bytes` of an error body without buffering the rest.
async fn read_limited_text(resp: reqwest::Response, max_bytes: usize) -> String {
    let mut body: Vec<u8> = Vec::new();
    let mut chunks = resp.bytes_stream();
    while let Some(chunk) = chunks.next().await {
        match chunk {
            Ok(chunk) => {
                let room = max_bytes.saturating_sub(body.len());
                body.extend_from_slice(&chunk[..chunk.len().min(room)]);
                if body.len() >= max_bytes {
                    break;
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to read backend error body");
                if body.is_empty() {
                    return "<failed to read error body>".to_string();
                }
                break;
            }
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::extract::{Multipart, Path, Query, State};
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde::Deserialize;

    use super::*;
    use crate::model::ContextFile;

    #[derive(Default)]
    struct Backend {
        list_calls: AtomicUsize,
        fail_first_list: bool,
    }

    #[derive(Deserialize)]
    struct ListQuery {
        title: Option<String>,
    }

    fn card(id: &str, title: &str) -> Card {
        Card {
            id: id.to_string(),
            title: title.to_string(),
            description: format!("## {title}\\n\\nBody text."),
            keywords: vec!["history".to_string()],
        }
    }

    async fn list(State(backend): State<Arc<Backend>>, Query(q): Query<ListQuery>) -> axum::response::Response {
        use axum::response::IntoResponse;

        let n = backend.list_calls.fetch_add(1, Ordering::SeqCst);
        if backend.fail_first_list && n == 0 {
            return (AxumStatus::SERVICE_UNAVAILABLE, "warming up").into_response();
        }
        let all = vec![card("1", "Treaty of Westphalia"), card("2", "Congress of Vienna")];
        let cards: Vec<Card> = match q.title {
            Some(t) => all
                .into_iter()
                .filter(|c| c.title.to_lowercase().contains(&t.to_lowercase()))
                .collect(),
            None => all,
        };
        Json(cards).into_response()
    }

    async fn detail(Path(id): Path<String>) -> Result<Json<Card>, (AxumStatus, Json<serde_json::Value>)> {
        if id == "1" {
            Ok(Json(card("1", "Treaty of Westphalia")))
        } else {
            Err((
                AxumStatus::NOT_FOUND,
                Json(serde_json::json!({ "detail": format!("Card with ID {id} not found") })),
            ))
        }
    }

    async fn create(mut multipart: Multipart) -> Result<(AxumStatus, Json<Card>), (AxumStatus, Json<serde_json::Value>)> {
        let mut title = String::new();
        let mut prompt = String::new();
        let mut file_len = 0usize;
        while let Ok(Some(field)) = multipart.next_field().await {
            match field.name().unwrap_or_default().to_string().as_str() {
                "title" => title = field.text().await.unwrap_or_default(),
                "system_prompt" => prompt = field.text().await.unwrap_or_default(),
                "context_file" => {
                    assert_eq!(field.content_type(), Some("application/pdf"));
                    file_len = field.bytes().await.map(|b| b.len()).unwrap_or(0);
                }
                _ => {}
            }
        }
        if prompt.is_empty() {
            return Err((
                AxumStatus::BAD_REQUEST,
                Json(serde_json::json!({ "detail": "Failed to generate card: empty prompt" })),
            ));
        }
        let mut created = card("3", &title);
        created.keywords.push(format!("attachment:{file_len}"));
        Ok((AxumStatus::CREATED, Json(created)))
    }

    async fn copilot(Json(req): Json<CopilotRequest>) -> Json<CopilotResponse> {
        Json(CopilotResponse {
            answer: format!("You asked: {}", req.question),
        })
    }

    async fn spawn_backend(backend: Arc<Backend>) -> HttpCardClient {
        let app = Router::new()
            .route("/api/v1/cards/", get(list).post(create))
            .route("/api/v1/cards/{id}", get(detail))
            .route("/api/v1/ai/copilot", post(copilot))
            .with_state(backend);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let config = HttpCardClientConfig {
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            ..HttpCardClientConfig::default()
        }
        .with_base_url(format!("http://{addr}/api/v1/"));
        HttpCardClient::new(config).unwrap()
    }

    #[tokio::test]
    async fn lists_and_filters_cards() {
        let client = spawn_backend(Arc::new(Backend::default())).await;
        assert!(client.config().base_url.ends_with("/api/v1"));

        let all = client.list_cards(None).await.unwrap();
        assert_eq!(all.len(), 2);

        let filtered = client.list_cards(Some("vienna")).await.unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].title, "Congress of Vienna");
    }

    #[tokio::test]
    async fn list_retries_transient_server_errors() {
        let backend = Arc::new(Backend {
            fail_first_list: true,
            ..Backend::default()
        });
        let client = spawn_backend(Arc::clone(&backend)).await;

        let cards = client.list_cards(None).await.unwrap();
        assert_eq!(cards.len(), 2);
        assert_eq!(backend.list_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn missing_card_maps_to_not_found() {
        let client = spawn_backend(Arc::new(Backend::default())).await;

        assert_eq!(client.get_card("1").await.unwrap().title, "Treaty of Westphalia");
        let err = client.get_card("nope").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(ref id) if id == "nope"));
    }

    #[tokio::test]
    async fn create_sends_multipart_with_attachment() {
        let client = spawn_backend(Arc::new(Backend::default())).await;
        let form = CreateCardFormData {
            title: "Treaty of X".to_string(),
            system_prompt: "You are a careful historian.".to_string(),
            topics_to_cover: "causes, outcome".to_string(),
            context_file: Some(ContextFile::pdf("ctx.pdf", b"%PDF-1.4 test".to_vec())),
        };

        let card = client.create_card(&form).await.unwrap();
        assert_eq!(card.title, "Treaty of X");
        assert!(card.keywords.contains(&"attachment:13".to_string()));
    }

    #[tokio::test]
    async fn create_surfaces_backend_detail() {
        let client = spawn_backend(Arc::new(Backend::default())).await;
        let form = CreateCardFormData {
            title: "Treaty of X".to_string(),
            ..CreateCardFormData::default()
        };

        match client.create_card(&form).await.unwrap_err() {
            ApiError::Backend { status, detail } => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(detail, "Failed to generate card: empty prompt");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn copilot_round_trip() {
        let client = spawn_backend(Arc::new(Backend::default())).await;
        let resp = client
            .ask_copilot(&CopilotRequest {
                question: "Who signed it?".to_string(),
                context: "The treaty was signed in 1648.".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(resp.answer, "You asked: Who signed it?");
    }

    #[test]
    fn detail_extraction_handles_both_shapes() {
        assert_eq!(extract_detail(r#"{"detail":"boom"}"#), "boom");
        assert_eq!(
            extract_detail(r#"{"detail":[{"msg":"field required"},{"msg":"too short"}]}"#),
            "field required; too short"
        );
        assert_eq!(extract_detail("plain text"), "plain text");
    }

    #[test]
    fn url_building_keeps_base_path() {
        let client = HttpCardClient::new(
            HttpCardClientConfig::default().with_base_url("http://example.test/api/v1/"),
        )
        .unwrap();
        assert_eq!(
            client.url(&["cards", ""]).unwrap().as_str(),
            "http://example.test/api/v1/cards/"
        );
        assert_eq!(
            client.url(&["cards", "a b"]).unwrap().as_str(),
            "http://example.test/api/v1/cards/a%20b"
        );
    }

    #[test]
    fn backoff_is_capped() {
        let d = backoff_delay(Duration::from_millis(200), Duration::from_millis(1000), 10);
        assert!(d >= Duration::from_millis(1000));
        assert!(d <= Duration::from_millis(1250));
    }
}
