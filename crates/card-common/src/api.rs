//! Boundary traits for the card backend.
//!
//! The client state store only talks to [`CardApi`]; the HTTP implementation
//! lives in [`crate::http`] and a canned one in [`crate::mock`].

use async_trait::async_trait;

use crate::error::ApiError;
use crate::model::{
    BiasJudgeRequest, BiasJudgeResponse, Card, CopilotRequest, CopilotResponse, CreateCardFormData,
};

#[async_trait]
pub trait CardApi: Send + Sync {
    /// List cards, optionally filtered by a title substring.
    async fn list_cards(&self, title: Option<&str>) -> Result<Vec<Card>, ApiError>;

    /// Fetch one card. A missing card is reported as [`ApiError::NotFound`].
    async fn get_card(&self, id: &str) -> Result<Card, ApiError>;

    /// Ask the backend to generate and persist a new card.
    async fn create_card(&self, form: &CreateCardFormData) -> Result<Card, ApiError>;
}

/// Stateless AI utilities offered next to the card endpoints.
#[async_trait]
pub trait AiAssistApi: Send + Sync {
    async fn ask_copilot(&self, request: &CopilotRequest) -> Result<CopilotResponse, ApiError>;

    async fn judge_bias(&self, request: &BiasJudgeRequest) -> Result<BiasJudgeResponse, ApiError>;
}
