use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Upper bound on an uploaded context file, in bytes (5 MiB).
pub const MAX_CONTEXT_FILE_BYTES: usize = 5 * 1024 * 1024;

/// Upper bound on a card title, in characters.
pub const MAX_TITLE_CHARS: usize = 200;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Backend limits on the AI utility payloads, in characters.
pub const MAX_QUESTION_CHARS: usize = 500;
pub const MIN_COPILOT_CONTEXT_CHARS: usize = 10;
pub const MIN_BIAS_CONTENT_CHARS: usize = 50;

/// A generated encyclopedia-style card as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    /// Backend-assigned identifier (a UUID string).
    pub id: String,
    pub title: String,
    /// Markdown body produced by the generator.
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// A single file attached to a create request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ContextFile {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn pdf(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::new(file_name, PDF_CONTENT_TYPE, bytes)
    }

    /// Read an attachment from disk, inferring the content type from the extension.
    pub async fn from_path(path: &Path) -> Result<Self, ApiError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ApiError::ContextFile {
                path: path.display().to_string(),
                source: e,
            })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "context.pdf".to_string());
        let content_type = if has_pdf_extension(&file_name) {
            PDF_CONTENT_TYPE
        } else {
            "application/octet-stream"
        };
        Ok(Self::new(file_name, content_type, bytes))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn is_pdf(&self) -> bool {
        self.content_type.eq_ignore_ascii_case(PDF_CONTENT_TYPE) || has_pdf_extension(&self.file_name)
    }
}

fn has_pdf_extension(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// Input of the create-card workflow. Lives only for one submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateCardFormData {
    pub title: String,
    pub system_prompt: String,
    pub topics_to_cover: String,
    pub context_file: Option<ContextFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopilotRequest {
    pub question: String,
    pub context: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopilotResponse {
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiasJudgeRequest {
    pub blog_content: String,
}

/// Neutrality verdict; `bias_score` ranges from 0 (neutral) to 100.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiasJudgeResponse {
    pub bias_score: f64,
    pub explanation: String,
}
