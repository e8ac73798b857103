use std::fmt;

use card_common::error::ApiError;
use card_common::StatusCode;

/// A field of the create-card form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormField {
    Title,
    SystemPrompt,
    TopicsToCover,
    ContextFile,
}

impl FormField {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormField::Title => "title",
            FormField::SystemPrompt => "system_prompt",
            FormField::TopicsToCover => "topics_to_cover",
            FormField::ContextFile => "context_file",
        }
    }
}

impl fmt::Display for FormField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every local constraint the form failed, one message per field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<(FormField, String)>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: FormField, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: FormField, message: impl Into<String>) {
        self.errors.push((field, message.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// The message attached to `field`, if it failed.
    pub fn get(&self, field: FormField) -> Option<&str> {
        self.errors
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, m)| m.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (FormField, &str)> {
        self.errors.iter().map(|(f, m)| (*f, m.as_str()))
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (field, message)) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Client-facing failure taxonomy.
///
/// `Display` carries the diagnostic detail for logs; [`CardError::user_message`]
/// is the generic text shown to the user.
#[derive(Debug, thiserror::Error)]
pub enum CardError {
    #[error("invalid form: {0}")]
    Validation(ValidationErrors),

    #[error("network error: {0}")]
    Network(String),

    #[error("card not found: {0}")]
    NotFound(String),

    #[error("unexpected error: {0}")]
    Unknown(String),
}

impl CardError {
    pub fn user_message(&self) -> &'static str {
        match self {
            CardError::Validation(_) => "Please correct the highlighted fields and try again.",
            CardError::Network(_) => {
                "Could not reach the card service. Check your connection and try again."
            }
            CardError::NotFound(_) => "The requested card does not exist.",
            CardError::Unknown(_) => "Something went wrong. Please try again.",
        }
    }

    /// Whether offering a retry makes sense.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CardError::Network(_))
    }
}

impl From<ValidationErrors> for CardError {
    fn from(errors: ValidationErrors) -> Self {
        CardError::Validation(errors)
    }
}

impl From<ApiError> for CardError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::NotFound(id) => CardError::NotFound(id),
            ApiError::Request(e) => CardError::Network(e.to_string()),
            ApiError::Backend { status, detail }
                if status.is_server_error()
                    || status == StatusCode::TOO_MANY_REQUESTS
                    || status == StatusCode::REQUEST_TIMEOUT =>
            {
                CardError::Network(format!("{status}: {detail}"))
            }
            ApiError::ContextFile { path, source } => CardError::Validation(
                ValidationErrors::single(FormField::ContextFile, format!("cannot read {path}: {source}")),
            ),
            other => CardError::Unknown(other.to_string()),
        }
    }
}
