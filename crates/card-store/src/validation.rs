use card_common::model::{CreateCardFormData, MAX_CONTEXT_FILE_BYTES, MAX_TITLE_CHARS};

use crate::error::{FormField, ValidationErrors};

/// Check the form against the constraints the backend enforces.
///
/// This only saves a round trip; the backend stays authoritative. All failing
/// fields are reported at once.
pub fn validate_form(form: &CreateCardFormData) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let title = form.title.trim();
    if title.is_empty() {
        errors.add(FormField::Title, "Title is required.");
    } else if title.chars().count() > MAX_TITLE_CHARS {
        errors.add(
            FormField::Title,
            format!("Title must be at most {MAX_TITLE_CHARS} characters."),
        );
    }

    if form.system_prompt.trim().is_empty() {
        errors.add(FormField::SystemPrompt, "System prompt is required.");
    }
    if form.topics_to_cover.trim().is_empty() {
        errors.add(FormField::TopicsToCover, "Topics to cover are required.");
    }

    if let Some(file) = &form.context_file {
        if !file.is_pdf() {
            errors.add(FormField::ContextFile, "Only PDF files are allowed.");
        } else if file.len() > MAX_CONTEXT_FILE_BYTES {
            errors.add(FormField::ContextFile, "File size must not exceed 5MB.");
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use card_common::model::ContextFile;

    use super::*;

    fn form() -> CreateCardFormData {
        CreateCardFormData {
            title: "Treaty of X".to_string(),
            system_prompt: "...".to_string(),
            topics_to_cover: "...".to_string(),
            context_file: None,
        }
    }

    #[test]
    fn accepts_minimal_form() {
        assert_eq!(validate_form(&form()), Ok(()));
    }

    #[test]
    fn reports_all_missing_fields() {
        let errors = validate_form(&CreateCardFormData {
            title: "   ".to_string(),
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.get(FormField::Title).is_some());
        assert!(errors.get(FormField::SystemPrompt).is_some());
        assert!(errors.get(FormField::TopicsToCover).is_some());
    }

    #[test]
    fn title_length_counts_characters() {
        let mut ok = form();
        ok.title = "é".repeat(MAX_TITLE_CHARS);
        assert!(validate_form(&ok).is_ok());

        let mut long = form();
        long.title = "a".repeat(MAX_TITLE_CHARS + 1);
        let errors = validate_form(&long).unwrap_err();
        assert!(errors.get(FormField::Title).is_some());
    }

    #[test]
    fn attachment_must_be_small_pdf() {
        let mut at_limit = form();
        at_limit.context_file = Some(ContextFile::pdf("a.pdf", vec![0; MAX_CONTEXT_FILE_BYTES]));
        assert!(validate_form(&at_limit).is_ok());

        let mut too_big = form();
        too_big.context_file = Some(ContextFile::pdf("a.pdf", vec![0; MAX_CONTEXT_FILE_BYTES + 1]));
        assert!(validate_form(&too_big).is_err());

        let mut not_pdf = form();
        not_pdf.context_file = Some(ContextFile::new("a.docx", "application/msword", vec![1]));
        let errors = validate_form(&not_pdf).unwrap_err();
        assert_eq!(errors.get(FormField::ContextFile), Some("Only PDF files are allowed."));
    }
}
