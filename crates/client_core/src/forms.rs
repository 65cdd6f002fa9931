//! Input rules the presentation layer applies before dispatching a write.
//! The orchestrator itself accepts whatever it is given.

use thiserror::Error;

pub const MIN_TITLE_CHARS: usize = 3;
pub const MIN_DESCRIPTION_CHARS: usize = 10;
pub const MIN_SUBJECT_CHARS: usize = 3;
pub const MIN_TICKET_BODY_CHARS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("{field} must be at least {min} characters")]
    TooShort { field: &'static str, min: usize },
    #[error("{field} must not be empty")]
    Empty { field: &'static str },
}

fn require_min(field: &'static str, value: &str, min: usize) -> Result<String, FormError> {
    let trimmed = value.trim();
    if trimmed.chars().count() < min {
        return Err(FormError::TooShort { field, min });
    }
    Ok(trimmed.to_string())
}

#[derive(Debug, Clone, Default)]
pub struct FeatureRequestForm {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidFeatureRequest {
    pub title: String,
    pub description: String,
}

impl FeatureRequestForm {
    pub fn validate(&self) -> Result<ValidFeatureRequest, FormError> {
        Ok(ValidFeatureRequest {
            title: require_min("title", &self.title, MIN_TITLE_CHARS)?,
            description: require_min("description", &self.description, MIN_DESCRIPTION_CHARS)?,
        })
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TicketForm {
    pub subject: String,
    pub body: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidTicket {
    pub subject: String,
    pub body: String,
    pub email: Option<String>,
}

impl TicketForm {
    pub fn validate(&self) -> Result<ValidTicket, FormError> {
        let email = self.email.trim();
        Ok(ValidTicket {
            subject: require_min("subject", &self.subject, MIN_SUBJECT_CHARS)?,
            body: require_min("description", &self.body, MIN_TICKET_BODY_CHARS)?,
            email: (!email.is_empty()).then(|| email.to_string()),
        })
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

/// Trims a comment or reply body; blank bodies are never submitted.
pub fn non_empty_body(text: &str) -> Result<String, FormError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(FormError::Empty { field: "message" });
    }
    Ok(trimmed.to_string())
}
