use serde::{Deserialize, Serialize};

use crate::domain::{SupportTicket, TicketMessage};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateFeatureRequest {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateComment {
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTicket {
    pub subject: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTicketMessage {
    pub body: String,
}

/// Response of the get-ticket call: the ticket and its full thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketDetail {
    pub ticket: SupportTicket,
    pub messages: Vec<TicketMessage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_email_is_omitted_when_absent() {
        let body = CreateTicket {
            subject: "Cannot reset my password".into(),
            body: "The reset link never arrives.".into(),
            email: None,
        };
        let json = serde_json::to_value(&body).expect("serialize");
        assert!(json.get("email").is_none());

        let parsed: CreateTicket =
            serde_json::from_str(r#"{"subject":"abc","body":"0123456789"}"#).expect("parse");
        assert_eq!(parsed.email, None);
    }
}
