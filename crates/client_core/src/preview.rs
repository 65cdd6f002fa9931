//! In-memory backend with canned sample data, for demos and offline work.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use shared::{
    domain::{
        AuthorType, FeatureComment, FeatureCommentId, FeatureRequest, FeatureRequestId,
        FeatureRequestStatus, SupportTicket, TicketId, TicketMessage, TicketMessageId,
        TicketPriority, TicketStatus,
    },
    error::{ApiException, ErrorCode},
    protocol::TicketDetail,
};
use tokio::sync::Mutex;

use crate::FeedbackBackend;

#[derive(Default)]
struct PreviewData {
    features: Vec<FeatureRequest>,
    comments: HashMap<FeatureRequestId, Vec<FeatureComment>>,
    tickets: Vec<SupportTicket>,
    messages: HashMap<TicketId, Vec<TicketMessage>>,
}

/// Always-succeeding backend. Writes are kept in memory so a later fetch
/// reflects them, the way a real server would.
pub struct PreviewFeedbackBackend {
    data: Mutex<PreviewData>,
}

impl Default for PreviewFeedbackBackend {
    fn default() -> Self {
        Self::with_sample_data()
    }
}

impl PreviewFeedbackBackend {
    pub fn empty() -> Self {
        Self {
            data: Mutex::new(PreviewData::default()),
        }
    }

    pub fn with_sample_data() -> Self {
        let now = Utc::now();
        let feature = |title: &str,
                       description: &str,
                       status: FeatureRequestStatus,
                       vote_count: u32,
                       has_voted: bool,
                       comment_count: u32,
                       age_days: i64,
                       updated_hours: i64| FeatureRequest {
            id: FeatureRequestId::new_random(),
            title: title.into(),
            description: description.into(),
            status,
            vote_count,
            has_voted,
            comment_count,
            created_at: now - Duration::days(age_days),
            updated_at: now - Duration::hours(updated_hours),
        };
        let features = vec![
            feature(
                "Dark mode support",
                "Add a dark mode option.",
                FeatureRequestStatus::Planned,
                42,
                false,
                1,
                2,
                1,
            ),
            feature(
                "Export data to CSV",
                "Allow CSV export.",
                FeatureRequestStatus::Open,
                17,
                true,
                0,
                7,
                24,
            ),
            feature(
                "Keyboard shortcuts",
                "Add customizable keyboard shortcuts.",
                FeatureRequestStatus::Shipped,
                89,
                true,
                0,
                30,
                72,
            ),
        ];

        let mut comments = HashMap::new();
        comments.insert(
            features[0].id,
            vec![FeatureComment {
                id: FeatureCommentId::new_random(),
                feature_request_id: features[0].id,
                author_type: AuthorType::Admin,
                body: "We're planning this for the next release.".into(),
                created_at: now - Duration::hours(5),
            }],
        );

        let tickets = vec![
            SupportTicket {
                id: TicketId::new_random(),
                subject: "Cannot reset my password".into(),
                status: TicketStatus::Open,
                priority: TicketPriority::High,
                message_count: 2,
                created_at: now - Duration::days(1),
                updated_at: now - Duration::hours(1),
            },
            SupportTicket {
                id: TicketId::new_random(),
                subject: "Billing question about Pro plan".into(),
                status: TicketStatus::AwaitingReply,
                priority: TicketPriority::Normal,
                message_count: 1,
                created_at: now - Duration::days(5),
                updated_at: now - Duration::days(2),
            },
        ];

        let mut messages = HashMap::new();
        messages.insert(
            tickets[0].id,
            vec![
                TicketMessage {
                    id: TicketMessageId::new_random(),
                    ticket_id: tickets[0].id,
                    author_type: AuthorType::User,
                    body: "The reset email never arrives.".into(),
                    created_at: now - Duration::days(1),
                },
                TicketMessage {
                    id: TicketMessageId::new_random(),
                    ticket_id: tickets[0].id,
                    author_type: AuthorType::Admin,
                    body: "Could you check your spam folder?".into(),
                    created_at: now - Duration::hours(1),
                },
            ],
        );
        messages.insert(
            tickets[1].id,
            vec![TicketMessage {
                id: TicketMessageId::new_random(),
                ticket_id: tickets[1].id,
                author_type: AuthorType::User,
                body: "Does the Pro plan include team seats?".into(),
                created_at: now - Duration::days(5),
            }],
        );

        Self {
            data: Mutex::new(PreviewData {
                features,
                comments,
                tickets,
                messages,
            }),
        }
    }
}

fn not_found(what: &str, id: impl std::fmt::Display) -> anyhow::Error {
    ApiException::new(ErrorCode::NotFound, format!("{what} {id} not found")).into()
}

#[async_trait]
impl FeedbackBackend for PreviewFeedbackBackend {
    async fn list_feature_requests(&self) -> Result<Vec<FeatureRequest>> {
        Ok(self.data.lock().await.features.clone())
    }

    async fn get_feature_request(&self, id: FeatureRequestId) -> Result<FeatureRequest> {
        let guard = self.data.lock().await;
        guard
            .features
            .iter()
            .find(|f| f.id == id)
            .cloned()
            .ok_or_else(|| not_found("feature request", id))
    }

    async fn create_feature_request(
        &self,
        title: &str,
        description: &str,
    ) -> Result<FeatureRequest> {
        let now = Utc::now();
        let created = FeatureRequest {
            id: FeatureRequestId::new_random(),
            title: title.to_string(),
            description: description.to_string(),
            status: FeatureRequestStatus::Pending,
            vote_count: 0,
            has_voted: false,
            comment_count: 0,
            created_at: now,
            updated_at: now,
        };
        self.data.lock().await.features.insert(0, created.clone());
        Ok(created)
    }

    async fn vote(&self, id: FeatureRequestId) -> Result<()> {
        let mut guard = self.data.lock().await;
        let feature = guard
            .features
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| not_found("feature request", id))?;
        if !feature.has_voted {
            *feature = feature.with_vote_added();
        }
        Ok(())
    }

    async fn remove_vote(&self, id: FeatureRequestId) -> Result<()> {
        let mut guard = self.data.lock().await;
        let feature = guard
            .features
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| not_found("feature request", id))?;
        if feature.has_voted {
            *feature = feature.with_vote_removed();
        }
        Ok(())
    }

    async fn list_comments(&self, feature_id: FeatureRequestId) -> Result<Vec<FeatureComment>> {
        let guard = self.data.lock().await;
        Ok(guard.comments.get(&feature_id).cloned().unwrap_or_default())
    }

    async fn create_comment(
        &self,
        feature_id: FeatureRequestId,
        body: &str,
    ) -> Result<FeatureComment> {
        let mut guard = self.data.lock().await;
        let feature = guard
            .features
            .iter_mut()
            .find(|f| f.id == feature_id)
            .ok_or_else(|| not_found("feature request", feature_id))?;
        feature.comment_count = feature.comment_count.saturating_add(1);
        let comment = FeatureComment {
            id: FeatureCommentId::new_random(),
            feature_request_id: feature_id,
            author_type: AuthorType::User,
            body: body.to_string(),
            created_at: Utc::now(),
        };
        guard
            .comments
            .entry(feature_id)
            .or_default()
            .push(comment.clone());
        Ok(comment)
    }

    async fn list_tickets(&self) -> Result<Vec<SupportTicket>> {
        Ok(self.data.lock().await.tickets.clone())
    }

    async fn get_ticket(&self, id: TicketId) -> Result<TicketDetail> {
        let guard = self.data.lock().await;
        let ticket = guard
            .tickets
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| not_found("ticket", id))?;
        let messages = guard.messages.get(&id).cloned().unwrap_or_default();
        Ok(TicketDetail { ticket, messages })
    }

    async fn create_ticket(
        &self,
        subject: &str,
        body: &str,
        _email: Option<&str>,
    ) -> Result<SupportTicket> {
        let now = Utc::now();
        let ticket = SupportTicket {
            id: TicketId::new_random(),
            subject: subject.to_string(),
            status: TicketStatus::Open,
            priority: TicketPriority::Normal,
            message_count: 1,
            created_at: now,
            updated_at: now,
        };
        let first = TicketMessage {
            id: TicketMessageId::new_random(),
            ticket_id: ticket.id,
            author_type: AuthorType::User,
            body: body.to_string(),
            created_at: now,
        };
        let mut guard = self.data.lock().await;
        guard.tickets.insert(0, ticket.clone());
        guard.messages.insert(ticket.id, vec![first]);
        Ok(ticket)
    }

    async fn create_ticket_message(
        &self,
        ticket_id: TicketId,
        body: &str,
    ) -> Result<TicketMessage> {
        let now = Utc::now();
        let mut guard = self.data.lock().await;
        let ticket = guard
            .tickets
            .iter_mut()
            .find(|t| t.id == ticket_id)
            .ok_or_else(|| not_found("ticket", ticket_id))?;
        ticket.message_count = ticket.message_count.saturating_add(1);
        ticket.updated_at = now;
        let message = TicketMessage {
            id: TicketMessageId::new_random(),
            ticket_id,
            author_type: AuthorType::User,
            body: body.to_string(),
            created_at: now,
        };
        guard
            .messages
            .entry(ticket_id)
            .or_default()
            .push(message.clone());
        Ok(message)
    }
}
