//! Scripted backend double and fixtures shared by the crate's tests.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex as StdMutex},
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use shared::{
    domain::{
        AuthorType, FeatureComment, FeatureCommentId, FeatureRequest, FeatureRequestId,
        FeatureRequestStatus, SupportTicket, TicketId, TicketMessage, TicketMessageId,
        TicketPriority, TicketStatus,
    },
    error::ApiException,
    protocol::TicketDetail,
};
use tokio::sync::{Mutex, Notify};

use crate::FeedbackBackend;

#[derive(Clone)]
pub(crate) enum Failure {
    Api(ApiException),
    Message(String),
}

#[derive(Default)]
pub(crate) struct ScriptedBackend {
    pub(crate) features: Vec<FeatureRequest>,
    pub(crate) feature_detail: Option<FeatureRequest>,
    /// Per-call detail responses, each released by its own gate.
    pub(crate) detail_turns: StdMutex<VecDeque<(Arc<Notify>, FeatureRequest)>>,
    pub(crate) created_feature: Option<FeatureRequest>,
    pub(crate) comments: Vec<FeatureComment>,
    pub(crate) created_comment: Option<FeatureComment>,
    pub(crate) tickets: Vec<SupportTicket>,
    pub(crate) ticket_detail: Option<TicketDetail>,
    pub(crate) created_ticket: Option<SupportTicket>,
    pub(crate) created_message: Option<TicketMessage>,
    pub(crate) failure: StdMutex<Option<Failure>>,
    pub(crate) gate: Option<Arc<Notify>>,
    pub(crate) calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedBackend {
    pub(crate) fn failing(failure: Failure) -> Self {
        let backend = Self::default();
        backend.set_failure(Some(failure));
        backend
    }

    pub(crate) fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub(crate) fn push_detail_turn(&self, gate: Arc<Notify>, detail: FeatureRequest) {
        self.detail_turns
            .lock()
            .expect("detail turns lock")
            .push_back((gate, detail));
    }

    pub(crate) fn set_failure(&self, failure: Option<Failure>) {
        *self.failure.lock().expect("failure lock") = failure;
    }

    async fn enter(&self, call: String) -> Result<()> {
        self.calls.lock().await.push(call);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let failure = self.failure.lock().expect("failure lock").clone();
        match failure {
            Some(Failure::Api(api)) => Err(api.into()),
            Some(Failure::Message(message)) => Err(anyhow!(message)),
            None => Ok(()),
        }
    }
}

fn scripted<T: Clone>(value: &Option<T>, what: &str) -> Result<T> {
    value
        .clone()
        .ok_or_else(|| anyhow!("no scripted response for {what}"))
}

#[async_trait]
impl FeedbackBackend for ScriptedBackend {
    async fn list_feature_requests(&self) -> Result<Vec<FeatureRequest>> {
        self.enter("list_feature_requests".into()).await?;
        Ok(self.features.clone())
    }

    async fn get_feature_request(&self, id: FeatureRequestId) -> Result<FeatureRequest> {
        let turn = self
            .detail_turns
            .lock()
            .expect("detail turns lock")
            .pop_front();
        self.enter(format!("get_feature_request:{id}")).await?;
        match turn {
            Some((gate, detail)) => {
                gate.notified().await;
                Ok(detail)
            }
            None => scripted(&self.feature_detail, "get_feature_request"),
        }
    }

    async fn create_feature_request(
        &self,
        title: &str,
        description: &str,
    ) -> Result<FeatureRequest> {
        self.enter(format!("create_feature_request:{title}:{description}"))
            .await?;
        scripted(&self.created_feature, "create_feature_request")
    }

    async fn vote(&self, id: FeatureRequestId) -> Result<()> {
        self.enter(format!("vote:{id}")).await
    }

    async fn remove_vote(&self, id: FeatureRequestId) -> Result<()> {
        self.enter(format!("remove_vote:{id}")).await
    }

    async fn list_comments(&self, feature_id: FeatureRequestId) -> Result<Vec<FeatureComment>> {
        self.enter(format!("list_comments:{feature_id}")).await?;
        Ok(self.comments.clone())
    }

    async fn create_comment(
        &self,
        feature_id: FeatureRequestId,
        body: &str,
    ) -> Result<FeatureComment> {
        self.enter(format!("create_comment:{feature_id}:{body}"))
            .await?;
        scripted(&self.created_comment, "create_comment")
    }

    async fn list_tickets(&self) -> Result<Vec<SupportTicket>> {
        self.enter("list_tickets".into()).await?;
        Ok(self.tickets.clone())
    }

    async fn get_ticket(&self, id: TicketId) -> Result<TicketDetail> {
        self.enter(format!("get_ticket:{id}")).await?;
        scripted(&self.ticket_detail, "get_ticket")
    }

    async fn create_ticket(
        &self,
        subject: &str,
        body: &str,
        email: Option<&str>,
    ) -> Result<SupportTicket> {
        self.enter(format!(
            "create_ticket:{subject}:{body}:{}",
            email.unwrap_or("-")
        ))
        .await?;
        scripted(&self.created_ticket, "create_ticket")
    }

    async fn create_ticket_message(
        &self,
        ticket_id: TicketId,
        body: &str,
    ) -> Result<TicketMessage> {
        self.enter(format!("create_ticket_message:{ticket_id}:{body}"))
            .await?;
        scripted(&self.created_message, "create_ticket_message")
    }
}

pub(crate) fn sample_feature(title: &str, vote_count: u32, has_voted: bool) -> FeatureRequest {
    let now = Utc::now();
    FeatureRequest {
        id: FeatureRequestId::new_random(),
        title: title.to_string(),
        description: format!("{title} please"),
        status: FeatureRequestStatus::Open,
        vote_count,
        has_voted,
        comment_count: 0,
        created_at: now,
        updated_at: now,
    }
}

pub(crate) fn sample_comment(feature_id: FeatureRequestId, body: &str) -> FeatureComment {
    FeatureComment {
        id: FeatureCommentId::new_random(),
        feature_request_id: feature_id,
        author_type: AuthorType::User,
        body: body.to_string(),
        created_at: Utc::now(),
    }
}

pub(crate) fn sample_ticket(subject: &str) -> SupportTicket {
    let now = Utc::now();
    SupportTicket {
        id: TicketId::new_random(),
        subject: subject.to_string(),
        status: TicketStatus::Open,
        priority: TicketPriority::Normal,
        message_count: 1,
        created_at: now,
        updated_at: now,
    }
}

pub(crate) fn sample_message(
    ticket_id: TicketId,
    author_type: AuthorType,
    body: &str,
) -> TicketMessage {
    TicketMessage {
        id: TicketMessageId::new_random(),
        ticket_id,
        author_type,
        body: body.to_string(),
        created_at: Utc::now(),
    }
}
