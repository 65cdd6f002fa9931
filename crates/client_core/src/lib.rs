use std::{future::Future, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use shared::{
    domain::{
        FeatureComment, FeatureRequest, FeatureRequestId, SupportTicket, TicketId, TicketMessage,
    },
    error::{ApiException, ErrorCode},
    protocol::TicketDetail,
};
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod config;
pub mod dispatch;
pub mod display;
pub mod forms;
pub mod http;
pub mod preview;
pub mod state;

pub use dispatch::{
    spawn_dispatcher, CommandOutcome, DispatchError, DispatcherHandle, FeedbackCommand,
};
pub use http::HttpFeedbackBackend;
pub use preview::PreviewFeedbackBackend;
pub use state::{FeedbackState, InFlightFlag, StateReader};

use state::StateWriter;

/// Remote feedback API consumed by the orchestrator.
#[async_trait]
pub trait FeedbackBackend: Send + Sync {
    async fn list_feature_requests(&self) -> Result<Vec<FeatureRequest>>;
    async fn get_feature_request(&self, id: FeatureRequestId) -> Result<FeatureRequest>;
    async fn create_feature_request(&self, title: &str, description: &str)
        -> Result<FeatureRequest>;
    async fn vote(&self, id: FeatureRequestId) -> Result<()>;
    async fn remove_vote(&self, id: FeatureRequestId) -> Result<()>;
    async fn list_comments(&self, feature_id: FeatureRequestId) -> Result<Vec<FeatureComment>>;
    async fn create_comment(&self, feature_id: FeatureRequestId, body: &str)
        -> Result<FeatureComment>;
    async fn list_tickets(&self) -> Result<Vec<SupportTicket>>;
    async fn get_ticket(&self, id: TicketId) -> Result<TicketDetail>;
    async fn create_ticket(
        &self,
        subject: &str,
        body: &str,
        email: Option<&str>,
    ) -> Result<SupportTicket>;
    async fn create_ticket_message(&self, ticket_id: TicketId, body: &str)
        -> Result<TicketMessage>;
}

/// Last failure recorded in [`FeedbackState::error`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedbackError {
    #[error("{message}")]
    Api { code: ErrorCode, message: String },
    #[error("network error: {0}")]
    Transport(String),
    #[error("{0}")]
    Other(String),
}

impl FeedbackError {
    pub fn from_backend(err: &anyhow::Error) -> Self {
        if let Some(api) = err.chain().find_map(|cause| cause.downcast_ref::<ApiException>()) {
            return Self::Api {
                code: api.code,
                message: api.message.clone(),
            };
        }
        let transport = err
            .chain()
            .filter_map(|cause| cause.downcast_ref::<reqwest::Error>())
            .any(|http| !http.is_decode());
        if transport {
            return Self::Transport(format!("{err:#}"));
        }
        Self::Other(format!("{err:#}"))
    }

    pub fn requires_reauth(&self) -> bool {
        matches!(
            self,
            Self::Api {
                code: ErrorCode::Unauthorized | ErrorCode::Forbidden,
                ..
            }
        )
    }
}

/// Clears its flag when dropped unless the operation already resolved it.
struct InFlight<'a> {
    state: &'a StateWriter,
    flag: Option<InFlightFlag>,
    resolved: bool,
}

impl<'a> InFlight<'a> {
    fn begin(state: &'a StateWriter, flag: Option<InFlightFlag>) -> Self {
        if let Some(flag) = flag {
            state.modify(|s| s.set_flag(flag, true));
        }
        Self {
            state,
            flag,
            resolved: false,
        }
    }

    fn succeed(mut self, merge: impl FnOnce(&mut FeedbackState)) {
        let flag = self.flag;
        self.state.modify(|s| {
            merge(s);
            if let Some(flag) = flag {
                s.set_flag(flag, false);
            }
            s.error = None;
        });
        self.resolved = true;
    }

    fn fail(mut self, error: FeedbackError) {
        let flag = self.flag;
        self.state.modify(|s| {
            s.error = Some(error);
            if let Some(flag) = flag {
                s.set_flag(flag, false);
            }
        });
        self.resolved = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.resolved {
            return;
        }
        if let Some(flag) = self.flag {
            self.state.modify(|s| s.set_flag(flag, false));
        }
    }
}

/// Translates user actions into one remote call each and merges the results
/// into [`FeedbackState`].
///
/// Operations take `&self` and may overlap; merges are applied in completion
/// order, so the last response to resolve wins. Failures never escape an
/// operation: they land in `error` and the operation's flag is cleared.
pub struct FeedbackOrchestrator {
    backend: Arc<dyn FeedbackBackend>,
    state: StateWriter,
}

impl FeedbackOrchestrator {
    pub fn new(backend: Arc<dyn FeedbackBackend>) -> Self {
        Self {
            backend,
            state: StateWriter::new(),
        }
    }

    pub fn subscribe(&self) -> StateReader {
        self.state.reader()
    }

    pub fn snapshot(&self) -> FeedbackState {
        self.state.snapshot()
    }

    async fn run<T, F>(
        &self,
        operation: &'static str,
        flag: Option<InFlightFlag>,
        call: F,
        merge: impl FnOnce(&mut FeedbackState, T),
    ) -> bool
    where
        F: Future<Output = Result<T>>,
    {
        let guard = InFlight::begin(&self.state, flag);
        debug!(operation, "feedback: remote call started");
        match call.await {
            Ok(value) => {
                guard.succeed(|state| merge(state, value));
                debug!(operation, "feedback: remote call succeeded");
                true
            }
            Err(err) => {
                warn!(operation, error = %format!("{err:#}"), "feedback: remote call failed");
                guard.fail(FeedbackError::from_backend(&err));
                false
            }
        }
    }

    pub async fn fetch_feature_requests(&self) {
        self.run(
            "fetch_feature_requests",
            Some(InFlightFlag::Features),
            self.backend.list_feature_requests(),
            |state, requests| state.feature_requests = requests,
        )
        .await;
    }

    pub async fn fetch_feature_request(&self, id: FeatureRequestId) {
        self.run(
            "fetch_feature_request",
            Some(InFlightFlag::FeatureDetail),
            self.backend.get_feature_request(id),
            |state, request| state.selected_feature_request = Some(request),
        )
        .await;
    }

    pub async fn submit_feature_request(&self, title: &str, description: &str) -> bool {
        let submitted = self
            .run(
                "submit_feature_request",
                Some(InFlightFlag::Submitting),
                self.backend.create_feature_request(title, description),
                |state, created| state.prepend_feature_request(created),
            )
            .await;
        if submitted {
            info!("feedback: feature request submitted");
        }
        submitted
    }

    /// Records a vote. No in-flight flag and no `has_voted` short-circuit:
    /// the remote call is made even if the user already voted.
    pub async fn vote(&self, id: FeatureRequestId) {
        let voted = self
            .run("vote", None, self.backend.vote(id), |state, ()| {
                state.apply_vote_added(id)
            })
            .await;
        if voted {
            info!(feature_id = %id, "feedback: vote recorded");
        }
    }

    pub async fn remove_vote(&self, id: FeatureRequestId) {
        let removed = self
            .run("remove_vote", None, self.backend.remove_vote(id), |state, ()| {
                state.apply_vote_removed(id)
            })
            .await;
        if removed {
            info!(feature_id = %id, "feedback: vote removed");
        }
    }

    pub async fn fetch_comments(&self, feature_id: FeatureRequestId) {
        self.run(
            "fetch_comments",
            Some(InFlightFlag::Comments),
            self.backend.list_comments(feature_id),
            |state, comments| state.feature_comments = comments,
        )
        .await;
    }

    pub async fn add_comment(&self, feature_id: FeatureRequestId, body: &str) -> bool {
        let added = self
            .run(
                "add_comment",
                Some(InFlightFlag::Submitting),
                self.backend.create_comment(feature_id, body),
                |state, comment| state.feature_comments.push(comment),
            )
            .await;
        if added {
            info!(feature_id = %feature_id, "feedback: comment added");
        }
        added
    }

    pub async fn fetch_tickets(&self) {
        self.run(
            "fetch_tickets",
            Some(InFlightFlag::Tickets),
            self.backend.list_tickets(),
            |state, tickets| state.tickets = tickets,
        )
        .await;
    }

    pub async fn fetch_ticket_detail(&self, id: TicketId) {
        self.run(
            "fetch_ticket_detail",
            Some(InFlightFlag::TicketDetail),
            self.backend.get_ticket(id),
            |state, detail| state.apply_ticket_detail(detail.ticket, detail.messages),
        )
        .await;
    }

    pub async fn submit_ticket(&self, subject: &str, body: &str, email: Option<&str>) -> bool {
        let submitted = self
            .run(
                "submit_ticket",
                Some(InFlightFlag::Submitting),
                self.backend.create_ticket(subject, body, email),
                |state, ticket| state.prepend_ticket(ticket),
            )
            .await;
        if submitted {
            info!("feedback: support ticket submitted");
        }
        submitted
    }

    pub async fn reply_to_ticket(&self, ticket_id: TicketId, body: &str) -> bool {
        let replied = self
            .run(
                "reply_to_ticket",
                Some(InFlightFlag::Submitting),
                self.backend.create_ticket_message(ticket_id, body),
                |state, message| state.ticket_messages.push(message),
            )
            .await;
        if replied {
            info!(ticket_id = %ticket_id, "feedback: ticket reply sent");
        }
        replied
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
