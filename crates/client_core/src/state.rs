//! Observable feedback state and the merge rules applied to it.
//!
//! The orchestrator owns the only [`StateWriter`]; presentation code holds
//! [`StateReader`]s and only ever sees cloned snapshots.

use shared::domain::{
    FeatureComment, FeatureRequest, FeatureRequestId, SupportTicket, TicketMessage,
};
use tokio::sync::watch;

use crate::FeedbackError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedbackState {
    pub feature_requests: Vec<FeatureRequest>,
    pub selected_feature_request: Option<FeatureRequest>,
    pub feature_comments: Vec<FeatureComment>,
    pub tickets: Vec<SupportTicket>,
    pub selected_ticket: Option<SupportTicket>,
    pub ticket_messages: Vec<TicketMessage>,

    pub is_loading_features: bool,
    pub is_loading_feature_detail: bool,
    pub is_loading_comments: bool,
    pub is_loading_tickets: bool,
    pub is_loading_ticket_detail: bool,
    pub is_submitting: bool,

    pub error: Option<FeedbackError>,
}

/// In-flight flag categories, one per boolean on [`FeedbackState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InFlightFlag {
    Features,
    FeatureDetail,
    Comments,
    Tickets,
    TicketDetail,
    Submitting,
}

impl InFlightFlag {
    pub const ALL: [Self; 6] = [
        Self::Features,
        Self::FeatureDetail,
        Self::Comments,
        Self::Tickets,
        Self::TicketDetail,
        Self::Submitting,
    ];
}

impl FeedbackState {
    pub fn flag(&self, flag: InFlightFlag) -> bool {
        match flag {
            InFlightFlag::Features => self.is_loading_features,
            InFlightFlag::FeatureDetail => self.is_loading_feature_detail,
            InFlightFlag::Comments => self.is_loading_comments,
            InFlightFlag::Tickets => self.is_loading_tickets,
            InFlightFlag::TicketDetail => self.is_loading_ticket_detail,
            InFlightFlag::Submitting => self.is_submitting,
        }
    }

    pub fn is_loading_any(&self) -> bool {
        InFlightFlag::ALL.iter().any(|flag| self.flag(*flag))
    }

    pub(crate) fn set_flag(&mut self, flag: InFlightFlag, value: bool) {
        let slot = match flag {
            InFlightFlag::Features => &mut self.is_loading_features,
            InFlightFlag::FeatureDetail => &mut self.is_loading_feature_detail,
            InFlightFlag::Comments => &mut self.is_loading_comments,
            InFlightFlag::Tickets => &mut self.is_loading_tickets,
            InFlightFlag::TicketDetail => &mut self.is_loading_ticket_detail,
            InFlightFlag::Submitting => &mut self.is_submitting,
        };
        *slot = value;
    }

    pub(crate) fn prepend_feature_request(&mut self, created: FeatureRequest) {
        self.feature_requests.insert(0, created);
    }

    pub(crate) fn prepend_ticket(&mut self, created: SupportTicket) {
        self.tickets.insert(0, created);
    }

    pub(crate) fn apply_ticket_detail(
        &mut self,
        ticket: SupportTicket,
        messages: Vec<TicketMessage>,
    ) {
        self.selected_ticket = Some(ticket);
        self.ticket_messages = messages;
    }

    pub(crate) fn apply_vote_added(&mut self, id: FeatureRequestId) {
        self.replace_feature(id, FeatureRequest::with_vote_added);
    }

    pub(crate) fn apply_vote_removed(&mut self, id: FeatureRequestId) {
        self.replace_feature(id, FeatureRequest::with_vote_removed);
    }

    /// Replaces the request with `id` in the list and in the selection with a
    /// rewritten copy. Located by id, never by position.
    fn replace_feature(
        &mut self,
        id: FeatureRequestId,
        rewrite: fn(&FeatureRequest) -> FeatureRequest,
    ) {
        if let Some(slot) = self.feature_requests.iter_mut().find(|f| f.id == id) {
            *slot = rewrite(slot);
        }
        if let Some(selected) = self.selected_feature_request.as_mut() {
            if selected.id == id {
                *selected = rewrite(selected);
            }
        }
    }
}

pub(crate) struct StateWriter {
    tx: watch::Sender<FeedbackState>,
}

impl StateWriter {
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(FeedbackState::default());
        Self { tx }
    }

    /// Applies `mutate` as one change; readers never observe a partial update.
    pub(crate) fn modify(&self, mutate: impl FnOnce(&mut FeedbackState)) {
        self.tx.send_modify(mutate);
    }

    pub(crate) fn snapshot(&self) -> FeedbackState {
        self.tx.borrow().clone()
    }

    pub(crate) fn reader(&self) -> StateReader {
        StateReader {
            rx: self.tx.subscribe(),
        }
    }
}

/// Read-only view onto the feedback state.
#[derive(Clone)]
pub struct StateReader {
    rx: watch::Receiver<FeedbackState>,
}

impl StateReader {
    pub fn snapshot(&self) -> FeedbackState {
        self.rx.borrow().clone()
    }

    /// Waits for the next state change. Returns `false` once the writer is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Runs `read` against the current state without cloning it.
    pub fn with<R>(&self, read: impl FnOnce(&FeedbackState) -> R) -> R {
        read(&self.rx.borrow())
    }
}
