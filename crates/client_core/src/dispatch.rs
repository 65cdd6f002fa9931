//! Single-writer command queue in front of [`FeedbackOrchestrator`].
//!
//! One task owns the orchestrator. Commands are driven concurrently inside
//! that task, so remote calls overlap but every state write happens there.

use futures::{stream::FuturesUnordered, StreamExt};
use shared::domain::{FeatureRequestId, TicketId};
use thiserror::Error;
use tokio::{
    sync::{
        mpsc::{self, error::TrySendError},
        oneshot,
    },
    task::JoinHandle,
};
use tracing::debug;

use crate::{FeedbackOrchestrator, StateReader};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackCommand {
    FetchFeatureRequests,
    FetchFeatureRequest {
        id: FeatureRequestId,
    },
    SubmitFeatureRequest {
        title: String,
        description: String,
    },
    Vote {
        id: FeatureRequestId,
    },
    RemoveVote {
        id: FeatureRequestId,
    },
    FetchComments {
        feature_id: FeatureRequestId,
    },
    AddComment {
        feature_id: FeatureRequestId,
        body: String,
    },
    FetchTickets,
    FetchTicketDetail {
        id: TicketId,
    },
    SubmitTicket {
        subject: String,
        body: String,
        email: Option<String>,
    },
    ReplyToTicket {
        ticket_id: TicketId,
        body: String,
    },
}

impl FeedbackCommand {
    pub fn name(&self) -> &'static str {
        match self {
            FeedbackCommand::FetchFeatureRequests => "fetch_feature_requests",
            FeedbackCommand::FetchFeatureRequest { .. } => "fetch_feature_request",
            FeedbackCommand::SubmitFeatureRequest { .. } => "submit_feature_request",
            FeedbackCommand::Vote { .. } => "vote",
            FeedbackCommand::RemoveVote { .. } => "remove_vote",
            FeedbackCommand::FetchComments { .. } => "fetch_comments",
            FeedbackCommand::AddComment { .. } => "add_comment",
            FeedbackCommand::FetchTickets => "fetch_tickets",
            FeedbackCommand::FetchTicketDetail { .. } => "fetch_ticket_detail",
            FeedbackCommand::SubmitTicket { .. } => "submit_ticket",
            FeedbackCommand::ReplyToTicket { .. } => "reply_to_ticket",
        }
    }
}

/// What a finished command reports back to a waiting caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// A fetch or vote ran to completion; check the state for its result.
    Completed,
    /// A submit-style command finished; `true` only on success.
    Submitted(bool),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("feedback command queue is full; please retry")]
    QueueFull,
    #[error("feedback dispatcher has stopped")]
    Closed,
}

struct Envelope {
    command: FeedbackCommand,
    reply: Option<oneshot::Sender<CommandOutcome>>,
}

#[derive(Clone)]
pub struct DispatcherHandle {
    tx: mpsc::Sender<Envelope>,
    reader: StateReader,
}

impl DispatcherHandle {
    pub fn reader(&self) -> StateReader {
        self.reader.clone()
    }

    /// Queues a command without waiting for it to run.
    pub async fn dispatch(&self, command: FeedbackCommand) -> Result<(), DispatchError> {
        self.tx
            .send(Envelope {
                command,
                reply: None,
            })
            .await
            .map_err(|_| DispatchError::Closed)
    }

    pub fn try_dispatch(&self, command: FeedbackCommand) -> Result<(), DispatchError> {
        let name = command.name();
        match self.tx.try_send(Envelope {
            command,
            reply: None,
        }) {
            Ok(()) => {
                debug!(command = name, "queued feedback command");
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(DispatchError::QueueFull),
            Err(TrySendError::Closed(_)) => Err(DispatchError::Closed),
        }
    }

    /// Queues a command and waits until its state merge has been applied.
    pub async fn run(&self, command: FeedbackCommand) -> Result<CommandOutcome, DispatchError> {
        let (reply, done) = oneshot::channel();
        self.tx
            .send(Envelope {
                command,
                reply: Some(reply),
            })
            .await
            .map_err(|_| DispatchError::Closed)?;
        done.await.map_err(|_| DispatchError::Closed)
    }
}

/// Moves `orchestrator` onto its own task and returns a handle for feeding it.
/// The task ends once every handle is dropped and in-flight commands finish.
pub fn spawn_dispatcher(
    orchestrator: FeedbackOrchestrator,
    capacity: usize,
) -> (DispatcherHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let reader = orchestrator.subscribe();
    let task = tokio::spawn(drive(orchestrator, rx));
    (DispatcherHandle { tx, reader }, task)
}

async fn drive(orchestrator: FeedbackOrchestrator, mut rx: mpsc::Receiver<Envelope>) {
    let orchestrator = &orchestrator;
    let mut in_flight = FuturesUnordered::new();
    let mut accepting = true;

    loop {
        tokio::select! {
            received = rx.recv(), if accepting => match received {
                Some(envelope) => in_flight.push(execute(orchestrator, envelope)),
                None => accepting = false,
            },
            Some(()) = in_flight.next(), if !in_flight.is_empty() => {}
            else => break,
        }
    }

    debug!("feedback dispatcher stopped");
}

async fn execute(orchestrator: &FeedbackOrchestrator, envelope: Envelope) {
    let Envelope { command, reply } = envelope;
    debug!(command = command.name(), "running feedback command");

    let outcome = match command {
        FeedbackCommand::FetchFeatureRequests => {
            orchestrator.fetch_feature_requests().await;
            CommandOutcome::Completed
        }
        FeedbackCommand::FetchFeatureRequest { id } => {
            orchestrator.fetch_feature_request(id).await;
            CommandOutcome::Completed
        }
        FeedbackCommand::SubmitFeatureRequest { title, description } => CommandOutcome::Submitted(
            orchestrator
                .submit_feature_request(&title, &description)
                .await,
        ),
        FeedbackCommand::Vote { id } => {
            orchestrator.vote(id).await;
            CommandOutcome::Completed
        }
        FeedbackCommand::RemoveVote { id } => {
            orchestrator.remove_vote(id).await;
            CommandOutcome::Completed
        }
        FeedbackCommand::FetchComments { feature_id } => {
            orchestrator.fetch_comments(feature_id).await;
            CommandOutcome::Completed
        }
        FeedbackCommand::AddComment { feature_id, body } => {
            CommandOutcome::Submitted(orchestrator.add_comment(feature_id, &body).await)
        }
        FeedbackCommand::FetchTickets => {
            orchestrator.fetch_tickets().await;
            CommandOutcome::Completed
        }
        FeedbackCommand::FetchTicketDetail { id } => {
            orchestrator.fetch_ticket_detail(id).await;
            CommandOutcome::Completed
        }
        FeedbackCommand::SubmitTicket {
            subject,
            body,
            email,
        } => CommandOutcome::Submitted(
            orchestrator
                .submit_ticket(&subject, &body, email.as_deref())
                .await,
        ),
        FeedbackCommand::ReplyToTicket { ticket_id, body } => {
            CommandOutcome::Submitted(orchestrator.reply_to_ticket(ticket_id, &body).await)
        }
    };

    if let Some(reply) = reply {
        let _ = reply.send(outcome);
    }
}

#[cfg(test)]
#[path = "tests/dispatch_tests.rs"]
mod tests;
