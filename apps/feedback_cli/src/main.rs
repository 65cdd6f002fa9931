use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use client_core::{
    config::{load_settings, DEFAULT_SETTINGS_FILE},
    display::{
        feature_status_label, priority_label, relative_time, ticket_status_label,
        vote_action_for, VoteAction,
    },
    forms::{non_empty_body, FeatureRequestForm, TicketForm},
    spawn_dispatcher, CommandOutcome, DispatcherHandle, FeedbackBackend, FeedbackCommand,
    FeedbackOrchestrator, FeedbackState, HttpFeedbackBackend, PreviewFeedbackBackend,
};
use shared::domain::{
    AuthorType, FeatureComment, FeatureRequest, FeatureRequestId, SupportTicket, TicketId,
    TicketMessage,
};
use tokio::task::JoinHandle;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Feature requests and support tickets from the terminal")]
struct Cli {
    #[arg(long, global = true, default_value = DEFAULT_SETTINGS_FILE)]
    config: PathBuf,
    /// Use built-in sample data instead of the remote API.
    #[arg(long, global = true)]
    preview: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Features,
    Feature {
        id: FeatureRequestId,
    },
    Vote {
        id: FeatureRequestId,
    },
    Unvote {
        id: FeatureRequestId,
    },
    SubmitFeature {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
    },
    Comments {
        id: FeatureRequestId,
    },
    Comment {
        id: FeatureRequestId,
        #[arg(long)]
        body: String,
    },
    Tickets,
    Ticket {
        id: TicketId,
    },
    SubmitTicket {
        #[arg(long)]
        subject: String,
        #[arg(long)]
        body: String,
        #[arg(long)]
        email: Option<String>,
    },
    Reply {
        id: TicketId,
        #[arg(long)]
        body: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();
    let settings = load_settings(&cli.config)?;

    let backend: Arc<dyn FeedbackBackend> = if cli.preview {
        info!("using preview backend");
        Arc::new(PreviewFeedbackBackend::with_sample_data())
    } else {
        info!(base_url = %settings.base_url, "using feedback api");
        Arc::new(HttpFeedbackBackend::from_settings(&settings)?)
    };
    let (handle, task) = spawn_dispatcher(
        FeedbackOrchestrator::new(backend),
        settings.command_queue_capacity,
    );

    let result = execute(&handle, cli.command).await;
    shutdown(handle, task).await?;
    result
}

/// Drops the last handle and waits for queued work to drain.
async fn shutdown(handle: DispatcherHandle, task: JoinHandle<()>) -> Result<()> {
    drop(handle);
    task.await.context("feedback dispatcher panicked")
}

async fn execute(handle: &DispatcherHandle, command: Command) -> Result<()> {
    match command {
        Command::Features => {
            let state = run(handle, FeedbackCommand::FetchFeatureRequests).await?;
            if state.feature_requests.is_empty() {
                println!("No feature requests yet.");
            }
            for feature in &state.feature_requests {
                print_feature_row(feature);
            }
        }
        Command::Feature { id } => {
            let state = run(handle, FeedbackCommand::FetchFeatureRequest { id }).await?;
            if let Some(feature) = &state.selected_feature_request {
                print_feature_detail(feature);
            }
        }
        Command::Vote { id } => change_vote(handle, id, VoteAction::Vote).await?,
        Command::Unvote { id } => change_vote(handle, id, VoteAction::RemoveVote).await?,
        Command::SubmitFeature { title, description } => {
            let form = FeatureRequestForm { title, description }.validate()?;
            submit(
                handle,
                FeedbackCommand::SubmitFeatureRequest {
                    title: form.title,
                    description: form.description,
                },
            )
            .await?;
            let state = handle.reader().snapshot();
            if let Some(created) = state.feature_requests.first() {
                println!("Submitted feature request {}", created.id);
            }
        }
        Command::Comments { id } => {
            let state = run(handle, FeedbackCommand::FetchComments { feature_id: id }).await?;
            print_comments(&state.feature_comments);
        }
        Command::Comment { id, body } => {
            let body = non_empty_body(&body)?;
            run(handle, FeedbackCommand::FetchComments { feature_id: id }).await?;
            submit(handle, FeedbackCommand::AddComment { feature_id: id, body }).await?;
            print_comments(&handle.reader().snapshot().feature_comments);
        }
        Command::Tickets => {
            let state = run(handle, FeedbackCommand::FetchTickets).await?;
            if state.tickets.is_empty() {
                println!("No support tickets.");
            }
            for ticket in &state.tickets {
                print_ticket_row(ticket);
            }
        }
        Command::Ticket { id } => {
            let state = run(handle, FeedbackCommand::FetchTicketDetail { id }).await?;
            if let Some(ticket) = &state.selected_ticket {
                print_ticket_row(ticket);
                print_thread(&state.ticket_messages);
            }
        }
        Command::SubmitTicket {
            subject,
            body,
            email,
        } => {
            let form = TicketForm {
                subject,
                body,
                email: email.unwrap_or_default(),
            }
            .validate()?;
            submit(
                handle,
                FeedbackCommand::SubmitTicket {
                    subject: form.subject,
                    body: form.body,
                    email: form.email,
                },
            )
            .await?;
            if let Some(created) = handle.reader().snapshot().tickets.first() {
                println!("Opened ticket {}", created.id);
            }
        }
        Command::Reply { id, body } => {
            let body = non_empty_body(&body)?;
            submit(handle, FeedbackCommand::ReplyToTicket { ticket_id: id, body }).await?;
            println!("Reply sent.");
        }
    }
    Ok(())
}

/// Runs a command and fails when it left an error in the state.
async fn run(handle: &DispatcherHandle, command: FeedbackCommand) -> Result<FeedbackState> {
    handle.run(command).await?;
    let state = handle.reader().snapshot();
    if let Some(error) = &state.error {
        bail!("{error}");
    }
    Ok(state)
}

async fn submit(handle: &DispatcherHandle, command: FeedbackCommand) -> Result<()> {
    match handle.run(command).await? {
        CommandOutcome::Submitted(true) | CommandOutcome::Completed => Ok(()),
        CommandOutcome::Submitted(false) => match handle.reader().snapshot().error {
            Some(error) => bail!("{error}"),
            None => bail!("submission failed"),
        },
    }
}

async fn change_vote(
    handle: &DispatcherHandle,
    id: FeatureRequestId,
    wanted: VoteAction,
) -> Result<()> {
    let state = run(handle, FeedbackCommand::FetchFeatureRequest { id }).await?;
    if let Some(feature) = &state.selected_feature_request {
        if vote_action_for(feature) != wanted {
            println!("Nothing to change for \"{}\".", feature.title);
            return Ok(());
        }
    }
    let command = match wanted {
        VoteAction::Vote => FeedbackCommand::Vote { id },
        VoteAction::RemoveVote => FeedbackCommand::RemoveVote { id },
    };
    let state = run(handle, command).await?;
    if let Some(feature) = &state.selected_feature_request {
        print_feature_row(feature);
    }
    Ok(())
}

fn print_feature_row(feature: &FeatureRequest) {
    let marker = if feature.has_voted { "*" } else { " " };
    println!(
        "{marker}{:>4}  {:<12} {}  ({} comments)  {}",
        feature.vote_count,
        feature_status_label(feature.status),
        feature.title,
        feature.comment_count,
        feature.id,
    );
}

fn print_feature_detail(feature: &FeatureRequest) {
    print_feature_row(feature);
    println!("      {}", feature.description);
    println!(
        "      opened {}, updated {}",
        relative_time(feature.created_at, Utc::now()),
        relative_time(feature.updated_at, Utc::now()),
    );
}

fn print_comments(comments: &[FeatureComment]) {
    if comments.is_empty() {
        println!("No comments yet.");
    }
    let now = Utc::now();
    for comment in comments {
        println!(
            "[{}] {}: {}",
            relative_time(comment.created_at, now),
            author_label(comment.author_type),
            comment.body
        );
    }
}

fn print_ticket_row(ticket: &SupportTicket) {
    println!(
        "{:<15} {:<7} {}  ({} messages, updated {})  {}",
        ticket_status_label(ticket.status),
        priority_label(ticket.priority),
        ticket.subject,
        ticket.message_count,
        relative_time(ticket.updated_at, Utc::now()),
        ticket.id,
    );
}

fn print_thread(messages: &[TicketMessage]) {
    let now = Utc::now();
    for message in messages {
        println!(
            "  [{}] {}: {}",
            relative_time(message.created_at, now),
            author_label(message.author_type),
            message.body
        );
    }
}

fn author_label(author: AuthorType) -> &'static str {
    match author {
        AuthorType::User => "You",
        AuthorType::Admin => "Support",
    }
}
