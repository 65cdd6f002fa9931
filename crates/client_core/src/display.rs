//! Text helpers for rendering feedback entities.

use chrono::{DateTime, Utc};
use shared::domain::{FeatureRequest, FeatureRequestStatus, TicketPriority, TicketStatus};

pub fn feature_status_label(status: FeatureRequestStatus) -> &'static str {
    match status {
        FeatureRequestStatus::Pending => "Pending",
        FeatureRequestStatus::Open => "Open",
        FeatureRequestStatus::Planned => "Planned",
        FeatureRequestStatus::InProgress => "In Progress",
        FeatureRequestStatus::Shipped => "Shipped",
        FeatureRequestStatus::Declined => "Declined",
        FeatureRequestStatus::Duplicate => "Duplicate",
    }
}

pub fn ticket_status_label(status: TicketStatus) -> &'static str {
    match status {
        TicketStatus::Open => "Open",
        TicketStatus::AwaitingReply => "Awaiting Reply",
        TicketStatus::Resolved => "Resolved",
        TicketStatus::Closed => "Closed",
    }
}

pub fn priority_label(priority: TicketPriority) -> &'static str {
    match priority {
        TicketPriority::Low => "Low",
        TicketPriority::Normal => "Normal",
        TicketPriority::High => "High",
        TicketPriority::Urgent => "Urgent",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteAction {
    Vote,
    RemoveVote,
}

/// The vote button toggles: voted features get their vote removed.
pub fn vote_action_for(feature: &FeatureRequest) -> VoteAction {
    if feature.has_voted {
        VoteAction::RemoveVote
    } else {
        VoteAction::Vote
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit}")
    } else {
        format!("{n} {unit}s")
    }
}

/// Named relative phrase for `then` as seen from `now`, e.g. "3 hours ago".
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = now.signed_duration_since(then);
    let future = delta.num_seconds() < 0;
    let secs = delta.num_seconds().abs();

    if secs < 45 {
        return "just now".to_string();
    }

    let minutes = (secs + 30) / 60;
    let hours = (secs + 1800) / 3600;
    let days = (secs + 43_200) / 86_400;

    if days == 1 && hours >= 24 {
        return if future { "tomorrow" } else { "yesterday" }.to_string();
    }

    let phrase = if minutes < 60 {
        plural(minutes, "minute")
    } else if hours < 24 {
        plural(hours, "hour")
    } else if days < 30 {
        plural(days, "day")
    } else if days < 365 {
        plural(days / 30, "month")
    } else {
        plural(days / 365, "year")
    };

    if future {
        format!("in {phrase}")
    } else {
        format!("{phrase} ago")
    }
}
