use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new_random() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Display::fmt(&self.0, f)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim()).map(Self)
            }
        }
    };
}

id_newtype!(FeatureRequestId);
id_newtype!(FeatureCommentId);
id_newtype!(TicketId);
id_newtype!(TicketMessageId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureRequestStatus {
    Pending,
    Open,
    Planned,
    InProgress,
    Shipped,
    Declined,
    Duplicate,
}

impl FeatureRequestStatus {
    pub const ALL: [Self; 7] = [
        Self::Pending,
        Self::Open,
        Self::Planned,
        Self::InProgress,
        Self::Shipped,
        Self::Declined,
        Self::Duplicate,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorType {
    User,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    AwaitingReply,
    Resolved,
    Closed,
}

impl TicketStatus {
    pub const ALL: [Self; 4] = [
        Self::Open,
        Self::AwaitingReply,
        Self::Resolved,
        Self::Closed,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority {
    Low,
    Normal,
    High,
    Urgent,
}

impl TicketPriority {
    pub const ALL: [Self; 4] = [Self::Low, Self::Normal, Self::High, Self::Urgent];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureRequest {
    pub id: FeatureRequestId,
    pub title: String,
    pub description: String,
    pub status: FeatureRequestStatus,
    pub vote_count: u32,
    pub has_voted: bool,
    pub comment_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FeatureRequest {
    /// Copy of this request reflecting a successful vote by the current user.
    pub fn with_vote_added(&self) -> Self {
        Self {
            vote_count: self.vote_count.saturating_add(1),
            has_voted: true,
            ..self.clone()
        }
    }

    /// Copy of this request reflecting a removed vote. The count floors at zero.
    pub fn with_vote_removed(&self) -> Self {
        Self {
            vote_count: self.vote_count.saturating_sub(1),
            has_voted: false,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureComment {
    pub id: FeatureCommentId,
    pub feature_request_id: FeatureRequestId,
    pub author_type: AuthorType,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportTicket {
    pub id: TicketId,
    pub subject: String,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub message_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketMessage {
    pub id: TicketMessageId,
    pub ticket_id: TicketId,
    pub author_type: AuthorType,
    pub body: String,
    pub created_at: DateTime<Utc>,
}
