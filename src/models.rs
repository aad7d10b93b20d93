use std::{fmt, path::PathBuf, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ticket::Ticket;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Send,
    Receive,
}

impl Direction {
    /// The state a session of this direction waits in once the driver has been asked to begin.
    pub fn waiting_state(self) -> TransferState {
        match self {
            Direction::Send => TransferState::Listening,
            Direction::Receive => TransferState::Connecting,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Send => write!(f, "send"),
            Direction::Receive => write!(f, "receive"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// What is on offer: created once when a send session starts and embedded in its ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferDescriptor {
    pub content_id: String,
    pub name: String,
    pub size: u64,
    pub kind: EntryKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransferState {
    #[default]
    Idle,
    Preparing,
    Listening,
    Connecting,
    Transferring,
    Completed,
    Failed,
    Stopped,
}

impl TransferState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferState::Completed | TransferState::Failed | TransferState::Stopped
        )
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal() && *self != TransferState::Idle
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferProgress {
    pub bytes_transferred: u64,
    pub total_bytes: u64,
    pub speed_bps: f64,
    pub percentage: f64,
    pub eta_seconds: Option<u64>,
}

impl TransferProgress {
    pub fn is_complete(&self) -> bool {
        self.total_bytes > 0 && self.bytes_transferred >= self.total_bytes
    }
}

/// Attached to `Completed` so observers can build completion metadata without a clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferSummary {
    pub total_bytes: u64,
    pub elapsed: Duration,
    pub average_speed: f64,
    pub output_path: Option<PathBuf>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransferEvent {
    Preparing,
    Ready {
        descriptor: TransferDescriptor,
        ticket: Option<Ticket>,
    },
    Started,
    Progress(TransferProgress),
    FileNames(Vec<String>),
    Completed(TransferSummary),
    Failed(String),
    Stopped,
}

impl TransferEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferEvent::Completed(_) | TransferEvent::Failed(_) | TransferEvent::Stopped
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub session: Uuid,
    pub direction: Direction,
    pub event: TransferEvent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferMetadata {
    pub file_name: String,
    pub file_size: u64,
    pub duration: Duration,
    pub average_speed: f64,
    pub is_directory: bool,
    pub output_path: Option<PathBuf>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayMode {
    Disabled,
    #[default]
    Default,
    Custom {
        url: String,
    },
}
