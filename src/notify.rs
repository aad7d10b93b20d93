use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::{
    models::{Direction, TransferState},
    progress::{format_bytes, format_eta, format_speed},
    ui::UiState,
    AltSendService,
};

pub const NOTIFICATION_TITLE: &str = "AltSend";

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub direction: Direction,
    pub title: String,
    pub text: String,
    /// `(done, total)` while bytes are moving.
    pub progress: Option<(u64, u64)>,
    /// Ongoing notifications can't be swiped away and carry a cancel action.
    pub ongoing: bool,
}

impl Notification {
    pub fn from_state(state: &UiState) -> Option<Self> {
        let verb = match state.direction {
            Direction::Send => "Sending",
            Direction::Receive => "Receiving",
        };

        let (text, progress) = match state.phase {
            TransferState::Idle => return None,
            TransferState::Preparing => ("Preparing...".to_string(), None),
            TransferState::Listening => ("Waiting for the receiver".to_string(), None),
            TransferState::Connecting => ("Connecting to the sender".to_string(), None),
            TransferState::Transferring => match &state.progress {
                Some(p) => {
                    let mut text = format!(
                        "{verb} {:.0}% · {}",
                        p.percentage,
                        format_speed(p.speed_bps)
                    );
                    if let Some(eta) = p.eta_seconds {
                        text.push_str(&format!(" · {} left", format_eta(eta)));
                    }
                    (text, Some((p.bytes_transferred, p.total_bytes)))
                }
                None => (format!("{verb}..."), None),
            },
            TransferState::Completed => {
                let text = match &state.completion {
                    Some(meta) => format!(
                        "Transfer complete: {} ({})",
                        meta.file_name,
                        format_bytes(meta.file_size)
                    ),
                    None => "Transfer complete".to_string(),
                };
                (text, None)
            }
            TransferState::Failed => (
                format!(
                    "Transfer failed: {}",
                    state.error.as_deref().unwrap_or("unknown error")
                ),
                None,
            ),
            TransferState::Stopped => ("Transfer stopped".to_string(), None),
        };

        Some(Self {
            direction: state.direction,
            title: NOTIFICATION_TITLE.to_string(),
            text,
            progress,
            ongoing: state.phase.is_active(),
        })
    }
}

pub trait NotificationSink: Send + Sync + 'static {
    fn show(&self, notification: &Notification);
    fn dismiss(&self, direction: Direction);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn show(&self, notification: &Notification) {
        log::info!(
            "[{} {}] {}",
            notification.title,
            notification.direction,
            notification.text
        );
    }

    fn dismiss(&self, direction: Direction) {
        log::debug!("dismissing {direction} notification");
    }
}

/// Pushes a notification for every change of `direction`'s state until the service is dropped.
pub fn spawn_notifier(
    service: &AltSendService,
    direction: Direction,
    sink: Arc<dyn NotificationSink>,
) -> JoinHandle<()> {
    let mut state = service.watch_state(direction);
    tokio::spawn(async move {
        loop {
            let current = state.borrow_and_update().clone();
            match Notification::from_state(&current) {
                Some(notification) => sink.show(&notification),
                None => sink.dismiss(direction),
            }
            if state.changed().await.is_err() {
                break;
            }
        }
    })
}
