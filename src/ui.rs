pub mod store;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use store::StateStore;

use crate::{
    error::AltSendError,
    models::{
        Direction, EntryKind, SessionEvent, TransferDescriptor, TransferEvent, TransferMetadata,
        TransferProgress, TransferState, TransferSummary,
    },
    ticket::{Ticket, DEFAULT_FILE_NAME},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedFile {
    pub path: PathBuf,
    pub name: String,
    pub size: Option<u64>,
}

impl SelectedFile {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let size = path.metadata().ok().map(|m| m.len());
        Self { path, name, size }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    SelectFile(SelectedFile),
    EditTicketText(String),
    SelectOutputDir(PathBuf),
    RequestStart,
    RequestStop,
    Reset,
    DismissError,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Intent(Intent),
    Event(SessionEvent),
}

impl From<Intent> for Input {
    fn from(intent: Intent) -> Self {
        Input::Intent(intent)
    }
}

impl From<SessionEvent> for Input {
    fn from(event: SessionEvent) -> Self {
        Input::Event(event)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiState {
    pub direction: Direction,
    pub phase: TransferState,
    /// The session whose events this state follows.
    pub session: Option<Uuid>,
    pub selected: Option<SelectedFile>,
    pub ticket_text: String,
    pub output_dir: Option<PathBuf>,
    pub ticket: Option<Ticket>,
    pub descriptor: Option<TransferDescriptor>,
    pub progress: Option<TransferProgress>,
    pub file_names: Vec<String>,
    pub error: Option<String>,
    pub show_error_dialog: bool,
    pub completion: Option<TransferMetadata>,
}

impl UiState {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            phase: TransferState::Idle,
            session: None,
            selected: None,
            ticket_text: String::new(),
            output_dir: None,
            ticket: None,
            descriptor: None,
            progress: None,
            file_names: Vec::new(),
            error: None,
            show_error_dialog: false,
            completion: None,
        }
    }

    fn with_error(mut self, error: String) -> Self {
        self.error = Some(error);
        self.show_error_dialog = true;
        self
    }

    /// Drops everything that belonged to the previous session, keeping user inputs.
    fn begin_session(mut self, session: Option<Uuid>) -> Self {
        self.phase = TransferState::Preparing;
        self.session = session;
        self.ticket = None;
        self.descriptor = None;
        self.progress = None;
        self.file_names.clear();
        self.error = None;
        self.show_error_dialog = false;
        self.completion = None;
        self
    }

    fn completion_name(&self) -> String {
        let from_descriptor = self.descriptor.as_ref().map(|d| d.name.clone());
        match self.direction {
            Direction::Send => self
                .selected
                .as_ref()
                .map(|f| f.name.clone())
                .filter(|n| !n.is_empty())
                .or(from_descriptor)
                .unwrap_or_else(|| "Unknown".to_string()),
            Direction::Receive => self
                .file_names
                .first()
                .cloned()
                .or(from_descriptor)
                .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string()),
        }
    }

    fn completion_metadata(&self, summary: TransferSummary) -> TransferMetadata {
        TransferMetadata {
            file_name: self.completion_name(),
            file_size: summary.total_bytes,
            duration: summary.elapsed,
            average_speed: summary.average_speed,
            is_directory: self
                .descriptor
                .as_ref()
                .is_some_and(|d| d.kind == EntryKind::Directory),
            output_path: summary.output_path,
            completed_at: summary.finished_at,
        }
    }
}

pub fn reduce(prior: UiState, input: Input) -> UiState {
    match input {
        Input::Intent(intent) => reduce_intent(prior, intent),
        Input::Event(event) => reduce_event(prior, event),
    }
}

fn reduce_intent(mut state: UiState, intent: Intent) -> UiState {
    match intent {
        Intent::SelectFile(file) => {
            if !state.phase.is_active() {
                state.selected = Some(file);
                state.error = None;
            }
            state
        }
        Intent::EditTicketText(text) => {
            state.ticket_text = text;
            state
        }
        Intent::SelectOutputDir(dir) => {
            state.output_dir = Some(dir);
            state
        }
        Intent::RequestStart => {
            if state.phase.is_terminal() || state.phase == TransferState::Preparing {
                return state;
            }
            match state.direction {
                Direction::Send if state.selected.is_none() => {
                    state.with_error(AltSendError::NoFileSelected.to_string())
                }
                Direction::Receive if state.ticket_text.trim().is_empty() => {
                    state.with_error(AltSendError::EmptyTicket.to_string())
                }
                _ => state.begin_session(None),
            }
        }
        Intent::RequestStop => {
            if state.phase.is_active() {
                state.phase = TransferState::Stopped;
            }
            state
        }
        Intent::Reset => {
            let mut next = UiState::new(state.direction);
            if state.direction == Direction::Receive {
                next.output_dir = state.output_dir;
            }
            next
        }
        Intent::DismissError => {
            state.show_error_dialog = false;
            state
        }
    }
}

// only the adopted session counts, and nothing after it finished
fn reduce_event(state: UiState, event: SessionEvent) -> UiState {
    if event.direction != state.direction {
        return state;
    }

    if event.event == TransferEvent::Preparing {
        if state.session == Some(event.session) {
            return state;
        }
        return state.begin_session(Some(event.session));
    }

    if state.session != Some(event.session) {
        log::debug!(
            "ignoring {:?} from session {} (following {:?})",
            event.event,
            event.session,
            state.session
        );
        return state;
    }

    if state.phase.is_terminal() {
        return state;
    }

    let mut state = state;
    match event.event {
        TransferEvent::Preparing => {}
        TransferEvent::Ready { descriptor, ticket } => {
            if state.phase == TransferState::Preparing {
                state.phase = state.direction.waiting_state();
                state.descriptor = Some(descriptor);
                state.ticket = ticket;
            }
        }
        TransferEvent::Started => {
            if matches!(
                state.phase,
                TransferState::Preparing | TransferState::Listening | TransferState::Connecting
            ) {
                state.phase = TransferState::Transferring;
            }
        }
        TransferEvent::Progress(progress) => {
            state.progress = Some(progress);
        }
        TransferEvent::FileNames(names) => {
            state.file_names = names;
        }
        TransferEvent::Completed(summary) => {
            state.completion = Some(state.completion_metadata(summary));
            state.phase = TransferState::Completed;
        }
        TransferEvent::Failed(reason) => {
            state.phase = TransferState::Failed;
            state = state.with_error(reason);
        }
        TransferEvent::Stopped => {
            state.phase = TransferState::Stopped;
        }
    }
    state
}
