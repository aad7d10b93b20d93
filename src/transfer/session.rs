use std::path::PathBuf;

use chrono::Utc;
use tokio::time::Instant;
use uuid::Uuid;

use crate::{
    bus::EventBus,
    models::{
        Direction, SessionEvent, TransferDescriptor, TransferEvent, TransferState, TransferSummary,
    },
    progress,
    ticket::{Ticket, DEFAULT_FILE_NAME},
};

/// Whether `from -> to` is a legal lifecycle step for a session of `direction`.
pub fn can_transition(direction: Direction, from: TransferState, to: TransferState) -> bool {
    use TransferState::*;
    match (from, to) {
        (Idle, Preparing) => true,
        (Preparing, Failed | Stopped) => true,
        (Preparing, waiting) => waiting == direction.waiting_state(),
        (Listening | Connecting, Transferring | Failed | Stopped) => {
            from == direction.waiting_state()
        }
        (Transferring, Completed | Failed | Stopped) => true,
        (Completed | Failed | Stopped, Idle) => true,
        _ => false,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub direction: Direction,
    pub state: TransferState,
    pub descriptor: Option<TransferDescriptor>,
    pub ticket: Option<Ticket>,
    pub bytes_transferred: u64,
    pub file_names: Vec<String>,
}

/// One send or receive operation. Every visible transition publishes exactly one event.
#[derive(Debug)]
pub struct TransferSession {
    id: Uuid,
    direction: Direction,
    state: TransferState,
    descriptor: Option<TransferDescriptor>,
    ticket: Option<Ticket>,
    transferred: u64,
    started_at: Option<Instant>,
    file_names: Vec<String>,
    bus: EventBus,
}

impl TransferSession {
    pub fn new(direction: Direction, bus: EventBus) -> Self {
        Self {
            id: Uuid::new_v4(),
            direction,
            state: TransferState::Idle,
            descriptor: None,
            ticket: None,
            transferred: 0,
            started_at: None,
            file_names: Vec::new(),
            bus,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            direction: self.direction,
            state: self.state,
            descriptor: self.descriptor.clone(),
            ticket: self.ticket.clone(),
            bytes_transferred: self.transferred,
            file_names: self.file_names.clone(),
        }
    }

    pub fn receive_name(&self) -> String {
        self.file_names
            .first()
            .cloned()
            .or_else(|| self.descriptor.as_ref().map(|d| d.name.clone()))
            .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string())
    }

    fn transition(&mut self, to: TransferState) -> bool {
        if !can_transition(self.direction, self.state, to) {
            log::debug!(
                "{} session {}: ignoring {:?} -> {to:?}",
                self.direction,
                self.id,
                self.state
            );
            return false;
        }
        log::info!(
            "{} session {}: {:?} -> {to:?}",
            self.direction,
            self.id,
            self.state
        );
        self.state = to;
        true
    }

    fn emit(&self, event: TransferEvent) {
        self.bus.publish(SessionEvent {
            session: self.id,
            direction: self.direction,
            event,
        });
    }

    pub fn begin_preparing(&mut self) -> bool {
        if !self.transition(TransferState::Preparing) {
            return false;
        }
        self.emit(TransferEvent::Preparing);
        true
    }

    pub fn ready(&mut self, descriptor: TransferDescriptor, ticket: Option<Ticket>) -> bool {
        if !self.transition(self.direction.waiting_state()) {
            return false;
        }
        self.descriptor = Some(descriptor.clone());
        self.ticket = ticket.clone();
        self.started_at = Some(Instant::now());
        self.emit(TransferEvent::Ready { descriptor, ticket });
        true
    }

    fn total(&self) -> u64 {
        self.descriptor.as_ref().map(|d| d.size).unwrap_or_default()
    }

    fn elapsed(&self) -> std::time::Duration {
        self.started_at.map(|t| t.elapsed()).unwrap_or_default()
    }

    fn mark_started(&mut self) -> bool {
        if self.state == TransferState::Transferring {
            return true;
        }
        if !self.transition(TransferState::Transferring) {
            return false;
        }
        self.emit(TransferEvent::Started);
        true
    }

    /// Applies a cumulative byte count. Counts that go backwards are dropped.
    pub fn apply_progress(&mut self, bytes: u64) {
        if !matches!(
            self.state,
            TransferState::Listening | TransferState::Connecting | TransferState::Transferring
        ) {
            return;
        }

        let bytes = bytes.min(self.total());
        if bytes < self.transferred {
            log::trace!("session {}: stale tick {bytes} < {}", self.id, self.transferred);
            return;
        }
        if bytes == 0 && self.state != TransferState::Transferring {
            return;
        }
        if !self.mark_started() {
            return;
        }

        self.transferred = bytes;
        let snapshot = progress::snapshot(bytes, self.total(), self.elapsed());
        log::trace!(
            "session {}: {}/{} bytes ({:.1}%)",
            self.id,
            bytes,
            snapshot.total_bytes,
            snapshot.percentage
        );
        self.emit(TransferEvent::Progress(snapshot));
    }

    pub fn record_file_names(&mut self, names: Vec<String>) {
        if !self.state.is_active() || self.state == TransferState::Preparing {
            return;
        }
        self.file_names = names.clone();
        self.emit(TransferEvent::FileNames(names));
    }

    /// A session that never saw a non-zero tick is marked started first.
    pub fn complete(&mut self, output_path: Option<PathBuf>) -> bool {
        if !self.mark_started() {
            return false;
        }
        if !self.transition(TransferState::Completed) {
            return false;
        }

        let total = self.total();
        self.transferred = total;
        let elapsed = self.elapsed();
        self.emit(TransferEvent::Completed(TransferSummary {
            total_bytes: total,
            elapsed,
            average_speed: progress::throughput(total, elapsed),
            output_path,
            finished_at: Utc::now(),
        }));
        true
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> bool {
        if !self.transition(TransferState::Failed) {
            return false;
        }
        let reason = reason.into();
        log::warn!("{} session {} failed: {reason}", self.direction, self.id);
        self.emit(TransferEvent::Failed(reason));
        true
    }

    /// User cancellation. Nothing is emitted for this session afterwards.
    pub fn stop(&mut self) -> bool {
        if !self.transition(TransferState::Stopped) {
            return false;
        }
        self.emit(TransferEvent::Stopped);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bus::Subscription, models::EntryKind};

    fn descriptor(size: u64) -> TransferDescriptor {
        TransferDescriptor {
            content_id: "cd".repeat(32),
            name: "movie.mkv".into(),
            size,
            kind: EntryKind::File,
        }
    }

    fn drain(sub: &mut Subscription) -> Vec<TransferEvent> {
        std::iter::from_fn(|| sub.try_recv()).map(|e| e.event).collect()
    }

    #[test]
    fn transition_table() {
        use TransferState::*;
        let send = Direction::Send;
        assert!(can_transition(send, Idle, Preparing));
        assert!(can_transition(send, Preparing, Listening));
        assert!(!can_transition(send, Preparing, Connecting));
        assert!(can_transition(Direction::Receive, Preparing, Connecting));
        assert!(can_transition(send, Preparing, Failed));
        assert!(can_transition(send, Listening, Transferring));
        assert!(!can_transition(send, Listening, Completed));
        assert!(can_transition(send, Transferring, Completed));
        assert!(can_transition(send, Stopped, Idle));
        assert!(!can_transition(send, Completed, Failed));
        assert!(!can_transition(send, Stopped, Completed));
        assert!(!can_transition(send, Idle, Transferring));
    }

    #[tokio::test(start_paused = true)]
    async fn full_lifecycle_emits_ordered_events() {
        let bus = EventBus::new(64);
        let mut sub = bus.subscribe();
        let mut session = TransferSession::new(Direction::Send, bus);

        assert!(session.begin_preparing());
        assert!(session.ready(descriptor(2048), None));
        session.apply_progress(0);
        tokio::time::advance(std::time::Duration::from_secs(1)).await;
        session.apply_progress(1024);
        session.apply_progress(512);
        session.apply_progress(2048);
        assert!(session.complete(None));

        let events = drain(&mut sub);
        assert_eq!(events.len(), 6);
        assert_eq!(events[0], TransferEvent::Preparing);
        assert!(matches!(events[1], TransferEvent::Ready { .. }));
        assert_eq!(events[2], TransferEvent::Started);
        assert!(matches!(
            &events[3],
            TransferEvent::Progress(p) if p.bytes_transferred == 1024 && p.speed_bps == 1024.0
        ));
        assert!(matches!(&events[4], TransferEvent::Progress(p) if p.percentage == 100.0));
        assert!(matches!(&events[5], TransferEvent::Completed(s) if s.total_bytes == 2048));
    }

    #[tokio::test]
    async fn stopped_session_stays_silent() {
        let bus = EventBus::new(64);
        let mut sub = bus.subscribe();
        let mut session = TransferSession::new(Direction::Receive, bus);

        session.begin_preparing();
        session.ready(descriptor(4096), None);
        assert!(session.stop());
        assert!(!session.stop());
        session.apply_progress(1024);
        session.record_file_names(vec!["late".into()]);
        assert!(!session.complete(None));
        assert!(!session.fail("late"));

        let events = drain(&mut sub);
        assert_eq!(events.last(), Some(&TransferEvent::Stopped));
        assert_eq!(events.len(), 3);
        assert_eq!(session.state(), TransferState::Stopped);
    }

    #[tokio::test]
    async fn empty_transfer_still_starts_before_completing() {
        let bus = EventBus::new(64);
        let mut sub = bus.subscribe();
        let mut session = TransferSession::new(Direction::Send, bus);

        session.begin_preparing();
        session.ready(descriptor(0), None);
        assert!(session.complete(None));

        let events = drain(&mut sub);
        assert_eq!(events[2], TransferEvent::Started);
        assert!(matches!(events[3], TransferEvent::Completed(_)));
    }

    #[tokio::test]
    async fn failure_during_preparation() {
        let bus = EventBus::new(64);
        let mut sub = bus.subscribe();
        let mut session = TransferSession::new(Direction::Receive, bus);

        session.begin_preparing();
        assert!(session.fail("Invalid ticket format"));
        assert!(!session.ready(descriptor(1), None));

        let events = drain(&mut sub);
        assert_eq!(
            events,
            vec![
                TransferEvent::Preparing,
                TransferEvent::Failed("Invalid ticket format".into())
            ]
        );
    }

    #[test]
    fn receive_name_prefers_reported_names() {
        let mut session = TransferSession::new(Direction::Receive, EventBus::new(4));
        assert_eq!(session.receive_name(), DEFAULT_FILE_NAME);
        session.begin_preparing();
        session.ready(descriptor(10), None);
        assert_eq!(session.receive_name(), "movie.mkv");
        session.record_file_names(vec!["a.txt".into(), "b.txt".into()]);
        assert_eq!(session.receive_name(), "a.txt");
    }
}
