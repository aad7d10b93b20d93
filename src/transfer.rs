pub mod session;

use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
};
use uuid::Uuid;

pub use session::{SessionSnapshot, TransferSession};

use crate::{
    bus::{EventBus, Subscription},
    config::Config,
    driver::{CancelHandle, DriverRequest, DriverTick, TransferDriver},
    error::{AltSendError, Result},
    models::{Direction, RelayMode, TransferDescriptor, TransferState},
    storage::Storage,
    ticket::{self, Ticket},
};

#[derive(Debug, Clone, PartialEq)]
pub struct SessionStart {
    pub session: Uuid,
    pub descriptor: TransferDescriptor,
    /// Only set for sends; this is what the receiver redeems.
    pub ticket: Option<Ticket>,
}

struct ActiveSession {
    session: Arc<Mutex<TransferSession>>,
    cancel: Option<CancelHandle>,
    task: Option<JoinHandle<()>>,
}

pub struct SessionManager {
    direction: Direction,
    driver: Arc<dyn TransferDriver>,
    storage: Arc<dyn Storage>,
    bus: EventBus,
    relay_mode: RelayMode,
    size_fallback: bool,
    download_dir: PathBuf,
    current: Mutex<Option<ActiveSession>>,
    closed: AtomicBool,
}

impl SessionManager {
    pub fn new(
        direction: Direction,
        driver: Arc<dyn TransferDriver>,
        storage: Arc<dyn Storage>,
        config: &Config,
    ) -> Self {
        Self {
            direction,
            driver,
            storage,
            bus: EventBus::new(config.event_capacity),
            relay_mode: config.relay_mode.clone(),
            size_fallback: config.size_fallback,
            download_dir: config.download_dir.clone(),
            current: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    pub fn subscribe(&self) -> Subscription {
        self.bus.subscribe()
    }

    pub async fn start_send(&self, path: impl AsRef<Path>) -> Result<SessionStart> {
        debug_assert_eq!(self.direction, Direction::Send);
        let path = path.as_ref();

        let session = {
            let mut current = self.current.lock().await;
            self.open(&mut current).await?
        };

        // measured and hashed without holding the slot
        let descriptor = match self.describe(path).await {
            Ok(d) => d,
            Err(e) => return Err(reject(&session, e).await),
        };

        let mut current = self.current.lock().await;
        let owned = current
            .as_ref()
            .is_some_and(|active| Arc::ptr_eq(&active.session, &session));
        {
            let mut s = session.lock().await;
            if !owned || s.state() != TransferState::Preparing {
                s.stop();
                log::info!("send of {path:?} was stopped while preparing");
                return Err(AltSendError::StoppedWhilePreparing);
            }
        }

        let ticket = ticket::encode(&descriptor);
        log::info!("offering {path:?} as {ticket}");

        self.launch(&mut current, session, descriptor, Some(ticket), None)
            .await
    }

    /// Redeems `ticket`, writing into `output_dir` or the configured download dir.
    pub async fn start_receive(
        &self,
        ticket: &str,
        output_dir: Option<PathBuf>,
    ) -> Result<SessionStart> {
        debug_assert_eq!(self.direction, Direction::Receive);

        let mut current = self.current.lock().await;
        let session = self.open(&mut current).await?;

        let output_dir = output_dir.unwrap_or_else(|| self.download_dir.clone());
        let prepared = self
            .redeem(ticket)
            .and_then(|d| self.storage.prepare_output(&output_dir).map(|_| d));
        let descriptor = match prepared {
            Ok(d) => d,
            Err(e) => return Err(reject(&session, e).await),
        };
        log::info!(
            "receiving {} ({} bytes) into {output_dir:?}",
            descriptor.name,
            descriptor.size
        );

        self.launch(&mut current, session, descriptor, None, Some(output_dir))
            .await
    }

    pub async fn stop(&self) -> bool {
        let current = self.current.lock().await;
        let Some(active) = current.as_ref() else {
            return false;
        };
        let stopped = active.session.lock().await.stop();
        if let Some(cancel) = &active.cancel {
            cancel.cancel();
        }
        stopped
    }

    /// Back to idle. Only allowed once the session has finished one way or another.
    pub async fn reset(&self) -> Result<()> {
        let mut current = self.current.lock().await;
        if let Some(active) = current.as_ref() {
            let state = active.session.lock().await.state();
            if state.is_active() {
                return Err(AltSendError::SessionActive);
            }
        }
        if let Some(active) = current.take() {
            discard(active);
        }
        Ok(())
    }

    pub async fn state(&self) -> TransferState {
        match self.current.lock().await.as_ref() {
            Some(active) => active.session.lock().await.state(),
            None => TransferState::Idle,
        }
    }

    pub async fn snapshot(&self) -> Option<SessionSnapshot> {
        match self.current.lock().await.as_ref() {
            Some(active) => Some(active.session.lock().await.snapshot()),
            None => None,
        }
    }

    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.stop().await;
        if let Some(active) = self.current.lock().await.take() {
            discard(active);
        }
    }

    /// Puts a fresh session in `Preparing`, stopping an active one first.
    ///
    /// A finished session has to be reset before the slot can be reused.
    async fn open(
        &self,
        current: &mut Option<ActiveSession>,
    ) -> Result<Arc<Mutex<TransferSession>>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(AltSendError::ServiceShutdown);
        }

        if let Some(previous) = current.as_ref() {
            let mut old = previous.session.lock().await;
            if old.state().is_terminal() {
                return Err(AltSendError::NotIdle);
            }
            log::info!(
                "{} session {} replaced by a new one",
                self.direction,
                old.id()
            );
            old.stop();
        }
        if let Some(previous) = current.take() {
            discard(previous);
        }

        let session = Arc::new(Mutex::new(TransferSession::new(
            self.direction,
            self.bus.clone(),
        )));
        session.lock().await.begin_preparing();
        *current = Some(ActiveSession {
            session: session.clone(),
            cancel: None,
            task: None,
        });
        Ok(session)
    }

    async fn describe(&self, path: &Path) -> Result<TransferDescriptor> {
        let storage = self.storage.clone();
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || -> Result<TransferDescriptor> {
            let (size, kind) = storage.measure(&path)?;
            let content_id = storage.content_id(&path)?;
            // `.` and `foo/..` only get a name once resolved
            let name = match path.file_name() {
                Some(name) => name.to_owned(),
                None => path
                    .canonicalize()?
                    .file_name()
                    .map(|n| n.to_owned())
                    .ok_or_else(|| AltSendError::NoFileName(path.clone()))?,
            };
            Ok(TransferDescriptor {
                content_id,
                name: name.to_string_lossy().to_string(),
                size,
                kind,
            })
        })
        .await?
    }

    fn redeem(&self, ticket: &str) -> Result<TransferDescriptor> {
        let ticket: Ticket = ticket.parse()?;
        match ticket.decode() {
            Ok(d) => Ok(d),
            Err(AltSendError::InvalidSize(_) | AltSendError::MalformedTicket)
                if self.size_fallback =>
            {
                log::debug!("falling back to lenient decoding for {ticket}");
                ticket::decode_lenient(ticket.as_str())
            }
            Err(e) => Err(e),
        }
    }

    async fn launch(
        &self,
        current: &mut Option<ActiveSession>,
        session: Arc<Mutex<TransferSession>>,
        descriptor: TransferDescriptor,
        ticket: Option<Ticket>,
        output_dir: Option<PathBuf>,
    ) -> Result<SessionStart> {
        let request = DriverRequest {
            descriptor: descriptor.clone(),
            direction: self.direction,
            relay_mode: self.relay_mode.clone(),
        };
        let (ticks, cancel) = match self.driver.begin(request) {
            Ok(handle) => handle.into_parts(),
            Err(e) => return Err(reject(&session, e).await),
        };

        let id = {
            let mut s = session.lock().await;
            s.ready(descriptor.clone(), ticket.clone());
            s.id()
        };

        let task = tokio::spawn(forward(
            session,
            ticks,
            cancel.clone(),
            self.storage.clone(),
            output_dir,
        ));

        if let Some(active) = current.as_mut() {
            active.cancel = Some(cancel);
            active.task = Some(task);
        }

        Ok(SessionStart {
            session: id,
            descriptor,
            ticket,
        })
    }
}

async fn reject(session: &Mutex<TransferSession>, e: AltSendError) -> AltSendError {
    if e.is_validation() {
        log::debug!("rejected input: {e}");
    } else {
        log::error!("could not start transfer: {e}");
    }
    session.lock().await.fail(e.to_string());
    e
}

fn discard(active: ActiveSession) {
    if let Some(cancel) = active.cancel {
        cancel.cancel();
    }
    // the task exits on its own once it sees the cancellation
    drop(active.task);
}

/// Feeds driver ticks into the session until it reaches a terminal state.
async fn forward(
    session: Arc<Mutex<TransferSession>>,
    mut ticks: mpsc::Receiver<DriverTick>,
    cancel: CancelHandle,
    storage: Arc<dyn Storage>,
    output_dir: Option<PathBuf>,
) {
    let mut signal = cancel.signal();
    loop {
        let tick = tokio::select! {
            biased;
            _ = signal.cancelled() => break,
            tick = ticks.recv() => tick,
        };

        let mut s = session.lock().await;
        if s.state().is_terminal() {
            log::debug!("session {}: dropping {tick:?} after it finished", s.id());
            break;
        }

        match tick {
            Some(DriverTick::Progress(bytes)) => s.apply_progress(bytes),
            Some(DriverTick::FileNames(names)) => s.record_file_names(names),
            Some(DriverTick::Completed) => {
                let output_path = match &output_dir {
                    Some(dir) => match storage.write_received(dir, &s.receive_name()) {
                        Ok(path) => Some(path),
                        Err(e) => {
                            s.fail(e.to_string());
                            break;
                        }
                    },
                    None => None,
                };
                s.complete(output_path);
                break;
            }
            Some(DriverTick::Failed(reason)) => {
                s.fail(reason);
                break;
            }
            None => {
                s.fail("transfer driver stopped without finishing");
                break;
            }
        }
    }
    cancel.cancel();
}
