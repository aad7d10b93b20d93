pub mod bus;
pub mod config;
pub mod driver;
pub mod error;
pub mod models;
pub mod notify;
pub mod progress;
pub mod storage;
pub mod ticket;
pub mod transfer;
pub mod ui;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio::sync::watch;

pub use config::Config;
pub use error::{AltSendError, Result};
pub use models::{
    Direction, EntryKind, SessionEvent, TransferDescriptor, TransferEvent, TransferProgress,
    TransferState,
};
pub use ticket::Ticket;

use crate::{
    bus::Subscription,
    driver::{SimulatedDriver, TransferDriver},
    storage::{FsStorage, Storage},
    transfer::{SessionManager, SessionSnapshot, SessionStart},
    ui::{Intent, StateStore, UiState},
};

struct Lane {
    manager: SessionManager,
    store: StateStore,
}

impl Lane {
    fn new(
        direction: Direction,
        driver: Arc<dyn TransferDriver>,
        storage: Arc<dyn Storage>,
        config: &Config,
    ) -> Self {
        let manager = SessionManager::new(direction, driver, storage, config);
        let store = StateStore::spawn(direction, manager.subscribe());
        Self { manager, store }
    }
}

/// Send and receive sessions plus their presentable state.
#[derive(Clone)]
pub struct AltSendService {
    pub config: Config,
    send: Arc<Lane>,
    receive: Arc<Lane>,
}

impl AltSendService {
    pub fn create(config: Config) -> Self {
        let driver = Arc::new(SimulatedDriver::from_config(&config));
        Self::with_parts(config, driver, Arc::new(FsStorage))
    }

    /// Must be called inside a tokio runtime.
    pub fn with_parts(
        config: Config,
        driver: Arc<dyn TransferDriver>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        let send = Lane::new(Direction::Send, driver.clone(), storage.clone(), &config);
        let receive = Lane::new(Direction::Receive, driver, storage, &config);
        Self {
            config,
            send: Arc::new(send),
            receive: Arc::new(receive),
        }
    }

    fn lane(&self, direction: Direction) -> &Lane {
        match direction {
            Direction::Send => &self.send,
            Direction::Receive => &self.receive,
        }
    }

    pub async fn send(&self, path: impl AsRef<Path>) -> Result<SessionStart> {
        self.send.manager.start_send(path).await
    }

    pub async fn receive(&self, ticket: &str, output_dir: Option<PathBuf>) -> Result<SessionStart> {
        self.receive.manager.start_receive(ticket, output_dir).await
    }

    pub async fn stop(&self, direction: Direction) -> bool {
        self.lane(direction).manager.stop().await
    }

    /// Returns a finished session to idle and clears its presentable state.
    pub async fn reset(&self, direction: Direction) -> Result<()> {
        let lane = self.lane(direction);
        lane.manager.reset().await?;
        lane.store.apply(Intent::Reset.into());
        Ok(())
    }

    pub fn subscribe(&self, direction: Direction) -> Subscription {
        self.lane(direction).manager.subscribe()
    }

    pub fn state(&self, direction: Direction) -> UiState {
        self.lane(direction).store.snapshot()
    }

    pub fn watch_state(&self, direction: Direction) -> watch::Receiver<UiState> {
        self.lane(direction).store.watch()
    }

    pub async fn session(&self, direction: Direction) -> Option<SessionSnapshot> {
        self.lane(direction).manager.snapshot().await
    }

    /// Applies a user intent and performs whatever it asks for.
    pub async fn dispatch(&self, direction: Direction, intent: Intent) -> Result<()> {
        let lane = self.lane(direction);
        match intent {
            Intent::RequestStart => {
                let (before, after) = lane.store.apply(Intent::RequestStart.into());
                let started = before.phase != TransferState::Preparing
                    && after.phase == TransferState::Preparing;
                if !started {
                    return Ok(());
                }
                match direction {
                    Direction::Send => {
                        let file = after.selected.ok_or(AltSendError::NoFileSelected)?;
                        self.send(&file.path).await?;
                    }
                    Direction::Receive => {
                        self.receive(after.ticket_text.trim(), after.output_dir)
                            .await?;
                    }
                }
                Ok(())
            }
            Intent::RequestStop => {
                lane.store.apply(Intent::RequestStop.into());
                lane.manager.stop().await;
                Ok(())
            }
            Intent::Reset => self.reset(direction).await,
            other => {
                lane.store.apply(other.into());
                Ok(())
            }
        }
    }

    pub async fn shutdown(&self) {
        log::info!("shutting down transfer service");
        for lane in [&self.send, &self.receive] {
            lane.manager.shutdown().await;
        }
    }
}
