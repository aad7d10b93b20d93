pub mod simulated;

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

pub use simulated::SimulatedDriver;

use crate::{
    error::Result,
    models::{Direction, RelayMode, TransferDescriptor},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverTick {
    /// Cumulative bytes moved so far.
    Progress(u64),
    FileNames(Vec<String>),
    Completed,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct DriverRequest {
    pub descriptor: TransferDescriptor,
    pub direction: Direction,
    pub relay_mode: RelayMode,
}

pub trait TransferDriver: Send + Sync + 'static {
    /// Starts moving data for `request`. Must be called inside a tokio runtime.
    fn begin(&self, request: DriverRequest) -> Result<DriverHandle>;
}

/// Requests cancellation of one driver run. Cloneable and idempotent.
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<watch::Sender<bool>>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    pub fn signal(&self) -> CancelSignal {
        CancelSignal(self.0.subscribe())
    }
}

#[derive(Debug, Clone)]
pub struct CancelSignal(watch::Receiver<bool>);

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once cancellation is requested or every handle is gone.
    pub async fn cancelled(&mut self) {
        while !*self.0.borrow_and_update() {
            if self.0.changed().await.is_err() {
                return;
            }
        }
    }
}

pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle(Arc::new(tx)), CancelSignal(rx))
}

#[derive(Debug)]
pub struct DriverHandle {
    ticks: mpsc::Receiver<DriverTick>,
    cancel: CancelHandle,
}

impl DriverHandle {
    pub fn new(ticks: mpsc::Receiver<DriverTick>, cancel: CancelHandle) -> Self {
        Self { ticks, cancel }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn into_parts(self) -> (mpsc::Receiver<DriverTick>, CancelHandle) {
        (self.ticks, self.cancel)
    }
}
