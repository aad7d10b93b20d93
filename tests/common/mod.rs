#![allow(dead_code)]

use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        mpsc as std_mpsc, Mutex,
    },
    time::Duration,
};

use altsend::{
    bus::Subscription,
    driver::{cancel_pair, DriverHandle, DriverRequest, DriverTick, TransferDriver},
    models::{Direction, EntryKind, SessionEvent},
    notify::{Notification, NotificationSink},
    storage::{FsStorage, Storage},
    Result,
};
use tokio::sync::{mpsc, oneshot};

pub const TEN_MIB: u64 = 10 * 1024 * 1024;

pub fn write_file(dir: &Path, name: &str, size: u64) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, vec![7u8; size as usize]).unwrap();
    path
}

/// Everything up to and including the first terminal event.
pub async fn collect_session(sub: &mut Subscription) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Some(event) = sub.recv().await {
        let done = event.event.is_terminal();
        events.push(event);
        if done {
            break;
        }
    }
    events
}

/// Replays a fixed list of ticks, one per `interval`.
pub struct ScriptedDriver {
    script: Vec<DriverTick>,
    interval: Duration,
    ignore_cancel: bool,
    hold_open: bool,
    begins: AtomicUsize,
    requests: Mutex<Vec<DriverRequest>>,
}

impl ScriptedDriver {
    pub fn new(script: Vec<DriverTick>) -> Self {
        Self {
            script,
            interval: Duration::from_millis(50),
            ignore_cancel: false,
            hold_open: false,
            begins: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Keeps emitting after cancellation, like a misbehaving transport.
    pub fn ignoring_cancel(mut self) -> Self {
        self.ignore_cancel = true;
        self
    }

    /// Keeps the channel open after the script until cancelled.
    pub fn held_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    pub fn begins(&self) -> usize {
        self.begins.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<DriverRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl TransferDriver for ScriptedDriver {
    fn begin(&self, request: DriverRequest) -> Result<DriverHandle> {
        self.begins.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);

        let (tx, rx) = mpsc::channel(64);
        let (cancel, mut signal) = cancel_pair();
        let script = self.script.clone();
        let interval = self.interval;
        let ignore_cancel = self.ignore_cancel;
        let hold_open = self.hold_open;

        tokio::spawn(async move {
            for tick in script {
                tokio::time::sleep(interval).await;
                if !ignore_cancel && signal.is_cancelled() {
                    return;
                }
                if tx.send(tick).await.is_err() {
                    return;
                }
            }
            if hold_open {
                signal.cancelled().await;
            }
        });

        Ok(DriverHandle::new(rx, cancel))
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub shown: Mutex<Vec<Notification>>,
    pub dismissed: Mutex<Vec<Direction>>,
}

impl NotificationSink for RecordingSink {
    fn show(&self, notification: &Notification) {
        self.shown.lock().unwrap().push(notification.clone());
    }

    fn dismiss(&self, direction: Direction) {
        self.dismissed.lock().unwrap().push(direction);
    }
}

/// Filesystem storage whose hashing blocks until the test lets it go.
pub struct GatedStorage {
    entered: Mutex<Option<oneshot::Sender<()>>>,
    release: Mutex<std_mpsc::Receiver<()>>,
}

impl GatedStorage {
    /// The storage, a receiver firing once hashing starts, and the release switch.
    pub fn new() -> (Self, oneshot::Receiver<()>, std_mpsc::Sender<()>) {
        let (entered_tx, entered_rx) = oneshot::channel();
        let (release_tx, release_rx) = std_mpsc::channel();
        let storage = Self {
            entered: Mutex::new(Some(entered_tx)),
            release: Mutex::new(release_rx),
        };
        (storage, entered_rx, release_tx)
    }
}

impl Storage for GatedStorage {
    fn measure(&self, path: &Path) -> Result<(u64, EntryKind)> {
        FsStorage.measure(path)
    }

    fn content_id(&self, path: &Path) -> Result<String> {
        if let Some(entered) = self.entered.lock().unwrap().take() {
            let _ = entered.send(());
        }
        let _ = self.release.lock().unwrap().recv();
        FsStorage.content_id(path)
    }

    fn prepare_output(&self, dir: &Path) -> Result<()> {
        FsStorage.prepare_output(dir)
    }

    fn write_received(&self, dir: &Path, name: &str) -> Result<PathBuf> {
        FsStorage.write_received(dir, name)
    }
}
