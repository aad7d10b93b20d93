use std::sync::Arc;

use tokio::{sync::watch, task::JoinHandle};

use super::{reduce, Input, UiState};
use crate::{bus::Subscription, models::Direction};

/// Holds the latest [`UiState`] for one direction and keeps it folded with bus events.
pub struct StateStore {
    state: Arc<watch::Sender<UiState>>,
    task: JoinHandle<()>,
}

impl StateStore {
    /// Starts folding `events` into a fresh state. Must be called inside a tokio runtime.
    pub fn spawn(direction: Direction, mut events: Subscription) -> Self {
        let (tx, _) = watch::channel(UiState::new(direction));
        let state = Arc::new(tx);

        let folded = state.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                apply(&folded, event.into());
            }
            log::debug!("{direction} event stream closed");
        });

        Self { state, task }
    }

    pub fn apply(&self, input: Input) -> (UiState, UiState) {
        let before = self.snapshot();
        apply(&self.state, input);
        (before, self.snapshot())
    }

    pub fn snapshot(&self) -> UiState {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<UiState> {
        self.state.subscribe()
    }
}

impl Drop for StateStore {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn apply(state: &watch::Sender<UiState>, input: Input) {
    state.send_if_modified(|current| {
        let next = reduce(current.clone(), input);
        if next == *current {
            return false;
        }
        *current = next;
        true
    });
}
