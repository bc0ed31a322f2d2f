//! Debounced writes for a single preference key.
//!
//! Rapid edits (typing into the income field) collapse into one write
//! that lands once the value has been stable for the debounce period.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::PreferenceStore;

enum Command {
    Set(String),
    Flush(oneshot::Sender<()>),
}

/// Coalesces `set` calls for one key.
///
/// Dropping the writer still persists the last pending value.
pub struct DebouncedPreference {
    key: String,
    tx: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl DebouncedPreference {
    /// Spawn the writer task. Must be called within a tokio runtime.
    pub fn new(store: Arc<dyn PreferenceStore>, key: impl Into<String>, debounce: Duration) -> Self {
        let key = key.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(store, key.clone(), debounce, rx));
        Self { key, tx, task }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Record a new value; the write happens after the quiet period.
    pub fn set(&self, value: impl Into<String>) {
        let _ = self.tx.send(Command::Set(value.into()));
    }

    /// Write any pending value now.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(Command::Flush(ack)).is_ok() {
            let _ = done.await;
        }
    }

    /// Flush and stop the writer task.
    pub async fn shutdown(self) {
        let Self { tx, task, .. } = self;
        drop(tx);
        let _ = task.await;
    }
}

async fn run(
    store: Arc<dyn PreferenceStore>,
    key: String,
    debounce: Duration,
    mut rx: mpsc::UnboundedReceiver<Command>,
) {
    let mut pending: Option<String> = None;
    let sleep = tokio::time::sleep(debounce);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            cmd = rx.recv() => match cmd {
                Some(Command::Set(value)) => {
                    pending = Some(value);
                    sleep.as_mut().reset(Instant::now() + debounce);
                }
                Some(Command::Flush(ack)) => {
                    write(store.as_ref(), &key, &mut pending);
                    let _ = ack.send(());
                }
                None => {
                    write(store.as_ref(), &key, &mut pending);
                    break;
                }
            },
            () = &mut sleep, if pending.is_some() => {
                write(store.as_ref(), &key, &mut pending);
            }
        }
    }
}

fn write(store: &dyn PreferenceStore, key: &str, pending: &mut Option<String>) {
    let Some(value) = pending.take() else {
        return;
    };
    match store.set(key, &value) {
        Ok(()) => debug!(key = %key, "Preference written"),
        Err(e) => warn!(key = %key, error = %e, "Failed to write preference"),
    }
}
