//! Single-writer actor per persisted resource
//!
//! Every read-modify-write against a [`JsonStore`] is funnelled through one
//! dedicated thread, so concurrent callers queue up instead of racing on
//! the file and the slower write can no longer drop the faster one.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

use super::store::{JsonStore, StoreError, StoreResult, StoreState};

const COMMAND_CAPACITY: usize = 64;

type Job<T> = Box<dyn FnOnce(&mut T) + Send>;

enum Command<T> {
    Read(oneshot::Sender<T>),
    Update {
        job: Job<T>,
        done: oneshot::Sender<StoreResult<()>>,
    },
}

/// Cloneable handle to a store's writer thread
pub struct StoreHandle<T: StoreState> {
    tx: mpsc::Sender<Command<T>>,
    store: Arc<JsonStore<T>>,
}

impl<T: StoreState> Clone for StoreHandle<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            store: Arc::clone(&self.store),
        }
    }
}

impl<T: StoreState> StoreHandle<T> {
    /// Start the writer thread for `store`.
    ///
    /// The thread exits once every handle has been dropped.
    pub fn spawn(store: JsonStore<T>) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
        let store = Arc::new(store);
        let worker = Arc::clone(&store);

        let name = format!(
            "store-writer:{}",
            store
                .path()
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        );
        if let Err(e) = std::thread::Builder::new()
            .name(name)
            .spawn(move || run_writer(worker, rx))
        {
            // The receiver was moved into the failed closure and dropped,
            // so every command will come back as WriterClosed.
            error!(path = %store.path().display(), error = %e, "Failed to start store writer");
        }

        Self { tx, store }
    }

    pub fn path(&self) -> &Path {
        self.store.path()
    }

    /// Current state as the writer sees it
    pub async fn read(&self) -> StoreResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Read(reply))
            .await
            .map_err(|_| self.closed())?;
        rx.await.map_err(|_| self.closed())
    }

    /// Apply `f` to the current state and persist the result as one cycle.
    ///
    /// Returns whatever `f` returns once the write has landed.
    pub async fn update<R, F>(&self, f: F) -> StoreResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut T) -> R + Send + 'static,
    {
        let (value_tx, value_rx) = oneshot::channel();
        let (done, done_rx) = oneshot::channel();
        let job: Job<T> = Box::new(move |state| {
            let _ = value_tx.send(f(state));
        });

        self.tx
            .send(Command::Update { job, done })
            .await
            .map_err(|_| self.closed())?;
        done_rx.await.map_err(|_| self.closed())??;
        value_rx.await.map_err(|_| self.closed())
    }

    /// Overwrite the state wholesale
    pub async fn replace(&self, state: T) -> StoreResult<()> {
        self.update(move |current| *current = state).await
    }

    /// Reachability check for health reporting
    pub fn probe(&self) -> bool {
        !self.tx.is_closed() && self.store.probe()
    }

    /// Restore a rotated generation through the writer
    pub async fn restore_backup(&self, generation: usize) -> StoreResult<T> {
        let store = Arc::clone(&self.store);
        self.update(move |state| -> StoreResult<T> {
            let backup = store.load_backup(generation)?;
            *state = backup.clone();
            Ok(backup)
        })
        .await?
    }

    fn closed(&self) -> StoreError {
        StoreError::WriterClosed(self.store.path().to_path_buf())
    }
}

fn run_writer<T: StoreState>(store: Arc<JsonStore<T>>, mut rx: mpsc::Receiver<Command<T>>) {
    while let Some(command) = rx.blocking_recv() {
        match command {
            Command::Read(reply) => {
                let _ = reply.send(store.read());
            }
            Command::Update { job, done } => {
                let mut state = store.read();
                job(&mut state);
                let _ = done.send(store.write(&state));
            }
        }
    }
    debug!(path = %store.path().display(), "Store writer stopped");
}
