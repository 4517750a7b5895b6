use std::{
    sync::{
        mpsc::{self, Receiver, RecvTimeoutError, Sender},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::{
    infra::error::AppError,
    usecases::{
        errors::ChatError,
        session::{ChatSessionController, FetchResult, PendingFetch},
    },
};

const POLL_DRIVER_SHUTDOWN_FAILED: &str = "POLL_DRIVER_SHUTDOWN_FAILED";
const POLL_DRIVER_LOCK_POISONED: &str = "POLL_DRIVER_LOCK_POISONED";

pub type SharedSession = Arc<Mutex<ChatSessionController>>;

/// Background thread that wakes every `resolution`, runs due polls without
/// holding the session lock, and applies their results under it.
#[derive(Debug)]
pub struct PollDriver {
    stop_tx: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl PollDriver {
    pub fn start<F>(session: SharedSession, resolution: Duration, on_cycle: F) -> Result<Self, AppError>
    where
        F: FnMut(&ChatSessionController, Option<&ChatError>) + Send + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let worker = thread::Builder::new()
            .name("support-chat-poll-driver".to_owned())
            .spawn(move || run_driver(session, stop_rx, resolution, on_cycle))
            .map_err(AppError::PollDriverStart)?;

        Ok(Self {
            stop_tx: Some(stop_tx),
            worker: Some(worker),
        })
    }
}

impl Drop for PollDriver {
    fn drop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }

        if let Some(worker) = self.worker.take() {
            if let Err(error) = worker.join() {
                tracing::warn!(
                    code = POLL_DRIVER_SHUTDOWN_FAILED,
                    error = ?error,
                    "poll driver worker panicked on shutdown"
                );
            }
        }
    }
}

fn run_driver<F>(session: SharedSession, stop_rx: Receiver<()>, resolution: Duration, mut on_cycle: F)
where
    F: FnMut(&ChatSessionController, Option<&ChatError>),
{
    loop {
        match stop_rx.recv_timeout(resolution) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
        }

        let mut failure = None;
        let (toggled, fetches) = {
            let Ok(mut guard) = session.lock() else {
                tracing::error!(code = POLL_DRIVER_LOCK_POISONED, "session lock poisoned; poll driver stops");
                return;
            };

            let was_open = guard.is_open();
            if let Err(error) = guard.poll_open_requests() {
                failure = Some(error);
            }
            let toggled = was_open != guard.is_open();
            (toggled, guard.begin_due())
        };

        if fetches.is_empty() && !toggled && failure.is_none() {
            continue;
        }

        let results: Vec<FetchResult> = fetches.into_iter().map(PendingFetch::run).collect();

        let Ok(mut guard) = session.lock() else {
            tracing::error!(code = POLL_DRIVER_LOCK_POISONED, "session lock poisoned; poll driver stops");
            return;
        };
        for result in results {
            if let Err(error) = guard.apply(result) {
                failure.get_or_insert(error);
            }
        }

        on_cycle(&guard, failure.as_ref());
    }
}
