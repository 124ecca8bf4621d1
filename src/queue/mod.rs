// Lazy save queue: a dedicated worker thread that saves entities one at a
// time, in enqueue order within each drain cycle.

mod ticket;

pub use ticket::SaveTicket;

use crate::config::RuntimeConfig;
use crate::core::{EntityError, Result};
use crate::entity::{SaveOutcome, SharedEntity};
use log::{debug, warn};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use tokio::sync::oneshot;

struct QueuedSave {
    sequence: u64,
    entity: SharedEntity,
    done: oneshot::Sender<Result<SaveOutcome>>,
}

#[derive(Default)]
struct QueueState {
    items: VecDeque<QueuedSave>,
    next_sequence: u64,
    shutdown: bool,
}

#[derive(Default)]
struct QueueShared {
    state: Mutex<QueueState>,
    wake: Condvar,
    processed: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SaveQueueStats {
    pub processed: u64,
    pub failed: u64,
    pub pending: usize,
}

/// Owns the save worker. Dropping the queue drains what is left and joins
/// the worker.
pub struct LazySaveQueue {
    shared: Arc<QueueShared>,
    worker: Option<JoinHandle<()>>,
}

impl LazySaveQueue {
    pub fn start(config: &RuntimeConfig) -> Result<Self> {
        let shared = Arc::new(QueueShared::default());
        let worker_shared = shared.clone();
        let worker = thread::Builder::new()
            .name(config.save_queue_name.clone())
            .spawn(move || run_worker(&worker_shared))?;
        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    pub fn enqueue(&self, entity: SharedEntity) -> Result<SaveTicket> {
        let (done, rx) = oneshot::channel();
        let sequence = {
            let mut state = self.shared.state.lock()?;
            if state.shutdown {
                return Err(EntityError::Queue("save queue is shut down".to_string()));
            }
            state.next_sequence += 1;
            let sequence = state.next_sequence;
            state.items.push_back(QueuedSave {
                sequence,
                entity,
                done,
            });
            sequence
        };
        self.shared.wake.notify_one();
        Ok(SaveTicket::new(sequence, rx))
    }

    pub fn pending(&self) -> Result<usize> {
        Ok(self.shared.state.lock()?.items.len())
    }

    pub fn stats(&self) -> Result<SaveQueueStats> {
        Ok(SaveQueueStats {
            processed: self.shared.processed.load(Ordering::SeqCst),
            failed: self.shared.failed.load(Ordering::SeqCst),
            pending: self.pending()?,
        })
    }

    /// Stops accepting work. Already queued saves still run; later
    /// `enqueue` calls fail.
    pub fn close(&self) -> Result<()> {
        {
            let mut state = self.shared.state.lock()?;
            state.shutdown = true;
        }
        self.shared.wake.notify_all();
        Ok(())
    }

    /// Stops accepting work, saves everything already queued and joins the
    /// worker.
    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    fn stop(&mut self) -> Result<()> {
        self.close()?;
        if let Some(worker) = self.worker.take() {
            worker
                .join()
                .map_err(|_| EntityError::Queue("save worker panicked".to_string()))?;
        }
        Ok(())
    }
}

impl Drop for LazySaveQueue {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn run_worker(shared: &QueueShared) {
    loop {
        let batch = {
            let mut state = shared.state.lock().unwrap_or_else(PoisonError::into_inner);
            while state.items.is_empty() && !state.shutdown {
                state = shared
                    .wake
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            if state.items.is_empty() {
                break;
            }
            std::mem::take(&mut state.items)
        };

        debug!("lazy save drain cycle with {} entities", batch.len());
        for item in batch {
            let result = save_one(&item.entity);
            shared.processed.fetch_add(1, Ordering::SeqCst);
            if let Err(err) = &result {
                shared.failed.fetch_add(1, Ordering::SeqCst);
                warn!("lazy save #{} failed: {}", item.sequence, err);
            }
            // The caller may have dropped its ticket; the save still happened.
            let _ = item.done.send(result);
        }
    }
}

fn save_one(entity: &SharedEntity) -> Result<SaveOutcome> {
    let mut entity = entity.lock()?;
    entity.save_changes(None)
}
