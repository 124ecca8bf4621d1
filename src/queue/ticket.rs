use crate::core::{EntityError, Result};
use crate::entity::SaveOutcome;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Completion handle for one queued save.
///
/// Await it from async code, or call [`wait`](Self::wait) from a plain
/// thread.
#[derive(Debug)]
pub struct SaveTicket {
    sequence: u64,
    rx: oneshot::Receiver<Result<SaveOutcome>>,
}

impl SaveTicket {
    pub(crate) fn new(sequence: u64, rx: oneshot::Receiver<Result<SaveOutcome>>) -> Self {
        Self { sequence, rx }
    }

    /// Position in enqueue order, starting at 1.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Blocks the current thread until the save finished.
    ///
    /// # Panics
    ///
    /// Panics when called from within an async runtime; await the ticket
    /// there instead.
    pub fn wait(self) -> Result<SaveOutcome> {
        self.rx.blocking_recv().map_err(|_| worker_gone())?
    }

    /// The result if the save already finished.
    pub fn try_result(&mut self) -> Option<Result<SaveOutcome>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(worker_gone())),
        }
    }
}

impl Future for SaveTicket {
    type Output = Result<SaveOutcome>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(worker_gone())),
            Poll::Pending => Poll::Pending,
        }
    }
}

fn worker_gone() -> EntityError {
    EntityError::Queue("save worker dropped the request".to_string())
}
