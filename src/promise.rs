//! One-shot, multi-reader promises.
//!
//! A single-producer, multi-consumer cell that is written to exactly once
//! and read an arbitrary number of times, where reads before completion
//! suspend the calling task rather than blocking a thread or returning
//! early. `tokio::sync::oneshot` wrapped in `futures::future::Shared` gives
//! exactly that: the oneshot gives single-write semantics, `Shared` gives
//! cheap `Clone` + repeated `.await` for every dependent that needs the
//! same value.

use futures::future::{FutureExt, Shared};
use futures::TryFutureExt;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

/// Why a promise resolved the way it did, when that's something other than
/// the payload itself — used for the "the writer was dropped without
/// completing" case, which happens if a forked compile task panics.
#[derive(Debug, Clone)]
pub enum PromiseError {
    /// The writer half was dropped (e.g. its task panicked) before calling
    /// [`PromiseWriter::complete`].
    WriterDropped,
}

type Inner<T> = Shared<futures::future::MapErr<oneshot::Receiver<T>, fn(oneshot::error::RecvError) -> PromiseError>>;

/// The read side of a promise. Cloning is cheap (it's just an `Arc` bump
/// inside `Shared`) and every clone observes the same resolved value.
#[derive(Clone)]
pub struct PromiseReader<T: Clone> {
    inner: Inner<T>,
}

impl<T: Clone> PromiseReader<T> {
    /// Waits for the promise to resolve. Safe to call concurrently from any
    /// number of tasks, any number of times.
    pub async fn wait(&self) -> Result<T, PromiseError> {
        self.inner.clone().await
    }
}

/// The write side of a promise. Holds the `oneshot::Sender` behind a mutex
/// so that [`complete`](Self::complete) is safe to call from multiple
/// places without risking a double-send panic — only the first call wins,
/// completion is idempotent and subsequent writes are silently ignored.
pub struct PromiseWriter<T> {
    sender: Mutex<Option<oneshot::Sender<T>>>,
}

impl<T> PromiseWriter<T> {
    /// Completes the promise with `value`. A no-op if already completed.
    pub fn complete(&self, value: T) {
        if let Some(sender) = self.sender.lock().unwrap_or_else(|e| e.into_inner()).take() {
            // The receiver may already be gone (all readers dropped); that's
            // not an error for the writer.
            let _ = sender.send(value);
        }
    }

    /// True if this promise has already been completed (by this writer).
    pub fn is_completed(&self) -> bool {
        self.sender.lock().unwrap_or_else(|e| e.into_inner()).is_none()
    }
}

/// Creates a new promise pair.
pub fn promise<T: Clone + Send + 'static>() -> (Arc<PromiseWriter<T>>, PromiseReader<T>) {
    let (tx, rx) = oneshot::channel();
    let map_err: fn(oneshot::error::RecvError) -> PromiseError = |_| PromiseError::WriterDropped;
    let reader = PromiseReader { inner: rx.map_err(map_err).shared() };
    let writer = Arc::new(PromiseWriter { sender: Mutex::new(Some(tx)) });
    (writer, reader)
}
