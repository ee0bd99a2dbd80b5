//! Row source adapter: whole-snapshot delivery from a live query.
//!
//! A [`RowSource`] is the receiving end of a live query subscription. Every
//! change in the store results in a complete new snapshot; the consumer only
//! ever sees whole snapshots. Dropping the source ends the subscription and
//! stops the task that feeds it.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::debug;

/// Where a live query currently stands.
pub enum SourceState<T> {
    /// No snapshot has been delivered yet.
    Loading,
    /// The latest complete snapshot, possibly empty.
    Ready(Arc<Vec<T>>),
    /// The provider could not deliver rows.
    Unavailable(String),
}

impl<T> SourceState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, SourceState::Loading)
    }

    pub fn rows(&self) -> Option<&Arc<Vec<T>>> {
        match self {
            SourceState::Ready(rows) => Some(rows),
            _ => None,
        }
    }
}

impl<T> Clone for SourceState<T> {
    fn clone(&self) -> Self {
        match self {
            SourceState::Loading => SourceState::Loading,
            SourceState::Ready(rows) => SourceState::Ready(Arc::clone(rows)),
            SourceState::Unavailable(reason) => SourceState::Unavailable(reason.clone()),
        }
    }
}

impl<T> fmt::Debug for SourceState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceState::Loading => write!(f, "Loading"),
            SourceState::Ready(rows) => write!(f, "Ready({} rows)", rows.len()),
            SourceState::Unavailable(reason) => write!(f, "Unavailable({reason})"),
        }
    }
}

pub struct RowSource<T> {
    rx: watch::Receiver<SourceState<T>>,
    feeder: Option<AbortHandle>,
}

impl<T> RowSource<T> {
    /// Wraps a snapshot channel; `feeder` is aborted when the source is dropped.
    pub fn new(rx: watch::Receiver<SourceState<T>>, feeder: Option<AbortHandle>) -> Self {
        Self { rx, feeder }
    }

    /// A source that will never deliver rows.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        let (_tx, rx) = watch::channel(SourceState::Unavailable(reason.into()));
        Self { rx, feeder: None }
    }

    /// The state as of the last delivered snapshot.
    pub fn current(&self) -> SourceState<T> {
        self.rx.borrow().clone()
    }

    /// Returns the new state if a snapshot arrived since the last call.
    pub fn poll(&mut self) -> Option<SourceState<T>> {
        match self.rx.has_changed() {
            Ok(true) => Some(self.rx.borrow_and_update().clone()),
            Ok(false) => None,
            // Feeder is gone; the last state stays valid.
            Err(_) => None,
        }
    }

    /// Waits for the next snapshot; `None` once the feeder has stopped.
    pub async fn changed(&mut self) -> Option<SourceState<T>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

impl<T> Drop for RowSource<T> {
    fn drop(&mut self) {
        if let Some(feeder) = self.feeder.take() {
            debug!("Row source dropped, stopping live query");
            feeder.abort();
        }
    }
}
