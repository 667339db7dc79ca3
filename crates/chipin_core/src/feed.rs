//! Change feed adapter: push snapshot callbacks to a pull sequence.
//!
//! The document store's subscription primitive pushes snapshots into a
//! callback. [`ChangeFeed`] bridges that into an awaitable sequence by
//! feeding a bounded broadcast ring buffer from the callback and draining it
//! from the consumer side. The contract is at-least-once: after a lag or a
//! reconnect the same logical version may appear again, so consumers must
//! de-duplicate on `Snapshot::version` and never assume exactly-once
//! delivery.
//!
//! Dropping the feed (or calling [`ChangeFeed::cancel`]) detaches the
//! underlying listener synchronously; no listener outlives its feed.

use futures::Stream;
use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::warn;

use crate::document::{ListenerGuard, SnapshotSink};
use crate::types::Snapshot;

pub struct ChangeFeed<T> {
    rx: broadcast::Receiver<Snapshot<T>>,
    guard: Option<ListenerGuard>,
}

impl<T> std::fmt::Debug for ChangeFeed<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeFeed")
            .field("attached", &self.guard.is_some())
            .finish()
    }
}

impl<T: Clone + Send + 'static> ChangeFeed<T> {
    /// Attach to a push-style subscription. `subscribe` receives the sink to
    /// register with the collaborator and returns the guard that detaches
    /// it.
    ///
    /// `capacity` bounds how many undrained snapshots are buffered; beyond
    /// that, the oldest are overwritten and the consumer skips forward
    /// (safe, because each snapshot carries full state and a version).
    pub fn attach<F>(capacity: usize, subscribe: F) -> Self
    where
        F: FnOnce(SnapshotSink<T>) -> ListenerGuard,
    {
        let (tx, rx) = broadcast::channel(capacity.max(1));
        let sink: SnapshotSink<T> = Box::new(move |snapshot| {
            // Send only fails with no receiver, i.e. the feed was dropped
            // between detach starting and the callback firing.
            let _ = tx.send(snapshot);
        });
        let guard = subscribe(sink);
        Self {
            rx,
            guard: Some(guard),
        }
    }

    /// Await the next snapshot. `None` once the feed is closed.
    pub async fn recv(&mut self) -> Option<Snapshot<T>> {
        loop {
            match self.rx.recv().await {
                Ok(snapshot) => return Some(snapshot),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "change feed lagged; skipping overwritten snapshots");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Detach the listener now. Equivalent to dropping the feed but explicit
    /// at call sites that cancel from a different place than they subscribed.
    pub fn cancel(mut self) {
        if let Some(guard) = self.guard.take() {
            guard.detach();
        }
    }

    /// Consume the feed as a [`Stream`]. The listener stays attached for the
    /// stream's lifetime.
    pub fn into_stream(mut self) -> impl Stream<Item = Snapshot<T>> + Send {
        let guard = self.guard.take();
        BroadcastStream::new(self.rx).filter_map(move |result| {
            // Holding the guard inside the closure keeps the listener
            // attached until the stream is dropped.
            let _attached = &guard;
            futures::future::ready(match result {
                Ok(snapshot) => Some(snapshot),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(skipped, "change feed lagged; skipping overwritten snapshots");
                    None
                }
            })
        })
    }
}
