//! Backpressured row delivery for `stream()`/`streamPrepared()`.
//!
//! Grounded in the same `tokio::sync::mpsc` bounded-channel idiom the
//! connection actor already uses for commands: the channel capacity *is*
//! the high-water mark, so a full channel naturally blocks the producer
//! (the connection actor) until the consumer drains it. `pause()`/`resume()`
//! hooks let the actor additionally stop issuing socket reads while paused,
//! rather than merely blocking on `send().await`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::error::{Error, Result};

/// Default high-water mark: the producer pauses once this many rows are
/// buffered and have not yet been consumed.
pub const DEFAULT_HIGH_WATER_MARK: usize = 100;

/// Statistics reported when a [`RowStream`] completes normally.
#[derive(Debug, Clone, Default)]
pub struct StreamStats {
    pub row_count: u64,
    pub column_count: u32,
    pub duration: Duration,
    pub warning_count: u16,
    pub server_thread_id: u32,
}

enum Item<R> {
    Row(R),
    Complete(StreamStats),
    Error(Error),
}

/// Shared pause/resume signal between a [`RowStream`] and its producer.
///
/// The connection actor polls `is_paused()` between packet reads and stops
/// issuing further reads while it is set, resuming once the consumer has
/// drained the buffer back below the low-water mark.
#[derive(Clone)]
pub struct FlowControl {
    paused: Arc<AtomicBool>,
    buffered: Arc<AtomicUsize>,
    high_water: usize,
    low_water: usize,
}

impl FlowControl {
    fn new(high_water: usize) -> Self {
        Self {
            paused: Arc::new(AtomicBool::new(false)),
            buffered: Arc::new(AtomicUsize::new(0)),
            high_water,
            low_water: high_water / 2,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    fn on_push(&self) {
        let buffered = self.buffered.fetch_add(1, Ordering::AcqRel) + 1;
        if buffered >= self.high_water {
            self.paused.store(true, Ordering::Release);
        }
    }

    fn on_pop(&self) {
        let buffered = self.buffered.fetch_sub(1, Ordering::AcqRel).saturating_sub(1);
        if buffered <= self.low_water {
            self.paused.store(false, Ordering::Release);
        }
    }
}

/// The producer-side handle held by the connection actor.
pub struct RowStreamProducer<R> {
    tx: mpsc::Sender<Item<R>>,
    flow: FlowControl,
    dispatched_at: Instant,
}

impl<R> RowStreamProducer<R> {
    pub fn flow_control(&self) -> FlowControl {
        self.flow.clone()
    }

    /// Push one row. Blocks (providing backpressure) once the channel is
    /// full; the actor should have already consulted `flow.is_paused()`
    /// before calling this so reads stop proactively rather than relying
    /// solely on this block.
    pub async fn push(&self, row: R) -> Result<()> {
        self.flow.on_push();
        self.tx
            .send(Item::Row(row))
            .await
            .map_err(|_| Error::Cancelled)
    }

    pub async fn complete(self, mut stats: StreamStats) {
        stats.duration = self.dispatched_at.elapsed();
        let _ = self.tx.send(Item::Complete(stats)).await;
    }

    pub async fn error(self, err: Error) {
        let _ = self.tx.send(Item::Error(err)).await;
    }
}

/// The consumer-side handle returned to the application.
pub struct RowStream<R> {
    rx: mpsc::Receiver<Item<R>>,
    flow: FlowControl,
    stats: Option<StreamStats>,
    cancel: Option<Box<dyn FnOnce() + Send>>,
    done: bool,
}

impl<R> RowStream<R> {
    pub fn new(high_water_mark: usize) -> (RowStreamProducer<R>, Self) {
        let flow = FlowControl::new(high_water_mark.max(1));
        let (tx, rx) = mpsc::channel(high_water_mark.max(1));
        let producer = RowStreamProducer {
            tx,
            flow: flow.clone(),
            dispatched_at: Instant::now(),
        };
        let consumer = Self {
            rx,
            flow,
            stats: None,
            cancel: None,
            done: false,
        };
        (producer, consumer)
    }

    /// Attach the callback invoked when the consumer calls [`RowStream::cancel`].
    pub fn on_cancel(&mut self, cancel: impl FnOnce() + Send + 'static) {
        self.cancel = Some(Box::new(cancel));
    }

    /// Statistics populated once the stream has run to completion.
    pub fn stats(&self) -> Option<&StreamStats> {
        self.stats.as_ref()
    }

    /// Request cancellation of the underlying command. The next call to
    /// `next()` observes `Error::Cancelled`.
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
        self.done = true;
        self.rx.close();
    }

    /// Pull the next row, or `None` once the stream has fully drained.
    pub async fn next(&mut self) -> Option<Result<R>> {
        if self.done {
            return None;
        }
        match self.rx.recv().await {
            Some(Item::Row(row)) => {
                self.flow.on_pop();
                Some(Ok(row))
            }
            Some(Item::Complete(stats)) => {
                self.stats = Some(stats);
                self.done = true;
                None
            }
            Some(Item::Error(err)) => {
                self.done = true;
                Some(Err(err))
            }
            None => {
                self.done = true;
                None
            }
        }
    }
}
