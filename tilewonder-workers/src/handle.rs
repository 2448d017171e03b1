use futures::channel::{mpsc, oneshot};
use futures::{FutureExt, StreamExt};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tilewonder_core::{TileBuffer, TileId};

/// Pool-side half of a submitted request: one live entry per outstanding id.
///
/// `resolve` takes `self`, so the completion sender fires at most once.
pub(crate) struct PendingTile {
    pub(crate) worker: usize,
    previews: mpsc::UnboundedSender<TileBuffer>,
    completion: oneshot::Sender<TileBuffer>,
}

impl PendingTile {
    /// Deliver an intermediate stage. Dropped silently if the caller discarded the handle.
    pub(crate) fn preview(&self, buffer: TileBuffer) {
        let _ = self.previews.unbounded_send(buffer);
    }

    /// Deliver the final result (or the cancellation sentinel) and close the preview stream.
    pub(crate) fn resolve(self, buffer: TileBuffer) {
        let _ = self.completion.send(buffer);
    }
}

/// Caller-side half of a submitted request.
///
/// Awaiting the handle yields the final full-resolution buffer, or the empty
/// cancellation sentinel (`TileBuffer::is_cancelled`) if the request was cancelled.
/// Coarser previews arrive beforehand through `try_preview` / `next_preview`;
/// each preview supersedes the previous one.
///
/// Results are only delivered while the pool dispatches worker messages
/// (`WorkerPool::dispatch_results`, `wait_for_result` or `run_until_idle`).
pub struct TileHandle {
    id: TileId,
    worker: usize,
    previews: mpsc::UnboundedReceiver<TileBuffer>,
    completion: oneshot::Receiver<TileBuffer>,
}

pub(crate) fn pending_pair(id: TileId, worker: usize) -> (PendingTile, TileHandle) {
    let (previews_tx, previews_rx) = mpsc::unbounded();
    let (completion_tx, completion_rx) = oneshot::channel();
    (
        PendingTile {
            worker,
            previews: previews_tx,
            completion: completion_tx,
        },
        TileHandle {
            id,
            worker,
            previews: previews_rx,
            completion: completion_rx,
        },
    )
}

impl TileHandle {
    pub fn id(&self) -> TileId {
        self.id
    }

    /// Index of the worker the request was routed to.
    pub fn worker(&self) -> usize {
        self.worker
    }

    /// Next undelivered preview, if one is ready.
    pub fn try_preview(&mut self) -> Option<TileBuffer> {
        self.previews.next().now_or_never().flatten()
    }

    /// Newest ready preview, discarding older ones.
    pub fn latest_preview(&mut self) -> Option<TileBuffer> {
        let mut latest = None;
        while let Some(buffer) = self.try_preview() {
            latest = Some(buffer);
        }
        latest
    }

    /// Wait for the next preview. `None` once the request is resolved.
    pub async fn next_preview(&mut self) -> Option<TileBuffer> {
        self.previews.next().await
    }

    /// Final result if it has been delivered, without waiting.
    ///
    /// The result is handed out once; later calls (and awaiting the handle)
    /// yield the cancellation sentinel.
    pub fn try_result(&mut self) -> Option<TileBuffer> {
        match self.completion.try_recv() {
            Ok(result) => result,
            Err(oneshot::Canceled) => Some(TileBuffer::cancelled()),
        }
    }
}

impl Future for TileHandle {
    type Output = TileBuffer;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.completion)
            .poll(cx)
            .map(|result| result.unwrap_or_else(|_| TileBuffer::cancelled()))
    }
}
