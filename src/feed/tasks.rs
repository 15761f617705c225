//! Background task plumbing.
//!
//! Every remote call runs in its own tokio task and reports back with exactly
//! one [`FeedEvent`]. If the task panics, a caller-supplied fallback event is
//! sent instead, so the view-model always gets to release its in-flight locks.

use super::events::FeedEvent;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Run a future, converting a panic into `Err(message)`.
pub(crate) async fn catch_task_panic<F, T>(future: F) -> Result<T, String>
where
    F: Future<Output = T>,
{
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(|panic| {
            if let Some(s) = panic.downcast_ref::<&'static str>() {
                s.to_string()
            } else if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic payload".to_string()
            }
        })
}

/// Spawn `future` and deliver its event on `tx`.
///
/// `on_panic` builds the event to send if the future panics.
pub(crate) fn spawn_reporting<F, P>(
    tx: mpsc::Sender<FeedEvent>,
    task: &'static str,
    future: F,
    on_panic: P,
) -> JoinHandle<()>
where
    F: Future<Output = FeedEvent> + Send + 'static,
    P: FnOnce(String) -> FeedEvent + Send + 'static,
{
    tokio::spawn(async move {
        let event = match catch_task_panic(future).await {
            Ok(event) => event,
            Err(panic_msg) => {
                tracing::error!(task, error = %panic_msg, "Background task panicked");
                on_panic(panic_msg)
            }
        };
        if let Err(e) = tx.send(event).await {
            tracing::warn!(error = %e, task, "Channel send failed (receiver dropped)");
        }
    })
}
