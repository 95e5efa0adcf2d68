use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task;

use crate::context::ExecutionContext;
use crate::error::{Error, Result};

const QUEUE_SIZE: usize = 32;

/// The callback end of a usage.
///
/// An `Executor` owns a background task that receives resolved
/// [`ExecutionContext`]s over a channel and runs the command body for
/// each, so a slow command never blocks the dispatcher.
pub struct Executor<S> {
    tx: mpsc::Sender<(ExecutionContext<S>, oneshot::Sender<Result<()>>)>,
}

impl<S> Executor<S>
where
    S: Send + Sync + 'static,
{
    /// Creates an executor from an async function or closure.
    pub fn from_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(ExecutionContext<S>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let (tx, mut rx) =
            mpsc::channel::<(ExecutionContext<S>, oneshot::Sender<Result<()>>)>(QUEUE_SIZE);

        let f = Arc::new(f);
        task::spawn(async move {
            while let Some((ctx, tx)) = rx.recv().await {
                let f = f.clone();
                task::spawn(async move {
                    let res = f(ctx).await;
                    let _ = tx.send(res);
                });
            }
        });

        Self { tx }
    }

    /// Runs the command body with a resolved context and waits for its
    /// result.
    pub async fn send(&self, ctx: ExecutionContext<S>) -> Result<()> {
        let (tx, rx) = oneshot::channel();

        let _ = self.tx.send((ctx, tx)).await;

        match rx.await {
            Ok(res) => res,
            // The sender was dropped. This likely happened because the
            // command body panicked.
            Err(_) => Err(Error::NoResponse),
        }
    }
}

impl<S> Clone for Executor<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}
