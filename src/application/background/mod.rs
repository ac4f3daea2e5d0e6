//! Long-running tasks owned by the composition root.
//!
//! Every task runs until its cancellation token fires. In-flight work is
//! finished before `run` returns.

mod dispatcher;
mod sweeper;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use dispatcher::{DispatcherSettings, DispatcherStats, WebhookDispatcher};
pub use sweeper::{ExpirySweeper, SweepStats, SweeperSettings};

#[async_trait]
pub trait BackgroundTask: Send + Sync {
    fn name(&self) -> &'static str;

    /// Runs until `cancel` fires.
    async fn run(&self, cancel: CancellationToken);
}

/// Spawns `task` on the runtime with start and stop logging.
pub fn spawn(task: Arc<dyn BackgroundTask>, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let name = task.name();
        tracing::info!(task = name, "Background task starting");
        task.run(cancel).await;
        tracing::info!(task = name, "Background task stopped");
    })
}
