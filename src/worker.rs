//! A single-thread worker executor for components that declare
//! themselves non-suspending ([`crate::component::SyncComponent`]).
//!
//! Dispatches a sync component's work onto a `threadpool::ThreadPool`
//! fixed to exactly one thread and collects its result over a channel,
//! so invocation through it remains serialized regardless of how many
//! sync components a run dispatches.

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::component::{ComponentInput, ComponentOutput, SyncComponent};

/// Owns a one-thread `threadpool::ThreadPool`. A caller may construct
/// and inject their own `Worker` (e.g. shared across scheduler
/// instances); otherwise the engine builds a default one sized 1 and
/// scopes its lifetime to the owning `Scheduler`.
pub struct Worker {
    pool: threadpool::ThreadPool,
}

impl Worker {
    /// A fresh worker with exactly one thread.
    pub fn new() -> Self {
        Worker {
            pool: threadpool::Builder::new()
                .num_threads(1)
                .thread_name("flowgraph-worker".into())
                .build(),
        }
    }

    /// Run a sync component's `run` on the worker thread and await its
    /// result without blocking the calling async task. Because the
    /// pool holds exactly one thread, a second call queues behind the
    /// first rather than running concurrently.
    pub async fn dispatch(
        &self,
        component: Arc<dyn SyncComponent>,
        inputs: ComponentInput,
    ) -> anyhow::Result<ComponentOutput> {
        let (tx, rx) = oneshot::channel();
        self.pool.execute(move || {
            let result = component.run(inputs);
            let _ = tx.send(result);
        });
        rx.await
            .map_err(|_| anyhow::anyhow!("worker thread dropped the result channel"))?
    }
}

impl Default for Worker {
    fn default() -> Self {
        Worker::new()
    }
}
