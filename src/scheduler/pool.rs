//! Bounded dispatch of outer groups and their work items
//!
//! A pool admits at most `outer` groups at a time and, within each group,
//! at most `inner` items at a time. The outer slot stays taken until the
//! last item of the group has finished executing.

use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::matrix::OuterGroup;
use super::runner::worker::{Slots, Worker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PoolLimits {
    pub outer: usize,
    pub inner: usize,
}

/// Dropped once a dispatcher has nothing left to hand out
pub(crate) type DispatchGuard = mpsc::Sender<()>;

/// Dispatch every group of one pool and wait for all of its workers
pub(crate) async fn run_pool(
    name: &'static str,
    groups: Vec<OuterGroup>,
    limits: PoolLimits,
    worker: Arc<Worker>,
    cancel: CancellationToken,
    guard: DispatchGuard,
) {
    if groups.is_empty() {
        return;
    }
    log::debug!(
        "{} pool: {} groups, {} x {} slots",
        name,
        groups.len(),
        limits.outer,
        limits.inner
    );

    let outer = Arc::new(Semaphore::new(limits.outer.max(1)));
    let mut dispatchers = JoinSet::new();

    for group in groups {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            permit = Arc::clone(&outer).acquire_owned() => match permit {
                Ok(permit) => Arc::new(permit),
                Err(_) => break,
            },
        };

        dispatchers.spawn(dispatch_group(
            group,
            permit,
            limits.inner,
            Arc::clone(&worker),
            cancel.clone(),
            guard.clone(),
        ));
    }
    drop(guard);

    while let Some(result) = dispatchers.join_next().await {
        if let Err(e) = result {
            log::error!("{} pool dispatcher failed: {}", name, e);
        }
    }
}

async fn dispatch_group(
    group: OuterGroup,
    outer_permit: Arc<tokio::sync::OwnedSemaphorePermit>,
    inner_limit: usize,
    worker: Arc<Worker>,
    cancel: CancellationToken,
    guard: DispatchGuard,
) {
    let inner = Arc::new(Semaphore::new(inner_limit.max(1)));
    let mut workers = JoinSet::new();

    for item in group.items {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            permit = Arc::clone(&inner).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let slots = Slots {
            outer: Arc::clone(&outer_permit),
            inner: permit,
        };
        let worker = Arc::clone(&worker);
        workers.spawn(async move { worker.run(item, slots).await });
    }
    drop(outer_permit);
    drop(guard);

    while let Some(result) = workers.join_next().await {
        if let Err(e) = result {
            log::error!("Worker for group {} failed: {}", group.key, e);
        }
    }
}
