//! Fan-out/fan-in coordinator.
//!
//! # Responsibilities
//! - Launch one task per target
//! - Wait until every task reached a terminal state, or the batch deadline fires
//! - Assemble exactly one outcome per target, in input order
//!
//! # Design Decisions
//! - Each unit hands its outcome back through its join handle; there is no
//!   shared result container
//! - Units still pending at the deadline are aborted and reported as timeouts
//! - A per-run semaphore bounds how many units talk to upstreams at once

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::{self, JoinError, JoinSet};
use tokio::time::{self, Instant};

use crate::fanout::client::UpstreamClient;
use crate::fanout::types::{FailureKind, FanOutResult, Outcome, Target};
use crate::observability::metrics;

/// Runs batches of targets concurrently against an [`UpstreamClient`].
#[derive(Clone)]
pub struct FanOutCoordinator {
    client: Arc<dyn UpstreamClient>,
    max_in_flight: Option<usize>,
}

impl FanOutCoordinator {
    /// Create an unbounded coordinator.
    pub fn new(client: Arc<dyn UpstreamClient>) -> Self {
        Self {
            client,
            max_in_flight: None,
        }
    }

    /// Limit the number of units calling the client at the same time.
    ///
    /// Units beyond the limit stay pending until a slot frees up. A limit of
    /// zero is treated as one.
    pub fn with_max_in_flight(mut self, limit: usize) -> Self {
        self.max_in_flight = Some(limit.max(1));
        self
    }

    /// Fetch every target concurrently and wait for all of them.
    ///
    /// Never fails: per-unit errors become [`Outcome::Failure`] entries. When
    /// `timeout` elapses first, the remaining units are cancelled and reported
    /// as [`FailureKind::Timeout`].
    pub async fn run(&self, targets: Vec<Target>, timeout: Option<Duration>) -> FanOutResult {
        let start = Instant::now();

        if targets.is_empty() {
            let result = FanOutResult {
                outcomes: Vec::new(),
                elapsed: start.elapsed(),
                timed_out: false,
            };
            metrics::record_batch(&result);
            return result;
        }

        // A deadline past the clock's range never fires.
        let deadline = timeout.and_then(|t| start.checked_add(t));
        let slots = self
            .max_in_flight
            .unwrap_or(targets.len())
            .clamp(1, Semaphore::MAX_PERMITS);
        let permits = Arc::new(Semaphore::new(slots));

        tracing::debug!(
            targets = targets.len(),
            max_in_flight = slots,
            timeout_ms = timeout.map(|t| t.as_millis() as u64),
            "Starting fan-out batch"
        );

        let mut units = JoinSet::new();
        let mut index_of = HashMap::with_capacity(targets.len());

        for (index, target) in targets.iter().enumerate() {
            let client = Arc::clone(&self.client);
            let permits = Arc::clone(&permits);
            let target = target.clone();

            let handle = units.spawn(async move {
                // Held until the fetch completes; the semaphore outlives every unit.
                let _permit = permits.acquire_owned().await.ok();
                client.fetch(&target).await
            });
            index_of.insert(handle.id(), index);
        }

        let mut state = RunState::new(targets, index_of);

        let mut timed_out = false;
        while state.pending > 0 {
            let joined = match deadline {
                Some(deadline) => match time::timeout_at(deadline, units.join_next_with_id()).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        timed_out = true;
                        break;
                    }
                },
                None => units.join_next_with_id().await,
            };

            match joined {
                Some(Ok((id, outcome))) => state.complete(id, outcome),
                Some(Err(e)) => {
                    let elapsed = start.elapsed();
                    state.crashed(e, elapsed);
                }
                None => break,
            }
        }

        if timed_out {
            tracing::warn!(
                pending = state.pending,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Batch deadline reached, cancelling pending units"
            );
        }

        // Cancel and reap whatever is left so connections are released before returning.
        units.abort_all();
        while units.join_next().await.is_some() {}

        let elapsed = start.elapsed();
        let result = FanOutResult {
            outcomes: state.finish(elapsed),
            elapsed,
            timed_out,
        };

        tracing::info!(
            targets = result.len(),
            succeeded = result.success_count(),
            failed = result.failure_count(),
            timed_out,
            elapsed_ms = elapsed.as_millis() as u64,
            "Fan-out batch complete"
        );
        metrics::record_batch(&result);

        result
    }
}

impl std::fmt::Debug for FanOutCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanOutCoordinator")
            .field("max_in_flight", &self.max_in_flight)
            .finish()
    }
}

/// Bookkeeping for one batch. Lives only for the duration of `run`.
struct RunState {
    targets: Vec<Target>,
    slots: Vec<Option<Outcome>>,
    index_of: HashMap<task::Id, usize>,
    pending: usize,
}

impl RunState {
    fn new(targets: Vec<Target>, index_of: HashMap<task::Id, usize>) -> Self {
        let pending = targets.len();
        Self {
            slots: (0..pending).map(|_| None).collect(),
            index_of,
            targets,
            pending,
        }
    }

    fn complete(&mut self, id: task::Id, outcome: Outcome) {
        let Some(index) = self.index_of.remove(&id) else {
            tracing::error!(task_id = %id, "Completion for unknown unit");
            return;
        };
        if self.slots[index].replace(outcome).is_none() {
            self.pending -= 1;
        }
    }

    fn crashed(&mut self, error: JoinError, elapsed: Duration) {
        let id = error.id();
        let Some(&index) = self.index_of.get(&id) else {
            tracing::error!(task_id = %id, "Failure for unknown unit");
            return;
        };

        let reason = if error.is_panic() {
            panic_message(error.into_panic())
        } else {
            "cancelled".to_string()
        };
        tracing::error!(url = %self.targets[index], reason = %reason, "Fan-out unit crashed");

        let outcome = Outcome::failure(
            self.targets[index].clone(),
            FailureKind::Panicked(reason),
            elapsed,
        );
        self.complete(id, outcome);
    }

    /// Produce the outcome list, marking every unit that never reported as timed out.
    fn finish(self, elapsed: Duration) -> Vec<Outcome> {
        self.slots
            .into_iter()
            .zip(self.targets)
            .map(|(slot, target)| {
                slot.unwrap_or_else(|| Outcome::failure(target, FailureKind::Timeout, elapsed))
            })
            .collect()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
