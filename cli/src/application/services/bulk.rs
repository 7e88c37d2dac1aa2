//! Application service — bounded bulk execution and message fan-out.
//!
//! `run_all` is a semaphore-gated task spawner: every job is spawned into
//! a `JoinSet` up front, but a permit is acquired inside each task before
//! its work future is polled, so at most `limit` jobs make progress at
//! once. Per-job errors (including panics) become `Failed` outcomes and
//! never abort sibling jobs.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::application::ports::{ProgressReporter, RunStore};
use crate::domain::error::AgentError;
use crate::domain::resources::RunStatus;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Terminal result for one bulk job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkStatus {
    Completed,
    Failed,
    TimedOut,
    Cancelled,
}

impl BulkStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::TimedOut => "timed out",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkOutcome {
    pub target: String,
    pub status: BulkStatus,
    /// Error text for failed jobs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct BulkTally {
    pub completed: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub cancelled: usize,
}

impl BulkTally {
    #[must_use]
    pub fn all_completed(&self) -> bool {
        self.failed == 0 && self.timed_out == 0 && self.cancelled == 0
    }

    fn count(&mut self, status: BulkStatus) {
        match status {
            BulkStatus::Completed => self.completed += 1,
            BulkStatus::Failed => self.failed += 1,
            BulkStatus::TimedOut => self.timed_out += 1,
            BulkStatus::Cancelled => self.cancelled += 1,
        }
    }
}

/// Run every job with at most `limit` in flight. A status line is emitted
/// as each job resolves; outcomes come back in job order regardless of
/// completion order.
pub async fn run_all<Fut>(
    reporter: &impl ProgressReporter,
    jobs: Vec<(String, Fut)>,
    limit: usize,
) -> (Vec<BulkOutcome>, BulkTally)
where
    Fut: Future<Output = Result<BulkStatus>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));
    let names: Vec<String> = jobs.iter().map(|(name, _)| name.clone()).collect();
    let mut tasks: JoinSet<(usize, Result<BulkStatus>)> = JoinSet::new();
    for (index, (_, work)) in jobs.into_iter().enumerate() {
        let gate = Arc::clone(&semaphore);
        tasks.spawn(async move {
            // the semaphore is never closed, so acquire cannot fail
            let _permit = gate.acquire_owned().await;
            (index, work.await)
        });
    }

    let mut slots: Vec<Option<BulkOutcome>> = names.iter().map(|_| None).collect();
    let mut tally = BulkTally::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, result)) => {
                let target = names[index].clone();
                let outcome = match result {
                    Ok(status) => BulkOutcome {
                        target,
                        status,
                        detail: None,
                    },
                    Err(e) => BulkOutcome {
                        target,
                        status: BulkStatus::Failed,
                        detail: Some(format!("{e}")),
                    },
                };
                emit(reporter, &outcome);
                tally.count(outcome.status);
                slots[index] = Some(outcome);
            }
            // a panicked task loses its index; the slot backfill below
            // turns it into a failed outcome
            Err(e) if e.is_panic() => reporter.warn("a bulk task panicked"),
            Err(_) => {}
        }
    }

    let outcomes = slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.unwrap_or_else(|| {
                let outcome = BulkOutcome {
                    target: names[index].clone(),
                    status: BulkStatus::Failed,
                    detail: Some("task panicked".to_string()),
                };
                emit(reporter, &outcome);
                tally.count(outcome.status);
                outcome
            })
        })
        .collect();
    (outcomes, tally)
}

fn emit(reporter: &impl ProgressReporter, outcome: &BulkOutcome) {
    match outcome.status {
        BulkStatus::Completed => reporter.success(&format!("{}: completed", outcome.target)),
        status => {
            let detail = outcome
                .detail
                .as_deref()
                .map(|d| format!(" ({d})"))
                .unwrap_or_default();
            reporter.warn(&format!("{}: {}{detail}", outcome.target, status.as_str()));
        }
    }
}

/// One fan-out target: an agent name and, when it exists on the store,
/// its resolved id.
#[derive(Debug, Clone)]
pub struct SendTarget {
    pub name: String,
    pub agent_id: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct SendOptions {
    pub concurrency: usize,
    pub timeout: Duration,
    pub poll_interval: Duration,
}

/// One complete fan-out job: enqueue an asynchronous run for the target
/// and poll it to a terminal status. A timeout is a local give-up, the
/// remote run is not cancelled. The returned future owns its store clone,
/// so callers hand it straight to `run_all`.
pub async fn send_job<S: RunStore>(
    store: S,
    target: SendTarget,
    message: String,
    options: SendOptions,
) -> Result<BulkStatus> {
    let agent_id = target.agent_id.ok_or(AgentError::NotFound(target.name))?;
    let run = store.create_run(&agent_id, &message).await?;
    let poll = async {
        let mut current = run;
        loop {
            if current.status.is_terminal() {
                return Ok(match current.status {
                    RunStatus::Completed => BulkStatus::Completed,
                    RunStatus::Cancelled => BulkStatus::Cancelled,
                    _ => BulkStatus::Failed,
                });
            }
            tokio::time::sleep(options.poll_interval).await;
            current = store.get_run(&current.id).await?;
        }
    };
    match tokio::time::timeout(options.timeout, poll).await {
        Ok(result) => result,
        Err(_) => Ok(BulkStatus::TimedOut),
    }
}
