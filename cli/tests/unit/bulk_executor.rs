//! Bulk executor tests: the concurrency bound, outcome ordering, and the
//! run-polling fan-out with its local timeout.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Result, anyhow};
use flotilla_cli::application::ports::RunStore;
use flotilla_cli::application::services::bulk::{
    BulkStatus, SendOptions, SendTarget, run_all, send_job,
};
use flotilla_cli::domain::resources::{Run, RunStatus};

use crate::mocks::RecordingReporter;

/// A run store whose runs complete on the first poll, except the agents
/// listed in `hang`, whose runs never leave `Running`.
#[derive(Clone, Default)]
struct ScriptedRuns {
    hang: Arc<HashSet<String>>,
}

impl RunStore for ScriptedRuns {
    async fn create_run(&self, agent_id: &str, _message: &str) -> Result<Run> {
        Ok(Run {
            id: format!("run-{agent_id}"),
            status: RunStatus::Running,
            stop_reason: None,
        })
    }

    async fn get_run(&self, run_id: &str) -> Result<Run> {
        let hung = self
            .hang
            .iter()
            .any(|agent| run_id == format!("run-{agent}"));
        Ok(Run {
            id: run_id.to_string(),
            status: if hung {
                RunStatus::Running
            } else {
                RunStatus::Completed
            },
            stop_reason: None,
        })
    }
}

fn options(concurrency: usize) -> SendOptions {
    SendOptions {
        concurrency,
        timeout: Duration::from_secs(2),
        poll_interval: Duration::from_millis(100),
    }
}

#[tokio::test(start_paused = true)]
async fn at_most_limit_jobs_run_concurrently() {
    let inflight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let jobs: Vec<_> = (0..8)
        .map(|i| {
            let inflight = Arc::clone(&inflight);
            let peak = Arc::clone(&peak);
            let work = async move {
                let now = inflight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                inflight.fetch_sub(1, Ordering::SeqCst);
                Ok(BulkStatus::Completed)
            };
            (format!("job-{i}"), work)
        })
        .collect();

    let reporter = RecordingReporter::default();
    let (outcomes, tally) = run_all(&reporter, jobs, 3).await;

    assert_eq!(outcomes.len(), 8);
    assert_eq!(tally.completed, 8);
    assert!(tally.all_completed());
    assert!(
        peak.load(Ordering::SeqCst) <= 3,
        "peak concurrency {} exceeded the limit",
        peak.load(Ordering::SeqCst)
    );
}

#[tokio::test(start_paused = true)]
async fn outcomes_come_back_in_job_order() {
    // later jobs finish first
    let jobs: Vec<_> = (0..4)
        .map(|i| {
            let work = async move {
                tokio::time::sleep(Duration::from_millis(100 * (4 - i))).await;
                Ok(BulkStatus::Completed)
            };
            (format!("job-{i}"), work)
        })
        .collect();

    let reporter = RecordingReporter::default();
    let (outcomes, _) = run_all(&reporter, jobs, 4).await;

    let names: Vec<&str> = outcomes.iter().map(|o| o.target.as_str()).collect();
    assert_eq!(names, vec!["job-0", "job-1", "job-2", "job-3"]);
}

// a single fn keeps every job future the same concrete type
async fn scripted(result: Result<BulkStatus>) -> Result<BulkStatus> {
    result
}

#[tokio::test]
async fn job_errors_become_failed_outcomes_with_detail() {
    let jobs = vec![
        ("good".to_string(), scripted(Ok(BulkStatus::Completed))),
        ("bad".to_string(), scripted(Err(anyhow!("store unreachable")))),
    ];

    let reporter = RecordingReporter::default();
    let (outcomes, tally) = run_all(&reporter, jobs, 2).await;

    assert_eq!(outcomes[0].status, BulkStatus::Completed);
    assert_eq!(outcomes[1].status, BulkStatus::Failed);
    assert_eq!(outcomes[1].detail.as_deref(), Some("store unreachable"));
    assert_eq!(tally.completed, 1);
    assert_eq!(tally.failed, 1);
    assert!(!tally.all_completed());
    assert!(
        reporter
            .warnings()
            .iter()
            .any(|w| w.contains("bad: failed (store unreachable)")),
        "got: {:?}",
        reporter.warnings()
    );
}

#[tokio::test(start_paused = true)]
async fn zero_limit_is_clamped_to_one() {
    let jobs = vec![("only".to_string(), scripted(Ok(BulkStatus::Completed)))];
    let reporter = RecordingReporter::default();
    let (outcomes, _) = run_all(&reporter, jobs, 0).await;
    assert_eq!(outcomes[0].status, BulkStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn send_job_polls_to_completion() {
    let store = ScriptedRuns::default();
    let target = SendTarget {
        name: "triage".into(),
        agent_id: Some("agent-1".into()),
    };

    let status = send_job(store, target, "ping".into(), options(1))
        .await
        .expect("completes");

    assert_eq!(status, BulkStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn send_job_times_out_locally_on_a_stuck_run() {
    let store = ScriptedRuns {
        hang: Arc::new(HashSet::from(["agent-1".to_string()])),
    };
    let target = SendTarget {
        name: "triage".into(),
        agent_id: Some("agent-1".into()),
    };

    let status = send_job(store, target, "ping".into(), options(1))
        .await
        .expect("gives up locally");

    assert_eq!(status, BulkStatus::TimedOut);
}

#[tokio::test]
async fn send_job_fails_fast_for_an_unknown_agent() {
    let store = ScriptedRuns::default();
    let target = SendTarget {
        name: "ghost".into(),
        agent_id: None,
    };

    let err = send_job(store, target, "ping".into(), options(1))
        .await
        .expect_err("unknown agent");

    assert!(err.to_string().contains("'ghost' not found"), "got: {err}");
}

#[tokio::test(start_paused = true)]
async fn one_stuck_agent_never_blocks_the_rest_of_the_fan_out() {
    let store = ScriptedRuns {
        hang: Arc::new(HashSet::from(["agent-3".to_string()])),
    };
    let send = options(5);

    let jobs: Vec<_> = (0..7)
        .map(|i| {
            let name = format!("agent-{i}");
            let target = SendTarget {
                name: name.clone(),
                agent_id: Some(name.clone()),
            };
            (name, send_job(store.clone(), target, "ping".into(), send))
        })
        .collect();

    let reporter = RecordingReporter::default();
    let (outcomes, tally) = run_all(&reporter, jobs, send.concurrency).await;

    assert_eq!(tally.completed, 6);
    assert_eq!(tally.timed_out, 1);
    assert!(!tally.all_completed());
    assert_eq!(outcomes[3].status, BulkStatus::TimedOut);
    assert!(
        outcomes
            .iter()
            .enumerate()
            .all(|(i, o)| i == 3 || o.status == BulkStatus::Completed),
        "got: {outcomes:?}"
    );
}
