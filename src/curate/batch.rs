//! Fault-isolated batch execution over a bounded worker pool.
//!
//! One task is submitted per target. Each task runs the idempotency gate,
//! then the unit of work, and records exactly one outcome for its target —
//! a failing target can never abort the batch or starve another target of
//! its outcome. The thread driving the batch blocks until every submitted
//! task has completed, then finalizes the report.
//!
//! Units of work are expected to be I/O- or compute-heavy and may hold
//! database connections, so the pool is sized to bound pressure on shared
//! backends rather than to maximize CPU parallelism.
//!
//! Cancellation is cooperative: once a [`CancelToken`] trips, no further
//! targets are submitted, but in-flight work is allowed to finish so
//! store-mutating operations stay coherent. Callers needing hard timeouts
//! must implement them inside the unit of work.

use crate::error::Result;
use crate::history::IdempotencyGate;
use crate::model::{Target, TargetSet};
use crate::outcome::{Outcome, Report, Reporter};
use crossbeam_channel::bounded;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info};

/// Default worker pool size. Deliberately small: units of work typically
/// perform blocking I/O against shared backends.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Result of one unit of work. Explicit variants instead of control-flow
/// errors: "nothing to do" is a value, not an exception.
#[derive(Debug)]
pub enum WorkStatus {
    /// The operation ran to completion.
    Done(String),
    /// The operation completed but something deserves attention.
    Warning {
        message: String,
        cause: Option<String>,
    },
    /// The operation decided there was nothing to do.
    Skip(String),
}

/// Failure raised by a unit of work, after any internal retries.
pub type WorkError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Cooperative cancellation flag, shared between the batch driver and
/// whatever wires it to a termination signal.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Worker pool size, at least 1.
    pub concurrency: usize,
    /// Bypass the idempotency gate.
    pub force: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            force: false,
        }
    }
}

/// Run one unit of work per target across the worker pool and return the
/// finalized report. Blocks until the whole batch has completed.
pub fn run_batch<F>(
    targets: &TargetSet,
    gate: Option<&IdempotencyGate<'_>>,
    work: &F,
    config: &BatchConfig,
    cancel: &CancelToken,
) -> Result<Report>
where
    F: Fn(&Target) -> std::result::Result<WorkStatus, WorkError> + Sync,
{
    let workers = config.concurrency.max(1);
    let reporter = Reporter::new();
    let mut stream_error = None;
    let mut submitted = 0usize;

    thread::scope(|scope| {
        // Bounded so lazy target sets are paged in roughly as fast as the
        // pool consumes them.
        let (tx, rx) = bounded::<Target>(workers);
        for _ in 0..workers {
            let rx = rx.clone();
            let reporter = &reporter;
            scope.spawn(move || {
                for target in rx.iter() {
                    let outcome = run_one(&target, gate, config.force, work);
                    debug!("{}: {}", target, outcome.message());
                    reporter.record(&target, outcome);
                }
            });
        }
        drop(rx);

        for target in targets.iter() {
            if cancel.is_cancelled() {
                info!("cancellation requested, not submitting further targets");
                break;
            }
            match target {
                Ok(target) => {
                    reporter.register(&target);
                    tx.send(target).expect("worker pool hung up");
                    submitted += 1;
                }
                Err(e) => {
                    stream_error = Some(e);
                    break;
                }
            }
        }
        drop(tx);
    });

    if let Some(e) = stream_error {
        return Err(e);
    }
    let report = reporter.finalize();
    info!(
        "batch finished: {} of {} submitted target(s) completed",
        report.len(),
        submitted
    );
    Ok(report)
}

/// Run the gate and the unit of work for one target, converting every
/// possible failure, including a panic, into an outcome.
fn run_one<F>(
    target: &Target,
    gate: Option<&IdempotencyGate<'_>>,
    force: bool,
    work: &F,
) -> Outcome
where
    F: Fn(&Target) -> std::result::Result<WorkStatus, WorkError> + Sync,
{
    if let Some(gate) = gate {
        match gate.should_run(target, force) {
            Ok(true) => {}
            Ok(false) => {
                return Outcome::skipped(format!(
                    "no data change since the last '{}' run, use force to reprocess",
                    gate.operation()
                ))
            }
            Err(e) => {
                return Outcome::error("failed to consult the event history", e.to_string())
            }
        }
    }

    match catch_unwind(AssertUnwindSafe(|| work(target))) {
        Ok(Ok(WorkStatus::Done(message))) => Outcome::success(message),
        Ok(Ok(WorkStatus::Warning { message, cause })) => Outcome::warning(message, cause),
        Ok(Ok(WorkStatus::Skip(message))) => Outcome::skipped(message),
        Ok(Err(error)) => Outcome::error("processing failed", error_chain(&*error)),
        Err(panic) => Outcome::error("processing panicked", panic_message(panic)),
    }
}

fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "opaque panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{InMemoryHistory, IdempotencyGate};
    use crate::outcome::{Disposition, OutcomeKind};
    use crate::retry::RetryPolicy;
    use chrono::{Duration as ChronoDuration, Utc};
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;

    fn targets(n: u64) -> TargetSet {
        TargetSet::from_targets((1..=n).map(|i| Target::new(i, format!("GSE{}", i))))
    }

    #[test]
    fn every_target_gets_exactly_one_outcome() {
        let set = targets(8);
        let work = |_: &Target| Ok(WorkStatus::Done("done".to_string()));
        let report = run_batch(
            &set,
            None,
            &work,
            &BatchConfig::default(),
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(report.len(), 8);
        assert_eq!(report.disposition(), Disposition::AllOk);
    }

    #[test]
    fn failures_hit_exactly_the_failing_subset() {
        let set = targets(10);
        let failing = [2u64, 5, 9];
        let work = move |t: &Target| {
            if failing.contains(&t.id) {
                Err::<WorkStatus, WorkError>("backend unavailable".into())
            } else {
                Ok(WorkStatus::Done("done".to_string()))
            }
        };
        let report = run_batch(
            &set,
            None,
            &work,
            &BatchConfig {
                concurrency: 3,
                force: false,
            },
            &CancelToken::new(),
        )
        .unwrap();

        assert_eq!(report.len(), 10);
        for (target, outcome) in report.entries() {
            if failing.contains(&target.id) {
                assert_eq!(outcome.kind(), OutcomeKind::Error);
            } else {
                assert_eq!(outcome.kind(), OutcomeKind::Success);
            }
        }
        assert_eq!(report.disposition(), Disposition::PartialFailure);
    }

    #[test]
    fn pool_smaller_than_batch_records_everything_once() {
        let set = targets(25);
        let calls = AtomicUsize::new(0);
        let work = |_: &Target| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(WorkStatus::Done("done".to_string()))
        };
        let report = run_batch(
            &set,
            None,
            &work,
            &BatchConfig {
                concurrency: 2,
                force: false,
            },
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(report.len(), 25);
        assert_eq!(calls.load(Ordering::SeqCst), 25);
    }

    #[test]
    fn report_order_follows_target_set_order_not_completion_order() {
        let set = targets(6);
        // earlier targets sleep longer, so completion order is reversed
        let work = |t: &Target| {
            std::thread::sleep(Duration::from_millis(30 * (7 - t.id)));
            Ok(WorkStatus::Done("done".to_string()))
        };
        let report = run_batch(
            &set,
            None,
            &work,
            &BatchConfig {
                concurrency: 6,
                force: false,
            },
            &CancelToken::new(),
        )
        .unwrap();
        let ids: Vec<u64> = report.entries().iter().map(|(t, _)| t.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn a_panicking_unit_of_work_is_contained() {
        let set = targets(3);
        let work = |t: &Target| {
            if t.id == 2 {
                panic!("index out of bounds in vector merge");
            }
            Ok(WorkStatus::Done("done".to_string()))
        };
        let report = run_batch(
            &set,
            None,
            &work,
            &BatchConfig::default(),
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(report.len(), 3);
        let (_, outcome) = &report.entries()[1];
        assert_eq!(outcome.kind(), OutcomeKind::Error);
        assert!(outcome.cause().unwrap().contains("index out of bounds"));
        assert_eq!(report.disposition(), Disposition::PartialFailure);
    }

    #[test]
    fn gate_skips_are_recorded_not_silent() {
        let history = InMemoryHistory::new();
        let now = Utc::now();
        let set = targets(3);
        for t in [1u64, 3] {
            let target = Target::new(t, format!("GSE{}", t));
            history.record_data_change(&target, now - ChronoDuration::hours(2));
            history.record_event(&target, "sweep", now - ChronoDuration::hours(1));
        }
        let gate = IdempotencyGate::new(&history, "sweep");
        let work = |_: &Target| Ok(WorkStatus::Done("swept".to_string()));
        let report = run_batch(
            &set,
            Some(&gate),
            &work,
            &BatchConfig::default(),
            &CancelToken::new(),
        )
        .unwrap();

        assert_eq!(report.len(), 3);
        assert_eq!(report.count(OutcomeKind::Skipped), 2);
        assert_eq!(report.count(OutcomeKind::Success), 1);
        assert_eq!(report.disposition(), Disposition::AllOk);
    }

    #[test]
    fn force_bypasses_the_gate() {
        let history = InMemoryHistory::new();
        let now = Utc::now();
        let target = Target::new(1, "GSE1");
        history.record_data_change(&target, now - ChronoDuration::hours(2));
        history.record_event(&target, "sweep", now - ChronoDuration::hours(1));

        let gate = IdempotencyGate::new(&history, "sweep");
        let set = targets(1);
        let work = |_: &Target| Ok(WorkStatus::Done("swept".to_string()));
        let report = run_batch(
            &set,
            Some(&gate),
            &work,
            &BatchConfig {
                concurrency: 1,
                force: true,
            },
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(report.count(OutcomeKind::Success), 1);
    }

    #[test]
    fn cancelled_batch_submits_nothing() {
        let set = targets(5);
        let cancel = CancelToken::new();
        cancel.cancel();
        let calls = AtomicUsize::new(0);
        let work = |_: &Target| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(WorkStatus::Done("done".to_string()))
        };
        let report = run_batch(&set, None, &work, &BatchConfig::default(), &cancel).unwrap();
        assert!(report.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn work_skip_and_warning_variants_map_to_outcomes() {
        let set = targets(3);
        let work = |t: &Target| match t.id {
            1 => Ok(WorkStatus::Skip("no vectors to merge".to_string())),
            2 => Ok(WorkStatus::Warning {
                message: "merged with gaps".to_string(),
                cause: Some("3 assays missing".to_string()),
            }),
            _ => Ok(WorkStatus::Done("merged".to_string())),
        };
        let report = run_batch(
            &set,
            None,
            &work,
            &BatchConfig::default(),
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(report.count(OutcomeKind::Skipped), 1);
        assert_eq!(report.count(OutcomeKind::Warning), 1);
        assert_eq!(report.count(OutcomeKind::Success), 1);
        assert_eq!(report.disposition(), Disposition::AllOk);
    }

    // Three experiments, the middle one fails even after retries.
    #[test]
    fn retrying_unit_of_work_surfaces_attempt_count_in_the_cause() {
        let set = targets(3);
        let attempts: Mutex<HashMap<u64, u32>> = Mutex::new(HashMap::new());
        let policy = RetryPolicy::new(2, Duration::ZERO, 2.0);
        let work = |t: &Target| {
            let id = t.id;
            policy
                .execute("refresh", || {
                    *attempts.lock().unwrap().entry(id).or_insert(0) += 1;
                    if id == 2 {
                        Err("remote endpoint returned 503")
                    } else {
                        Ok(())
                    }
                })
                .map(|_| WorkStatus::Done("refreshed".to_string()))
                .map_err(|e| -> WorkError { e.to_string().into() })
        };
        let report = run_batch(
            &set,
            None,
            &work,
            &BatchConfig::default(),
            &CancelToken::new(),
        )
        .unwrap();

        assert_eq!(report.disposition(), Disposition::PartialFailure);
        let (_, outcome) = &report.entries()[1];
        assert_eq!(outcome.kind(), OutcomeKind::Error);
        assert!(outcome.cause().unwrap().contains("failed after 3 attempt(s)"));
        assert_eq!(attempts.lock().unwrap()[&2], 3);
        assert_eq!(attempts.lock().unwrap()[&1], 1);
    }
}
