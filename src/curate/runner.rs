//! The composed batch run: confirmation gate, then target resolution, then
//! fault-isolated execution, then the rendered report.
//!
//! Commands do not subclass anything. They build a [`BatchRun`] from their
//! configuration, supply their unit-of-work closure, and get a [`Report`]
//! back; everything else (gating, pooling, outcome bookkeeping, rendering)
//! is this module's job.

use crate::batch::{run_batch, BatchConfig, CancelToken, WorkError, WorkStatus};
use crate::confirm::confirm;
use crate::error::{CurateError, Result};
use crate::history::{EventHistory, IdempotencyGate};
use crate::model::Target;
use crate::outcome::{Report, EXIT_ABORTED};
use crate::registry::EntityRegistry;
use crate::resolve::{resolve, ResolutionMode, TargetSpec};
use std::io::{BufRead, Write};
use std::sync::Arc;

/// One configured batch invocation.
pub struct BatchRun<'a> {
    registry: Arc<dyn EntityRegistry>,
    spec: TargetSpec,
    mode: ResolutionMode,
    gate: Option<IdempotencyGate<'a>>,
    confirmation: Option<String>,
    config: BatchConfig,
    cancel: CancelToken,
}

impl<'a> BatchRun<'a> {
    pub fn new(registry: Arc<dyn EntityRegistry>, spec: TargetSpec) -> Self {
        Self {
            registry,
            spec,
            mode: ResolutionMode::Eager,
            gate: None,
            confirmation: None,
            config: BatchConfig::default(),
            cancel: CancelToken::new(),
        }
    }

    /// Resolve "all" lazily, paging the registry instead of materializing it.
    pub fn lazy(mut self) -> Self {
        self.mode = ResolutionMode::Lazy;
        self
    }

    /// Skip targets whose most recent `operation` event postdates their last
    /// data change.
    pub fn with_gate(mut self, history: &'a dyn EventHistory, operation: impl Into<String>) -> Self {
        self.gate = Some(IdempotencyGate::new(history, operation));
        self
    }

    /// Require operator confirmation before anything runs. Destructive
    /// commands set this; `force` bypasses it.
    pub fn confirmation(mut self, prompt: impl Into<String>) -> Self {
        self.confirmation = Some(prompt.into());
        self
    }

    pub fn concurrency(mut self, workers: usize) -> Self {
        self.config.concurrency = workers;
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.config.force = force;
        self
    }

    /// Token observed between target submissions; wire it to a termination
    /// signal to let in-flight work finish while submitting nothing new.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run the whole pipeline: confirmation gate, resolution, batch
    /// execution, report rendering to `output`.
    pub fn execute<F>(
        &self,
        work: &F,
        input: &mut dyn BufRead,
        output: &mut dyn Write,
    ) -> Result<Report>
    where
        F: Fn(&Target) -> std::result::Result<WorkStatus, WorkError> + Sync,
    {
        if let Some(prompt) = &self.confirmation {
            confirm(prompt, self.config.force, input, output)?;
        }
        let targets = resolve(&self.registry, &self.spec, self.mode)?;
        let report = run_batch(
            &targets,
            self.gate.as_ref(),
            work,
            &self.config,
            &self.cancel,
        )?;
        report.render(output)?;
        Ok(report)
    }
}

/// Map a finished (or failed) run to a process exit status: the report's
/// disposition when the batch ran, 3 for a pre-flight abort, 1 for any
/// other fatal error.
pub fn exit_code(result: &Result<Report>) -> i32 {
    match result {
        Ok(report) => report.disposition().exit_code(),
        Err(CurateError::Aborted(_)) => EXIT_ABORTED,
        Err(_) => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::InMemoryHistory;
    use crate::outcome::{Disposition, OutcomeKind};
    use crate::registry::memory::InMemoryRegistry;
    use chrono::{Duration, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn registry(n: u64) -> Arc<dyn EntityRegistry> {
        Arc::new(InMemoryRegistry::with_entities(
            (1..=n).map(|i| Target::new(i, format!("GSE{}", i))),
        ))
    }

    fn done(_: &Target) -> std::result::Result<WorkStatus, WorkError> {
        Ok(WorkStatus::Done("done".to_string()))
    }

    #[test]
    fn end_to_end_partial_failure() {
        let run = BatchRun::new(registry(3), TargetSpec::All);
        let work = |t: &Target| {
            if t.id == 2 {
                Err::<WorkStatus, WorkError>("vector merge failed".into())
            } else {
                Ok(WorkStatus::Done("merged".to_string()))
            }
        };
        let mut output = Vec::new();
        let result = run.execute(&work, &mut "".as_bytes(), &mut output);
        let report = result.as_ref().unwrap();
        assert_eq!(report.disposition(), Disposition::PartialFailure);
        assert_eq!(exit_code(&result), 2);

        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("ERROR GSE2"));
        assert!(text.contains("1 error(s)"));
    }

    #[test]
    fn declined_confirmation_aborts_before_any_work() {
        let calls = AtomicUsize::new(0);
        let work = |_: &Target| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(WorkStatus::Done("done".to_string()))
        };
        let run = BatchRun::new(registry(3), TargetSpec::All)
            .confirmation("this deletes 3 experiments and their analyses");
        let mut output: Vec<u8> = Vec::new();
        let result = run.execute(&work, &mut "no\n".as_bytes(), &mut output);
        assert!(matches!(result, Err(CurateError::Aborted(_))));
        assert_eq!(exit_code(&result), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn force_bypasses_confirmation_and_gate() {
        let history = InMemoryHistory::new();
        let now = Utc::now();
        let target = Target::new(1, "GSE1");
        history.record_data_change(&target, now - Duration::hours(2));
        history.record_event(&target, "purge", now - Duration::hours(1));

        let run = BatchRun::new(registry(1), TargetSpec::All)
            .with_gate(&history, "purge")
            .confirmation("destructive")
            .force(true);
        let mut output: Vec<u8> = Vec::new();
        let report = run.execute(&done, &mut "".as_bytes(), &mut output).unwrap();
        assert_eq!(report.count(OutcomeKind::Success), 1);
    }

    #[test]
    fn second_unforced_run_is_skipped() {
        let history = InMemoryHistory::new();
        let registry = registry(2);
        let run = BatchRun::new(Arc::clone(&registry), TargetSpec::All).with_gate(&history, "sweep");
        let work = |t: &Target| {
            // what a real command does on completion: record the event
            history.record_event(t, "sweep", Utc::now());
            Ok(WorkStatus::Done("swept".to_string()))
        };
        let report = run
            .execute(&work, &mut "".as_bytes(), &mut Vec::<u8>::new())
            .unwrap();
        assert_eq!(report.count(OutcomeKind::Success), 2);

        let rerun = BatchRun::new(registry, TargetSpec::All).with_gate(&history, "sweep");
        let report = rerun
            .execute(&work, &mut "".as_bytes(), &mut Vec::<u8>::new())
            .unwrap();
        assert_eq!(report.count(OutcomeKind::Skipped), 2);
        assert_eq!(report.disposition(), Disposition::AllOk);
    }

    #[test]
    fn resolution_failure_stops_the_run() {
        let run = BatchRun::new(
            registry(1),
            TargetSpec::Identifiers(vec!["GSE404".to_string()]),
        );
        let result = run.execute(&done, &mut "".as_bytes(), &mut Vec::<u8>::new());
        assert!(matches!(result, Err(CurateError::NotFound(_))));
        assert_eq!(exit_code(&result), 1);
    }
}
