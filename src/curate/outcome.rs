//! Per-target outcomes, the thread-safe run ledger, and the final report.
//!
//! Every resolved target receives exactly one terminal [`Outcome`] by the
//! time the report is finalized, even when its unit of work fails or the
//! idempotency gate skips it. Outcomes are write-once: recording a second
//! outcome for the same target means task isolation is broken and is
//! treated as a fatal programming error, not a recoverable condition.

use crate::model::Target;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::{self, Write};
use std::sync::Mutex;

/// Terminal result for one target.
#[derive(Debug, Clone)]
pub enum Outcome {
    Success {
        message: String,
    },
    /// The idempotency gate found nothing to do, or the unit of work
    /// reported an explicit skip.
    Skipped {
        message: String,
    },
    Warning {
        message: String,
        cause: Option<String>,
    },
    Error {
        message: String,
        cause: String,
    },
}

impl Outcome {
    pub fn success(message: impl Into<String>) -> Self {
        Outcome::Success {
            message: message.into(),
        }
    }

    pub fn skipped(message: impl Into<String>) -> Self {
        Outcome::Skipped {
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>, cause: Option<String>) -> Self {
        Outcome::Warning {
            message: message.into(),
            cause,
        }
    }

    pub fn error(message: impl Into<String>, cause: impl Into<String>) -> Self {
        Outcome::Error {
            message: message.into(),
            cause: cause.into(),
        }
    }

    pub fn kind(&self) -> OutcomeKind {
        match self {
            Outcome::Success { .. } => OutcomeKind::Success,
            Outcome::Skipped { .. } => OutcomeKind::Skipped,
            Outcome::Warning { .. } => OutcomeKind::Warning,
            Outcome::Error { .. } => OutcomeKind::Error,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Outcome::Success { message }
            | Outcome::Skipped { message }
            | Outcome::Warning { message, .. }
            | Outcome::Error { message, .. } => message,
        }
    }

    /// Full cause, if any. Never truncated here; truncation only happens
    /// when rendering the summary.
    pub fn cause(&self) -> Option<&str> {
        match self {
            Outcome::Warning { cause, .. } => cause.as_deref(),
            Outcome::Error { cause, .. } => Some(cause),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Success,
    Skipped,
    Warning,
    Error,
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OutcomeKind::Success => "OK",
            OutcomeKind::Skipped => "SKIP",
            OutcomeKind::Warning => "WARN",
            OutcomeKind::Error => "ERROR",
        };
        write!(f, "{}", label)
    }
}

/// Batch-level verdict, derived from the recorded outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    AllOk,
    PartialFailure,
    AllFailed,
}

impl Disposition {
    /// Process exit status for this disposition. Pre-flight aborts use
    /// [`EXIT_ABORTED`] instead, since no report exists yet.
    pub fn exit_code(self) -> i32 {
        match self {
            Disposition::AllOk => 0,
            Disposition::AllFailed => 1,
            Disposition::PartialFailure => 2,
        }
    }
}

/// Exit status for a run aborted before any target was processed.
pub const EXIT_ABORTED: i32 = 3;

/// Causes longer than this are cut short in the rendered summary. The full
/// cause stays queryable through [`Report::entries`].
const RENDERED_CAUSE_LIMIT: usize = 200;

/// The full set of outcomes for one run, in target-set order.
#[derive(Debug)]
pub struct Report {
    entries: Vec<(Target, Outcome)>,
}

impl Report {
    pub fn entries(&self) -> &[(Target, Outcome)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, kind: OutcomeKind) -> usize {
        self.entries
            .iter()
            .filter(|(_, o)| o.kind() == kind)
            .count()
    }

    /// `AllOk` iff no error outcome exists; `AllFailed` iff no success or
    /// skipped outcome exists; `PartialFailure` otherwise.
    pub fn disposition(&self) -> Disposition {
        if self.count(OutcomeKind::Error) == 0 {
            Disposition::AllOk
        } else if self.count(OutcomeKind::Success) == 0 && self.count(OutcomeKind::Skipped) == 0 {
            Disposition::AllFailed
        } else {
            Disposition::PartialFailure
        }
    }

    /// One line per target in target-set order, then a one-line summary of
    /// counts per outcome kind.
    pub fn render(&self, out: &mut dyn Write) -> io::Result<()> {
        for (target, outcome) in &self.entries {
            match outcome.cause() {
                Some(cause) => writeln!(
                    out,
                    "{:5} {}: {} ({})",
                    outcome.kind().to_string(),
                    target,
                    outcome.message(),
                    truncate(cause, RENDERED_CAUSE_LIMIT)
                )?,
                None => writeln!(
                    out,
                    "{:5} {}: {}",
                    outcome.kind().to_string(),
                    target,
                    outcome.message()
                )?,
            }
        }
        writeln!(
            out,
            "{} target(s): {} ok, {} skipped, {} warning(s), {} error(s)",
            self.len(),
            self.count(OutcomeKind::Success),
            self.count(OutcomeKind::Skipped),
            self.count(OutcomeKind::Warning),
            self.count(OutcomeKind::Error)
        )
    }
}

/// Thread-safe, write-once-per-target ledger populated by the worker pool.
///
/// Targets are registered by the submitting thread in target-set order;
/// workers record outcomes in whatever order they complete. [`Reporter::finalize`]
/// renders the registration order back out, so reporting stays deterministic
/// even though execution is not.
#[derive(Default)]
pub struct Reporter {
    slots: Mutex<Slots>,
}

#[derive(Default)]
struct Slots {
    order: Vec<Target>,
    registered: HashSet<u64>,
    outcomes: HashMap<u64, Outcome>,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a slot for a target. Called once per target, in set order,
    /// by the thread driving the batch.
    pub fn register(&self, target: &Target) {
        let mut slots = self.slots.lock().unwrap();
        if !slots.registered.insert(target.id) {
            panic!("target {} registered twice", target);
        }
        slots.order.push(target.clone());
    }

    /// Record the terminal outcome for a target. Safe to call from any
    /// worker. A second record for the same target indicates broken task
    /// isolation and panics.
    pub fn record(&self, target: &Target, outcome: Outcome) {
        let mut slots = self.slots.lock().unwrap();
        if !slots.registered.contains(&target.id) {
            panic!("outcome recorded for unregistered target {}", target);
        }
        if slots.outcomes.insert(target.id, outcome).is_some() {
            panic!("outcome recorded twice for target {}", target);
        }
    }

    /// Number of outcomes recorded so far.
    pub fn completed(&self) -> usize {
        self.slots.lock().unwrap().outcomes.len()
    }

    /// Consume the ledger into an ordered report. Every registered target
    /// must have received an outcome by now.
    pub fn finalize(self) -> Report {
        let Slots {
            order,
            mut outcomes,
            ..
        } = self.slots.into_inner().unwrap();
        let entries = order
            .into_iter()
            .map(|target| {
                let outcome = outcomes
                    .remove(&target.id)
                    .unwrap_or_else(|| panic!("no outcome recorded for target {}", target));
                (target, outcome)
            })
            .collect();
        Report { entries }
    }
}

fn truncate(s: &str, limit: usize) -> String {
    if s.chars().count() <= limit {
        s.to_string()
    } else {
        let mut cut: String = s.chars().take(limit).collect();
        cut.push('…');
        cut
    }
}
