//! # Curate Architecture
//!
//! Curate is a **UI-agnostic batch-maintenance library**. The `curate`
//! binary is just one client: the library itself never prints, never exits
//! the process, and never assumes a terminal.
//!
//! Every maintenance command over a curated catalog has the same shape:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI layer (args.rs, wired by main.rs)                      │
//! │  - Parses arguments, colors output, maps exit codes         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Runner (runner.rs)                                         │
//! │  - Confirmation gate → target resolution → batch execution  │
//! │  - One generic pipeline; commands supply a closure + config │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Core (resolve, history, retry, batch, outcome, confirm)    │
//! │  - Fault-isolated worker pool, write-once outcome ledger    │
//! │  - Deterministic report driving the exit status             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Collaborators (registry/, history traits)                  │
//! │  - EntityRegistry + EventHistory, injected, never ambient   │
//! │  - FileRegistry (production), InMemoryRegistry (testing)    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - Every resolved target receives exactly one terminal outcome, even when
//!   its unit of work fails, panics, or is skipped by the idempotency gate.
//! - One target's failure never aborts the batch or another target.
//! - Reports render in target-set order no matter the completion order.
//! - Resolution and confirmation failures abort before any side effects.
//!
//! ## Module overview
//!
//! - [`runner`]: the composed batch pipeline — entry point for commands
//! - [`resolve`]: identifiers / "all" / taxon filter → [`model::TargetSet`]
//! - [`batch`]: bounded worker pool with fault isolation and cancellation
//! - [`outcome`]: outcomes, the run ledger, report and disposition
//! - [`retry`]: bounded retries with exponential backoff
//! - [`history`]: audit events and the skip-if-already-done gate
//! - [`confirm`]: batch-level confirmation for destructive runs
//! - [`registry`]: entity lookup trait and its implementations
//! - [`model`]: [`model::Target`] and [`model::TargetSet`]
//! - [`error`]: error types

pub mod batch;
pub mod confirm;
pub mod error;
pub mod history;
pub mod model;
pub mod outcome;
pub mod registry;
pub mod resolve;
pub mod retry;
pub mod runner;
