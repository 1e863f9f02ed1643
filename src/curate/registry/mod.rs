//! # Entity lookup
//!
//! The [`EntityRegistry`] trait is the narrow interface through which the
//! core resolves identifiers into [`Target`]s. It is abstracted behind a
//! trait to:
//! - Enable **testing** with [`memory::InMemoryRegistry`] (no catalog file
//!   or database needed)
//! - Keep resolution logic **decoupled** from where entities actually live
//!
//! ## Implementations
//!
//! - [`fs::FileRegistry`]: JSON catalog file, also keeps the audit-event
//!   history used by the idempotency gate
//! - [`memory::InMemoryRegistry`]: in-memory lookup for tests
//!
//! Implementations must be safe for concurrent use at the configured worker
//! pool size; the core bounds concurrency but does not serialize access.

use crate::error::Result;
use crate::model::Target;

pub mod fs;
pub mod memory;

/// Abstract interface for locating catalog entities.
pub trait EntityRegistry: Send + Sync {
    /// Look up a single entity by identifier (short name or numeric id).
    /// Returns `Ok(None)` when nothing matches.
    fn find_by_identifier(&self, identifier: &str) -> Result<Option<Target>>;

    /// Load the whole collection at once.
    fn find_all(&self) -> Result<Vec<Target>>;

    /// All entities belonging to the given taxon.
    fn find_by_taxon(&self, taxon: &str) -> Result<Vec<Target>>;

    /// Fetch one page of the collection, in stable id order. Used by lazy
    /// "all" resolution to avoid materializing large catalogs.
    fn fetch_page(&self, offset: usize, limit: usize) -> Result<Vec<Target>>;
}
