//! Core data types: [`Target`] and [`TargetSet`].
//!
//! A `Target` is an opaque handle to one catalog entity selected for a batch
//! operation. Identity is by `id` so that equality and ordering stay stable
//! for the duration of a run, and reports can be rendered deterministically.
//!
//! A `TargetSet` is an ordered, deduplicated sequence of targets. It is
//! either eager (a materialized list) or lazy (a restartable, page-fetching
//! sequence over the registry). Lazy sets exist so that "all entities" runs
//! do not load the whole catalog before the confirmation gate has even run.

use crate::error::Result;
use crate::registry::EntityRegistry;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// One catalog entity selected for a batch operation.
#[derive(Debug, Clone)]
pub struct Target {
    pub id: u64,
    pub short_name: String,
    /// Secondary key, e.g. a data-type qualifier for entities that carry
    /// more than one kind of data.
    pub qualifier: Option<String>,
}

impl Target {
    pub fn new(id: u64, short_name: impl Into<String>) -> Self {
        Self {
            id,
            short_name: short_name.into(),
            qualifier: None,
        }
    }

    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }
}

impl PartialEq for Target {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Target {}

impl std::hash::Hash for Target {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for Target {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Target {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(q) => write!(f, "{} [{}]", self.short_name, q),
            None => write!(f, "{}", self.short_name),
        }
    }
}

/// Number of targets fetched per registry round-trip in lazy mode.
const LAZY_PAGE_SIZE: usize = 64;

/// An ordered, deduplicated set of targets, built once per invocation.
pub enum TargetSet {
    Eager(Vec<Target>),
    Lazy(LazyTargets),
}

impl fmt::Debug for TargetSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetSet::Eager(targets) => f.debug_tuple("Eager").field(targets).finish(),
            TargetSet::Lazy(lazy) => f
                .debug_struct("Lazy")
                .field("page_size", &lazy.page_size)
                .finish_non_exhaustive(),
        }
    }
}

impl TargetSet {
    /// Materialize a set from an iterator, deduplicating by id and
    /// preserving first-seen order.
    pub fn from_targets(targets: impl IntoIterator<Item = Target>) -> Self {
        let mut seen = HashSet::new();
        let deduped = targets
            .into_iter()
            .filter(|t| seen.insert(t.id))
            .collect();
        TargetSet::Eager(deduped)
    }

    /// A lazy set over the whole registry. Restartable: every call to
    /// [`TargetSet::iter`] pages from the start again.
    pub fn all_of(registry: Arc<dyn EntityRegistry>) -> Self {
        TargetSet::Lazy(LazyTargets {
            registry,
            page_size: LAZY_PAGE_SIZE,
        })
    }

    /// Known size, if the set is materialized.
    pub fn len(&self) -> Option<usize> {
        match self {
            TargetSet::Eager(targets) => Some(targets.len()),
            TargetSet::Lazy(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    pub fn iter(&self) -> TargetIter<'_> {
        match self {
            TargetSet::Eager(targets) => TargetIter::Eager(targets.iter()),
            TargetSet::Lazy(lazy) => TargetIter::Lazy {
                registry: &*lazy.registry,
                page_size: lazy.page_size,
                page: Vec::new(),
                offset: 0,
                seen: HashSet::new(),
                exhausted: false,
            },
        }
    }
}

/// Restartable page-fetching source for "all entities" runs.
pub struct LazyTargets {
    registry: Arc<dyn EntityRegistry>,
    page_size: usize,
}

pub enum TargetIter<'a> {
    Eager(std::slice::Iter<'a, Target>),
    Lazy {
        registry: &'a dyn EntityRegistry,
        page_size: usize,
        page: Vec<Target>,
        offset: usize,
        seen: HashSet<u64>,
        exhausted: bool,
    },
}

impl Iterator for TargetIter<'_> {
    type Item = Result<Target>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            TargetIter::Eager(iter) => iter.next().cloned().map(Ok),
            TargetIter::Lazy {
                registry,
                page_size,
                page,
                offset,
                seen,
                exhausted,
            } => loop {
                if let Some(target) = page.pop() {
                    if seen.insert(target.id) {
                        return Some(Ok(target));
                    }
                    continue;
                }
                if *exhausted {
                    return None;
                }
                match registry.fetch_page(*offset, *page_size) {
                    Ok(fetched) => {
                        if fetched.len() < *page_size {
                            *exhausted = true;
                        }
                        *offset += fetched.len();
                        // pop() consumes from the back; keep page order
                        page.extend(fetched.into_iter().rev());
                        if page.is_empty() && *exhausted {
                            return None;
                        }
                    }
                    Err(e) => {
                        *exhausted = true;
                        return Some(Err(e));
                    }
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::memory::InMemoryRegistry;

    #[test]
    fn eager_set_dedups_by_id_preserving_order() {
        let set = TargetSet::from_targets(vec![
            Target::new(1, "GSE1"),
            Target::new(2, "GSE2"),
            Target::new(1, "GSE1"),
            Target::new(3, "GSE3"),
        ]);
        let ids: Vec<u64> = set.iter().map(|t| t.unwrap().id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(set.len(), Some(3));
    }

    #[test]
    fn target_identity_is_by_id() {
        let a = Target::new(7, "GSE7");
        let b = Target::new(7, "renamed");
        assert_eq!(a, b);
    }

    #[test]
    fn lazy_set_pages_through_the_registry() {
        let registry = InMemoryRegistry::with_entities(
            (1..=150).map(|i| Target::new(i, format!("GSE{}", i))),
        );
        let set = TargetSet::all_of(Arc::new(registry));
        assert_eq!(set.len(), None);

        let ids: Vec<u64> = set.iter().map(|t| t.unwrap().id).collect();
        assert_eq!(ids.len(), 150);
        assert_eq!(ids[0], 1);
        assert_eq!(ids[149], 150);
    }

    #[test]
    fn lazy_set_is_restartable() {
        let registry = InMemoryRegistry::with_entities(
            (1..=10).map(|i| Target::new(i, format!("GSE{}", i))),
        );
        let set = TargetSet::all_of(Arc::new(registry));
        let first: Vec<u64> = set.iter().map(|t| t.unwrap().id).collect();
        let second: Vec<u64> = set.iter().map(|t| t.unwrap().id).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn display_includes_qualifier() {
        let t = Target::new(1, "GSE1").with_qualifier("counts");
        assert_eq!(t.to_string(), "GSE1 [counts]");
    }
}
