//! Target resolution: user-supplied identifiers, "all", or a taxon filter
//! become a concrete [`TargetSet`].
//!
//! Resolution is fail-fast: an identifier that matches nothing aborts the
//! whole run with a not-found error naming the offending identifier, before
//! any target is processed.

use crate::error::{CurateError, Result};
use crate::model::{Target, TargetSet};
use crate::registry::EntityRegistry;
use std::sync::Arc;
use tracing::info;

/// Which entities an invocation operates on.
#[derive(Debug, Clone)]
pub enum TargetSpec {
    /// Explicit identifiers (short names or numeric ids), in user order.
    Identifiers(Vec<String>),
    /// Every entity in the registry.
    All,
    /// Every entity belonging to the given taxon.
    Taxon(String),
}

/// How "all" resolution materializes the collection. Lazy mode pages the
/// registry incrementally so very large catalogs are not loaded before the
/// confirmation gate has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionMode {
    Eager,
    Lazy,
}

/// Resolve a spec into an ordered, deduplicated target set.
pub fn resolve(
    registry: &Arc<dyn EntityRegistry>,
    spec: &TargetSpec,
    mode: ResolutionMode,
) -> Result<TargetSet> {
    match spec {
        TargetSpec::Identifiers(identifiers) => {
            let mut targets = Vec::with_capacity(identifiers.len());
            for identifier in identifiers {
                let target = registry
                    .find_by_identifier(identifier)?
                    .ok_or_else(|| CurateError::NotFound(identifier.clone()))?;
                targets.push(target);
            }
            Ok(TargetSet::from_targets(targets))
        }
        TargetSpec::All => match mode {
            ResolutionMode::Eager => {
                info!("loading all entities, this may take a while");
                Ok(TargetSet::from_targets(registry.find_all()?))
            }
            ResolutionMode::Lazy => Ok(TargetSet::all_of(Arc::clone(registry))),
        },
        TargetSpec::Taxon(taxon) => {
            let targets = registry.find_by_taxon(taxon)?;
            info!("{} entities matched taxon '{}'", targets.len(), taxon);
            Ok(TargetSet::from_targets(targets))
        }
    }
}

/// Resolve a spec that must name exactly one target, for operations that are
/// inherently not batchable.
pub fn resolve_single(registry: &Arc<dyn EntityRegistry>, spec: &TargetSpec) -> Result<Target> {
    let set = resolve(registry, spec, ResolutionMode::Eager)?;
    let mut iter = set.iter();
    let first = iter.next().transpose()?;
    let rest = iter.count();
    match (first, rest) {
        (Some(target), 0) => Ok(target),
        (None, _) => Err(CurateError::ExpectedSingleTarget { found: 0 }),
        (Some(_), n) => Err(CurateError::ExpectedSingleTarget { found: n + 1 }),
    }
}
