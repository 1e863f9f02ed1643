use super::EntityRegistry;
use crate::error::{CurateError, Result};
use crate::history::EventHistory;
use crate::model::Target;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// One entity in the catalog file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntity {
    pub id: u64,
    pub short_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taxon: Option<String>,
    /// Last relevant data change.
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub events: Vec<CatalogEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEvent {
    pub kind: String,
    pub at: DateTime<Utc>,
}

impl CatalogEntity {
    fn to_target(&self) -> Target {
        let mut target = Target::new(self.id, self.short_name.clone());
        if let Some(q) = &self.qualifier {
            target = target.with_qualifier(q.clone());
        }
        target
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Catalog {
    entities: Vec<CatalogEntity>,
}

/// JSON-file-backed registry. Doubles as the audit-event history so that
/// commands which record completion events and the idempotency gate read
/// the same store.
///
/// Safe for concurrent use from the worker pool: the catalog is held behind
/// a mutex and flushed to disk under the lock on every mutation.
pub struct FileRegistry {
    path: PathBuf,
    catalog: Mutex<Catalog>,
}

impl FileRegistry {
    /// Open an existing catalog file, or start an empty catalog if the file
    /// does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let catalog = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            Catalog::default()
        };
        Ok(Self {
            path: path.clone(),
            catalog: Mutex::new(catalog),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.catalog.lock().unwrap().entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the catalog contents, in id order.
    pub fn entities(&self) -> Vec<CatalogEntity> {
        self.catalog.lock().unwrap().entities.clone()
    }

    /// Add or replace an entity, keyed by id.
    pub fn upsert(&self, entity: CatalogEntity) -> Result<()> {
        let mut catalog = self.catalog.lock().unwrap();
        catalog.entities.retain(|e| e.id != entity.id);
        catalog.entities.push(entity);
        catalog.entities.sort_by_key(|e| e.id);
        self.flush(&catalog)
    }

    /// Permanently remove an entity from the catalog.
    pub fn remove(&self, id: u64) -> Result<()> {
        let mut catalog = self.catalog.lock().unwrap();
        let before = catalog.entities.len();
        catalog.entities.retain(|e| e.id != id);
        if catalog.entities.len() == before {
            return Err(CurateError::Registry(format!(
                "no entity with id {} in {}",
                id,
                self.path.display()
            )));
        }
        self.flush(&catalog)
    }

    /// Record a completion event for an entity.
    pub fn record_event(&self, id: u64, kind: &str, at: DateTime<Utc>) -> Result<()> {
        let mut catalog = self.catalog.lock().unwrap();
        let entity = catalog
            .entities
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| {
                CurateError::Registry(format!("no entity with id {} in catalog", id))
            })?;
        entity.events.push(CatalogEvent {
            kind: kind.to_string(),
            at,
        });
        self.flush(&catalog)
    }

    /// Basic consistency check on one entity, used by the sweep command.
    pub fn validate(&self, id: u64) -> Result<()> {
        let catalog = self.catalog.lock().unwrap();
        let entity = catalog
            .entities
            .iter()
            .find(|e| e.id == id)
            .ok_or_else(|| {
                CurateError::Registry(format!("no entity with id {} in catalog", id))
            })?;
        if entity.short_name.trim().is_empty() {
            return Err(CurateError::Registry(format!(
                "entity {} has a blank short name",
                id
            )));
        }
        Ok(())
    }

    fn flush(&self, catalog: &Catalog) -> Result<()> {
        let content = serde_json::to_string_pretty(catalog)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

impl EntityRegistry for FileRegistry {
    fn find_by_identifier(&self, identifier: &str) -> Result<Option<Target>> {
        let by_id = identifier.parse::<u64>().ok();
        let catalog = self.catalog.lock().unwrap();
        Ok(catalog
            .entities
            .iter()
            .find(|e| e.short_name == identifier || Some(e.id) == by_id)
            .map(CatalogEntity::to_target))
    }

    fn find_all(&self) -> Result<Vec<Target>> {
        let catalog = self.catalog.lock().unwrap();
        Ok(catalog.entities.iter().map(CatalogEntity::to_target).collect())
    }

    fn find_by_taxon(&self, taxon: &str) -> Result<Vec<Target>> {
        let catalog = self.catalog.lock().unwrap();
        Ok(catalog
            .entities
            .iter()
            .filter(|e| e.taxon.as_deref() == Some(taxon))
            .map(CatalogEntity::to_target)
            .collect())
    }

    fn fetch_page(&self, offset: usize, limit: usize) -> Result<Vec<Target>> {
        let catalog = self.catalog.lock().unwrap();
        Ok(catalog
            .entities
            .iter()
            .skip(offset)
            .take(limit)
            .map(CatalogEntity::to_target)
            .collect())
    }
}

impl EventHistory for FileRegistry {
    fn most_recent_event(&self, target: &Target, kind: &str) -> Result<Option<DateTime<Utc>>> {
        let catalog = self.catalog.lock().unwrap();
        Ok(catalog
            .entities
            .iter()
            .find(|e| e.id == target.id)
            .and_then(|e| {
                e.events
                    .iter()
                    .filter(|ev| ev.kind == kind)
                    .map(|ev| ev.at)
                    .max()
            }))
    }

    fn last_data_change(&self, target: &Target) -> Result<DateTime<Utc>> {
        let catalog = self.catalog.lock().unwrap();
        catalog
            .entities
            .iter()
            .find(|e| e.id == target.id)
            .map(|e| e.last_updated)
            .ok_or_else(|| {
                CurateError::History(format!("no entity with id {} in catalog", target.id))
            })
    }
}
