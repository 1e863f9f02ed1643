use super::EntityRegistry;
use crate::error::Result;
use crate::model::Target;
use std::collections::HashMap;

/// In-memory registry for tests. Entities are held in stable id order.
#[derive(Default)]
pub struct InMemoryRegistry {
    entities: Vec<Target>,
    taxa: HashMap<u64, String>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entities(entities: impl IntoIterator<Item = Target>) -> Self {
        let mut registry = Self::new();
        for entity in entities {
            registry.add(entity);
        }
        registry
    }

    pub fn add(&mut self, entity: Target) {
        self.entities.push(entity);
        self.entities.sort();
        self.entities.dedup();
    }

    pub fn add_with_taxon(&mut self, entity: Target, taxon: impl Into<String>) {
        self.taxa.insert(entity.id, taxon.into());
        self.add(entity);
    }
}

impl EntityRegistry for InMemoryRegistry {
    fn find_by_identifier(&self, identifier: &str) -> Result<Option<Target>> {
        let by_id = identifier.parse::<u64>().ok();
        Ok(self
            .entities
            .iter()
            .find(|e| e.short_name == identifier || Some(e.id) == by_id)
            .cloned())
    }

    fn find_all(&self) -> Result<Vec<Target>> {
        Ok(self.entities.clone())
    }

    fn find_by_taxon(&self, taxon: &str) -> Result<Vec<Target>> {
        Ok(self
            .entities
            .iter()
            .filter(|e| self.taxa.get(&e.id).map(String::as_str) == Some(taxon))
            .cloned()
            .collect())
    }

    fn fetch_page(&self, offset: usize, limit: usize) -> Result<Vec<Target>> {
        Ok(self
            .entities
            .iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }
}
