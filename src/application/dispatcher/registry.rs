// Explicit registries that replace runtime type inspection during dispatch.
//
// Purpose
// - EventTypeHierarchy: which event type specializes which (child -> parent).
// - DenormalizerRegistry: which denormalizers declared interest in which event type.
//
// Responsibilities
// - Resolve, for a concrete event type, every interested denormalizer: those registered for the
//   exact type first, then those of each ancestor in turn.
// - Keep registration order within one type and ignore a repeated registration.

use crate::application::dispatcher::denormalizer::Denormalize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct EventTypeHierarchy {
    parents: HashMap<String, String>,
}

impl EventTypeHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parent(mut self, event_type: impl Into<String>, parent: impl Into<String>) -> Self {
        self.parents.insert(event_type.into(), parent.into());
        self
    }

    pub fn parent_of(&self, event_type: &str) -> Option<&str> {
        self.parents.get(event_type).map(String::as_str)
    }

    /// `event_type` followed by its ancestors, nearest first. Stops at the root or at the first
    /// type already visited.
    pub fn lineage<'a>(&'a self, event_type: &'a str) -> Vec<&'a str> {
        let mut visited = HashSet::new();
        let mut lineage = Vec::new();
        let mut current = Some(event_type);
        while let Some(event_type) = current {
            if !visited.insert(event_type) {
                break;
            }
            lineage.push(event_type);
            current = self.parent_of(event_type);
        }
        lineage
    }
}

pub struct DenormalizerRegistry<E, U> {
    hierarchy: EventTypeHierarchy,
    denormalizers: HashMap<String, Vec<Arc<dyn Denormalize<E, U>>>>,
}

impl<E, U> DenormalizerRegistry<E, U> {
    pub fn new(hierarchy: EventTypeHierarchy) -> Self {
        Self {
            hierarchy,
            denormalizers: HashMap::new(),
        }
    }

    pub fn hierarchy(&self) -> &EventTypeHierarchy {
        &self.hierarchy
    }

    /// Registers `denormalizer` for `event_type` and, through the hierarchy, all its descendants.
    pub fn register(
        &mut self,
        event_type: impl Into<String>,
        denormalizer: Arc<dyn Denormalize<E, U>>,
    ) -> &mut Self {
        let registered = self.denormalizers.entry(event_type.into()).or_default();
        if !registered.iter().any(|d| Arc::ptr_eq(d, &denormalizer)) {
            registered.push(denormalizer);
        }
        self
    }

    /// Denormalizers for the exact type first, then for each ancestor. An instance registered
    /// for several types of the lineage appears once, under the nearest type.
    pub fn denormalizers_for(&self, event_type: &str) -> Vec<(String, Arc<dyn Denormalize<E, U>>)> {
        let mut resolved: Vec<(String, Arc<dyn Denormalize<E, U>>)> = Vec::new();
        for declared_type in self.hierarchy.lineage(event_type) {
            let Some(registered) = self.denormalizers.get(declared_type) else {
                continue;
            };
            for denormalizer in registered {
                if resolved.iter().any(|(_, d)| Arc::ptr_eq(d, denormalizer)) {
                    continue;
                }
                resolved.push((declared_type.to_string(), denormalizer.clone()));
            }
        }
        resolved
    }

    pub fn is_empty(&self) -> bool {
        self.denormalizers.values().all(Vec::is_empty)
    }
}
