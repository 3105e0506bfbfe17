//! Type mapping and the per-reader arena of cache sets.

use super::binding::EntityShape;
use super::set::{CacheSet, EmptyCacheSet, ErasedCacheSet};
use crate::schema::Definition;
use crate::types::DefinitionId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

type SetFactory = fn(Arc<Definition>) -> Box<dyn ErasedCacheSet>;

fn new_set<T: EntityShape>(definition: Arc<Definition>) -> Box<dyn ErasedCacheSet> {
    Box::new(CacheSet::<T>::new(definition))
}

/// Maps entity definition names to native record types.
#[derive(Default, Clone)]
pub struct TypeMap {
    factories: HashMap<String, SetFactory>,
}

impl TypeMap {
    /// Creates an empty type map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Materializes the entity definition named `definition_name` as `T`.
    pub fn register<T: EntityShape>(&mut self, definition_name: impl Into<String>) -> &mut Self {
        self.factories
            .insert(definition_name.into(), new_set::<T> as SetFactory);
        self
    }

    /// Returns true if a native type is registered for the name.
    #[must_use]
    pub fn contains(&self, definition_name: &str) -> bool {
        self.factories.contains_key(definition_name)
    }

    /// Returns the number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Returns true if no types are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for TypeMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.factories.keys()).finish()
    }
}

/// Arena of cache sets, one per referenced definition.
///
/// Sets are created on first reference. A definition with no registered
/// native type gets a permanent empty set, so later references resolve
/// without consulting the type map again.
pub struct CacheRegistry {
    types: TypeMap,
    sets: Vec<Box<dyn ErasedCacheSet>>,
    index: HashMap<DefinitionId, usize>,
}

impl CacheRegistry {
    /// Creates a registry over a type map.
    #[must_use]
    pub fn new(types: TypeMap) -> Self {
        Self {
            types,
            sets: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Returns the set for a definition, creating it on first reference.
    pub(crate) fn resolve(&mut self, definition: &Arc<Definition>) -> &mut dyn ErasedCacheSet {
        let slot = match self.index.get(&definition.id) {
            Some(&slot) => slot,
            None => {
                let set: Box<dyn ErasedCacheSet> = match self.types.factories.get(&definition.name) {
                    Some(factory) if definition.is_entity() => factory(Arc::clone(definition)),
                    _ => {
                        debug!(definition = %definition, "no native type; caching empty set");
                        Box::new(EmptyCacheSet::new(definition.id))
                    }
                };
                self.sets.push(set);
                let slot = self.sets.len() - 1;
                self.index.insert(definition.id, slot);
                slot
            }
        };
        &mut *self.sets[slot]
    }

    /// Returns the typed set of a definition.
    ///
    /// Returns `None` if the definition has not been referenced yet, has no
    /// native type, or is materialized as a different type.
    #[must_use]
    pub fn cache_set<T: EntityShape>(&self, definition: DefinitionId) -> Option<&CacheSet<T>> {
        let slot = *self.index.get(&definition)?;
        self.sets[slot].as_any().downcast_ref::<CacheSet<T>>()
    }

    /// Returns true if the definition has been referenced and has no
    /// native type.
    #[must_use]
    pub fn is_unresolved(&self, definition: DefinitionId) -> bool {
        self.index
            .get(&definition)
            .is_some_and(|&slot| !self.sets[slot].is_resolved())
    }

    /// Returns the number of sets created so far, empty ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// Returns true if no set has been created.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Returns the total number of live records across all sets.
    #[must_use]
    pub fn live_records(&self) -> usize {
        self.sets.iter().map(|s| s.live_len()).sum()
    }
}

impl fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheRegistry")
            .field("types", &self.types)
            .field(
                "sets",
                &self.sets.iter().map(|s| s.definition_id()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
