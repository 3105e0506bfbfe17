//! Live record stores, one per definition.

use super::binding::{DynRecord, EntityShape, RecordMeta};
use super::plan::FieldPlan;
use crate::error::CorruptionReason;
use crate::scanner::TransactionField;
use crate::schema::Definition;
use crate::types::{DefinitionId, EntityId};
use chainlog_codec::Timestamp;
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Materialized records of one entity definition.
///
/// Records are held as `Arc<T>` snapshots. An update builds a new record
/// and swaps it in, so a snapshot handed out earlier never changes.
#[derive(Debug)]
pub struct CacheSet<T: EntityShape> {
    live: BTreeMap<EntityId, Arc<T>>,
    archived: BTreeMap<EntityId, Arc<T>>,
    plan: FieldPlan<T>,
}

impl<T: EntityShape> CacheSet<T> {
    /// Creates an empty set for a definition.
    #[must_use]
    pub fn new(definition: Arc<Definition>) -> Self {
        Self {
            live: BTreeMap::new(),
            archived: BTreeMap::new(),
            plan: FieldPlan::new(definition),
        }
    }

    /// Returns the definition the set materializes.
    #[must_use]
    pub fn definition(&self) -> &Arc<Definition> {
        self.plan.definition()
    }

    /// Inserts a record, stamping its id and timestamps.
    pub fn add(&mut self, mut record: T, created_at: Timestamp, id: EntityId) -> Arc<T> {
        *record.meta_mut() = RecordMeta {
            id,
            created: created_at,
            edited: created_at,
        };
        let record = Arc::new(record);
        self.live.insert(id, Arc::clone(&record));
        record
    }

    /// Returns the live record with the given id.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<Arc<T>> {
        self.live.get(&id).cloned()
    }

    /// Returns the archived record with the given id.
    #[must_use]
    pub fn get_archived(&self, id: EntityId) -> Option<Arc<T>> {
        self.archived.get(&id).cloned()
    }

    /// Moves a live record to the archived set.
    pub fn remove(&mut self, id: EntityId) -> Option<Arc<T>> {
        let record = self.live.remove(&id)?;
        self.archived.insert(id, Arc::clone(&record));
        Some(record)
    }

    /// Returns the number of live records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Returns true if there are no live records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Returns the number of archived records.
    #[must_use]
    pub fn archived_len(&self) -> usize {
        self.archived.len()
    }

    /// Iterates live records in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<T>> {
        self.live.values()
    }

    /// Returns the field plan used to decode and encode records.
    pub fn plan_mut(&mut self) -> &mut FieldPlan<T> {
        &mut self.plan
    }

    fn apply_fields(
        &mut self,
        record: &mut T,
        fields: &[TransactionField],
    ) -> Result<(), CorruptionReason> {
        for field in fields.iter().filter(|f| !f.id().is_builtin()) {
            self.plan
                .decode_into(record, &field.descriptor, &field.wire)
                .map_err(|source| CorruptionReason::UndecodableValue {
                    field: field.id(),
                    source,
                })?;
        }
        Ok(())
    }
}

/// Object-safe view of a cache set, used by the applier.
pub(crate) trait ErasedCacheSet: Send + Sync {
    fn definition_id(&self) -> DefinitionId;

    /// False for the negative-cache placeholder.
    fn is_resolved(&self) -> bool;

    fn instantiate(
        &mut self,
        definition: &Arc<Definition>,
        id: EntityId,
        at: Timestamp,
        fields: &[TransactionField],
    ) -> Result<Option<Arc<dyn DynRecord>>, CorruptionReason>;

    /// Returns `Ok(None)` if no live record has the id.
    fn update(
        &mut self,
        definition: &Arc<Definition>,
        id: EntityId,
        at: Timestamp,
        fields: &[TransactionField],
    ) -> Result<Option<Arc<dyn DynRecord>>, CorruptionReason>;

    /// Returns `None` if no live record has the id.
    fn archive(&mut self, id: EntityId, at: Timestamp) -> Option<Arc<dyn DynRecord>>;

    fn live_len(&self) -> usize;

    fn as_any(&self) -> &dyn Any;
}

impl<T: EntityShape> ErasedCacheSet for CacheSet<T> {
    fn definition_id(&self) -> DefinitionId {
        self.definition().id
    }

    fn is_resolved(&self) -> bool {
        true
    }

    fn instantiate(
        &mut self,
        definition: &Arc<Definition>,
        id: EntityId,
        at: Timestamp,
        fields: &[TransactionField],
    ) -> Result<Option<Arc<dyn DynRecord>>, CorruptionReason> {
        self.plan.refresh(definition);
        let mut record = T::default();
        self.apply_fields(&mut record, fields)?;
        let record: Arc<dyn DynRecord> = self.add(record, at, id);
        Ok(Some(record))
    }

    fn update(
        &mut self,
        definition: &Arc<Definition>,
        id: EntityId,
        at: Timestamp,
        fields: &[TransactionField],
    ) -> Result<Option<Arc<dyn DynRecord>>, CorruptionReason> {
        let Some(current) = self.live.get(&id) else {
            return Ok(None);
        };
        let mut record = T::clone(current);
        self.plan.refresh(definition);
        self.apply_fields(&mut record, fields)?;
        record.meta_mut().edited = at;
        let record = Arc::new(record);
        self.live.insert(id, Arc::clone(&record));
        Ok(Some(record))
    }

    fn archive(&mut self, id: EntityId, at: Timestamp) -> Option<Arc<dyn DynRecord>> {
        let current = self.live.get(&id)?;
        let mut record = T::clone(current);
        record.meta_mut().edited = at;
        self.live.insert(id, Arc::new(record));
        self.remove(id).map(|r| r as Arc<dyn DynRecord>)
    }

    fn live_len(&self) -> usize {
        self.len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Placeholder for a definition with no registered native type.
#[derive(Debug)]
pub(crate) struct EmptyCacheSet {
    definition: DefinitionId,
}

impl EmptyCacheSet {
    pub(crate) fn new(definition: DefinitionId) -> Self {
        Self { definition }
    }
}

impl ErasedCacheSet for EmptyCacheSet {
    fn definition_id(&self) -> DefinitionId {
        self.definition
    }

    fn is_resolved(&self) -> bool {
        false
    }

    fn instantiate(
        &mut self,
        _definition: &Arc<Definition>,
        _id: EntityId,
        _at: Timestamp,
        _fields: &[TransactionField],
    ) -> Result<Option<Arc<dyn DynRecord>>, CorruptionReason> {
        Ok(None)
    }

    fn update(
        &mut self,
        _definition: &Arc<Definition>,
        _id: EntityId,
        _at: Timestamp,
        _fields: &[TransactionField],
    ) -> Result<Option<Arc<dyn DynRecord>>, CorruptionReason> {
        Ok(None)
    }

    fn archive(&mut self, _id: EntityId, _at: Timestamp) -> Option<Arc<dyn DynRecord>> {
        None
    }

    fn live_len(&self) -> usize {
        0
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
