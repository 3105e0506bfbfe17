//! Field write path.
//!
//! [`TransactionEncoder`] turns native records into transaction frames the
//! scanner accepts; [`ChainWriter`] appends them to a shared log with
//! strictly increasing timestamps.

use crate::cache::{EntityShape, FieldPlan};
use crate::error::{CoreError, CoreResult};
use crate::schema::{Definition, SchemaRegistry};
use crate::types::{DefinitionId, EntityId, FieldId};
use bytes::Bytes;
use chainlog_codec::{FieldCodec, FieldValue, FrameBuilder, Timestamp};
use chainlog_storage::StorageBackend;
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Encodes transactions for native records.
///
/// Keeps one [`FieldPlan`] per definition so that bindings are resolved
/// once per field descriptor.
pub struct TransactionEncoder {
    registry: Arc<dyn SchemaRegistry>,
    plans: HashMap<DefinitionId, Box<dyn Any + Send + Sync>>,
}

impl fmt::Debug for TransactionEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionEncoder")
            .field("plans", &self.plans.len())
            .finish_non_exhaustive()
    }
}

impl TransactionEncoder {
    /// Creates an encoder over a schema registry.
    pub fn new(registry: Arc<dyn SchemaRegistry>) -> Self {
        Self {
            registry,
            plans: HashMap::new(),
        }
    }

    fn entity_definition(&self, id: DefinitionId) -> CoreResult<Arc<Definition>> {
        self.registry
            .resolve_definition(id)
            .filter(|d| d.is_entity())
            .ok_or_else(|| CoreError::invalid_operation(format!("{id} is not an entity type")))
    }

    fn plan<T: EntityShape>(
        &mut self,
        definition: &Arc<Definition>,
    ) -> CoreResult<&mut FieldPlan<T>> {
        let slot = self
            .plans
            .entry(definition.id)
            .or_insert_with(|| Box::new(FieldPlan::<T>::new(Arc::clone(definition))));
        if !slot.is::<FieldPlan<T>>() {
            *slot = Box::new(FieldPlan::<T>::new(Arc::clone(definition)));
        }
        let plan = slot
            .downcast_mut::<FieldPlan<T>>()
            .ok_or_else(|| CoreError::invalid_operation("field plan type mismatch"))?;
        plan.refresh(definition);
        Ok(plan)
    }

    /// Encodes an instantiate transaction carrying every bound,
    /// instanceable field of `record`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`] if `definition` is not an
    /// entity type, or a codec error if a native value does not encode.
    pub fn instantiate<T: EntityShape>(
        &mut self,
        definition: DefinitionId,
        record: &T,
        timestamp: Timestamp,
    ) -> CoreResult<Bytes> {
        let definition = self.entity_definition(definition)?;
        let registry = Arc::clone(&self.registry);
        let plan = self.plan::<T>(&definition)?;

        let mut frame = FrameBuilder::new(definition.id.as_u64());
        push_timestamp(&mut frame, timestamp)?;
        for &id in &definition.fields {
            let Some(descriptor) = registry.resolve_field(id) else {
                continue;
            };
            if !descriptor.instanceable || id.is_builtin() {
                continue;
            }
            if let Some(wire) = plan.encode_from(record, &descriptor)? {
                frame.push(id.as_u64(), &wire);
            }
        }
        Ok(frame.finish())
    }

    /// Encodes a set-fields transaction for the named fields of `record`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`] if `definition` is not an
    /// entity type or a name does not match a bound field of it.
    pub fn set_fields<T: EntityShape>(
        &mut self,
        entity: EntityId,
        definition: DefinitionId,
        timestamp: Timestamp,
        record: &T,
        fields: &[&str],
    ) -> CoreResult<Bytes> {
        let definition = self.entity_definition(definition)?;
        let registry = Arc::clone(&self.registry);
        let plan = self.plan::<T>(&definition)?;

        let mut frame = header(DefinitionId::SET_FIELDS, entity, definition.id, timestamp)?;
        for &name in fields {
            let descriptor = definition
                .fields
                .iter()
                .filter_map(|&id| registry.resolve_field(id))
                .find(|d| d.name == name)
                .ok_or_else(|| {
                    CoreError::invalid_operation(format!("{definition} has no field {name}"))
                })?;
            let wire = plan.encode_from(record, &descriptor)?.ok_or_else(|| {
                CoreError::invalid_operation(format!("field {name} has no native binding"))
            })?;
            frame.push(descriptor.id.as_u64(), &wire);
        }
        Ok(frame.finish())
    }

    /// Encodes an archive transaction.
    ///
    /// # Errors
    ///
    /// Returns a codec error if the timestamp cannot be encoded.
    pub fn archive(
        &self,
        entity: EntityId,
        definition: DefinitionId,
        timestamp: Timestamp,
    ) -> CoreResult<Bytes> {
        Ok(header(DefinitionId::ARCHIVE, entity, definition, timestamp)?.finish())
    }

    /// Encodes an empty block boundary transaction.
    #[must_use]
    pub fn boundary(&self) -> Bytes {
        FrameBuilder::new(DefinitionId::BLOCK_BOUNDARY.as_u64()).finish()
    }
}

fn push_timestamp(frame: &mut FrameBuilder, timestamp: Timestamp) -> CoreResult<()> {
    frame.field(
        FieldId::TIMESTAMP.as_u64(),
        FieldCodec::Timestamp,
        &FieldValue::Timestamp(timestamp),
    )?;
    Ok(())
}

fn header(
    control: DefinitionId,
    entity: EntityId,
    target: DefinitionId,
    timestamp: Timestamp,
) -> CoreResult<FrameBuilder> {
    let mut frame = FrameBuilder::new(control.as_u64());
    frame
        .inline(FieldId::ENTITY.as_u64(), entity.as_u64())
        .inline(FieldId::DEFINITION.as_u64(), target.as_u64());
    push_timestamp(&mut frame, timestamp)?;
    Ok(frame)
}

/// Appends transactions to a shared log.
///
/// Every transaction gets a timestamp strictly greater than the previous
/// one, so entity ids never collide.
pub struct ChainWriter<B: StorageBackend> {
    log: Arc<RwLock<B>>,
    encoder: TransactionEncoder,
    last: Option<Timestamp>,
}

impl<B: StorageBackend> fmt::Debug for ChainWriter<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainWriter")
            .field("encoder", &self.encoder)
            .field("last", &self.last)
            .finish_non_exhaustive()
    }
}

impl<B: StorageBackend> ChainWriter<B> {
    /// Creates a writer appending to `log`.
    pub fn new(log: Arc<RwLock<B>>, registry: Arc<dyn SchemaRegistry>) -> Self {
        Self {
            log,
            encoder: TransactionEncoder::new(registry),
            last: None,
        }
    }

    /// Makes every later timestamp strictly greater than `floor`.
    ///
    /// Use when appending to a log that already holds transactions.
    #[must_use]
    pub fn after(mut self, floor: Timestamp) -> Self {
        self.last = Some(floor);
        self
    }

    /// Returns the shared log.
    #[must_use]
    pub fn log(&self) -> &Arc<RwLock<B>> {
        &self.log
    }

    /// Returns the timestamp of the last transaction written.
    #[must_use]
    pub fn last_timestamp(&self) -> Option<Timestamp> {
        self.last
    }

    /// Returns the next timestamp: the clock, or one tick past the last
    /// timestamp if the clock has not moved past it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`] once the last timestamp is
    /// the largest representable tick.
    pub fn next_timestamp(&mut self) -> CoreResult<Timestamp> {
        let now = Timestamp::now();
        let next = match self.last {
            Some(last) if now <= last => last
                .ticks()
                .checked_add(1)
                .map(Timestamp::from_ticks)
                .ok_or_else(|| CoreError::invalid_operation("writer timestamps exhausted"))?,
            _ => now,
        };
        self.last = Some(next);
        Ok(next)
    }

    fn append(&mut self, frame: &[u8]) -> CoreResult<u64> {
        let offset = self.log.write().append(frame)?;
        trace!(offset, len = frame.len(), "appended transaction");
        Ok(offset)
    }

    /// Appends an instantiate transaction and returns the new entity id.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the append fails.
    pub fn instantiate<T: EntityShape>(
        &mut self,
        definition: DefinitionId,
        record: &T,
    ) -> CoreResult<EntityId> {
        let timestamp = self.next_timestamp()?;
        let id = EntityId::from_timestamp(timestamp)
            .ok_or_else(|| CoreError::invalid_operation("timestamp before epoch"))?;
        let frame = self.encoder.instantiate(definition, record, timestamp)?;
        self.append(&frame)?;
        Ok(id)
    }

    /// Appends a set-fields transaction for the named fields of `record`.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the append fails.
    pub fn set_fields<T: EntityShape>(
        &mut self,
        entity: EntityId,
        definition: DefinitionId,
        record: &T,
        fields: &[&str],
    ) -> CoreResult<Timestamp> {
        let timestamp = self.next_timestamp()?;
        let frame = self
            .encoder
            .set_fields(entity, definition, timestamp, record, fields)?;
        self.append(&frame)?;
        Ok(timestamp)
    }

    /// Appends an archive transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the append fails.
    pub fn archive(&mut self, entity: EntityId, definition: DefinitionId) -> CoreResult<Timestamp> {
        let timestamp = self.next_timestamp()?;
        let frame = self.encoder.archive(entity, definition, timestamp)?;
        self.append(&frame)?;
        Ok(timestamp)
    }

    /// Appends a block boundary and returns its offset.
    ///
    /// # Errors
    ///
    /// Returns an error if the append fails.
    pub fn seal_block(&mut self) -> CoreResult<u64> {
        let frame = self.encoder.boundary();
        self.append(&frame)
    }

    /// Appends pre-encoded bytes verbatim.
    ///
    /// # Errors
    ///
    /// Returns an error if the append fails.
    pub fn append_raw(&mut self, bytes: &[u8]) -> CoreResult<u64> {
        self.append(bytes)
    }

    /// Flushes the log.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    pub fn flush(&mut self) -> CoreResult<()> {
        self.log.write().flush()?;
        Ok(())
    }
}
