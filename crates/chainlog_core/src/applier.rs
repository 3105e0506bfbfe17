//! Transaction applier.
//!
//! Dispatches each validated transaction on its definition:
//!
//! | Definition | Effect |
//! |------------|--------|
//! | schema records (0..=4) | handed to the [`SchemaHook`] |
//! | block boundary, reserved | none |
//! | set-fields | update of a live record |
//! | archive | live record moved to the archived set |
//! | entity type (> 8) | new record instantiated |
//!
//! Every check runs before the cache is touched, so a transaction that
//! fails leaves no partial state behind.

use crate::bootstrap::{NoopSchemaHook, SchemaHook};
use crate::cache::{CacheHooks, CacheRegistry, CacheSet, EntityShape, NoopHooks, TypeMap};
use crate::error::{CoreError, CoreResult, CorruptionReason};
use crate::scanner::{Transaction, TransactionField};
use crate::schema::{ControlKind, Definition, SchemaRegistry};
use crate::types::{DefinitionId, EntityId, FieldId};
use chainlog_codec::{CodecError, FieldKind, FieldValue, Timestamp};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Effect of applying one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Control record with no cache effect.
    PassThrough,
    /// A record was instantiated.
    Created(EntityId),
    /// A live record was updated.
    Updated(EntityId),
    /// A live record was archived.
    Archived(EntityId),
    /// The transaction was valid but had nothing to act on.
    Ignored(IgnoreReason),
}

/// Why a transaction was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The target definition has no native type.
    UnresolvedType(DefinitionId),
    /// The target definition is not known to the registry.
    UnknownDefinition(DefinitionId),
    /// The target definition is not an entity type.
    NotAnEntity(DefinitionId),
    /// No live record has the target id.
    MissingTarget(EntityId),
    /// `$entity`, `$definition` or `$timestamp` is absent.
    MissingHeader,
}

/// Target of a set-fields or archive transaction.
struct Header<'t> {
    entity: EntityId,
    definition: DefinitionId,
    timestamp: Timestamp,
    /// Fields after `$timestamp`.
    fields: &'t [TransactionField],
}

/// Applies transactions to the type cache.
pub struct TransactionApplier {
    registry: Arc<dyn SchemaRegistry>,
    caches: CacheRegistry,
    hooks: Box<dyn CacheHooks>,
    schema_hook: Box<dyn SchemaHook>,
    applied: u64,
}

impl fmt::Debug for TransactionApplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionApplier")
            .field("caches", &self.caches)
            .field("applied", &self.applied)
            .finish_non_exhaustive()
    }
}

impl TransactionApplier {
    /// Creates an applier with no-op hooks.
    pub fn new(registry: Arc<dyn SchemaRegistry>, types: TypeMap) -> Self {
        Self {
            registry,
            caches: CacheRegistry::new(types),
            hooks: Box::new(NoopHooks),
            schema_hook: Box::new(NoopSchemaHook),
            applied: 0,
        }
    }

    /// Sets the cache hooks.
    #[must_use]
    pub fn with_hooks(mut self, hooks: impl CacheHooks + 'static) -> Self {
        self.hooks = Box::new(hooks);
        self
    }

    /// Sets the schema hook.
    #[must_use]
    pub fn with_schema_hook(mut self, hook: impl SchemaHook + 'static) -> Self {
        self.schema_hook = Box::new(hook);
        self
    }

    /// Returns the cache registry.
    #[must_use]
    pub fn caches(&self) -> &CacheRegistry {
        &self.caches
    }

    /// Returns the typed cache set of a definition.
    #[must_use]
    pub fn cache_set<T: EntityShape>(&self, definition: DefinitionId) -> Option<&CacheSet<T>> {
        self.caches.cache_set(definition)
    }

    /// Returns the number of transactions applied.
    #[must_use]
    pub fn applied(&self) -> u64 {
        self.applied
    }

    /// Applies one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StructuralCorruption`] if an instantiate carries
    /// a non-instanceable field or no timestamp, if a field value does not
    /// decode, or if the schema hook rejects a schema record.
    pub fn apply(&mut self, txn: &Transaction) -> CoreResult<ApplyOutcome> {
        let outcome = match txn.definition.control_kind() {
            None => self.instantiate(txn)?,
            Some(ControlKind::SetFields) => self.set_fields(txn)?,
            Some(ControlKind::Archive) => self.archive(txn)?,
            Some(kind) if kind.is_schema_record() => {
                self.schema_hook.on_schema_record(kind, txn)?;
                ApplyOutcome::PassThrough
            }
            Some(_) => ApplyOutcome::PassThrough,
        };
        self.applied += 1;
        trace!(
            definition = txn.definition.id.as_u64(),
            offset = txn.offset,
            outcome = ?outcome,
            "applied transaction"
        );
        Ok(outcome)
    }

    fn instantiate(&mut self, txn: &Transaction) -> CoreResult<ApplyOutcome> {
        let definition = &txn.definition;
        let corrupt = |reason| CoreError::corruption(txn.offset, reason);

        if let Some(field) = txn.fields.iter().find(|f| !f.descriptor.instanceable) {
            return Err(corrupt(CorruptionReason::NonInstanceableField {
                definition: definition.id,
                field: field.id(),
            }));
        }
        let timestamp = txn
            .field(FieldId::TIMESTAMP)
            .ok_or_else(|| corrupt(CorruptionReason::MissingTimestamp(definition.id)))?;
        let timestamp = decode_timestamp(timestamp).map_err(corrupt)?;
        let id = EntityId::from_timestamp(timestamp).ok_or_else(|| {
            corrupt(CorruptionReason::UndecodableValue {
                field: FieldId::TIMESTAMP,
                source: CodecError::out_of_range(FieldKind::Timestamp, timestamp.ticks()),
            })
        })?;

        let set = self.caches.resolve(definition);
        if !set.is_resolved() {
            return Ok(ApplyOutcome::Ignored(IgnoreReason::UnresolvedType(
                definition.id,
            )));
        }
        let Some(record) = set
            .instantiate(definition, id, timestamp, &txn.fields)
            .map_err(corrupt)?
        else {
            return Ok(ApplyOutcome::Ignored(IgnoreReason::UnresolvedType(
                definition.id,
            )));
        };
        self.hooks.on_cache_add(definition, &*record);
        Ok(ApplyOutcome::Created(id))
    }

    fn set_fields(&mut self, txn: &Transaction) -> CoreResult<ApplyOutcome> {
        let corrupt = |reason| CoreError::corruption(txn.offset, reason);
        let Some(header) = read_header(txn).map_err(corrupt)? else {
            return Ok(ApplyOutcome::Ignored(IgnoreReason::MissingHeader));
        };
        let definition = match self.target_definition(header.definition) {
            Ok(definition) => definition,
            Err(reason) => return Ok(ApplyOutcome::Ignored(reason)),
        };

        let set = self.caches.resolve(&definition);
        if !set.is_resolved() {
            return Ok(ApplyOutcome::Ignored(IgnoreReason::UnresolvedType(
                definition.id,
            )));
        }
        let Some(record) = set
            .update(&definition, header.entity, header.timestamp, header.fields)
            .map_err(corrupt)?
        else {
            return Ok(ApplyOutcome::Ignored(IgnoreReason::MissingTarget(
                header.entity,
            )));
        };
        self.hooks.on_cache_update(&definition, &*record);
        Ok(ApplyOutcome::Updated(header.entity))
    }

    fn archive(&mut self, txn: &Transaction) -> CoreResult<ApplyOutcome> {
        let Some(header) =
            read_header(txn).map_err(|reason| CoreError::corruption(txn.offset, reason))?
        else {
            return Ok(ApplyOutcome::Ignored(IgnoreReason::MissingHeader));
        };
        let definition = match self.target_definition(header.definition) {
            Ok(definition) => definition,
            Err(reason) => return Ok(ApplyOutcome::Ignored(reason)),
        };

        let set = self.caches.resolve(&definition);
        if !set.is_resolved() {
            return Ok(ApplyOutcome::Ignored(IgnoreReason::UnresolvedType(
                definition.id,
            )));
        }
        let Some(record) = set.archive(header.entity, header.timestamp) else {
            return Ok(ApplyOutcome::Ignored(IgnoreReason::MissingTarget(
                header.entity,
            )));
        };
        self.hooks.on_cache_remove(&definition, &*record);
        Ok(ApplyOutcome::Archived(header.entity))
    }

    fn target_definition(&self, id: DefinitionId) -> Result<Arc<Definition>, IgnoreReason> {
        let definition = self
            .registry
            .resolve_definition(id)
            .ok_or(IgnoreReason::UnknownDefinition(id))?;
        if definition.is_entity() {
            Ok(definition)
        } else {
            Err(IgnoreReason::NotAnEntity(id))
        }
    }
}

/// Reads `$entity` and `$definition` from the fields before `$timestamp`.
///
/// Returns `Ok(None)` if any of the three is absent.
fn read_header(txn: &Transaction) -> Result<Option<Header<'_>>, CorruptionReason> {
    let mut entity = None;
    let mut definition = None;
    for (index, field) in txn.fields.iter().enumerate() {
        match field.id() {
            FieldId::ENTITY => entity = Some(EntityId::new(decode_u64(field)?)),
            FieldId::DEFINITION => definition = Some(DefinitionId::new(decode_u64(field)?)),
            FieldId::TIMESTAMP => {
                let (Some(entity), Some(definition)) = (entity, definition) else {
                    return Ok(None);
                };
                return Ok(Some(Header {
                    entity,
                    definition,
                    timestamp: decode_timestamp(field)?,
                    fields: &txn.fields[index + 1..],
                }));
            }
            _ => {}
        }
    }
    Ok(None)
}

/// Decodes a field with its own descriptor's codec.
pub(crate) fn decode_field(field: &TransactionField) -> Result<FieldValue, CorruptionReason> {
    field
        .descriptor
        .codec()
        .decode(&field.wire)
        .map_err(|source| CorruptionReason::UndecodableValue {
            field: field.id(),
            source,
        })
}

fn undecodable(field: &TransactionField, expected: FieldKind, value: &FieldValue) -> CorruptionReason {
    CorruptionReason::UndecodableValue {
        field: field.id(),
        source: CodecError::KindMismatch {
            expected,
            actual: value.variant_name(),
        },
    }
}

pub(crate) fn decode_u64(field: &TransactionField) -> Result<u64, CorruptionReason> {
    match decode_field(field)? {
        FieldValue::UInt(n) => Ok(n),
        other => Err(undecodable(field, FieldKind::U64, &other)),
    }
}

pub(crate) fn decode_timestamp(field: &TransactionField) -> Result<Timestamp, CorruptionReason> {
    match decode_field(field)? {
        FieldValue::Timestamp(ts) => Ok(ts),
        other => Err(undecodable(field, FieldKind::Timestamp, &other)),
    }
}
