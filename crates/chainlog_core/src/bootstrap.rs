//! Schema records carried by the log itself.
//!
//! A log may declare its own fields and entity types with field-definition
//! and entity-type records. [`RegistryBootstrap`] is a [`SchemaHook`] that
//! registers them into an [`InMemorySchemaRegistry`] as they are applied,
//! so the declarations take effect for the very next transaction.

use crate::applier::{decode_field, decode_u64};
use crate::error::{CoreError, CoreResult, CorruptionReason};
use crate::scanner::{Transaction, TransactionField};
use crate::schema::{ControlKind, Definition, FieldDescriptor, InMemorySchemaRegistry};
use crate::types::{DefinitionId, FieldId};
use chainlog_codec::{FieldKind, FieldValue};
use std::sync::Arc;
use tracing::debug;

/// Receives schema records (definitions `0..=4`) in apply order.
pub trait SchemaHook: Send {
    /// Called once per schema record.
    ///
    /// # Errors
    ///
    /// An error aborts the read. It should be structural corruption.
    fn on_schema_record(&mut self, _kind: ControlKind, _txn: &Transaction) -> CoreResult<()> {
        Ok(())
    }
}

/// Ignores every schema record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSchemaHook;

impl SchemaHook for NoopSchemaHook {}

/// Registers in-log field and entity declarations.
///
/// Field definitions require `$field`, `$name` and `$kind`; `$nullable`
/// defaults to false and `$instanceable` to true. Entity types require
/// `$definition` above the reserved range, `$name`, and list their fields
/// as repeated `$field` entries.
#[derive(Debug, Clone)]
pub struct RegistryBootstrap {
    registry: Arc<InMemorySchemaRegistry>,
}

impl RegistryBootstrap {
    /// Creates a hook that registers into `registry`.
    #[must_use]
    pub fn new(registry: Arc<InMemorySchemaRegistry>) -> Self {
        Self { registry }
    }

    fn field_definition(&self, txn: &Transaction) -> Result<(), CorruptionReason> {
        let id = FieldId::new(decode_u64(required(txn, FieldId::FIELD, "missing $field")?)?);
        if id.is_builtin() {
            return Err(malformed(txn, "field id in built-in range"));
        }
        let name = decode_text(txn, required(txn, FieldId::NAME, "missing $name")?)?;
        let kind = FieldKind::from_code(decode_u64(required(txn, FieldId::KIND, "missing $kind")?)?)
            .ok_or_else(|| malformed(txn, "unknown field kind"))?;
        let nullable = optional_bool(txn, FieldId::NULLABLE)?.unwrap_or(false);
        let instanceable = optional_bool(txn, FieldId::INSTANCEABLE)?.unwrap_or(true);

        let descriptor = FieldDescriptor::new(id, name, kind)
            .nullable(nullable)
            .instanceable(instanceable);
        debug!(field = %descriptor.id, name = %descriptor.name, kind = %kind, "registered field");
        self.registry.register_field(descriptor);
        Ok(())
    }

    fn entity_type(&self, txn: &Transaction) -> Result<(), CorruptionReason> {
        let id = DefinitionId::new(decode_u64(required(
            txn,
            FieldId::DEFINITION,
            "missing $definition",
        )?)?);
        if id.is_reserved() {
            return Err(malformed(txn, "definition id in reserved range"));
        }
        let name = decode_text(txn, required(txn, FieldId::NAME, "missing $name")?)?;
        let fields = txn
            .fields
            .iter()
            .filter(|f| f.id() == FieldId::FIELD)
            .map(|f| decode_u64(f).map(FieldId::new))
            .collect::<Result<Vec<_>, _>>()?;

        let definition = Definition::entity(id, name, fields);
        debug!(definition = %definition, fields = definition.fields.len(), "registered entity type");
        self.registry.register_definition(definition);
        Ok(())
    }
}

impl SchemaHook for RegistryBootstrap {
    fn on_schema_record(&mut self, kind: ControlKind, txn: &Transaction) -> CoreResult<()> {
        let result = match kind {
            ControlKind::FieldDefinition => self.field_definition(txn),
            ControlKind::EntityType => self.entity_type(txn),
            _ => Ok(()),
        };
        result.map_err(|reason| CoreError::corruption(txn.offset, reason))
    }
}

fn malformed(txn: &Transaction, detail: &'static str) -> CorruptionReason {
    CorruptionReason::MalformedSchemaRecord {
        definition: txn.definition.id,
        detail,
    }
}

fn required<'t>(
    txn: &'t Transaction,
    id: FieldId,
    detail: &'static str,
) -> Result<&'t TransactionField, CorruptionReason> {
    txn.field(id).ok_or_else(|| malformed(txn, detail))
}

fn decode_text(txn: &Transaction, field: &TransactionField) -> Result<String, CorruptionReason> {
    match decode_field(field)? {
        FieldValue::String(s) => Ok(s),
        _ => Err(malformed(txn, "$name is not text")),
    }
}

fn optional_bool(txn: &Transaction, id: FieldId) -> Result<Option<bool>, CorruptionReason> {
    let Some(field) = txn.field(id) else {
        return Ok(None);
    };
    match decode_field(field)? {
        FieldValue::Bool(b) => Ok(Some(b)),
        FieldValue::Null => Ok(None),
        _ => Err(malformed(txn, "flag is not a bool")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaRegistry;
    use chainlog_codec::WireValue;

    fn txn(
        registry: &InMemorySchemaRegistry,
        kind: ControlKind,
        fields: &[(FieldId, WireValue)],
    ) -> Transaction {
        Transaction {
            offset: 42,
            len: 0,
            definition: registry.resolve_definition(kind.id()).unwrap(),
            fields: fields
                .iter()
                .map(|(id, wire)| TransactionField {
                    descriptor: registry.resolve_field(*id).unwrap(),
                    wire: wire.clone(),
                })
                .collect(),
            skipped_fields: 0,
        }
    }

    fn text(s: &str) -> WireValue {
        WireValue::Bytes(s.as_bytes().to_vec())
    }

    #[test]
    fn registers_field_definition() {
        let registry = Arc::new(InMemorySchemaRegistry::new());
        let mut hook = RegistryBootstrap::new(Arc::clone(&registry));
        let record = txn(
            &registry,
            ControlKind::FieldDefinition,
            &[
                (FieldId::FIELD, WireValue::Inline(20)),
                (FieldId::NAME, text("Level")),
                (FieldId::KIND, WireValue::Inline(u64::from(FieldKind::I32.code()))),
                (FieldId::NULLABLE, WireValue::Inline(1)),
            ],
        );
        hook.on_schema_record(ControlKind::FieldDefinition, &record).unwrap();

        let field = registry.lookup_field(FieldId::new(20)).unwrap();
        assert_eq!(field.name, "Level");
        assert_eq!(field.kind, FieldKind::I32);
        assert!(field.nullable);
        assert!(field.instanceable);
    }

    #[test]
    fn registers_entity_type() {
        let registry = Arc::new(InMemorySchemaRegistry::new());
        let mut hook = RegistryBootstrap::new(Arc::clone(&registry));
        let record = txn(
            &registry,
            ControlKind::EntityType,
            &[
                (FieldId::DEFINITION, WireValue::Inline(12)),
                (FieldId::NAME, text("Tank")),
                (FieldId::FIELD, WireValue::Inline(20)),
                (FieldId::FIELD, WireValue::Inline(21)),
            ],
        );
        hook.on_schema_record(ControlKind::EntityType, &record).unwrap();

        let tank = registry.definition_by_name("Tank").unwrap();
        assert_eq!(tank.id, DefinitionId::new(12));
        assert_eq!(tank.fields, vec![FieldId::new(20), FieldId::new(21)]);
    }

    #[test]
    fn rejects_malformed_records() {
        let registry = Arc::new(InMemorySchemaRegistry::new());
        let mut hook = RegistryBootstrap::new(Arc::clone(&registry));

        let no_kind = txn(
            &registry,
            ControlKind::FieldDefinition,
            &[(FieldId::FIELD, WireValue::Inline(20)), (FieldId::NAME, text("Level"))],
        );
        let err = hook
            .on_schema_record(ControlKind::FieldDefinition, &no_kind)
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::StructuralCorruption {
                offset: 42,
                reason: CorruptionReason::MalformedSchemaRecord {
                    detail: "missing $kind",
                    ..
                }
            }
        ));

        let builtin = txn(
            &registry,
            ControlKind::FieldDefinition,
            &[
                (FieldId::FIELD, WireValue::Inline(3)),
                (FieldId::NAME, text("Shadow")),
                (FieldId::KIND, WireValue::Inline(8)),
            ],
        );
        assert!(hook
            .on_schema_record(ControlKind::FieldDefinition, &builtin)
            .is_err());

        let reserved = txn(
            &registry,
            ControlKind::EntityType,
            &[(FieldId::DEFINITION, WireValue::Inline(6)), (FieldId::NAME, text("Bad"))],
        );
        assert!(hook.on_schema_record(ControlKind::EntityType, &reserved).is_err());
        assert!(registry.lookup_definition(DefinitionId::new(6)).is_none());
    }

    #[test]
    fn other_schema_records_are_ignored() {
        let registry = Arc::new(InMemorySchemaRegistry::new());
        let mut hook = RegistryBootstrap::new(Arc::clone(&registry));
        let record = txn(&registry, ControlKind::Schema, &[]);
        hook.on_schema_record(ControlKind::Schema, &record).unwrap();
        assert_eq!(registry.definition_count(), 0);
    }
}
