//! Per-definition field plans: which native binding and which wire codec
//! serve each field id.
//!
//! A slot is resolved the first time a field id is seen and reused until
//! the registry hands out a different descriptor for that id.

use super::binding::{EntityShape, FieldBinding};
use crate::schema::{Definition, FieldDescriptor, SchemaRegistry};
use crate::types::FieldId;
use chainlog_codec::{CodecResult, FieldCodec, WireValue};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
struct Slot {
    binding: usize,
    codec: FieldCodec,
}

#[derive(Debug)]
struct Resolved {
    descriptor: Arc<FieldDescriptor>,
    slot: Option<Slot>,
}

/// Decoders and encoders of one definition for native type `T`.
#[derive(Debug)]
pub struct FieldPlan<T> {
    definition: Arc<Definition>,
    bindings: Vec<FieldBinding<T>>,
    resolved: HashMap<FieldId, Resolved>,
}

impl<T: EntityShape> FieldPlan<T> {
    /// Creates an empty plan for a definition.
    #[must_use]
    pub fn new(definition: Arc<Definition>) -> Self {
        Self {
            definition,
            bindings: T::bindings(),
            resolved: HashMap::new(),
        }
    }

    /// Returns the definition the plan serves.
    #[must_use]
    pub fn definition(&self) -> &Arc<Definition> {
        &self.definition
    }

    /// Switches to a newer version of the definition, dropping every
    /// resolved slot.
    pub fn refresh(&mut self, definition: &Arc<Definition>) {
        if !Arc::ptr_eq(&self.definition, definition) {
            self.definition = Arc::clone(definition);
            self.resolved.clear();
        }
    }

    fn slot(&mut self, descriptor: &Arc<FieldDescriptor>) -> Option<Slot> {
        let fresh = self
            .resolved
            .get(&descriptor.id)
            .is_some_and(|r| Arc::ptr_eq(&r.descriptor, descriptor));
        if !fresh {
            let slot = self.bind(descriptor);
            self.resolved.insert(
                descriptor.id,
                Resolved {
                    descriptor: Arc::clone(descriptor),
                    slot,
                },
            );
        }
        self.resolved.get(&descriptor.id).and_then(|r| r.slot)
    }

    fn bind(&self, descriptor: &FieldDescriptor) -> Option<Slot> {
        if !self.definition.fields.contains(&descriptor.id) {
            return None;
        }
        let binding = self
            .bindings
            .iter()
            .position(|b| b.name() == descriptor.name)?;
        let native = &self.bindings[binding];
        if native.kind() != descriptor.kind {
            warn!(
                definition = %self.definition,
                field = %descriptor.name,
                wire_kind = %descriptor.kind,
                native_kind = %native.kind(),
                "field kind differs from native binding; field ignored"
            );
            return None;
        }
        if descriptor.nullable && !native.nullable() {
            warn!(
                definition = %self.definition,
                field = %descriptor.name,
                "nullable field has a non-nullable native binding; field ignored"
            );
            return None;
        }
        Some(Slot {
            binding,
            codec: descriptor.codec(),
        })
    }

    /// Decodes a wire value into `record`.
    ///
    /// Returns `Ok(false)` if no native field is bound to the descriptor.
    ///
    /// # Errors
    ///
    /// Returns an error if the wire value does not decode under the
    /// descriptor or does not fit the native field.
    pub fn decode_into(
        &mut self,
        record: &mut T,
        descriptor: &Arc<FieldDescriptor>,
        wire: &WireValue,
    ) -> CodecResult<bool> {
        let Some(slot) = self.slot(descriptor) else {
            return Ok(false);
        };
        let value = slot.codec.decode(wire)?;
        self.bindings[slot.binding].write(record, value)?;
        Ok(true)
    }

    /// Encodes the bound field of `record` for a descriptor.
    ///
    /// Returns `Ok(None)` if no native field is bound to the descriptor.
    ///
    /// # Errors
    ///
    /// Returns an error if the native value cannot be encoded.
    pub fn encode_from(
        &mut self,
        record: &T,
        descriptor: &Arc<FieldDescriptor>,
    ) -> CodecResult<Option<WireValue>> {
        let Some(slot) = self.slot(descriptor) else {
            return Ok(None);
        };
        let value = self.bindings[slot.binding].read(record);
        slot.codec.encode(&value).map(Some)
    }

    /// Encodes every bound field of `record` in definition order.
    ///
    /// Fields the registry cannot resolve are left out.
    ///
    /// # Errors
    ///
    /// Returns an error if a native value cannot be encoded.
    pub fn encode_all(
        &mut self,
        record: &T,
        registry: &dyn SchemaRegistry,
    ) -> CodecResult<Vec<(FieldId, WireValue)>> {
        let ids = self.definition.fields.clone();
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(descriptor) = registry.resolve_field(id) else {
                continue;
            };
            if let Some(wire) = self.encode_from(record, &descriptor)? {
                out.push((id, wire));
            }
        }
        Ok(out)
    }

    /// Returns the number of bound slots resolved so far.
    #[must_use]
    pub fn bound_count(&self) -> usize {
        self.resolved.values().filter(|r| r.slot.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::binding::RecordMeta;
    use crate::schema::InMemorySchemaRegistry;
    use crate::types::DefinitionId;
    use chainlog_codec::{CodecError, FieldKind};

    #[derive(Debug, Clone, Default)]
    struct Sensor {
        meta: RecordMeta,
        label: String,
        level: Option<u8>,
    }

    impl EntityShape for Sensor {
        fn bindings() -> Vec<FieldBinding<Self>> {
            vec![
                FieldBinding::new("Label", |s: &Sensor| &s.label, |s, v| s.label = v),
                FieldBinding::new("Level", |s: &Sensor| &s.level, |s, v| s.level = v),
            ]
        }

        fn meta(&self) -> &RecordMeta {
            &self.meta
        }

        fn meta_mut(&mut self) -> &mut RecordMeta {
            &mut self.meta
        }
    }

    fn setup() -> (InMemorySchemaRegistry, FieldPlan<Sensor>) {
        let registry = InMemorySchemaRegistry::with_builtins();
        registry.register_field(FieldDescriptor::new(FieldId::new(16), "Label", FieldKind::String));
        registry.register_field(
            FieldDescriptor::new(FieldId::new(17), "Level", FieldKind::U8).nullable(true),
        );
        let definition = registry.register_definition(Definition::entity(
            DefinitionId::new(9),
            "Sensor",
            vec![FieldId::new(16), FieldId::new(17)],
        ));
        (registry, FieldPlan::new(definition))
    }

    #[test]
    fn decode_into_bound_fields() {
        let (registry, mut plan) = setup();
        let label = registry.resolve_field(FieldId::new(16)).unwrap();
        let level = registry.resolve_field(FieldId::new(17)).unwrap();
        let mut sensor = Sensor::default();

        assert!(plan
            .decode_into(&mut sensor, &label, &WireValue::Bytes(b"tank".to_vec()))
            .unwrap());
        assert!(plan
            .decode_into(&mut sensor, &level, &WireValue::Inline(8))
            .unwrap());
        assert_eq!(sensor.label, "tank");
        assert_eq!(sensor.level, Some(7));
        assert_eq!(plan.bound_count(), 2);
    }

    #[test]
    fn unbound_and_mismatched_fields_are_ignored() {
        let (registry, mut plan) = setup();
        let foreign = Arc::new(FieldDescriptor::new(FieldId::new(30), "Label", FieldKind::String));
        let mut sensor = Sensor::default();
        assert!(!plan
            .decode_into(&mut sensor, &foreign, &WireValue::Bytes(b"x".to_vec()))
            .unwrap());

        let retyped = registry.register_field(FieldDescriptor::new(
            FieldId::new(16),
            "Label",
            FieldKind::U32,
        ));
        assert!(!plan
            .decode_into(&mut sensor, &retyped, &WireValue::Inline(1))
            .unwrap());
        assert_eq!(sensor.label, "");
    }

    #[test]
    fn nullable_field_is_not_bound_to_required_native() {
        let (registry, mut plan) = setup();
        let widened = registry.register_field(
            FieldDescriptor::new(FieldId::new(16), "Label", FieldKind::String).nullable(true),
        );
        let mut sensor = Sensor {
            label: "kept".into(),
            ..Sensor::default()
        };
        assert!(!plan
            .decode_into(&mut sensor, &widened, &WireValue::Bytes(vec![]))
            .unwrap());
        assert_eq!(sensor.label, "kept");
        assert_eq!(plan.encode_from(&sensor, &widened).unwrap(), None);
    }

    #[test]
    fn out_of_range_value_fails() {
        let (registry, mut plan) = setup();
        let level = registry.resolve_field(FieldId::new(17)).unwrap();
        let err = plan
            .decode_into(&mut Sensor::default(), &level, &WireValue::Inline(1_000))
            .unwrap_err();
        assert!(matches!(err, CodecError::ValueOutOfRange { .. }));
    }

    #[test]
    fn encode_all_in_definition_order() {
        let (registry, mut plan) = setup();
        let sensor = Sensor {
            label: "tank".into(),
            level: None,
            ..Sensor::default()
        };
        let fields = plan.encode_all(&sensor, &registry).unwrap();
        assert_eq!(
            fields,
            vec![
                (FieldId::new(16), WireValue::Bytes(b"tank".to_vec())),
                (FieldId::new(17), WireValue::Inline(0)),
            ]
        );
    }

    #[test]
    fn refresh_drops_slots() {
        let (registry, mut plan) = setup();
        let label = registry.resolve_field(FieldId::new(16)).unwrap();
        plan.decode_into(&mut Sensor::default(), &label, &WireValue::Bytes(vec![]))
            .unwrap();
        let narrowed = registry.register_definition(Definition::entity(
            DefinitionId::new(9),
            "Sensor",
            vec![FieldId::new(17)],
        ));
        plan.refresh(&narrowed);
        assert_eq!(plan.bound_count(), 0);
        assert!(!plan
            .decode_into(&mut Sensor::default(), &label, &WireValue::Bytes(vec![]))
            .unwrap());
    }
}
