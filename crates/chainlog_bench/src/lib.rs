//! Benchmark utilities.
//!
//! A small reading type and generators for chains of it.

use chainlog_core::cache::{EntityShape, FieldBinding, RecordMeta, TypeMap};
use chainlog_core::{
    Definition, DefinitionId, FieldDescriptor, FieldId, FieldKind, InMemorySchemaRegistry,
    Timestamp, TransactionEncoder,
};
use rand::Rng;
use std::sync::Arc;

/// Definition id of [`Reading`].
pub const READING: DefinitionId = DefinitionId(9);

/// A sensor reading with one field per common wire shape.
#[derive(Debug, Clone, Default)]
#[allow(missing_docs)]
pub struct Reading {
    pub meta: RecordMeta,
    pub sensor: String,
    pub value: f64,
    pub sequence: u64,
    pub offset: Option<i64>,
    pub payload: Vec<u8>,
}

impl EntityShape for Reading {
    fn bindings() -> Vec<FieldBinding<Self>> {
        vec![
            FieldBinding::new("Sensor", |r: &Reading| &r.sensor, |r, v| r.sensor = v),
            FieldBinding::new("Value", |r: &Reading| &r.value, |r, v| r.value = v),
            FieldBinding::new("Sequence", |r: &Reading| &r.sequence, |r, v| r.sequence = v),
            FieldBinding::new("Offset", |r: &Reading| &r.offset, |r, v| r.offset = v),
            FieldBinding::new("Payload", |r: &Reading| &r.payload, |r, v| r.payload = v),
        ]
    }

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }
}

/// Registry with the built-ins and [`Reading`].
pub fn registry() -> Arc<InMemorySchemaRegistry> {
    let registry = Arc::new(InMemorySchemaRegistry::with_builtins());
    let fields = [
        ("Sensor", FieldKind::String, false),
        ("Value", FieldKind::F64, false),
        ("Sequence", FieldKind::U64, false),
        ("Offset", FieldKind::I64, true),
        ("Payload", FieldKind::Bytes, false),
    ];
    let mut ids = Vec::with_capacity(fields.len());
    for (id, (name, kind, nullable)) in (16u64..).zip(fields) {
        let id = FieldId::new(id);
        registry.register_field(FieldDescriptor::new(id, name, kind).nullable(nullable));
        ids.push(id);
    }
    registry.register_definition(Definition::entity(READING, "Reading", ids));
    registry
}

/// Type map binding [`Reading`].
pub fn types() -> TypeMap {
    let mut types = TypeMap::new();
    types.register::<Reading>("Reading");
    types
}

/// Generate random payload bytes of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate a random reading with a payload of `payload_size` bytes.
pub fn random_reading(payload_size: usize) -> Reading {
    let mut rng = rand::thread_rng();
    Reading {
        sensor: format!("sensor-{}", rng.gen_range(0..64)),
        value: rng.gen_range(-1_000.0..1_000.0),
        sequence: rng.gen(),
        offset: rng.gen_bool(0.5).then(|| rng.gen_range(-1_000_000..1_000_000)),
        payload: random_data(payload_size),
        ..Reading::default()
    }
}

/// Encodes `count` instantiate transactions, sealing a block every
/// `block_size` of them.
///
/// # Panics
///
/// Panics if a reading fails to encode.
pub fn reading_chain(count: usize, block_size: usize, payload_size: usize) -> Vec<u8> {
    let mut encoder = TransactionEncoder::new(registry());
    let mut out = Vec::new();
    for i in 0..count {
        let ts = Timestamp::from_ticks(1_000 + i as i64);
        let frame = encoder
            .instantiate(READING, &random_reading(payload_size), ts)
            .expect("reading encodes");
        out.extend_from_slice(&frame);
        if (i + 1) % block_size == 0 {
            out.extend_from_slice(&encoder.boundary());
        }
    }
    out
}
