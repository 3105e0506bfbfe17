//! Test fixtures and chain helpers.
//!
//! Provides sample entity types, recording hooks, and a [`TestChain`] that
//! wires a writer and a tailing reader to one shared log.

use chainlog_codec::{FieldKind, Timestamp};
use chainlog_core::cache::{
    CacheHooks, CacheSet, DynRecord, EntityShape, FieldBinding, RecordMeta, TypeMap,
};
use chainlog_core::{
    Block, ChainReader, ChainWriter, Definition, DefinitionId, EntityId, FieldDescriptor,
    FieldId, InMemorySchemaRegistry, PollSummary, ReaderConfig,
};
use chainlog_storage::{FileBackend, InMemoryBackend, StorageBackend};
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, Once};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

/// Definition id of [`Widget`].
pub const WIDGET: DefinitionId = DefinitionId(9);
/// Definition id of an entity type with no native type.
pub const GADGET: DefinitionId = DefinitionId(10);
/// Definition id of [`Probe`].
pub const PROBE: DefinitionId = DefinitionId(11);

/// `Widget.Name`: string.
pub const WIDGET_NAME: FieldId = FieldId(16);
/// `Widget.Weight`: nullable u32.
pub const WIDGET_WEIGHT: FieldId = FieldId(17);
/// `Widget.Active`: bool, set-fields only.
pub const WIDGET_ACTIVE: FieldId = FieldId(18);
/// `Gadget.Label`: string.
pub const GADGET_LABEL: FieldId = FieldId(19);

/// Sample entity used across the integration suites.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Widget {
    /// Identity and timestamps.
    pub meta: RecordMeta,
    /// Display name.
    pub name: String,
    /// Optional weight.
    pub weight: Option<u32>,
    /// Activation flag.
    pub active: bool,
}

impl Widget {
    /// Creates a widget with a name.
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

impl EntityShape for Widget {
    fn bindings() -> Vec<FieldBinding<Self>> {
        vec![
            FieldBinding::new("Name", |w: &Widget| &w.name, |w, v| w.name = v),
            FieldBinding::new("Weight", |w: &Widget| &w.weight, |w, v| w.weight = v),
            FieldBinding::new("Active", |w: &Widget| &w.active, |w, v| w.active = v),
        ]
    }

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }
}

/// Entity with one field of every kind, plain and nullable.
#[derive(Debug, Clone, Default, PartialEq)]
#[allow(missing_docs)]
pub struct Probe {
    pub meta: RecordMeta,
    pub flag: bool,
    pub tiny: i8,
    pub small: i16,
    pub medium: i32,
    pub large: i64,
    pub byte: u8,
    pub word: u16,
    pub dword: u32,
    pub qword: u64,
    pub single: f32,
    pub double: f64,
    pub stamp: Timestamp,
    pub text: String,
    pub blob: Vec<u8>,
    pub opt_flag: Option<bool>,
    pub opt_large: Option<i64>,
    pub opt_qword: Option<u64>,
    pub opt_double: Option<f64>,
    pub opt_stamp: Option<Timestamp>,
    pub opt_text: Option<String>,
    pub opt_blob: Option<Vec<u8>>,
}

/// Field layout of [`Probe`]: name, kind, nullable.
pub const PROBE_FIELDS: [(&str, FieldKind, bool); 21] = [
    ("Flag", FieldKind::Bool, false),
    ("Tiny", FieldKind::I8, false),
    ("Small", FieldKind::I16, false),
    ("Medium", FieldKind::I32, false),
    ("Large", FieldKind::I64, false),
    ("Byte", FieldKind::U8, false),
    ("Word", FieldKind::U16, false),
    ("Dword", FieldKind::U32, false),
    ("Qword", FieldKind::U64, false),
    ("Single", FieldKind::F32, false),
    ("Double", FieldKind::F64, false),
    ("Stamp", FieldKind::Timestamp, false),
    ("Text", FieldKind::String, false),
    ("Blob", FieldKind::Bytes, false),
    ("OptFlag", FieldKind::Bool, true),
    ("OptLarge", FieldKind::I64, true),
    ("OptQword", FieldKind::U64, true),
    ("OptDouble", FieldKind::F64, true),
    ("OptStamp", FieldKind::Timestamp, true),
    ("OptText", FieldKind::String, true),
    ("OptBlob", FieldKind::Bytes, true),
];

/// First field id used by [`Probe`].
pub const PROBE_FIRST_FIELD: u64 = 32;

impl EntityShape for Probe {
    fn bindings() -> Vec<FieldBinding<Self>> {
        vec![
            FieldBinding::new("Flag", |p: &Probe| &p.flag, |p, v| p.flag = v),
            FieldBinding::new("Tiny", |p: &Probe| &p.tiny, |p, v| p.tiny = v),
            FieldBinding::new("Small", |p: &Probe| &p.small, |p, v| p.small = v),
            FieldBinding::new("Medium", |p: &Probe| &p.medium, |p, v| p.medium = v),
            FieldBinding::new("Large", |p: &Probe| &p.large, |p, v| p.large = v),
            FieldBinding::new("Byte", |p: &Probe| &p.byte, |p, v| p.byte = v),
            FieldBinding::new("Word", |p: &Probe| &p.word, |p, v| p.word = v),
            FieldBinding::new("Dword", |p: &Probe| &p.dword, |p, v| p.dword = v),
            FieldBinding::new("Qword", |p: &Probe| &p.qword, |p, v| p.qword = v),
            FieldBinding::new("Single", |p: &Probe| &p.single, |p, v| p.single = v),
            FieldBinding::new("Double", |p: &Probe| &p.double, |p, v| p.double = v),
            FieldBinding::new("Stamp", |p: &Probe| &p.stamp, |p, v| p.stamp = v),
            FieldBinding::new("Text", |p: &Probe| &p.text, |p, v| p.text = v),
            FieldBinding::new("Blob", |p: &Probe| &p.blob, |p, v| p.blob = v),
            FieldBinding::new("OptFlag", |p: &Probe| &p.opt_flag, |p, v| p.opt_flag = v),
            FieldBinding::new("OptLarge", |p: &Probe| &p.opt_large, |p, v| p.opt_large = v),
            FieldBinding::new("OptQword", |p: &Probe| &p.opt_qword, |p, v| p.opt_qword = v),
            FieldBinding::new("OptDouble", |p: &Probe| &p.opt_double, |p, v| {
                p.opt_double = v
            }),
            FieldBinding::new("OptStamp", |p: &Probe| &p.opt_stamp, |p, v| p.opt_stamp = v),
            FieldBinding::new("OptText", |p: &Probe| &p.opt_text, |p, v| p.opt_text = v),
            FieldBinding::new("OptBlob", |p: &Probe| &p.opt_blob, |p, v| p.opt_blob = v),
        ]
    }

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }
}

/// Creates a registry with the built-ins, `Widget`, `Gadget` and `Probe`.
pub fn sample_registry() -> Arc<InMemorySchemaRegistry> {
    let registry = Arc::new(InMemorySchemaRegistry::with_builtins());
    registry.register_field(FieldDescriptor::new(WIDGET_NAME, "Name", FieldKind::String));
    registry.register_field(
        FieldDescriptor::new(WIDGET_WEIGHT, "Weight", FieldKind::U32).nullable(true),
    );
    registry.register_field(
        FieldDescriptor::new(WIDGET_ACTIVE, "Active", FieldKind::Bool).instanceable(false),
    );
    registry.register_field(FieldDescriptor::new(GADGET_LABEL, "Label", FieldKind::String));
    registry.register_definition(Definition::entity(
        WIDGET,
        "Widget",
        vec![WIDGET_NAME, WIDGET_WEIGHT, WIDGET_ACTIVE],
    ));
    registry.register_definition(Definition::entity(GADGET, "Gadget", vec![GADGET_LABEL]));

    let mut probe_fields = Vec::with_capacity(PROBE_FIELDS.len());
    for (offset, (name, kind, nullable)) in (0u64..).zip(PROBE_FIELDS) {
        let id = FieldId::new(PROBE_FIRST_FIELD + offset);
        registry.register_field(FieldDescriptor::new(id, name, kind).nullable(nullable));
        probe_fields.push(id);
    }
    registry.register_definition(Definition::entity(PROBE, "Probe", probe_fields));
    registry
}

/// Creates the type map for `Widget` and `Probe`. `Gadget` stays unmapped.
pub fn sample_types() -> TypeMap {
    let mut types = TypeMap::new();
    types.register::<Widget>("Widget").register::<Probe>("Probe");
    types
}

/// One observed cache hook call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookEvent {
    /// `on_cache_add`
    Add(DefinitionId, EntityId),
    /// `on_cache_update`
    Update(DefinitionId, EntityId),
    /// `on_cache_remove`
    Remove(DefinitionId, EntityId),
}

/// Cache hooks that record every call.
#[derive(Debug, Clone, Default)]
pub struct RecordingHooks {
    events: Arc<Mutex<Vec<HookEvent>>>,
}

impl RecordingHooks {
    /// Returns the events seen so far.
    pub fn events(&self) -> Vec<HookEvent> {
        self.events.lock().clone()
    }

    /// Forgets the events seen so far.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl CacheHooks for RecordingHooks {
    fn on_cache_add(&mut self, definition: &Definition, record: &dyn DynRecord) {
        self.events
            .lock()
            .push(HookEvent::Add(definition.id, record.record_meta().id));
    }

    fn on_cache_update(&mut self, definition: &Definition, record: &dyn DynRecord) {
        self.events
            .lock()
            .push(HookEvent::Update(definition.id, record.record_meta().id));
    }

    fn on_cache_remove(&mut self, definition: &Definition, record: &dyn DynRecord) {
        self.events
            .lock()
            .push(HookEvent::Remove(definition.id, record.record_meta().id));
    }
}

/// Block listener that keeps every block.
#[derive(Debug, Clone, Default)]
pub struct BlockLog {
    blocks: Arc<Mutex<Vec<Block>>>,
}

impl BlockLog {
    /// Returns the blocks seen so far.
    pub fn blocks(&self) -> Vec<Block> {
        self.blocks.lock().clone()
    }

    /// Returns the number of blocks seen so far.
    pub fn len(&self) -> usize {
        self.blocks.lock().len()
    }

    /// Returns true if no block was seen.
    pub fn is_empty(&self) -> bool {
        self.blocks.lock().is_empty()
    }
}

impl chainlog_core::BlockListener for BlockLog {
    fn on_block_found(&mut self, block: &Block) {
        self.blocks.lock().push(block.clone());
    }
}

/// Installs a test subscriber once. Honors `RUST_LOG`, defaulting to `warn`.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// A writer and a tailing reader sharing one log, with recording hooks.
pub struct TestChain<B: StorageBackend + 'static> {
    /// The shared log.
    pub log: Arc<RwLock<B>>,
    /// The schema registry both sides use.
    pub registry: Arc<InMemorySchemaRegistry>,
    /// Writer appending to the log.
    pub writer: ChainWriter<B>,
    /// Reader tailing the log.
    pub reader: ChainReader<Arc<RwLock<B>>>,
    /// Cache hook calls seen by the reader.
    pub hooks: RecordingHooks,
    /// Blocks seen by the reader.
    pub blocks: BlockLog,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestChain<InMemoryBackend> {
    /// Creates a chain over an in-memory log.
    pub fn memory() -> Self {
        Self::with_backend(InMemoryBackend::new(), &ReaderConfig::default(), None)
    }

    /// Creates a chain over an in-memory log with a custom reader config.
    pub fn memory_with(config: &ReaderConfig) -> Self {
        Self::with_backend(InMemoryBackend::new(), config, None)
    }
}

impl TestChain<FileBackend> {
    /// Creates a chain over a log file in a temporary directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("chain.log");
        let backend =
            FileBackend::open_with_create_dirs(&path).expect("Failed to create log file");
        Self::with_backend(backend, &ReaderConfig::default(), Some(temp_dir))
    }
}

impl<B: StorageBackend + 'static> TestChain<B> {
    fn with_backend(backend: B, config: &ReaderConfig, temp_dir: Option<TempDir>) -> Self {
        init_tracing();
        let log = Arc::new(RwLock::new(backend));
        let registry = sample_registry();
        let hooks = RecordingHooks::default();
        let blocks = BlockLog::default();
        let writer = ChainWriter::new(Arc::clone(&log), registry.clone());
        let reader = ChainReader::new(Arc::clone(&log), registry.clone(), sample_types(), config)
            .with_hooks(hooks.clone())
            .with_listener(blocks.clone());
        Self {
            log,
            registry,
            writer,
            reader,
            hooks,
            blocks,
            _temp_dir: temp_dir,
        }
    }

    /// Polls the reader, panicking on error.
    pub fn poll(&mut self) -> PollSummary {
        self.reader.poll().expect("Failed to poll chain")
    }

    /// Returns the current log size.
    pub fn log_size(&self) -> u64 {
        self.log.read().size().expect("Failed to read log size")
    }

    /// Returns the widget cache set, if any widget was referenced.
    pub fn widgets(&self) -> Option<&CacheSet<Widget>> {
        self.reader.applier().cache_set::<Widget>(WIDGET)
    }

    /// Returns a live widget.
    pub fn widget(&self, id: EntityId) -> Option<Arc<Widget>> {
        self.widgets().and_then(|set| set.get(id))
    }
}
