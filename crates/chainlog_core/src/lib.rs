//! # Chainlog Core
//!
//! Incremental materialization of a chain log.
//!
//! This crate provides:
//! - Schema registry: definitions, field descriptors and the bootstrap ids
//! - Boundary scanner: a resumable state machine over the mirrored wire format
//! - Transaction applier: instantiate, set-fields and archive effects
//! - Type cache: per-definition stores of native records
//! - Write path: transaction encoding and a timestamping writer
//! - Tailing reader tying scanner, applier and a growing log together
//!
//! ## Example
//!
//! ```rust
//! use chainlog_core::cache::{EntityShape, FieldBinding, RecordMeta, TypeMap};
//! use chainlog_core::{
//!     ChainReader, ChainWriter, Definition, DefinitionId, FieldDescriptor, FieldId,
//!     FieldKind, InMemorySchemaRegistry, ReaderConfig,
//! };
//! use chainlog_storage::InMemoryBackend;
//! use parking_lot::RwLock;
//! use std::sync::Arc;
//!
//! #[derive(Debug, Clone, Default)]
//! struct Widget {
//!     meta: RecordMeta,
//!     name: String,
//! }
//!
//! impl EntityShape for Widget {
//!     fn bindings() -> Vec<FieldBinding<Self>> {
//!         vec![FieldBinding::new("Name", |w: &Widget| &w.name, |w, v| w.name = v)]
//!     }
//!     fn meta(&self) -> &RecordMeta { &self.meta }
//!     fn meta_mut(&mut self) -> &mut RecordMeta { &mut self.meta }
//! }
//!
//! let widget = DefinitionId::new(9);
//! let registry = Arc::new(InMemorySchemaRegistry::with_builtins());
//! registry.register_field(FieldDescriptor::new(FieldId::new(16), "Name", FieldKind::String));
//! registry.register_definition(Definition::entity(widget, "Widget", vec![FieldId::new(16)]));
//!
//! let log = Arc::new(RwLock::new(InMemoryBackend::new()));
//! let mut writer = ChainWriter::new(Arc::clone(&log), registry.clone());
//! let id = writer.instantiate(widget, &Widget { name: "A".into(), ..Widget::default() }).unwrap();
//! writer.seal_block().unwrap();
//!
//! let mut types = TypeMap::new();
//! types.register::<Widget>("Widget");
//! let mut reader = ChainReader::new(log, registry, types, &ReaderConfig::default());
//! let summary = reader.poll().unwrap();
//! assert_eq!(summary.blocks, 1);
//!
//! let set = reader.applier().cache_set::<Widget>(widget).unwrap();
//! assert_eq!(set.get(id).unwrap().name, "A");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod applier;
mod bootstrap;
pub mod cache;
mod config;
mod error;
mod reader;
pub mod scanner;
mod schema;
mod types;
mod writer;

pub use applier::{ApplyOutcome, IgnoreReason, TransactionApplier};
pub use bootstrap::{NoopSchemaHook, RegistryBootstrap, SchemaHook};
pub use config::ReaderConfig;
pub use error::{CoreError, CoreResult, CorruptionReason, MirroredElement};
pub use reader::{Block, BlockListener, ChainReader, LogSource, NoopListener, PollSummary};
pub use scanner::{
    BlockMark, HaltHandle, ScanSink, ScanState, ScanStatus, ScanStep, Scanner, Transaction,
    TransactionField,
};
pub use schema::{
    bootstrap_definition, builtin_field, ControlKind, Definition, DefinitionKind,
    FieldDescriptor, InMemorySchemaRegistry, SchemaRegistry,
};
pub use types::{BlockId, DefinitionId, EntityId, FieldId};
pub use writer::{ChainWriter, TransactionEncoder};

pub use chainlog_codec::{FieldKind, FieldValue, Timestamp, WireValue};
