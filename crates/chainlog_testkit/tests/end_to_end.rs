//! Instantiate, update and archive one widget, then seal the block.

use chainlog_codec::{Timestamp, WireValue};
use chainlog_core::{
    ApplyOutcome, BlockId, ChainReader, CoreResult, EntityId, IgnoreReason, PollSummary,
    ReaderConfig, ScanSink, Scanner, Transaction, TransactionApplier,
};
use chainlog_storage::InMemoryBackend;
use chainlog_testkit::prelude::*;
use parking_lot::RwLock;
use std::sync::Arc;

fn reader_over(bytes: Vec<u8>) -> (ChainReader<Arc<RwLock<InMemoryBackend>>>, RecordingHooks, BlockLog) {
    init_tracing();
    let hooks = RecordingHooks::default();
    let blocks = BlockLog::default();
    let log = Arc::new(RwLock::new(InMemoryBackend::with_data(bytes)));
    let reader = ChainReader::new(log, sample_registry(), sample_types(), &ReaderConfig::default())
        .with_hooks(hooks.clone())
        .with_listener(blocks.clone());
    (reader, hooks, blocks)
}

#[test]
fn widget_lifecycle_from_raw_stream() {
    let ts = Timestamp::from_ticks(5_000);
    let id = EntityId::new(5_000);
    let mut stream = StreamBuilder::new();
    stream
        .instantiate(WIDGET, ts, &[(WIDGET_NAME, text("A"))])
        .set_fields(id, WIDGET, Timestamp::from_ticks(5_001), &[(WIDGET_NAME, text("B"))])
        .archive(id, WIDGET, Timestamp::from_ticks(5_002))
        .boundary();

    let (mut reader, hooks, blocks) = reader_over(stream.build());
    let summary = reader.poll().unwrap();

    assert_eq!(
        summary,
        PollSummary {
            blocks: 1,
            transactions: 4,
            offset: stream.len() as u64,
            halted: false,
        }
    );
    assert_eq!(
        hooks.events(),
        vec![
            HookEvent::Add(WIDGET, id),
            HookEvent::Update(WIDGET, id),
            HookEvent::Remove(WIDGET, id),
        ]
    );

    let blocks = blocks.blocks();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].id, BlockId::new(1));
    assert_eq!(blocks[0].range, 0..stream.len() as u64);
    assert_eq!(&blocks[0].bytes[..], stream.bytes());

    let set = reader.applier().cache_set::<Widget>(WIDGET).unwrap();
    assert!(set.get(id).is_none());
    let archived = set.get_archived(id).unwrap();
    assert_eq!(archived.name, "B");
    assert_eq!(archived.meta.created, ts);
    assert_eq!(archived.meta.edited, Timestamp::from_ticks(5_002));
    assert!(reader.partial_block().is_empty());
}

#[test]
fn widget_lifecycle_through_writer() {
    let mut chain = TestChain::memory();
    let mut widget = Widget {
        weight: Some(12),
        ..Widget::named("A")
    };
    let id = chain.writer.instantiate(WIDGET, &widget).unwrap();
    widget.name = "B".into();
    chain.writer.set_fields(id, WIDGET, &widget, &["Name"]).unwrap();

    chain.poll();
    let live = chain.widget(id).unwrap();
    assert_eq!(live.name, "B");
    assert_eq!(live.weight, Some(12));
    assert_eq!(live.meta.id, id);
    assert_eq!(live.meta.created.ticks() as u64, id.as_u64());
    assert!(live.meta.edited > live.meta.created);

    chain.writer.archive(id, WIDGET).unwrap();
    chain.writer.seal_block().unwrap();
    chain.poll();

    assert!(chain.widget(id).is_none());
    assert_eq!(
        chain.hooks.events(),
        vec![
            HookEvent::Add(WIDGET, id),
            HookEvent::Update(WIDGET, id),
            HookEvent::Remove(WIDGET, id),
        ]
    );
    assert_eq!(chain.blocks.len(), 1);
    assert_eq!(chain.blocks.blocks()[0].id, BlockId::new(1));
}

#[test]
fn unmapped_type_is_ignored_without_hooks() {
    let ts = Timestamp::from_ticks(77);
    let mut stream = StreamBuilder::new();
    stream
        .instantiate(GADGET, ts, &[(GADGET_LABEL, text("g"))])
        .set_fields(EntityId::new(77), GADGET, Timestamp::from_ticks(78), &[(GADGET_LABEL, text("h"))])
        .archive(EntityId::new(77), GADGET, Timestamp::from_ticks(79))
        .boundary();

    let (mut reader, hooks, blocks) = reader_over(stream.build());
    let summary = reader.poll().unwrap();

    assert_eq!(summary.transactions, 4);
    assert!(hooks.events().is_empty());
    assert_eq!(blocks.len(), 1);
    assert!(reader.applier().caches().is_unresolved(GADGET));
}

#[test]
fn updates_to_missing_records_are_ignored() {
    let mut stream = StreamBuilder::new();
    stream
        .set_fields(EntityId::new(1), WIDGET, Timestamp::from_ticks(2), &[(WIDGET_ACTIVE, WireValue::Inline(1))])
        .archive(EntityId::new(1), WIDGET, Timestamp::from_ticks(3))
        .boundary();

    let (mut reader, hooks, _) = reader_over(stream.build());
    reader.poll().unwrap();
    assert!(hooks.events().is_empty());
}

struct OutcomeSink<'a> {
    applier: &'a mut TransactionApplier,
    outcomes: Vec<ApplyOutcome>,
}

impl ScanSink for OutcomeSink<'_> {
    fn extend_block(&mut self, _bytes: &[u8]) {}

    fn transaction(&mut self, txn: Transaction) -> CoreResult<()> {
        self.outcomes.push(self.applier.apply(&txn)?);
        Ok(())
    }
}

#[test]
fn applier_reports_each_outcome() {
    let registry = sample_registry();
    let mut applier = TransactionApplier::new(registry.clone(), sample_types());
    let mut scanner = Scanner::new(registry, &ReaderConfig::default());
    let id = EntityId::new(40);

    let mut stream = StreamBuilder::new();
    stream
        .instantiate(WIDGET, Timestamp::from_ticks(40), &[(WIDGET_NAME, text("x"))])
        .set_fields(id, WIDGET, Timestamp::from_ticks(41), &[(WIDGET_ACTIVE, WireValue::Inline(1))])
        .archive(id, WIDGET, Timestamp::from_ticks(42))
        .archive(id, WIDGET, Timestamp::from_ticks(43))
        .boundary();

    let mut sink = OutcomeSink {
        applier: &mut applier,
        outcomes: Vec::new(),
    };
    let step = scanner.scan(stream.bytes(), &mut sink).unwrap();
    assert_eq!(step.consumed, stream.len());
    assert_eq!(
        sink.outcomes,
        vec![
            ApplyOutcome::Created(id),
            ApplyOutcome::Updated(id),
            ApplyOutcome::Archived(id),
            ApplyOutcome::Ignored(IgnoreReason::MissingTarget(id)),
            ApplyOutcome::PassThrough,
        ]
    );
    assert_eq!(applier.applied(), 5);
}
