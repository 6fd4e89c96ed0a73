//! End-to-End Tests
//!
//! One producer, one drainer, records checked word for word on the far side.

use crate::*;
use fastlog_storage::MappedCells;
use std::sync::Arc;
use tempfile::tempdir;

#[test]
fn test_capacity_16_round_trip() {
    let (logger, handle) = memory_logger(16, SequencerKind::MultiClaimer, WaitingStrategyKind::NoWait);
    let info = logger.lookup("x=%f n=%d").unwrap();
    assert_eq!(info.argument_count(), 2);

    logger
        .message("x=%f n=%d")
        .unwrap()
        .start()
        .unwrap()
        .with(5.0)
        .unwrap()
        .with(7i64)
        .unwrap()
        .submit()
        .unwrap();
    assert_eq!(logger.ring().claimed(), 3);

    logger.start_draining().unwrap();
    let stats = logger.stop_draining().unwrap();
    assert_eq!(stats.records, 1);
    assert_eq!(stats.cells, 3);

    let records = handle.records().unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.header.kind, RecordKind::LogRecord);
    assert_eq!(record.header.format_id, info.format_id());
    assert_eq!(record.header.argument_count, 2);
    assert_eq!(record.arguments, vec![5.0f64.to_bits(), 7]);

    // All 16 cells are free again.
    assert_eq!(logger.ring().claimed(), 0);
    for _ in 0..16 {
        assert!(logger.ring().claim(1).is_some());
    }
    assert!(logger.ring().claim(1).is_none());
}

#[test]
fn test_file_sink_and_reader() {
    init_tracing();
    let dir = tempdir().unwrap();
    let path = dir.path().join("app.records");

    let logger = FastLogger::builder()
        .capacity(64)
        .drainer(fast_drainer())
        .sink(FileSink::open(&path, 256).unwrap())
        .build()
        .unwrap();
    logger.start_draining().unwrap();

    let mut producer = logger.register_producer().unwrap();
    for i in 0..500i64 {
        submit_retrying(&mut producer, "tick %d of %d", &[i, 500]);
        if i % 100 == 0 {
            while let Err(e) = logger.timestamp(i as u64) {
                assert!(e.is_retryable());
                std::thread::yield_now();
            }
        }
    }
    let stats = logger.stop_draining().unwrap();

    let records = RecordReader::open(&path).unwrap().read_all().unwrap();
    assert_eq!(records.len() as u64, stats.records);

    let ticks: Vec<i64> = records
        .iter()
        .filter(|r| r.header.kind == RecordKind::LogRecord)
        .map(|r| r.i64_argument(0).unwrap())
        .collect();
    assert_eq!(ticks, (0..500).collect::<Vec<_>>());
    assert!(records
        .iter()
        .filter(|r| r.header.kind == RecordKind::Timestamp)
        .all(|r| r.arguments.len() == 1));
}

#[test]
fn test_file_backed_cells() {
    init_tracing();
    let dir = tempdir().unwrap();
    let cells = MappedCells::open(dir.path().join("ring.cells"), 32, fastlog_core::NOT_SET).unwrap();
    let sink = MemorySink::new(1024).unwrap();
    let handle = sink.handle();

    let logger = FastLogger::builder()
        .cell_store(Box::new(cells))
        .drainer(fast_drainer())
        .sink(sink)
        .build()
        .unwrap();
    assert_eq!(logger.config().capacity, 32);
    logger.start_draining().unwrap();

    let mut producer = logger.register_producer().unwrap();
    for i in 0..100i64 {
        submit_retrying(&mut producer, "mapped %d", &[i]);
    }
    logger.stop_draining().unwrap();

    let values: Vec<i64> = handle
        .records()
        .unwrap()
        .iter()
        .map(|r| r.i64_argument(0).unwrap())
        .collect();
    assert_eq!(values, (0..100).collect::<Vec<_>>());
}

#[test]
fn test_catalog_through_logger() {
    let (logger, _) = memory_logger(16, SequencerKind::MultiClaimer, WaitingStrategyKind::NoWait);

    let first = logger.lookup("same %d").unwrap();
    let second = logger.lookup("same %d").unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let ids: Vec<u32> = (0..10)
        .map(|i| logger.lookup(&format!("distinct {}", i)).unwrap().format_id())
        .collect();
    assert_eq!(ids, (2..12).collect::<Vec<_>>());
}

#[test]
fn test_argument_types_survive_the_trip() {
    let (logger, handle) = memory_logger(64, SequencerKind::MultiClaimer, WaitingStrategyKind::NoWait);
    logger.start_draining().unwrap();
    logger
        .message("%d %d %d %d %f %d")
        .unwrap()
        .start()
        .unwrap()
        .with(-5i64)
        .unwrap()
        .with(u64::MAX - 1)
        .unwrap()
        .with(-3i32)
        .unwrap()
        .with(7u32)
        .unwrap()
        .with(-0.125)
        .unwrap()
        .with(true)
        .unwrap()
        .submit()
        .unwrap();
    logger.stop_draining().unwrap();

    let record = handle.records().unwrap().remove(0);
    assert_eq!(record.i64_argument(0), Some(-5));
    assert_eq!(record.arguments[1], u64::MAX - 1);
    assert_eq!(record.i64_argument(2), Some(-3));
    assert_eq!(record.arguments[3], 7);
    assert_eq!(record.f64_argument(4), Some(-0.125));
    assert_eq!(record.arguments[5], 1);
}

#[test]
fn test_full_ring_without_drainer() {
    let (logger, _) = memory_logger(8, SequencerKind::MultiClaimer, WaitingStrategyKind::NoWait);
    let mut producer = logger.register_producer().unwrap();

    for _ in 0..4 {
        producer.log("%d").unwrap().with(1i64).unwrap().submit().unwrap();
    }
    let err = producer.log("%d").unwrap_err();
    assert!(matches!(err, Error::ClaimExhausted { size: 2 }));
    assert!(err.is_retryable());
}
