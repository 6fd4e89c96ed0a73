//! Concurrency Tests
//!
//! Randomized multi-producer runs against a small ring so claims wrap and
//! contend. Every record carries its producer and sequence number; the
//! drained stream must contain each exactly once, in per-producer order,
//! with no torn arguments.

use crate::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::sync::{Arc, Barrier};
use std::thread;

const FORMATS: &[(&str, usize)] = &[
    ("t=%d s=%d", 0),
    ("t=%d s=%d a=%d", 1),
    ("t=%d s=%d a=%d b=%d c=%d", 3),
];

fn run_producers(logger: Arc<FastLogger>, producers: usize, per_producer: usize, seed: u64) {
    let barrier = Arc::new(Barrier::new(producers));
    let handles: Vec<_> = (0..producers)
        .map(|t| {
            let logger = Arc::clone(&logger);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(seed ^ t as u64);
                let mut producer = logger.register_producer().unwrap();
                barrier.wait();
                for seq in 0..per_producer {
                    let (format, extra) = FORMATS[rng.gen_range(0..FORMATS.len())];
                    let mut args = vec![t as i64, seq as i64];
                    args.extend((0..extra).map(|k| (seq * 10 + k) as i64));
                    submit_retrying(&mut producer, format, &args);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}

fn assert_exactly_once(records: &[Record], producers: usize, per_producer: usize) {
    let mut by_producer: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
    for record in records {
        assert_eq!(record.header.kind, RecordKind::LogRecord);
        assert_eq!(record.arguments.len(), record.header.argument_count as usize);
        let t = record.i64_argument(0).unwrap();
        let seq = record.i64_argument(1).unwrap();
        for (k, word) in record.arguments[2..].iter().enumerate() {
            assert_eq!(*word as i64, seq * 10 + k as i64, "torn record from producer {}", t);
        }
        by_producer.entry(t).or_default().push(seq);
    }

    assert_eq!(by_producer.len(), producers);
    let expected: Vec<i64> = (0..per_producer as i64).collect();
    for (t, seqs) in by_producer {
        assert_eq!(seqs, expected, "producer {} lost, duplicated or reordered records", t);
    }
}

#[test]
fn test_multi_producer_exactly_once() {
    let mut rng = rand::thread_rng();
    for _ in 0..4 {
        let seed: u64 = rng.gen();
        let producers = rng.gen_range(2..=6);
        let per_producer = rng.gen_range(500..2000);
        let capacity = 1 << rng.gen_range(5..=8);
        tracing::info!(seed, producers, per_producer, capacity, "stress round");

        let (logger, handle) = memory_logger(
            capacity,
            SequencerKind::MultiClaimer,
            WaitingStrategyKind::LimitedSpin { max_tries: 64 },
        );
        logger.start_draining().unwrap();
        let logger = Arc::new(logger);

        run_producers(Arc::clone(&logger), producers, per_producer, seed);
        let stats = logger.stop_draining().unwrap();

        let records = handle.records().unwrap();
        assert_eq!(records.len(), producers * per_producer);
        assert_eq!(stats.records, records.len() as u64);
        assert_eq!(stats.corrupted, 0);
        assert_eq!(stats.oversized, 0);
        assert_exactly_once(&records, producers, per_producer);
        assert_eq!(logger.ring().claimed(), 0);
    }
}

#[test]
fn test_single_claimer_with_background_drainer() {
    let (logger, handle) = memory_logger(32, SequencerKind::SingleClaimer, WaitingStrategyKind::Spin);
    logger.start_draining().unwrap();
    let logger = Arc::new(logger);

    run_producers(Arc::clone(&logger), 1, 5000, 7);
    logger.stop_draining().unwrap();

    assert_exactly_once(&handle.records().unwrap(), 1, 5000);
}

#[test]
fn test_one_shot_messages_and_timestamps_interleave() {
    let (logger, handle) = memory_logger(
        64,
        SequencerKind::MultiClaimer,
        WaitingStrategyKind::LimitedSpin { max_tries: 256 },
    );
    logger.start_draining().unwrap();
    let logger = Arc::new(logger);

    let writers: Vec<_> = (0..4i64)
        .map(|t| {
            let logger = Arc::clone(&logger);
            thread::spawn(move || {
                for seq in 0..300i64 {
                    loop {
                        let mut cursor = logger.message("one-shot %d %d").unwrap();
                        match cursor.start() {
                            Ok(cursor) => {
                                cursor.with(t).unwrap().with(seq).unwrap().submit().unwrap();
                                break;
                            }
                            Err(e) => {
                                assert!(e.is_retryable());
                                thread::yield_now();
                            }
                        }
                    }
                }
            })
        })
        .collect();
    let clock = {
        let logger = Arc::clone(&logger);
        thread::spawn(move || {
            let mut published = 0;
            while published < 50 {
                if logger.timestamp_now().is_ok() {
                    published += 1;
                }
                thread::yield_now();
            }
        })
    };
    for writer in writers {
        writer.join().unwrap();
    }
    clock.join().unwrap();
    logger.stop_draining().unwrap();

    let records = handle.records().unwrap();
    let (stamps, messages): (Vec<_>, Vec<_>) = records
        .into_iter()
        .partition(|r| r.header.kind == RecordKind::Timestamp);
    assert_eq!(stamps.len(), 50);
    assert!(stamps.windows(2).all(|w| w[0].arguments[0] <= w[1].arguments[0]));
    assert_exactly_once(&messages, 4, 300);
}
