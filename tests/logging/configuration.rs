//! Configuration Tests
//!
//! `LoggerConfig` loaded from JSON drives the builder end to end.

use crate::*;
use tempfile::tempdir;

#[test]
fn test_json_file_configures_logger() {
    init_tracing();
    let dir = tempdir().unwrap();
    let path = dir.path().join("fastlog.json");
    std::fs::write(
        &path,
        r#"{
            "capacity": 128,
            "sequencer": "single_claimer",
            "cells": "unchecked",
            "waiting": { "kind": "spin" },
            "catalog_capacity": 16,
            "drainer": { "spins_per_cycle": 4, "thread_name": "json-drainer" }
        }"#,
    )
    .unwrap();

    let config: LoggerConfig =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let sink = MemorySink::new(1024).unwrap();
    let handle = sink.handle();
    let logger = FastLogger::builder().config(config).sink(sink).build().unwrap();

    assert_eq!(logger.ring().length(), 128);
    assert_eq!(logger.catalog().capacity(), 16);
    assert_eq!(logger.config().drainer.thread_name, "json-drainer");

    logger.start_draining().unwrap();
    assert!(logger.is_draining());
    let mut producer = logger.register_producer().unwrap();
    for i in 0..1000 {
        submit_retrying(&mut producer, "configured %d", &[i]);
    }
    let stats = logger.stop_draining().unwrap();
    assert!(!logger.is_draining());
    assert_eq!(stats.records, 1000);
    assert_eq!(handle.records().unwrap().len(), 1000);
    assert!(handle.is_closed());
}

#[test]
fn test_invalid_config_rejected_at_build() {
    let config: LoggerConfig = serde_json::from_str(r#"{ "capacity": 100 }"#).unwrap();
    let err = FastLogger::builder()
        .config(config)
        .sink(DiscardSink::new(64).unwrap())
        .build()
        .unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));

    let config: LoggerConfig =
        serde_json::from_str(r#"{ "drainer": { "idle_min": { "secs": 5, "nanos": 0 } } }"#).unwrap();
    assert!(FastLogger::builder()
        .config(config)
        .sink(DiscardSink::new(64).unwrap())
        .build()
        .is_err());
}

#[test]
fn test_unknown_selector_fails_to_parse() {
    assert!(serde_json::from_str::<LoggerConfig>(r#"{ "sequencer": "many_claimers" }"#).is_err());
    assert!(
        serde_json::from_str::<LoggerConfig>(r#"{ "waiting": { "kind": "sleep" } }"#).is_err()
    );
}

#[test]
fn test_missing_sink_is_a_configuration_error() {
    let err = FastLogger::builder().capacity(16).build().unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}

#[test]
fn test_cell_store_kinds_all_deliver() {
    for cells in [CellStoreKind::Checked, CellStoreKind::Unchecked, CellStoreKind::Mapped] {
        let sink = MemorySink::new(512).unwrap();
        let handle = sink.handle();
        let logger = FastLogger::builder()
            .capacity(16)
            .cells(cells)
            .drainer(fast_drainer())
            .sink(sink)
            .build()
            .unwrap();
        logger.start_draining().unwrap();
        let mut producer = logger.register_producer().unwrap();
        for i in 0..64 {
            submit_retrying(&mut producer, "%d", &[i]);
        }
        logger.stop_draining().unwrap();
        assert_eq!(handle.records().unwrap().len(), 64, "{:?}", cells);
    }
}
