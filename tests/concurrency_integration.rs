//! Integration tests for the delivery actor and consumers running in parallel
//!
//! These tests validate:
//! - A consumer never observes data mixed from two deliveries
//! - Unrelated consumers make progress while one consumer holds its lock
//! - Processing requests are coalesced under load

mod common;

use common::builders::{ItemBuilder, StructureBuilder};
use common::{source_time, LOCK_WAIT_LIMIT};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Instant;
use uabridge::{DataValue, ProcessReason, TimestampSource};

const DELIVERIES: i64 = 2_000;

fn delivery(n: i64) -> DataValue {
    let value = StructureBuilder::new()
        .field(
            "pair",
            StructureBuilder::new()
                .field("samples", vec![n, n, n, n])
                .field("label", format!("n{}", n))
                .build(),
        )
        .build();
    DataValue::new(value).with_source_timestamp(source_time(n))
}

#[test]
fn test_no_torn_reads() {
    let linked = ItemBuilder::new("X").link("samples", "pair.samples").build();
    let item = Arc::clone(&linked.item);
    let connector = Arc::clone(linked.connector("samples"));
    let done = Arc::new(AtomicBool::new(false));

    let producer = {
        let done = Arc::clone(&done);
        thread::spawn(move || {
            for n in 0..DELIVERIES {
                item.set_incoming(Some(&delivery(n)), ProcessReason::FreshData);
            }
            done.store(true, Ordering::Release);
        })
    };

    let mut observed = 0;
    let mut last = -1i64;
    while !done.load(Ordering::Acquire) || connector.lock().has_incoming() {
        let mut state = connector.lock();
        if !state.has_incoming() {
            continue;
        }
        let mut samples = [0i64; 4];
        assert_eq!(state.read_array(&mut samples).unwrap(), 4);
        let ts = state.read_timestamp(TimestampSource::Source).unwrap();
        state.clear_incoming();
        drop(state);

        let n = samples[0];
        assert!(samples.iter().all(|&s| s == n), "torn read: {:?}", samples);
        assert_eq!(ts, source_time(n));
        assert!(n > last, "deliveries went backwards: {} after {}", n, last);
        last = n;
        observed += 1;
    }

    producer.join().unwrap();
    assert!(observed > 0);
    assert_eq!(last, DELIVERIES - 1);
}

#[test]
fn test_unrelated_consumers_do_not_block() {
    let linked = ItemBuilder::new("X")
        .link("left", "pair.samples")
        .link("right", "pair.label")
        .build();
    linked
        .item
        .set_incoming(Some(&delivery(1)), ProcessReason::FreshData);

    let left = Arc::clone(linked.connector("left"));
    let right = Arc::clone(linked.connector("right"));
    let barrier = Arc::new(Barrier::new(2));

    let holder = {
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            let _guard = left.lock();
            barrier.wait();
            // keep the lock until the other consumer is done
            barrier.wait();
        })
    };

    barrier.wait();
    let start = Instant::now();
    let label = right.lock().read_text().unwrap();
    assert_eq!(label, "n1");
    assert!(start.elapsed() < LOCK_WAIT_LIMIT);
    barrier.wait();
    holder.join().unwrap();
}

#[test]
fn test_requests_coalesced_under_load() {
    let linked = ItemBuilder::new("X")
        .link("samples", "pair.samples")
        .link("label", "pair.label")
        .build();
    for n in 0..100 {
        linked
            .item
            .set_incoming(Some(&delivery(n)), ProcessReason::FreshData);
    }
    // one outstanding request per consumer
    let mut records = linked.drain();
    records.sort();
    assert_eq!(records, vec!["label", "samples"]);

    // the consumer sees the latest value only
    let state = linked.connector("label").lock();
    assert_eq!(state.read_text().unwrap(), "n99");
}
