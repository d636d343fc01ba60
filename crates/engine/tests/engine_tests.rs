//! Integration tests for the streaming engine
//!
//! Drives the full dispatcher loop against the scripted mock backend.

use engine::test_utils::MockBackend;
use engine::{EngineError, OutputSink, StopCondition, StreamEngine, TransferStatus};
use std::sync::atomic::AtomicBool;
use std::time::Duration;

fn leaked_flag() -> &'static AtomicBool {
    Box::leak(Box::new(AtomicBool::new(false)))
}

fn packet(data: &[u8]) -> Vec<u8> {
    let mut p = vec![0x01, 0x60];
    p.extend_from_slice(data);
    p
}

/// Eight slots, three full rounds, strict round-robin delivery: the output
/// must be the 24 payload chunks concatenated in round-major, slot-minor
/// order.
#[test]
fn test_three_rounds_round_robin() {
    const SLOTS: usize = 8;
    const ROUNDS: usize = 3;

    let flag = leaked_flag();
    let mut backend = MockBackend::new(SLOTS).with_stop_flag(flag);

    let mut expected = Vec::new();
    for round in 0..ROUNDS {
        for slot in 0..SLOTS {
            let base = (round * SLOTS + slot) as u8;
            let data = [base, base, base, base];
            backend.push_fifo(packet(&data));
            expected.extend_from_slice(&data);
        }
    }

    let mut out = Vec::new();
    let mut engine = StreamEngine::new(
        backend,
        OutputSink::new(&mut out),
        StopCondition::Signal(flag),
        SLOTS,
        512,
    );

    engine.run().unwrap();
    assert_eq!(engine.bytes_emitted(), (SLOTS * ROUNDS * 4) as u64);
    drop(engine);
    assert_eq!(out, expected);
}

/// Slot 1 completing before slot 0 is an unrecoverable ordering violation,
/// reported with the exact (expected, got) pair, and nothing is emitted.
#[test]
fn test_swapped_completions_abort() {
    let flag = leaked_flag();
    let mut backend = MockBackend::new(2).with_stop_flag(flag);
    backend.push_from_slot(1, packet(&[0x11, 0x22]));
    backend.push_from_slot(0, packet(&[0x33, 0x44]));

    let mut out = Vec::new();
    let mut engine = StreamEngine::new(
        backend,
        OutputSink::new(&mut out),
        StopCondition::Signal(flag),
        2,
        512,
    );

    match engine.run() {
        Err(EngineError::OrderingViolation { expected, got }) => {
            assert_eq!(expected, 0);
            assert_eq!(got, 1);
        }
        other => panic!("expected ordering violation, got {:?}", other),
    }
    drop(engine);
    assert!(out.is_empty());
}

/// A stop signal observed mid-run ends resubmission, the pool drains
/// completely, and everything that completed before the signal stays in
/// the output.
#[test]
fn test_stop_signal_drains_and_keeps_earlier_bytes() {
    const SLOTS: usize = 4;

    let flag = leaked_flag();
    let mut backend = MockBackend::new(SLOTS).with_stop_flag(flag);
    // One full round plus two completions of the next round, then the
    // mock raises the flag and drains the rest with status-only packets.
    for i in 0..(SLOTS + 2) {
        backend.push_fifo(packet(&[i as u8]));
    }

    let mut out = Vec::new();
    let mut engine = StreamEngine::new(
        backend,
        OutputSink::new(&mut out),
        StopCondition::Signal(flag),
        SLOTS,
        512,
    );

    engine.run().unwrap();
    assert_eq!(engine.bytes_emitted(), (SLOTS + 2) as u64);
    // Initial round plus one resubmit per completion handled before the
    // flag went up; the drain itself submits nothing.
    assert_eq!(engine.backend().submissions(), SLOTS + (SLOTS + 2));
    drop(engine);
    assert_eq!(out, vec![0, 1, 2, 3, 4, 5]);
}

/// A cancellation surfacing mid-drain releases its slot but still consumes
/// its sequence number, so the remaining completions validate and their
/// data is kept.
#[test]
fn test_cancelled_during_drain_keeps_draining() {
    let mut backend = MockBackend::new(2);
    backend.push_status(TransferStatus::Cancelled);
    backend.push_fifo(packet(&[0xC4]));

    let mut out = Vec::new();
    let mut engine = StreamEngine::new(
        backend,
        OutputSink::new(&mut out),
        StopCondition::Duration(Duration::ZERO),
        2,
        512,
    );

    engine.run().unwrap();
    assert_eq!(engine.bytes_emitted(), 1);
    drop(engine);
    assert_eq!(out, vec![0xC4]);
}

/// A non-success completion status is fatal and names the slot.
#[test]
fn test_error_status_is_fatal() {
    let flag = leaked_flag();
    let mut backend = MockBackend::new(2).with_stop_flag(flag);
    backend.push_fifo(packet(&[0xAB]));
    backend.push_status(TransferStatus::Stall);

    let mut out = Vec::new();
    let mut engine = StreamEngine::new(
        backend,
        OutputSink::new(&mut out),
        StopCondition::Signal(flag),
        2,
        512,
    );

    match engine.run() {
        Err(EngineError::TransferStatus { slot, status }) => {
            assert_eq!(slot, 1);
            assert_eq!(status, TransferStatus::Stall);
        }
        other => panic!("expected transfer status error, got {:?}", other),
    }
    // The first completion was already validated and emitted.
    drop(engine);
    assert_eq!(out, vec![0xAB]);
}

/// Failure of one of the initial submissions is fatal before any data moves.
#[test]
fn test_initial_submission_failure() {
    let flag = leaked_flag();
    let backend = MockBackend::new(4).with_stop_flag(flag).fail_submission_at(2);

    let mut out = Vec::new();
    let mut engine = StreamEngine::new(
        backend,
        OutputSink::new(&mut out),
        StopCondition::Signal(flag),
        4,
        512,
    );

    match engine.run() {
        Err(EngineError::Submission { slot, .. }) => assert_eq!(slot, 2),
        other => panic!("expected submission failure, got {:?}", other),
    }
    drop(engine);
    assert!(out.is_empty());
}

/// A resubmission rejected mid-stream is just as fatal as an initial one.
#[test]
fn test_resubmission_failure_is_fatal() {
    const SLOTS: usize = 2;

    let flag = leaked_flag();
    let mut backend = MockBackend::new(SLOTS)
        .with_stop_flag(flag)
        // Submissions 0 and 1 are the initial round; 2 is the first resubmit.
        .fail_submission_at(SLOTS);
    backend.push_fifo(packet(&[0x01]));

    let mut out = Vec::new();
    let mut engine = StreamEngine::new(
        backend,
        OutputSink::new(&mut out),
        StopCondition::Signal(flag),
        SLOTS,
        512,
    );

    match engine.run() {
        Err(EngineError::Submission { slot, .. }) => assert_eq!(slot, 0),
        other => panic!("expected submission failure, got {:?}", other),
    }
}

/// With a zero duration budget the engine stops before emitting anything,
/// but still drains the requests it had already submitted.
#[test]
fn test_duration_budget_zero() {
    let mut engine = StreamEngine::new(
        MockBackend::new(3),
        OutputSink::new(Vec::new()),
        StopCondition::Duration(Duration::ZERO),
        3,
        512,
    );

    engine.run().unwrap();
    assert_eq!(engine.bytes_emitted(), 0);
}
