// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sv_core::{ErrorCode, FakeClock};

fn payload(index: u32, data: &[u8]) -> ChunkedUploadPayload {
    ChunkedUploadPayload {
        file_name: "world.zip".into(),
        file_size: 6,
        total_chunks: 3,
        chunk_index: index,
        chunk_data: data.to_vec(),
        volume_name: None,
        destination_path: "/uploads".into(),
        file_mode: None,
    }
}

fn manager() -> (ChunkManager, FakeClock) {
    let clock = FakeClock::new();
    (ChunkManager::new(Arc::new(clock.clone())), clock)
}

#[test]
fn out_of_order_chunks_assemble_in_index_order() {
    let (mgr, _clock) = manager();
    // Arrival order 2, 0, 1; assembly must order by index.
    mgr.store_chunk("gs-1", &payload(2, b"ef")).unwrap();
    mgr.store_chunk("gs-1", &payload(0, b"ab")).unwrap();
    assert!(!mgr.is_complete("gs-1", "world.zip", 3));
    mgr.store_chunk("gs-1", &payload(1, b"cd")).unwrap();
    assert!(mgr.is_complete("gs-1", "world.zip", 3));

    let assembled = mgr.assemble("gs-1", "world.zip", 3).unwrap();
    assert_eq!(assembled, b"abcdef");

    mgr.remove("gs-1", "world.zip");
    assert!(mgr.is_empty());
}

#[test]
fn duplicate_chunk_is_a_no_op() {
    let (mgr, _clock) = manager();
    let first = mgr.store_chunk("gs-1", &payload(0, b"ab")).unwrap();
    let second = mgr.store_chunk("gs-1", &payload(0, b"ab")).unwrap();
    assert_eq!(first.bytes_received, 2);
    assert_eq!(second.bytes_received, 2);
    assert_eq!(second.chunks_received, 1);
}

#[test]
fn size_mismatch_fails_assembly() {
    let (mgr, _clock) = manager();
    mgr.store_chunk("gs-1", &payload(0, b"ab")).unwrap();
    mgr.store_chunk("gs-1", &payload(1, b"cd")).unwrap();
    mgr.store_chunk("gs-1", &payload(2, b"efgh")).unwrap();
    let err = mgr.assemble("gs-1", "world.zip", 3).unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidArgument);
    assert!(err.message.contains("size mismatch"));
}

#[test]
fn incomplete_assembly_is_a_precondition_failure() {
    let (mgr, _clock) = manager();
    mgr.store_chunk("gs-1", &payload(0, b"ab")).unwrap();
    let err = mgr.assemble("gs-1", "world.zip", 3).unwrap_err();
    assert_eq!(err.code, ErrorCode::FailedPrecondition);
}

#[test]
fn validation_rejects_bad_payloads() {
    let (mgr, _clock) = manager();
    let mut p = payload(0, b"ab");
    p.file_size = 0;
    assert_eq!(mgr.store_chunk("o", &p).unwrap_err().code, ErrorCode::InvalidArgument);

    let mut p = payload(0, b"ab");
    p.total_chunks = 0;
    assert_eq!(mgr.store_chunk("o", &p).unwrap_err().code, ErrorCode::InvalidArgument);

    let p = payload(3, b"ab");
    assert_eq!(mgr.store_chunk("o", &p).unwrap_err().code, ErrorCode::InvalidArgument);

    let p = payload(0, b"");
    assert_eq!(mgr.store_chunk("o", &p).unwrap_err().code, ErrorCode::InvalidArgument);
}

#[test]
fn sessions_are_keyed_by_owner_and_file() {
    let (mgr, _clock) = manager();
    mgr.store_chunk("gs-1", &payload(0, b"ab")).unwrap();
    mgr.store_chunk("gs-2", &payload(0, b"ab")).unwrap();
    assert_eq!(mgr.len(), 2);
    assert!(mgr.get("gs-1", "world.zip").is_some());
    assert!(mgr.get("gs-1", "other.zip").is_none());
}

#[test]
fn sweep_evicts_idle_sessions_only() {
    let (mgr, clock) = manager();
    mgr.store_chunk("old", &payload(0, b"ab")).unwrap();
    clock.advance(chrono::Duration::minutes(31));
    mgr.store_chunk("fresh", &payload(0, b"ab")).unwrap();

    let evicted = mgr.sweep();
    assert_eq!(evicted, 1);
    assert!(mgr.get("old", "world.zip").is_none());
    assert!(mgr.get("fresh", "world.zip").is_some());
}

#[test]
fn activity_refreshes_ttl() {
    let (mgr, clock) = manager();
    mgr.store_chunk("gs-1", &payload(0, b"ab")).unwrap();
    clock.advance(chrono::Duration::minutes(20));
    mgr.store_chunk("gs-1", &payload(1, b"cd")).unwrap();
    clock.advance(chrono::Duration::minutes(20));
    assert_eq!(mgr.sweep(), 0, "last activity was 20 minutes ago");
}
