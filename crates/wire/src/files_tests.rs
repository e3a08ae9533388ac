// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn chunk_payload_round_trips_with_base64_data() {
    let payload = ChunkedUploadPayload {
        file_name: "world.zip".into(),
        file_size: 6,
        total_chunks: 2,
        chunk_index: 1,
        chunk_data: vec![1, 2, 3],
        volume_name: Some("data".into()),
        destination_path: "/worlds".into(),
        file_mode: Some(0o644),
    };
    let json = serde_json::to_string(&payload).unwrap();
    assert!(json.contains("\"chunkData\":\"AQID\""));
    let back: ChunkedUploadPayload = serde_json::from_str(&json).unwrap();
    assert_eq!(back.chunk_data, vec![1, 2, 3]);
    assert_eq!(back.chunk_index, 1);
}

#[test]
fn backend_defaults_to_container() {
    let req: ListFilesRequest = serde_json::from_str(
        r#"{"organizationId":"org1","workloadId":"deploy-1","path":"/"}"#,
    )
    .unwrap();
    assert_eq!(req.backend, FileBackend::Container);
    assert_eq!(req.cursor, None);
    assert_eq!(req.page_size, None);
}

#[test]
fn create_entry_kind_names() {
    assert_eq!(serde_json::to_string(&CreateEntryKind::Symlink).unwrap(), "\"symlink\"");
    let kind: CreateEntryKind = serde_json::from_str("\"directory\"").unwrap();
    assert_eq!(kind, CreateEntryKind::Directory);
}

#[test]
fn invalid_chunk_data_is_rejected() {
    let err = serde_json::from_str::<ChunkedUploadPayload>(
        r#"{"fileName":"a","fileSize":1,"totalChunks":1,"chunkIndex":0,
            "chunkData":"not base64!!","destinationPath":"/"}"#,
    );
    assert!(err.is_err());
}
