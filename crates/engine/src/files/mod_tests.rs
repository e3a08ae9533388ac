// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::harness;
use sv_adapters::engine::ExecOutput;
use sv_core::test_support::LocationBuilder;
use sv_core::ErrorCode;
use sv_storage::LocationRepository as _;
use sv_wire::files::CreateEntryKind;

/// Harness with one running container whose named volume maps to a
/// tempdir.
async fn volume_fixture() -> (crate::test_support::TestHarness, FilesGateway, tempfile::TempDir) {
    let h = harness();
    let dir = tempfile::tempdir().unwrap();
    h.engine.put_running("c1000000", "gs-1");
    h.engine.set_state("c1000000", |s| {
        s.mounts = vec![sv_adapters::engine::MountInfo {
            name: Some("data".into()),
            mount_point: "/data".into(),
            source_host_path: Some(dir.path().to_string_lossy().into_owned()),
            is_named: true,
        }];
    });
    h.store
        .upsert(&LocationBuilder::default().workload("gs-1").container("c1000000").build())
        .await
        .unwrap();
    let lifecycle = h.lifecycle();
    let gateway = FilesGateway::new(
        std::sync::Arc::new(h.engine.clone()),
        lifecycle.registry().clone(),
    );
    (h, gateway, dir)
}

#[tokio::test]
async fn volume_backend_works_when_container_is_stopped() {
    let (h, gateway, _dir) = volume_fixture().await;
    h.engine.stop(&sv_core::ContainerId::new("c1000000"), 1).await.unwrap();

    let target = gateway
        .resolve_backend(
            &WorkloadId::new("gs-1"),
            sv_wire::files::FileBackend::Volume,
            Some("data"),
            None,
            None,
        )
        .await
        .unwrap();
    gateway.write(&target, "/config.yml", b"a: 1", true, None, false).await.unwrap();
    let got = gateway.get(&target, "/config.yml").await.unwrap();
    assert_eq!(got.content, "a: 1");
    assert_eq!(got.encoding, "utf-8");
}

#[tokio::test]
async fn container_backend_requires_running() {
    let (h, gateway, _dir) = volume_fixture().await;
    h.engine.stop(&sv_core::ContainerId::new("c1000000"), 1).await.unwrap();
    let err = gateway
        .resolve_backend(
            &WorkloadId::new("gs-1"),
            sv_wire::files::FileBackend::Container,
            None,
            None,
            None,
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::FailedPrecondition);
}

#[tokio::test]
async fn binary_content_comes_back_base64() {
    let (_h, gateway, _dir) = volume_fixture().await;
    let target = gateway
        .resolve_backend(
            &WorkloadId::new("gs-1"),
            sv_wire::files::FileBackend::Volume,
            Some("data"),
            None,
            None,
        )
        .await
        .unwrap();
    gateway.write(&target, "/blob.bin", &[0u8, 159, 146, 150], true, None, false).await.unwrap();
    let got = gateway.get(&target, "/blob.bin").await.unwrap();
    assert_eq!(got.encoding, "base64");
    assert_eq!(got.size_bytes, 4);
}

#[tokio::test]
async fn list_normalizes_escaping_paths_and_pages() {
    let (_h, gateway, _dir) = volume_fixture().await;
    let target = gateway
        .resolve_backend(
            &WorkloadId::new("gs-1"),
            sv_wire::files::FileBackend::Volume,
            Some("data"),
            None,
            None,
        )
        .await
        .unwrap();
    for name in ["a.txt", "b.txt", "c.txt"] {
        gateway.write(&target, &format!("/{name}"), b"x", true, None, false).await.unwrap();
    }

    let page = gateway.list(&target, "/etc/..", None, None).await.unwrap();
    assert_eq!(page.current_path, "/");
    assert_eq!(page.entries.len(), 3);
    assert!(!page.has_more);

    let page = gateway.list(&target, "/", Some(1), Some(1)).await.unwrap();
    assert_eq!(page.entries.len(), 1);
    assert_eq!(page.entries[0].name, "b.txt");
    assert!(page.has_more);
    assert_eq!(page.next_cursor, Some(2));

    let page = gateway.list(&target, "/", Some(99), Some(0)).await.unwrap();
    assert!(page.entries.is_empty());
    assert!(!page.has_more);
}

#[tokio::test]
async fn upload_round_trips_and_expands_zips() {
    let (_h, gateway, _dir) = volume_fixture().await;
    let target = gateway
        .resolve_backend(
            &WorkloadId::new("gs-1"),
            sv_wire::files::FileBackend::Volume,
            Some("data"),
            None,
            None,
        )
        .await
        .unwrap();

    let inner_zip = archive::build_zip(&[ArchiveEntry::file("mod.jar", b"jar!".to_vec())]).unwrap();
    let upload = archive::build_tar(&[
        ArchiveEntry::file("plain.txt", b"text".to_vec()),
        ArchiveEntry::file("bundle.zip", inner_zip),
    ])
    .unwrap();
    gateway.upload(&target, "/mods", upload).await.unwrap();

    assert_eq!(gateway.get(&target, "/mods/plain.txt").await.unwrap().content, "text");
    assert_eq!(gateway.get(&target, "/mods/bundle/mod.jar").await.unwrap().content, "jar!");
}

#[tokio::test]
async fn archive_then_extract_round_trips() {
    let (_h, gateway, _dir) = volume_fixture().await;
    let target = gateway
        .resolve_backend(
            &WorkloadId::new("gs-1"),
            sv_wire::files::FileBackend::Volume,
            Some("data"),
            None,
            None,
        )
        .await
        .unwrap();

    gateway.write(&target, "/world/level.dat", b"level", true, None, false).await.unwrap();
    gateway.write(&target, "/world/region/r.0.mca", b"region", true, None, false).await.unwrap();

    let archive_path =
        gateway.archive(&target, &["/world".to_string()], "/backups", false).await.unwrap();
    assert_eq!(archive_path, "/backups/world.zip");

    gateway.extract(&target, &archive_path, "/restore").await.unwrap();
    assert_eq!(
        gateway.get(&target, "/restore/world/level.dat").await.unwrap().content,
        "level"
    );
    assert_eq!(
        gateway.get(&target, "/restore/world/region/r.0.mca").await.unwrap().content,
        "region"
    );
}

#[tokio::test]
async fn delete_rules_apply_per_backend() {
    let (_h, gateway, _dir) = volume_fixture().await;
    let target = gateway
        .resolve_backend(
            &WorkloadId::new("gs-1"),
            sv_wire::files::FileBackend::Volume,
            Some("data"),
            None,
            None,
        )
        .await
        .unwrap();
    gateway.create_entry(&target, "/logs", CreateEntryKind::Directory, None).await.unwrap();

    let err = gateway.delete(&target, &["/logs".to_string()], false, false).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::FailedPrecondition);
    gateway.delete(&target, &["/logs".to_string()], true, false).await.unwrap();
    // force suppresses not-found
    gateway.delete(&target, &["/ghost".to_string()], false, true).await.unwrap();
}

#[tokio::test]
async fn rename_round_trip_restores_path() {
    let (_h, gateway, _dir) = volume_fixture().await;
    let target = gateway
        .resolve_backend(
            &WorkloadId::new("gs-1"),
            sv_wire::files::FileBackend::Volume,
            Some("data"),
            None,
            None,
        )
        .await
        .unwrap();
    gateway.write(&target, "/a.txt", b"1", true, None, false).await.unwrap();
    gateway.rename(&target, "/a.txt", "/b.txt", false).await.unwrap();
    gateway.rename(&target, "/b.txt", "/a.txt", false).await.unwrap();
    assert_eq!(gateway.get(&target, "/a.txt").await.unwrap().content, "1");
}

#[tokio::test]
async fn symlink_requires_template() {
    let (_h, gateway, _dir) = volume_fixture().await;
    let target = gateway
        .resolve_backend(
            &WorkloadId::new("gs-1"),
            sv_wire::files::FileBackend::Volume,
            Some("data"),
            None,
            None,
        )
        .await
        .unwrap();
    let err = gateway
        .create_entry(&target, "/link", CreateEntryKind::Symlink, None)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidArgument);
}

#[tokio::test]
async fn container_list_parses_ls_output() {
    let (h, gateway, _dir) = volume_fixture().await;
    h.engine.script_exec(
        "c1000000",
        &["/bin/sh", "-c", "ls -1Ap -- '/etc'"],
        ExecOutput { exit_code: 0, stdout: b"conf.d/\nhosts\npasswd\n".to_vec(), stderr: vec![] },
    );
    let target = BackendTarget::Container(sv_core::ContainerId::new("c1000000"));
    let page = gateway.list(&target, "/etc", None, None).await.unwrap();
    assert_eq!(page.entries.len(), 3);
    let dirs: Vec<_> = page.entries.iter().filter(|e| e.is_dir).map(|e| e.name.as_str()).collect();
    assert_eq!(dirs, ["conf.d"]);
    assert_eq!(page.entries[1].path, "/etc/hosts");
}

#[tokio::test]
async fn container_missing_path_is_not_found() {
    let (h, gateway, _dir) = volume_fixture().await;
    h.engine.script_exec(
        "c1000000",
        &["/bin/sh", "-c", "ls -1Ap -- '/nope'"],
        ExecOutput {
            exit_code: 1,
            stdout: vec![],
            stderr: b"ls: /nope: No such file or directory".to_vec(),
        },
    );
    let target = BackendTarget::Container(sv_core::ContainerId::new("c1000000"));
    let err = gateway.list(&target, "/nope", None, None).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);
}

#[test]
fn server_properties_restricted_keys_are_stripped() {
    let input = "motd=Hello\nserver-port=25565\nserver-ip=0.0.0.0\nmax-players=20\n";
    assert_eq!(filter_server_properties(input), "motd=Hello\nmax-players=20\n");
    // Untouched content stays identical.
    let clean = "motd=Hello\nmax-players=20\n";
    assert_eq!(filter_server_properties(clean), clean);
}

#[tokio::test]
async fn server_properties_filter_applies_on_write() {
    let (_h, gateway, _dir) = volume_fixture().await;
    let target = gateway
        .resolve_backend(
            &WorkloadId::new("gs-1"),
            sv_wire::files::FileBackend::Volume,
            Some("data"),
            None,
            None,
        )
        .await
        .unwrap();
    gateway
        .write(&target, "/server.properties", b"motd=Hi\nserver-port=7777\n", true, None, true)
        .await
        .unwrap();
    let got = gateway.get(&target, "/server.properties").await.unwrap();
    assert_eq!(got.content, "motd=Hi\n");
}
