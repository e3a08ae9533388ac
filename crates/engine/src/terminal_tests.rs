// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sv_adapters::engine::fake::FakeEngine;
use sv_core::{StreamKind, SystemClock};

fn deps(engine: &FakeEngine) -> (Arc<dyn ContainerEngine>, Arc<dyn Clock>) {
    (Arc::new(engine.clone()), Arc::new(SystemClock))
}

#[tokio::test]
async fn attach_shares_one_session_per_workload() {
    let engine = FakeEngine::new();
    engine.put_running("c1000000", "gs-1");
    let (engine_dyn, clock) = deps(&engine);
    let sessions = TerminalSessions::new();
    let workload = WorkloadId::new("gs-1");
    let container = ContainerId::new("c1000000");

    let a = sessions.get_or_attach(&engine_dyn, &clock, &workload, &container).await.unwrap();
    let b = sessions.get_or_attach(&engine_dyn, &clock, &workload, &container).await.unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(sessions.len(), 1);
}

#[tokio::test]
async fn output_fans_out_to_all_subscribers() {
    let engine = FakeEngine::new();
    engine.put_running("c1000000", "gs-1");
    let (engine_dyn, clock) = deps(&engine);
    let sessions = TerminalSessions::new();
    let session = sessions
        .get_or_attach(&engine_dyn, &clock, &WorkloadId::new("gs-1"), &ContainerId::new("c1000000"))
        .await
        .unwrap();

    let mut tab_a = session.subscribe_output();
    let mut tab_b = session.subscribe_output();
    engine.push_live("c1000000", StreamKind::Stdout, b"hello\r\n");

    assert_eq!(tab_a.recv().await.unwrap(), b"hello\r\n");
    assert_eq!(tab_b.recv().await.unwrap(), b"hello\r\n");
}

#[tokio::test]
async fn input_reaches_container_stdin() {
    let engine = FakeEngine::new();
    engine.put_running("c1000000", "gs-1");
    let (engine_dyn, clock) = deps(&engine);
    let sessions = TerminalSessions::new();
    let session = sessions
        .get_or_attach(&engine_dyn, &clock, &WorkloadId::new("gs-1"), &ContainerId::new("c1000000"))
        .await
        .unwrap();

    session.write(b"say hi\n".to_vec()).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert_eq!(engine.stdin_written(), b"say hi\n");
}

#[tokio::test]
async fn client_counting_drives_teardown() {
    let engine = FakeEngine::new();
    engine.put_running("c1000000", "gs-1");
    let (engine_dyn, clock) = deps(&engine);
    let sessions = TerminalSessions::new();
    let workload = WorkloadId::new("gs-1");
    let session = sessions
        .get_or_attach(&engine_dyn, &clock, &workload, &ContainerId::new("c1000000"))
        .await
        .unwrap();

    assert_eq!(session.client_connected(), 1);
    assert_eq!(session.client_connected(), 2);
    assert_eq!(session.client_disconnected(), 1);
    assert_eq!(session.client_disconnected(), 0);
    sessions.close(&workload);
    assert!(session.is_closed());
    assert!(sessions.is_empty());
}

// --- StartGate ---

#[test]
fn gate_echoes_matching_prefix_and_fires_start() {
    let mut gate = StartGate::new();
    let actions = gate.feed(b"start\r");
    assert_eq!(
        actions,
        vec![
            GateAction::Echo(vec![b's']),
            GateAction::Echo(vec![b't']),
            GateAction::Echo(vec![b'a']),
            GateAction::Echo(vec![b'r']),
            GateAction::Echo(vec![b't']),
            GateAction::Start,
        ]
    );
}

#[test]
fn gate_is_case_insensitive_and_ignores_crlf() {
    let mut gate = StartGate::new();
    let actions = gate.feed(b"StArT\r\n");
    assert_eq!(actions.last(), Some(&GateAction::Start));
    // The trailing \n after \r produces nothing extra.
    assert_eq!(actions.iter().filter(|a| **a == GateAction::Start).count(), 1);
}

#[test]
fn gate_stops_echoing_on_divergence() {
    let mut gate = StartGate::new();
    let actions = gate.feed(b"stop\n");
    let echoed: Vec<_> = actions
        .iter()
        .filter_map(|a| match a {
            GateAction::Echo(bytes) => Some(bytes.clone()),
            _ => None,
        })
        .collect();
    // "st" matches, "o" diverges, "p" stays silent.
    assert_eq!(echoed, vec![vec![b's'], vec![b't']]);
    assert_eq!(actions.last(), Some(&GateAction::Unknown("stop".to_string())));
}

#[test]
fn gate_resets_after_newline() {
    let mut gate = StartGate::new();
    gate.feed(b"xyz\n");
    let actions = gate.feed(b"start\n");
    assert_eq!(actions.last(), Some(&GateAction::Start));
}

#[test]
fn gate_backspace_recovers_echo() {
    let mut gate = StartGate::new();
    gate.feed(b"sx");
    let actions = gate.feed(&[0x7f]);
    assert_eq!(actions, vec![GateAction::Echo(vec![0x08, b' ', 0x08])]);
    let resumed = gate.feed(b"tart\n");
    assert_eq!(resumed.last(), Some(&GateAction::Start));
}

#[test]
fn gate_empty_line_is_silent() {
    let mut gate = StartGate::new();
    assert!(gate.feed(b"\r\n").is_empty());
}
