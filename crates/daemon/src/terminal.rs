// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal WebSocket endpoint.
//!
//! Single JSON channel per §protocol: the first message must be `init`;
//! the session then attaches to container stdio (shared per workload),
//! proxies transparently to the owning node when the container is
//! remote, and degrades into stopped mode (type `start`) when the
//! container is not running.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use sv_core::{
    CallContext, ContainerId, Permission, ResourceType, ScopedPermission, Status, WorkloadId,
    WorkloadKind,
};
use sv_engine::{GateAction, StartGate, TerminalSession};
use sv_wire::terminal::{close_code, ClientMessage, ServerMessage};

use crate::auth::{authenticate_token, RequestMeta};
use crate::server::AppState;

/// Per-message write timeout.
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);
/// Settle delay between starting a stopped container and re-attaching.
const START_ATTACH_DELAY: Duration = Duration::from_millis(750);

pub async fn ws_entry(
    State(state): State<AppState>,
    headers: HeaderMap,
    upgrade: WebSocketUpgrade,
) -> Response {
    let meta = RequestMeta::from_headers(&headers);
    upgrade.on_upgrade(move |socket| async move {
        if let Err(e) = run_session(state, meta, socket).await {
            debug!(error = %e, "terminal session ended with error");
        }
    })
}

/// Serialized writer; concurrent tasks share the sink behind a mutex.
#[derive(Clone)]
struct WsWriter {
    sink: Arc<Mutex<futures_util::stream::SplitSink<WebSocket, Message>>>,
}

impl WsWriter {
    fn new(sink: futures_util::stream::SplitSink<WebSocket, Message>) -> Self {
        Self { sink: Arc::new(Mutex::new(sink)) }
    }

    async fn send(&self, message: &ServerMessage) -> Result<(), Status> {
        let text = serde_json::to_string(message)
            .map_err(|e| Status::internal(format!("encode server message: {e}")))?;
        let mut sink = self.sink.lock().await;
        tokio::time::timeout(WRITE_TIMEOUT, sink.send(Message::Text(text.into())))
            .await
            .map_err(|_| Status::internal("websocket write timed out"))?
            .map_err(|e| Status::internal(format!("websocket write: {e}")))
    }

    async fn send_output(&self, bytes: &[u8]) -> Result<(), Status> {
        self.send(&ServerMessage::Output { data: bytes.to_vec() }).await
    }

    async fn close(&self, code: u16, reason: &str) {
        let mut sink = self.sink.lock().await;
        let frame = CloseFrame { code, reason: reason.to_string().into() };
        let _ = tokio::time::timeout(WRITE_TIMEOUT, sink.send(Message::Close(Some(frame)))).await;
    }
}

async fn run_session(state: AppState, meta: RequestMeta, socket: WebSocket) -> Result<(), Status> {
    let (sink, mut stream) = socket.split();
    let writer = WsWriter::new(sink);

    // Origin gate first; a wildcard configuration allows any.
    if !state.config.origin_allowed(meta.origin.as_deref()) {
        writer.close(close_code::POLICY_VIOLATION, "origin not allowed").await;
        return Ok(());
    }

    // The first message must be init.
    let first = match stream.next().await {
        Some(Ok(Message::Text(text))) => text,
        _ => {
            writer.close(close_code::PROTOCOL_ERROR, "expected init message").await;
            return Ok(());
        }
    };
    let init: ClientMessage = match serde_json::from_str(&first) {
        Ok(msg) => msg,
        Err(_) => {
            writer.close(close_code::PROTOCOL_ERROR, "malformed init message").await;
            return Ok(());
        }
    };
    let ClientMessage::Init {
        ref organization_id,
        ref token,
        ref container_id,
        ref service_name,
        cols,
        rows,
        ..
    } = init
    else {
        writer.close(close_code::PROTOCOL_ERROR, "first message must be init").await;
        return Ok(());
    };

    let Some(workload_id) = init.workload_id().map(WorkloadId::new) else {
        writer.close(close_code::POLICY_VIOLATION, "missing workload id").await;
        return Ok(());
    };
    if organization_id.is_empty() {
        writer.close(close_code::POLICY_VIOLATION, "missing organization id").await;
        return Ok(());
    }

    let ctx = match authenticate_token(&state.config, state.verifier.as_ref(), token, &meta).await
    {
        Ok(ctx) => ctx,
        Err(_) => {
            writer.close(close_code::POLICY_VIOLATION, "missing or invalid token").await;
            return Ok(());
        }
    };

    // View permission gates the session at all.
    let workload = match state.rt.workloads.get_by_id(&workload_id).await {
        Ok(Some(w)) if !w.is_deleted() => w,
        _ => {
            writer.close(close_code::POLICY_VIOLATION, "workload not found").await;
            return Ok(());
        }
    };
    let resource_type = match workload.kind {
        WorkloadKind::Deployment => ResourceType::Deployment,
        WorkloadKind::GameServer => ResourceType::Gameserver,
    };
    let view = ScopedPermission::new(Permission::View, resource_type).on(workload_id.to_string());
    if state.rt.check_permission(&ctx, &workload.org_id, &view).await.is_err() {
        writer.close(close_code::POLICY_VIOLATION, "permission denied").await;
        return Ok(());
    }

    let location = match state
        .lifecycle
        .registry()
        .find(&workload_id, container_id.as_deref(), service_name.as_deref(), true)
        .await
    {
        Ok(location) => location,
        Err(e) => {
            let _ = writer.send(&ServerMessage::Error { message: e.message.clone() }).await;
            writer.close(close_code::INTERNAL_ERROR, "no container").await;
            return Ok(());
        }
    };

    // Remote container: run as a transparent proxy from here on. The init
    // frame is replayed to the peer and its response relayed back before
    // the pipe starts.
    match state.forwarder.should_forward(&location) {
        Ok(sv_adapters::ForwardTarget::Local) => {}
        Ok(sv_adapters::ForwardTarget::Remote { base_url, .. }) => {
            return proxy_session(state, meta, writer, stream, first.to_string(), base_url).await;
        }
        Err(e) => {
            let _ = writer
                .send(&ServerMessage::Error { message: Status::from(e).message })
                .await;
            writer.close(close_code::INTERNAL_ERROR, "owner node unreachable").await;
            return Ok(());
        }
    }

    // Local container: attached mode when running, stopped mode otherwise.
    let running = match state.rt.engine.inspect(&location.container_id).await {
        Ok(engine_state) => engine_state.running,
        Err(e) => {
            let _ = writer.send(&ServerMessage::Error { message: Status::from(e).message }).await;
            writer.close(close_code::INTERNAL_ERROR, "inspect failed").await;
            return Ok(());
        }
    };

    writer.send(&ServerMessage::Connected).await?;

    if running {
        let session =
            attach(&state, &workload_id, &location.container_id, cols, rows).await?;
        attached_loop(&state, &ctx, &workload, writer, stream, session).await
    } else {
        stopped_loop(&state, &ctx, &workload, &location.container_id, writer, stream).await
    }
}

async fn attach(
    state: &AppState,
    workload_id: &WorkloadId,
    container: &ContainerId,
    cols: Option<u16>,
    rows: Option<u16>,
) -> Result<Arc<TerminalSession>, Status> {
    let session = state
        .rt
        .terminals
        .get_or_attach(&state.rt.engine, &state.rt.clock, workload_id, container)
        .await?;
    session.client_connected();
    if let (true, Some(cols), Some(rows)) = (session.tty, cols, rows) {
        let _ = state.rt.engine.resize(container, rows, cols).await;
    }
    Ok(session)
}

/// Attached mode: pump container output to the socket and client input
/// to container stdin until either side goes away.
async fn attached_loop(
    state: &AppState,
    ctx: &CallContext,
    workload: &sv_core::Workload,
    writer: WsWriter,
    mut stream: futures_util::stream::SplitStream<WebSocket>,
    session: Arc<TerminalSession>,
) -> Result<(), Status> {
    let mut output = session.subscribe_output();
    let out_writer = writer.clone();
    let out_session = Arc::clone(&session);
    let output_task = tokio::spawn(async move {
        loop {
            match output.recv().await {
                Ok(bytes) => {
                    if out_writer.send_output(&bytes).await.is_err() {
                        break;
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "terminal output lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    let _ = out_writer
                        .send(&ServerMessage::Closed {
                            reason: "container detached".to_string(),
                            exit: None,
                        })
                        .await;
                    out_writer.close(close_code::NORMAL, "eof").await;
                    break;
                }
            }
        }
        let _ = out_session;
    });

    while let Some(message) = stream.next().await {
        let message = match message {
            Ok(m) => m,
            Err(_) => break,
        };
        match message {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::Input { input }) => {
                    if session.write(input).await.is_err() {
                        break;
                    }
                }
                Ok(ClientMessage::Resize { cols, rows }) => {
                    // No-op unless the container runs a TTY.
                    if session.tty {
                        let _ = state.rt.engine.resize(&session.container_id, rows, cols).await;
                    }
                }
                Ok(ClientMessage::Ping) => {
                    if writer.send(&ServerMessage::Pong).await.is_err() {
                        break;
                    }
                }
                Ok(ClientMessage::Init { .. }) => {
                    let _ = writer
                        .send(&ServerMessage::Error {
                            message: "session already initialized".to_string(),
                        })
                        .await;
                }
                Err(_) => {
                    let _ = writer
                        .send(&ServerMessage::Error { message: "malformed message".to_string() })
                        .await;
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    output_task.abort();
    if session.client_disconnected() == 0 {
        state.rt.terminals.close(&workload.id);
        info!(workload_id = %workload.id, user = ?ctx.user_opt(), "terminal session closed");
    }
    Ok(())
}

/// Stopped mode: accept the literal `start` command, then boot and
/// attach.
async fn stopped_loop(
    state: &AppState,
    ctx: &CallContext,
    workload: &sv_core::Workload,
    container: &ContainerId,
    writer: WsWriter,
    mut stream: futures_util::stream::SplitStream<WebSocket>,
) -> Result<(), Status> {
    writer
        .send_output(
            b"\r\nContainer is stopped. Type 'start' and press Enter to start it.\r\n> ",
        )
        .await?;

    let mut gate = StartGate::new();
    while let Some(message) = stream.next().await {
        let message = match message {
            Ok(m) => m,
            Err(_) => return Ok(()),
        };
        let input = match message {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::Input { input }) => input,
                Ok(ClientMessage::Ping) => {
                    writer.send(&ServerMessage::Pong).await?;
                    continue;
                }
                Ok(_) => continue,
                Err(_) => continue,
            },
            Message::Close(_) => return Ok(()),
            _ => continue,
        };

        for action in gate.feed(&input) {
            match action {
                GateAction::Echo(bytes) => writer.send_output(&bytes).await?,
                GateAction::Unknown(word) => {
                    writer
                        .send_output(
                            format!("\r\nUnknown command: {word}\r\nType 'start' to start the container.\r\n> ")
                                .as_bytes(),
                        )
                        .await?;
                }
                GateAction::Start => {
                    // Starting needs manage, not just view.
                    let resource_type = match workload.kind {
                        WorkloadKind::Deployment => ResourceType::Deployment,
                        WorkloadKind::GameServer => ResourceType::Gameserver,
                    };
                    let manage = ScopedPermission::new(Permission::Manage, resource_type)
                        .on(workload.id.to_string());
                    if state
                        .rt
                        .check_permission(ctx, &workload.org_id, &manage)
                        .await
                        .is_err()
                    {
                        writer
                            .send_output(b"\r\nYou do not have permission to start this container.\r\n> ")
                            .await?;
                        continue;
                    }

                    writer
                        .send_output(
                            format!("\r\nStarting container {}...\r\n", container.short(12))
                                .as_bytes(),
                        )
                        .await?;
                    if let Err(e) = state
                        .lifecycle
                        .start_container(
                            ctx,
                            &workload.id,
                            Some(container.as_str()),
                            None,
                        )
                        .await
                    {
                        writer
                            .send_output(
                                format!("\r\nFailed to start container: {}\r\n> ", e.message)
                                    .as_bytes(),
                            )
                            .await?;
                        continue;
                    }

                    // Give the process a moment before attaching stdio.
                    tokio::time::sleep(START_ATTACH_DELAY).await;
                    writer
                        .send_output(b"Container started successfully! Terminal connected.\r\n")
                        .await?;
                    let session = attach(state, &workload.id, container, None, None).await?;
                    return attached_loop(state, ctx, workload, writer, stream, session).await;
                }
            }
        }
    }
    Ok(())
}

/// Transparent proxy to the owning node: replay the init frame, relay
/// its response, then pipe frames both ways until either side closes.
async fn proxy_session(
    state: AppState,
    meta: RequestMeta,
    writer: WsWriter,
    mut client: futures_util::stream::SplitStream<WebSocket>,
    init_frame: String,
    base_url: String,
) -> Result<(), Status> {
    let mut peer = state
        .forwarder
        .forward_websocket(&base_url, "/terminal/ws", &meta.forwarded_headers())
        .await
        .map_err(Status::from)?;

    use tokio_tungstenite::tungstenite::Message as PeerMessage;

    peer.send(PeerMessage::Text(init_frame.into()))
        .await
        .map_err(|e| Status::internal(format!("proxy init: {e}")))?;
    if let Some(Ok(PeerMessage::Text(text))) = peer.next().await {
        if let Ok(message) = serde_json::from_str::<ServerMessage>(&text) {
            writer.send(&message).await?;
        }
    }

    let (mut peer_sink, mut peer_stream) = peer.split();

    let up_writer = writer.clone();
    let downstream = tokio::spawn(async move {
        while let Some(Ok(message)) = peer_stream.next().await {
            match message {
                PeerMessage::Text(text) => {
                    match serde_json::from_str::<ServerMessage>(&text) {
                        Ok(message) => {
                            if up_writer.send(&message).await.is_err() {
                                break;
                            }
                        }
                        Err(_) => continue,
                    }
                }
                PeerMessage::Close(_) => {
                    up_writer.close(close_code::NORMAL, "peer closed").await;
                    break;
                }
                _ => {}
            }
        }
    });

    while let Some(Ok(message)) = client.next().await {
        match message {
            Message::Text(text) => {
                if peer_sink.send(PeerMessage::Text(text.to_string().into())).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => {
                let _ = peer_sink.send(PeerMessage::Close(None)).await;
                break;
            }
            _ => {}
        }
    }

    // First error or close on either leg drops both.
    downstream.abort();
    warn!("terminal proxy disconnected");
    Ok(())
}
