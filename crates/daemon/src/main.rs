// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! stevedored: one control-plane daemon per worker node.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sv_adapters::{DockerEngine, NodeForwarder, StaticNodeDirectory};
use sv_core::{NodeId, SystemClock};
use sv_daemon::rpc::gameservers::{NullModCatalog, NullPlayerIdentity};
use sv_daemon::{build_router, AppState, Config, DevTokenVerifier};
use sv_engine::{
    BuildLogHub, ChunkManager, LifecycleEngine, MetricsStreamer, NullBuildExecutor, Reconciler,
    Runtime, TerminalSessions, TracingAuditSink,
};
use sv_storage::{MemoryStore, NodeRepository};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Keep the guard alive for the process lifetime when logging to disk.
    let _log_guard = match std::env::var("SV_LOG_DIR") {
        Ok(dir) if !dir.is_empty() => {
            let appender = tracing_appender::rolling::daily(dir, "stevedored.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(
                    EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
                )
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(
                    EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
                )
                .init();
            None
        }
    };

    let config = Arc::new(Config::load());
    info!(listen = %config.listen_addr, node = %config.node_id, "stevedored starting");
    if config.disable_auth {
        warn!("DISABLE_AUTH=true: development token accepted, do not expose this node");
    }

    let engine = DockerEngine::connect()?;
    // Single-node mode runs on the in-memory store; fleet deployments
    // wire the external drivers in instead.
    let store = MemoryStore::new();
    let clock: Arc<dyn sv_core::Clock> = Arc::new(SystemClock);

    let node_id = NodeId::new(config.node_id.clone());
    let directory = Arc::new(StaticNodeDirectory::new(node_id.clone()));
    for node in store.list().await? {
        directory.upsert(node.node_id.clone(), node.base_url.clone());
    }
    let forwarder = Arc::new(NodeForwarder::new(directory));

    let runtime = Runtime {
        engine: Arc::new(engine),
        workloads: Arc::new(store.clone()),
        builds: Arc::new(store.clone()),
        build_logs_repo: Arc::new(store.clone()),
        locations_repo: Arc::new(store.clone()),
        routings: Arc::new(store.clone()),
        nodes: Arc::new(store.clone()),
        metrics_repo: Arc::new(store.clone()),
        permissions: Arc::new(sv_engine::AllowAllPermissions),
        quotas: Arc::new(sv_engine::UnlimitedQuota),
        build_executor: Arc::new(NullBuildExecutor),
        audit: Arc::new(TracingAuditSink),
        clock: Arc::clone(&clock),
        node_id,
        node_host: config.node_host.clone(),
        base_domain: config.base_domain.clone(),
        build_logs: BuildLogHub::new(Arc::new(store.clone()), Arc::clone(&clock)),
        metrics: MetricsStreamer::new(),
        chunks: ChunkManager::new(Arc::clone(&clock)),
        terminals: TerminalSessions::new(),
    };

    let cancel = CancellationToken::new();

    // Background loops: the reconciler sweep and the chunk-session
    // sweeper.
    let reconciler = Reconciler::new(LifecycleEngine::new(runtime.clone()))
        .with_period(config.reconcile_period);
    let reconcile_cancel = cancel.clone();
    tokio::spawn(async move { reconciler.run(reconcile_cancel).await });
    runtime.chunks.spawn_sweeper(cancel.clone());

    let state = AppState::new(
        Arc::clone(&config),
        runtime,
        forwarder,
        Arc::new(DevTokenVerifier),
        Arc::new(NullModCatalog),
        Arc::new(NullPlayerIdentity),
    );
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "listening");
    let shutdown_cancel = cancel.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
            shutdown_cancel.cancel();
        })
        .await?;
    Ok(())
}
