//! # MiniDB Server
//!
//! Entry point for the MiniDB database daemon.
//!
//! The storage core lives under the `/crates` directory of this workspace;
//! this binary boots the engine (running log recovery before anything is
//! served), exposes a small length-prefixed admin protocol over TCP
//! (`PING`, `STATS`, `CHECKPOINT`), and tears the engine down with a
//! guaranteed log flush on shutdown. The SQL surface is a separate
//! collaborator that talks to the `engine` crate directly.

use crate::config::DaemonConfig;
use engine::Engine;
use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::task;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

mod config;

/// Commands longer than this are garbage, not admin requests.
const MAX_COMMAND_LEN: u32 = 4096;

#[tokio::main]
async fn main() {
    let cfg = match DaemonConfig::load("minidb.toml") {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    };

    let _logging_guard = match init_logging(&cfg.storage.logs_dir) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("failed to initialize logging: {e}");
            std::process::exit(2);
        }
    };

    // Recovery happens inside Engine::open, before the listener exists.
    let engine = match task::spawn_blocking({
        let options = cfg.engine_options();
        move || Engine::open(options)
    })
    .await
    .expect("engine startup task panicked")
    {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            tracing::error!("engine startup failed: {e}");
            std::process::exit(2);
        }
    };

    let stats = engine.stats();
    tracing::info!(
        tables = stats.tables,
        indexes = stats.indexes,
        next_lsn = stats.next_wal_lsn,
        "engine ready"
    );

    let semaphore = Arc::new(Semaphore::new(cfg.server.max_concurrent_commands));
    let shutdown = CancellationToken::new();

    // Spawn a task that waits for OS shutdown signals and triggers cancellation.
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            wait_for_shutdown_signal().await;
            tracing::info!("shutdown signal received; beginning graceful shutdown");
            shutdown.cancel();
        });
    }

    let listener = match TcpListener::bind(&cfg.server.listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("failed to bind {}: {e}", cfg.server.listen_addr);
            std::process::exit(2);
        }
    };
    tracing::info!("listening on {:?}", listener.local_addr());

    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("stop accepting new connections");
                break;
            }

            res = listener.accept() => {
                let (socket, addr) = match res {
                    Ok(v) => v,
                    Err(e) => {
                        if shutdown.is_cancelled() { break; }
                        tracing::warn!("accept failed: {e}");
                        continue;
                    }
                };

                let engine_clone = engine.clone();
                let semaphore_clone = semaphore.clone();
                let shutdown_clone = shutdown.clone();

                connections.spawn(async move {
                    tracing::info!("client connected: {addr}");
                    handle_client(socket, engine_clone, semaphore_clone, shutdown_clone).await;
                    tracing::info!("client disconnected: {addr}");
                });
            }
        }
    }

    tracing::info!("waiting for existing connections to finish");
    while let Some(res) = connections.join_next().await {
        if let Err(join_err) = res {
            tracing::warn!("connection task ended with error: {join_err}");
        }
    }

    // Tear the engine down with a guaranteed log flush (and a checkpoint
    // when nothing is in flight).
    let teardown = task::spawn_blocking(move || engine.shutdown()).await;
    match teardown {
        Ok(Ok(())) => tracing::info!("engine closed"),
        Ok(Err(e)) => tracing::error!("engine shutdown failed: {e}"),
        Err(e) => tracing::error!("engine shutdown task panicked: {e}"),
    }

    tracing::info!("shutdown complete");
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint = signal(SignalKind::interrupt()).expect("sigint handler");
        let mut sigterm = signal(SignalKind::terminate()).expect("sigterm handler");

        tokio::select! {
            _ = sigint.recv() => {},
            _ = sigterm.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.expect("ctrl_c handler");
    }
}

/// Serves length-prefixed admin commands over one connection until the
/// client disconnects or shutdown is triggered.
async fn handle_client(
    mut socket: TcpStream,
    engine: Arc<Engine>,
    semaphore: Arc<Semaphore>,
    shutdown: CancellationToken,
) {
    loop {
        let mut len_buf = [0u8; 4];

        let read_res = tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("shutdown: stop reading new requests");
                return;
            }
            r = socket.read_exact(&mut len_buf) => r,
        };
        if read_res.is_err() {
            // Normal disconnect path.
            return;
        }

        let len = u32::from_be_bytes(len_buf);
        if len == 0 || len > MAX_COMMAND_LEN {
            tracing::warn!("rejecting oversized command of {len} bytes");
            return;
        }

        let mut command = vec![0u8; len as usize];
        if socket.read_exact(&mut command).await.is_err() {
            return;
        }
        let command = String::from_utf8_lossy(&command).trim().to_ascii_uppercase();

        // Bound concurrent engine work across all connections.
        let permit = tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("shutdown: refuse starting new command");
                return;
            }
            p = semaphore.clone().acquire_owned() => p.expect("semaphore closed"),
        };

        let engine_clone = engine.clone();
        let reply = task::spawn_blocking(move || run_command(&engine_clone, &command))
            .await
            .unwrap_or_else(|e| format!("ERR command task panicked: {e}"));
        drop(permit);

        let frame_len = (reply.len() as u32).to_be_bytes();
        if socket.write_all(&frame_len).await.is_err()
            || socket.write_all(reply.as_bytes()).await.is_err()
        {
            tracing::warn!("failed to write reply; dropping connection");
            return;
        }
    }
}

fn run_command(engine: &Engine, command: &str) -> String {
    match command {
        "PING" => "PONG".to_string(),
        "STATS" => {
            let stats = engine.stats();
            format!(
                "tables={} indexes={} live_txns={} buffer={}/{} dirty={} next_lsn={}",
                stats.tables,
                stats.indexes,
                stats.live_txns,
                stats.buffer_frames_in_use,
                stats.buffer_pool_size,
                stats.buffer_dirty_frames,
                stats.next_wal_lsn,
            )
        }
        "CHECKPOINT" => match engine.checkpoint() {
            Ok(true) => "OK".to_string(),
            Ok(false) => "BUSY live transactions".to_string(),
            Err(e) => format!("ERR {e}"),
        },
        other => format!("ERR unknown command '{other}'"),
    }
}

/// Sets up the logging for the daemon: a compact console layer plus a JSON
/// daily-rolling file layer.
pub fn init_logging(log_dir: &Path) -> Result<WorkerGuard, Box<dyn Error + Send + Sync>> {
    let file_appender = tracing_appender::rolling::daily(log_dir, "minidb.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    let console_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(false)
        .with_level(true)
        .compact();

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .json()
        .with_current_span(true)
        .with_span_list(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}
