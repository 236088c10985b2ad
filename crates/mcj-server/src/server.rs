//! Shared server state, the accept loop and the fixed-rate tickers.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use mcj_crypto::ServerKeyPair;
use mcj_proto::packets::{KeepAliveOut, PROTOCOL_VERSION, VERSION_NAME};
use mcj_proto::profile::GameProfile;
use mcj_proto::status::StatusResponse;
use mcj_proto::username::is_valid_username;
use mcj_proto::{BufferPool, Uuid};

use crate::auth::AuthGateway;
use crate::bans::BanList;
use crate::config::ServerConfig;
use crate::connection::{handle_connection, KICK_WRITE_TIMEOUT};
use crate::console::Console;
use crate::liveness::{LivenessAction, KEEP_ALIVE_INTERVAL};
use crate::registry::Registry;

pub const SHUTDOWN_REASON: &str = "Server closed.";
pub const TIMEOUT_REASON: &str = "Timed out.";
pub const INVALID_USERNAME_REASON: &str = "Your username is invalid.";

/// 20 ticks per second.
pub const TICK_INTERVAL: Duration = Duration::from_millis(50);

/// Everything connections share. Built once in `main` and handed around
/// behind an `Arc`.
pub struct ServerState {
    pub config: ServerConfig,
    pub keys: ServerKeyPair,
    pub auth: Arc<dyn AuthGateway>,
    pub registry: Registry,
    pub pool: BufferPool,
    pub favicon: Option<String>,
    pub commands: Console,
    bans: Mutex<BanList>,
    next_entity_id: AtomicI32,
    next_connection_id: AtomicU64,
    ticks: AtomicU64,
    shutdown: watch::Sender<bool>,
}

impl ServerState {
    pub fn new(
        config: ServerConfig,
        keys: ServerKeyPair,
        auth: Arc<dyn AuthGateway>,
        bans: BanList,
        favicon: Option<String>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            keys,
            auth,
            registry: Registry::new(),
            pool: BufferPool::new(),
            favicon,
            commands: Console::new(),
            bans: Mutex::new(bans),
            next_entity_id: AtomicI32::new(1),
            next_connection_id: AtomicU64::new(1),
            ticks: AtomicU64::new(0),
            shutdown,
        }
    }

    pub fn status(&self) -> StatusResponse {
        StatusResponse::new(
            VERSION_NAME,
            PROTOCOL_VERSION,
            self.config.server.max_players,
            self.registry.len() as u32,
            &self.config.server.motd,
            self.favicon.clone(),
        )
    }

    /// Checks that do not depend on who else is online. Returns the kick
    /// reason on refusal.
    pub fn admission_check(&self, profile: &GameProfile) -> Result<(), String> {
        if self.is_shutting_down() {
            return Err(SHUTDOWN_REASON.to_string());
        }
        if !is_valid_username(&profile.name) {
            return Err(INVALID_USERNAME_REASON.to_string());
        }
        if let Some(reason) = self.bans().reason_for(&profile.id) {
            return Err(reason);
        }
        Ok(())
    }

    pub fn bans(&self) -> MutexGuard<'_, BanList> {
        self.bans.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ban and persist immediately.
    pub fn ban(&self, uuid: Uuid, reason: &str) {
        let mut bans = self.bans();
        bans.ban(uuid, reason);
        bans.save();
    }

    pub fn pardon(&self, uuid: &Uuid) -> bool {
        let mut bans = self.bans();
        let removed = bans.pardon(uuid);
        if removed {
            bans.save();
        }
        removed
    }

    pub fn next_entity_id(&self) -> i32 {
        self.next_entity_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn next_connection_id(&self) -> u64 {
        self.next_connection_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn subscribe_shutdown(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Ask every loop to wind down. Safe to call more than once.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }
}

/// Resolve once shutdown has been requested, including before the call.
pub async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

pub struct Server {
    state: Arc<ServerState>,
    listener: TcpListener,
}

impl Server {
    pub async fn bind(state: Arc<ServerState>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(state.config.bind_address()).await?;
        Ok(Self { state, listener })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept clients until shutdown, then kick everyone, wait for every
    /// connection to finish tearing down and persist state.
    pub async fn run(self) {
        match self.local_addr() {
            Ok(addr) => info!("Listening on {addr}"),
            Err(e) => warn!("Listening on unknown address: {e}"),
        }
        let Self { state, listener } = self;
        let mut shutdown = state.subscribe_shutdown();
        let keep_alive = tokio::spawn(keep_alive_loop(Arc::clone(&state)));
        let ticker = tokio::spawn(tick_loop(Arc::clone(&state)));
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        connections.spawn(handle_connection(stream, peer, Arc::clone(&state)));
                    }
                    Err(e) => warn!("Failed to accept connection: {e}"),
                },
                // Reap finished connections so the set does not grow unbounded.
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                _ = wait_for_shutdown(&mut shutdown) => break,
            }
        }

        info!("Stopping server");
        drop(listener);
        let _ = keep_alive.await;
        let _ = ticker.await;

        for conn in state.registry.snapshot() {
            connections.spawn(async move { conn.disconnect(SHUTDOWN_REASON).await });
        }
        // Each connection bounds its own kick and writer waits; this bounds
        // the whole teardown.
        let drain = async { while connections.join_next().await.is_some() {} };
        if tokio::time::timeout(KICK_WRITE_TIMEOUT * 2, drain).await.is_err() {
            warn!(
                "{} connections did not close in time, aborting them",
                connections.len()
            );
            connections.shutdown().await;
        }

        state.bans().save();
        info!("Server stopped after {} ticks", state.ticks());
    }
}

async fn keep_alive_loop(state: Arc<ServerState>) {
    let mut shutdown = state.subscribe_shutdown();
    let mut interval = tokio::time::interval(KEEP_ALIVE_INTERVAL);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = wait_for_shutdown(&mut shutdown) => break,
        }
        if state.registry.is_empty() {
            continue;
        }
        let now = Instant::now();
        state.registry.for_each(|conn| match conn.poll_liveness(now) {
            LivenessAction::Ping(id) => {
                conn.send_packet(&KeepAliveOut { id });
            }
            LivenessAction::TimedOut => {
                info!(
                    "{} timed out",
                    conn.name().unwrap_or_else(|| conn.peer().to_string())
                );
                let conn = Arc::clone(conn);
                tokio::spawn(async move { conn.disconnect(TIMEOUT_REASON).await });
            }
            LivenessAction::Wait => {}
        });
    }
    debug!("Keep-alive loop stopped");
}

async fn tick_loop(state: Arc<ServerState>) {
    let mut shutdown = state.subscribe_shutdown();
    let mut interval = tokio::time::interval(TICK_INTERVAL);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                state.ticks.fetch_add(1, Ordering::Relaxed);
            }
            _ = wait_for_shutdown(&mut shutdown) => break,
        }
    }
    debug!("Tick loop stopped");
}
