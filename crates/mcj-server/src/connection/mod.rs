//! One client connection: state machine, outbound queue, liveness and the
//! logged-in player.

mod dispatch;
mod handshake;
mod io;
mod login;
mod play;

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, warn};

use mcj_crypto::CipherEncryptor;
use mcj_proto::codec::{Packet, ProtoEncode};
use mcj_proto::packets::{Kick, LoginDisconnect};
use mcj_proto::profile::GameProfile;
use mcj_proto::OutgoingPacket;

use crate::liveness::{Liveness, LivenessAction};
use crate::player::Player;

pub use dispatch::{HandlerTable, PacketHandler};
pub use io::handle_connection;
pub(crate) use io::ConnectionReader;

/// How long `disconnect` waits for the kick packet to reach the socket.
pub const KICK_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Protocol state. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConnectionState {
    Handshake,
    Login,
    Play,
}

/// Work item for the write loop. Items are applied strictly in queue order.
pub enum WriterCommand {
    Packet {
        packet: OutgoingPacket,
        written: Option<oneshot::Sender<()>>,
    },
    /// Encrypt every byte written after this point.
    EnableEncryption(CipherEncryptor),
}

struct Verification {
    token: [u8; mcj_crypto::VERIFY_TOKEN_LEN],
    username: String,
}

struct ConnectionInner {
    state: ConnectionState,
    handlers: HandlerTable,
    connected: bool,
    protocol_version: i32,
    verification: Option<Verification>,
    shared_secret: Option<Vec<u8>>,
    liveness: Liveness,
    pending_teleport: Option<i32>,
    player: Option<Player>,
}

pub struct Connection {
    id: u64,
    peer: SocketAddr,
    outbound: Mutex<Option<mpsc::UnboundedSender<WriterCommand>>>,
    exit: watch::Sender<bool>,
    inner: Mutex<ConnectionInner>,
}

impl Connection {
    /// Create a connection in the handshake state. The receiver feeds the
    /// write loop; the watch fires once the connection is torn down.
    pub fn new(
        id: u64,
        peer: SocketAddr,
    ) -> (
        Arc<Self>,
        mpsc::UnboundedReceiver<WriterCommand>,
        watch::Receiver<bool>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (exit, exit_rx) = watch::channel(false);
        let conn = Arc::new(Self {
            id,
            peer,
            outbound: Mutex::new(Some(tx)),
            exit,
            inner: Mutex::new(ConnectionInner {
                state: ConnectionState::Handshake,
                handlers: HandlerTable::for_state(ConnectionState::Handshake),
                connected: true,
                protocol_version: 0,
                verification: None,
                shared_secret: None,
                liveness: Liveness::new(),
                pending_teleport: None,
                player: None,
            }),
        });
        (conn, rx, exit_rx)
    }

    fn inner(&self) -> MutexGuard<'_, ConnectionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn state(&self) -> ConnectionState {
        self.inner().state
    }

    pub fn is_connected(&self) -> bool {
        self.inner().connected
    }

    /// Move to `next` and install its handler table in the same critical
    /// section. Backward or repeated transitions are refused.
    pub fn transition(&self, next: ConnectionState) -> bool {
        let mut inner = self.inner();
        if next <= inner.state {
            warn!(
                "{}: refusing transition {:?} -> {next:?}",
                self.peer, inner.state
            );
            return false;
        }
        debug!("{}: {:?} -> {next:?}", self.peer, inner.state);
        inner.state = next;
        inner.handlers = HandlerTable::for_state(next);
        true
    }

    /// Handler for `id` in the current state's table.
    pub fn handler_for(&self, id: i32) -> Option<PacketHandler> {
        self.inner().handlers.lookup(id)
    }

    pub fn protocol_version(&self) -> i32 {
        self.inner().protocol_version
    }

    pub fn set_protocol_version(&self, version: i32) {
        self.inner().protocol_version = version;
    }

    /// Remember the token and name sent with an encryption request.
    pub fn stash_verification(&self, token: [u8; mcj_crypto::VERIFY_TOKEN_LEN], username: String) {
        self.inner().verification = Some(Verification { token, username });
    }

    /// Take the stashed token and name. They are single-use.
    pub fn take_verification(&self) -> Option<([u8; mcj_crypto::VERIFY_TOKEN_LEN], String)> {
        self.inner()
            .verification
            .take()
            .map(|v| (v.token, v.username))
    }

    pub fn set_shared_secret(&self, secret: Vec<u8>) {
        self.inner().shared_secret = Some(secret);
    }

    pub fn is_encrypted(&self) -> bool {
        self.inner().shared_secret.is_some()
    }

    pub fn set_player(&self, player: Player) {
        self.inner().player = Some(player);
    }

    /// Read access to the player, if logged in.
    pub fn with_player<R>(&self, f: impl FnOnce(&Player) -> R) -> Option<R> {
        self.inner().player.as_ref().map(f)
    }

    pub fn with_player_mut<R>(&self, f: impl FnOnce(&mut Player) -> R) -> Option<R> {
        self.inner().player.as_mut().map(f)
    }

    pub fn profile(&self) -> Option<GameProfile> {
        self.with_player(|p| p.profile.clone())
    }

    pub fn name(&self) -> Option<String> {
        self.with_player(|p| p.name().to_string())
    }

    pub fn set_pending_teleport(&self, teleport_id: i32) {
        self.inner().pending_teleport = Some(teleport_id);
    }

    /// Clear the pending teleport if `teleport_id` matches it.
    pub fn confirm_teleport(&self, teleport_id: i32) -> bool {
        let mut inner = self.inner();
        if inner.pending_teleport == Some(teleport_id) {
            inner.pending_teleport = None;
            true
        } else {
            false
        }
    }

    /// One keep-alive sweep step. Only connections in play are pinged.
    pub fn poll_liveness(&self, now: Instant) -> LivenessAction {
        let mut inner = self.inner();
        if inner.state != ConnectionState::Play || !inner.connected {
            return LivenessAction::Wait;
        }
        inner.liveness.poll(now, rand::random)
    }

    pub fn acknowledge_keep_alive(&self, id: i64) -> bool {
        self.inner().liveness.acknowledge(id)
    }

    /// Id of the keep-alive still waiting for an echo.
    pub fn outstanding_keep_alive(&self) -> Option<i64> {
        self.inner().liveness.outstanding()
    }

    fn enqueue(&self, command: WriterCommand) -> bool {
        let outbound = self.outbound.lock().unwrap_or_else(PoisonError::into_inner);
        match outbound.as_ref() {
            Some(tx) => tx.send(command).is_ok(),
            None => false,
        }
    }

    /// Queue a packet. Returns `false` once the connection is closing.
    pub fn send(&self, packet: OutgoingPacket) -> bool {
        self.enqueue(WriterCommand::Packet {
            packet,
            written: None,
        })
    }

    /// Encode and queue a typed packet.
    pub fn send_packet<P: Packet + ProtoEncode>(&self, packet: &P) -> bool {
        self.send(OutgoingPacket::from_packet(packet))
    }

    /// Queue a packet and wait, at most `timeout`, until it has been written.
    pub async fn send_and_wait(&self, packet: OutgoingPacket, timeout: Duration) -> bool {
        let (tx, rx) = oneshot::channel();
        if !self.enqueue(WriterCommand::Packet {
            packet,
            written: Some(tx),
        }) {
            return false;
        }
        matches!(tokio::time::timeout(timeout, rx).await, Ok(Ok(())))
    }

    /// Switch the outbound stream to ciphertext. Packets queued earlier are
    /// still written in the clear.
    pub fn enable_encryption(&self, encryptor: CipherEncryptor) -> bool {
        self.enqueue(WriterCommand::EnableEncryption(encryptor))
    }

    /// Close the connection. A non-empty `reason` is sent first as a
    /// state-appropriate kick. Only the first call has any effect.
    pub async fn disconnect(&self, reason: &str) {
        let state = {
            let mut inner = self.inner();
            if !inner.connected {
                return;
            }
            inner.connected = false;
            inner.state
        };

        if !reason.is_empty() {
            let kick = match state {
                ConnectionState::Handshake => None,
                ConnectionState::Login => Some(
                    LoginDisconnect {
                        reason: reason.to_string(),
                    }
                    .to_packet(),
                ),
                ConnectionState::Play => Some(
                    Kick {
                        reason: reason.to_string(),
                    }
                    .to_packet(),
                ),
            };
            match kick {
                Some(Ok(kick)) => {
                    if !self.send_and_wait(kick, KICK_WRITE_TIMEOUT).await {
                        debug!("{}: kick packet was not written", self.peer);
                    }
                }
                Some(Err(e)) => warn!("{}: closing without a kick message: {e}", self.peer),
                None => {}
            }
            debug!("{}: disconnected: {reason}", self.peer);
        }

        self.exit.send_replace(true);
        // Dropping the sender lets the write loop drain and close the socket.
        self.outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcj_proto::packets::id;
    use mcj_proto::RawPacket;

    fn conn() -> (
        Arc<Connection>,
        mpsc::UnboundedReceiver<WriterCommand>,
        watch::Receiver<bool>,
    ) {
        Connection::new(1, "127.0.0.1:1".parse().unwrap())
    }

    /// Stand-in write loop: completes every write immediately.
    fn ack_writes(mut rx: mpsc::UnboundedReceiver<WriterCommand>) -> tokio::task::JoinHandle<Vec<OutgoingPacket>> {
        tokio::spawn(async move {
            let mut written = Vec::new();
            while let Some(cmd) = rx.recv().await {
                if let WriterCommand::Packet { packet, written: done } = cmd {
                    written.push(packet);
                    if let Some(done) = done {
                        let _ = done.send(());
                    }
                }
            }
            written
        })
    }

    #[test]
    fn state_only_moves_forward() {
        let (conn, _rx, _exit) = conn();
        assert_eq!(conn.state(), ConnectionState::Handshake);
        assert!(conn.transition(ConnectionState::Login));
        assert!(!conn.transition(ConnectionState::Handshake));
        assert!(!conn.transition(ConnectionState::Login));
        assert!(conn.transition(ConnectionState::Play));
        assert_eq!(conn.state(), ConnectionState::Play);
    }

    #[test]
    fn handler_table_follows_state() {
        let (conn, _rx, _exit) = conn();
        assert!(conn.handler_for(id::play_in::KEEP_ALIVE).is_none());
        conn.transition(ConnectionState::Login);
        conn.transition(ConnectionState::Play);
        assert_eq!(
            conn.handler_for(id::play_in::KEEP_ALIVE),
            Some(PacketHandler::KeepAlive)
        );
    }

    #[test]
    fn verification_is_single_use() {
        let (conn, _rx, _exit) = conn();
        conn.stash_verification([1, 2, 3, 4], "Steve".into());
        assert_eq!(conn.take_verification(), Some(([1, 2, 3, 4], "Steve".to_string())));
        assert!(conn.take_verification().is_none());
    }

    #[test]
    fn liveness_only_pings_in_play() {
        let (conn, _rx, _exit) = conn();
        let now = Instant::now();
        assert_eq!(conn.poll_liveness(now), LivenessAction::Wait);
        conn.transition(ConnectionState::Login);
        conn.transition(ConnectionState::Play);
        let LivenessAction::Ping(id) = conn.poll_liveness(now) else {
            panic!("expected a keep-alive once in play");
        };
        assert_eq!(conn.outstanding_keep_alive(), Some(id));
        assert!(!conn.acknowledge_keep_alive(id ^ 1));
        assert!(conn.acknowledge_keep_alive(id));
        assert_eq!(conn.outstanding_keep_alive(), None);
    }

    #[tokio::test]
    async fn disconnect_sends_state_kick_once() {
        let (conn, rx, exit) = conn();
        conn.transition(ConnectionState::Login);
        conn.transition(ConnectionState::Play);
        let writer = ack_writes(rx);

        conn.disconnect("Timed out.").await;
        conn.disconnect("second call").await;
        assert!(!conn.is_connected());
        assert!(*exit.borrow());
        assert!(!conn.send(OutgoingPacket::new(0x0F, Default::default())));

        let written = writer.await.unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].id, id::play_out::DISCONNECT);
        let mut p = RawPacket::from_slice(written[0].id, &written[0].payload);
        assert_eq!(
            p.read_string(64).unwrap(),
            r#"{"text":"Timed out."}"#
        );
    }

    #[tokio::test]
    async fn login_state_uses_login_disconnect() {
        let (conn, rx, _exit) = conn();
        conn.transition(ConnectionState::Login);
        let writer = ack_writes(rx);
        conn.disconnect("I'm still on 1.12.2.").await;
        let written = writer.await.unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].id, id::login::DISCONNECT);
    }

    #[tokio::test]
    async fn handshake_state_sends_nothing() {
        let (conn, rx, _exit) = conn();
        let writer = ack_writes(rx);
        conn.disconnect("bye").await;
        assert!(writer.await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_disconnects_send_one_kick() {
        let (conn, rx, _exit) = conn();
        conn.transition(ConnectionState::Login);
        let writer = ack_writes(rx);
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let conn = Arc::clone(&conn);
                tokio::spawn(async move { conn.disconnect("Server closed.").await })
            })
            .collect();
        for t in tasks {
            t.await.unwrap();
        }
        assert_eq!(writer.await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn oversized_reason_closes_without_kick() {
        let (conn, rx, exit) = conn();
        conn.transition(ConnectionState::Login);
        conn.transition(ConnectionState::Play);
        let writer = ack_writes(rx);
        conn.disconnect(&"x".repeat(mcj_proto::codec::MAX_STRING_LEN)).await;
        assert!(!conn.is_connected());
        assert!(*exit.borrow());
        assert!(writer.await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn dead_writer_does_not_block_disconnect() {
        let (conn, rx, _exit) = conn();
        conn.transition(ConnectionState::Login);
        // Nobody completes the write.
        drop(rx);
        conn.disconnect("bye").await;
        assert!(!conn.is_connected());
    }
}
