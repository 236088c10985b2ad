//! Socket halves of a connection: the read loop that dispatches inbound
//! frames and the write loop that drains the outbound queue.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use mcj_crypto::{CipherDecryptor, CipherEncryptor};
use mcj_proto::chat::ChatPosition;
use mcj_proto::frame::next_frame;
use mcj_proto::packets::PlayerListItem;
use mcj_proto::{BufferPool, OutgoingPacket, RawPacket};

use super::dispatch::HandlerContext;
use super::{Connection, WriterCommand, KICK_WRITE_TIMEOUT};
use crate::error::ConnectionError;
use crate::server::{wait_for_shutdown, ServerState, SHUTDOWN_REASON};

const READ_CHUNK: usize = 4096;

/// Inbound half: accumulates socket bytes and splits them into frames.
pub(crate) struct ConnectionReader {
    read_half: OwnedReadHalf,
    buf: BytesMut,
    decryptor: Option<CipherDecryptor>,
    pool: BufferPool,
}

impl ConnectionReader {
    pub(crate) fn new(read_half: OwnedReadHalf, pool: BufferPool) -> Self {
        Self {
            read_half,
            buf: BytesMut::with_capacity(READ_CHUNK),
            decryptor: None,
            pool,
        }
    }

    /// Next complete frame, or `None` once the peer has closed the stream.
    pub(crate) async fn next_packet(&mut self) -> Result<Option<RawPacket>, ConnectionError> {
        loop {
            if let Some(packet) = next_frame(&mut self.buf, &self.pool)? {
                return Ok(Some(packet));
            }
            let start = self.buf.len();
            self.buf.reserve(READ_CHUNK);
            if self.read_half.read_buf(&mut self.buf).await? == 0 {
                return Ok(None);
            }
            if let Some(decryptor) = self.decryptor.as_mut() {
                decryptor.decrypt(&mut self.buf[start..]);
            }
        }
    }

    /// Decrypt everything from here on, including bytes already buffered
    /// but not yet framed.
    pub(crate) fn enable_decryption(&mut self, mut decryptor: CipherDecryptor) {
        decryptor.decrypt(&mut self.buf[..]);
        self.decryptor = Some(decryptor);
    }
}

async fn write_loop(
    conn: Arc<Connection>,
    mut writer: OwnedWriteHalf,
    mut outbound: mpsc::UnboundedReceiver<WriterCommand>,
) {
    let mut encryptor: Option<CipherEncryptor> = None;
    while let Some(command) = outbound.recv().await {
        match command {
            WriterCommand::EnableEncryption(enc) => encryptor = Some(enc),
            WriterCommand::Packet { packet, written } => {
                let mut frame = packet.encode();
                if let Some(enc) = encryptor.as_mut() {
                    enc.encrypt(&mut frame);
                }
                if let Err(e) = writer.write_all(&frame).await {
                    debug!("{}: write failed: {e}", conn.peer());
                    conn.disconnect("").await;
                    return;
                }
                if let Some(done) = written {
                    let _ = done.send(());
                }
            }
        }
    }
    let _ = writer.shutdown().await;
}

/// Drive one accepted client until it disconnects.
pub async fn handle_connection(stream: TcpStream, peer: SocketAddr, server: Arc<ServerState>) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("{peer}: could not set TCP_NODELAY: {e}");
    }
    let (conn, outbound, mut exit) = Connection::new(server.next_connection_id(), peer);
    let (read_half, write_half) = stream.into_split();
    let writer = tokio::spawn(write_loop(Arc::clone(&conn), write_half, outbound));
    let mut reader = ConnectionReader::new(read_half, server.pool.clone());
    debug!("{peer}: connected");

    match read_loop(&conn, &server, &mut reader, &mut exit).await {
        Ok(()) => conn.disconnect("").await,
        Err(ConnectionError::Io(e)) => {
            debug!("{peer}: connection lost: {e}");
            conn.disconnect("").await;
        }
        Err(e) => {
            warn!("{peer}: {e}");
            conn.disconnect(&format!("Internal Exception: {e}")).await;
        }
    }

    if let Some(profile) = conn.profile() {
        if server.registry.remove(&profile.id, conn.id()) {
            info!("{} left the game", profile.name);
            server
                .registry
                .broadcast(&OutgoingPacket::from_packet(&PlayerListItem::Remove(vec![profile.id])));
            server
                .registry
                .broadcast_chat(&format!("{} left the game", profile.name), ChatPosition::System);
        }
    }

    // The writer finishes once the queue drains; a stalled socket is cut off.
    if tokio::time::timeout(KICK_WRITE_TIMEOUT, writer).await.is_err() {
        debug!("{peer}: write loop did not finish, dropping it");
    }
    debug!("{peer}: closed");
}

async fn read_loop(
    conn: &Arc<Connection>,
    server: &Arc<ServerState>,
    reader: &mut ConnectionReader,
    exit: &mut watch::Receiver<bool>,
) -> Result<(), ConnectionError> {
    let mut shutdown = server.subscribe_shutdown();
    loop {
        let mut packet = tokio::select! {
            next = reader.next_packet() => match next? {
                Some(packet) => packet,
                None => {
                    debug!("{}: closed by peer", conn.peer());
                    return Ok(());
                }
            },
            _ = exit.changed() => return Ok(()),
            _ = wait_for_shutdown(&mut shutdown) => {
                conn.disconnect(SHUTDOWN_REASON).await;
                return Ok(());
            }
        };

        let Some(handler) = conn.handler_for(packet.id()) else {
            debug!(
                "{}: ignoring packet 0x{:02X} in {:?}",
                conn.peer(),
                packet.id(),
                conn.state()
            );
            server.pool.release(packet);
            continue;
        };

        let mut ctx = HandlerContext {
            conn,
            server,
            reader: &mut *reader,
        };
        handler.invoke(&mut ctx, &mut packet).await?;
        server.pool.release(packet);

        if !conn.is_connected() {
            return Ok(());
        }
    }
}
