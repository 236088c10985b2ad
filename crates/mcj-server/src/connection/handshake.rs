use tracing::debug;

use mcj_proto::packets::{Handshake, NextState, Ping, Pong, StatusResponsePacket};
use mcj_proto::RawPacket;

use super::dispatch::HandlerContext;
use super::ConnectionState;
use crate::error::ConnectionError;

pub(super) async fn handshake(
    ctx: &mut HandlerContext<'_>,
    packet: &mut RawPacket,
) -> Result<(), ConnectionError> {
    let handshake: Handshake = packet.decode()?;
    ctx.conn.set_protocol_version(handshake.protocol_version);

    match handshake.next_state {
        NextState::Status => {
            let response = StatusResponsePacket {
                status: ctx.server.status(),
            };
            ctx.conn.send(response.to_packet()?);
        }
        NextState::Login => {
            ctx.conn.transition(ConnectionState::Login);
        }
        NextState::Unknown(next) => {
            debug!(
                "{}: handshake asked for unknown state {next}",
                ctx.conn.peer()
            );
        }
    }
    Ok(())
}

pub(super) async fn ping(
    ctx: &mut HandlerContext<'_>,
    packet: &mut RawPacket,
) -> Result<(), ConnectionError> {
    let ping: Ping = packet.decode()?;
    ctx.conn.send_packet(&Pong {
        payload: ping.payload,
    });
    Ok(())
}
