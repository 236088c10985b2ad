//! Play state handlers. Each reads one packet and updates its own
//! connection; none of them block.

use std::sync::Arc;

use tracing::{debug, info, trace};

use mcj_proto::chat::{strip_codes, ChatPosition};
use mcj_proto::packets::{
    Animation, ChatMessage, ClickWindow, ClientSettings, ClientStatus, CloseWindow, KeepAliveIn,
    PlayerLook, PlayerPosition, PlayerPositionAndLookIn, PluginMessage, TeleportConfirm,
};
use mcj_proto::RawPacket;

use super::dispatch::HandlerContext;
use crate::console::CommandSender;
use crate::error::ConnectionError;

pub(super) fn teleport_confirm(
    ctx: &mut HandlerContext<'_>,
    packet: &mut RawPacket,
) -> Result<(), ConnectionError> {
    let confirm: TeleportConfirm = packet.decode()?;
    if !ctx.conn.confirm_teleport(confirm.teleport_id) {
        debug!(
            "{}: unexpected teleport confirm {}",
            ctx.conn.peer(),
            confirm.teleport_id
        );
    }
    Ok(())
}

pub(super) async fn chat_message(
    ctx: &mut HandlerContext<'_>,
    packet: &mut RawPacket,
) -> Result<(), ConnectionError> {
    let chat: ChatMessage = packet.decode()?;
    let name = ctx.conn.name().unwrap_or_default();
    if let Some(command) = chat.message.strip_prefix('/') {
        info!("{name} issued server command: /{command}");
        let sender = CommandSender::Player(Arc::clone(ctx.conn));
        ctx.server
            .commands
            .dispatch(ctx.server, &sender, command)
            .await;
        return Ok(());
    }
    let line = format!("{name} > {}", chat.message);
    info!("{}", strip_codes(&line));
    ctx.server.registry.broadcast_chat(&line, ChatPosition::Chat);
    Ok(())
}

pub(super) fn client_status(
    ctx: &mut HandlerContext<'_>,
    packet: &mut RawPacket,
) -> Result<(), ConnectionError> {
    let status: ClientStatus = packet.decode()?;
    debug!("{}: client status {:?}", ctx.conn.peer(), status.action);
    Ok(())
}

pub(super) fn client_settings(
    ctx: &mut HandlerContext<'_>,
    packet: &mut RawPacket,
) -> Result<(), ConnectionError> {
    let settings: ClientSettings = packet.decode()?;
    debug!(
        "{}: locale {}, view distance {}",
        ctx.conn.peer(),
        settings.locale,
        settings.view_distance
    );
    ctx.conn.with_player_mut(|player| player.settings = settings);
    Ok(())
}

pub(super) fn click_window(
    ctx: &mut HandlerContext<'_>,
    packet: &mut RawPacket,
) -> Result<(), ConnectionError> {
    let click: ClickWindow = packet.decode()?;
    debug!(
        "{}: click in window {} slot {}",
        ctx.conn.peer(),
        click.window_id,
        click.slot
    );
    Ok(())
}

pub(super) fn close_window(
    ctx: &mut HandlerContext<'_>,
    packet: &mut RawPacket,
) -> Result<(), ConnectionError> {
    let close: CloseWindow = packet.decode()?;
    debug!("{}: closed window {}", ctx.conn.peer(), close.window_id);
    Ok(())
}

pub(super) fn plugin_message(
    ctx: &mut HandlerContext<'_>,
    packet: &mut RawPacket,
) -> Result<(), ConnectionError> {
    let message: PluginMessage = packet.decode()?;
    debug!(
        "{}: plugin message on {} ({} bytes)",
        ctx.conn.peer(),
        message.channel,
        message.data.len()
    );
    Ok(())
}

pub(super) fn keep_alive(
    ctx: &mut HandlerContext<'_>,
    packet: &mut RawPacket,
) -> Result<(), ConnectionError> {
    let echo: KeepAliveIn = packet.decode()?;
    if !ctx.conn.acknowledge_keep_alive(echo.id) {
        trace!(
            "{}: stale keep-alive {} (waiting for {:?})",
            ctx.conn.peer(),
            echo.id,
            ctx.conn.outstanding_keep_alive()
        );
    }
    Ok(())
}

pub(super) fn player_position(
    ctx: &mut HandlerContext<'_>,
    packet: &mut RawPacket,
) -> Result<(), ConnectionError> {
    let pos: PlayerPosition = packet.decode()?;
    ctx.conn.with_player_mut(|player| {
        player.location.x = pos.x;
        player.location.y = pos.feet_y;
        player.location.z = pos.z;
    });
    Ok(())
}

pub(super) fn player_position_and_look(
    ctx: &mut HandlerContext<'_>,
    packet: &mut RawPacket,
) -> Result<(), ConnectionError> {
    let pos: PlayerPositionAndLookIn = packet.decode()?;
    ctx.conn.with_player_mut(|player| {
        player.location.x = pos.x;
        player.location.y = pos.feet_y;
        player.location.z = pos.z;
        player.location.yaw = pos.yaw;
        player.location.pitch = pos.pitch;
    });
    Ok(())
}

pub(super) fn player_look(
    ctx: &mut HandlerContext<'_>,
    packet: &mut RawPacket,
) -> Result<(), ConnectionError> {
    let look: PlayerLook = packet.decode()?;
    ctx.conn.with_player_mut(|player| {
        player.location.yaw = look.yaw;
        player.location.pitch = look.pitch;
    });
    Ok(())
}

pub(super) fn animation(
    ctx: &mut HandlerContext<'_>,
    packet: &mut RawPacket,
) -> Result<(), ConnectionError> {
    let animation: Animation = packet.decode()?;
    trace!("{}: swing hand {}", ctx.conn.peer(), animation.hand);
    Ok(())
}
