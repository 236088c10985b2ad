//! Login state: version check, encryption handshake, session finalization.

use std::sync::Arc;

use tracing::{error, info, warn};

use mcj_crypto::cipher::cipher_pair;
use mcj_crypto::generate_verify_token;
use mcj_proto::chat::ChatPosition;
use mcj_proto::packets::{
    EncryptionRequest, EncryptionResponse, JoinGame, LoginStart, LoginSuccess, PlayerAbilities,
    PlayerListItem, PlayerPositionAndLook, PROTOCOL_VERSION, VERSION_NAME,
};
use mcj_proto::profile::GameProfile;
use mcj_proto::{OutgoingPacket, RawPacket};

use super::dispatch::HandlerContext;
use super::ConnectionState;
use crate::error::ConnectionError;
use crate::console::permission;
use crate::player::Player;

pub const INVALID_VERIFY_TOKEN: &str = "Invalid verify token.";
pub const AUTH_UNAVAILABLE: &str = "Could not connect to the authentication servers.";

pub(super) async fn login_start(
    ctx: &mut HandlerContext<'_>,
    packet: &mut RawPacket,
) -> Result<(), ConnectionError> {
    let start: LoginStart = packet.decode()?;

    let version = ctx.conn.protocol_version();
    if version != PROTOCOL_VERSION {
        let reason = if version < PROTOCOL_VERSION {
            format!("Your client is outdated. I'm on {VERSION_NAME}.")
        } else {
            format!("I'm still on {VERSION_NAME}.")
        };
        info!(
            "{}: {} uses protocol {version}, rejecting",
            ctx.conn.peer(),
            start.username
        );
        ctx.conn.disconnect(&reason).await;
        return Ok(());
    }

    if !ctx.server.config.server.online_mode {
        return finalize_session(ctx, GameProfile::offline(&start.username)).await;
    }

    let token = generate_verify_token();
    ctx.conn.stash_verification(token, start.username);
    ctx.conn.send_packet(&EncryptionRequest {
        server_id: String::new(),
        public_key: ctx.server.keys.public_key_der().to_vec(),
        verify_token: token.to_vec(),
    });
    Ok(())
}

pub(super) async fn encryption_response(
    ctx: &mut HandlerContext<'_>,
    packet: &mut RawPacket,
) -> Result<(), ConnectionError> {
    let response: EncryptionResponse = packet.decode()?;
    let peer = ctx.conn.peer();

    // The stash is consumed whatever the outcome.
    let Some((token, username)) = ctx.conn.take_verification() else {
        warn!("{peer}: encryption response without a pending request");
        ctx.conn.disconnect(INVALID_VERIFY_TOKEN).await;
        return Ok(());
    };
    let token_matches = ctx
        .server
        .keys
        .decrypt(&response.verify_token)
        .map(|decrypted| decrypted == token)
        .unwrap_or(false);
    if !token_matches {
        warn!("{peer}: verify token mismatch for {username}");
        ctx.conn.disconnect(INVALID_VERIFY_TOKEN).await;
        return Ok(());
    }

    let secret = ctx.server.keys.decrypt(&response.shared_secret)?;
    let (encryptor, decryptor) = cipher_pair(&secret)?;
    ctx.reader.enable_decryption(decryptor);
    ctx.conn.enable_encryption(encryptor);

    let profile = match ctx
        .server
        .auth
        .authenticate(&username, &secret, ctx.server.keys.public_key_der())
        .await
    {
        Ok(profile) => profile,
        Err(e) => {
            error!("{peer}: could not authenticate {username}: {e}");
            ctx.conn.disconnect(AUTH_UNAVAILABLE).await;
            return Ok(());
        }
    };
    ctx.conn.set_shared_secret(secret);
    finalize_session(ctx, profile).await
}

/// Admit the player and send the join sequence.
///
/// Admission runs before login success so a rejection still goes out as a
/// login disconnect the client can display.
pub(super) async fn finalize_session(
    ctx: &mut HandlerContext<'_>,
    profile: GameProfile,
) -> Result<(), ConnectionError> {
    let conn = ctx.conn;
    let server = ctx.server;

    if let Err(reason) = server.admission_check(&profile) {
        info!("{}: {} was refused: {reason}", conn.peer(), profile.name);
        conn.disconnect(&reason).await;
        return Ok(());
    }

    let mut player = Player::new(
        profile.clone(),
        server.next_entity_id(),
        server.config.server.gamemode,
    );
    player.set_permission(permission::BASE, true);
    let entity_id = player.entity_id;
    let gamemode = player.gamemode;
    let spawn = player.location;
    conn.set_player(player);

    if let Err(e) = server.registry.try_admit(&profile, Arc::clone(conn)) {
        info!("{}: {} was refused: {e}", conn.peer(), profile.name);
        conn.disconnect(&e.to_string()).await;
        return Ok(());
    }

    conn.send_packet(&LoginSuccess {
        uuid: profile.id,
        username: profile.name.clone(),
    });
    conn.send_packet(&JoinGame {
        entity_id,
        gamemode: gamemode as u8,
        dimension: 0,
        difficulty: 0,
        max_players: server.config.server.max_players.min(u8::MAX as u32) as u8,
        level_type: "default".to_string(),
        reduced_debug_info: false,
    });
    let teleport_id = rand::random();
    conn.set_pending_teleport(teleport_id);
    conn.send_packet(&PlayerPositionAndLook {
        x: spawn.x,
        y: spawn.y,
        z: spawn.z,
        yaw: spawn.yaw,
        pitch: spawn.pitch,
        flags: 0,
        teleport_id,
    });
    conn.send_packet(&PlayerAbilities {
        flags: 0,
        flying_speed: 0.05,
        fov_modifier: 0.1,
    });

    // Broadcasts only reach connections in play, so nothing lands ahead of
    // the join sequence above.
    conn.transition(ConnectionState::Play);

    let everyone: Vec<_> = server
        .registry
        .snapshot()
        .iter()
        .filter_map(|peer| peer.with_player(Player::list_entry))
        .collect();
    conn.send_packet(&PlayerListItem::Add(everyone));
    if let Some(entry) = conn.with_player(Player::list_entry) {
        server.registry.broadcast_except(
            &OutgoingPacket::from_packet(&PlayerListItem::Add(vec![entry])),
            conn.id(),
        );
    }
    server
        .registry
        .broadcast_chat(&format!("{} joined the game", profile.name), ChatPosition::System);

    info!(
        "{} ({}) joined from {}{}",
        profile.name,
        profile.id,
        conn.peer(),
        if conn.is_encrypted() { "" } else { " (offline)" }
    );
    Ok(())
}
