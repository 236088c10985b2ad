mod auth;
mod bans;
mod config;
mod connection;
mod console;
mod error;
mod liveness;
mod player;
mod registry;
mod server;


use std::sync::Arc;

use tracing::{error, info};

use mcj_crypto::ServerKeyPair;
use mcj_proto::packets::{PROTOCOL_VERSION, VERSION_NAME};

use auth::{AuthGateway, SessionServer};
use bans::{BanList, BANNED_PLAYERS_FILE};
use config::{load_favicon, ServerConfig};
use server::{Server, ServerState};

const CONFIG_FILE: &str = "server.toml";
const FAVICON_FILE: &str = "server-icon.png";

#[tokio::main]
async fn main() {
    let config = match ServerConfig::load_or_create(CONFIG_FILE) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load {CONFIG_FILE}: {e}");
            std::process::exit(1);
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(
        "mcj-server v{} for {VERSION_NAME} (protocol {PROTOCOL_VERSION}) starting on {}",
        env!("CARGO_PKG_VERSION"),
        config.bind_address()
    );
    info!("MOTD: {}", config.server.motd);
    info!("Max players: {}", config.server.max_players);
    info!("Online mode: {}", config.server.online_mode);

    let keys = match ServerKeyPair::generate() {
        Ok(keys) => keys,
        Err(e) => {
            error!("Failed to generate the server key pair: {e}");
            std::process::exit(1);
        }
    };
    let bans = BanList::load(BANNED_PLAYERS_FILE);
    if !bans.is_empty() {
        info!("Loaded {} bans from {BANNED_PLAYERS_FILE}", bans.len());
    }
    let auth: Arc<dyn AuthGateway> = Arc::new(SessionServer::new());
    let state = Arc::new(ServerState::new(
        config,
        keys,
        auth,
        bans,
        load_favicon(FAVICON_FILE),
    ));

    let server = match Server::bind(Arc::clone(&state)).await {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to bind {}: {e}", state.config.bind_address());
            std::process::exit(1);
        }
    };

    let ctrlc_state = Arc::clone(&state);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received");
        ctrlc_state.shutdown();
    });

    let console = tokio::spawn(console::run(Arc::clone(&state), console::spawn_stdin_reader()));

    server.run().await;
    console.abort();
    info!("Goodbye");
}
