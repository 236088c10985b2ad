//! Command dispatch for the operator console and for players typing `/`
//! commands in chat.

use std::collections::HashMap;
use std::io::BufRead;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use mcj_proto::chat::ChatPosition;
use mcj_proto::packets::ChatMessageOut;
use mcj_proto::Uuid;

use crate::connection::Connection;
use crate::server::ServerState;

/// Permission names checked against a player's grants.
pub mod permission {
    /// Granted to every player on join.
    pub const BASE: &str = "server.command.base";
    pub const BROADCAST: &str = "server.command.say";
    pub const BAN: &str = "server.command.ban";
    pub const STOP: &str = "server.command.stop";
}

pub const NO_PERMISSION: &str = "You do not have permission to use this command.";

/// Who issued a command.
#[derive(Debug, Clone)]
pub enum CommandSender {
    /// The operator console holds every permission.
    Console,
    Player(Arc<Connection>),
}

impl CommandSender {
    pub fn has_permission(&self, permission: &str) -> bool {
        match self {
            CommandSender::Console => true,
            CommandSender::Player(conn) => conn
                .with_player(|p| p.has_permission(permission))
                .unwrap_or(false),
        }
    }

    pub fn name(&self) -> String {
        match self {
            CommandSender::Console => "Console".to_string(),
            CommandSender::Player(conn) => conn.name().unwrap_or_default(),
        }
    }

    /// Deliver command output: the log for the console, system chat for a
    /// player.
    fn tell(&self, line: &str, success: bool) {
        match self {
            CommandSender::Console if success => info!("{line}"),
            CommandSender::Console => warn!("{line}"),
            CommandSender::Player(conn) => {
                match ChatMessageOut::text(line, ChatPosition::System).to_packet() {
                    Ok(packet) => {
                        conn.send(packet);
                    }
                    Err(e) => warn!("Dropping command output for {}: {e}", self.name()),
                }
            }
        }
    }
}

/// What a command may look at.
pub struct CommandContext<'a> {
    pub server: &'a ServerState,
    pub sender: &'a CommandSender,
    /// Every registered command, for `help`.
    pub commands: &'a HashMap<&'static str, CommandEntry>,
    /// Arguments after the command name.
    pub args: Vec<String>,
}

/// Outcome of one command, applied by [`Console::apply`].
#[derive(Default)]
pub struct CommandResult {
    pub success: bool,
    /// Lines for the sender.
    pub messages: Vec<String>,
    /// System message for every player.
    pub broadcast: Option<String>,
    /// Connection to kick, with the reason.
    pub kick: Option<(Arc<Connection>, String)>,
    pub should_stop: bool,
}

impl CommandResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            messages: vec![message.into()],
            ..Self::default()
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            messages: vec![message.into()],
            ..Self::default()
        }
    }
}

pub type CommandFn = fn(&CommandContext<'_>) -> CommandResult;

pub struct CommandEntry {
    pub description: &'static str,
    /// Needed to run the command.
    pub permission: &'static str,
    pub handler: CommandFn,
}

pub struct Console {
    commands: HashMap<&'static str, CommandEntry>,
}

impl Console {
    pub fn new() -> Self {
        let mut console = Self {
            commands: HashMap::new(),
        };
        console.register("help", "List available commands", permission::BASE, cmd_help);
        console.register("list", "Show online players", permission::BASE, cmd_list);
        console.register(
            "say",
            "Broadcast a message to all players",
            permission::BROADCAST,
            cmd_say,
        );
        console.register(
            "ban",
            "Ban an online player: ban <player> [reason]",
            permission::BAN,
            cmd_ban,
        );
        console.register("pardon", "Lift a ban: pardon <uuid>", permission::BAN, cmd_pardon);
        console.register("stop", "Stop the server", permission::STOP, cmd_stop);
        console
    }

    fn register(
        &mut self,
        name: &'static str,
        description: &'static str,
        permission: &'static str,
        handler: CommandFn,
    ) {
        self.commands.insert(
            name,
            CommandEntry {
                description,
                permission,
                handler,
            },
        );
    }

    /// Parse and run one command line.
    pub fn execute(&self, server: &ServerState, sender: &CommandSender, line: &str) -> CommandResult {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return CommandResult::err("Empty command.");
        };
        let name = name.trim_start_matches('/').to_lowercase();
        let args: Vec<String> = words.map(String::from).collect();

        let Some(entry) = self.commands.get(name.as_str()) else {
            return CommandResult::err(format!(
                "Unknown command: {name}. Type help for a list of commands."
            ));
        };
        if !sender.has_permission(entry.permission) {
            return CommandResult::err(NO_PERMISSION);
        }
        (entry.handler)(&CommandContext {
            server,
            sender,
            commands: &self.commands,
            args,
        })
    }

    /// Carry out a result's side effects.
    pub async fn apply(&self, server: &ServerState, sender: &CommandSender, result: CommandResult) {
        for line in &result.messages {
            sender.tell(line, result.success);
        }
        if let Some(text) = &result.broadcast {
            info!("{text}");
            server.registry.broadcast_chat(text, ChatPosition::System);
        }
        if let Some((conn, reason)) = result.kick {
            conn.disconnect(&reason).await;
        }
        if result.should_stop {
            info!("{} stopped the server", sender.name());
            server.shutdown();
        }
    }

    /// Execute and apply one line on behalf of `sender`.
    pub async fn dispatch(&self, server: &ServerState, sender: &CommandSender, line: &str) {
        let result = self.execute(server, sender, line);
        self.apply(server, sender, result).await;
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

/// Run console lines from `lines` until it closes or shutdown starts.
pub async fn run(server: Arc<ServerState>, mut lines: mpsc::Receiver<String>) {
    let mut shutdown = server.subscribe_shutdown();
    loop {
        tokio::select! {
            line = lines.recv() => match line {
                Some(line) => {
                    server
                        .commands
                        .dispatch(&server, &CommandSender::Console, &line)
                        .await;
                }
                None => break,
            },
            _ = crate::server::wait_for_shutdown(&mut shutdown) => break,
        }
    }
}

/// Forward non-empty stdin lines into a channel.
///
/// Reads on a plain thread so a pending read never holds up runtime shutdown.
pub fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(32);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            let line = line.trim().to_string();
            if !line.is_empty() && tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn cmd_help(ctx: &CommandContext<'_>) -> CommandResult {
    let mut names: Vec<_> = ctx.commands.iter().collect();
    names.sort_by_key(|(name, _)| **name);
    let mut lines = vec!["Available commands:".to_string()];
    lines.extend(
        names
            .into_iter()
            .map(|(name, entry)| format!("  {name} - {}", entry.description)),
    );
    CommandResult {
        success: true,
        messages: lines,
        ..CommandResult::default()
    }
}

fn cmd_list(ctx: &CommandContext<'_>) -> CommandResult {
    let names = ctx.server.registry.names();
    let count = names.len();
    let listed = if names.is_empty() {
        String::new()
    } else {
        format!(": {}", names.join(", "))
    };
    CommandResult::ok(format!(
        "There {verb} {count}/{max} player{s} online{listed}",
        verb = if count == 1 { "is" } else { "are" },
        max = ctx.server.config.server.max_players,
        s = if count == 1 { "" } else { "s" },
    ))
}

fn cmd_say(ctx: &CommandContext<'_>) -> CommandResult {
    if ctx.args.is_empty() {
        return CommandResult::err("Usage: say <message>");
    }
    let from = match ctx.sender {
        CommandSender::Console => "Server".to_string(),
        CommandSender::Player(_) => ctx.sender.name(),
    };
    CommandResult {
        success: true,
        broadcast: Some(format!("[{from}] {}", ctx.args.join(" "))),
        ..CommandResult::default()
    }
}

fn cmd_ban(ctx: &CommandContext<'_>) -> CommandResult {
    let Some(target) = ctx.args.first() else {
        return CommandResult::err("Usage: ban <player> [reason]");
    };
    let Some(conn) = ctx.server.registry.find_by_name(target) else {
        return CommandResult::err(format!("{target} is not online."));
    };
    let Some(profile) = conn.profile() else {
        return CommandResult::err(format!("{target} is still logging in."));
    };

    let reason = ctx.args[1..].join(" ");
    ctx.server.ban(profile.id, &reason);
    let (kick_reason, total) = {
        let bans = ctx.server.bans();
        (bans.reason_for(&profile.id).unwrap_or_default(), bans.len())
    };
    CommandResult {
        success: true,
        messages: vec![format!(
            "Banned {} ({}). {total} player{} banned.",
            profile.name,
            profile.id,
            if total == 1 { " is" } else { "s are" }
        )],
        kick: Some((conn, kick_reason)),
        ..CommandResult::default()
    }
}

fn cmd_pardon(ctx: &CommandContext<'_>) -> CommandResult {
    let Some(arg) = ctx.args.first() else {
        return CommandResult::err("Usage: pardon <uuid>");
    };
    let uuid: Uuid = match arg.parse() {
        Ok(uuid) => uuid,
        Err(e) => return CommandResult::err(format!("Invalid UUID {arg}: {e}")),
    };
    if ctx.server.pardon(&uuid) {
        CommandResult::ok(format!("Pardoned {uuid}"))
    } else {
        CommandResult::err(format!("{uuid} is not banned."))
    }
}

fn cmd_stop(_ctx: &CommandContext<'_>) -> CommandResult {
    CommandResult {
        success: true,
        messages: vec!["Stopping the server...".to_string()],
        should_stop: true,
        ..CommandResult::default()
    }
}
