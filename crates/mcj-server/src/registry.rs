//! Logged-in players, keyed by profile id.
//!
//! This is the only server-wide lock. Iteration takes a snapshot under the
//! lock and runs the action outside it, so actions may freely join, leave,
//! or lock their own connection.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::warn;

use mcj_proto::chat::ChatPosition;
use mcj_proto::packets::ChatMessageOut;
use mcj_proto::profile::GameProfile;
use mcj_proto::{OutgoingPacket, Uuid};

use crate::connection::{Connection, ConnectionState};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    #[error("You already logged in with this account.")]
    AlreadyLoggedIn,
}

struct Entry {
    name: String,
    conn: Arc<Connection>,
}

#[derive(Default)]
pub struct Registry {
    players: Mutex<HashMap<Uuid, Entry>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn players(&self) -> MutexGuard<'_, HashMap<Uuid, Entry>> {
        self.players.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert `conn` under the profile's id unless that id or name is
    /// already online. Check and insert happen under one lock.
    pub fn try_admit(&self, profile: &GameProfile, conn: Arc<Connection>) -> Result<(), AdmissionError> {
        let mut players = self.players();
        if players.contains_key(&profile.id)
            || players
                .values()
                .any(|entry| entry.name.eq_ignore_ascii_case(&profile.name))
        {
            return Err(AdmissionError::AlreadyLoggedIn);
        }
        players.insert(
            profile.id,
            Entry {
                name: profile.name.clone(),
                conn,
            },
        );
        Ok(())
    }

    /// Remove `id` if it is still held by connection `conn_id`.
    pub fn remove(&self, id: &Uuid, conn_id: u64) -> bool {
        let mut players = self.players();
        match players.get(id) {
            Some(entry) if entry.conn.id() == conn_id => {
                players.remove(id);
                true
            }
            _ => false,
        }
    }

    pub fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.players()
            .values()
            .map(|entry| Arc::clone(&entry.conn))
            .collect()
    }

    /// Run `action` on every connection registered at the time of the call.
    pub fn for_each(&self, mut action: impl FnMut(&Arc<Connection>)) {
        for conn in self.snapshot() {
            action(&conn);
        }
    }

    /// Queue `packet` for every player in play.
    pub fn broadcast(&self, packet: &OutgoingPacket) {
        self.for_each(|conn| {
            if conn.state() == ConnectionState::Play {
                conn.send(packet.clone());
            }
        });
    }

    /// Send a chat line to every player in play. A line too long for one
    /// chat packet is dropped.
    pub fn broadcast_chat(&self, text: &str, position: ChatPosition) -> bool {
        match ChatMessageOut::text(text, position).to_packet() {
            Ok(packet) => {
                self.broadcast(&packet);
                true
            }
            Err(e) => {
                warn!("Dropping chat broadcast: {e}");
                false
            }
        }
    }

    /// Like [`broadcast`](Self::broadcast), skipping connection `conn_id`.
    pub fn broadcast_except(&self, packet: &OutgoingPacket, conn_id: u64) {
        self.for_each(|conn| {
            if conn.id() != conn_id && conn.state() == ConnectionState::Play {
                conn.send(packet.clone());
            }
        });
    }

    /// Case-insensitive lookup by player name.
    pub fn find_by_name(&self, name: &str) -> Option<Arc<Connection>> {
        self.players()
            .values()
            .find(|entry| entry.name.eq_ignore_ascii_case(name))
            .map(|entry| Arc::clone(&entry.conn))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.players().values().map(|e| e.name.clone()).collect();
        names.sort_unstable_by_key(|n| n.to_lowercase());
        names
    }

    pub fn len(&self) -> usize {
        self.players().len()
    }

    pub fn is_empty(&self) -> bool {
        self.players().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use tokio::sync::mpsc;

    use crate::connection::WriterCommand;

    fn playing(id: u64) -> (Arc<Connection>, mpsc::UnboundedReceiver<WriterCommand>) {
        let (conn, rx, _exit) = Connection::new(id, "127.0.0.1:1".parse().unwrap());
        conn.transition(ConnectionState::Login);
        conn.transition(ConnectionState::Play);
        (conn, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<WriterCommand>) -> usize {
        let mut n = 0;
        while rx.try_recv().is_ok() {
            n += 1;
        }
        n
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let registry = Registry::new();
        let (a, _ra) = playing(1);
        let (b, _rb) = playing(2);
        let profile = GameProfile::offline("Steve");
        registry.try_admit(&profile, a).unwrap();
        assert_eq!(
            registry.try_admit(&profile, b),
            Err(AdmissionError::AlreadyLoggedIn)
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn duplicate_name_is_rejected_case_insensitively() {
        let registry = Registry::new();
        let (a, _ra) = playing(1);
        let (b, _rb) = playing(2);
        registry.try_admit(&GameProfile::offline("Steve"), a).unwrap();
        let mut other = GameProfile::offline("steve");
        other.id = Uuid::new(1, 2);
        assert!(registry.try_admit(&other, b).is_err());
    }

    #[test]
    fn concurrent_duplicate_logins_admit_exactly_one() {
        let registry = Arc::new(Registry::new());
        let profile = GameProfile::offline("Alice");
        let handles: Vec<_> = (0..16u64)
            .map(|i| {
                let registry = Arc::clone(&registry);
                let profile = profile.clone();
                std::thread::spawn(move || {
                    let (conn, _rx) = playing(i);
                    registry.try_admit(&profile, conn).is_ok()
                })
            })
            .collect();
        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(admitted, 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn remove_only_for_owning_connection() {
        let registry = Registry::new();
        let (a, _ra) = playing(1);
        let profile = GameProfile::offline("Steve");
        registry.try_admit(&profile, a).unwrap();
        assert!(!registry.remove(&profile.id, 2));
        assert_eq!(registry.len(), 1);
        assert!(registry.remove(&profile.id, 1));
        assert!(registry.is_empty());
        assert!(!registry.remove(&profile.id, 1));
    }

    #[test]
    fn for_each_visits_the_snapshot_while_membership_changes() {
        let registry = Registry::new();
        let mut keep = Vec::new();
        let mut before = HashSet::new();
        for i in 0..5u64 {
            let (conn, rx) = playing(i);
            registry
                .try_admit(&GameProfile::offline(&format!("p{i}")), conn)
                .unwrap();
            before.insert(i);
            keep.push(rx);
        }

        let mut visited = HashSet::new();
        let mut next = 100u64;
        registry.for_each(|conn| {
            visited.insert(conn.id());
            // Leave and join from inside the action.
            registry.remove(&Uuid::offline_player(&format!("p{}", conn.id())), conn.id());
            let (late, rx) = playing(next);
            registry
                .try_admit(&GameProfile::offline(&format!("late{next}")), late)
                .unwrap();
            keep.push(rx);
            next += 1;
        });

        assert_eq!(visited, before);
        assert_eq!(registry.len(), 5);
        assert!(registry.names().iter().all(|n| n.starts_with("late")));
    }

    #[test]
    fn broadcast_skips_connections_not_in_play() {
        let registry = Registry::new();
        let (a, mut ra) = playing(1);
        let (b, mut rb, _exit) = Connection::new(2, "127.0.0.1:2".parse().unwrap());
        b.transition(ConnectionState::Login);
        registry.try_admit(&GameProfile::offline("a"), a).unwrap();
        registry.try_admit(&GameProfile::offline("b"), b).unwrap();

        registry.broadcast(&OutgoingPacket::new(0x0F, Default::default()));
        assert_eq!(drain(&mut ra), 1);
        assert_eq!(drain(&mut rb), 0);
    }

    #[test]
    fn broadcast_except_skips_sender() {
        let registry = Registry::new();
        let (a, mut ra) = playing(1);
        let (b, mut rb) = playing(2);
        registry.try_admit(&GameProfile::offline("a"), a).unwrap();
        registry.try_admit(&GameProfile::offline("b"), b).unwrap();
        registry.broadcast_except(&OutgoingPacket::new(0x2E, Default::default()), 1);
        assert_eq!(drain(&mut ra), 0);
        assert_eq!(drain(&mut rb), 1);
    }

    #[test]
    fn find_by_name_ignores_case() {
        let registry = Registry::new();
        let (a, _ra) = playing(7);
        registry.try_admit(&GameProfile::offline("Notch"), a).unwrap();
        assert_eq!(registry.find_by_name("notch").map(|c| c.id()), Some(7));
        assert!(registry.find_by_name("jeb_").is_none());
    }

    #[test]
    fn concurrent_broadcast_while_joining_and_leaving() {
        let registry = Arc::new(Registry::new());
        let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let churn = {
            let registry = Arc::clone(&registry);
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || {
                let mut i = 0u64;
                while !stop.load(std::sync::atomic::Ordering::Relaxed) {
                    let (conn, _rx) = playing(i);
                    let profile = GameProfile::offline(&format!("c{}", i % 8));
                    if registry.try_admit(&profile, conn).is_err() {
                        registry.remove(&profile.id, i - 8);
                    }
                    i += 1;
                }
            })
        };
        let broadcasters: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        registry.broadcast(&OutgoingPacket::new(0x0F, Default::default()));
                    }
                })
            })
            .collect();
        for b in broadcasters {
            b.join().unwrap();
        }
        stop.store(true, std::sync::atomic::Ordering::Relaxed);
        churn.join().unwrap();
        assert!(registry.len() <= 8);
    }
}
