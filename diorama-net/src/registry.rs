//! Peer registry: the live sessions of this node
//!
//! One entry per open peer session, holding the session's outbound frame
//! queue. Volatile network-layer state — reset on restart, mutated only by
//! the sync engine's session lifecycle handlers.

use diorama_model::PeerId;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Instant;
use tokio::sync::mpsc;

/// Handle to one live peer session.
#[derive(Clone)]
pub struct SessionHandle {
    peer: PeerId,
    outbound: mpsc::Sender<Vec<u8>>,
    opened_at: Instant,
}

impl SessionHandle {
    pub fn peer(&self) -> PeerId {
        self.peer
    }

    pub fn opened_at(&self) -> Instant {
        self.opened_at
    }

    /// Queue an encoded frame for this session, without blocking.
    ///
    /// Returns false if the session's queue is full or its writer has shut
    /// down; the caller logs and moves on to the remaining peers.
    pub fn send(&self, frame: Vec<u8>) -> bool {
        self.outbound.try_send(frame).is_ok()
    }
}

/// The set of currently-open peer sessions.
pub struct PeerRegistry {
    sessions: RwLock<HashMap<PeerId, SessionHandle>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Add a session. Returns true if the peer was new; re-registering
    /// replaces the previous session (its queue closes, its writer exits).
    pub fn register(&self, peer: PeerId, outbound: mpsc::Sender<Vec<u8>>) -> Result<bool, String> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| "lock poisoned".to_string())?;
        let handle = SessionHandle {
            peer,
            outbound,
            opened_at: Instant::now(),
        };
        Ok(sessions.insert(peer, handle).is_none())
    }

    /// Remove a session. Idempotent; returns true if it was present.
    pub fn unregister(&self, peer: &PeerId) -> Result<bool, String> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| "lock poisoned".to_string())?;
        Ok(sessions.remove(peer).is_some())
    }

    /// Remove a session only if it is still the one identified by
    /// `outbound`. A session replaced by a reconnect must not tear down its
    /// successor when its own reader finally exits.
    pub fn unregister_session(
        &self,
        peer: &PeerId,
        outbound: &mpsc::Sender<Vec<u8>>,
    ) -> Result<bool, String> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| "lock poisoned".to_string())?;
        if let Some(current) = sessions.get(peer) {
            if current.outbound.same_channel(outbound) {
                sessions.remove(peer);
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Snapshot of every live session. No ordering guarantee.
    pub fn all(&self) -> Result<Vec<SessionHandle>, String> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| "lock poisoned".to_string())?;
        Ok(sessions.values().cloned().collect())
    }

    /// Every live session except one — the relay set for a frame received
    /// from `peer`.
    pub fn all_except(&self, peer: &PeerId) -> Result<Vec<SessionHandle>, String> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| "lock poisoned".to_string())?;
        Ok(sessions
            .values()
            .filter(|s| s.peer != *peer)
            .cloned()
            .collect())
    }

    pub fn get(&self, peer: &PeerId) -> Result<Option<SessionHandle>, String> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| "lock poisoned".to_string())?;
        Ok(sessions.get(peer).cloned())
    }

    /// Currently-connected peer ids.
    pub fn peers(&self) -> Result<Vec<PeerId>, String> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| "lock poisoned".to_string())?;
        Ok(sessions.keys().copied().collect())
    }

    pub fn len(&self) -> Result<usize, String> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| "lock poisoned".to_string())?;
        Ok(sessions.len())
    }

    pub fn is_empty(&self) -> Result<bool, String> {
        Ok(self.len()? == 0)
    }
}

impl Default for PeerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle_pair() -> (mpsc::Sender<Vec<u8>>, mpsc::Receiver<Vec<u8>>) {
        mpsc::channel(4)
    }

    #[test]
    fn test_register_unregister_idempotent() {
        let registry = PeerRegistry::new();
        let peer = PeerId::from([1; 32]);
        let (tx, _rx) = handle_pair();

        assert!(registry.register(peer, tx.clone()).unwrap());
        assert!(!registry.register(peer, tx).unwrap()); // replace, not new
        assert!(registry.unregister(&peer).unwrap());
        assert!(!registry.unregister(&peer).unwrap()); // already gone
    }

    #[test]
    fn test_all_except_excludes_only_the_sender() {
        let registry = PeerRegistry::new();
        let a = PeerId::from([1; 32]);
        let b = PeerId::from([2; 32]);
        let c = PeerId::from([3; 32]);
        let mut rxs = Vec::new();
        for peer in [a, b, c] {
            let (tx, rx) = handle_pair();
            registry.register(peer, tx).unwrap();
            rxs.push(rx);
        }

        let relay: Vec<PeerId> = registry
            .all_except(&b)
            .unwrap()
            .iter()
            .map(|s| s.peer())
            .collect();
        assert_eq!(relay.len(), 2);
        assert!(relay.contains(&a));
        assert!(relay.contains(&c));
        assert!(!relay.contains(&b));
    }

    #[test]
    fn test_replaced_session_survives_old_teardown() {
        let registry = PeerRegistry::new();
        let peer = PeerId::from([5; 32]);
        let (old_tx, _old_rx) = handle_pair();
        let (new_tx, _new_rx) = handle_pair();

        registry.register(peer, old_tx.clone()).unwrap();
        registry.register(peer, new_tx.clone()).unwrap(); // reconnect

        // The stale session's teardown must not remove the replacement.
        assert!(!registry.unregister_session(&peer, &old_tx).unwrap());
        assert_eq!(registry.len().unwrap(), 1);
        assert!(registry.unregister_session(&peer, &new_tx).unwrap());
        assert!(registry.is_empty().unwrap());
    }

    #[test]
    fn test_send_to_closed_session_reports_failure() {
        let registry = PeerRegistry::new();
        let peer = PeerId::from([7; 32]);
        let (tx, rx) = handle_pair();
        registry.register(peer, tx).unwrap();
        drop(rx); // writer gone

        let session = registry.get(&peer).unwrap().unwrap();
        assert!(!session.send(vec![1, 2, 3]));
    }
}
