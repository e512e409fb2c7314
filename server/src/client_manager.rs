//! Connection bookkeeping for the room server
//!
//! Every datagram arrives with nothing but a socket address. This module maps
//! that address to a client record and the player actor behind it:
//! - Binding a socket address to the player actor it controls
//! - Dropping duplicate or stale action packets by sequence number
//! - Spotting clients that went silent
//! - Enforcing the seat limit and listing addresses for broadcasts
//!
//! Game rules stay in the room. The network layer asks here who sent a
//! packet and then routes the action there.

use log::info;
use shared::ActorId;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// One connected peer and the player actor it drives
#[derive(Debug, Clone)]
pub struct Client {
    pub id: u32,
    pub addr: SocketAddr,
    pub actor_id: ActorId,
    /// Refreshed by every packet the peer sends
    pub last_seen: Instant,
    /// Newest action sequence number accepted so far
    pub last_sequence: u32,
}

impl Client {
    pub fn new(id: u32, addr: SocketAddr, actor_id: ActorId) -> Self {
        Self {
            id,
            addr,
            actor_id,
            last_seen: Instant::now(),
            last_sequence: 0,
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Accepts `sequence` only if it is newer than anything seen before.
    pub fn accept_sequence(&mut self, sequence: u32) -> bool {
        if sequence <= self.last_sequence {
            return false;
        }
        self.last_sequence = sequence;
        true
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Seats, addresses and liveness of every connected client
pub struct ClientManager {
    clients: HashMap<u32, Client>,
    by_addr: HashMap<SocketAddr, u32>,
    next_client_id: u32,
    max_clients: usize,
    timeout: Duration,
}

impl ClientManager {
    /// Client ids are handed out from 1 and never reused.
    pub fn new(max_clients: usize, timeout: Duration) -> Self {
        Self {
            clients: HashMap::new(),
            by_addr: HashMap::new(),
            next_client_id: 1,
            max_clients,
            timeout,
        }
    }

    pub fn is_full(&self) -> bool {
        self.clients.len() >= self.max_clients
    }

    /// Seats a client at `addr` controlling `actor_id`.
    ///
    /// Returns the new client id, or None when every seat is taken or the
    /// address is already seated.
    pub fn add_client(&mut self, addr: SocketAddr, actor_id: ActorId) -> Option<u32> {
        if self.is_full() || self.by_addr.contains_key(&addr) {
            return None;
        }

        let id = self.next_client_id;
        self.next_client_id += 1;
        self.clients.insert(id, Client::new(id, addr, actor_id));
        self.by_addr.insert(addr, id);

        info!("Client {} at {} now drives actor {}", id, addr, actor_id);
        Some(id)
    }

    /// Frees a seat, handing back the record so the caller can release its actor
    pub fn remove_client(&mut self, client_id: u32) -> Option<Client> {
        let client = self.clients.remove(&client_id)?;
        self.by_addr.remove(&client.addr);
        info!("Client {} at {} left", client.id, client.addr);
        Some(client)
    }

    pub fn get(&self, client_id: u32) -> Option<&Client> {
        self.clients.get(&client_id)
    }

    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<&Client> {
        self.by_addr.get(&addr).and_then(|id| self.clients.get(id))
    }

    fn client_at_mut(&mut self, addr: SocketAddr) -> Option<&mut Client> {
        let id = self.by_addr.get(&addr)?;
        self.clients.get_mut(id)
    }

    /// Marks the client at `addr` as alive. Returns its actor id when known.
    pub fn touch(&mut self, addr: SocketAddr) -> Option<ActorId> {
        let client = self.client_at_mut(addr)?;
        client.touch();
        Some(client.actor_id)
    }

    /// Refreshes the sender and filters the action by sequence number.
    ///
    /// Returns the actor to route the action to, or None for an unknown
    /// sender, a duplicate, or a packet overtaken by a newer one.
    pub fn record_sequence(&mut self, addr: SocketAddr, sequence: u32) -> Option<ActorId> {
        let client = self.client_at_mut(addr)?;
        client.touch();
        client
            .accept_sequence(sequence)
            .then_some(client.actor_id)
    }

    /// Unseats and returns every client silent for longer than the timeout
    pub fn check_timeouts(&mut self) -> Vec<Client> {
        let timeout = self.timeout;
        let silent: Vec<u32> = self
            .clients
            .values()
            .filter(|client| client.is_timed_out(timeout))
            .map(|client| client.id)
            .collect();

        silent
            .into_iter()
            .filter_map(|id| self.remove_client(id))
            .collect()
    }

    /// Every seated client id with the address to send to
    pub fn get_client_addrs(&self) -> Vec<(u32, SocketAddr)> {
        self.clients
            .values()
            .map(|client| (client.id, client.addr))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
