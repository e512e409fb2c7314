//! UDP transport around a single room
//!
//! The socket is shared by three background tasks: one decodes inbound
//! datagrams, one encodes and sends outbound packets, and one sweeps for
//! silent clients. None of them touch the room. They talk to the loop in
//! [`Server::run`] over unbounded channels, and that loop is the only place
//! the room is mutated.

use crate::client_manager::ClientManager;
use crate::room::Room;
use bincode::{deserialize, serialize, serialized_size};
use log::{debug, error, info, warn};
use shared::{ActorId, GameEvent, Packet, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, MissedTickBehavior};

/// Headroom left in each datagram for the `Events` envelope
const ENVELOPE_BYTES: u64 = 64;

/// Work for the room loop
#[derive(Debug)]
pub enum Inbound {
    Packet { packet: Packet, addr: SocketAddr },
    ClientTimeout { client_id: u32, actor_id: ActorId },
    Shutdown,
}

/// Work for the sender task
#[derive(Debug)]
pub enum Outbound {
    To { addr: SocketAddr, packet: Packet },
    Everyone { packet: Packet, except: Option<u32> },
}

/// Splits a tick's events into packets that each fit in one datagram.
pub fn pack_events(tick: u64, events: Vec<GameEvent>) -> Vec<Packet> {
    let budget = MAX_PACKET_SIZE as u64 - ENVELOPE_BYTES;
    let mut packets = Vec::new();
    let mut batch = Vec::new();
    let mut batch_size = 0u64;

    for event in events {
        let size = serialized_size(&event).unwrap_or(budget);
        if !batch.is_empty() && batch_size + size > budget {
            packets.push(Packet::Events {
                tick,
                events: std::mem::take(&mut batch),
            });
            batch_size = 0;
        }
        batch_size += size;
        batch.push(event);
    }
    if !batch.is_empty() {
        packets.push(Packet::Events { tick, events: batch });
    }
    packets
}

fn encode(packet: &Packet) -> Option<Vec<u8>> {
    match serialize(packet) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            error!("Failed to encode {:?}: {}", packet, e);
            None
        }
    }
}

pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    room: Room,
    tick_duration: Duration,
    client_timeout: Duration,
    tick: u64,
    started: Instant,
    last_npc_tick_ms: u64,

    inbound_tx: mpsc::UnboundedSender<Inbound>,
    inbound_rx: mpsc::UnboundedReceiver<Inbound>,
    outbound_tx: mpsc::UnboundedSender<Outbound>,
    outbound_rx: Option<mpsc::UnboundedReceiver<Outbound>>,
}

impl Server {
    pub async fn new(
        addr: &str,
        tick_duration: Duration,
        room: Room,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Room server bound to {}", socket.local_addr()?);

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let client_timeout = Duration::from_millis(room.config().client_timeout_ms);
        let clients = ClientManager::new(room.config().room_capacity, client_timeout);

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(clients)),
            room,
            tick_duration,
            client_timeout,
            tick: 0,
            started: Instant::now(),
            last_npc_tick_ms: 0,
            inbound_tx,
            inbound_rx,
            outbound_tx,
            outbound_rx: Some(outbound_rx),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn room(&self) -> &Room {
        &self.room
    }

    /// A handle that can stop [`Server::run`] by sending [`Inbound::Shutdown`].
    pub fn control(&self) -> mpsc::UnboundedSender<Inbound> {
        self.inbound_tx.clone()
    }

    fn spawn_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let inbound = self.inbound_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; MAX_PACKET_SIZE];
            loop {
                let (len, addr) = match socket.recv_from(&mut buffer).await {
                    Ok(received) => received,
                    Err(e) => {
                        error!("Socket receive failed: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        continue;
                    }
                };
                let packet = match deserialize::<Packet>(&buffer[..len]) {
                    Ok(packet) => packet,
                    Err(e) => {
                        warn!("Dropped {} undecodable bytes from {}: {}", len, addr, e);
                        continue;
                    }
                };
                if inbound.send(Inbound::Packet { packet, addr }).is_err() {
                    debug!("Room loop gone, receiver stopping");
                    break;
                }
            }
        });
    }

    fn spawn_sender(&mut self) {
        let Some(mut outbound) = self.outbound_rx.take() else {
            return;
        };
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);

        tokio::spawn(async move {
            while let Some(message) = outbound.recv().await {
                let (bytes, targets) = match message {
                    Outbound::To { addr, packet } => match encode(&packet) {
                        Some(bytes) => (bytes, vec![addr]),
                        None => continue,
                    },
                    Outbound::Everyone { packet, except } => {
                        let Some(bytes) = encode(&packet) else {
                            continue;
                        };
                        let targets: Vec<SocketAddr> = clients
                            .read()
                            .await
                            .get_client_addrs()
                            .into_iter()
                            .filter(|(id, _)| Some(*id) != except)
                            .map(|(_, addr)| addr)
                            .collect();
                        (bytes, targets)
                    }
                };
                for addr in targets {
                    if let Err(e) = socket.send_to(&bytes, addr).await {
                        error!("Send to {} failed: {}", addr, e);
                    }
                }
            }
        });
    }

    fn spawn_timeout_sweep(&self) {
        let clients = Arc::clone(&self.clients);
        let inbound = self.inbound_tx.clone();
        let period = (self.client_timeout / 2).max(Duration::from_millis(100));

        tokio::spawn(async move {
            let mut sweep = interval(period);
            loop {
                sweep.tick().await;
                let silent = clients.write().await.check_timeouts();
                for client in silent {
                    let message = Inbound::ClientTimeout {
                        client_id: client.id,
                        actor_id: client.actor_id,
                    };
                    if inbound.send(message).is_err() {
                        return;
                    }
                }
            }
        });
    }

    fn send_to(&self, addr: SocketAddr, packet: Packet) {
        if self.outbound_tx.send(Outbound::To { addr, packet }).is_err() {
            error!("Sender task gone, dropping packet for {}", addr);
        }
    }

    fn send_to_everyone(&self, packet: Packet) {
        let message = Outbound::Everyone {
            packet,
            except: None,
        };
        if self.outbound_tx.send(message).is_err() {
            error!("Sender task gone, dropping broadcast");
        }
    }

    fn refuse(&self, addr: SocketAddr, reason: impl Into<String>) {
        let reason = reason.into();
        info!("Refusing {}: {}", addr, reason);
        self.send_to(addr, Packet::Disconnected { reason });
    }

    /// Unseats a client and takes its player actor out of the room
    async fn release_client(&mut self, client_id: u32) {
        let removed = self.clients.write().await.remove_client(client_id);
        if let Some(client) = removed {
            self.room.leave(client.actor_id);
        }
    }

    async fn handle_connect(
        &mut self,
        addr: SocketAddr,
        client_version: u32,
        name: String,
        race: String,
        class: String,
    ) {
        info!(
            "{} wants to join as {} the {} {} (protocol {})",
            addr, name, race, class, client_version
        );
        if client_version != PROTOCOL_VERSION {
            self.refuse(addr, "Protocol version mismatch");
            return;
        }

        // A second Connect from a seated address starts over with a new actor.
        let previous = self
            .clients
            .read()
            .await
            .find_client_by_addr(addr)
            .map(|client| client.id);
        if let Some(client_id) = previous {
            self.release_client(client_id).await;
        }

        if self.clients.read().await.is_full() {
            self.refuse(addr, "Server full");
            return;
        }
        let Some(actor_id) = self.room.join_player(&name, &race, &class) else {
            self.refuse(addr, format!("Cannot join as {} {}", race, class));
            return;
        };
        let Some(client_id) = self.clients.write().await.add_client(addr, actor_id) else {
            self.room.leave(actor_id);
            self.refuse(addr, "Server full");
            return;
        };

        self.send_to(
            addr,
            Packet::Connected {
                client_id,
                actor_id,
            },
        );
        let (actors, items) = self.room.snapshot();
        self.send_to(
            addr,
            Packet::Snapshot {
                tick: self.tick,
                actors,
                items,
            },
        );
    }

    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect {
                client_version,
                name,
                race,
                class,
            } => {
                self.handle_connect(addr, client_version, name, race, class)
                    .await;
            }
            Packet::Action { sequence, action } => {
                let actor_id = self.clients.write().await.record_sequence(addr, sequence);
                match actor_id {
                    Some(actor_id) => {
                        self.room.handle_action(actor_id, action);
                    }
                    None => debug!("Dropped action {} from {}", sequence, addr),
                }
            }
            Packet::Heartbeat => {
                if self.clients.write().await.touch(addr).is_none() {
                    warn!("Heartbeat from unseated address {}", addr);
                }
            }
            Packet::Disconnect => {
                let client_id = self
                    .clients
                    .read()
                    .await
                    .find_client_by_addr(addr)
                    .map(|client| client.id);
                if let Some(client_id) = client_id {
                    self.release_client(client_id).await;
                }
            }
            other => warn!("Server-bound stream got {:?} from {}", other, addr),
        }
    }

    /// Runs due timers and, on the AI interval, one NPC pass, then sends
    /// everything that happened since the last tick.
    fn run_tick(&mut self, now_ms: u64) {
        self.tick += 1;
        self.room.advance(now_ms);

        let npc_interval = self.room.config().npc_tick_interval_ms;
        if now_ms.saturating_sub(self.last_npc_tick_ms) >= npc_interval {
            self.last_npc_tick_ms = now_ms;
            self.room.tick_npcs();
        }

        let events = self.room.drain_events();
        for packet in pack_events(self.tick, events) {
            self.send_to_everyone(packet);
        }
    }

    /// Serves the room until an [`Inbound::Shutdown`] arrives.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_receiver();
        self.spawn_sender();
        self.spawn_timeout_sweep();

        let mut ticker = interval(self.tick_duration);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.started = Instant::now();
        info!("Room loop running at {:?} per tick", self.tick_duration);

        loop {
            tokio::select! {
                message = self.inbound_rx.recv() => match message {
                    Some(Inbound::Packet { packet, addr }) => {
                        self.handle_packet(packet, addr).await;
                    }
                    Some(Inbound::ClientTimeout { client_id, actor_id }) => {
                        info!("Client {} went silent, removing actor {}", client_id, actor_id);
                        self.room.leave(actor_id);
                    }
                    Some(Inbound::Shutdown) | None => {
                        info!("Room loop stopping after {} ticks", self.tick);
                        break;
                    }
                },
                _ = ticker.tick() => {
                    let now_ms = self.started.elapsed().as_millis() as u64;
                    self.run_tick(now_ms);

                    if self.tick % 60 == 0 {
                        let seated = self.clients.read().await.len();
                        if seated > 0 {
                            debug!(
                                "Tick {}: {} clients, {} actors, {} pending timers",
                                self.tick,
                                seated,
                                self.room.actors().count(),
                                self.room.timers().len()
                            );
                        }
                    }
                }
            }
        }

        Ok(())
    }
}
