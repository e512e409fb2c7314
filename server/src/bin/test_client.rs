//! Smoke-test bot: joins the room, wanders and swings, and prints what
//! the server reports back.

use bincode::{deserialize, serialize};
use clap::Parser;
use log::{info, warn};
use rand::Rng;
use shared::{ActionRequest, Direction, GameEvent, Packet, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{interval, timeout};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server address
    #[clap(short, long, default_value = "127.0.0.1:8080")]
    server: SocketAddr,
    #[clap(short, long, default_value = "bot")]
    name: String,
    #[clap(long, default_value = "human")]
    race: String,
    #[clap(long, default_value = "warrior")]
    class: String,
    /// Number of actions to send before disconnecting
    #[clap(long, default_value = "40")]
    actions: u32,
}

async fn send(
    socket: &UdpSocket,
    packet: &Packet,
    server: SocketAddr,
) -> Result<(), Box<dyn std::error::Error>> {
    socket.send_to(&serialize(packet)?, server).await?;
    Ok(())
}

fn describe(event: &GameEvent) -> String {
    match event {
        GameEvent::Attacked {
            attacker,
            target,
            damage,
        } => format!("{} hit {:?} for {}", attacker, target, damage),
        GameEvent::Died { actor } => format!("{} died", actor),
        GameEvent::Spoke { actor, text } => format!("{} says \"{}\"", actor, text),
        other => format!("{:?}", other),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    info!("Client socket bound to {}", socket.local_addr()?);

    let connect = Packet::Connect {
        client_version: PROTOCOL_VERSION,
        name: args.name.clone(),
        race: args.race.clone(),
        class: args.class.clone(),
    };
    send(&socket, &connect, args.server).await?;

    let mut buf = [0u8; MAX_PACKET_SIZE];
    let (len, _) = timeout(Duration::from_secs(3), socket.recv_from(&mut buf)).await??;
    let actor_id = match deserialize::<Packet>(&buf[..len])? {
        Packet::Connected {
            client_id,
            actor_id,
        } => {
            info!("Connected as client {} controlling actor {}", client_id, actor_id);
            actor_id
        }
        Packet::Disconnected { reason } => {
            warn!("Server refused connection: {}", reason);
            return Ok(());
        }
        other => {
            warn!("Unexpected reply: {:?}", other);
            return Ok(());
        }
    };

    let mut rng = rand::thread_rng();
    let mut ticker = interval(Duration::from_millis(250));
    let mut sequence = 0u32;

    while sequence < args.actions {
        tokio::select! {
            _ = ticker.tick() => {
                sequence += 1;
                let action = match rng.gen_range(0..6) {
                    0 => ActionRequest::Attack,
                    1 => ActionRequest::Speak { text: format!("step {}", sequence) },
                    2 => ActionRequest::GrabItem,
                    _ => ActionRequest::Move { direction: Direction::ALL[rng.gen_range(0..4)] },
                };
                send(&socket, &Packet::Action { sequence, action }, args.server).await?;
                if sequence % 8 == 0 {
                    send(&socket, &Packet::Heartbeat, args.server).await?;
                }
            }
            received = socket.recv_from(&mut buf) => {
                let (len, _) = received?;
                match deserialize::<Packet>(&buf[..len]) {
                    Ok(Packet::Events { tick, events }) => {
                        for event in events.iter().filter(|event| event.subject() == Some(actor_id)) {
                            info!("[tick {}] {}", tick, describe(event));
                        }
                    }
                    Ok(Packet::Snapshot { actors, items, .. }) => {
                        info!("Snapshot: {} actors, {} item stacks", actors.len(), items.len());
                    }
                    Ok(Packet::Disconnected { reason }) => {
                        warn!("Disconnected: {}", reason);
                        return Ok(());
                    }
                    Ok(other) => info!("Received {:?}", other),
                    Err(e) => warn!("Failed to deserialize packet: {}", e),
                }
            }
        }
    }

    send(&socket, &Packet::Disconnect, args.server).await?;
    info!("Sent {} actions, disconnecting", sequence);
    Ok(())
}
