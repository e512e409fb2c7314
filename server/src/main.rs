use clap::Parser;
use log::{debug, info, warn};
use server::catalog::Catalog;
use server::config::GameConfig;
use server::map::CollisionLayer;
use server::network::{Inbound, Server};
use server::room::Room;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "8080")]
    port: u16,
    /// Tick rate (updates per second)
    #[clap(short, long, default_value = "30")]
    tick_rate: u32,
    /// JSON file overriding room rules
    #[clap(long)]
    config: Option<PathBuf>,
    /// JSON file with items, spells, races, classes and npcs
    #[clap(long)]
    data: Option<PathBuf>,
    /// Tile editor JSON export providing the collision layer
    #[clap(long)]
    map: Option<PathBuf>,
    /// Seed for the room's random number generator
    #[clap(long)]
    seed: Option<u64>,
    /// Number of NPCs to spawn at startup
    #[clap(long, default_value = "4")]
    npcs: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => GameConfig::load(path)?,
        None => GameConfig::default(),
    };
    let catalog = match &args.data {
        Some(path) => Catalog::load(path)?,
        None => Catalog::builtin()?,
    };
    let layer = match &args.map {
        Some(path) => CollisionLayer::load(path)?,
        None => CollisionLayer::open(config.map_size),
    };
    let seed = args.seed.unwrap_or_else(rand::random);
    info!("Room seed {}", seed);

    let mut room = Room::with_collision(config, Arc::new(catalog), &layer, seed);
    let templates: Vec<String> = room
        .catalog()
        .npc_templates()
        .iter()
        .map(|template| template.id.clone())
        .collect();
    if templates.is_empty() && args.npcs > 0 {
        warn!("Catalog has no npc templates, spawning none");
    }
    for i in 0..args.npcs {
        let Some(template) = templates.get(i % templates.len().max(1)) else {
            break;
        };
        if room.spawn_npc(template).is_none() {
            warn!("No free tile left for npc {}", template);
            break;
        }
    }
    room.drain_events();

    let tick_rate = args.tick_rate.max(1);
    let tick_duration = Duration::from_secs_f64(1.0 / tick_rate as f64);
    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(&address, tick_duration, room).await?;

    let control = server.control();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down");
            if control.send(Inbound::Shutdown).is_err() {
                debug!("Room loop already stopped");
            }
        }
    });

    server.run().await
}
