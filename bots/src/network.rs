//! UDP transport for a single bot.
//!
//! Each bot owns its own ephemeral socket. The join handshake is the only
//! place that awaits the server; afterwards a receiver task applies server
//! packets to the shared player and world state, and movement commands are
//! sent without waiting.

use crate::bot::{Bot, BotPlayer, Controller};
use crate::error::ConnectError;
use crate::pathfinding::GreedyPathFinder;
use crate::world::ChunkWorld;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Packet, Vector3d, CLIENT_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};

const MAX_PACKET_SIZE: usize = 65_536;

#[derive(Debug, Clone)]
pub struct NetworkSettings {
    /// How long to wait for `Connected` after sending `Connect`
    pub join_timeout: Duration,
    pub max_path_nodes: usize,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            join_timeout: Duration::from_secs(10),
            max_path_nodes: 256,
        }
    }
}

/// Joins the server at `addr` as `name` and returns a bot ready to be ticked.
pub async fn connect(
    addr: SocketAddr,
    name: &str,
    settings: &NetworkSettings,
) -> Result<Bot, ConnectError> {
    let bind_addr = if addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
    let socket = Arc::new(UdpSocket::bind(bind_addr).await?);
    let world = Arc::new(ChunkWorld::new());

    let hello = Packet::Connect {
        client_version: CLIENT_VERSION,
        username: name.to_string(),
    };
    socket.send_to(&serialize(&hello)?, addr).await?;

    let (client_id, spawn) = timeout(
        settings.join_timeout,
        await_join(&socket, addr, name, &world),
    )
    .await
    .map_err(|_| ConnectError::Timeout(settings.join_timeout))??;

    info!("{} joined as client {} at {}", name, client_id, spawn);

    let player = Arc::new(BotPlayer::new(spawn));
    let controller = Arc::new(UdpController::new(Arc::clone(&socket), addr, name));
    let receiver = spawn_receiver(socket, addr, name.to_string(), Arc::clone(&player), Arc::clone(&world));
    let path_finder = Arc::new(
        GreedyPathFinder::new(world.clone()).with_max_nodes(settings.max_path_nodes),
    );

    let mut bot = Bot::new(name, player, world, controller, path_finder);
    bot.attach_receiver(receiver);
    Ok(bot)
}

async fn await_join(
    socket: &UdpSocket,
    addr: SocketAddr,
    name: &str,
    world: &ChunkWorld,
) -> Result<(u32, Vector3d), ConnectError> {
    let mut buffer = vec![0u8; MAX_PACKET_SIZE];

    loop {
        let (len, from) = socket.recv_from(&mut buffer).await?;
        if from != addr {
            debug!("{}: ignoring packet from {}", name, from);
            continue;
        }

        match deserialize::<Packet>(&buffer[..len]) {
            Ok(Packet::Connected { client_id, spawn }) => return Ok((client_id, spawn)),
            Ok(Packet::Disconnected { reason }) => return Err(ConnectError::Rejected(reason)),
            Ok(Packet::ChunkData {
                chunk_x,
                chunk_z,
                blocks,
            }) => world.load_chunk(chunk_x, chunk_z, blocks),
            Ok(other) => debug!("{}: unexpected packet before join: {:?}", name, other),
            Err(e) => warn!("{}: failed to deserialize packet from {}: {}", name, from, e),
        }
    }
}

/// Spawns the task that keeps the player and world in sync with the server
fn spawn_receiver(
    socket: Arc<UdpSocket>,
    addr: SocketAddr,
    name: String,
    player: Arc<BotPlayer>,
    world: Arc<ChunkWorld>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buffer = vec![0u8; MAX_PACKET_SIZE];

        loop {
            match socket.recv_from(&mut buffer).await {
                Ok((len, from)) if from == addr => match deserialize::<Packet>(&buffer[..len]) {
                    Ok(Packet::ChunkData {
                        chunk_x,
                        chunk_z,
                        blocks,
                    }) => world.load_chunk(chunk_x, chunk_z, blocks),
                    Ok(Packet::Teleport { location }) => player.set_location(location),
                    Ok(Packet::Disconnected { reason }) => {
                        info!("{} disconnected by server: {}", name, reason);
                        player.set_joined(false);
                        break;
                    }
                    Ok(other) => debug!("{}: unexpected packet: {:?}", name, other),
                    Err(e) => warn!("{}: failed to deserialize packet: {}", name, e),
                },
                Ok((_, from)) => debug!("{}: ignoring packet from {}", name, from),
                Err(e) => {
                    error!("{}: error receiving packet: {}", name, e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    })
}

/// Movement command sink backed by the bot's socket.
#[derive(Debug)]
pub struct UdpController {
    socket: Arc<UdpSocket>,
    server: SocketAddr,
    name: String,
}

impl UdpController {
    pub fn new(socket: Arc<UdpSocket>, server: SocketAddr, name: &str) -> Self {
        Self {
            socket,
            server,
            name: name.to_string(),
        }
    }

    fn send(&self, packet: &Packet) {
        let data = match serialize(packet) {
            Ok(data) => data,
            Err(e) => {
                error!("{}: failed to serialize packet: {}", self.name, e);
                return;
            }
        };
        // A full send buffer drops the packet; the next tick sends a fresh position
        if let Err(e) = self.socket.try_send_to(&data, self.server) {
            debug!("{}: failed to send to {}: {}", self.name, self.server, e);
        }
    }
}

impl Controller for UdpController {
    fn update_location(&self, location: Vector3d) {
        self.send(&Packet::Move {
            x: location.x,
            y: location.y,
            z: location.z,
        });
    }

    fn send_chat(&self, message: &str) {
        self.send(&Packet::Chat {
            message: message.to_string(),
        });
    }

    fn disconnect(&self, reason: &str) {
        self.send(&Packet::Disconnect {
            reason: reason.to_string(),
        });
    }
}
