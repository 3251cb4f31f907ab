//! Integration tests for the load harness
//!
//! These tests run bots against a fake UDP game server and drive whole
//! experiments, on a paused clock where timing matters.

use async_trait::async_trait;
use bincode::{deserialize, serialize};
use bots::bot::{Bot, BotPlayer, Controller};
use bots::config::ExperimentParams;
use bots::connector::{BotConnector, NetworkConnector};
use bots::error::ConnectError;
use bots::experiment::{Experiment, ExperimentContext, ExperimentRunner, MultiWalkAround};
use bots::game::StaticGame;
use bots::network::{self, NetworkSettings};
use bots::pathfinding::GreedyPathFinder;
use bots::task::TaskExecutor;
use bots::walk::{SearchLimiter, WalkSettings};
use bots::world::{flat_chunk, ChunkWorld, WorldView};
use shared::{Material, Packet, Vector3d, Vector3i};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

/// FAKE GAME SERVER
mod server {
    use super::*;

    #[derive(Debug, Default)]
    pub struct ServerLog {
        pub names: HashMap<SocketAddr, String>,
        pub moves: HashMap<String, Vec<Vector3d>>,
        pub chats: HashMap<String, Vec<String>>,
        pub disconnects: HashMap<String, Vec<String>>,
    }

    impl ServerLog {
        pub fn joined(&self) -> usize {
            self.names.len()
        }

        pub fn moves_of(&self, name: &str) -> Vec<Vector3d> {
            self.moves.get(name).cloned().unwrap_or_default()
        }
    }

    /// Accepts every player, spawns it on flat grass and sends the chunks around it.
    pub struct FakeServer {
        pub addr: SocketAddr,
        socket: Arc<UdpSocket>,
        log: Arc<Mutex<ServerLog>>,
        task: JoinHandle<()>,
    }

    impl FakeServer {
        pub async fn start() -> Self {
            let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
            let addr = socket.local_addr().unwrap();
            let log = Arc::new(Mutex::new(ServerLog::default()));

            let task = {
                let socket = Arc::clone(&socket);
                let log = Arc::clone(&log);
                tokio::spawn(async move {
                    let mut buffer = vec![0u8; 65_536];
                    loop {
                        let Ok((len, from)) = socket.recv_from(&mut buffer).await else {
                            continue;
                        };
                        let Ok(packet) = deserialize::<Packet>(&buffer[..len]) else {
                            continue;
                        };
                        handle_packet(&socket, &log, packet, from).await;
                    }
                })
            };

            Self {
                addr,
                socket,
                log,
                task,
            }
        }

        pub fn log(&self) -> std::sync::MutexGuard<'_, ServerLog> {
            self.log.lock().unwrap()
        }

        pub async fn kick_all(&self, reason: &str) {
            let clients: Vec<SocketAddr> = self.log().names.keys().copied().collect();
            let packet = serialize(&Packet::Disconnected {
                reason: reason.to_string(),
            })
            .unwrap();
            for client in clients {
                self.socket.send_to(&packet, client).await.unwrap();
            }
        }
    }

    impl Drop for FakeServer {
        fn drop(&mut self) {
            self.task.abort();
        }
    }

    async fn handle_packet(
        socket: &UdpSocket,
        log: &Mutex<ServerLog>,
        packet: Packet,
        from: SocketAddr,
    ) {
        match packet {
            Packet::Connect { username, .. } => {
                let client_id = {
                    let mut log = log.lock().unwrap();
                    log.names.insert(from, username);
                    log.names.len() as u32 - 1
                };
                let spawn = Vector3d::new(0.5 + 2.0 * client_id as f64, 64.0, 0.5);
                send(socket, &Packet::Connected { client_id, spawn }, from).await;
                for chunk_x in -1..=1 {
                    for chunk_z in -1..=1 {
                        let blocks = flat_chunk(chunk_x, chunk_z, 63, Material::Grass);
                        send(
                            socket,
                            &Packet::ChunkData {
                                chunk_x,
                                chunk_z,
                                blocks,
                            },
                            from,
                        )
                        .await;
                    }
                }
            }
            Packet::Move { x, y, z } => {
                let mut log = log.lock().unwrap();
                let name = log.names.get(&from).cloned().unwrap_or_default();
                log.moves.entry(name).or_default().push(Vector3d::new(x, y, z));
            }
            Packet::Chat { message } => {
                let mut log = log.lock().unwrap();
                let name = log.names.get(&from).cloned().unwrap_or_default();
                log.chats.entry(name).or_default().push(message);
            }
            Packet::Disconnect { reason } => {
                let mut log = log.lock().unwrap();
                let name = log.names.get(&from).cloned().unwrap_or_default();
                log.disconnects.entry(name).or_default().push(reason);
            }
            _ => {}
        }
    }

    async fn send(socket: &UdpSocket, packet: &Packet, to: SocketAddr) {
        socket.send_to(&serialize(packet).unwrap(), to).await.unwrap();
    }
}

/// Polls `condition` every 10 ms for up to five seconds.
async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..500 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

fn network_context(addr: SocketAddr) -> ExperimentContext {
    ExperimentContext {
        connector: Arc::new(NetworkConnector::new(
            Arc::new(StaticGame::new(addr)),
            NetworkSettings::default(),
        )),
        walk_settings: WalkSettings::default(),
        limiter: SearchLimiter::new(8),
    }
}

/// PROTOCOL TESTS
mod protocol_tests {
    use super::*;

    /// A full flat chunk has to fit in one datagram
    #[test]
    fn flat_chunk_fits_in_a_datagram() {
        let packet = Packet::ChunkData {
            chunk_x: -1,
            chunk_z: 1,
            blocks: flat_chunk(-1, 1, 63, Material::Grass),
        };
        let bytes = serialize(&packet).unwrap();
        assert!(bytes.len() < 65_507, "chunk packet is {} bytes", bytes.len());
        assert_eq!(deserialize::<Packet>(&bytes).unwrap(), packet);
    }
}

/// NETWORKED BOT TESTS
mod network_tests {
    use super::server::FakeServer;
    use super::*;

    #[tokio::test]
    async fn bot_walks_to_target_and_server_sees_it() {
        let server = FakeServer::start().await;
        let mut bot = network::connect(server.addr, "walker", &NetworkSettings::default())
            .await
            .unwrap();

        let world_ready = eventually(|| {
            bot.world().block_at(Vector3i::new(3, 63, 0)).is_ok()
                && bot.world().block_at(Vector3i::new(0, 63, 0)).is_ok()
        })
        .await;
        assert!(world_ready, "chunks never arrived");

        let executor = TaskExecutor::walk(
            &bot,
            Vector3i::new(3, 64, 0),
            &WalkSettings::default(),
            &SearchLimiter::new(1),
        );
        bot.set_task_executor(executor);

        let mut status = bot.tick_task().unwrap();
        for _ in 0..500 {
            if status.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
            status = bot.tick_task().unwrap();
        }

        assert!(status.is_success(), "walk ended with {}", status);
        assert_eq!(bot.location(), Vector3d::new(3.5, 64.0, 0.5));

        let target = Vector3d::new(3.5, 64.0, 0.5);
        assert!(eventually(|| server.log().moves_of("walker").last() == Some(&target)).await);

        bot.disconnect("done");
        assert!(
            eventually(|| server.log().disconnects.get("walker") == Some(&vec!["done".to_string()]))
                .await
        );
    }

    #[tokio::test]
    async fn experiment_runs_against_server_and_tears_down() {
        let server = FakeServer::start().await;
        let params = ExperimentParams::new()
            .with("bots", 3)
            .with("numbotsperjoin", 3)
            .with("joininterval", 0)
            .with("duration", 2)
            .with("singleStandStill", true)
            .with("pingInterval", 1);
        let experiment = MultiWalkAround::new(params, network_context(server.addr));
        let mut runner = ExperimentRunner::new(Box::new(experiment));

        tokio::time::timeout(Duration::from_secs(10), runner.run(Duration::from_millis(50)))
            .await
            .expect("experiment did not finish")
            .unwrap();

        assert!(eventually(|| server.log().disconnects.len() == 3).await);
        let log = server.log();
        assert_eq!(log.joined(), 3);
        for reasons in log.disconnects.values() {
            assert_eq!(reasons, &vec!["disconnect".to_string()]);
        }

        assert!(log.moves_of("still-0").is_empty());
        assert!(!log.moves_of("bot-1").is_empty());
        assert!(!log.moves_of("bot-2").is_empty());

        let pings = log.chats.get("still-0").cloned().unwrap_or_default();
        assert!(!pings.is_empty());
        assert!(pings.iter().all(|ping| ping.len() == 5));
    }

    #[tokio::test]
    async fn experiment_ends_when_server_kicks_everyone() {
        let server = FakeServer::start().await;
        let params = ExperimentParams::new()
            .with("bots", 1)
            .with("joininterval", 0)
            .with("duration", 600);
        let experiment = MultiWalkAround::new(params, network_context(server.addr));
        let mut runner = ExperimentRunner::new(Box::new(experiment));

        let kicker = async {
            assert!(eventually(|| server.log().joined() == 1).await);
            tokio::time::sleep(Duration::from_millis(300)).await;
            server.kick_all("Server closing").await;
        };
        let run = tokio::time::timeout(Duration::from_secs(10), runner.run(Duration::from_millis(50)));

        let (_, finished) = tokio::join!(kicker, run);
        finished.expect("experiment ignored the kick").unwrap();
        assert!(runner.ticks() > 0);
    }
}

/// ORCHESTRATOR TESTS ON A PAUSED CLOCK
mod orchestrator_tests {
    use super::*;

    #[derive(Default)]
    struct SilentController;

    impl Controller for SilentController {
        fn update_location(&self, _location: Vector3d) {}
        fn send_chat(&self, _message: &str) {}
        fn disconnect(&self, _reason: &str) {}
    }

    /// Instantly connects bots onto a shared flat world.
    struct LocalConnector {
        world: Arc<ChunkWorld>,
        attempts: Mutex<Vec<String>>,
    }

    impl LocalConnector {
        fn new() -> Self {
            let world = ChunkWorld::new();
            for chunk_x in -1..=1 {
                for chunk_z in -1..=1 {
                    world.load_chunk(chunk_x, chunk_z, flat_chunk(chunk_x, chunk_z, 63, Material::Grass));
                }
            }
            Self {
                world: Arc::new(world),
                attempts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl BotConnector for LocalConnector {
        async fn connect(&self, name: String) -> Result<Bot, ConnectError> {
            self.attempts.lock().unwrap().push(name.clone());
            Ok(Bot::new(
                name,
                Arc::new(BotPlayer::new(Vector3d::new(0.5, 64.0, 0.5))),
                self.world.clone(),
                Arc::new(SilentController),
                Arc::new(GreedyPathFinder::new(self.world.clone())),
            ))
        }
    }

    fn orchestrator(params: ExperimentParams, connector: Arc<LocalConnector>) -> MultiWalkAround {
        MultiWalkAround::new(
            params,
            ExperimentContext {
                connector,
                walk_settings: WalkSettings::default(),
                limiter: SearchLimiter::new(4),
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn population_reaches_total_and_never_exceeds_it() {
        let connector = Arc::new(LocalConnector::new());
        let params = ExperimentParams::new()
            .with("bots", 5)
            .with("joininterval", 1)
            .with("numbotsperjoin", 2);
        let mut experiment = orchestrator(params, connector.clone());
        experiment.before().unwrap();
        assert_eq!(experiment.bots_total(), 5);
        assert_eq!(experiment.join_interval(), Duration::from_secs(1));
        assert_eq!(experiment.bots_per_join(), 2);

        // Twenty ticks per join interval, five intervals
        let mut sizes = Vec::new();
        for _ in 0..100 {
            experiment.tick();
            sizes.push(experiment.population());
            tokio::time::advance(Duration::from_millis(50)).await;
        }

        assert!(sizes.iter().all(|&size| size <= 5));
        assert_eq!(experiment.population(), 5);
        assert_eq!(connector.attempts.lock().unwrap().len(), 5);
        // Batches of two, two, then one
        assert_eq!(sizes[19], 0);
        assert_eq!(sizes[20], 2);
        assert_eq!(sizes[40], 4);
        assert_eq!(sizes[60], 5);
    }

    #[tokio::test(start_paused = true)]
    async fn stand_still_bot_is_never_tasked() {
        let connector = Arc::new(LocalConnector::new());
        let params = ExperimentParams::new()
            .with("bots", 4)
            .with("joininterval", 0)
            .with("numbotsperjoin", 4)
            .with("singleStandStill", true)
            .with("sendPings", false);
        let mut experiment = orchestrator(params, connector.clone());
        experiment.before().unwrap();

        for _ in 0..200 {
            experiment.tick();
            assert!(experiment.bot(0).map_or(true, |bot| bot.task_executor().is_none()));
            tokio::time::advance(Duration::from_millis(50)).await;
        }

        assert_eq!(connector.attempts.lock().unwrap()[0], "still-0");
        assert_eq!(experiment.bots().count(), 4);
        assert_eq!(
            experiment
                .bots()
                .filter(|(_, bot)| bot.task_executor().is_some())
                .count(),
            3
        );
    }

    #[tokio::test(start_paused = true)]
    async fn done_after_duration_and_teardown_is_idempotent() {
        let connector = Arc::new(LocalConnector::new());
        let params = ExperimentParams::new()
            .with("bots", 2)
            .with("joininterval", 0)
            .with("numbotsperjoin", 2)
            .with("duration", 3)
            .with("singleStandStill", true);
        let experiment = orchestrator(params, connector);
        let mut runner = ExperimentRunner::new(Box::new(experiment));

        runner.run(Duration::from_millis(50)).await.unwrap();

        // Three seconds at twenty ticks per second, the done check runs before each tick
        assert_eq!(runner.ticks(), 61);
        assert!(runner.experiment().is_done());
        assert!(!runner.finish());
    }
}
