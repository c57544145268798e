use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rand::SeedableRng;
use rand::rngs::StdRng;

use super::config::ServerConfig;
use super::events::{DisconnectReason, ServerEvent};
use crate::net::{
    BulletRecord, CommandsPacket, ConnectPacket, MAX_PACKET_SIZE, NetworkEndpoint, NetworkStats,
    Packet, PacketHeader, PlayerRecord, SnapshotPacket, Transport, address_snapshot,
};
use crate::reconcile::reconcile_batch;
use crate::simulation::CommandStack;
use crate::state::{BulletTrajectory, GameState, Kinematics};
use crate::tuning::{MAX_BULLET_TRAILS, MAX_PLAYER_COUNT};

/// What the server knows about one connected client. Indexed by the client
/// id, which is also the id of the client's player.
#[derive(Debug)]
struct ClientRecord {
    addr: SocketAddr,
    /// State the client claims to reach after its latest batch.
    predicted: Kinematics,
    commands: CommandStack,
    batch_pending: bool,
    prediction_error: bool,
}

impl ClientRecord {
    fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            predicted: Kinematics::default(),
            commands: CommandStack::new(),
            batch_pending: false,
            prediction_error: false,
        }
    }
}

/// Authoritative game session.
///
/// Single threaded: [`GameServer::tick`] drains queued datagrams, replays
/// every pending command batch and broadcasts a snapshot once
/// `snapshot_interval` has passed since the previous one.
pub struct GameServer<T: Transport = NetworkEndpoint> {
    transport: T,
    config: ServerConfig,
    state: GameState,
    clients: Vec<Option<ClientRecord>>,
    joined: Vec<u32>,
    left: Vec<u32>,
    new_bullets: Vec<BulletTrajectory>,
    last_snapshot: Option<f32>,
    rng: StdRng,
    running: Arc<AtomicBool>,
    pending_events: VecDeque<ServerEvent>,
    send_buf: Vec<u8>,
    recv_buf: Vec<u8>,
}

impl GameServer<NetworkEndpoint> {
    pub fn bind(addr: SocketAddr, config: ServerConfig) -> io::Result<Self> {
        let mut endpoint = NetworkEndpoint::bind(addr.ip(), addr.port())?;
        if let Some(sim) = config.packet_loss.clone() {
            endpoint.set_packet_loss_sim(sim);
        }
        Ok(Self::with_transport(endpoint, config))
    }
}

impl<T: Transport> GameServer<T> {
    pub fn with_transport(transport: T, config: ServerConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            transport,
            state: GameState::new(),
            clients: (0..MAX_PLAYER_COUNT).map(|_| None).collect(),
            joined: Vec::new(),
            left: Vec::new(),
            new_bullets: Vec::new(),
            last_snapshot: None,
            rng,
            running: Arc::new(AtomicBool::new(true)),
            pending_events: VecDeque::new(),
            send_buf: vec![0; MAX_PACKET_SIZE],
            recv_buf: vec![0; MAX_PACKET_SIZE],
            config,
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn stats(&self) -> &NetworkStats {
        self.transport.stats()
    }

    pub fn client_count(&self) -> usize {
        self.clients.iter().flatten().count()
    }

    pub fn client_addr(&self, client_id: u32) -> Option<SocketAddr> {
        self.client(client_id).map(|c| c.addr)
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = ServerEvent> + '_ {
        self.pending_events.drain(..)
    }

    /// One iteration of the server loop. `now` is the server clock in seconds.
    pub fn tick(&mut self, now: f32) {
        self.receive_packets();
        self.reconcile_clients(now);

        let due = self
            .last_snapshot
            .is_none_or(|last| now - last >= self.config.snapshot_interval);
        if due {
            self.broadcast_snapshot(now);
            self.last_snapshot = Some(now);
        }
    }

    /// Tells every client the session is over and forgets them.
    pub fn shutdown(&mut self) {
        let ids: Vec<u32> = self.client_ids().collect();
        for client_id in ids {
            self.kick_client(client_id);
        }
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn kick_client(&mut self, client_id: u32) {
        let Some(addr) = self.client_addr(client_id) else {
            return;
        };
        self.send_packet(&Packet::Disconnect, client_id, addr);
        self.drop_client(client_id, DisconnectReason::Kicked);
    }

    fn client(&self, client_id: u32) -> Option<&ClientRecord> {
        self.clients.get(client_id as usize)?.as_ref()
    }

    fn client_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.clients
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_some())
            .map(|(id, _)| id as u32)
    }

    fn client_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.clients
            .iter()
            .position(|c| c.as_ref().is_some_and(|c| c.addr == addr))
            .map(|id| id as u32)
    }

    fn receive_packets(&mut self) {
        for _ in 0..self.config.max_receive_per_tick {
            let (size, addr) = match self.transport.receive(&mut self.recv_buf) {
                Ok(Some(received)) => received,
                Ok(None) => break,
                Err(e) => {
                    log::error!("Receive failed: {}", e);
                    self.pending_events.push_back(ServerEvent::Error {
                        message: format!("Receive failed: {}", e),
                    });
                    break;
                }
            };

            match Packet::decode(&self.recv_buf[..size]) {
                Ok((header, packet)) => self.handle_packet(header, packet, addr),
                Err(e) => {
                    log::warn!("Dropping malformed packet from {}: {}", addr, e);
                    self.transport.stats_mut().packets_malformed += 1;
                }
            }
        }
    }

    fn handle_packet(&mut self, header: PacketHeader, packet: Packet, addr: SocketAddr) {
        log::debug!("{:?} from {} (client {})", header.packet_type, addr, header.client_id);

        match packet {
            Packet::Discover => self.handle_discover(addr),
            Packet::Commands(batch) => self.handle_commands(header.client_id, batch, addr),
            Packet::Disconnect => self.handle_disconnect(header.client_id, addr),
            Packet::Connect(_) | Packet::Snapshot(_) => {
                log::debug!("Ignoring client-bound {:?} from {}", header.packet_type, addr);
            }
        }
    }

    fn handle_discover(&mut self, addr: SocketAddr) {
        // The first Connect may have been lost; answer with the same id.
        if let Some(client_id) = self.client_by_addr(addr) {
            log::debug!("Repeated discover from {}, resending connect", addr);
            self.send_connect(client_id, addr);
            return;
        }

        let client_id = match self.state.spawn_player(&mut self.rng) {
            Ok(id) => id,
            Err(e) => {
                log::warn!("Denying {}: {}", addr, e);
                self.pending_events.push_back(ServerEvent::ConnectionDenied {
                    addr,
                    reason: e.to_string(),
                });
                return;
            }
        };

        self.clients[client_id as usize] = Some(ClientRecord::new(addr));
        if !self.joined.contains(&client_id) {
            self.joined.push(client_id);
        }

        log::debug!("Client {} connected from {}", client_id, addr);
        self.pending_events
            .push_back(ServerEvent::ClientConnected { client_id, addr });
        self.send_connect(client_id, addr);
    }

    fn handle_commands(&mut self, client_id: u32, batch: CommandsPacket, addr: SocketAddr) {
        let Some(client) = self
            .clients
            .get_mut(client_id as usize)
            .and_then(Option::as_mut)
        else {
            log::debug!("Commands for unknown client {} from {}", client_id, addr);
            return;
        };
        if client.addr != addr {
            log::warn!("Commands for client {} from foreign address {}", client_id, addr);
            return;
        }

        let dropped = client.commands.extend_from_slice(&batch.commands);
        if dropped > 0 {
            log::warn!("Client {} command stack full, dropped {}", client_id, dropped);
        }
        client.predicted = batch.predicted;
        client.batch_pending = true;
    }

    fn handle_disconnect(&mut self, client_id: u32, addr: SocketAddr) {
        if self.client(client_id).is_none_or(|c| c.addr != addr) {
            log::debug!("Ignoring disconnect for client {} from {}", client_id, addr);
            return;
        }
        self.drop_client(client_id, DisconnectReason::Graceful);
    }

    fn drop_client(&mut self, client_id: u32, reason: DisconnectReason) {
        if self.clients[client_id as usize].take().is_none() {
            return;
        }
        self.state.remove_player(client_id);
        if !self.left.contains(&client_id) {
            self.left.push(client_id);
        }

        log::debug!("Client {} {}", client_id, reason.as_str());
        self.pending_events
            .push_back(ServerEvent::ClientDisconnected { client_id, reason });
    }

    fn reconcile_clients(&mut self, now: f32) {
        for client_id in 0..MAX_PLAYER_COUNT as u32 {
            let Some(client) = self.clients[client_id as usize].as_mut() else {
                continue;
            };
            if !client.batch_pending {
                continue;
            }
            client.batch_pending = false;
            let commands = client.commands.drain();
            let predicted = client.predicted;

            let Some(outcome) = reconcile_batch(
                &mut self.state,
                client_id,
                &predicted,
                &commands,
                now,
                &mut self.rng,
            ) else {
                continue;
            };

            if let Some(client) = self.clients[client_id as usize].as_mut() {
                client.prediction_error = outcome.prediction_error;
            }
            if outcome.prediction_error {
                self.pending_events
                    .push_back(ServerEvent::PredictionError { client_id });
            }

            for slot in outcome.shots {
                if let Some(bullet) = self.state.bullet(slot) {
                    self.new_bullets.push(*bullet);
                }
            }
            self.pending_events
                .extend(outcome.hits.into_iter().map(ServerEvent::PlayerHit));
        }
    }

    fn player_records(&self) -> Vec<PlayerRecord> {
        self.state
            .players()
            .map(|(id, player)| PlayerRecord {
                id,
                kinematics: player.kinematics,
                health: player.wire_health(),
            })
            .collect()
    }

    fn broadcast_snapshot(&mut self, now: f32) {
        let bullets = self
            .new_bullets
            .drain(..)
            .take(MAX_BULLET_TRAILS)
            .map(|b| BulletRecord {
                start: b.start,
                end: b.end,
                age: b.age(now),
                shooter: b.shooter,
            })
            .collect();
        let snapshot = Packet::Snapshot(SnapshotPacket {
            prediction_error: false,
            joined: std::mem::take(&mut self.joined),
            left: std::mem::take(&mut self.left),
            players: self.player_records(),
            bullets,
        });

        let len = match snapshot.encode(0, &mut self.send_buf) {
            Ok(len) => len,
            Err(e) => {
                log::error!("Failed to encode snapshot: {}", e);
                return;
            }
        };

        for (client_id, slot) in self.clients.iter_mut().enumerate() {
            let Some(client) = slot.as_mut() else {
                continue;
            };
            let datagram = &mut self.send_buf[..len];
            if let Err(e) = address_snapshot(datagram, client_id as u32, client.prediction_error) {
                log::error!("Failed to address snapshot to client {}: {}", client_id, e);
                continue;
            }
            if let Err(e) = self.transport.send_to(datagram, client.addr) {
                log::error!("Failed to send snapshot to {}: {}", client.addr, e);
                self.pending_events.push_back(ServerEvent::Error {
                    message: format!("Failed to send snapshot to {}: {}", client.addr, e),
                });
            }
            client.prediction_error = false;
        }
    }

    fn send_connect(&mut self, client_id: u32, addr: SocketAddr) {
        let packet = Packet::Connect(ConnectPacket {
            client_id,
            players: self.player_records(),
        });
        self.send_packet(&packet, client_id, addr);
    }

    fn send_packet(&mut self, packet: &Packet, client_id: u32, addr: SocketAddr) {
        let len = match packet.encode(client_id, &mut self.send_buf) {
            Ok(len) => len,
            Err(e) => {
                log::error!("Failed to encode {:?}: {}", packet.packet_type(), e);
                return;
            }
        };
        if let Err(e) = self.transport.send_to(&self.send_buf[..len], addr) {
            log::error!("Failed to send {:?} to {}: {}", packet.packet_type(), addr, e);
            self.pending_events.push_back(ServerEvent::Error {
                message: format!("Failed to send to {}: {}", addr, e),
            });
        }
    }
}
