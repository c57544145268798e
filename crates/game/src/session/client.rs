use std::io;
use std::net::SocketAddr;

use super::config::ClientConfig;
use crate::net::{
    CommandsPacket, ConnectPacket, MAX_PACKET_SIZE, NetworkEndpoint, NetworkStats, Packet,
    PacketError, PacketHeader, PlayerRecord, SnapshotPacket, Transport,
};
use crate::reconcile::apply_correction;
use crate::simulation::{Command, CommandStack, apply_command};
use crate::state::{BulletTrajectory, GameState};
use crate::tuning::MAX_PLAYER_COUNT;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("no answer from {server} after {attempts} discover attempts")]
    ConnectTimeout { server: SocketAddr, attempts: u32 },
    #[error(transparent)]
    Packet(#[from] PacketError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting { attempts: u32, last_attempt: f32 },
    Connected,
}

/// Client half of a session: predicts the controlled player, mirrors the
/// rest of the game from snapshots.
pub struct GameClient<T: Transport = NetworkEndpoint> {
    transport: T,
    config: ClientConfig,
    server: Option<SocketAddr>,
    status: ConnectionStatus,
    client_id: Option<u32>,
    state: GameState,
    commands: CommandStack,
    last_commands_sent: Option<f32>,
    corrections: u64,
    send_buf: Vec<u8>,
    recv_buf: Vec<u8>,
}

impl GameClient<NetworkEndpoint> {
    pub fn bind(addr: SocketAddr, config: ClientConfig) -> io::Result<Self> {
        let mut endpoint = NetworkEndpoint::bind(addr.ip(), addr.port())?;
        if let Some(sim) = config.packet_loss.clone() {
            endpoint.set_packet_loss_sim(sim);
        }
        Ok(Self::with_transport(endpoint, config))
    }
}

impl<T: Transport> GameClient<T> {
    pub fn with_transport(transport: T, config: ClientConfig) -> Self {
        Self {
            transport,
            config,
            server: None,
            status: ConnectionStatus::Disconnected,
            client_id: None,
            state: GameState::new(),
            commands: CommandStack::new(),
            last_commands_sent: None,
            corrections: 0,
            send_buf: vec![0; MAX_PACKET_SIZE],
            recv_buf: vec![0; MAX_PACKET_SIZE],
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    pub fn client_id(&self) -> Option<u32> {
        self.client_id
    }

    /// Read-only view for drawing.
    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn stats(&self) -> &NetworkStats {
        self.transport.stats()
    }

    /// Times the server overwrote the controlled player after a misprediction.
    pub fn corrections(&self) -> u64 {
        self.corrections
    }

    pub fn pending_commands(&self) -> usize {
        self.commands.len()
    }

    /// Starts discovery. The connection completes inside later ticks.
    pub fn connect(&mut self, server: SocketAddr, now: f32) -> Result<(), ClientError> {
        log::info!("Connecting to {}", server);
        self.reset();
        self.server = Some(server);
        self.status = ConnectionStatus::Connecting {
            attempts: 1,
            last_attempt: now,
        };
        self.send(&Packet::Discover, 0, server)
    }

    pub fn disconnect(&mut self) {
        if let (Some(server), ConnectionStatus::Connected) = (self.server, self.status) {
            let client_id = self.client_id.unwrap_or(0);
            if let Err(e) = self.send(&Packet::Disconnect, client_id, server) {
                log::error!("Failed to send disconnect: {}", e);
            }
            log::info!("Disconnected from {}", server);
        }
        self.reset();
    }

    fn reset(&mut self) {
        self.status = ConnectionStatus::Disconnected;
        self.client_id = None;
        self.state.clear();
        self.commands.clear();
        self.last_commands_sent = None;
    }

    /// One frame: receive, predict `input`, interpolate remote players by
    /// `dt` and flush commands when due.
    pub fn tick(&mut self, now: f32, dt: f32, input: Option<Command>) -> Result<(), ClientError> {
        self.receive_packets(now);

        match self.status {
            ConnectionStatus::Disconnected => {}
            ConnectionStatus::Connecting {
                attempts,
                last_attempt,
            } => self.retry_discover(now, attempts, last_attempt)?,
            ConnectionStatus::Connected => {
                if let Some(command) = input {
                    self.predict(command, now);
                }
                self.interpolate_remotes(dt);
                self.state.sweep_expired_bullets(now);
                self.flush_commands(now);
            }
        }
        Ok(())
    }

    fn retry_discover(
        &mut self,
        now: f32,
        attempts: u32,
        last_attempt: f32,
    ) -> Result<(), ClientError> {
        if now - last_attempt < self.config.discover_retry_interval {
            return Ok(());
        }
        let Some(server) = self.server else {
            return Ok(());
        };

        if attempts >= self.config.discover_attempts {
            log::warn!("Giving up on {} after {} attempts", server, attempts);
            self.reset();
            return Err(ClientError::ConnectTimeout { server, attempts });
        }

        log::debug!("Resending discover to {} (attempt {})", server, attempts + 1);
        self.status = ConnectionStatus::Connecting {
            attempts: attempts + 1,
            last_attempt: now,
        };
        if let Err(e) = self.send(&Packet::Discover, 0, server) {
            log::error!("Failed to send discover: {}", e);
        }
        Ok(())
    }

    fn receive_packets(&mut self, now: f32) {
        for _ in 0..self.config.max_receive_per_tick {
            let (size, addr) = match self.transport.receive(&mut self.recv_buf) {
                Ok(Some(received)) => received,
                Ok(None) => break,
                Err(e) => {
                    log::error!("Receive failed: {}", e);
                    break;
                }
            };
            if Some(addr) != self.server {
                log::debug!("Ignoring datagram from stranger {}", addr);
                continue;
            }

            match Packet::decode(&self.recv_buf[..size]) {
                Ok((header, packet)) => self.handle_packet(header, packet, now),
                Err(e) => {
                    log::warn!("Dropping malformed packet from {}: {}", addr, e);
                    self.transport.stats_mut().packets_malformed += 1;
                }
            }
        }
    }

    fn handle_packet(&mut self, header: PacketHeader, packet: Packet, now: f32) {
        match (self.status, packet) {
            (ConnectionStatus::Connecting { .. }, Packet::Connect(connect)) => {
                self.handle_connect(connect);
            }
            (ConnectionStatus::Connected, Packet::Snapshot(snapshot)) => {
                if Some(header.client_id) != self.client_id {
                    log::debug!("Snapshot addressed to client {}", header.client_id);
                    return;
                }
                self.apply_snapshot(snapshot, now);
            }
            (ConnectionStatus::Disconnected, Packet::Disconnect) => {}
            (_, Packet::Disconnect) => {
                log::info!("Server closed the session");
                self.reset();
            }
            (_, packet) => {
                log::debug!("Ignoring {:?} while {:?}", packet.packet_type(), self.status);
            }
        }
    }

    fn handle_connect(&mut self, connect: ConnectPacket) {
        let id = connect.client_id;
        log::info!("Connected as client {}", id);

        self.state.clear();
        self.client_id = Some(id);
        self.state.set_controlled(Some(id));
        self.status = ConnectionStatus::Connected;

        for record in &connect.players {
            self.state
                .place_player(record.id, record.kinematics, record.health as i32);
            if let Some(player) = self.state.player_mut(record.id) {
                if record.id == id {
                    player.just_joined = false;
                } else {
                    player.receive_sample(record.kinematics.snapshot());
                }
            }
        }
    }

    fn apply_snapshot(&mut self, snapshot: SnapshotPacket, now: f32) {
        let own = self.client_id;

        // A joined id may reuse the slot of a player whose leave was lost.
        for &id in snapshot.joined.iter().filter(|&&id| Some(id) != own) {
            if self.state.remove_player(id) {
                log::debug!("Player {} replaced by a newcomer", id);
            }
            log::info!("Player {} joined", id);
        }
        for &id in snapshot.left.iter().filter(|&&id| Some(id) != own) {
            if self.state.remove_player(id) {
                log::info!("Player {} left", id);
            }
        }

        // The table is complete, so it also repairs lost join and leave lists.
        let mut listed = [false; MAX_PLAYER_COUNT];
        for record in &snapshot.players {
            listed[record.id as usize] = true;
        }
        let stale: Vec<u32> = self
            .state
            .players()
            .map(|(id, _)| id)
            .filter(|&id| Some(id) != own && !listed[id as usize])
            .collect();
        for id in stale {
            log::debug!("Player {} missing from snapshot, removing", id);
            self.state.remove_player(id);
        }

        for record in &snapshot.players {
            let health = record.health as i32;

            if Some(record.id) == own {
                self.sync_controlled(record, snapshot.prediction_error);
                continue;
            }

            if self.state.player(record.id).is_none() {
                self.state
                    .place_player(record.id, record.kinematics, health);
            }
            if let Some(player) = self.state.player_mut(record.id) {
                player.health = health;
                player.kinematics.speed = record.kinematics.speed;
                player.receive_sample(record.kinematics.snapshot());
            }
        }

        for bullet in snapshot.bullets.iter().filter(|b| Some(b.shooter) != own) {
            let trajectory = BulletTrajectory {
                start: bullet.start,
                end: bullet.end,
                time_start: now - bullet.age,
                shooter: bullet.shooter,
            };
            if let Err(e) = self.state.insert_bullet(trajectory) {
                log::warn!("Dropping bullet from player {}: {}", bullet.shooter, e);
            }
        }
    }

    fn sync_controlled(&mut self, record: &PlayerRecord, prediction_error: bool) {
        let health = record.health as i32;

        if self.state.player(record.id).is_none() {
            self.state
                .place_player(record.id, record.kinematics, health);
            if let Some(player) = self.state.player_mut(record.id) {
                player.just_joined = false;
            }
        } else if prediction_error {
            log::warn!("Prediction error, resyncing to {:?}", record.kinematics);
            apply_correction(
                &mut self.state,
                record.id,
                record.kinematics,
                health,
                &mut self.commands,
            );
            self.corrections += 1;
        } else if let Some(player) = self.state.player_mut(record.id) {
            player.health = health;
        }
    }

    fn predict(&mut self, command: Command, now: f32) {
        let Some(id) = self.client_id else {
            return;
        };
        // An unsent command would make the next batch diverge.
        if self.commands.is_full() {
            log::debug!("Command stack full, dropping input");
            return;
        }
        apply_command(&mut self.state, id, &command, now);
        self.commands.push(command);
    }

    fn interpolate_remotes(&mut self, dt: f32) {
        let own = self.client_id;
        for (_, player) in self.state.players_mut().filter(|(id, _)| Some(*id) != own) {
            player.interpolate(dt);
        }
    }

    fn flush_commands(&mut self, now: f32) {
        let due = self
            .last_commands_sent
            .is_none_or(|last| now - last >= self.config.command_interval);
        let (Some(id), Some(server)) = (self.client_id, self.server) else {
            return;
        };
        if !due {
            return;
        }
        let Some(predicted) = self.state.player(id).map(|p| p.kinematics) else {
            return;
        };

        let batch = Packet::Commands(CommandsPacket {
            predicted,
            commands: self.commands.drain(),
        });
        if let Err(e) = self.send(&batch, id, server) {
            log::error!("Failed to send commands: {}", e);
        }
        self.last_commands_sent = Some(now);
    }

    fn send(&mut self, packet: &Packet, client_id: u32, to: SocketAddr) -> Result<(), ClientError> {
        let len = packet.encode(client_id, &mut self.send_buf)?;
        self.transport.send_to(&self.send_buf[..len], to)?;
        Ok(())
    }
}
