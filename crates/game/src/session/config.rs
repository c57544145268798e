use crate::net::PacketLossSimulation;
use crate::tuning::{COMMANDS_PACKET_INTERVAL, SNAPSHOT_PACKET_INTERVAL};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Minimum seconds between two snapshot broadcasts.
    pub snapshot_interval: f32,
    /// Datagrams read per tick at most.
    pub max_receive_per_tick: usize,
    /// Fixed seed for spawn points, random when unset.
    pub seed: Option<u64>,
    pub packet_loss: Option<PacketLossSimulation>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            snapshot_interval: SNAPSHOT_PACKET_INTERVAL,
            max_receive_per_tick: 20,
            seed: None,
            packet_loss: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub command_interval: f32,
    pub max_receive_per_tick: usize,
    /// Discover packets sent before giving up on the server.
    pub discover_attempts: u32,
    pub discover_retry_interval: f32,
    pub packet_loss: Option<PacketLossSimulation>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            command_interval: COMMANDS_PACKET_INTERVAL,
            max_receive_per_tick: 5,
            discover_attempts: 10,
            discover_retry_interval: 0.5,
            packet_loss: None,
        }
    }
}
