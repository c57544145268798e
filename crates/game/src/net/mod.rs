mod codec;
mod protocol;
mod stats;
mod transport;

pub use codec::{WireReader, WireWriter};
pub use protocol::{
    BulletRecord, CommandsPacket, ConnectPacket, HEADER_SIZE, MAX_HEADER_CLIENT_ID,
    MAX_PACKET_SIZE, PREDICTION_ERROR_OFFSET, Packet, PacketError, PacketHeader, PacketType,
    PlayerRecord, SnapshotPacket, address_snapshot,
};
pub use stats::NetworkStats;
pub use transport::{BIND_ATTEMPTS, NetworkEndpoint, PacketLossSimulation, Transport};
