use glam::Vec2;

use super::codec::{WireReader, WireWriter};
use crate::simulation::{ActionFlags, Command};
use crate::state::Kinematics;
use crate::tuning::{MAX_BULLET_TRAILS, MAX_PLAYER_COUNT};

pub const MAX_PACKET_SIZE: usize = 2048;
pub const HEADER_SIZE: usize = 4;

/// Byte offset of the prediction-error flag inside a snapshot datagram.
pub const PREDICTION_ERROR_OFFSET: usize = HEADER_SIZE;

const TYPE_BITS: u32 = 4;
const CLIENT_ID_BITS: u32 = 5;
const TYPE_MASK: u32 = (1 << TYPE_BITS) - 1;
pub const MAX_HEADER_CLIENT_ID: u32 = (1 << CLIENT_ID_BITS) - 1;

const PLAYER_RECORD_SIZE: usize = 24;
const COMMAND_RECORD_SIZE: usize = 20;
const BULLET_RECORD_SIZE: usize = 24;
const MAX_WIRE_COMMANDS: usize = MAX_PACKET_SIZE / COMMAND_RECORD_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    Discover = 0,
    Connect = 1,
    Commands = 2,
    Snapshot = 3,
    Disconnect = 4,
}

impl TryFrom<u32> for PacketType {
    type Error = PacketError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PacketType::Discover),
            1 => Ok(PacketType::Connect),
            2 => Ok(PacketType::Commands),
            3 => Ok(PacketType::Snapshot),
            4 => Ok(PacketType::Disconnect),
            other => Err(PacketError::UnknownType(other)),
        }
    }
}

/// First word of every datagram: 4-bit type tag, 5-bit client id, the rest zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub packet_type: PacketType,
    pub client_id: u32,
}

impl PacketHeader {
    pub fn new(packet_type: PacketType, client_id: u32) -> Self {
        Self {
            packet_type,
            client_id,
        }
    }

    pub fn to_word(self) -> Result<u32, PacketError> {
        if self.client_id > MAX_HEADER_CLIENT_ID {
            return Err(PacketError::ClientIdOutOfRange(self.client_id));
        }
        Ok(self.packet_type as u32 | self.client_id << TYPE_BITS)
    }

    pub fn from_word(word: u32) -> Result<Self, PacketError> {
        if word >> (TYPE_BITS + CLIENT_ID_BITS) != 0 {
            return Err(PacketError::ReservedBits(word));
        }
        Ok(Self {
            packet_type: PacketType::try_from(word & TYPE_MASK)?,
            client_id: (word >> TYPE_BITS) & MAX_HEADER_CLIENT_ID,
        })
    }
}

/// Authoritative per-player row shared by `Connect` and `Snapshot`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerRecord {
    pub id: u32,
    pub kinematics: Kinematics,
    pub health: u32,
}

impl PlayerRecord {
    fn encode(&self, w: &mut WireWriter<'_>) -> Result<(), PacketError> {
        w.write_u32(self.id)?;
        w.write_vec2(self.kinematics.position)?;
        w.write_f32(self.kinematics.orientation)?;
        w.write_f32(self.kinematics.speed)?;
        w.write_u32(self.health)
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, PacketError> {
        let id = read_player_id(r)?;
        let position = r.read_vec2()?;
        let orientation = r.read_f32()?;
        let speed = r.read_f32()?;
        Ok(Self {
            id,
            kinematics: Kinematics {
                position,
                orientation,
                speed,
            },
            health: r.read_u32()?,
        })
    }
}

/// A bullet trail created since the previous snapshot. `age` is seconds since
/// the shot, so receivers can rebase it onto their own clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BulletRecord {
    pub start: Vec2,
    pub end: Vec2,
    pub age: f32,
    pub shooter: u32,
}

impl BulletRecord {
    fn encode(&self, w: &mut WireWriter<'_>) -> Result<(), PacketError> {
        w.write_vec2(self.start)?;
        w.write_vec2(self.end)?;
        w.write_f32(self.age)?;
        w.write_u32(self.shooter)
    }

    fn decode(r: &mut WireReader<'_>) -> Result<Self, PacketError> {
        Ok(Self {
            start: r.read_vec2()?,
            end: r.read_vec2()?,
            age: r.read_f32()?,
            shooter: read_player_id(r)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectPacket {
    pub client_id: u32,
    pub players: Vec<PlayerRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommandsPacket {
    /// State the client claims to have reached after applying `commands`.
    pub predicted: Kinematics,
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SnapshotPacket {
    pub prediction_error: bool,
    pub joined: Vec<u32>,
    pub left: Vec<u32>,
    pub players: Vec<PlayerRecord>,
    pub bullets: Vec<BulletRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Discover,
    Connect(ConnectPacket),
    Commands(CommandsPacket),
    Snapshot(SnapshotPacket),
    Disconnect,
}

#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("packet needs {needed} bytes but the buffer holds {capacity}")]
    Overflow { needed: usize, capacity: usize },
    #[error("packet truncated: needed {needed} bytes, got {len}")]
    Truncated { needed: usize, len: usize },
    #[error("unknown packet type {0}")]
    UnknownType(u32),
    #[error("reserved header bits set in {0:#010x}")]
    ReservedBits(u32),
    #[error("client id {0} does not fit the header")]
    ClientIdOutOfRange(u32),
    #[error("player id {0} outside the player table")]
    InvalidPlayerId(u32),
    #[error("record count {count} exceeds {max}")]
    CountOutOfRange { count: usize, max: usize },
    #[error("unknown action bits {0:#x}")]
    InvalidActions(u32),
    #[error("{0} trailing bytes after packet body")]
    TrailingBytes(usize),
}

fn read_player_id(r: &mut WireReader<'_>) -> Result<u32, PacketError> {
    let id = r.read_u32()?;
    if id as usize >= MAX_PLAYER_COUNT {
        return Err(PacketError::InvalidPlayerId(id));
    }
    Ok(id)
}

fn read_player_ids(r: &mut WireReader<'_>) -> Result<Vec<u32>, PacketError> {
    let ids = r.read_ids(MAX_PLAYER_COUNT)?;
    if let Some(&bad) = ids.iter().find(|&&id| id as usize >= MAX_PLAYER_COUNT) {
        return Err(PacketError::InvalidPlayerId(bad));
    }
    Ok(ids)
}

fn write_kinematics(w: &mut WireWriter<'_>, k: &Kinematics) -> Result<(), PacketError> {
    w.write_vec2(k.position)?;
    w.write_f32(k.orientation)?;
    w.write_f32(k.speed)
}

fn read_kinematics(r: &mut WireReader<'_>) -> Result<Kinematics, PacketError> {
    Ok(Kinematics {
        position: r.read_vec2()?,
        orientation: r.read_f32()?,
        speed: r.read_f32()?,
    })
}

fn write_command(w: &mut WireWriter<'_>, command: &Command) -> Result<(), PacketError> {
    w.write_u32(command.actions.bits())?;
    w.write_f32(command.new_orientation)?;
    w.write_f32(command.dt)?;
    w.write_vec2(command.shoot_target)
}

fn read_command(r: &mut WireReader<'_>) -> Result<Command, PacketError> {
    let bits = r.read_u32()?;
    let actions = ActionFlags::from_bits(bits).ok_or(PacketError::InvalidActions(bits))?;
    Ok(Command {
        actions,
        new_orientation: r.read_f32()?,
        dt: r.read_f32()?,
        shoot_target: r.read_vec2()?,
    })
}

impl Packet {
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::Discover => PacketType::Discover,
            Packet::Connect(_) => PacketType::Connect,
            Packet::Commands(_) => PacketType::Commands,
            Packet::Snapshot(_) => PacketType::Snapshot,
            Packet::Disconnect => PacketType::Disconnect,
        }
    }

    /// Writes header and body into `buf`, returning the datagram length.
    pub fn encode(&self, client_id: u32, buf: &mut [u8]) -> Result<usize, PacketError> {
        let mut w = WireWriter::new(buf);
        w.write_u32(PacketHeader::new(self.packet_type(), client_id).to_word()?)?;

        match self {
            Packet::Discover | Packet::Disconnect => {}
            Packet::Connect(connect) => {
                w.write_u32(connect.client_id)?;
                w.write_u32(connect.players.len() as u32)?;
                for player in &connect.players {
                    player.encode(&mut w)?;
                }
            }
            Packet::Commands(batch) => {
                write_kinematics(&mut w, &batch.predicted)?;
                w.write_u32(batch.commands.len() as u32)?;
                for command in &batch.commands {
                    write_command(&mut w, command)?;
                }
            }
            Packet::Snapshot(snapshot) => {
                w.write_u8(snapshot.prediction_error as u8)?;
                w.write_ids(&snapshot.joined)?;
                w.write_ids(&snapshot.left)?;
                w.write_u32(snapshot.players.len() as u32)?;
                for player in &snapshot.players {
                    player.encode(&mut w)?;
                }
                w.write_u32(snapshot.bullets.len() as u32)?;
                for bullet in &snapshot.bullets {
                    bullet.encode(&mut w)?;
                }
            }
        }

        Ok(w.position())
    }

    pub fn decode(data: &[u8]) -> Result<(PacketHeader, Packet), PacketError> {
        let mut r = WireReader::new(data);
        let header = PacketHeader::from_word(r.read_u32()?)?;

        let packet = match header.packet_type {
            PacketType::Discover => Packet::Discover,
            PacketType::Disconnect => Packet::Disconnect,
            PacketType::Connect => {
                let client_id = read_player_id(&mut r)?;
                let count = r.read_count(PLAYER_RECORD_SIZE, MAX_PLAYER_COUNT)?;
                let players = (0..count)
                    .map(|_| PlayerRecord::decode(&mut r))
                    .collect::<Result<_, _>>()?;
                Packet::Connect(ConnectPacket { client_id, players })
            }
            PacketType::Commands => {
                let predicted = read_kinematics(&mut r)?;
                let count = r.read_count(COMMAND_RECORD_SIZE, MAX_WIRE_COMMANDS)?;
                let commands = (0..count)
                    .map(|_| read_command(&mut r))
                    .collect::<Result<_, _>>()?;
                Packet::Commands(CommandsPacket {
                    predicted,
                    commands,
                })
            }
            PacketType::Snapshot => {
                let prediction_error = r.read_u8()? != 0;
                let joined = read_player_ids(&mut r)?;
                let left = read_player_ids(&mut r)?;
                let count = r.read_count(PLAYER_RECORD_SIZE, MAX_PLAYER_COUNT)?;
                let players = (0..count)
                    .map(|_| PlayerRecord::decode(&mut r))
                    .collect::<Result<_, _>>()?;
                let count = r.read_count(BULLET_RECORD_SIZE, MAX_BULLET_TRAILS)?;
                let bullets = (0..count)
                    .map(|_| BulletRecord::decode(&mut r))
                    .collect::<Result<_, _>>()?;
                Packet::Snapshot(SnapshotPacket {
                    prediction_error,
                    joined,
                    left,
                    players,
                    bullets,
                })
            }
        };

        if r.remaining() != 0 {
            return Err(PacketError::TrailingBytes(r.remaining()));
        }

        Ok((header, packet))
    }
}

/// Rewrites the recipient-specific parts of an encoded snapshot in place:
/// the header word and the prediction-error byte.
pub fn address_snapshot(
    datagram: &mut [u8],
    client_id: u32,
    prediction_error: bool,
) -> Result<(), PacketError> {
    let word = PacketHeader::new(PacketType::Snapshot, client_id).to_word()?;
    let mut w = WireWriter::filled(datagram);
    w.patch_u32(0, word)?;
    w.patch_u8(PREDICTION_ERROR_OFFSET, prediction_error as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: u32, x: f32, y: f32) -> PlayerRecord {
        PlayerRecord {
            id,
            kinematics: Kinematics {
                position: Vec2::new(x, y),
                orientation: -1.25,
                speed: 4.0,
            },
            health: 75,
        }
    }

    fn encode(packet: &Packet, client_id: u32) -> Vec<u8> {
        let mut buf = [0u8; MAX_PACKET_SIZE];
        let len = packet.encode(client_id, &mut buf).unwrap();
        buf[..len].to_vec()
    }

    #[test]
    fn header_packs_type_and_client_id() {
        let header = PacketHeader::new(PacketType::Snapshot, 19);
        let word = header.to_word().unwrap();
        assert_eq!(word, 3 | 19 << 4);
        assert_eq!(PacketHeader::from_word(word).unwrap(), header);
    }

    #[test]
    fn header_rejects_out_of_range_fields() {
        assert!(matches!(
            PacketHeader::new(PacketType::Discover, 32).to_word(),
            Err(PacketError::ClientIdOutOfRange(32))
        ));
        assert!(matches!(
            PacketHeader::from_word(9),
            Err(PacketError::UnknownType(9))
        ));
        assert!(matches!(
            PacketHeader::from_word(1 << 12),
            Err(PacketError::ReservedBits(_))
        ));
    }

    #[test]
    fn header_only_packets_are_four_bytes() {
        let bytes = encode(&Packet::Disconnect, 7);
        assert_eq!(bytes.len(), HEADER_SIZE);
        let (header, packet) = Packet::decode(&bytes).unwrap();
        assert_eq!(header.client_id, 7);
        assert_eq!(packet, Packet::Disconnect);
    }

    #[test]
    fn connect_round_trip() {
        let packet = Packet::Connect(ConnectPacket {
            client_id: 2,
            players: vec![player(0, -3.5, 1.0), player(2, 19.75, -20.0)],
        });
        let bytes = encode(&packet, 2);
        assert_eq!(bytes.len(), HEADER_SIZE + 8 + 2 * PLAYER_RECORD_SIZE);
        assert_eq!(Packet::decode(&bytes).unwrap().1, packet);
    }

    #[test]
    fn commands_round_trip() {
        let packet = Packet::Commands(CommandsPacket {
            predicted: player(0, 1.0, 2.0).kinematics,
            commands: vec![
                Command {
                    actions: ActionFlags::MOVE_UP | ActionFlags::SHOOT,
                    new_orientation: 0.5,
                    dt: 0.016,
                    shoot_target: Vec2::new(-4.0, 8.5),
                },
                Command::idle(0.25, 0.1),
            ],
        });
        let bytes = encode(&packet, 4);
        assert_eq!(bytes.len(), HEADER_SIZE + 20 + 2 * COMMAND_RECORD_SIZE);
        let (header, decoded) = Packet::decode(&bytes).unwrap();
        assert_eq!(header.packet_type, PacketType::Commands);
        assert_eq!(decoded, packet);
    }

    #[test]
    fn snapshot_round_trip() {
        let packet = Packet::Snapshot(SnapshotPacket {
            prediction_error: true,
            joined: vec![3],
            left: vec![1, 5],
            players: vec![player(0, 0.0, 0.0), player(3, -7.0, 12.0)],
            bullets: vec![BulletRecord {
                start: Vec2::new(1.0, -1.0),
                end: Vec2::new(-9.5, 3.25),
                age: 0.125,
                shooter: 3,
            }],
        });
        let bytes = encode(&packet, 0);
        assert_eq!(bytes[PREDICTION_ERROR_OFFSET], 1);
        assert_eq!(Packet::decode(&bytes).unwrap().1, packet);
    }

    #[test]
    fn truncated_snapshot_is_rejected() {
        let packet = Packet::Snapshot(SnapshotPacket {
            players: vec![player(1, 2.0, 3.0)],
            ..Default::default()
        });
        let bytes = encode(&packet, 1);
        for cut in 1..bytes.len() {
            assert!(Packet::decode(&bytes[..cut]).is_err(), "cut at {cut} decoded");
        }
    }

    #[test]
    fn out_of_table_player_id_is_rejected() {
        let packet = Packet::Connect(ConnectPacket {
            client_id: 1,
            players: vec![player(MAX_PLAYER_COUNT as u32, 0.0, 0.0)],
        });
        let bytes = encode(&packet, 1);
        assert!(matches!(
            Packet::decode(&bytes),
            Err(PacketError::InvalidPlayerId(20))
        ));
    }

    #[test]
    fn unknown_action_bits_are_rejected() {
        let mut bytes = encode(
            &Packet::Commands(CommandsPacket {
                predicted: Kinematics::default(),
                commands: vec![Command::idle(0.0, 0.1)],
            }),
            0,
        );
        let actions_offset = HEADER_SIZE + 20;
        bytes[actions_offset + 3] = 0x80;
        assert!(matches!(
            Packet::decode(&bytes),
            Err(PacketError::InvalidActions(_))
        ));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = encode(&Packet::Discover, 0);
        bytes.push(0);
        assert!(matches!(
            Packet::decode(&bytes),
            Err(PacketError::TrailingBytes(1))
        ));
    }

    #[test]
    fn addressed_snapshot_carries_recipient_fields() {
        let packet = Packet::Snapshot(SnapshotPacket {
            players: vec![player(2, 1.0, 1.0), player(7, 2.0, 2.0)],
            ..Default::default()
        });
        let mut bytes = encode(&packet, 0);

        address_snapshot(&mut bytes, 7, true).unwrap();
        let (header, decoded) = Packet::decode(&bytes).unwrap();
        assert_eq!(header, PacketHeader::new(PacketType::Snapshot, 7));
        let Packet::Snapshot(snapshot) = decoded else {
            panic!("expected a snapshot");
        };
        assert!(snapshot.prediction_error);
        assert_eq!(snapshot.players.len(), 2);

        address_snapshot(&mut bytes, 2, false).unwrap();
        let (header, decoded) = Packet::decode(&bytes).unwrap();
        assert_eq!(header.client_id, 2);
        assert!(matches!(decoded, Packet::Snapshot(s) if !s.prediction_error));
    }

    #[test]
    fn addressing_a_short_datagram_fails() {
        let mut bytes = encode(&Packet::Discover, 0);
        assert!(address_snapshot(&mut bytes, 1, false).is_err());
    }
}
