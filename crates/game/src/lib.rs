pub mod interpolation;
pub mod net;
pub mod reconcile;
pub mod session;
pub mod simulation;
pub mod slots;
pub mod state;
pub mod tuning;

pub use interpolation::{RemoteInterpolation, SnapshotRing};
pub use net::{
    NetworkEndpoint, NetworkStats, Packet, PacketError, PacketHeader, PacketLossSimulation,
    PacketType, Transport,
};
pub use reconcile::{ReconcileOutcome, apply_correction, matches_prediction, reconcile_batch};
pub use session::{
    ClientConfig, ClientError, ConnectionStatus, DisconnectReason, GameClient, GameServer,
    ServerConfig, ServerEvent,
};
pub use simulation::{ActionFlags, Command, CommandStack, HitEvent, apply_command, resolve_hits};
pub use slots::{BitVector, SlotAllocator, SlotError};
pub use state::{BulletTrajectory, GameState, Kinematics, Player, PlayerSnapshot};
pub use tuning::{MAIN_SOCKET_PORT_CLIENT, MAIN_SOCKET_PORT_SERVER};
