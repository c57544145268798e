mod remote;
mod ring;

pub use remote::{RemoteInterpolation, lerp_snapshot};
pub use ring::SnapshotRing;
