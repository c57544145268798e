use std::f32::consts::{PI, TAU};

use super::ring::SnapshotRing;
use crate::state::PlayerSnapshot;
use crate::tuning::{MIN_BUFFERED_SNAPSHOTS, PLAYER_SNAPSHOT_CAPACITY, SNAPSHOT_PACKET_INTERVAL};

/// Signed shortest angular distance from `from` to `to`.
fn angle_delta(from: f32, to: f32) -> f32 {
    let mut delta = (to - from) % TAU;
    if delta > PI {
        delta -= TAU;
    } else if delta < -PI {
        delta += TAU;
    }
    delta
}

pub fn lerp_snapshot(from: &PlayerSnapshot, to: &PlayerSnapshot, t: f32) -> PlayerSnapshot {
    PlayerSnapshot {
        position: from.position.lerp(to.position, t),
        orientation: from.orientation + angle_delta(from.orientation, to.orientation) * t,
    }
}

/// Playback of a remote player's received samples at the snapshot rate.
///
/// Samples arrive in bursts; playback only moves once
/// `MIN_BUFFERED_SNAPSHOTS` are queued, then advances one sample per
/// `SNAPSHOT_PACKET_INTERVAL` of local time, skipping ahead when it falls behind.
#[derive(Debug, Clone, Default)]
pub struct RemoteInterpolation {
    progress: f32,
    samples: SnapshotRing<PlayerSnapshot, PLAYER_SNAPSHOT_CAPACITY>,
}

impl RemoteInterpolation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn buffered(&self) -> usize {
        self.samples.len()
    }

    pub fn push(&mut self, sample: PlayerSnapshot) {
        self.samples.push(sample);
    }

    /// Restarts playback from `sample` alone.
    pub fn snap_to(&mut self, sample: PlayerSnapshot) {
        self.samples.clear();
        self.samples.push(sample);
        self.progress = 0.0;
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.progress = 0.0;
    }

    /// Advances playback by `dt` seconds and returns the pose to draw.
    pub fn update(&mut self, dt: f32) -> Option<PlayerSnapshot> {
        if self.samples.len() >= MIN_BUFFERED_SNAPSHOTS {
            self.progress += dt / SNAPSHOT_PACKET_INTERVAL;

            if self.progress >= 1.0 {
                let skip = self.progress.floor();
                self.samples
                    .advance((skip as usize).min(self.samples.len() - 1));
                self.progress -= skip;
            }
        }

        self.current()
    }

    pub fn current(&self) -> Option<PlayerSnapshot> {
        let from = self.samples.peek(0)?;
        Some(match self.samples.peek(1) {
            Some(to) => lerp_snapshot(from, to, self.progress),
            None => *from,
        })
    }
}
