use glam::Vec2;
use rand::Rng;

use crate::interpolation::RemoteInterpolation;
use crate::tuning::{ARENA_HALF_EXTENT, BASE_HEALTH, PLAYER_SPEED};

/// The part of a player that prediction touches and reconciliation compares.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Kinematics {
    pub position: Vec2,
    pub orientation: f32,
    pub speed: f32,
}

impl Kinematics {
    pub fn new(position: Vec2, orientation: f32) -> Self {
        Self {
            position,
            orientation,
            speed: PLAYER_SPEED,
        }
    }

    /// Uniformly random spawn point and facing inside the arena.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let position = Vec2::new(
            rng.gen_range(-ARENA_HALF_EXTENT..=ARENA_HALF_EXTENT),
            rng.gen_range(-ARENA_HALF_EXTENT..=ARENA_HALF_EXTENT),
        );
        let orientation = rng.gen_range(-std::f32::consts::PI..std::f32::consts::PI);
        Self::new(position, orientation)
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            position: self.position,
            orientation: self.orientation,
        }
    }
}

/// What a remote player needs to be drawn between two received samples.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlayerSnapshot {
    pub position: Vec2,
    pub orientation: f32,
}

#[derive(Debug, Clone)]
pub struct Player {
    pub kinematics: Kinematics,
    pub health: i32,
    pub initialized: bool,
    /// Set until the first sample arrives, which is then snapped to directly.
    pub just_joined: bool,
    /// Slot of the most recent bullet this player fired, if still tracked.
    pub last_trajectory: Option<usize>,
    pub interpolation: RemoteInterpolation,
}

impl Default for Player {
    fn default() -> Self {
        Self {
            kinematics: Kinematics::default(),
            health: BASE_HEALTH,
            initialized: false,
            just_joined: false,
            last_trajectory: None,
            interpolation: RemoteInterpolation::new(),
        }
    }
}

impl Player {
    pub fn spawned(kinematics: Kinematics) -> Self {
        Self {
            kinematics,
            initialized: true,
            just_joined: true,
            ..Default::default()
        }
    }

    pub fn is_dead(&self) -> bool {
        self.health <= 0
    }

    /// Health as carried on the wire.
    pub fn wire_health(&self) -> u32 {
        self.health.max(0) as u32
    }

    /// Feeds a received sample of a remote player into its playback. The
    /// first sample after joining is jumped to directly.
    pub fn receive_sample(&mut self, sample: PlayerSnapshot) {
        if self.just_joined {
            self.interpolation.snap_to(sample);
            self.kinematics.position = sample.position;
            self.kinematics.orientation = sample.orientation;
            self.just_joined = false;
        } else {
            self.interpolation.push(sample);
        }
    }

    /// Moves a remote player along its buffered samples.
    pub fn interpolate(&mut self, dt: f32) {
        if let Some(pose) = self.interpolation.update(dt) {
            self.kinematics.position = pose.position;
            self.kinematics.orientation = pose.orientation;
        }
    }

    pub fn respawn(&mut self, kinematics: Kinematics) {
        self.kinematics = kinematics;
        self.health = BASE_HEALTH;
        self.last_trajectory = None;
    }
}
