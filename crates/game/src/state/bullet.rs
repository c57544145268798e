use glam::Vec2;

use crate::tuning::{BULLET_LIFETIME, MAX_LAZER_TIME};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BulletTrajectory {
    pub start: Vec2,
    pub end: Vec2,
    /// Local clock time of the shot, in seconds.
    pub time_start: f32,
    pub shooter: u32,
}

impl BulletTrajectory {
    pub fn age(&self, now: f32) -> f32 {
        now - self.time_start
    }

    pub fn is_expired(&self, now: f32) -> bool {
        self.age(now) >= BULLET_LIFETIME
    }

    /// True while the beam is still drawn, before the explosion phase.
    pub fn is_lazer_visible(&self, now: f32) -> bool {
        self.age(now) < MAX_LAZER_TIME
    }
}
