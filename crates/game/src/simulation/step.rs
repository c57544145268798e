use glam::Vec2;
use rand::Rng;

use super::command::{ActionFlags, Command};
use crate::state::{GameState, Kinematics};
use crate::tuning::{ARENA_HALF_EXTENT, BULLET_DAMAGE, HIT_DISTANCE_SQUARED};

/// A bullet that landed on a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitEvent {
    pub shooter: u32,
    pub victim: u32,
    pub health_left: i32,
    pub respawned: bool,
}

#[inline]
pub fn clamp_to_arena(position: Vec2) -> Vec2 {
    position.clamp(Vec2::splat(-ARENA_HALF_EXTENT), Vec2::splat(ARENA_HALF_EXTENT))
}

/// Movement part of a command. Diagonal movement is not normalized.
pub fn advance_player(kinematics: &mut Kinematics, command: &Command) {
    kinematics.orientation = command.new_orientation;

    let step = kinematics.speed * command.dt;
    let actions = command.actions;
    if actions.contains(ActionFlags::MOVE_UP) {
        kinematics.position.y += step;
    }
    if actions.contains(ActionFlags::MOVE_DOWN) {
        kinematics.position.y -= step;
    }
    if actions.contains(ActionFlags::MOVE_LEFT) {
        kinematics.position.x -= step;
    }
    if actions.contains(ActionFlags::MOVE_RIGHT) {
        kinematics.position.x += step;
    }

    kinematics.position = clamp_to_arena(kinematics.position);
}

/// Applies one command to player `id`, identically for prediction and replay.
///
/// `now` stamps any bullet fired. The server always passes its own clock so a
/// client cannot back-date its shots. Returns the slot of the spawned bullet.
pub fn apply_command(state: &mut GameState, id: u32, command: &Command, now: f32) -> Option<usize> {
    let start = {
        let player = state.player_mut(id)?;
        advance_player(&mut player.kinematics, command);
        player.kinematics.position
    };

    let shot = if command.shoots() {
        match state.spawn_bullet(start, command.shoot_target, now, id) {
            Ok(slot) => {
                if let Some(player) = state.player_mut(id) {
                    player.last_trajectory = Some(slot);
                }
                Some(slot)
            }
            Err(e) => {
                log::warn!("Dropping shot from player {}: {}", id, e);
                None
            }
        }
    } else {
        None
    };

    state.sweep_expired_bullets(now);
    shot
}

/// Server-side hit test for a freshly fired bullet.
///
/// Every initialized player near the bullet's end point takes damage. Players
/// dropping to zero health respawn elsewhere instead of leaving the game.
pub fn resolve_hits<R: Rng + ?Sized>(
    state: &mut GameState,
    bullet: usize,
    rng: &mut R,
) -> Vec<HitEvent> {
    let Some(trajectory) = state.bullet(bullet).copied() else {
        return Vec::new();
    };

    let victims: Vec<u32> = state
        .players()
        .filter(|(_, p)| {
            p.kinematics.position.distance_squared(trajectory.end) < HIT_DISTANCE_SQUARED
        })
        .map(|(id, _)| id)
        .collect();

    let mut hits = Vec::with_capacity(victims.len());
    for victim in victims {
        let Some(player) = state.player_mut(victim) else {
            continue;
        };
        player.health -= BULLET_DAMAGE;
        let health_left = player.health;
        let respawned = player.is_dead();
        if respawned {
            state.respawn_player(victim, rng);
        }

        log::debug!(
            "Player {} hit player {} ({} health left{})",
            trajectory.shooter,
            victim,
            health_left,
            if respawned { ", respawned" } else { "" }
        );
        hits.push(HitEvent {
            shooter: trajectory.shooter,
            victim,
            health_left,
            respawned,
        });
    }
    hits
}
