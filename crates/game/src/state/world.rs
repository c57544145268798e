use glam::Vec2;
use rand::Rng;

use super::bullet::BulletTrajectory;
use super::player::{Kinematics, Player};
use crate::slots::{SlotAllocator, SlotError};
use crate::tuning::{MAX_BULLET_TRAILS, MAX_PLAYER_COUNT};

/// Players and in-flight bullet trails, addressed by slot index.
///
/// On the server the player allocator hands out ids, and the same id indexes
/// the connection table. Clients mirror whatever ids the server announces
/// through [`GameState::place_player`] and never allocate player slots.
#[derive(Debug, Clone)]
pub struct GameState {
    players: Vec<Player>,
    player_slots: SlotAllocator<MAX_PLAYER_COUNT>,
    bullets: Vec<BulletTrajectory>,
    bullet_slots: SlotAllocator<MAX_BULLET_TRAILS>,
    controlled: Option<u32>,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

impl GameState {
    pub fn new() -> Self {
        Self {
            players: vec![Player::default(); MAX_PLAYER_COUNT],
            player_slots: SlotAllocator::new(),
            bullets: vec![BulletTrajectory::default(); MAX_BULLET_TRAILS],
            bullet_slots: SlotAllocator::new(),
            controlled: None,
        }
    }

    pub fn controlled(&self) -> Option<u32> {
        self.controlled
    }

    pub fn set_controlled(&mut self, id: Option<u32>) {
        self.controlled = id;
    }

    /// Allocates a fresh player id and spawns it at a random point.
    pub fn spawn_player<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<u32, SlotError> {
        let id = self.player_slots.allocate()?;
        self.players[id] = Player::spawned(Kinematics::random(rng));
        Ok(id as u32)
    }

    /// Mirrors a player announced by the server. Returns true if it was unknown.
    pub fn place_player(&mut self, id: u32, kinematics: Kinematics, health: i32) -> bool {
        let Some(player) = self.players.get_mut(id as usize) else {
            return false;
        };
        let is_new = !player.initialized;
        if is_new {
            *player = Player::spawned(kinematics);
        } else {
            player.kinematics = kinematics;
        }
        player.health = health;
        is_new
    }

    pub fn remove_player(&mut self, id: u32) -> bool {
        let Some(player) = self.players.get_mut(id as usize) else {
            return false;
        };
        let was_initialized = player.initialized;
        *player = Player::default();

        if self.player_slots.is_live(id as usize) {
            let _ = self.player_slots.free(id as usize);
        }
        if self.controlled == Some(id) {
            self.controlled = None;
        }
        was_initialized
    }

    pub fn respawn_player<R: Rng + ?Sized>(&mut self, id: u32, rng: &mut R) {
        if let Some(player) = self.player_mut(id) {
            player.respawn(Kinematics::random(rng));
        }
    }

    pub fn player(&self, id: u32) -> Option<&Player> {
        self.players.get(id as usize).filter(|p| p.initialized)
    }

    pub fn player_mut(&mut self, id: u32) -> Option<&mut Player> {
        self.players.get_mut(id as usize).filter(|p| p.initialized)
    }

    /// Initialized players with their ids, ascending.
    pub fn players(&self) -> impl Iterator<Item = (u32, &Player)> {
        self.players
            .iter()
            .enumerate()
            .filter(|(_, p)| p.initialized)
            .map(|(id, p)| (id as u32, p))
    }

    pub fn players_mut(&mut self) -> impl Iterator<Item = (u32, &mut Player)> {
        self.players
            .iter_mut()
            .enumerate()
            .filter(|(_, p)| p.initialized)
            .map(|(id, p)| (id as u32, p))
    }

    pub fn player_count(&self) -> usize {
        self.players.iter().filter(|p| p.initialized).count()
    }

    pub fn spawn_bullet(
        &mut self,
        start: Vec2,
        end: Vec2,
        time_start: f32,
        shooter: u32,
    ) -> Result<usize, SlotError> {
        self.insert_bullet(BulletTrajectory {
            start,
            end,
            time_start,
            shooter,
        })
    }

    pub fn insert_bullet(&mut self, trajectory: BulletTrajectory) -> Result<usize, SlotError> {
        let slot = self.bullet_slots.allocate()?;
        self.bullets[slot] = trajectory;
        Ok(slot)
    }

    pub fn bullet(&self, slot: usize) -> Option<&BulletTrajectory> {
        self.bullet_slots
            .is_live(slot)
            .then(|| &self.bullets[slot])
    }

    pub fn live_bullets(&self) -> impl Iterator<Item = (usize, &BulletTrajectory)> {
        self.bullet_slots
            .iter_live()
            .map(|slot| (slot, &self.bullets[slot]))
    }

    pub fn bullet_count(&self) -> usize {
        self.bullet_slots.live_count()
    }

    /// Frees every trail whose visual lifetime is over. Returns how many.
    pub fn sweep_expired_bullets(&mut self, now: f32) -> usize {
        let expired: Vec<usize> = self
            .live_bullets()
            .filter(|(_, b)| b.is_expired(now))
            .map(|(slot, _)| slot)
            .collect();

        for &slot in &expired {
            let _ = self.bullet_slots.free(slot);
            for player in self.players.iter_mut() {
                if player.last_trajectory == Some(slot) {
                    player.last_trajectory = None;
                }
            }
        }
        expired.len()
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }
}
