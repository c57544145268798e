//! Gameplay tuning shared by the client and the server.
//!
//! Both sides must agree on every value here, otherwise client-side prediction
//! diverges from the authoritative replay on every command.

use crate::net::MAX_HEADER_CLIENT_ID;

/// Size of the player table. Client ids and player slots share this range.
pub const MAX_PLAYER_COUNT: usize = 20;

/// Maximum number of bullet trails alive at once.
pub const MAX_BULLET_TRAILS: usize = 50;

/// Commands a client may buffer between two `Commands` packets.
pub const MAX_COMMANDS: usize = 10;

/// The arena is a `GRID_WIDTH` x `GRID_WIDTH` grid of square boxes.
pub const GRID_WIDTH: u32 = 8;
pub const GRID_BOX_SIZE: f32 = 5.0;

/// Half the side length of the square arena, in world units.
pub const ARENA_HALF_EXTENT: f32 = GRID_WIDTH as f32 / 2.0 * GRID_BOX_SIZE;

pub const PLAYER_SPEED: f32 = 4.0;
pub const BASE_HEALTH: i32 = 100;
pub const BULLET_DAMAGE: i32 = 25;
pub const HIT_DISTANCE_SQUARED: f32 = 1.0;

/// Seconds the lazer beam is drawn, followed by the explosion.
pub const MAX_LAZER_TIME: f32 = 0.5;
pub const MAX_EXPLOSION_TIME: f32 = 0.3;
pub const BULLET_LIFETIME: f32 = MAX_LAZER_TIME + MAX_EXPLOSION_TIME;

pub const COMMANDS_PACKET_INTERVAL: f32 = 0.04;
pub const SNAPSHOT_PACKET_INTERVAL: f32 = 0.05;

/// Per-component tolerance between a client's prediction and the server replay.
pub const PREDICTION_EPSILON: f32 = 1e-4;

/// Default UDP ports. Binding moves to the next free port on conflict.
pub const MAIN_SOCKET_PORT_SERVER: u16 = 5999;
pub const MAIN_SOCKET_PORT_CLIENT: u16 = 6000;

pub const PLAYER_SNAPSHOT_CAPACITY: usize = 40;
pub const MIN_BUFFERED_SNAPSHOTS: usize = 3;

// Client ids travel in a 5-bit header field.
const _: () = assert!(MAX_PLAYER_COUNT <= MAX_HEADER_CLIENT_ID as usize + 1);
