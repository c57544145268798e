mod bullet;
mod player;
mod world;

pub use bullet::BulletTrajectory;
pub use player::{Kinematics, Player, PlayerSnapshot};
pub use world::GameState;
