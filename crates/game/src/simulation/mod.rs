mod command;
mod step;

pub use command::{ActionFlags, Command, CommandStack};
pub use step::{HitEvent, advance_player, apply_command, clamp_to_arena, resolve_hits};
