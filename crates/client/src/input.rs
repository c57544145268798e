use std::f32::consts::TAU;

use glam::Vec2;
use glo::{ActionFlags, Command};

/// Per-frame input as a window layer would report it.
#[derive(Debug, Clone, Default)]
pub struct InputState {
    pub move_up: bool,
    pub move_left: bool,
    pub move_down: bool,
    pub move_right: bool,
    pub fire: bool,
    /// World-space cursor position.
    pub aim: Vec2,
}

impl InputState {
    /// Builds the command for one frame, facing from `position` towards the cursor.
    pub fn to_command(&self, position: Vec2, dt: f32) -> Command {
        let to_aim = self.aim - position;
        let orientation = to_aim.y.atan2(to_aim.x);

        let mut actions = ActionFlags::empty();
        actions.set(ActionFlags::MOVE_UP, self.move_up);
        actions.set(ActionFlags::MOVE_LEFT, self.move_left);
        actions.set(ActionFlags::MOVE_DOWN, self.move_down);
        actions.set(ActionFlags::MOVE_RIGHT, self.move_right);

        let command = Command::idle(orientation, dt).with_actions(actions);
        if self.fire {
            command.shooting_at(self.aim)
        } else {
            command
        }
    }
}

/// Walks a square, turning every `leg_time` seconds, while sweeping the aim
/// around the player and firing at a fixed rate.
#[derive(Debug, Clone)]
pub struct ScriptedInput {
    elapsed: f32,
    last_shot: f32,
    leg_time: f32,
    fire_interval: f32,
}

impl ScriptedInput {
    pub fn new(leg_time: f32, fire_interval: f32) -> Self {
        Self {
            elapsed: 0.0,
            last_shot: 0.0,
            leg_time,
            fire_interval,
        }
    }

    pub fn next(&mut self, position: Vec2, dt: f32) -> InputState {
        self.elapsed += dt;

        let leg = (self.elapsed / self.leg_time) as u32 % 4;
        let fire = self.fire_interval > 0.0 && self.elapsed - self.last_shot >= self.fire_interval;
        if fire {
            self.last_shot = self.elapsed;
        }

        let angle = self.elapsed * TAU / (4.0 * self.leg_time);
        InputState {
            move_up: leg == 0,
            move_right: leg == 1,
            move_down: leg == 2,
            move_left: leg == 3,
            fire,
            aim: position + Vec2::from_angle(angle) * 5.0,
        }
    }
}
