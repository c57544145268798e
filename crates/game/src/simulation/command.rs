use glam::Vec2;

use crate::tuning::MAX_COMMANDS;

bitflags::bitflags! {
    /// Action word of a command, sent verbatim as a u32.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ActionFlags: u32 {
        const MOVE_UP = 1 << 0;
        const MOVE_LEFT = 1 << 1;
        const MOVE_DOWN = 1 << 2;
        const MOVE_RIGHT = 1 << 3;
        const SHOOT = 1 << 4;
    }
}

/// One frame of input.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Command {
    pub actions: ActionFlags,
    pub new_orientation: f32,
    pub dt: f32,
    /// World-space point aimed at. Only meaningful with [`ActionFlags::SHOOT`].
    pub shoot_target: Vec2,
}

impl Command {
    pub fn idle(new_orientation: f32, dt: f32) -> Self {
        Self {
            actions: ActionFlags::empty(),
            new_orientation,
            dt,
            shoot_target: Vec2::ZERO,
        }
    }

    pub fn with_actions(mut self, actions: ActionFlags) -> Self {
        self.actions |= actions;
        self
    }

    pub fn shooting_at(mut self, target: Vec2) -> Self {
        self.actions |= ActionFlags::SHOOT;
        self.shoot_target = target;
        self
    }

    #[inline]
    pub fn shoots(&self) -> bool {
        self.actions.contains(ActionFlags::SHOOT)
    }
}

/// Commands buffered since the last flush. Full stacks drop new commands.
#[derive(Debug, Clone, Default)]
pub struct CommandStack {
    commands: Vec<Command>,
}

impl CommandStack {
    pub fn new() -> Self {
        Self {
            commands: Vec::with_capacity(MAX_COMMANDS),
        }
    }

    /// Returns false if the stack was full and the command was dropped.
    pub fn push(&mut self, command: Command) -> bool {
        if self.commands.len() >= MAX_COMMANDS {
            return false;
        }
        self.commands.push(command);
        true
    }

    /// Pushes as many as fit, returning how many were dropped.
    pub fn extend_from_slice(&mut self, commands: &[Command]) -> usize {
        commands.iter().filter(|&&c| !self.push(c)).count()
    }

    pub fn as_slice(&self) -> &[Command] {
        &self.commands
    }

    pub fn drain(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.commands.len() >= MAX_COMMANDS
    }
}
