// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Boolean command the application can assert toward the cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    /// Supply conveyor running.
    AdvanceConveyor1,
    /// Evacuation conveyor running.
    AdvanceConveyor2,
    /// Camera object recognition.
    Recognize,
    MoveRight,
    MoveLeft,
    Grip,
    Release,
    RunOp1,
    RunOp2,
    RunOp3,
    /// Assembly verification.
    Verify,
}

impl Command {
    pub const COUNT: usize = 11;

    pub const ALL: [Command; Command::COUNT] = [
        Command::AdvanceConveyor1,
        Command::AdvanceConveyor2,
        Command::Recognize,
        Command::MoveRight,
        Command::MoveLeft,
        Command::Grip,
        Command::Release,
        Command::RunOp1,
        Command::RunOp2,
        Command::RunOp3,
        Command::Verify,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Plant output this command drives.
    pub fn output(self) -> Output {
        Output::Command(self)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.output().wire_name())
    }
}

/// Named output written to the plant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Output {
    Command(Command),
    /// Drop an object of the given type on the supply conveyor.
    AddObject,
}

impl Output {
    /// Signal name on the plant side.
    pub fn wire_name(self) -> &'static str {
        match self {
            Output::Command(cmd) => match cmd {
                Command::AdvanceConveyor1 => "appro_conveyor_command",
                Command::AdvanceConveyor2 => "evac_conveyor_command",
                Command::Recognize => "reccam",
                Command::MoveRight => "go_right",
                Command::MoveLeft => "go_left",
                Command::Grip => "take",
                Command::Release => "put_down",
                Command::RunOp1 => "OP1",
                Command::RunOp2 => "OP2",
                Command::RunOp3 => "OP3",
                Command::Verify => "verif",
            },
            Output::AddObject => "add_object",
        }
    }
}

/// Set of commands the application wants asserted.
///
/// A plain value: the engine keeps the canonical copy behind a lock and
/// takes a whole copy per cycle, so a cycle never publishes a partial
/// update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandState {
    asserted: [bool; Command::COUNT],
}

impl CommandState {
    /// Everything released.
    pub fn new() -> Self {
        Self::default()
    }

    /// Both conveyors running, everything else released. This is the state
    /// the cell controller powers up with.
    pub fn with_conveyors_running() -> Self {
        let mut state = Self::new();
        state.set(Command::AdvanceConveyor1, true);
        state.set(Command::AdvanceConveyor2, true);
        state
    }

    pub fn set(&mut self, cmd: Command, on: bool) {
        self.asserted[cmd.index()] = on;
    }

    pub fn get(&self, cmd: Command) -> bool {
        self.asserted[cmd.index()]
    }

    /// Commands with their level, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (Command, bool)> + '_ {
        Command::ALL.iter().map(move |cmd| (*cmd, self.get(*cmd)))
    }

    /// Asserted commands only.
    pub fn asserted(&self) -> Vec<Command> {
        self.iter().filter(|(_, on)| *on).map(|(cmd, _)| cmd).collect()
    }
}

impl Serialize for CommandState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Command::COUNT))?;
        for (cmd, on) in self.iter() {
            map.serialize_entry(cmd.output().wire_name(), &on)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get_are_independent() {
        let mut state = CommandState::new();
        state.set(Command::Grip, true);
        assert!(state.get(Command::Grip));
        assert!(!state.get(Command::Release));
        state.set(Command::Grip, false);
        assert!(state.asserted().is_empty());
    }

    #[test]
    fn test_power_up_state() {
        let state = CommandState::with_conveyors_running();
        assert_eq!(
            state.asserted(),
            vec![Command::AdvanceConveyor1, Command::AdvanceConveyor2]
        );
    }

    #[test]
    fn test_all_is_in_index_order() {
        for (idx, cmd) in Command::ALL.iter().enumerate() {
            assert_eq!(cmd.index(), idx);
        }
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(Command::Grip.output().wire_name(), "take");
        assert_eq!(Command::Verify.to_string(), "verif");
        assert_eq!(Output::AddObject.wire_name(), "add_object");
    }
}
