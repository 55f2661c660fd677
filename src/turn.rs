use crate::command::ConfirmedCommand;
use std::slice::Iter;

/// Time in milliseconds.
pub type Millis = i64;

/// Index of a command step. Confirmed turns are numbered from 1.
pub type TurnNumber = i64;

/// The confirmed commands of a single command step. An empty turn is a valid turn: the server
/// confirmed that nothing happened during that step.
#[derive(Clone, Debug, Default)]
pub struct Turn {
    commands: Vec<ConfirmedCommand>,
}

impl Turn {
    /// A turn without commands. Does not allocate.
    pub const fn empty() -> Self {
        Self {
            commands: Vec::new(),
        }
    }

    pub fn new(commands: Vec<ConfirmedCommand>) -> Self {
        Self { commands }
    }

    pub fn push(&mut self, command: ConfirmedCommand) {
        self.commands.push(command);
    }

    pub fn commands(&self) -> &[ConfirmedCommand] {
        &self.commands
    }

    pub fn iter(&self) -> Iter<'_, ConfirmedCommand> {
        self.commands.iter()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl FromIterator<ConfirmedCommand> for Turn {
    fn from_iter<I: IntoIterator<Item = ConfirmedCommand>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Turn {
    type Item = &'a ConfirmedCommand;
    type IntoIter = Iter<'a, ConfirmedCommand>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.iter()
    }
}
