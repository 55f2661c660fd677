use crate::{error::LogicResult, logic::ErasedCommandLogic};
use serde::{Deserialize, Serialize};
use std::{
    any::{type_name, Any, TypeId},
    fmt::{self, Debug},
    sync::Arc,
};

/// Slot of a player within a game.
pub type PlayerNumber = u8;

/// Gives access to the concrete type behind a `dyn Command`. Implemented for every type, so
/// command types never need to implement it themselves.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn type_name(&self) -> &'static str;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }
}

/// An application defined, immutable player command. Commands are dispatched to their
/// [logic](crate::logic::CommandLogic) by their exact concrete type.
///
/// ```
/// use lockstep_client::Command;
///
/// #[derive(Debug)]
/// struct Jump {
///     height: u32,
/// }
///
/// impl Command for Jump {}
/// ```
pub trait Command: AsAny + Debug + Send + Sync + 'static {}

impl dyn Command {
    /// The [`TypeId`] of the concrete command type.
    pub fn command_type_id(&self) -> TypeId {
        self.as_any().type_id()
    }

    pub fn is<T: Command>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn downcast_ref<T: Command>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

/// Identity of an issued command. Allocated by the issuing client and echoed back by the server
/// inside the confirmed turn, so that two commands with equal contents are still told apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommandId {
    pub player: PlayerNumber,
    pub sequence: u32,
}

impl CommandId {
    pub const fn new(player: PlayerNumber, sequence: u32) -> Self {
        Self { player, sequence }
    }
}

/// A command as it appears inside a confirmed [turn](crate::turn::Turn).
#[derive(Clone, Debug)]
pub struct ConfirmedCommand {
    id: CommandId,
    command: Arc<dyn Command>,
}

impl ConfirmedCommand {
    pub fn new<T: Command>(id: CommandId, command: T) -> Self {
        Self::from_shared(id, Arc::new(command))
    }

    pub fn from_shared(id: CommandId, command: Arc<dyn Command>) -> Self {
        Self { id, command }
    }

    pub fn id(&self) -> CommandId {
        self.id
    }

    /// The player that issued this command.
    pub fn player(&self) -> PlayerNumber {
        self.id.player
    }

    pub fn command(&self) -> &dyn Command {
        &*self.command
    }

    pub fn shared_command(&self) -> &Arc<dyn Command> {
        &self.command
    }
}

/// A locally issued command that has not been confirmed yet, together with the optional logic
/// that runs once the command is finished.
pub struct PendingCommand {
    id: CommandId,
    command: Arc<dyn Command>,
    finish: Option<Box<dyn ErasedCommandLogic>>,
}

impl PendingCommand {
    pub(crate) fn new(
        id: CommandId,
        command: Arc<dyn Command>,
        finish: Option<Box<dyn ErasedCommandLogic>>,
    ) -> Self {
        Self {
            id,
            command,
            finish,
        }
    }

    pub fn id(&self) -> CommandId {
        self.id
    }

    pub fn player(&self) -> PlayerNumber {
        self.id.player
    }

    pub fn command(&self) -> &dyn Command {
        &*self.command
    }

    /// The confirmed form of this command, as a server would echo it back.
    pub fn to_confirmed(&self) -> ConfirmedCommand {
        ConfirmedCommand::from_shared(self.id, Arc::clone(&self.command))
    }

    /// Consume the pending record, running its completion logic.
    pub(crate) fn finish(mut self) -> LogicResult {
        match self.finish.take() {
            Some(mut logic) => logic.apply(&*self.command, self.id.player),
            None => Ok(()),
        }
    }
}

impl Debug for PendingCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCommand")
            .field("id", &self.id)
            .field("command", &self.command)
            .field("has_finish", &self.finish.is_some())
            .finish()
    }
}
