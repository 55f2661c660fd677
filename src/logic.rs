//! Command logic: what happens when a confirmed command is applied.
//!
//! Logics are registered per concrete command type. A [`CommandLogic<T>`] is wrapped into a
//! type-erased [`ErasedCommandLogic`] that only forwards commands whose runtime type is exactly
//! `T`; there is no matching through wrapper or "parent" types.

use crate::{
    command::{Command, PlayerNumber},
    error::LogicResult,
};
use indexmap::IndexMap;
use std::{
    any::{type_name, TypeId},
    fmt::{self, Debug},
    marker::PhantomData,
};
use tracing::debug;

/// Applies commands of type `T` issued by the given player.
pub trait CommandLogic<T: Command> {
    fn apply(&mut self, command: &T, player: PlayerNumber) -> LogicResult;
}

/// Logic that ignores both the command and the player.
pub struct ActionLogic<F>(pub F);

impl<T: Command, F: FnMut() -> LogicResult> CommandLogic<T> for ActionLogic<F> {
    fn apply(&mut self, _command: &T, _player: PlayerNumber) -> LogicResult {
        (self.0)()
    }
}

/// Logic that only looks at the command.
pub struct CommandFnLogic<F>(pub F);

impl<T: Command, F: FnMut(&T) -> LogicResult> CommandLogic<T> for CommandFnLogic<F> {
    fn apply(&mut self, command: &T, _player: PlayerNumber) -> LogicResult {
        (self.0)(command)
    }
}

/// Logic that looks at the command and the player that issued it.
pub struct PlayerCommandFnLogic<F>(pub F);

impl<T: Command, F: FnMut(&T, PlayerNumber) -> LogicResult> CommandLogic<T>
    for PlayerCommandFnLogic<F>
{
    fn apply(&mut self, command: &T, player: PlayerNumber) -> LogicResult {
        (self.0)(command, player)
    }
}

/// Logic over any command type.
pub trait ErasedCommandLogic {
    fn apply(&mut self, command: &dyn Command, player: PlayerNumber) -> LogicResult;
}

/// Adapts a [`CommandLogic<T>`] into an [`ErasedCommandLogic`]. Commands of other types are
/// ignored.
pub struct TypedLogic<T, L> {
    logic: L,
    _command: PhantomData<fn(&T)>,
}

impl<T: Command, L: CommandLogic<T>> TypedLogic<T, L> {
    pub fn new(logic: L) -> Self {
        Self {
            logic,
            _command: PhantomData,
        }
    }
}

impl<T: Command, L: CommandLogic<T>> ErasedCommandLogic for TypedLogic<T, L> {
    fn apply(&mut self, command: &dyn Command, player: PlayerNumber) -> LogicResult {
        match command.downcast_ref::<T>() {
            Some(command) => self.logic.apply(command, player),
            None => Ok(()),
        }
    }
}

/// Maps command types to the logic applied for them. Registering a second logic for the same
/// type replaces the first one and keeps its registration slot.
#[derive(Default)]
pub struct CommandLogicRegistry {
    logics: IndexMap<TypeId, Box<dyn ErasedCommandLogic>>,
}

impl CommandLogicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T, L>(&mut self, logic: L)
    where
        T: Command,
        L: CommandLogic<T> + 'static,
    {
        debug!("Registering command logic for {}", type_name::<T>());
        self.register_for(TypeId::of::<T>(), Box::new(TypedLogic::<T, L>::new(logic)));
    }

    pub fn register_for(&mut self, command_type: TypeId, logic: Box<dyn ErasedCommandLogic>) {
        if self.logics.insert(command_type, logic).is_some() {
            debug!("Replaced command logic for {:?}", command_type);
        }
    }

    pub fn is_registered<T: Command>(&self) -> bool {
        self.logics.contains_key(&TypeId::of::<T>())
    }

    /// Registered command types, in registration order.
    pub fn command_types(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.logics.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.logics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logics.is_empty()
    }

    pub fn clear(&mut self) {
        self.logics.clear();
    }

    /// Run the logic registered for the command's exact type, if any. Commands without a
    /// registered logic are accepted as a no-op.
    pub fn apply(&mut self, command: &dyn Command, player: PlayerNumber) -> LogicResult {
        match self.logics.get_mut(&command.command_type_id()) {
            Some(logic) => logic.apply(command, player),
            None => Ok(()),
        }
    }
}

impl Debug for CommandLogicRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandLogicRegistry")
            .field("command_types", &self.logics.keys().collect::<Vec<_>>())
            .finish()
    }
}
