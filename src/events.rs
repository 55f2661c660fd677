//! Notifications that the [`LockstepClient`](crate::LockstepClient) raises while it runs.
//!
//! Every notification is delivered synchronously, in registration order, from inside the client
//! call that caused it. A notification without listeners is simply not delivered.

use crate::{
    command::{ConfirmedCommand, PendingCommand},
    error::CommandFailure,
    turn::{Millis, Turn},
};
use std::{
    fmt::{self, Debug},
    time::Duration,
};

/// An ordered list of listeners.
pub struct Callbacks<F: ?Sized> {
    listeners: Vec<Box<F>>,
}

impl<F: ?Sized> Callbacks<F> {
    pub fn push(&mut self, listener: Box<F>) {
        self.listeners.push(listener);
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<F>> {
        self.listeners.iter_mut()
    }
}

impl<F: ?Sized> Default for Callbacks<F> {
    fn default() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }
}

impl<F: ?Sized> Debug for Callbacks<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

type CommandAdded = dyn FnMut(&PendingCommand);
type TurnApplied = dyn FnMut(&Turn, Duration);
type Notification = dyn FnMut();
type ConnectionChanged = dyn FnMut(bool);
type Simulate = dyn FnMut(Millis);
type CommandFailed = dyn FnMut(&CommandFailure, &ConfirmedCommand);
type ClientStarts = dyn FnMut(bool);

#[derive(Debug, Default)]
pub struct ClientEvents {
    command_added: Callbacks<CommandAdded>,
    turn_applied: Callbacks<TurnApplied>,
    simulation_started: Callbacks<Notification>,
    simulation_recovered: Callbacks<Notification>,
    connection_changed: Callbacks<ConnectionChanged>,
    simulate: Callbacks<Simulate>,
    command_failed: Callbacks<CommandFailed>,
    client_starts: Callbacks<ClientStarts>,
}

impl ClientEvents {
    /// A locally issued command is pending and needs to be sent to the server. Registering a
    /// listener here takes the client out of local-authority mode.
    pub fn on_command_added(&mut self, listener: impl FnMut(&PendingCommand) + 'static) {
        self.command_added.push(Box::new(listener));
    }

    /// Removes every `command_added` listener, putting the client back into local-authority mode.
    pub fn clear_command_added_listeners(&mut self) {
        self.command_added.clear();
    }

    /// A turn was applied. Receives the wall time spent running command logic.
    pub fn on_turn_applied(&mut self, listener: impl FnMut(&Turn, Duration) + 'static) {
        self.turn_applied.push(Box::new(listener));
    }

    /// The client clock reached zero for the first time since the last start.
    pub fn on_simulation_started(&mut self, listener: impl FnMut() + 'static) {
        self.simulation_started.push(Box::new(listener));
    }

    /// The client advanced while connected for the first time since the last start.
    pub fn on_simulation_recovered(&mut self, listener: impl FnMut() + 'static) {
        self.simulation_recovered.push(Box::new(listener));
    }

    pub fn on_connection_changed(&mut self, listener: impl FnMut(bool) + 'static) {
        self.connection_changed.push(Box::new(listener));
    }

    /// Called once per simulation step with the simulation step duration.
    pub fn on_simulate(&mut self, listener: impl FnMut(Millis) + 'static) {
        self.simulate.push(Box::new(listener));
    }

    pub fn on_command_failed(
        &mut self,
        listener: impl FnMut(&CommandFailure, &ConfirmedCommand) + 'static,
    ) {
        self.command_failed.push(Box::new(listener));
    }

    /// Receives whether the client starts in recovery.
    pub fn on_client_starts(&mut self, listener: impl FnMut(bool) + 'static) {
        self.client_starts.push(Box::new(listener));
    }

    pub fn has_command_added_listeners(&self) -> bool {
        !self.command_added.is_empty()
    }

    pub(crate) fn emit_command_added(&mut self, command: &PendingCommand) {
        for listener in self.command_added.iter_mut() {
            listener(command);
        }
    }

    pub(crate) fn emit_turn_applied(&mut self, turn: &Turn, duration: Duration) {
        for listener in self.turn_applied.iter_mut() {
            listener(turn, duration);
        }
    }

    pub(crate) fn emit_simulation_started(&mut self) {
        for listener in self.simulation_started.iter_mut() {
            listener();
        }
    }

    pub(crate) fn emit_simulation_recovered(&mut self) {
        for listener in self.simulation_recovered.iter_mut() {
            listener();
        }
    }

    pub(crate) fn emit_connection_changed(&mut self, connected: bool) {
        for listener in self.connection_changed.iter_mut() {
            listener(connected);
        }
    }

    pub(crate) fn emit_simulate(&mut self, step_duration: Millis) {
        for listener in self.simulate.iter_mut() {
            listener(step_duration);
        }
    }

    pub(crate) fn emit_command_failed(
        &mut self,
        failure: &CommandFailure,
        command: &ConfirmedCommand,
    ) {
        for listener in self.command_failed.iter_mut() {
            listener(failure, command);
        }
    }

    pub(crate) fn emit_client_starts(&mut self, recovering: bool) {
        for listener in self.client_starts.iter_mut() {
            listener(recovering);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::{cell::RefCell, rc::Rc};
    use test_log::test;

    #[test]
    fn listeners_are_called_in_registration_order() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut events = ClientEvents::default();
        for name in ["first", "second"] {
            let calls = calls.clone();
            events.on_connection_changed(move |connected| {
                calls.borrow_mut().push((name, connected));
            });
        }

        events.emit_connection_changed(false);

        assert_eq!(*calls.borrow(), vec![("first", false), ("second", false)]);
    }

    #[test]
    fn notifications_without_listeners_are_dropped() {
        let mut events = ClientEvents::default();
        events.emit_simulation_started();
        events.emit_simulate(100);
        assert!(!events.has_command_added_listeners());

        events.on_command_added(|_| {});
        assert!(events.has_command_added_listeners());

        events.clear_command_added_listeners();
        assert!(!events.has_command_added_listeners());
    }
}
