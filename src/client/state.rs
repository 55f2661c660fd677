//! The [`LockstepClient`][client] is always in one of three states:
//!
//! # States
//!
//! ## Normal
//!
//! Confirmed turns arrive in time. The clock advances and turns are applied as their command
//! step comes due.
//!
//! ## Waiting
//!
//! The next turn is not confirmed yet and more turns are missing than the configuration
//! tolerates. Nothing is applied until the missing turns arrive. The client counts as
//! disconnected while it waits, and the time spent waiting is [accumulated][disconnect_time].
//!
//! ## Recovering
//!
//! The client is catching up. Either it was started in the middle of a running game, or a single
//! update needed more simulation steps than the configured budget allows and the remaining steps
//! are carried over to the following updates.
//!
//! [client]: crate::client::LockstepClient
//! [disconnect_time]: crate::client::LockstepClient::disconnect_time

/// See the [module-level documentation](self).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Normal,
    #[default]
    Waiting,
    Recovering,
}

impl State {
    pub fn is_connected(self) -> bool {
        self != State::Waiting
    }

    pub fn is_recovering(self) -> bool {
        self == State::Recovering
    }
}
