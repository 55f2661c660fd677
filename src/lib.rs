//! A deterministic lockstep simulation client.
//!
//! The [`LockstepClient`](client::LockstepClient) turns a stream of server-confirmed
//! [turns](turn::Turn) into a locally replayable, frame-rate independent simulation. Local
//! commands can be issued optimistically before they are confirmed, and every participant that
//! receives the same turns in the same order replays exactly the same simulation.

pub mod client;
pub mod command;
pub mod driver;
pub mod error;
pub mod events;
pub mod logic;
pub mod random;
pub mod turn;
pub mod turn_buffer;

use error::ConfigError;
use serde::{Deserialize, Serialize};
use turn::{Millis, TurnNumber};

pub use client::{LockstepClient, State};
pub use command::{Command, CommandId, ConfirmedCommand, PendingCommand, PlayerNumber};
pub use error::{CommandFailure, LogicError, LogicResult};
pub use logic::CommandLogic;
pub use turn::Turn;

/// The shape of the simulation, shared by every participant of a game. Usually received from the
/// server before the client is started.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Milliseconds covered by a single turn. A new turn becomes eligible for application every
    /// `command_step_duration` milliseconds.
    pub command_step_duration: Millis,

    /// Milliseconds between two calls of the per-step simulation callback.
    pub simulation_step_duration: Millis,

    /// How many unconfirmed turns the client tolerates before it considers itself disconnected and
    /// starts [waiting](State::Waiting).
    pub max_skipped_empty_turns: TurnNumber,
}

impl Config {
    pub const fn new() -> Self {
        Self {
            command_step_duration: 100,
            simulation_step_duration: 100,
            max_skipped_empty_turns: 0,
        }
    }

    /// Step durations are used as divisors for every turn number calculation, so they must be
    /// strictly positive.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.command_step_duration <= 0 {
            return Err(ConfigError::NonPositiveCommandStep(
                self.command_step_duration,
            ));
        }
        if self.simulation_step_duration <= 0 {
            return Err(ConfigError::NonPositiveSimulationStep(
                self.simulation_step_duration,
            ));
        }
        if self.max_skipped_empty_turns < 0 {
            return Err(ConfigError::NegativeMaxSkippedEmptyTurns(
                self.max_skipped_empty_turns,
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

/// Settings that only concern the local client and may differ between participants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// How far ahead of the last applied command time, in milliseconds, a command issued in
    /// local-authority mode gets scheduled. Must not be negative, so that a local command always
    /// lands in a turn that is still to come.
    pub local_simulation_delay: Millis,

    /// Maximum number of simulation steps performed during a single update. Once exceeded, the
    /// client switches to [recovering](State::Recovering) and continues on the next update. Zero
    /// means unbounded.
    pub max_simulation_steps_per_tick: u32,

    /// Multiplier applied to every elapsed time delta before it is accumulated.
    pub speed_factor: f64,

    /// While disconnected, keep stalling until enough turns have arrived to reach the current time
    /// at a pace close to the command step duration.
    pub recover_gracefully: bool,

    /// Tolerated ratio between the average turn reception duration and the command step duration
    /// for a recovery to be considered graceful.
    pub graceful_turn_reception_duration_factor: f64,

    /// Number of samples kept in the turn reception duration moving window.
    pub turn_reception_duration_window: usize,
}

impl ClientConfig {
    pub const fn new() -> Self {
        Self {
            local_simulation_delay: 1000,
            max_simulation_steps_per_tick: 0,
            speed_factor: 1.0,
            recover_gracefully: true,
            graceful_turn_reception_duration_factor: 1.1,
            turn_reception_duration_window: 10,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.local_simulation_delay < 0 {
            return Err(ConfigError::NegativeLocalSimulationDelay(
                self.local_simulation_delay,
            ));
        }
        if !self.speed_factor.is_finite() || self.speed_factor < 0.0 {
            return Err(ConfigError::InvalidSpeedFactor(self.speed_factor));
        }
        if !self.graceful_turn_reception_duration_factor.is_finite()
            || self.graceful_turn_reception_duration_factor < 0.0
        {
            return Err(ConfigError::InvalidGracefulFactor(
                self.graceful_turn_reception_duration_factor,
            ));
        }
        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-game parameters that every participant must agree on.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameParams {
    /// Seed of the root generator that all [random generators](random::RandomForker::fork) of the
    /// game are derived from.
    pub random_seed: u64,
}
