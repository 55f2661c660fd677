use crate::turn::{Millis, TurnNumber};
use std::{backtrace::Backtrace, error::Error};
use thiserror::Error;

/// Error returned by a [command logic](crate::logic::CommandLogic) that could not apply a
/// command.
pub type LogicError = Box<dyn Error + Send + Sync>;

pub type LogicResult = Result<(), LogicError>;

/// Rejected configuration values. A configuration that fails validation is never applied.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("command step duration must be positive, got {0}ms")]
    NonPositiveCommandStep(Millis),

    #[error("simulation step duration must be positive, got {0}ms")]
    NonPositiveSimulationStep(Millis),

    #[error("max skipped empty turns must not be negative, got {0}")]
    NegativeMaxSkippedEmptyTurns(TurnNumber),

    #[error("speed factor must be finite and non-negative, got {0}")]
    InvalidSpeedFactor(f64),

    #[error("graceful turn reception duration factor must be finite and non-negative, got {0}")]
    InvalidGracefulFactor(f64),

    #[error("local simulation delay must not be negative, got {0}ms")]
    NegativeLocalSimulationDelay(Millis),
}

/// A command logic failed while a confirmed command was being applied. Reported through the
/// `command_failed` notification; the failure never unwinds past the client's update.
#[derive(Debug, Error)]
#[error("{command_type} failed: {message}")]
pub struct CommandFailure {
    message: String,
    command_type: &'static str,
    cause: LogicError,
    stack_trace: String,
}

impl CommandFailure {
    pub fn new(command_type: &'static str, cause: LogicError) -> Self {
        Self {
            message: cause.to_string(),
            command_type,
            cause,
            stack_trace: Backtrace::capture().to_string(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Type name of the command whose logic failed.
    pub fn command_type(&self) -> &'static str {
        self.command_type
    }

    /// The error returned by the failing command logic.
    pub fn cause(&self) -> &(dyn Error + Send + Sync + 'static) {
        self.cause.as_ref()
    }

    /// Rendered backtrace captured where the failure was detected. Reads `disabled backtrace`
    /// unless backtraces are enabled through `RUST_BACKTRACE` or `RUST_LIB_BACKTRACE`.
    pub fn stack_trace(&self) -> &str {
        &self.stack_trace
    }
}
