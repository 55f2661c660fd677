//! Collaborators that keep the client ticking.
//!
//! A host either calls [`LockstepClient::update`](crate::LockstepClient::update) itself with the
//! elapsed time, or lets the client register with an [`UpdateScheduler`] and measure the elapsed
//! time with a [`Clock`].

use crate::turn::Millis;
use std::{cell::Cell, rc::Rc, time::Instant};
use tracing::trace;

/// Something that can be advanced by one host frame.
pub trait Updateable {
    /// Advance by however much time has passed since the previous tick.
    fn tick(&mut self);
}

/// Monotonic millisecond time source.
pub trait Clock {
    fn now_millis(&self) -> Millis;
}

/// [`Clock`] backed by [`Instant`], counting from its creation.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_millis(&self) -> Millis {
        Millis::try_from(self.origin.elapsed().as_millis()).unwrap_or(Millis::MAX)
    }
}

/// The facility that periodically ticks registered clients.
pub trait UpdateScheduler {
    /// Start ticking the owner of this handle.
    fn add(&mut self);

    /// Stop ticking the owner of this handle.
    fn remove(&mut self);
}

/// Scheduler that does nothing, for hosts that always call `update` themselves.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoScheduler;

impl UpdateScheduler for NoScheduler {
    fn add(&mut self) {}
    fn remove(&mut self) {}
}

/// Scheduler handle given to a client. Its paired [`FrameDriver`] stays with the host's frame
/// loop.
#[derive(Debug)]
pub struct FrameScheduler {
    registered: Rc<Cell<bool>>,
}

impl FrameScheduler {
    pub fn new() -> (Self, FrameDriver) {
        let registered = Rc::new(Cell::new(false));
        (
            Self {
                registered: Rc::clone(&registered),
            },
            FrameDriver { registered },
        )
    }
}

impl UpdateScheduler for FrameScheduler {
    fn add(&mut self) {
        trace!("Registered for frame updates");
        self.registered.set(true);
    }

    fn remove(&mut self) {
        trace!("Unregistered from frame updates");
        self.registered.set(false);
    }
}

#[derive(Debug, Clone)]
pub struct FrameDriver {
    registered: Rc<Cell<bool>>,
}

impl FrameDriver {
    pub fn is_registered(&self) -> bool {
        self.registered.get()
    }

    /// Tick the target if its scheduler handle is registered. Returns whether it was ticked.
    pub fn drive<U: Updateable>(&self, target: &mut U) -> bool {
        if !self.registered.get() {
            return false;
        }
        target.tick();
        true
    }
}
