use crate::{
    command::ConfirmedCommand,
    turn::{Millis, Turn, TurnNumber},
};
use std::collections::{btree_map::Entry, BTreeMap, VecDeque};
use tracing::{debug, trace};

/// Confirmed turns that have not been applied yet, plus the statistics used to judge how healthy
/// the stream of confirmations is.
#[derive(Debug, Default)]
pub struct TurnBuffer {
    /// Only non-empty turns are stored. A confirmed turn number without an entry is an empty
    /// turn.
    confirmed_turns: BTreeMap<TurnNumber, Turn>,

    last_confirmed_turn_number: TurnNumber,

    /// Client time at which the last turn was confirmed. `None` until the first confirmation,
    /// which only establishes the reference point for the reception durations.
    last_confirmed_turn_time: Option<Millis>,

    /// Moving window of the time it took for each turn to arrive.
    reception_durations: VecDeque<Millis>,

    /// Every turn buffer depth observed on confirmation, sorted ascending so the lowest and
    /// highest depths are at either end.
    depth_history: Vec<TurnNumber>,
}

impl TurnBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_confirmed_turn_number(&self) -> TurnNumber {
        self.last_confirmed_turn_number
    }

    pub fn is_confirmed(&self, turn_number: TurnNumber) -> bool {
        turn_number <= self.last_confirmed_turn_number
    }

    /// Number of confirmed turns ahead of the given current turn.
    pub fn depth(&self, current_turn_number: TurnNumber) -> TurnNumber {
        (self.last_confirmed_turn_number - current_turn_number).max(0)
    }

    /// Confirm the next turn. `None` or an empty turn confirms that nothing happened during that
    /// step.
    pub fn confirm_turn(
        &mut self,
        turn: Option<Turn>,
        current_turn_number: TurnNumber,
        now: Millis,
        window: usize,
    ) {
        self.last_confirmed_turn_number += 1;
        let turn_number = self.last_confirmed_turn_number;

        let depth = self.depth(current_turn_number);
        let index = self.depth_history.partition_point(|&other| other < depth);
        self.depth_history.insert(index, depth);

        match turn {
            Some(turn) if !turn.is_empty() => {
                debug!(
                    "Confirmed turn {} with {} commands",
                    turn_number,
                    turn.len()
                );
                self.confirmed_turns.insert(turn_number, turn);
            }
            _ => trace!("Confirmed empty turn {}", turn_number),
        }

        self.record_reception(turn_number, now, window);
    }

    /// Confirm a locally issued command without waiting for anyone else, scheduling it for the
    /// given turn.
    pub fn confirm_local_command(
        &mut self,
        command: ConfirmedCommand,
        turn_number: TurnNumber,
        now: Millis,
        window: usize,
    ) {
        debug!(
            "Self-confirming command {:?} for turn {}",
            command.id(),
            turn_number
        );
        match self.confirmed_turns.entry(turn_number) {
            Entry::Occupied(mut entry) => entry.get_mut().push(command),
            Entry::Vacant(entry) => {
                entry.insert(Turn::new(vec![command]));
                self.record_reception(turn_number, now, window);
                self.last_confirmed_turn_number = self.last_confirmed_turn_number.max(turn_number);
            }
        }
    }

    /// Remove the stored commands of a turn that is about to be applied. Returns `None` for turns
    /// that were confirmed empty or not confirmed at all.
    pub fn take(&mut self, turn_number: TurnNumber) -> Option<Turn> {
        self.confirmed_turns.remove(&turn_number)
    }

    /// Stored turns, in turn order. Intended for diagnostics.
    pub fn buffered_turns(&self) -> impl Iterator<Item = (TurnNumber, &Turn)> {
        self.confirmed_turns
            .iter()
            .map(|(turn_number, turn)| (*turn_number, turn))
    }

    /// Mean of the reception duration window, or zero without samples.
    pub fn turn_reception_duration(&self) -> Millis {
        if self.reception_durations.is_empty() {
            return 0;
        }
        self.reception_durations.iter().sum::<Millis>() / self.reception_durations.len() as Millis
    }

    pub fn lowest_depth(&self) -> Option<TurnNumber> {
        self.depth_history.first().copied()
    }

    pub fn highest_depth(&self) -> Option<TurnNumber> {
        self.depth_history.last().copied()
    }

    pub fn average_depth(&self) -> Option<TurnNumber> {
        if self.depth_history.is_empty() {
            return None;
        }
        Some(self.depth_history.iter().sum::<TurnNumber>() / self.depth_history.len() as TurnNumber)
    }

    /// Drop the oldest reception samples that no longer fit in the window.
    pub fn resize_reception_window(&mut self, window: usize) {
        while self.reception_durations.len() > window {
            self.reception_durations.pop_front();
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn record_reception(&mut self, turn_number: TurnNumber, now: Millis, window: usize) {
        if turn_number < self.last_confirmed_turn_number {
            return;
        }
        if let Some(last_confirmed_turn_time) = self.last_confirmed_turn_time {
            // Spread the elapsed time over every turn that arrived since the last reception.
            let turns_received = turn_number - self.last_confirmed_turn_number + 1;
            let duration = (now - last_confirmed_turn_time) / turns_received;
            trace!("Turn {} arrived after {}ms", turn_number, duration);
            self.reception_durations.push_back(duration);
            self.resize_reception_window(window);
        }
        self.last_confirmed_turn_time = Some(now);
    }
}
