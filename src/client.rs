use crate::{
    command::{Command, CommandId, PendingCommand, PlayerNumber},
    driver::{Clock, MonotonicClock, NoScheduler, UpdateScheduler, Updateable},
    error::{CommandFailure, ConfigError, LogicResult},
    events::ClientEvents,
    logic::{
        ActionLogic, CommandFnLogic, CommandLogic, CommandLogicRegistry, ErasedCommandLogic,
        PlayerCommandFnLogic, TypedLogic,
    },
    random::RandomForker,
    turn::{Millis, Turn, TurnNumber},
    turn_buffer::TurnBuffer,
    ClientConfig, Config, GameParams,
};
use rand_chacha::ChaCha8Rng;
use std::{
    any::TypeId,
    fmt::{self, Debug},
    sync::Arc,
    time::Instant,
};
use tracing::{debug, info, trace, warn};

pub mod state;
pub use state::State;

/// Replays server-confirmed turns as a deterministic, frame-rate independent simulation.
///
/// The client keeps two cursors behind its accumulated clock: the command time, which advances
/// one confirmed turn at a time, and the simulation time, which advances one simulation step at a
/// time. A simulation step never overtakes a command step that has not been applied yet, so every
/// participant sees the same commands at the same simulation step.
pub struct LockstepClient {
    config: Config,
    client_config: ClientConfig,
    game_params: GameParams,
    player_number: PlayerNumber,

    running: bool,
    state: State,

    /// Accumulated, speed-scaled client time.
    time: Millis,
    last_sim_time: Millis,
    last_cmd_time: Millis,

    /// Clock reading at the previous [`update_elapsed`](Self::update_elapsed).
    timestamp: Millis,

    simulation_started_called: bool,
    simulation_recovered_called: bool,

    disconnects: u32,
    disconnect_time: Millis,

    external_update: bool,

    /// Never rewound, so ids stay unique across sessions.
    next_command_sequence: u32,
    /// First sequence issued since the last [`start`](Self::start).
    session_first_sequence: u32,

    turn_buffer: TurnBuffer,
    pending_commands: Vec<PendingCommand>,
    command_logics: CommandLogicRegistry,
    random: RandomForker,
    events: ClientEvents,

    scheduler: Box<dyn UpdateScheduler>,
    clock: Box<dyn Clock>,
}

impl LockstepClient {
    /// A stopped client with the default configuration.
    pub fn new() -> Self {
        Self {
            config: Config::new(),
            client_config: ClientConfig::new(),
            game_params: GameParams::default(),
            player_number: 0,
            running: false,
            state: State::Waiting,
            time: 0,
            last_sim_time: 0,
            last_cmd_time: 0,
            timestamp: 0,
            simulation_started_called: false,
            simulation_recovered_called: false,
            disconnects: 0,
            disconnect_time: 0,
            external_update: false,
            next_command_sequence: 0,
            session_first_sequence: 0,
            turn_buffer: TurnBuffer::new(),
            pending_commands: Vec::new(),
            command_logics: CommandLogicRegistry::new(),
            random: RandomForker::new(0),
            events: ClientEvents::default(),
            scheduler: Box::new(NoScheduler),
            clock: Box::new(MonotonicClock::new()),
        }
    }

    pub fn with_config(config: Config, client_config: ClientConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        client_config.validate()?;
        let mut client = Self::new();
        client.config = config;
        client.client_config = client_config;
        Ok(client)
    }

    pub fn with_player_number(mut self, player_number: PlayerNumber) -> Self {
        self.player_number = player_number;
        self
    }

    pub fn with_game_params(mut self, game_params: GameParams) -> Self {
        self.set_game_params(game_params);
        self
    }

    /// Use the given scheduler to get ticked while running. Without one the host has to call
    /// [`update`](Self::update) or [`update_elapsed`](Self::update_elapsed) itself.
    pub fn with_scheduler(mut self, scheduler: impl UpdateScheduler + 'static) -> Self {
        self.scheduler = Box::new(scheduler);
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Start replaying from `start_time`. A negative start time delays the simulation; a positive
    /// one starts the client in [recovery](State::Recovering), catching up from time zero.
    pub fn start(&mut self, start_time: Millis) {
        info!("Starting lockstep client at {}ms", start_time);
        self.running = true;
        self.time = start_time;
        self.simulation_recovered_called = false;
        self.session_first_sequence = self.next_command_sequence;
        self.state = if start_time > 0 {
            State::Recovering
        } else {
            State::Normal
        };
        self.events.emit_client_starts(self.state.is_recovering());
        self.timestamp = self.clock.now_millis();
        if !self.external_update {
            self.scheduler.add();
        }
    }

    /// Stop the client and forget every turn, pending command, command logic and statistic.
    /// Configuration and listeners are kept.
    pub fn stop(&mut self) {
        if self.running {
            info!("Stopping lockstep client at {}ms", self.time);
        }
        self.running = false;
        self.state = State::Waiting;
        self.time = 0;
        self.last_sim_time = 0;
        self.last_cmd_time = 0;
        self.simulation_started_called = false;
        self.simulation_recovered_called = false;
        self.disconnects = 0;
        self.disconnect_time = 0;
        self.turn_buffer.clear();
        self.pending_commands.clear();
        self.command_logics.clear();
        self.random.reset();
        self.scheduler.remove();
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Swap the simulation configuration, keeping the current turn number. A rejected
    /// configuration leaves the client untouched.
    pub fn set_config(&mut self, config: Config) -> Result<(), ConfigError> {
        config.validate()?;
        let current_turn_number = self.current_turn_number();
        self.last_cmd_time = current_turn_number * config.command_step_duration;
        self.last_sim_time = (self.last_sim_time / config.simulation_step_duration)
            * config.simulation_step_duration;
        debug!("Applied {:?}", config);
        self.config = config;
        Ok(())
    }

    pub fn client_config(&self) -> &ClientConfig {
        &self.client_config
    }

    pub fn set_client_config(&mut self, client_config: ClientConfig) -> Result<(), ConfigError> {
        client_config.validate()?;
        self.turn_buffer
            .resize_reception_window(client_config.turn_reception_duration_window);
        debug!("Applied {:?}", client_config);
        self.client_config = client_config;
        Ok(())
    }

    pub fn game_params(&self) -> &GameParams {
        &self.game_params
    }

    pub fn set_game_params(&mut self, game_params: GameParams) {
        self.random.reseed(game_params.random_seed);
        self.game_params = game_params;
    }

    pub fn player_number(&self) -> PlayerNumber {
        self.player_number
    }

    pub fn set_player_number(&mut self, player_number: PlayerNumber) {
        self.player_number = player_number;
    }

    pub fn events(&self) -> &ClientEvents {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut ClientEvents {
        &mut self.events
    }

    /// Derive a generator from the game's root generator. Participants that derive generators in
    /// the same order get identical generators.
    pub fn create_random_generator(&mut self) -> ChaCha8Rng {
        self.random.fork()
    }

    pub fn register_command_logic<T: Command>(&mut self, logic: impl CommandLogic<T> + 'static) {
        self.command_logics.register::<T, _>(logic);
    }

    pub fn register_command_action<T: Command>(
        &mut self,
        action: impl FnMut() -> LogicResult + 'static,
    ) {
        self.command_logics.register::<T, _>(ActionLogic(action));
    }

    pub fn register_command_fn<T: Command>(
        &mut self,
        logic: impl FnMut(&T) -> LogicResult + 'static,
    ) {
        self.command_logics.register::<T, _>(CommandFnLogic(logic));
    }

    pub fn register_command_fn_with_player<T: Command>(
        &mut self,
        logic: impl FnMut(&T, PlayerNumber) -> LogicResult + 'static,
    ) {
        self.command_logics
            .register::<T, _>(PlayerCommandFnLogic(logic));
    }

    /// Register an already type-erased logic for the given command type.
    pub fn register_command_logic_for(
        &mut self,
        command_type: TypeId,
        logic: Box<dyn ErasedCommandLogic>,
    ) {
        self.command_logics.register_for(command_type, logic);
    }

    /// Whether added commands confirm themselves instead of waiting for a server. This is the
    /// case as long as nobody listens for added commands.
    pub fn is_local_authority(&self) -> bool {
        !self.events.has_command_added_listeners()
    }

    pub fn add_pending_command<T: Command>(&mut self, command: T) -> Option<CommandId> {
        self.push_pending_command(Arc::new(command), None)
    }

    /// Issue a command whose `logic` runs once the command has been applied, or immediately if
    /// the client can not accept commands. Returns `None` in the latter case.
    pub fn add_pending_command_with<T, L>(&mut self, command: T, logic: L) -> Option<CommandId>
    where
        T: Command,
        L: CommandLogic<T> + 'static,
    {
        self.push_pending_command(
            Arc::new(command),
            Some(Box::new(TypedLogic::<T, L>::new(logic))),
        )
    }

    pub fn add_pending_command_then<T: Command>(
        &mut self,
        command: T,
        finish: impl FnMut() -> LogicResult + 'static,
    ) -> Option<CommandId> {
        self.add_pending_command_with(command, ActionLogic(finish))
    }

    pub fn add_pending_command_with_fn<T: Command>(
        &mut self,
        command: T,
        finish: impl FnMut(&T) -> LogicResult + 'static,
    ) -> Option<CommandId> {
        self.add_pending_command_with(command, CommandFnLogic(finish))
    }

    pub fn add_pending_command_with_player_fn<T: Command>(
        &mut self,
        command: T,
        finish: impl FnMut(&T, PlayerNumber) -> LogicResult + 'static,
    ) -> Option<CommandId> {
        self.add_pending_command_with(command, PlayerCommandFnLogic(finish))
    }

    fn push_pending_command(
        &mut self,
        command: Arc<dyn Command>,
        finish: Option<Box<dyn ErasedCommandLogic>>,
    ) -> Option<CommandId> {
        let id = CommandId::new(self.player_number, self.next_command_sequence);
        self.next_command_sequence = self.next_command_sequence.wrapping_add(1);
        let pending = PendingCommand::new(id, command, finish);

        if !self.running || self.time < 0 {
            warn!(
                "Client is not simulating yet, finishing {:?} without applying it",
                pending
            );
            let confirmed = pending.to_confirmed();
            if let Err(cause) = pending.finish() {
                let failure = CommandFailure::new(confirmed.command().type_name(), cause);
                self.events.emit_command_failed(&failure, &confirmed);
            }
            return None;
        }

        if self.is_local_authority() {
            let turn_number = 1 + (self.last_cmd_time + self.client_config.local_simulation_delay)
                / self.config.command_step_duration;
            self.turn_buffer.confirm_local_command(
                pending.to_confirmed(),
                turn_number,
                self.time,
                self.client_config.turn_reception_duration_window,
            );
        } else {
            trace!("Sending {:?}", pending);
            self.events.emit_command_added(&pending);
        }
        self.pending_commands.push(pending);
        Some(id)
    }

    /// Deliver the next confirmed turn. `None` confirms that nothing happened in that turn.
    pub fn add_confirmed_turn(&mut self, turn: Option<Turn>) {
        let current_turn_number = self.current_turn_number();
        self.turn_buffer.confirm_turn(
            turn,
            current_turn_number,
            self.time,
            self.client_config.turn_reception_duration_window,
        );
    }

    pub fn add_confirmed_empty_turns(&mut self, count: usize) {
        debug!("Confirming {} empty turns", count);
        for _ in 0..count {
            self.add_confirmed_turn(None);
        }
    }

    /// Advance the client by `dt` milliseconds of host time. Negative deltas and updates while
    /// stopped are ignored.
    pub fn update(&mut self, dt: Millis) {
        if !self.running || dt < 0 {
            return;
        }

        let dt = (dt as f64 * self.client_config.speed_factor).round() as Millis;
        self.time += dt;

        if !self.simulation_started_called && self.time >= 0 {
            self.simulation_started_called = true;
            info!("Simulation started");
            self.events.emit_simulation_started();
        }

        if self.client_config.recover_gracefully
            && !self.state.is_connected()
            && !self.will_recover_gracefully()
        {
            trace!(
                "Stalling at {}ms until turn {} arrives at a steady pace",
                self.time,
                self.time / self.config.command_step_duration
            );
            return;
        }

        let was_connected = self.state.is_connected();
        self.state = State::Normal;

        if !self.simulation_recovered_called && self.time >= 0 {
            self.simulation_recovered_called = true;
            info!("Simulation recovered");
            self.events.emit_simulation_recovered();
        }

        let mut simulation_steps = 0;
        loop {
            let next_sim_time = self.last_sim_time + self.config.simulation_step_duration;
            let next_cmd_time = self.last_cmd_time + self.config.command_step_duration;

            if next_sim_time <= next_cmd_time && next_sim_time <= self.time {
                trace!("Simulating step ending at {}ms", next_sim_time);
                self.events
                    .emit_simulate(self.config.simulation_step_duration);
                self.last_sim_time = next_sim_time;
                simulation_steps += 1;

                let max_steps = self.client_config.max_simulation_steps_per_tick;
                if max_steps > 0 && simulation_steps > max_steps {
                    warn!(
                        "Exceeded {} simulation steps in a single update, recovering",
                        max_steps
                    );
                    self.state = State::Recovering;
                    break;
                }
            } else if next_cmd_time <= self.time {
                if !self.advance_command_step(next_cmd_time) {
                    break;
                }
            } else {
                break;
            }
        }

        if self.state == State::Waiting {
            self.disconnect_time += dt;
        }

        let connected = self.state.is_connected();
        if connected != was_connected {
            if connected {
                info!("Reconnected after {} disconnects", self.disconnects);
            } else {
                self.disconnects += 1;
                warn!(
                    "Disconnected at turn {}, last confirmed turn is {}",
                    self.current_turn_number(),
                    self.turn_buffer.last_confirmed_turn_number()
                );
            }
            self.events.emit_connection_changed(connected);
        }
    }

    /// [`update`](Self::update) with the time elapsed on the client's [`Clock`] since the
    /// previous call, or since [`start`](Self::start).
    pub fn update_elapsed(&mut self) {
        let now = self.clock.now_millis();
        let dt = now - self.timestamp;
        self.timestamp = now;
        self.update(dt);
    }

    /// Tick through the scheduler, or only when the host calls [`update`](Self::update) itself.
    pub fn set_external_update(&mut self, external_update: bool) {
        if self.external_update == external_update {
            return;
        }
        self.external_update = external_update;
        if external_update {
            self.scheduler.remove();
        } else if self.running {
            self.scheduler.add();
        }
    }

    pub fn is_external_update(&self) -> bool {
        self.external_update
    }

    /// Apply the turn following the current one. Returns whether the command time may keep
    /// advancing during this update.
    fn advance_command_step(&mut self, next_cmd_time: Millis) -> bool {
        let turn_number = self.current_turn_number() + 1;

        if self.turn_buffer.is_confirmed(turn_number) {
            self.state = State::Normal;
            let turn = self.turn_buffer.take(turn_number).unwrap_or_default();
            if !self.process_turn(turn_number, &turn) {
                return false;
            }
        } else if self.is_local_authority() {
            self.process_turn(turn_number, &Turn::empty());
        } else {
            let due_turn_number = self.time / self.config.command_step_duration;
            let missing_turns = due_turn_number - self.turn_buffer.last_confirmed_turn_number();
            if missing_turns > self.config.max_skipped_empty_turns {
                if self.state != State::Waiting {
                    warn!(
                        "Turn {} is missing, {} turns behind",
                        turn_number, missing_turns
                    );
                }
                self.state = State::Waiting;
            } else {
                trace!("Turn {} not confirmed yet", turn_number);
            }
            return false;
        }

        if self.state == State::Normal {
            self.last_cmd_time = next_cmd_time;
        }
        true
    }

    /// Run every command of the turn through its logic. Returns whether no logic failed.
    fn process_turn(&mut self, turn_number: TurnNumber, turn: &Turn) -> bool {
        let started = Instant::now();
        let mut failures = 0;

        for confirmed in turn {
            let pending = self
                .pending_commands
                .iter()
                .position(|pending| pending.id() == confirmed.id())
                .map(|index| self.pending_commands.remove(index));

            let command: &dyn Command = match &pending {
                Some(pending) => pending.command(),
                None if !self.issued_this_session(confirmed.id()) => confirmed.command(),
                None => {
                    trace!("Skipping {:?}, it is no longer pending", confirmed.id());
                    continue;
                }
            };

            if let Err(cause) = self.command_logics.apply(command, confirmed.player()) {
                failures += 1;
                let failure = CommandFailure::new(command.type_name(), cause);
                warn!("Turn {}: {}", turn_number, failure);
                self.events.emit_command_failed(&failure, confirmed);
            }

            if let Some(pending) = pending {
                if let Err(cause) = pending.finish() {
                    let failure = CommandFailure::new(confirmed.command().type_name(), cause);
                    warn!("Turn {}: completion of {}", turn_number, failure);
                    self.events.emit_command_failed(&failure, confirmed);
                }
            }
        }

        let elapsed = started.elapsed();
        trace!(
            "Applied turn {} with {} commands in {:?}",
            turn_number,
            turn.len(),
            elapsed
        );
        self.events.emit_turn_applied(turn, elapsed);
        failures == 0
    }

    /// Commands issued by other players or during an earlier session are replayed even though they
    /// are not pending here.
    fn issued_this_session(&self, id: CommandId) -> bool {
        id.player == self.player_number && id.sequence >= self.session_first_sequence
    }

    /// Whether enough turns have arrived, at a pace close enough to the command step duration,
    /// for the client to catch up with its clock without stalling again.
    pub fn will_recover_gracefully(&self) -> bool {
        let confirmed_time =
            self.turn_buffer.last_confirmed_turn_number() * self.config.command_step_duration;
        if confirmed_time < self.time {
            return false;
        }
        let factor = self.turn_buffer.turn_reception_duration() as f64
            / self.config.command_step_duration as f64;
        factor <= self.client_config.graceful_turn_reception_duration_factor
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    pub fn is_recovering(&self) -> bool {
        self.state.is_recovering()
    }

    /// The accumulated client time.
    pub fn update_time(&self) -> Millis {
        self.time
    }

    /// Time since the last simulation step.
    pub fn simulation_delta_time(&self) -> Millis {
        self.time - self.last_sim_time
    }

    /// Time since the last applied turn.
    pub fn command_delta_time(&self) -> Millis {
        self.time - self.last_cmd_time
    }

    /// Number of the last applied turn.
    pub fn current_turn_number(&self) -> TurnNumber {
        self.last_cmd_time / self.config.command_step_duration
    }

    pub fn current_simulation_step(&self) -> Millis {
        self.time / self.config.simulation_step_duration
    }

    pub fn last_confirmed_turn_number(&self) -> TurnNumber {
        self.turn_buffer.last_confirmed_turn_number()
    }

    pub fn pending_command_count(&self) -> usize {
        self.pending_commands.len()
    }

    /// Confirmed turns ahead of the current turn.
    pub fn turn_buffer(&self) -> TurnNumber {
        self.turn_buffer.depth(self.current_turn_number())
    }

    /// Lowest turn buffer seen on confirmation, or -1 before the first confirmation.
    pub fn lowest_turn_buffer(&self) -> TurnNumber {
        self.turn_buffer.lowest_depth().unwrap_or(-1)
    }

    pub fn highest_turn_buffer(&self) -> TurnNumber {
        self.turn_buffer.highest_depth().unwrap_or(-1)
    }

    pub fn average_turn_buffer(&self) -> TurnNumber {
        self.turn_buffer.average_depth().unwrap_or(-1)
    }

    /// Average time between two confirmed turns over the recent window.
    pub fn turn_reception_duration(&self) -> Millis {
        self.turn_buffer.turn_reception_duration()
    }

    pub fn disconnects(&self) -> u32 {
        self.disconnects
    }

    /// Time spent [waiting](State::Waiting) since the client was started.
    pub fn disconnect_time(&self) -> Millis {
        self.disconnect_time
    }
}

impl Default for LockstepClient {
    fn default() -> Self {
        Self::new()
    }
}

impl Updateable for LockstepClient {
    fn tick(&mut self) {
        self.update_elapsed();
    }
}

impl Drop for LockstepClient {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Debug for LockstepClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockstepClient")
            .field("player_number", &self.player_number)
            .field("running", &self.running)
            .field("state", &self.state)
            .field("time", &self.time)
            .field("current_turn_number", &self.current_turn_number())
            .field(
                "last_confirmed_turn_number",
                &self.turn_buffer.last_confirmed_turn_number(),
            )
            .field("pending_commands", &self.pending_commands.len())
            .field("command_logics", &self.command_logics)
            .finish()
    }
}
