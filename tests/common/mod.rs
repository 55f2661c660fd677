#![allow(dead_code)]

use lockstep_client::{
    driver::Clock,
    turn::{Millis, TurnNumber},
    ClientConfig, Command, Config, ConfirmedCommand, GameParams, LockstepClient, LogicResult,
    PlayerNumber, Turn,
};
use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    rc::Rc,
};
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct MockCommand(pub i32);

impl Command for MockCommand {}

/// A tiny simulation: commands change the velocity, every simulation step moves the position.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MockWorld {
    pub dx: i64,
    pub x: i64,
    pub steps: usize,
    pub command_history: Vec<(PlayerNumber, i32)>,
}

impl MockWorld {
    pub fn apply_command(&mut self, command: &MockCommand, player: PlayerNumber) {
        self.dx += command.0 as i64;
        self.command_history.push((player, command.0));
    }

    pub fn step(&mut self) {
        self.x += self.dx;
        self.steps += 1;
    }
}

/// Hooks a [`MockWorld`] up to the client's command logic and simulation step notification.
/// Needs to be called again after the client was stopped, since stopping forgets the logics.
pub fn attach_world(client: &mut LockstepClient, world: &Rc<RefCell<MockWorld>>) {
    client.register_command_fn_with_player::<MockCommand>({
        let world = Rc::clone(world);
        move |command, player| -> LogicResult {
            world.borrow_mut().apply_command(command, player);
            Ok(())
        }
    });
}

pub fn attach_simulation(client: &mut LockstepClient, world: &Rc<RefCell<MockWorld>>) {
    let world = Rc::clone(world);
    client.events_mut().on_simulate(move |_| world.borrow_mut().step());
}

/// Counts how often a notification fired.
#[derive(Debug, Default, Clone)]
pub struct Counter(Rc<Cell<usize>>);

impl Counter {
    pub fn hit(&self) {
        self.0.set(self.0.get() + 1);
    }

    pub fn get(&self) -> usize {
        self.0.get()
    }

    pub fn reset(&self) {
        self.0.set(0);
    }
}

/// A [`Clock`] that only moves when told to.
#[derive(Debug, Default, Clone)]
pub struct ManualClock(Rc<Cell<Millis>>);

impl ManualClock {
    pub fn advance(&self, dt: Millis) {
        self.0.set(self.0.get() + dt);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> Millis {
        self.0.get()
    }
}

/// Messages sent during one update only become receivable after the receiving end ticks.
#[derive(Debug)]
pub struct DelayedQueue<T> {
    incoming: VecDeque<T>,
    outgoing: VecDeque<T>,
}

impl<T> DelayedQueue<T> {
    pub fn new() -> Self {
        Self {
            incoming: VecDeque::new(),
            outgoing: VecDeque::new(),
        }
    }

    pub fn tick(&mut self) {
        self.outgoing.append(&mut self.incoming);
    }

    pub fn send(&mut self, message: T) {
        self.incoming.push_back(message);
    }

    pub fn recv(&mut self) -> Option<T> {
        self.outgoing.pop_front()
    }
}

impl<T> Default for DelayedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct MockChannel<T> {
    pub inbox: Rc<RefCell<DelayedQueue<T>>>,
    pub outbox: Rc<RefCell<DelayedQueue<T>>>,
}

impl<T> MockChannel<T> {
    pub fn new_pair() -> (MockChannel<T>, MockChannel<T>) {
        let channel_1 = MockChannel {
            inbox: Rc::new(RefCell::new(DelayedQueue::new())),
            outbox: Rc::new(RefCell::new(DelayedQueue::new())),
        };
        let channel_2 = MockChannel {
            inbox: channel_1.outbox.clone(),
            outbox: channel_1.inbox.clone(),
        };
        (channel_1, channel_2)
    }

    pub fn send(&mut self, message: T) {
        self.outbox.borrow_mut().send(message);
    }

    pub fn recv(&mut self) -> Option<T> {
        self.inbox.borrow_mut().recv()
    }

    pub fn tick(&mut self) {
        self.inbox.borrow_mut().tick();
    }
}

/// The client side of a connection to the [`MockServer`].
pub struct MockPeer {
    pub client: LockstepClient,
    pub world: Rc<RefCell<MockWorld>>,
    pub turns: MockChannel<Option<Turn>>,

    /// While disconnected, turns pile up on the way to the client.
    pub is_connected: bool,
}

impl MockPeer {
    pub fn receive_turns(&mut self) {
        if !self.is_connected {
            return;
        }
        self.turns.tick();
        while let Some(turn) = self.turns.recv() {
            self.client.add_confirmed_turn(turn);
        }
    }
}

pub struct MockServerConnection {
    pub commands: MockChannel<ConfirmedCommand>,
    pub turns: MockChannel<Option<Turn>>,
}

/// Gathers the commands of every client and confirms them in turns, `turn_lead` turns ahead of
/// its own clock.
pub struct MockServer {
    pub config: Config,
    pub turn_lead: TurnNumber,
    pub time: Millis,
    pub last_turn_number: TurnNumber,
    pub collected_commands: Vec<ConfirmedCommand>,
    pub connections: Vec<MockServerConnection>,
}

impl MockServer {
    pub fn update(&mut self, dt: Millis) {
        self.time += dt;

        for connection in &mut self.connections {
            connection.commands.tick();
            while let Some(command) = connection.commands.recv() {
                self.collected_commands.push(command);
            }
        }

        while (self.last_turn_number + 1 - self.turn_lead) * self.config.command_step_duration
            <= self.time
        {
            self.last_turn_number += 1;
            let turn = if self.collected_commands.is_empty() {
                None
            } else {
                Some(Turn::new(std::mem::take(&mut self.collected_commands)))
            };
            for connection in &mut self.connections {
                connection.turns.send(turn.clone());
            }
        }
    }
}

pub struct MockClientServer {
    pub server: MockServer,
    pub peers: Vec<MockPeer>,
}

impl MockClientServer {
    /// One server and a client per player number, every client already started at time zero.
    pub fn new(
        config: Config,
        client_config: ClientConfig,
        game_params: GameParams,
        player_numbers: &[PlayerNumber],
        turn_lead: TurnNumber,
    ) -> Self {
        let mut server = MockServer {
            config: config.clone(),
            turn_lead,
            time: 0,
            last_turn_number: 0,
            collected_commands: Vec::new(),
            connections: Vec::new(),
        };

        let peers = player_numbers
            .iter()
            .map(|&player_number| {
                let (client_commands, server_commands) = MockChannel::new_pair();
                let (client_turns, server_turns) = MockChannel::new_pair();
                server.connections.push(MockServerConnection {
                    commands: server_commands,
                    turns: server_turns,
                });

                let mut client = LockstepClient::with_config(config.clone(), client_config.clone())
                    .unwrap()
                    .with_player_number(player_number)
                    .with_game_params(game_params.clone());

                let outbox = client_commands.outbox.clone();
                client.events_mut().on_command_added(move |pending| {
                    outbox.borrow_mut().send(pending.to_confirmed())
                });

                let world = Rc::new(RefCell::new(MockWorld::default()));
                attach_world(&mut client, &world);
                attach_simulation(&mut client, &world);
                client.start(0);

                MockPeer {
                    client,
                    world,
                    turns: client_turns,
                    is_connected: true,
                }
            })
            .collect();

        // Confirm the lead turns before anyone starts ticking.
        server.update(0);

        Self { server, peers }
    }

    pub fn update(&mut self, dt: Millis) {
        info!("");
        info!("------------ Update by {}ms --------------------------", dt);
        for peer in &mut self.peers {
            peer.receive_turns();
        }
        self.server.update(dt);
        for peer in &mut self.peers {
            peer.client.update(dt);
        }
    }

    pub fn peer(&mut self, index: usize) -> &mut MockPeer {
        &mut self.peers[index]
    }

    pub fn world(&self, index: usize) -> MockWorld {
        self.peers[index].world.borrow().clone()
    }
}
