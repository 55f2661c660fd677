use lockstep_client::{
    driver::{Clock, FrameDriver, FrameScheduler},
    turn::Millis,
    ClientConfig, Command, Config, ConfirmedCommand, GameParams, LockstepClient, LogicResult,
    Turn,
};
use rand_chacha::rand_core::RngCore;
use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    rc::Rc,
};
use tracing::Level;

const FRAME_MILLIS: Millis = 16;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct MyWorld {
    position: i64,
    velocity: i64,
}

#[derive(Debug, Clone, Copy)]
pub enum MyCommand {
    // Here, you would put down the things that you want to externally affect the simulation. The
    // most common would be player commands.
    Accelerate,
    Decelerate,
}

impl Command for MyCommand {}

/// Shared by every client and the host loop. Stands in for whatever a real game would use.
#[derive(Debug, Default, Clone)]
pub struct FrameClock(Rc<Cell<Millis>>);

impl FrameClock {
    fn advance(&self) {
        self.0.set(self.0.get() + FRAME_MILLIS);
    }
}

impl Clock for FrameClock {
    fn now_millis(&self) -> Millis {
        self.0.get()
    }
}

// Dummy network backed by queues. The server confirms turns slightly ahead of its own clock.

type Outbox = Rc<RefCell<VecDeque<ConfirmedCommand>>>;

pub struct MyServer {
    config: Config,
    time: Millis,
    last_turn_number: i64,
    inboxes: Vec<Outbox>,
    outboxes: Vec<Rc<RefCell<VecDeque<Option<Turn>>>>>,
}

impl MyServer {
    fn update(&mut self, dt: Millis) {
        self.time += dt;
        while (self.last_turn_number - 1) * self.config.command_step_duration <= self.time {
            self.last_turn_number += 1;
            let commands: Vec<ConfirmedCommand> = self
                .inboxes
                .iter()
                .flat_map(|inbox| inbox.borrow_mut().drain(..).collect::<Vec<_>>())
                .collect();
            let turn = (!commands.is_empty()).then(|| Turn::new(commands));
            for outbox in &self.outboxes {
                outbox.borrow_mut().push_back(turn.clone());
            }
        }
    }
}

struct Player {
    client: LockstepClient,
    driver: FrameDriver,
    world: Rc<RefCell<MyWorld>>,
    turns: Rc<RefCell<VecDeque<Option<Turn>>>>,
}

fn new_player(
    player_number: u8,
    config: &Config,
    clock: &FrameClock,
    server: &mut MyServer,
) -> Player {
    let (scheduler, driver) = FrameScheduler::new();
    let mut client = LockstepClient::with_config(config.clone(), ClientConfig::new())
        .expect("demo config is valid")
        .with_player_number(player_number)
        .with_game_params(GameParams { random_seed: 1234 })
        .with_scheduler(scheduler)
        .with_clock(clock.clone());

    let outbox = Outbox::default();
    client.events_mut().on_command_added({
        let outbox = outbox.clone();
        move |pending| outbox.borrow_mut().push_back(pending.to_confirmed())
    });
    let turns = Rc::new(RefCell::new(VecDeque::new()));
    server.inboxes.push(outbox);
    server.outboxes.push(turns.clone());

    let world = Rc::new(RefCell::new(MyWorld::default()));
    client.register_command_fn::<MyCommand>({
        let world = world.clone();
        move |command| -> LogicResult {
            let mut world = world.borrow_mut();
            match command {
                MyCommand::Accelerate => world.velocity += 1,
                MyCommand::Decelerate => world.velocity -= 1,
            }
            Ok(())
        }
    });
    client.events_mut().on_simulate({
        let world = world.clone();
        move |_| {
            let mut world = world.borrow_mut();
            world.position += world.velocity;
        }
    });

    client.start(0);

    Player {
        client,
        driver,
        world,
        turns,
    }
}

fn main() {
    tracing_subscriber::fmt().with_max_level(Level::WARN).init();

    let config = Config {
        command_step_duration: 100,
        simulation_step_duration: 50,
        max_skipped_empty_turns: 0,
    };
    let clock = FrameClock::default();
    let mut server = MyServer {
        config: config.clone(),
        time: 0,
        last_turn_number: 0,
        inboxes: Vec::new(),
        outboxes: Vec::new(),
    };
    server.update(0);

    let mut players = vec![
        new_player(0, &config, &clock, &mut server),
        new_player(1, &config, &clock, &mut server),
    ];

    // Both players derive the same generator, so they agree on who acts when.
    let mut random = players[0].client.create_random_generator();
    let _ = players[1].client.create_random_generator();

    for frame in 0..600 {
        if frame % 20 == 0 {
            let acting = (random.next_u32() % 2) as usize;
            let command = if frame % 200 < 100 {
                MyCommand::Accelerate
            } else {
                MyCommand::Decelerate
            };
            players[acting].client.add_pending_command(command);
        }

        clock.advance();
        server.update(FRAME_MILLIS);
        for player in &mut players {
            while let Some(turn) = player.turns.borrow_mut().pop_front() {
                player.client.add_confirmed_turn(turn);
            }
            player.driver.drive(&mut player.client);
        }

        if frame % 60 == 0 {
            println!(
                "Turn {:>3}, Client 1: {:?}, Client 2: {:?}",
                players[0].client.current_turn_number(),
                players[0].world.borrow(),
                players[1].world.borrow()
            );
        }
    }
}
