use itertools::iproduct;
use lockstep_client::{GameParams, LockstepClient};
use pretty_assertions::assert_eq;
use rand_chacha::{rand_core::RngCore, ChaCha8Rng};
use test_log::test;

fn draw(generator: &mut ChaCha8Rng, count: usize) -> Vec<u64> {
    (0..count).map(|_| generator.next_u64()).collect()
}

fn derive_generators(client: &mut LockstepClient, generators: usize) -> Vec<Vec<u64>> {
    (0..generators)
        .map(|_| draw(&mut client.create_random_generator(), 16))
        .collect()
}

#[test]
fn clients_with_the_same_seed_derive_identical_generators() {
    for (random_seed, generators) in iproduct!([0, 7, u64::MAX], [1, 3, 10]) {
        // GIVEN two clients of the same game.
        let mut client_1 = LockstepClient::new().with_game_params(GameParams { random_seed });
        let mut client_2 = LockstepClient::new().with_game_params(GameParams { random_seed });

        // WHEN both derive the same number of generators in the same order.
        let sequences_1 = derive_generators(&mut client_1, generators);
        let sequences_2 = derive_generators(&mut client_2, generators);

        // THEN every generator produces the same values on both clients.
        assert_eq!(sequences_1, sequences_2);
    }
}

#[test]
fn every_derived_generator_is_different() {
    let mut client = LockstepClient::new().with_game_params(GameParams { random_seed: 3 });
    let sequences = derive_generators(&mut client, 8);
    for (i, j) in iproduct!(0..8, 0..8) {
        if i != j {
            assert_ne!(sequences[i], sequences[j]);
        }
    }
}

#[test]
fn different_seeds_derive_different_generators() {
    let mut client_1 = LockstepClient::new().with_game_params(GameParams { random_seed: 1 });
    let mut client_2 = LockstepClient::new().with_game_params(GameParams { random_seed: 2 });
    assert_ne!(
        derive_generators(&mut client_1, 2),
        derive_generators(&mut client_2, 2)
    );
}

#[test]
fn stopping_restarts_the_derivation_sequence() {
    let mut client = LockstepClient::new().with_game_params(GameParams { random_seed: 11 });
    client.start(0);
    let before = derive_generators(&mut client, 4);

    // WHEN the client is stopped and started again.
    client.stop();
    client.start(0);

    // THEN the same generators are derived again.
    assert_eq!(derive_generators(&mut client, 4), before);
}

#[test]
fn changing_the_seed_changes_the_derivation_sequence() {
    let mut client = LockstepClient::new().with_game_params(GameParams { random_seed: 5 });
    let before = derive_generators(&mut client, 2);

    client.set_game_params(GameParams { random_seed: 6 });
    assert_eq!(client.game_params().random_seed, 6);
    assert_ne!(derive_generators(&mut client, 2), before);

    client.set_game_params(GameParams { random_seed: 5 });
    assert_eq!(derive_generators(&mut client, 2), before);
}
