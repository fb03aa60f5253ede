//! Randomized property tests for vote containers and board lifecycle.
//!
//! Each property drives a board through random operation sequences and checks
//! the result against a plain in-memory model.

use pqbbs::board::{Board, BoardConfig, BoardCore, LocalTransport, Thread, Vote};
use pqbbs::crypto::KeyPair;
use pqbbs::graph::{Identity, Reference};
use pqbbs::PqbbsError;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Arc;

struct Fixture {
    core: BoardCore<LocalTransport>,
    board: Identity,
    thread: Reference,
}

fn fixture() -> Fixture {
    let core = BoardCore::in_memory(Arc::new(LocalTransport::new())).unwrap();
    let board = core
        .inject_board(
            BoardConfig::master(KeyPair::generate_mldsa87().unwrap()),
            Board::new("props", "").unwrap(),
        )
        .unwrap();
    let thread = core
        .inject_thread(&board, Thread::new("t", "", board).unwrap())
        .unwrap();
    Fixture {
        core,
        board,
        thread,
    }
}

fn voter(index: u8) -> Identity {
    Identity::from_bytes([index; 64])
}

fn random_value(rng: &mut impl Rng) -> i8 {
    if rng.gen_bool(0.5) {
        1
    } else {
        -1
    }
}

fn sorted(mut votes: Vec<(Identity, i8)>) -> Vec<(Identity, i8)> {
    votes.sort();
    votes
}

fn as_pairs(votes: &[Vote]) -> Vec<(Identity, i8)> {
    votes.iter().map(|v| (v.voter, v.value)).collect()
}

/// Property: after any sequence of adds, there is exactly one vote per voter,
/// holding that voter's last value.
#[test]
fn property_last_write_wins_per_voter() {
    let mut rng = StdRng::seed_from_u64(0x5eed_0001);
    let f = fixture();
    let mut model: HashMap<Identity, i8> = HashMap::new();

    for _ in 0..40 {
        let who = voter(rng.gen_range(1..=6));
        let value = random_value(&mut rng);
        f.core
            .add_vote_for_thread(&f.board, f.thread, Vote::new(who, value))
            .unwrap();
        model.insert(who, value);
    }

    let votes = f.core.get_votes_for_thread(&f.board, &f.thread).unwrap();
    assert_eq!(votes.len(), model.len());
    assert_eq!(
        sorted(as_pairs(&votes)),
        sorted(model.into_iter().collect())
    );
}

/// Property: re-voting never changes the list length or the voter's slot.
#[test]
fn property_revote_keeps_length_and_position() {
    let mut rng = StdRng::seed_from_u64(0x5eed_0002);
    let f = fixture();
    for i in 1..=5 {
        f.core
            .add_vote_for_thread(&f.board, f.thread, Vote::new(voter(i), 1))
            .unwrap();
    }

    for _ in 0..20 {
        let before = f.core.get_votes_for_thread(&f.board, &f.thread).unwrap();
        let index = rng.gen_range(0..before.len());
        let who = before[index].voter;
        let value = -before[index].value;

        f.core
            .add_vote_for_thread(&f.board, f.thread, Vote::new(who, value))
            .unwrap();

        let after = f.core.get_votes_for_thread(&f.board, &f.thread).unwrap();
        assert_eq!(after.len(), before.len());
        assert_eq!(after[index].voter, who);
        assert_eq!(after[index].value, value);
    }
}

/// Property: removing an absent voter succeeds and changes nothing.
#[test]
fn property_remove_absent_is_noop() {
    let mut rng = StdRng::seed_from_u64(0x5eed_0003);
    let f = fixture();
    for i in 1..=4 {
        f.core
            .add_vote_for_post(&f.board, f.thread, Vote::new(voter(i), random_value(&mut rng)))
            .unwrap();
    }
    let before = f.core.get_votes_for_post(&f.board, &f.thread).unwrap();
    let seq = f.core.latest_root(&f.board).unwrap().seq();

    for _ in 0..10 {
        let absent = voter(rng.gen_range(100..=200));
        let removed = f
            .core
            .remove_vote_for_post(&absent, &f.board, &f.thread)
            .unwrap();
        assert!(!removed);
    }

    assert_eq!(f.core.get_votes_for_post(&f.board, &f.thread).unwrap(), before);
    assert_eq!(f.core.latest_root(&f.board).unwrap().seq(), seq);
}

/// Property: removing a present voter shrinks the list by one, and the rest is
/// a permutation of what was there.
#[test]
fn property_remove_present_shrinks_by_one() {
    let mut rng = StdRng::seed_from_u64(0x5eed_0004);
    let f = fixture();
    for i in 1..=8 {
        f.core
            .add_vote_for_thread(&f.board, f.thread, Vote::new(voter(i), random_value(&mut rng)))
            .unwrap();
    }

    while let Ok(before) = f.core.get_votes_for_thread(&f.board, &f.thread) {
        if before.is_empty() {
            break;
        }
        let victim = before[rng.gen_range(0..before.len())].voter;
        assert!(f
            .core
            .remove_vote_for_thread(&victim, &f.board, &f.thread)
            .unwrap());

        let after = f.core.get_votes_for_thread(&f.board, &f.thread).unwrap();
        assert_eq!(after.len(), before.len() - 1);

        let expected: Vec<_> = as_pairs(&before)
            .into_iter()
            .filter(|(who, _)| *who != victim)
            .collect();
        assert_eq!(sorted(as_pairs(&after)), sorted(expected));
    }
}

/// Property: interleaved adds and removes across two targets match the model.
#[test]
fn property_interleaved_operations_match_model() {
    let mut rng = StdRng::seed_from_u64(0x5eed_0005);
    let f = fixture();
    let other = f
        .core
        .inject_thread(&f.board, Thread::new("other", "", f.board).unwrap())
        .unwrap();
    let targets = [f.thread, other];
    let mut model: HashMap<Reference, HashMap<Identity, i8>> = HashMap::new();

    for _ in 0..40 {
        let target = targets[rng.gen_range(0..targets.len())];
        let who = voter(rng.gen_range(1..=4));
        if rng.gen_bool(0.6) {
            let value = random_value(&mut rng);
            f.core
                .add_vote_for_thread(&f.board, target, Vote::new(who, value))
                .unwrap();
            model.entry(target).or_default().insert(who, value);
        } else {
            let removed = f
                .core
                .remove_vote_for_thread(&who, &f.board, &target)
                .unwrap();
            let expected = model
                .get_mut(&target)
                .and_then(|votes| votes.remove(&who))
                .is_some();
            assert_eq!(removed, expected);
        }
    }

    for target in targets {
        let votes = f.core.get_votes_for_thread(&f.board, &target).unwrap();
        let expected: Vec<_> = model
            .get(&target)
            .map(|votes| votes.iter().map(|(k, v)| (*k, *v)).collect())
            .unwrap_or_default();
        assert_eq!(sorted(as_pairs(&votes)), sorted(expected));
    }
}

/// Property: a subscriber configuration can never inject a board, whatever the
/// identity.
#[test]
fn property_keyless_injection_always_not_master() {
    let mut rng = StdRng::seed_from_u64(0x5eed_0006);
    let core = BoardCore::in_memory(Arc::new(LocalTransport::new())).unwrap();

    for _ in 0..20 {
        let mut bytes = [0u8; 64];
        rng.fill(&mut bytes[..]);
        let identity = Identity::from_bytes(bytes);

        let result = core.inject_board(
            BoardConfig::subscriber(identity),
            Board::new("nope", "").unwrap(),
        );
        assert!(matches!(result, Err(PqbbsError::NotMaster(_))));
        assert!(core.board_config(&identity).is_none());
    }
    assert!(core.list_boards().is_empty());
}
