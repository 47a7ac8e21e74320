//! Data streaming consensus through the hub: vote collection, window
//! finalization with bet settlement, and Merkle-root snapshots.

mod common;

use common::*;
use photon_hub::{Event, HubError, StreamParams};
use photon_types::{SourceId, H256};

fn source() -> SourceId {
    SourceId([0x05; 32])
}

fn price_key() -> H256 {
    H256::keccak256(b"NGL/USD")
}

fn setup_spotter(t: &mut common::TestHub) {
    t.hub
        .set_allowed_stream_keys(OWNER, t.protocol_id, source(), vec![price_key()], true)
        .unwrap();
    t.hub.drain_events();
}

#[test]
fn test_votes_reach_consensus_and_finalize() {
    let mut t = setup(9);
    setup_spotter(&mut t);

    // Six of ten transmitters vote the same value; the first is agents[0].
    for i in 1..=6 {
        t.hub
            .propose_data(
                t.transmitter(i),
                t.protocol_id,
                source(),
                price_key(),
                b"42000".to_vec(),
            )
            .unwrap();
    }
    let events = t.hub.drain_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::ConsensusReadyToFinalize { .. })));

    // Data bets are locked for each voting agent.
    for i in 0..6 {
        assert_eq!(
            t.hub
                .staking()
                .agent(t.agents[i])
                .unwrap()
                .locked_personal_stake,
            5
        );
    }

    assert!(matches!(
        t.hub
            .finalize_data(OWNER, t.protocol_id, source(), price_key()),
        Err(HubError::CallerIsNotSpotter(_))
    ));
    t.hub
        .finalize_data(EXECUTOR, t.protocol_id, source(), price_key())
        .unwrap();

    let datum = t
        .hub
        .master()
        .finalized_data(t.protocol_id, source(), price_key())
        .unwrap();
    assert_eq!(datum.finalized_data, b"42000".to_vec());
    assert!(t
        .hub
        .drain_events()
        .iter()
        .any(|e| matches!(e, Event::DataFinalized { .. })));

    // Winner bets unlocked; rewards land at the round turn.
    for i in 0..6 {
        assert_eq!(
            t.hub
                .staking()
                .agent(t.agents[i])
                .unwrap()
                .locked_personal_stake,
            0
        );
    }
    t.hub.turn_round(TRIGGER).unwrap();
    let round = t.hub.staking().round() - 1;
    let first = t.hub.staking().agent(t.agents[0]).unwrap();
    let follow = t.hub.staking().agent(t.agents[1]).unwrap();
    // data_bet_first_reward = 12, data_bet_reward = 8.
    assert_eq!(first.round_reward(round).unwrap().delegate_reward, 12);
    assert_eq!(follow.round_reward(round).unwrap().delegate_reward, 8);
}

#[test]
fn test_majority_value_wins() {
    let mut t = setup(9);
    setup_spotter(&mut t);

    for i in 1..=4 {
        t.hub
            .propose_data(
                t.transmitter(i),
                t.protocol_id,
                source(),
                price_key(),
                b"42000".to_vec(),
            )
            .unwrap();
    }
    for i in 5..=6 {
        t.hub
            .propose_data(
                t.transmitter(i),
                t.protocol_id,
                source(),
                price_key(),
                b"41000".to_vec(),
            )
            .unwrap();
    }
    t.hub
        .finalize_data(EXECUTOR, t.protocol_id, source(), price_key())
        .unwrap();

    let datum = t
        .hub
        .master()
        .finalized_data(t.protocol_id, source(), price_key())
        .unwrap();
    assert_eq!(datum.finalized_data, b"42000".to_vec());

    // Minority bets stay locked (prunable after the timeout) and earn
    // nothing.
    t.hub.turn_round(TRIGGER).unwrap();
    let round = t.hub.staking().round() - 1;
    let minority = t.hub.staking().agent(t.agents[4]).unwrap();
    assert_eq!(minority.locked_personal_stake, 5);
    assert!(minority.round_reward(round).map_or(0, |r| r.delegate_reward) == 0);
}

#[test]
fn test_revote_replaces_without_double_bet() {
    let mut t = setup(9);
    setup_spotter(&mut t);

    for _ in 0..2 {
        t.hub
            .propose_data(
                t.transmitter(1),
                t.protocol_id,
                source(),
                price_key(),
                b"1".to_vec(),
            )
            .unwrap();
    }
    let asset = t
        .hub
        .stream()
        .asset(t.protocol_id, source(), price_key())
        .unwrap();
    assert_eq!(asset.n_votes, 1);
    assert_eq!(
        t.hub
            .staking()
            .agent(t.agents[0])
            .unwrap()
            .locked_personal_stake,
        5
    );
    let vote = t
        .hub
        .stream()
        .vote_of(t.protocol_id, source(), price_key(), t.transmitter(1))
        .unwrap();
    assert_eq!(vote.value, b"1".to_vec());
}

#[test]
fn test_finalize_enforces_threshold_and_interval() {
    let mut t = setup(9);
    setup_spotter(&mut t);
    t.hub
        .set_stream_params(
            ADMIN,
            t.protocol_id,
            StreamParams {
                consensus_rate: 6_000,
                min_finalization_interval: 600,
            },
        )
        .unwrap();
    t.hub.turn_round(TRIGGER).unwrap();

    // At threshold but inside the interval.
    for i in 1..=6 {
        t.hub
            .propose_data(
                t.transmitter(i),
                t.protocol_id,
                source(),
                price_key(),
                b"v".to_vec(),
            )
            .unwrap();
    }
    assert!(matches!(
        t.hub
            .finalize_data(EXECUTOR, t.protocol_id, source(), price_key()),
        Err(HubError::NotEnoughTimeHasPassed)
    ));

    t.advance_time(600);
    t.hub
        .finalize_data(EXECUTOR, t.protocol_id, source(), price_key())
        .unwrap();

    // The next window needs the threshold again: three votes are not
    // enough even after the interval.
    for i in 1..=3 {
        t.hub
            .propose_data(
                t.transmitter(i),
                t.protocol_id,
                source(),
                price_key(),
                b"w".to_vec(),
            )
            .unwrap();
    }
    t.advance_time(600);
    assert!(matches!(
        t.hub
            .finalize_data(EXECUTOR, t.protocol_id, source(), price_key()),
        Err(HubError::NotEnoughTransmittersHaveVoted)
    ));
}

#[test]
fn test_unknown_key_rejected_when_restricted() {
    let mut t = setup(9);
    setup_spotter(&mut t);
    let rogue = H256::keccak256(b"NOT/ALLOWED");
    for i in 1..=6 {
        t.hub
            .propose_data(t.transmitter(i), t.protocol_id, source(), rogue, b"v".to_vec())
            .unwrap();
    }
    // Votes are accepted, but the finalized datum cannot be recorded.
    assert!(matches!(
        t.hub.finalize_data(EXECUTOR, t.protocol_id, source(), rogue),
        Err(HubError::DataKeyNotAllowed)
    ));
}

#[test]
fn test_merkle_root_after_finalization() {
    let mut t = setup(9);
    setup_spotter(&mut t);

    assert!(matches!(
        t.hub
            .recalculate_merkle_root(EXECUTOR, t.protocol_id, source()),
        Err(HubError::NothingToSnapshot)
    ));

    for i in 1..=6 {
        t.hub
            .propose_data(
                t.transmitter(i),
                t.protocol_id,
                source(),
                price_key(),
                b"42000".to_vec(),
            )
            .unwrap();
    }
    t.hub
        .finalize_data(EXECUTOR, t.protocol_id, source(), price_key())
        .unwrap();
    t.hub.drain_events();

    let root = t
        .hub
        .recalculate_merkle_root(EXECUTOR, t.protocol_id, source())
        .unwrap();
    assert_eq!(t.hub.master().merkle_root(t.protocol_id, source()), Some(root));
    assert!(t
        .hub
        .drain_events()
        .iter()
        .any(|e| matches!(e, Event::NewMerkleRoot { .. })));

    // Identical finalized data in a fresh hub yields the identical root:
    // the leaf encoding depends only on timestamp, key, and bytes.
    let mut t2 = setup(9);
    setup_spotter(&mut t2);
    for i in 1..=6 {
        t2.hub
            .propose_data(
                t2.transmitter(i),
                t2.protocol_id,
                source(),
                price_key(),
                b"42000".to_vec(),
            )
            .unwrap();
    }
    t2.hub
        .finalize_data(EXECUTOR, t2.protocol_id, source(), price_key())
        .unwrap();
    let root2 = t2
        .hub
        .recalculate_merkle_root(EXECUTOR, t2.protocol_id, source())
        .unwrap();
    assert_eq!(root, root2);
}
