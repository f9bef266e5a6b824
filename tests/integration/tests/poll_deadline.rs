// Poll Deadline Tests
//
// Tests for the voting window:
// 1. Voting up to one second before the deadline succeeds
// 2. Voting at or after the deadline fails with PollEnded
// 3. Results can only be revealed once the deadline has passed
// 4. The creator can only close a poll while it is still open

use fhe_ballot::BallotContext;
use mock_fhe::MockFhe;
use private_poll::{PollError, PollStatus, PrivatePoll, PrivatePollClient};
use soroban_sdk::{
    testutils::{Address as _, Ledger},
    Address, Env, String,
};

const DAY: u64 = 24 * 60 * 60;

fn setup() -> (Env, Address, Address, Address, u64) {
    let env = Env::default();
    env.mock_all_auths();
    env.ledger().set_timestamp(10_000);

    let backend = env.register(MockFhe, ());
    let engine = env.register(PrivatePoll, (backend.clone(),));
    let creator = Address::generate(&env);

    let poll_id = PrivatePollClient::new(&env, &engine).create_poll(
        &creator,
        &String::from_str(&env, "Extend the budget?"),
        &String::from_str(&env, "One day window"),
        &DAY,
    );

    (env, backend, engine, creator, poll_id)
}

fn cast(
    env: &Env,
    backend: &Address,
    engine: &Address,
    poll_id: u64,
    voter: &Address,
) -> Result<(), PollError> {
    let context = BallotContext::new(engine, poll_id, voter);
    let ballot = fhe_ballot::encode(env, backend, true, &context).unwrap();
    match PrivatePollClient::new(env, engine).try_cast_vote(&poll_id, voter, &ballot) {
        Ok(_) => Ok(()),
        Err(Ok(err)) => Err(err),
        Err(Err(_)) => panic!("unexpected host error"),
    }
}

#[test]
fn test_vote_before_deadline_succeeds() {
    let (env, backend, engine, _, poll_id) = setup();
    let voter = Address::generate(&env);

    env.ledger().set_timestamp(10_000 + DAY - 1);
    assert_eq!(cast(&env, &backend, &engine, poll_id, &voter), Ok(()));
}

#[test]
fn test_vote_at_deadline_fails() {
    let (env, backend, engine, _, poll_id) = setup();
    let voter = Address::generate(&env);

    env.ledger().set_timestamp(10_000 + DAY);
    assert_eq!(
        cast(&env, &backend, &engine, poll_id, &voter),
        Err(PollError::PollEnded)
    );
}

#[test]
fn test_status_follows_the_clock() {
    let (env, _, engine, _, poll_id) = setup();
    let client = PrivatePollClient::new(&env, &engine);

    assert_eq!(client.poll_status(&poll_id), PollStatus::Active);
    assert_eq!(client.time_remaining(&poll_id), DAY);

    env.ledger().set_timestamp(10_000 + DAY / 2);
    assert_eq!(client.time_remaining(&poll_id), DAY / 2);

    env.ledger().set_timestamp(10_000 + DAY);
    assert_eq!(client.poll_status(&poll_id), PollStatus::Ended);
    assert!(client.is_poll_ended(&poll_id));
    assert_eq!(client.time_remaining(&poll_id), 0);
}

#[test]
fn test_reveal_waits_for_deadline() {
    let (env, backend, engine, _, poll_id) = setup();
    let client = PrivatePollClient::new(&env, &engine);
    let voter = Address::generate(&env);
    cast(&env, &backend, &engine, poll_id, &voter).unwrap();

    env.ledger().set_timestamp(10_000 + DAY - 1);
    assert_eq!(client.try_reveal_results(&poll_id), Err(Ok(PollError::TooEarly)));

    env.ledger().set_timestamp(10_000 + DAY);
    assert_eq!(client.reveal_results(&poll_id).yes_count, 1);
}

#[test]
fn test_close_only_before_deadline() {
    let (env, _, engine, creator, poll_id) = setup();
    let client = PrivatePollClient::new(&env, &engine);

    env.ledger().set_timestamp(10_000 + DAY);
    assert_eq!(
        client.try_close_poll(&poll_id, &creator),
        Err(Ok(PollError::AlreadyEnded))
    );
    assert_eq!(client.poll_status(&poll_id), PollStatus::Ended);
}
