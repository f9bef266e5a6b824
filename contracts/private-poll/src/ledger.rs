//! Per-voter ballot records: who voted, what ciphertext they submitted and
//! whether they may decrypt it.

use crate::{push_index, DataKey, PollError};
use fhe_ballot::{settle, Ciphertext, EncryptedBallot, FheBackendClient};
use soroban_sdk::{contracttype, Address, Env, Vec};

/// Ballot stored for one (poll, voter) pair. Written once, only
/// `access_granted` may change afterwards.
#[contracttype]
#[derive(Clone, Debug, PartialEq)]
pub struct BallotRecord {
    pub ballot: EncryptedBallot,
    pub cast_at: u64,
    pub access_granted: bool,
}

pub fn has_voted(env: &Env, poll_id: u64, voter: &Address) -> bool {
    env.storage()
        .persistent()
        .has(&DataKey::Ballot(poll_id, voter.clone()))
}

pub fn has_access(env: &Env, poll_id: u64, voter: &Address) -> bool {
    ballot(env, poll_id, voter)
        .map(|record| record.access_granted)
        .unwrap_or(false)
}

pub fn is_handle_used(env: &Env, ciphertext: &Ciphertext) -> bool {
    env.storage()
        .persistent()
        .has(&DataKey::BallotHandle(ciphertext.handle.clone()))
}

pub fn ballot(env: &Env, poll_id: u64, voter: &Address) -> Option<BallotRecord> {
    env.storage()
        .persistent()
        .get(&DataKey::Ballot(poll_id, voter.clone()))
}

pub fn record_vote(
    env: &Env,
    poll_id: u64,
    voter: &Address,
    ballot: &EncryptedBallot,
    cast_at: u64,
) -> Result<(), PollError> {
    if has_voted(env, poll_id, voter) {
        return Err(PollError::AlreadyVoted);
    }
    if is_handle_used(env, &ballot.ciphertext) {
        return Err(PollError::InvalidBallot);
    }

    let record = BallotRecord {
        ballot: ballot.clone(),
        cast_at,
        access_granted: false,
    };
    env.storage()
        .persistent()
        .set(&DataKey::Ballot(poll_id, voter.clone()), &record);
    env.storage().persistent().set(
        &DataKey::BallotHandle(ballot.ciphertext.handle.clone()),
        &poll_id,
    );
    push_index(env, &DataKey::VoterPolls(voter.clone()), poll_id);

    Ok(())
}

/// Allow `voter` to decrypt their ballot at the backend.
///
/// Returns `false` when access was already granted (nothing to do).
pub fn grant_access(
    env: &Env,
    backend: &Address,
    poll_id: u64,
    voter: &Address,
) -> Result<bool, PollError> {
    let mut record = ballot(env, poll_id, voter).ok_or(PollError::NoBallotCast)?;
    if record.access_granted {
        return Ok(false);
    }

    let client = FheBackendClient::new(env, backend);
    let this = env.current_contract_address();
    settle(client.try_allow(&record.ballot.ciphertext, voter, &this))?;

    record.access_granted = true;
    env.storage()
        .persistent()
        .set(&DataKey::Ballot(poll_id, voter.clone()), &record);

    Ok(true)
}

pub fn voter_polls(env: &Env, voter: &Address) -> Vec<u64> {
    env.storage()
        .persistent()
        .get(&DataKey::VoterPolls(voter.clone()))
        .unwrap_or(Vec::new(env))
}
