//! Encrypted yes/no/total counters.
//!
//! Ballots are folded in with homomorphic `select` and `add`, so the contract
//! never learns an individual choice. The counters are decrypted exactly once,
//! by `reveal`, under the contract's own authority.

use crate::{BallotRecord, DataKey, Poll, PollError, PollResults};
use fhe_ballot::{reveal_choice, settle, Ciphertext, FheBackendClient};
use soroban_sdk::{contracttype, log, Address, Env};

#[contracttype]
#[derive(Clone, Debug, PartialEq)]
pub struct EncryptedTally {
    pub yes: Ciphertext,
    pub no: Ciphertext,
    pub total: Ciphertext,
}

pub fn load(env: &Env, poll_id: u64) -> Option<EncryptedTally> {
    env.storage().persistent().get(&DataKey::Tally(poll_id))
}

pub fn store(env: &Env, poll_id: u64, tally: &EncryptedTally) {
    env.storage().persistent().set(&DataKey::Tally(poll_id), tally);
}

/// Add one encrypted ballot (`1` = yes, `0` = no) to the poll's counters.
///
/// Returns the new counters without storing them. The tally is opened with
/// three encrypted zeros on the first ballot. Every ciphertext produced here
/// is owned by the contract.
pub fn fold(
    env: &Env,
    backend: &Address,
    poll_id: u64,
    choice: &Ciphertext,
) -> Result<EncryptedTally, PollError> {
    let client = FheBackendClient::new(env, backend);
    let this = env.current_contract_address();
    let zero = settle(client.try_trivial(&0, &this))?;
    let one = settle(client.try_trivial(&1, &this))?;

    let current = match load(env, poll_id) {
        Some(tally) => tally,
        None => EncryptedTally {
            yes: zero.clone(),
            no: zero.clone(),
            total: zero.clone(),
        },
    };

    let yes_inc = settle(client.try_select(choice, &one, &zero, &this))?;
    let no_inc = settle(client.try_select(choice, &zero, &one, &this))?;

    Ok(EncryptedTally {
        yes: settle(client.try_add(&current.yes, &yes_inc, &this))?,
        no: settle(client.try_add(&current.no, &no_inc, &this))?,
        total: settle(client.try_add(&current.total, &one, &this))?,
    })
}

/// Decrypt the counters of an ended poll.
///
/// Returns the stored plaintext when the poll is already revealed. A poll
/// without ballots reveals as all zeros.
pub fn reveal(
    env: &Env,
    backend: &Address,
    poll: &Poll,
    now: u64,
) -> Result<PollResults, PollError> {
    if poll.results_revealed {
        return Ok(poll.results());
    }
    if now < poll.deadline {
        return Err(PollError::TooEarly);
    }

    let Some(tally) = load(env, poll.id) else {
        return Ok(PollResults {
            yes_count: 0,
            no_count: 0,
            total_votes: 0,
        });
    };

    let client = FheBackendClient::new(env, backend);
    let this = env.current_contract_address();
    let yes_count = settle(client.try_decrypt(&tally.yes, &this))?;
    let no_count = settle(client.try_decrypt(&tally.no, &this))?;
    let total_votes = settle(client.try_decrypt(&tally.total, &this))?;

    if yes_count.checked_add(no_count) != Some(total_votes) || total_votes != poll.ballots_cast {
        log!(env, "inconsistent tally", poll.id, yes_count, no_count, total_votes);
        return Err(PollError::EncodingError);
    }

    Ok(PollResults {
        yes_count,
        no_count,
        total_votes,
    })
}

/// Decrypt a single ballot for its voter. Requires a prior access grant.
pub fn decrypt_individual(
    env: &Env,
    backend: &Address,
    record: &BallotRecord,
    voter: &Address,
) -> Result<bool, PollError> {
    if !record.access_granted {
        return Err(PollError::AccessDenied);
    }
    Ok(reveal_choice(env, backend, &record.ballot.ciphertext, voter)?)
}
