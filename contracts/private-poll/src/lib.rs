//! # Confidential Poll Contract
//!
//! Yes/no polls whose individual choices are never visible on chain. Each
//! ballot is encrypted by an external homomorphic encryption backend (see the
//! `fhe-ballot` crate) and folded into encrypted per-poll counters without
//! being decrypted. Aggregate results are decrypted exactly once, after the
//! deadline.
//!
//! ## Lifecycle
//!
//! ```text
//! Active --(deadline passes)--> Ended --(reveal_results)--> Revealed
//!    \
//!     `--(close_poll by creator, before deadline)--> Closed
//! ```
//!
//! `Ended` is derived from the ledger clock and never stored. `Revealed` and
//! `Closed` are terminal.
//!
//! ## Privacy
//!
//! - Who voted is public (`has_voted`, `ballots_cast`); what they voted is not.
//! - A voter can read their own choice back only after `request_vote_access`,
//!   which grants them decryption rights on their ballot at the backend.
//! - The contract keeps decryption rights on its counters so it can reveal them
//!   under its own authority.

#![no_std]
use fhe_ballot::{BallotContext, EncryptedBallot};
use soroban_sdk::{
    contract, contractimpl, contracttype, log, panic_with_error, symbol_short, Address, BytesN,
    Env, String, Symbol, Vec,
};

mod error;
mod ledger;
mod tally;

pub use error::PollError;
pub use fhe_ballot::{Ciphertext, CodecError};
pub use ledger::BallotRecord;
pub use tally::EncryptedTally;

const BACKEND: Symbol = symbol_short!("backend");
const POLL_COUNT: Symbol = symbol_short!("poll_cnt");

// Contract version for upgrade tracking
const VERSION: u32 = 1;
const VERSION_KEY: Symbol = symbol_short!("version");

/// Maximum question length, in characters.
pub const MAX_QUESTION_LEN: u32 = 200;
/// Maximum description length, in characters.
pub const MAX_DESCRIPTION_LEN: u32 = 500;
/// Longest allowed voting window (365 days).
pub const MAX_POLL_DURATION: u64 = 365 * 24 * 60 * 60;
/// Page size cap for `get_polls`.
pub const MAX_PAGE_SIZE: u32 = 50;

// A char is at most 4 UTF-8 bytes
const MAX_TEXT_BYTES: usize = 4 * MAX_DESCRIPTION_LEN as usize;

#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    Poll(u64),                // poll_id -> Poll
    Tally(u64),               // poll_id -> EncryptedTally
    Ballot(u64, Address),     // (poll_id, voter) -> BallotRecord
    BallotHandle(BytesN<32>), // ciphertext handle -> poll_id it was cast in
    CreatorPolls(Address),    // creator -> Vec<u64>
    VoterPolls(Address),      // voter -> Vec<u64>
}

#[contracttype]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollStatus {
    Active,   // Accepting ballots
    Ended,    // Deadline passed, results not revealed yet
    Revealed, // Results decrypted and frozen
    Closed,   // Stopped early by the creator, never revealed
}

#[contracttype]
#[derive(Clone, Debug, PartialEq)]
pub struct Poll {
    pub id: u64,
    pub creator: Address,
    pub question: String,
    pub description: String,
    pub created_at: u64,
    pub deadline: u64,
    pub closed: bool,
    pub results_revealed: bool,
    pub ballots_cast: u64, // Public participation count
    pub yes_count: u64,    // Zero until revealed
    pub no_count: u64,     // Zero until revealed
    pub total_votes: u64,  // Zero until revealed
}

impl Poll {
    pub fn status(&self, now: u64) -> PollStatus {
        if self.closed {
            PollStatus::Closed
        } else if self.results_revealed {
            PollStatus::Revealed
        } else if now >= self.deadline {
            PollStatus::Ended
        } else {
            PollStatus::Active
        }
    }

    pub fn is_ended(&self, now: u64) -> bool {
        self.closed || now >= self.deadline
    }

    pub fn results(&self) -> PollResults {
        PollResults {
            yes_count: self.yes_count,
            no_count: self.no_count,
            total_votes: self.total_votes,
        }
    }
}

/// Decrypted aggregate of a poll.
#[contracttype]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollResults {
    pub yes_count: u64,
    pub no_count: u64,
    pub total_votes: u64,
}

// Typed Events
#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct PollCreatedEvent {
    #[topic]
    pub poll_id: u64,
    #[topic]
    pub creator: Address,
    pub question: String,
    pub deadline: u64,
}

/// Emitted on every accepted ballot. Carries no information about the choice.
#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct VoteCastEvent {
    #[topic]
    pub poll_id: u64,
    pub voter: Address,
    pub ballots_cast: u64,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct VoteAccessGrantedEvent {
    #[topic]
    pub poll_id: u64,
    pub voter: Address,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct ResultsRevealedEvent {
    #[topic]
    pub poll_id: u64,
    pub yes_count: u64,
    pub no_count: u64,
    pub total_votes: u64,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct PollClosedEvent {
    #[topic]
    pub poll_id: u64,
    pub closed_at: u64,
    pub ballots_cast: u64,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct ContractUpgraded {
    pub from: u32,
    pub to: u32,
}

#[contract]
pub struct PrivatePoll;

#[contractimpl]
impl PrivatePoll {
    /// Constructor: bind the contract to its encryption backend
    pub fn __constructor(env: Env, backend: Address) {
        if env.storage().instance().has(&VERSION_KEY) {
            panic_with_error!(&env, PollError::AlreadyInitialized);
        }

        env.storage().instance().set(&VERSION_KEY, &VERSION);
        ContractUpgraded {
            from: 0,
            to: VERSION,
        }
        .publish(&env);

        env.storage().instance().set(&BACKEND, &backend);
    }

    /// Create a poll open for `duration` seconds from now.
    pub fn create_poll(
        env: Env,
        creator: Address,
        question: String,
        description: String,
        duration: u64,
    ) -> Result<u64, PollError> {
        creator.require_auth();

        if !validate_text(&question, MAX_QUESTION_LEN, false) {
            log!(&env, "invalid question");
            return Err(PollError::InvalidInput);
        }
        if !validate_text(&description, MAX_DESCRIPTION_LEN, true) {
            log!(&env, "invalid description");
            return Err(PollError::InvalidInput);
        }
        if duration == 0 || duration > MAX_POLL_DURATION {
            log!(&env, "invalid duration", duration);
            return Err(PollError::InvalidInput);
        }

        let now = env.ledger().timestamp();
        let deadline = now.checked_add(duration).ok_or(PollError::InvalidInput)?;

        let poll_id = Self::next_poll_id(&env);
        let poll = Poll {
            id: poll_id,
            creator: creator.clone(),
            question: question.clone(),
            description,
            created_at: now,
            deadline,
            closed: false,
            results_revealed: false,
            ballots_cast: 0,
            yes_count: 0,
            no_count: 0,
            total_votes: 0,
        };
        env.storage().persistent().set(&DataKey::Poll(poll_id), &poll);
        push_index(&env, &DataKey::CreatorPolls(creator.clone()), poll_id);

        PollCreatedEvent {
            poll_id,
            creator,
            question,
            deadline,
        }
        .publish(&env);

        Ok(poll_id)
    }

    /// Cast an encrypted ballot.
    ///
    /// The ballot must have been encoded for this contract, this poll and this
    /// voter. Validation, the ledger entry and the tally fold commit together
    /// or not at all.
    pub fn cast_vote(
        env: Env,
        poll_id: u64,
        voter: Address,
        ballot: EncryptedBallot,
    ) -> Result<(), PollError> {
        voter.require_auth();

        let mut poll = Self::load_poll(&env, poll_id)?;
        let now = env.ledger().timestamp();

        if poll.closed {
            log!(&env, "vote rejected: poll closed", poll_id);
            return Err(PollError::PollClosed);
        }
        if now >= poll.deadline {
            log!(&env, "vote rejected: poll ended", poll_id);
            return Err(PollError::PollEnded);
        }

        // Check double voting before any backend call
        if ledger::has_voted(&env, poll_id, &voter) {
            return Err(PollError::AlreadyVoted);
        }
        // A ciphertext counts once, whatever context it is presented with
        if ledger::is_handle_used(&env, &ballot.ciphertext) {
            log!(&env, "vote rejected: ciphertext already cast", poll_id);
            return Err(PollError::InvalidBallot);
        }

        let backend = Self::load_backend(&env)?;
        let context = BallotContext::new(&env.current_contract_address(), poll_id, &voter);
        if !fhe_ballot::validate(&env, &backend, &ballot, &context)? {
            log!(&env, "vote rejected: invalid ballot", poll_id);
            return Err(PollError::InvalidBallot);
        }

        let folded = tally::fold(&env, &backend, poll_id, &ballot.ciphertext)?;
        ledger::record_vote(&env, poll_id, &voter, &ballot, now)?;
        tally::store(&env, poll_id, &folded);

        poll.ballots_cast += 1;
        env.storage().persistent().set(&DataKey::Poll(poll_id), &poll);

        VoteCastEvent {
            poll_id,
            voter,
            ballots_cast: poll.ballots_cast,
        }
        .publish(&env);

        Ok(())
    }

    pub fn has_voted(env: Env, poll_id: u64, voter: Address) -> bool {
        ledger::has_voted(&env, poll_id, &voter)
    }

    pub fn has_access(env: Env, poll_id: u64, voter: Address) -> bool {
        ledger::has_access(&env, poll_id, &voter)
    }

    /// Let a voter decrypt their own ballot later. Allowed in any poll status.
    pub fn request_vote_access(env: Env, poll_id: u64, voter: Address) -> Result<(), PollError> {
        voter.require_auth();
        Self::load_poll(&env, poll_id)?;

        let backend = Self::load_backend(&env)?;
        if ledger::grant_access(&env, &backend, poll_id, &voter)? {
            VoteAccessGrantedEvent { poll_id, voter }.publish(&env);
        }

        Ok(())
    }

    /// Stored ciphertext of a voter's ballot. Opaque without an access grant.
    pub fn get_encrypted_vote(
        env: Env,
        poll_id: u64,
        voter: Address,
    ) -> Result<EncryptedBallot, PollError> {
        Self::load_poll(&env, poll_id)?;
        ledger::ballot(&env, poll_id, &voter)
            .map(|record| record.ballot)
            .ok_or(PollError::NoBallotCast)
    }

    /// Decrypt the caller's own choice (`true` = yes).
    pub fn decrypt_own_vote(env: Env, poll_id: u64, voter: Address) -> Result<bool, PollError> {
        voter.require_auth();
        Self::load_poll(&env, poll_id)?;

        let record = ledger::ballot(&env, poll_id, &voter).ok_or(PollError::AccessDenied)?;
        let backend = Self::load_backend(&env)?;
        tally::decrypt_individual(&env, &backend, &record, &voter)
    }

    /// Decrypt the tally once the deadline has passed. Anyone may call;
    /// repeated calls return the stored results.
    pub fn reveal_results(env: Env, poll_id: u64) -> Result<PollResults, PollError> {
        let mut poll = Self::load_poll(&env, poll_id)?;

        if poll.closed {
            return Err(PollError::PollClosed);
        }
        if poll.results_revealed {
            return Ok(poll.results());
        }

        let backend = Self::load_backend(&env)?;
        let results = tally::reveal(&env, &backend, &poll, env.ledger().timestamp())?;

        poll.yes_count = results.yes_count;
        poll.no_count = results.no_count;
        poll.total_votes = results.total_votes;
        poll.results_revealed = true;
        env.storage().persistent().set(&DataKey::Poll(poll_id), &poll);

        ResultsRevealedEvent {
            poll_id,
            yes_count: results.yes_count,
            no_count: results.no_count,
            total_votes: results.total_votes,
        }
        .publish(&env);

        Ok(results)
    }

    /// Stop an active poll before its deadline. Creator only.
    pub fn close_poll(env: Env, poll_id: u64, caller: Address) -> Result<(), PollError> {
        caller.require_auth();

        let mut poll = Self::load_poll(&env, poll_id)?;
        if poll.creator != caller {
            return Err(PollError::Unauthorized);
        }

        let now = env.ledger().timestamp();
        if poll.status(now) != PollStatus::Active {
            log!(&env, "close rejected: poll not active", poll_id);
            return Err(PollError::AlreadyEnded);
        }

        poll.closed = true;
        env.storage().persistent().set(&DataKey::Poll(poll_id), &poll);

        PollClosedEvent {
            poll_id,
            closed_at: now,
            ballots_cast: poll.ballots_cast,
        }
        .publish(&env);

        Ok(())
    }

    pub fn get_poll(env: Env, poll_id: u64) -> Result<Poll, PollError> {
        Self::load_poll(&env, poll_id)
    }

    /// Number of polls ever created (also the highest poll id)
    pub fn poll_count(env: Env) -> u64 {
        env.storage().instance().get(&POLL_COUNT).unwrap_or(0)
    }

    pub fn is_poll_ended(env: Env, poll_id: u64) -> Result<bool, PollError> {
        let poll = Self::load_poll(&env, poll_id)?;
        Ok(poll.is_ended(env.ledger().timestamp()))
    }

    /// Seconds left before the deadline, 0 once the poll is ended or closed.
    pub fn time_remaining(env: Env, poll_id: u64) -> Result<u64, PollError> {
        let poll = Self::load_poll(&env, poll_id)?;
        let now = env.ledger().timestamp();
        if poll.is_ended(now) {
            Ok(0)
        } else {
            Ok(poll.deadline - now)
        }
    }

    pub fn poll_status(env: Env, poll_id: u64) -> Result<PollStatus, PollError> {
        let poll = Self::load_poll(&env, poll_id)?;
        Ok(poll.status(env.ledger().timestamp()))
    }

    /// Revealed results. Fails until `reveal_results` has succeeded.
    pub fn get_results(env: Env, poll_id: u64) -> Result<PollResults, PollError> {
        let poll = Self::load_poll(&env, poll_id)?;
        if poll.results_revealed {
            Ok(poll.results())
        } else if poll.closed {
            Err(PollError::PollClosed)
        } else {
            Err(PollError::TooEarly)
        }
    }

    /// Ids of polls created by `creator`, oldest first.
    pub fn creator_polls(env: Env, creator: Address) -> Vec<u64> {
        env.storage()
            .persistent()
            .get(&DataKey::CreatorPolls(creator))
            .unwrap_or(Vec::new(&env))
    }

    /// Ids of polls `voter` cast a ballot in, in cast order.
    pub fn voter_polls(env: Env, voter: Address) -> Vec<u64> {
        ledger::voter_polls(&env, &voter)
    }

    /// Get polls with pagination. Returns up to `limit` polls after `start_id`.
    pub fn get_polls(env: Env, start_id: u64, limit: u32) -> Vec<Poll> {
        let total = Self::poll_count(env.clone());
        let limit = limit.min(MAX_PAGE_SIZE) as u64;
        let end = start_id.saturating_add(limit).min(total);

        let mut polls = Vec::new(&env);
        for i in start_id..end {
            if let Some(poll) = env
                .storage()
                .persistent()
                .get::<DataKey, Poll>(&DataKey::Poll(i + 1))
            {
                polls.push_back(poll);
            }
        }
        polls
    }

    /// Address of the encryption backend
    pub fn backend(env: Env) -> Result<Address, PollError> {
        Self::load_backend(&env)
    }

    pub fn version(env: Env) -> u32 {
        env.storage().instance().get(&VERSION_KEY).unwrap_or(0)
    }

    // Internal helpers

    fn load_backend(env: &Env) -> Result<Address, PollError> {
        env.storage()
            .instance()
            .get(&BACKEND)
            .ok_or(PollError::BackendNotSet)
    }

    fn load_poll(env: &Env, poll_id: u64) -> Result<Poll, PollError> {
        env.storage()
            .persistent()
            .get(&DataKey::Poll(poll_id))
            .ok_or(PollError::PollNotFound)
    }

    fn next_poll_id(env: &Env) -> u64 {
        let next: u64 = env.storage().instance().get(&POLL_COUNT).unwrap_or(0) + 1;
        env.storage().instance().set(&POLL_COUNT, &next);
        next
    }
}

/// Append `id` to the id list stored under `key`.
pub(crate) fn push_index(env: &Env, key: &DataKey, id: u64) {
    let mut ids: Vec<u64> = env
        .storage()
        .persistent()
        .get(key)
        .unwrap_or(Vec::new(env));
    ids.push_back(id);
    env.storage().persistent().set(key, &ids);
}

/// Check that `text` is valid UTF-8 of at most `max_chars` characters, and
/// not blank unless `allow_blank`.
fn validate_text(text: &String, max_chars: u32, allow_blank: bool) -> bool {
    let len = text.len() as usize;
    if len > 4 * max_chars as usize {
        return false;
    }

    let mut buf = [0u8; MAX_TEXT_BYTES];
    let bytes = &mut buf[..len];
    text.copy_into_slice(bytes);

    let Ok(text) = core::str::from_utf8(bytes) else {
        return false;
    };
    if !allow_blank && text.trim().is_empty() {
        return false;
    }
    text.chars().count() <= max_chars as usize
}
