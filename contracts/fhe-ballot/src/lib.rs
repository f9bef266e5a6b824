//! # FHE Ballot Codec
//!
//! Shared ballot types and the cross-contract interface of the homomorphic
//! encryption backend used by the confidential poll engine.
//!
//! A ballot is a single yes/no choice encrypted by the backend together with an
//! input proof. The proof binds the ciphertext to a [`BallotContext`] (engine
//! contract, poll id, voter), so a ballot produced for one poll or one voter is
//! rejected everywhere else.
//!
//! The backend itself is opaque. Any contract exposing the functions of
//! [`FheBackend`] can be plugged in; tests use the `mock-fhe` contract.

#![no_std]

use soroban_sdk::{
    contractclient, contracterror, contracttype, log, Address, Bytes, BytesN, Env,
};

#[contracterror]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum CodecError {
    /// The backend invocation failed (unavailable, out of budget, rejected the call)
    BackendUnavailable = 40,
    /// A ballot ciphertext decrypted to something other than 0 or 1
    MalformedPlaintext = 41,
}

/// Opaque handle to a value held by the encryption backend.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Ciphertext {
    pub handle: BytesN<32>,
}

/// An encrypted choice plus the backend's proof of correct encoding.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EncryptedBallot {
    pub ciphertext: Ciphertext,
    pub proof: Bytes,
}

/// What an encrypted ballot is bound to.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BallotContext {
    pub engine: Address, // poll engine contract that will consume the ballot
    pub poll_id: u64,
    pub voter: Address,
}

impl BallotContext {
    pub fn new(engine: &Address, poll_id: u64, voter: &Address) -> Self {
        BallotContext {
            engine: engine.clone(),
            poll_id,
            voter: voter.clone(),
        }
    }
}

/// Functions a backend contract must expose.
///
/// Counters and ballots are both represented as [`Ciphertext`]; a ballot
/// encrypts 0 (no) or 1 (yes).
///
/// Every ciphertext carries an access list. `encrypt` grants the engine named
/// in the context; the other operations grant `owner` on their result and
/// require `owner` to be on the access list of every operand.
#[contractclient(name = "FheBackendClient")]
pub trait FheBackend {
    /// Encrypt a choice for the given context (client side helper).
    fn encrypt(env: Env, plaintext: bool, context: BallotContext) -> EncryptedBallot;

    /// Check that `ballot` was produced by `encrypt` for exactly `context`,
    /// without decrypting it.
    fn verify_input(env: Env, ballot: EncryptedBallot, context: BallotContext) -> bool;

    /// Encryption of a public constant.
    fn trivial(env: Env, value: u64, owner: Address) -> Ciphertext;

    /// Homomorphic addition.
    fn add(env: Env, lhs: Ciphertext, rhs: Ciphertext, owner: Address) -> Ciphertext;

    /// Homomorphic `condition ? if_true : if_false`.
    fn select(
        env: Env,
        condition: Ciphertext,
        if_true: Ciphertext,
        if_false: Ciphertext,
        owner: Address,
    ) -> Ciphertext;

    /// Let `account` use and decrypt `ciphertext`. `caller` must already be
    /// allowed.
    fn allow(env: Env, ciphertext: Ciphertext, account: Address, caller: Address);

    /// Decrypt `ciphertext` for `requester`, who must be authorized and allowed.
    fn decrypt(env: Env, ciphertext: Ciphertext, requester: Address) -> u64;
}

/// Collapse the nested result of a `try_*` backend call.
///
/// Any failure, whether the callee trapped, returned an error or produced a
/// value that does not convert, is reported as `BackendUnavailable`.
pub fn settle<T, E, I>(outcome: Result<Result<T, E>, I>) -> Result<T, CodecError> {
    match outcome {
        Ok(Ok(value)) => Ok(value),
        _ => Err(CodecError::BackendUnavailable),
    }
}

/// Encrypt `choice` for `context` through the backend at `backend`.
pub fn encode(
    env: &Env,
    backend: &Address,
    choice: bool,
    context: &BallotContext,
) -> Result<EncryptedBallot, CodecError> {
    let client = FheBackendClient::new(env, backend);
    settle(client.try_encrypt(&choice, context)).map_err(|err| {
        log!(env, "ballot encoding failed", context.poll_id);
        err
    })
}

/// Verify that `ballot` is well formed and bound to `context`.
///
/// `Ok(false)` means the backend answered and rejected the proof; an `Err`
/// means no answer could be obtained.
pub fn validate(
    env: &Env,
    backend: &Address,
    ballot: &EncryptedBallot,
    context: &BallotContext,
) -> Result<bool, CodecError> {
    let client = FheBackendClient::new(env, backend);
    settle(client.try_verify_input(ballot, context))
}

/// Decrypt a single ballot ciphertext under `requester`'s authorization.
pub fn reveal_choice(
    env: &Env,
    backend: &Address,
    ciphertext: &Ciphertext,
    requester: &Address,
) -> Result<bool, CodecError> {
    let client = FheBackendClient::new(env, backend);
    let plaintext = settle(client.try_decrypt(ciphertext, requester))?;
    decode_choice(plaintext)
}

/// Interpret a decrypted ballot.
pub fn decode_choice(plaintext: u64) -> Result<bool, CodecError> {
    match plaintext {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(CodecError::MalformedPlaintext),
    }
}
