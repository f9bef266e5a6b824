//! # Mock FHE Backend
//!
//! Identity "encryption" backend exposing the `FheBackend` interface of the
//! `fhe-ballot` crate. Plaintexts are kept in contract storage behind opaque
//! 32-byte handles, so the poll engine only ever sees handles, while tests can
//! exercise the full encrypt / fold / decrypt flow.
//!
//! `encrypt` records the [`BallotContext`] of every input it produces, and
//! `verify_input` accepts an input only for that exact context. Every handle
//! has an access list: operations require their `owner` to be allowed on all
//! operands, `allow` requires the granting caller to be allowed, and `decrypt`
//! requires the requester to be allowed, like a real coprocessor would.
//!
//! Not for production use.

#![no_std]
use fhe_ballot::{BallotContext, Ciphertext, EncryptedBallot};
use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, panic_with_error, symbol_short,
    xdr::ToXdr, Address, Bytes, BytesN, Env, Symbol,
};

const NONCE: Symbol = symbol_short!("nonce");
const OFFLINE: Symbol = symbol_short!("offline");
const LENIENT: Symbol = symbol_short!("lenient");

#[contracterror]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum MockFheError {
    Offline = 1,
    UnknownHandle = 2,
    NotAllowed = 3,
    Overflow = 4,
}

#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    Plaintext(BytesN<32>),        // handle -> value
    Input(BytesN<32>),            // handle -> BallotContext (produced by encrypt)
    Allowed(BytesN<32>, Address), // (handle, account) -> bool
}

#[contract]
pub struct MockFhe;

#[contractimpl]
impl MockFhe {
    /// Simulate an outage: while offline every backend call traps.
    pub fn set_offline(env: Env, offline: bool) {
        env.storage().instance().set(&OFFLINE, &offline);
    }

    /// Simulate a backend without input binding: `verify_input` stops
    /// checking the context and the proof.
    pub fn set_lenient(env: Env, lenient: bool) {
        env.storage().instance().set(&LENIENT, &lenient);
    }

    pub fn encrypt(env: Env, plaintext: bool, context: BallotContext) -> EncryptedBallot {
        Self::assert_online(&env);

        let ciphertext = Self::fresh(&env, plaintext as u64, &context.engine);
        env.storage()
            .persistent()
            .set(&DataKey::Input(ciphertext.handle.clone()), &context);

        let proof = Self::binding(&env, &ciphertext, &context);
        EncryptedBallot {
            ciphertext,
            proof: Bytes::from_array(&env, &proof.to_array()),
        }
    }

    pub fn verify_input(env: Env, ballot: EncryptedBallot, context: BallotContext) -> bool {
        Self::assert_online(&env);

        let input_key = DataKey::Input(ballot.ciphertext.handle.clone());
        let Some(bound) = env.storage().persistent().get::<DataKey, BallotContext>(&input_key)
        else {
            return false;
        };

        let lenient: bool = env.storage().instance().get(&LENIENT).unwrap_or(false);
        if !lenient {
            if bound != context {
                return false;
            }
            let expected = Self::binding(&env, &ballot.ciphertext, &context);
            if ballot.proof != Bytes::from_array(&env, &expected.to_array()) {
                return false;
            }
        }

        Self::plaintext(&env, &ballot.ciphertext) <= 1
    }

    pub fn trivial(env: Env, value: u64, owner: Address) -> Ciphertext {
        Self::assert_online(&env);
        owner.require_auth();
        Self::fresh(&env, value, &owner)
    }

    pub fn add(env: Env, lhs: Ciphertext, rhs: Ciphertext, owner: Address) -> Ciphertext {
        Self::assert_online(&env);
        owner.require_auth();

        let sum = Self::operand(&env, &lhs, &owner)
            .checked_add(Self::operand(&env, &rhs, &owner))
            .unwrap_or_else(|| panic_with_error!(&env, MockFheError::Overflow));
        Self::fresh(&env, sum, &owner)
    }

    pub fn select(
        env: Env,
        condition: Ciphertext,
        if_true: Ciphertext,
        if_false: Ciphertext,
        owner: Address,
    ) -> Ciphertext {
        Self::assert_online(&env);
        owner.require_auth();

        let condition = Self::operand(&env, &condition, &owner);
        let if_true = Self::operand(&env, &if_true, &owner);
        let if_false = Self::operand(&env, &if_false, &owner);
        let value = if condition != 0 { if_true } else { if_false };
        Self::fresh(&env, value, &owner)
    }

    pub fn allow(env: Env, ciphertext: Ciphertext, account: Address, caller: Address) {
        Self::assert_online(&env);
        caller.require_auth();

        // Traps on unknown handles and on callers outside the access list
        Self::operand(&env, &ciphertext, &caller);
        Self::grant(&env, &ciphertext, &account);
    }

    pub fn is_allowed(env: Env, ciphertext: Ciphertext, account: Address) -> bool {
        env.storage()
            .persistent()
            .get(&DataKey::Allowed(ciphertext.handle, account))
            .unwrap_or(false)
    }

    pub fn decrypt(env: Env, ciphertext: Ciphertext, requester: Address) -> u64 {
        Self::assert_online(&env);
        requester.require_auth();

        if !Self::is_allowed(env.clone(), ciphertext.clone(), requester) {
            panic_with_error!(&env, MockFheError::NotAllowed);
        }

        Self::plaintext(&env, &ciphertext)
    }

    /// Test hook: read a plaintext with no ACL check.
    pub fn peek(env: Env, ciphertext: Ciphertext) -> u64 {
        Self::plaintext(&env, &ciphertext)
    }

    // Internal helpers

    fn assert_online(env: &Env) {
        let offline: bool = env.storage().instance().get(&OFFLINE).unwrap_or(false);
        if offline {
            panic_with_error!(env, MockFheError::Offline);
        }
    }

    fn plaintext(env: &Env, ciphertext: &Ciphertext) -> u64 {
        env.storage()
            .persistent()
            .get(&DataKey::Plaintext(ciphertext.handle.clone()))
            .unwrap_or_else(|| panic_with_error!(env, MockFheError::UnknownHandle))
    }

    /// Plaintext of an operand `account` is allowed to use.
    fn operand(env: &Env, ciphertext: &Ciphertext, account: &Address) -> u64 {
        let value = Self::plaintext(env, ciphertext);
        if !Self::is_allowed(env.clone(), ciphertext.clone(), account.clone()) {
            panic_with_error!(env, MockFheError::NotAllowed);
        }
        value
    }

    fn grant(env: &Env, ciphertext: &Ciphertext, account: &Address) {
        env.storage().persistent().set(
            &DataKey::Allowed(ciphertext.handle.clone(), account.clone()),
            &true,
        );
    }

    fn fresh(env: &Env, value: u64, owner: &Address) -> Ciphertext {
        let nonce: u64 = env.storage().instance().get(&NONCE).unwrap_or(0) + 1;
        env.storage().instance().set(&NONCE, &nonce);

        let mut seed = Bytes::from_array(env, &nonce.to_be_bytes());
        seed.append(&env.current_contract_address().to_xdr(env));
        let handle: BytesN<32> = env.crypto().sha256(&seed).into();

        env.storage()
            .persistent()
            .set(&DataKey::Plaintext(handle.clone()), &value);

        let ciphertext = Ciphertext { handle };
        Self::grant(env, &ciphertext, owner);
        ciphertext
    }

    fn binding(env: &Env, ciphertext: &Ciphertext, context: &BallotContext) -> BytesN<32> {
        let mut data = Bytes::from_array(env, &ciphertext.handle.to_array());
        data.append(&context.clone().to_xdr(env));
        env.crypto().sha256(&data).into()
    }
}
