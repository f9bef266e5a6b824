#![no_std]

// Integration test crate - all code is test-only

#[cfg(test)]
mod tests {
    extern crate std;
    use soroban_sdk::{testutils::Address as _, testutils::Ledger as _, Address, Env, String};

    // Import actual contract clients
    use fhe_ballot::{BallotContext, EncryptedBallot};
    use mock_fhe::MockFheClient;
    use private_poll::{PollError, PollResults, PollStatus, PrivatePollClient};

    const HOUR: u64 = 3_600;

    /// Helper to setup the engine with its encryption backend
    struct PollSystem {
        env: Env,
        backend: Address,
        engine: Address,
    }

    impl PollSystem {
        fn new() -> Self {
            let env = Env::default();
            env.mock_all_auths();
            env.ledger().set_timestamp(1_700_000_000);

            let backend = env.register(mock_fhe::MockFhe, ());
            let engine = env.register(private_poll::PrivatePoll, (backend.clone(),));

            Self {
                env,
                backend,
                engine,
            }
        }

        fn poll_client(&self) -> PrivatePollClient {
            PrivatePollClient::new(&self.env, &self.engine)
        }

        fn backend_client(&self) -> MockFheClient {
            MockFheClient::new(&self.env, &self.backend)
        }

        fn now(&self) -> u64 {
            self.env.ledger().timestamp()
        }

        fn advance(&self, seconds: u64) {
            self.env.ledger().set_timestamp(self.now() + seconds);
        }

        fn create_poll(&self, creator: &Address, question: &str, duration: u64) -> u64 {
            self.poll_client().create_poll(
                creator,
                &String::from_str(&self.env, question),
                &String::from_str(&self.env, ""),
                &duration,
            )
        }

        /// Encrypt a choice the way a voter's client would.
        fn ballot(&self, poll_id: u64, voter: &Address, choice: bool) -> EncryptedBallot {
            let context = BallotContext::new(&self.engine, poll_id, voter);
            fhe_ballot::encode(&self.env, &self.backend, choice, &context).unwrap()
        }

        fn vote(&self, poll_id: u64, voter: &Address, choice: bool) {
            let ballot = self.ballot(poll_id, voter, choice);
            self.poll_client().cast_vote(&poll_id, voter, &ballot);
        }
    }

    #[test]
    fn test_full_poll_flow() {
        let system = PollSystem::new();
        let client = system.poll_client();

        let creator = Address::generate(&system.env);
        let alice = Address::generate(&system.env);
        let bob = Address::generate(&system.env);

        let poll_id = system.create_poll(&creator, "Adopt the new logo?", HOUR);
        assert_eq!(poll_id, 1);

        system.vote(poll_id, &alice, true);
        system.advance(60);
        system.vote(poll_id, &bob, false);

        let again = system.ballot(poll_id, &alice, true);
        assert_eq!(
            client.try_cast_vote(&poll_id, &alice, &again),
            Err(Ok(PollError::AlreadyVoted))
        );
        assert_eq!(client.try_reveal_results(&poll_id), Err(Ok(PollError::TooEarly)));

        system.advance(HOUR);
        assert_eq!(
            client.reveal_results(&poll_id),
            PollResults {
                yes_count: 1,
                no_count: 1,
                total_votes: 2,
            }
        );
        assert_eq!(client.poll_status(&poll_id), PollStatus::Revealed);
    }

    #[test]
    fn test_close_flow() {
        let system = PollSystem::new();
        let client = system.poll_client();

        let creator = Address::generate(&system.env);
        let voter = Address::generate(&system.env);
        let poll_id = system.create_poll(&creator, "Keep Friday meetings?", HOUR);

        system.advance(10 * 60);
        client.close_poll(&poll_id, &creator);

        system.advance(60);
        let ballot = system.ballot(poll_id, &voter, true);
        assert_eq!(
            client.try_cast_vote(&poll_id, &voter, &ballot),
            Err(Ok(PollError::PollClosed))
        );

        system.advance(HOUR);
        assert_eq!(client.try_reveal_results(&poll_id), Err(Ok(PollError::PollClosed)));
        assert_eq!(client.time_remaining(&poll_id), 0);
    }

    #[test]
    fn test_voter_reads_back_own_choice() {
        let system = PollSystem::new();
        let client = system.poll_client();

        let creator = Address::generate(&system.env);
        let voter = Address::generate(&system.env);
        let poll_id = system.create_poll(&creator, "Move to Tuesdays?", HOUR);

        system.vote(poll_id, &voter, true);

        // The stored ballot is opaque to the voter until access is granted
        let stored = client.get_encrypted_vote(&poll_id, &voter);
        assert!(!system
            .backend_client()
            .is_allowed(&stored.ciphertext, &voter));

        client.request_vote_access(&poll_id, &voter);
        assert!(system
            .backend_client()
            .is_allowed(&stored.ciphertext, &voter));
        assert!(client.decrypt_own_vote(&poll_id, &voter));
    }

    #[test]
    fn test_second_engine_rejects_foreign_ballots() {
        let system = PollSystem::new();
        let other_engine = system
            .env
            .register(private_poll::PrivatePoll, (system.backend.clone(),));
        let other = PrivatePollClient::new(&system.env, &other_engine);

        let creator = Address::generate(&system.env);
        let voter = Address::generate(&system.env);
        let poll_id = system.create_poll(&creator, "Same id, other engine", HOUR);
        let other_id = other.create_poll(
            &creator,
            &String::from_str(&system.env, "Same id, other engine"),
            &String::from_str(&system.env, ""),
            &HOUR,
        );
        assert_eq!(poll_id, other_id);

        let ballot = system.ballot(poll_id, &voter, true);
        assert_eq!(
            other.try_cast_vote(&other_id, &voter, &ballot),
            Err(Ok(PollError::InvalidBallot))
        );
        system.poll_client().cast_vote(&poll_id, &voter, &ballot);
    }
}
