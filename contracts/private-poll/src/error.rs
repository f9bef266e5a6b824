use fhe_ballot::CodecError;
use soroban_sdk::contracterror;

#[contracterror]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum PollError {
    /// Malformed creation arguments (blank question, text too long, bad duration)
    InvalidInput = 1,
    /// Caller is not allowed to perform this administrative action
    Unauthorized = 2,
    /// Voter already has a ballot in this poll
    AlreadyVoted = 3,
    /// Poll is past its deadline, closed or revealed
    AlreadyEnded = 4,
    /// Tally was already decrypted and can no longer change. Not returned by
    /// the current entry points: a revealed poll is past its deadline, so
    /// casts fail with `PollEnded`.
    AlreadyRevealed = 5,
    /// Deadline has passed
    PollEnded = 6,
    /// Creator closed the poll
    PollClosed = 7,
    /// Deadline has not passed yet
    TooEarly = 8,
    /// Decryption requested without a prior access grant
    AccessDenied = 9,
    /// Access requested by an identity that never voted
    NoBallotCast = 10,
    /// Encryption backend failed or returned inconsistent data
    EncodingError = 11,
    PollNotFound = 12,
    /// Ballot is not bound to the poll and voter, or its ciphertext was
    /// already cast
    InvalidBallot = 13,
    AlreadyInitialized = 14,
    BackendNotSet = 15,
}

impl From<CodecError> for PollError {
    fn from(_: CodecError) -> Self {
        PollError::EncodingError
    }
}
