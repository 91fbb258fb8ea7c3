mod manager;

pub use manager::{VerifyVoteError, VoteManager};
