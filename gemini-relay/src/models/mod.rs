pub mod candidate;
pub mod relay;

pub use candidate::{CandidateList, EmptyCandidateList};
pub use relay::RelayRequest;
