use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::model::common::election::CandidateId;

/// The body of a vote request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub candidate_id: CandidateId,
}

/// The outcome of a vote request, reported as JSON whether or not it succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteOutcome {
    pub success: bool,
    pub message: String,
}

impl VoteOutcome {
    pub const SUCCESS_MESSAGE: &'static str = "Vote cast successfully!";

    pub fn success() -> Self {
        Self {
            success: true,
            message: Self::SUCCESS_MESSAGE.to_string(),
        }
    }
}

impl From<&Error> for VoteOutcome {
    fn from(err: &Error) -> Self {
        // Don't leak storage internals to voters.
        let message = match err {
            Error::Db(_) | Error::Jwt(_) | Error::Argon2(_) => {
                "Your vote could not be recorded, please try again".to_string()
            }
            other => other.to_string(),
        };
        Self {
            success: false,
            message,
        }
    }
}
