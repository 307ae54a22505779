use argon2::Error as Argon2Error;
use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use mongodb::error::Error as DbError;
use rocket::{http::Status, response::Responder};
use thiserror::Error;

use crate::model::common::election::{CandidateId, ElectionId};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Argon2(#[from] Argon2Error),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Election must start before it ends")]
    InvalidWindow,
    #[error("Candidate {candidate_id} does not stand in election {election_id}")]
    InvalidCandidate {
        election_id: ElectionId,
        candidate_id: CandidateId,
    },
    #[error("Election {0} is not open for voting")]
    ElectionClosed(ElectionId),
    #[error("You have already voted in election {0}")]
    AlreadyVoted(ElectionId),
    #[error("Election {0} already has votes and can no longer be modified")]
    ElectionLocked(ElectionId),
    #[error("Username already in use: {0}")]
    DuplicateUsername(String),
    #[error("Email already in use: {0}")]
    DuplicateEmail(String),
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl Error {
    /// Shorthand for a [`Error::NotFound`] describing what was missing.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// The HTTP status that best describes this error.
    pub fn status(&self) -> Status {
        match self {
            Self::BadRequest(_) | Self::InvalidWindow | Self::InvalidCandidate { .. } => {
                Status::BadRequest
            }
            Self::NotFound(_) => Status::NotFound,
            Self::Unauthorized(_) | Self::InvalidCredentials => Status::Unauthorized,
            Self::ElectionClosed(_) => Status::Forbidden,
            Self::AlreadyVoted(_)
            | Self::ElectionLocked(_)
            | Self::DuplicateUsername(_)
            | Self::DuplicateEmail(_) => Status::Conflict,
            Self::StorageUnavailable(_) => Status::ServiceUnavailable,
            Self::Db(_) | Self::Argon2(_) => Status::InternalServerError,
            Self::Jwt(err) => match err.kind() {
                JwtErrorKind::ExpiredSignature | JwtErrorKind::ImmatureSignature => {
                    Status::Unauthorized
                }
                _ => Status::BadRequest,
            },
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, _: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        if status.code >= 500 {
            error!("{self}");
        } else {
            debug!("{self}");
        }
        Err(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_statuses() {
        assert_eq!(Error::InvalidWindow.status(), Status::BadRequest);
        assert_eq!(
            Error::InvalidCandidate {
                election_id: 1,
                candidate_id: 2
            }
            .status(),
            Status::BadRequest
        );
        assert_eq!(Error::not_found("Election 7").status(), Status::NotFound);
        assert_eq!(Error::InvalidCredentials.status(), Status::Unauthorized);
        assert_eq!(Error::ElectionClosed(1).status(), Status::Forbidden);
        assert_eq!(Error::AlreadyVoted(1).status(), Status::Conflict);
        assert_eq!(Error::ElectionLocked(1).status(), Status::Conflict);
        assert_eq!(
            Error::DuplicateEmail("a@b.com".to_string()).status(),
            Status::Conflict
        );
        assert_eq!(
            Error::StorageUnavailable("busy".to_string()).status(),
            Status::ServiceUnavailable
        );
    }

    #[test]
    fn messages_are_human_readable() {
        assert_eq!(
            Error::AlreadyVoted(3).to_string(),
            "You have already voted in election 3"
        );
        assert_eq!(
            Error::ElectionClosed(3).to_string(),
            "Election 3 is not open for voting"
        );
    }
}
