use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::election::{CandidateId, ElectionId, ElectionWindow},
    db::election::{Candidate, Election},
    mongodb::Id,
};

/// An election specification, as submitted by an admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionSpec {
    /// Election title.
    pub title: String,
    /// Free-text description.
    pub description: String,
    /// Voting opens.
    pub start_time: DateTime<Utc>,
    /// Voting closes.
    pub end_time: DateTime<Utc>,
}

impl ElectionSpec {
    /// Check the spec describes a usable election, returning its window.
    pub fn validate(&self) -> Result<ElectionWindow> {
        if self.title.trim().is_empty() {
            return Err(Error::BadRequest("Election title must not be empty".to_string()));
        }
        ElectionWindow::new(self.start_time, self.end_time).ok_or(Error::InvalidWindow)
    }

    /// Convert this spec into a new, active election with no candidates.
    pub fn into_election(
        self,
        id: ElectionId,
        created_by: Id,
        created_at: DateTime<Utc>,
    ) -> Result<Election> {
        self.validate()?;
        Ok(Election {
            id,
            title: self.title,
            description: self.description,
            start_time: self.start_time,
            end_time: self.end_time,
            active: true,
            created_by,
            created_at,
            locked: false,
            candidates: Vec::new(),
        })
    }
}

/// A candidate specification, as submitted by an admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSpec {
    /// Candidate name, unique within the election.
    pub name: String,
    /// Optional free-text description.
    #[serde(default)]
    pub description: String,
}

impl CandidateSpec {
    /// Convert this spec into a candidate with the given unique ID.
    pub fn into_candidate(self, id: CandidateId) -> Result<Candidate> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(Error::BadRequest("Candidate name must not be empty".to_string()));
        }
        Ok(Candidate {
            id,
            name: name.to_string(),
            description: self.description,
        })
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    use chrono::{Duration, SubsecRound};

    impl ElectionSpec {
        /// Open for the next hour.
        pub fn current_example() -> Self {
            // Storage keeps millisecond precision only.
            let start_time = Utc::now().trunc_subsecs(3) - Duration::minutes(1);
            Self {
                title: "Student Council".to_string(),
                description: "Pick next year's council president.".to_string(),
                start_time,
                end_time: start_time + Duration::hours(1),
            }
        }

        /// Opens tomorrow.
        pub fn future_example() -> Self {
            let start_time = Utc::now().trunc_subsecs(3) + Duration::days(1);
            Self {
                title: "Department Poll".to_string(),
                description: "Choose the new lab opening hours.".to_string(),
                start_time,
                end_time: start_time + Duration::days(3),
            }
        }

        /// Closed yesterday.
        pub fn past_example() -> Self {
            let end_time = Utc::now().trunc_subsecs(3) - Duration::days(1);
            Self {
                title: "Quick Survey".to_string(),
                description: "Favourite campus cafe.".to_string(),
                start_time: end_time - Duration::hours(48),
                end_time,
            }
        }
    }

    impl CandidateSpec {
        pub fn example1() -> Self {
            Self {
                name: "Alice Able".to_string(),
                description: "Fourth-year engineering student.".to_string(),
            }
        }

        pub fn example2() -> Self {
            Self {
                name: "Bob Baker".to_string(),
                description: String::new(),
            }
        }
    }
}
