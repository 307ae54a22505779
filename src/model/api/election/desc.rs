use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    common::election::{CandidateId, ElectionId},
    db::election::{Candidate, Election},
};

/// An API-friendly election description, including its candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionDescription {
    pub id: ElectionId,
    pub title: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    /// Whether votes exist, so the election can no longer be edited.
    pub locked: bool,
    /// Candidates in the order they were added.
    pub candidates: Vec<CandidateDescription>,
    /// Whether the requesting user has voted; absent for anonymous requests.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub has_voted: Option<bool>,
}

impl ElectionDescription {
    /// Record whether the requesting user has voted.
    pub fn with_has_voted(mut self, has_voted: bool) -> Self {
        self.has_voted = Some(has_voted);
        self
    }
}

impl From<Election> for ElectionDescription {
    fn from(election: Election) -> Self {
        Self {
            id: election.id,
            title: election.title,
            description: election.description,
            start_time: election.start_time,
            end_time: election.end_time,
            active: election.active,
            created_at: election.created_at,
            locked: election.locked,
            candidates: election.candidates.into_iter().map(Into::into).collect(),
            has_voted: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDescription {
    pub id: CandidateId,
    pub name: String,
    pub description: String,
}

impl From<Candidate> for CandidateDescription {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id,
            name: candidate.name,
            description: candidate.description,
        }
    }
}

/// A summary of an election, shorter than the full `ElectionDescription`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionSummary {
    pub id: ElectionId,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub active: bool,
    pub candidate_count: usize,
}

impl From<&Election> for ElectionSummary {
    fn from(election: &Election) -> Self {
        Self {
            id: election.id,
            title: election.title.clone(),
            start_time: election.start_time,
            end_time: election.end_time,
            active: election.active,
            candidate_count: election.candidates.len(),
        }
    }
}

impl From<Election> for ElectionSummary {
    fn from(election: Election) -> Self {
        (&election).into()
    }
}
