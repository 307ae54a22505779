use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::model::{
    common::election::{CandidateId, ElectionId},
    db::election::Election,
};

/// The live vote count for one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateTally {
    pub candidate_id: CandidateId,
    pub name: String,
    pub votes: u64,
}

/// Per-candidate tallies for an election, derived from committed votes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionResults {
    pub election_id: ElectionId,
    /// One entry per candidate, in the order candidates were added.
    pub tallies: Vec<CandidateTally>,
}

impl ElectionResults {
    /// Combine an election's candidates with raw per-candidate vote counts.
    /// Candidates without votes get zero; counts for unknown candidates are dropped.
    pub fn new(election: &Election, counts: &HashMap<CandidateId, u64>) -> Self {
        let tallies = election
            .candidates
            .iter()
            .map(|candidate| CandidateTally {
                candidate_id: candidate.id,
                name: candidate.name.clone(),
                votes: counts.get(&candidate.id).copied().unwrap_or(0),
            })
            .collect();
        Self {
            election_id: election.id,
            tallies,
        }
    }

    /// Total votes across all candidates.
    pub fn total_votes(&self) -> u64 {
        self.tallies.iter().map(|t| t.votes).sum()
    }

    /// Votes for the named candidate, if they stand in this election.
    pub fn votes_for(&self, name: &str) -> Option<u64> {
        self.tallies.iter().find(|t| t.name == name).map(|t| t.votes)
    }

    /// The `{candidateName: voteCount}` view exposed over the API.
    pub fn by_name(&self) -> BTreeMap<String, u64> {
        self.tallies
            .iter()
            .map(|t| (t.name.clone(), t.votes))
            .collect()
    }
}
