use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::election::ElectionSummary,
    common::election::{CandidateId, ElectionId},
    db::{election::Election, vote::Vote},
};

/// One election a voter took part in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participation {
    pub election: ElectionSummary,
    pub candidate_id: CandidateId,
    pub voted_at: DateTime<Utc>,
}

/// A voter's history and what is still open to them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoterProgress {
    /// Elections voted in, most recent vote first.
    pub participated: Vec<Participation>,
    /// Elections currently accepting votes.
    pub active_elections: Vec<ElectionSummary>,
    /// Active elections the voter hasn't voted in yet.
    pub pending: Vec<ElectionId>,
    pub total_elections: u64,
    pub total_votes_cast: u64,
    /// Share of all elections the voter took part in, as a percentage.
    pub participation_rate: f64,
}

impl VoterProgress {
    /// Assemble progress from the voter's votes, the elections they refer to,
    /// the currently active elections, and the total number of elections.
    pub fn new(
        mut votes: Vec<Vote>,
        voted_elections: &[Election],
        active: Vec<Election>,
        total_elections: u64,
    ) -> Self {
        votes.sort_by(|a, b| b.cast_at.cmp(&a.cast_at));
        let participated: Vec<_> = votes
            .iter()
            .filter_map(|vote| {
                voted_elections
                    .iter()
                    .find(|e| e.id == vote.election_id)
                    .map(|election| Participation {
                        election: election.into(),
                        candidate_id: vote.candidate_id,
                        voted_at: vote.cast_at,
                    })
            })
            .collect();
        let pending = active
            .iter()
            .filter(|e| !votes.iter().any(|v| v.election_id == e.id))
            .map(|e| e.id)
            .collect();
        let participation_rate = if total_elections > 0 {
            participated.len() as f64 / total_elections as f64 * 100.0
        } else {
            0.0
        };

        Self {
            total_votes_cast: votes.len() as u64,
            participated,
            active_elections: active.into_iter().map(Into::into).collect(),
            pending,
            total_elections,
            participation_rate,
        }
    }
}
