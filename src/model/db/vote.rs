use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use data_encoding::HEXLOWER;
use mongodb::{
    bson::{doc, serde_helpers::chrono_datetime_as_bson_datetime, DateTime as BsonDateTime},
    error::UNKNOWN_TRANSACTION_COMMIT_RESULT,
    options::FindOptions,
    Client, ClientSession, Database,
};
use rand::Rng;
use rocket::futures::TryStreamExt;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::election::{CandidateId, ElectionId},
    db::{
        election::{get_election, Election},
        user::User,
    },
    mongodb::{is_duplicate_key_error, is_transient_transaction_error, transaction, Coll, Id},
};
use crate::notifier::{VoteEvent, VoteNotifier};

/// Core vote data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCore {
    pub voter_id: Id,
    pub election_id: ElectionId,
    pub candidate_id: CandidateId,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub cast_at: DateTime<Utc>,
    /// The client's address, if known.
    pub origin_address: Option<String>,
    /// Random, per-vote token.
    pub session_token: String,
}

impl VoteCore {
    /// Create a new vote with a fresh session token.
    pub fn new(
        voter_id: Id,
        election_id: ElectionId,
        candidate_id: CandidateId,
        origin_address: Option<String>,
        cast_at: DateTime<Utc>,
    ) -> Self {
        let token: [u8; 16] = rand::thread_rng().gen();
        Self {
            voter_id,
            election_id,
            candidate_id,
            cast_at,
            origin_address,
            session_token: HEXLOWER.encode(&token),
        }
    }
}

/// A vote without an ID.
pub type NewVote = VoteCore;

/// A vote from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub vote: VoteCore,
}

impl Deref for Vote {
    type Target = VoteCore;

    fn deref(&self) -> &Self::Target {
        &self.vote
    }
}

impl DerefMut for Vote {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.vote
    }
}

/// A voter's choice in one election.
#[derive(Debug, Clone)]
pub struct Ballot {
    pub voter_id: Id,
    pub election_id: ElectionId,
    pub candidate_id: CandidateId,
    pub origin_address: Option<String>,
}

/// Record a vote, at most once per voter and election.
///
/// Uniqueness is enforced by the unique `(voter_id, election_id)` index, not by
/// looking first, so concurrent casts for the same pair commit exactly once.
/// The vote runs in a transaction that also locks the election against
/// modification; transient conflicts are retried a bounded number of times.
/// On success the notifier hears about the candidate's new total.
pub async fn cast_vote(
    db_client: &Client,
    db: &Database,
    notifier: &dyn VoteNotifier,
    ballot: Ballot,
    now: DateTime<Utc>,
) -> Result<Vote> {
    let users = Coll::<User>::from_db(db);
    let elections = Coll::<Election>::from_db(db);
    let votes = Coll::<Vote>::from_db(db);

    if users.find_one(ballot.voter_id.as_doc(), None).await?.is_none() {
        return Err(Error::Unauthorized("Unknown voter".to_string()));
    }
    let election = get_election(&elections, ballot.election_id).await?;
    election.check_votable(ballot.candidate_id, now)?;

    let new_vote = NewVote::new(
        ballot.voter_id,
        ballot.election_id,
        ballot.candidate_id,
        ballot.origin_address,
        now,
    );

    let mut attempt = 1;
    let id = loop {
        let mut session = transaction::begin(db_client).await?;
        let result = match record(&mut session, db, &new_vote, now).await {
            Ok(id) => transaction::commit(&mut session)
                .await
                .map(|_| id)
                .map_err(Error::from),
            Err(err) => {
                transaction::abort(&mut session).await;
                Err(err)
            }
        };

        match result {
            Ok(id) => break id,
            Err(Error::Db(err)) if err.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT) => {
                warn!("Vote commit outcome unknown, checking what was stored: {err}");
                let stored = find_vote(&votes, ballot.voter_id, ballot.election_id).await?;
                break settle_uncertain_vote(&new_vote, stored)?;
            }
            Err(Error::AlreadyVoted(_)) if attempt > 1 => {
                // An earlier attempt may have committed after all.
                let stored = find_vote(&votes, ballot.voter_id, ballot.election_id).await?;
                break settle_uncertain_vote(&new_vote, stored)?;
            }
            Err(Error::Db(err)) if transaction::should_retry(&err, attempt) => {
                debug!("Vote transaction conflicted (attempt {attempt}): {err}");
                transaction::back_off(attempt).await;
                attempt += 1;
            }
            Err(Error::Db(err)) if is_transient_transaction_error(&err) => {
                // Out of attempts: if a concurrent cast for the same pair won, say so.
                return if has_voted(&votes, ballot.voter_id, ballot.election_id).await? {
                    Err(Error::AlreadyVoted(ballot.election_id))
                } else {
                    warn!("Giving up on vote after {attempt} attempts: {err}");
                    Err(Error::StorageUnavailable(
                        "Too many concurrent votes, please try again".to_string(),
                    ))
                };
            }
            Err(Error::ElectionClosed(_)) => {
                // The election changed under us; report against its current state.
                let election = get_election(&elections, ballot.election_id).await?;
                election.check_votable(ballot.candidate_id, now)?;
                return Err(Error::StorageUnavailable(
                    "Election changed while voting, please try again".to_string(),
                ));
            }
            Err(err) => return Err(err),
        }
    };

    let vote = Vote { id, vote: new_vote };
    // The vote is committed whatever happens from here on.
    match candidate_total(&votes, vote.election_id, vote.candidate_id).await {
        Ok(candidate_total) => notifier.notify(VoteEvent {
            election_id: vote.election_id,
            candidate_id: vote.candidate_id,
            candidate_total,
        }),
        Err(err) => warn!("Vote recorded but not announced: {err}"),
    }
    Ok(vote)
}

/// The body of the vote transaction: lock the election if it is still open
/// for this candidate, then insert the vote.
async fn record(
    session: &mut ClientSession,
    db: &Database,
    new_vote: &NewVote,
    now: DateTime<Utc>,
) -> Result<Id> {
    let now = BsonDateTime::from_chrono(now);
    let open_filter = doc! {
        "_id": new_vote.election_id,
        "active": true,
        "start_time": { "$lte": now },
        "end_time": { "$gte": now },
        "candidates.id": new_vote.candidate_id,
    };
    let lock = doc! { "$set": { "locked": true } };
    let locked = Coll::<Election>::from_db(db)
        .update_one_with_session(open_filter, lock, None, session)
        .await?;
    if locked.matched_count == 0 {
        return Err(Error::ElectionClosed(new_vote.election_id));
    }

    match Coll::<NewVote>::from_db(db)
        .insert_one_with_session(new_vote, None, session)
        .await
    {
        // Unwrap safe because `_id` is always generated as an ObjectId.
        Ok(result) => Ok(result.inserted_id.as_object_id().unwrap().into()),
        Err(err) if is_duplicate_key_error(&err) => {
            Err(Error::AlreadyVoted(new_vote.election_id))
        }
        Err(err) => Err(err.into()),
    }
}

/// Decide the outcome of a cast whose commit may or may not have happened,
/// given whatever is stored for the voter and election. Only a vote carrying
/// this cast's session token is ours.
fn settle_uncertain_vote(new_vote: &NewVote, stored: Option<Vote>) -> Result<Id> {
    match stored {
        Some(vote) if vote.session_token == new_vote.session_token => Ok(vote.id),
        Some(_) => Err(Error::AlreadyVoted(new_vote.election_id)),
        None => Err(Error::StorageUnavailable(
            "Vote could not be confirmed, please try again".to_string(),
        )),
    }
}

/// The vote cast by this voter in this election, if any.
pub async fn find_vote(
    votes: &Coll<Vote>,
    voter_id: Id,
    election_id: ElectionId,
) -> Result<Option<Vote>> {
    let filter = doc! {
        "voter_id": voter_id,
        "election_id": election_id,
    };
    Ok(votes.find_one(filter, None).await?)
}

/// Committed votes for one candidate.
pub async fn candidate_total(
    votes: &Coll<Vote>,
    election_id: ElectionId,
    candidate_id: CandidateId,
) -> Result<u64> {
    let filter = doc! {
        "election_id": election_id,
        "candidate_id": candidate_id,
    };
    Ok(votes.count_documents(filter, None).await?)
}

/// One row of the tally aggregation.
#[derive(Deserialize)]
struct CandidateCount {
    #[serde(rename = "_id")]
    candidate_id: CandidateId,
    count: u64,
}

/// Committed votes per candidate in an election. Candidates without votes are absent.
pub async fn tally(
    votes: &Coll<Vote>,
    election_id: ElectionId,
) -> Result<HashMap<CandidateId, u64>> {
    let pipeline = [
        doc! { "$match": { "election_id": election_id } },
        doc! { "$group": { "_id": "$candidate_id", "count": { "$sum": 1 } } },
    ];
    let mut counts = HashMap::new();
    let mut cursor = votes.aggregate(pipeline, None).await?;
    while let Some(row) = cursor.try_next().await? {
        let row: CandidateCount = mongodb::bson::from_document(row)
            .map_err(|e| Error::StorageUnavailable(format!("Malformed tally: {e}")))?;
        counts.insert(row.candidate_id, row.count);
    }
    Ok(counts)
}

/// Every vote cast by a voter, oldest first.
pub async fn votes_by_voter(votes: &Coll<Vote>, voter_id: Id) -> Result<Vec<Vote>> {
    let options = FindOptions::builder().sort(doc! { "cast_at": 1 }).build();
    Ok(votes
        .find(doc! { "voter_id": voter_id }, options)
        .await?
        .try_collect()
        .await?)
}

/// Has this voter voted in this election?
pub async fn has_voted(votes: &Coll<Vote>, voter_id: Id, election_id: ElectionId) -> Result<bool> {
    Ok(find_vote(votes, voter_id, election_id).await?.is_some())
}
