use chrono::{DateTime, Utc};
use mongodb::{
    bson::{doc, serde_helpers::chrono_datetime_as_bson_datetime, DateTime as BsonDateTime},
    options::FindOptions,
};
use rocket::futures::TryStreamExt;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    api::election::{CandidateSpec, ElectionResults, ElectionSpec},
    common::election::{CandidateId, ElectionId, ElectionWindow},
    db::{
        user::User,
        vote::{tally, Vote},
    },
    mongodb::{u32_id_filter, Coll, Counter, Id, CANDIDATE_ID_COUNTER, ELECTION_ID_COUNTER},
};

/// A candidate standing in exactly one election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// An election, with its candidates embedded in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: ElectionId,
    pub title: String,
    pub description: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end_time: DateTime<Utc>,
    /// Admins can close an election early, or reopen it.
    pub active: bool,
    pub created_by: Id,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    /// Set by the first vote; a locked election can't be modified or deleted.
    #[serde(default)]
    pub locked: bool,
    pub candidates: Vec<Candidate>,
}

impl Election {
    pub fn window(&self) -> ElectionWindow {
        ElectionWindow {
            start: self.start_time,
            end: self.end_time,
        }
    }

    /// Is the election accepting votes at `now`?
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.active && self.window().contains(now)
    }

    pub fn candidate(&self, candidate_id: CandidateId) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.id == candidate_id)
    }

    /// Check a vote for `candidate_id` would be accepted at `now`, ignoring
    /// whether the voter has already voted.
    pub fn check_votable(&self, candidate_id: CandidateId, now: DateTime<Utc>) -> Result<()> {
        if !self.is_open(now) {
            return Err(Error::ElectionClosed(self.id));
        }
        if self.candidate(candidate_id).is_none() {
            return Err(Error::InvalidCandidate {
                election_id: self.id,
                candidate_id,
            });
        }
        Ok(())
    }
}

/// Get the election with the given ID.
pub async fn get_election(elections: &Coll<Election>, election_id: ElectionId) -> Result<Election> {
    elections
        .find_one(u32_id_filter(election_id), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election with ID '{election_id}'")))
}

/// Get an election that may still be modified, or explain why it can't be.
async fn get_unlocked(elections: &Coll<Election>, election_id: ElectionId) -> Result<Election> {
    let election = get_election(elections, election_id).await?;
    if election.locked {
        Err(Error::ElectionLocked(election_id))
    } else {
        Ok(election)
    }
}

/// A filter matching the election only while no votes have been cast in it.
fn unlocked_filter(election_id: ElectionId) -> mongodb::bson::Document {
    doc! {
        "_id": election_id,
        "locked": false,
    }
}

/// Create a new, active election with no candidates.
pub async fn create_election(
    elections: &Coll<Election>,
    counters: &Coll<Counter>,
    users: &Coll<User>,
    spec: ElectionSpec,
    creator: Id,
    now: DateTime<Utc>,
) -> Result<Election> {
    spec.validate()?;
    let is_admin = users
        .find_one(creator.as_doc(), None)
        .await?
        .map_or(false, |user| user.is_admin);
    if !is_admin {
        return Err(Error::Unauthorized(
            "Only admins may create elections".to_string(),
        ));
    }

    let id = Counter::next(counters, ELECTION_ID_COUNTER).await?;
    let election = spec.into_election(id, creator, now)?;
    elections.insert_one(&election, None).await?;
    Ok(election)
}

/// Replace an election's title, description and window.
pub async fn modify_election(
    elections: &Coll<Election>,
    election_id: ElectionId,
    spec: ElectionSpec,
) -> Result<Election> {
    spec.validate()?;
    let update = doc! {
        "$set": {
            "title": &spec.title,
            "description": &spec.description,
            "start_time": BsonDateTime::from_chrono(spec.start_time),
            "end_time": BsonDateTime::from_chrono(spec.end_time),
        }
    };
    let result = elections
        .update_one(unlocked_filter(election_id), update, None)
        .await?;
    if result.matched_count == 0 {
        get_unlocked(elections, election_id).await?;
    }
    get_election(elections, election_id).await
}

/// Open or close an election. Allowed whether or not votes exist.
pub async fn set_active(
    elections: &Coll<Election>,
    election_id: ElectionId,
    active: bool,
) -> Result<()> {
    let result = elections
        .update_one(
            u32_id_filter(election_id),
            doc! { "$set": { "active": active } },
            None,
        )
        .await?;
    if result.matched_count == 0 {
        return Err(Error::not_found(format!("Election with ID '{election_id}'")));
    }
    Ok(())
}

/// Delete an election along with its embedded candidates.
pub async fn delete_election(elections: &Coll<Election>, election_id: ElectionId) -> Result<()> {
    let result = elections
        .delete_one(unlocked_filter(election_id), None)
        .await?;
    if result.deleted_count == 0 {
        get_unlocked(elections, election_id).await?;
        return Err(Error::StorageUnavailable(format!(
            "Election {election_id} changed while being deleted"
        )));
    }
    Ok(())
}

/// Add a candidate to an election. Timing doesn't matter, but the election
/// must not have votes yet, and candidate names are unique per election.
pub async fn add_candidate(
    elections: &Coll<Election>,
    counters: &Coll<Counter>,
    election_id: ElectionId,
    spec: CandidateSpec,
) -> Result<Candidate> {
    // Fail fast before consuming an ID.
    let election = get_unlocked(elections, election_id).await?;
    let name = spec.name.trim();
    if election.candidates.iter().any(|c| c.name == name) {
        return Err(duplicate_candidate(name, election_id));
    }

    let id = Counter::next(counters, CANDIDATE_ID_COUNTER).await?;
    let candidate = spec.into_candidate(id)?;
    let mut filter = unlocked_filter(election_id);
    filter.insert("candidates.name", doc! { "$ne": &candidate.name });
    let update = doc! {
        "$push": {
            "candidates": {
                "id": candidate.id,
                "name": &candidate.name,
                "description": &candidate.description,
            },
        }
    };
    let result = elections.update_one(filter, update, None).await?;
    if result.matched_count == 0 {
        // Something changed since we looked.
        get_unlocked(elections, election_id).await?;
        return Err(duplicate_candidate(&candidate.name, election_id));
    }
    Ok(candidate)
}

fn duplicate_candidate(name: &str, election_id: ElectionId) -> Error {
    Error::BadRequest(format!(
        "Candidate '{name}' already stands in election {election_id}"
    ))
}

/// Remove a candidate from an election that has no votes yet.
pub async fn remove_candidate(
    elections: &Coll<Election>,
    election_id: ElectionId,
    candidate_id: CandidateId,
) -> Result<()> {
    let mut filter = unlocked_filter(election_id);
    filter.insert("candidates.id", candidate_id);
    let update = doc! {
        "$pull": { "candidates": { "id": candidate_id } }
    };
    let result = elections.update_one(filter, update, None).await?;
    if result.matched_count == 0 {
        get_unlocked(elections, election_id).await?;
        return Err(Error::not_found(format!(
            "Candidate with ID '{candidate_id}' in election '{election_id}'"
        )));
    }
    Ok(())
}

fn by_start_time() -> FindOptions {
    FindOptions::builder()
        .sort(doc! { "start_time": 1, "_id": 1 })
        .build()
}

/// Elections accepting votes at `now`, earliest start first.
pub async fn list_active_elections(
    elections: &Coll<Election>,
    now: DateTime<Utc>,
) -> Result<Vec<Election>> {
    let now = BsonDateTime::from_chrono(now);
    let filter = doc! {
        "active": true,
        "start_time": { "$lte": now },
        "end_time": { "$gte": now },
    };
    Ok(elections
        .find(filter, by_start_time())
        .await?
        .try_collect()
        .await?)
}

/// Every election, earliest start first.
pub async fn list_elections(elections: &Coll<Election>) -> Result<Vec<Election>> {
    Ok(elections
        .find(None, by_start_time())
        .await?
        .try_collect()
        .await?)
}

/// The elections with the given IDs, in no particular order. Unknown IDs are skipped.
pub async fn elections_by_ids(
    elections: &Coll<Election>,
    ids: &[ElectionId],
) -> Result<Vec<Election>> {
    let filter = doc! { "_id": { "$in": ids } };
    Ok(elections.find(filter, None).await?.try_collect().await?)
}

/// Live per-candidate tallies, aggregated from committed votes.
pub async fn get_results(
    elections: &Coll<Election>,
    votes: &Coll<Vote>,
    election_id: ElectionId,
) -> Result<ElectionResults> {
    let election = get_election(elections, election_id).await?;
    let counts = tally(votes, election_id).await?;
    Ok(ElectionResults::new(&election, &counts))
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::db::user::NewUser;

    async fn insert_admin(new_users: &Coll<NewUser>) -> Id {
        let result = new_users
            .insert_one(NewUser::admin_example(), None)
            .await
            .unwrap();
        result.inserted_id.as_object_id().unwrap().into()
    }

    #[test]
    fn votability() {
        let now = Utc::now();
        let mut election = ElectionSpec::current_example()
            .into_election(1, Id::new(), now)
            .unwrap();
        election
            .candidates
            .push(CandidateSpec::example1().into_candidate(5).unwrap());

        assert!(election.check_votable(5, now).is_ok());
        assert!(matches!(
            election.check_votable(6, now),
            Err(Error::InvalidCandidate {
                election_id: 1,
                candidate_id: 6
            })
        ));

        election.active = false;
        assert!(matches!(
            election.check_votable(5, now),
            Err(Error::ElectionClosed(1))
        ));

        let future = ElectionSpec::future_example()
            .into_election(2, Id::new(), now)
            .unwrap();
        assert!(!future.is_open(now));
        assert!(future.is_open(future.start_time));
        assert!(future.is_open(future.end_time));
    }

    #[backend_test]
    async fn only_admins_create_elections(
        elections: Coll<Election>,
        counters: Coll<Counter>,
        users: Coll<User>,
        new_users: Coll<NewUser>,
    ) {
        let admin = insert_admin(&new_users).await;
        let election = create_election(
            &elections,
            &counters,
            &users,
            ElectionSpec::current_example(),
            admin,
            Utc::now(),
        )
        .await
        .unwrap();
        assert!(election.active);
        assert_eq!(get_election(&elections, election.id).await.unwrap(), election);

        let voter = NewUser {
            username: "plainvoter".to_string(),
            email: "plain@example.com".to_string(),
            is_admin: false,
            ..NewUser::admin_example()
        };
        let voter: Id = new_users
            .insert_one(voter, None)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap()
            .into();
        for creator in [voter, Id::new()] {
            assert!(matches!(
                create_election(
                    &elections,
                    &counters,
                    &users,
                    ElectionSpec::current_example(),
                    creator,
                    Utc::now(),
                )
                .await,
                Err(Error::Unauthorized(_))
            ));
        }

        let mut backwards = ElectionSpec::current_example();
        backwards.end_time = backwards.start_time;
        assert!(matches!(
            create_election(&elections, &counters, &users, backwards, admin, Utc::now()).await,
            Err(Error::InvalidWindow)
        ));
    }

    #[backend_test]
    async fn candidates_are_managed(
        elections: Coll<Election>,
        counters: Coll<Counter>,
        users: Coll<User>,
        new_users: Coll<NewUser>,
    ) {
        let admin = insert_admin(&new_users).await;
        // Candidates may be prepared before the election opens.
        let election = create_election(
            &elections,
            &counters,
            &users,
            ElectionSpec::future_example(),
            admin,
            Utc::now(),
        )
        .await
        .unwrap();

        let alice = add_candidate(&elections, &counters, election.id, CandidateSpec::example1())
            .await
            .unwrap();
        let bob = add_candidate(&elections, &counters, election.id, CandidateSpec::example2())
            .await
            .unwrap();
        assert_ne!(alice.id, bob.id);
        assert!(matches!(
            add_candidate(&elections, &counters, election.id, CandidateSpec::example1()).await,
            Err(Error::BadRequest(_))
        ));
        assert!(matches!(
            add_candidate(&elections, &counters, 999, CandidateSpec::example1()).await,
            Err(Error::NotFound(_))
        ));

        let stored = get_election(&elections, election.id).await.unwrap();
        assert_eq!(stored.candidates, vec![alice.clone(), bob.clone()]);

        remove_candidate(&elections, election.id, alice.id)
            .await
            .unwrap();
        assert!(matches!(
            remove_candidate(&elections, election.id, alice.id).await,
            Err(Error::NotFound(_))
        ));
        let stored = get_election(&elections, election.id).await.unwrap();
        assert_eq!(stored.candidates, vec![bob]);
    }

    #[backend_test]
    async fn locked_elections_are_frozen(
        elections: Coll<Election>,
        counters: Coll<Counter>,
        users: Coll<User>,
        new_users: Coll<NewUser>,
    ) {
        let admin = insert_admin(&new_users).await;
        let election = create_election(
            &elections,
            &counters,
            &users,
            ElectionSpec::current_example(),
            admin,
            Utc::now(),
        )
        .await
        .unwrap();
        let alice = add_candidate(&elections, &counters, election.id, CandidateSpec::example1())
            .await
            .unwrap();
        elections
            .update_one(
                u32_id_filter(election.id),
                doc! { "$set": { "locked": true } },
                None,
            )
            .await
            .unwrap();

        assert!(matches!(
            add_candidate(&elections, &counters, election.id, CandidateSpec::example2()).await,
            Err(Error::ElectionLocked(_))
        ));
        assert!(matches!(
            remove_candidate(&elections, election.id, alice.id).await,
            Err(Error::ElectionLocked(_))
        ));
        assert!(matches!(
            modify_election(&elections, election.id, ElectionSpec::future_example()).await,
            Err(Error::ElectionLocked(_))
        ));
        assert!(matches!(
            delete_election(&elections, election.id).await,
            Err(Error::ElectionLocked(_))
        ));

        // Opening and closing is still allowed.
        set_active(&elections, election.id, false).await.unwrap();
        assert!(!get_election(&elections, election.id).await.unwrap().active);
        set_active(&elections, election.id, true).await.unwrap();
        assert!(get_election(&elections, election.id).await.unwrap().active);
    }

    #[backend_test]
    async fn modify_and_delete(
        elections: Coll<Election>,
        counters: Coll<Counter>,
        users: Coll<User>,
        new_users: Coll<NewUser>,
    ) {
        let admin = insert_admin(&new_users).await;
        let election = create_election(
            &elections,
            &counters,
            &users,
            ElectionSpec::current_example(),
            admin,
            Utc::now(),
        )
        .await
        .unwrap();

        let spec = ElectionSpec::future_example();
        let modified = modify_election(&elections, election.id, spec.clone())
            .await
            .unwrap();
        assert_eq!(modified.title, spec.title);
        assert_eq!(modified.start_time, spec.start_time);
        assert_eq!(modified.end_time, spec.end_time);

        let mut backwards = spec;
        backwards.start_time = backwards.end_time;
        assert!(matches!(
            modify_election(&elections, election.id, backwards).await,
            Err(Error::InvalidWindow)
        ));

        delete_election(&elections, election.id).await.unwrap();
        assert!(matches!(
            get_election(&elections, election.id).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            delete_election(&elections, election.id).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            set_active(&elections, election.id, true).await,
            Err(Error::NotFound(_))
        ));
    }

    #[backend_test]
    async fn active_listing_is_ordered(
        elections: Coll<Election>,
        counters: Coll<Counter>,
        users: Coll<User>,
        new_users: Coll<NewUser>,
    ) {
        let admin = insert_admin(&new_users).await;
        let now = Utc::now();
        let mut create = Vec::new();
        for spec in [
            ElectionSpec::current_example(),
            ElectionSpec::future_example(),
            ElectionSpec::past_example(),
        ] {
            create.push(
                create_election(&elections, &counters, &users, spec, admin, now)
                    .await
                    .unwrap(),
            );
        }
        // Started earlier than the first, so should be listed before it.
        let mut earlier = ElectionSpec::current_example();
        earlier.start_time = earlier.start_time - chrono::Duration::minutes(5);
        let earlier = create_election(&elections, &counters, &users, earlier, admin, now)
            .await
            .unwrap();
        let closed = create_election(
            &elections,
            &counters,
            &users,
            ElectionSpec::current_example(),
            admin,
            now,
        )
        .await
        .unwrap();
        set_active(&elections, closed.id, false).await.unwrap();

        let active: Vec<_> = list_active_elections(&elections, now)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(active, vec![earlier.id, create[0].id]);

        let all = list_elections(&elections).await.unwrap();
        assert_eq!(all.len(), 5);
        assert_eq!(all[0].id, create[2].id);
        assert_eq!(all.last().unwrap().id, create[1].id);
    }
}
