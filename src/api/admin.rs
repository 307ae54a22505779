use chrono::Utc;
use rocket::{serde::json::Json, Route};

use crate::{
    error::Result,
    model::{
        api::{
            admin::AdminDashboard,
            auth::{Admin, AuthToken},
            election::{CandidateDescription, CandidateSpec, ElectionDescription, ElectionSpec},
        },
        common::election::{CandidateId, ElectionId},
        db::{
            election::{self, Election},
            user::{list_users, User},
            vote::Vote,
        },
        mongodb::{Coll, Counter},
    },
};

pub fn routes() -> Vec<Route> {
    routes![
        create_election,
        modify_election,
        open_election,
        close_election,
        delete_election,
        add_candidate,
        remove_candidate,
        dashboard,
    ]
}

#[post("/elections", data = "<spec>", format = "json")]
pub async fn create_election(
    token: AuthToken<Admin>,
    spec: Json<ElectionSpec>,
    elections: Coll<Election>,
    counters: Coll<Counter>,
    users: Coll<User>,
) -> Result<Json<ElectionDescription>> {
    let election = election::create_election(
        &elections,
        &counters,
        &users,
        spec.into_inner(),
        token.id,
        Utc::now(),
    )
    .await?;
    info!("Admin {} created election {}", token.id, election.id);
    Ok(Json(election.into()))
}

#[put("/elections/<election_id>", data = "<spec>", format = "json")]
async fn modify_election(
    _token: AuthToken<Admin>,
    election_id: ElectionId,
    spec: Json<ElectionSpec>,
    elections: Coll<Election>,
) -> Result<Json<ElectionDescription>> {
    let election = election::modify_election(&elections, election_id, spec.into_inner()).await?;
    Ok(Json(election.into()))
}

#[post("/elections/<election_id>/open")]
async fn open_election(
    _token: AuthToken<Admin>,
    election_id: ElectionId,
    elections: Coll<Election>,
) -> Result<()> {
    election::set_active(&elections, election_id, true).await
}

#[post("/elections/<election_id>/close")]
async fn close_election(
    _token: AuthToken<Admin>,
    election_id: ElectionId,
    elections: Coll<Election>,
) -> Result<()> {
    election::set_active(&elections, election_id, false).await
}

#[delete("/elections/<election_id>")]
async fn delete_election(
    token: AuthToken<Admin>,
    election_id: ElectionId,
    elections: Coll<Election>,
) -> Result<()> {
    election::delete_election(&elections, election_id).await?;
    info!("Admin {} deleted election {election_id}", token.id);
    Ok(())
}

#[post("/elections/<election_id>/candidates", data = "<spec>", format = "json")]
pub async fn add_candidate(
    _token: AuthToken<Admin>,
    election_id: ElectionId,
    spec: Json<CandidateSpec>,
    elections: Coll<Election>,
    counters: Coll<Counter>,
) -> Result<Json<CandidateDescription>> {
    let candidate =
        election::add_candidate(&elections, &counters, election_id, spec.into_inner()).await?;
    Ok(Json(candidate.into()))
}

#[delete("/elections/<election_id>/candidates/<candidate_id>")]
async fn remove_candidate(
    _token: AuthToken<Admin>,
    election_id: ElectionId,
    candidate_id: CandidateId,
    elections: Coll<Election>,
) -> Result<()> {
    election::remove_candidate(&elections, election_id, candidate_id).await
}

#[get("/admin/dashboard")]
async fn dashboard(
    _token: AuthToken<Admin>,
    elections: Coll<Election>,
    users: Coll<User>,
    votes: Coll<Vote>,
) -> Result<Json<AdminDashboard>> {
    let elections = election::list_elections(&elections).await?;
    let users = list_users(&users).await?;
    let total_votes = votes.count_documents(None, None).await?;
    Ok(Json(AdminDashboard {
        elections: elections.into_iter().map(Into::into).collect(),
        users: users.into_iter().map(Into::into).collect(),
        total_votes,
    }))
}
