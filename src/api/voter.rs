use std::net::IpAddr;

use chrono::Utc;
use mongodb::{Client, Database};
use rocket::{response::status::Custom, serde::json::Json, Route, State};

use crate::{
    error::Result,
    logging::RequestId,
    model::{
        api::{
            auth::{AuthToken, Voter},
            progress::VoterProgress,
            vote::{VoteOutcome, VoteRequest},
        },
        common::election::ElectionId,
        db::{
            election::{self, Election},
            vote::{cast_vote, votes_by_voter, Ballot, Vote},
        },
        mongodb::Coll,
    },
    notifier::BroadcastNotifier,
};

pub fn routes() -> Vec<Route> {
    routes![vote, progress]
}

/// Cast the caller's vote. The body always says whether it worked and why not.
#[allow(clippy::too_many_arguments)]
#[post("/elections/<election_id>/vote", data = "<request>", format = "json")]
async fn vote(
    token: AuthToken<Voter>,
    election_id: ElectionId,
    request: Json<VoteRequest>,
    request_id: RequestId,
    client_ip: Option<IpAddr>,
    db_client: &State<Client>,
    db: &State<Database>,
    notifier: &State<BroadcastNotifier>,
) -> Custom<Json<VoteOutcome>> {
    let ballot = Ballot {
        voter_id: token.id,
        election_id,
        candidate_id: request.candidate_id,
        origin_address: client_ip.map(|ip| ip.to_string()),
    };

    match cast_vote(db_client, db, notifier.inner(), ballot, Utc::now()).await {
        Ok(vote) => {
            info!(
                "{request_id}: voter {} voted in election {election_id}",
                vote.voter_id
            );
            Custom(rocket::http::Status::Ok, Json(VoteOutcome::success()))
        }
        Err(err) => {
            let status = err.status();
            if status.code >= 500 {
                error!("{request_id}: vote in election {election_id} failed: {err}");
            } else {
                info!("{request_id}: vote in election {election_id} rejected: {err}");
            }
            Custom(status, Json(VoteOutcome::from(&err)))
        }
    }
}

/// The caller's voting history and what is still open to them.
#[get("/voter/progress")]
async fn progress(
    token: AuthToken<Voter>,
    elections: Coll<Election>,
    votes: Coll<Vote>,
) -> Result<Json<VoterProgress>> {
    let history = votes_by_voter(&votes, token.id).await?;
    let ids: Vec<_> = history.iter().map(|v| v.election_id).collect();
    let voted_in = election::elections_by_ids(&elections, &ids).await?;
    let active = election::list_active_elections(&elections, Utc::now()).await?;
    let total = elections.count_documents(None, None).await?;
    Ok(Json(VoterProgress::new(history, &voted_in, active, total)))
}

#[cfg(test)]
mod tests {
    use mongodb::{bson::doc, Database};
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::serde_json::{json, Value},
    };

    use crate::model::{
        api::{
            auth::{LoginCredentials, Registration},
            election::{CandidateSpec, ElectionDescription, ElectionSpec},
        },
        db::user::{NewUser, User},
    };

    use super::*;

    async fn post_json(client: &Client, uri: String, body: Value) -> (Status, Value) {
        let response = client
            .post(uri)
            .header(ContentType::JSON)
            .body(body.to_string())
            .dispatch()
            .await;
        let status = response.status();
        let body = response.into_json().await.unwrap_or(Value::Null);
        (status, body)
    }

    async fn log_in_as(client: &Client, credentials: LoginCredentials) {
        let (status, _) = post_json(
            client,
            uri!(crate::api::auth::login).to_string(),
            json!(credentials),
        )
        .await;
        assert_eq!(Status::Ok, status);
    }

    async fn register(client: &Client, registration: &Registration) {
        let (status, _) = post_json(
            client,
            uri!(crate::api::auth::register).to_string(),
            json!(registration),
        )
        .await;
        assert_eq!(Status::Ok, status);
    }

    async fn results(client: &Client, election_id: ElectionId) -> Value {
        client
            .get(uri!(crate::api::public::election_results(election_id)))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap()
    }

    async fn cast(client: &Client, election_id: ElectionId, candidate_id: u32) -> (Status, Value) {
        post_json(
            client,
            uri!(vote(election_id)).to_string(),
            json!({ "candidateId": candidate_id }),
        )
        .await
    }

    /// As the logged-in admin, create an election with Alice and Bob standing.
    async fn set_up_election(client: &Client, spec: ElectionSpec) -> ElectionDescription {
        let (status, election) = post_json(
            client,
            uri!(crate::api::admin::create_election).to_string(),
            json!(spec),
        )
        .await;
        assert_eq!(Status::Ok, status);
        let id = election["id"].as_u64().unwrap() as ElectionId;
        for candidate in [CandidateSpec::example1(), CandidateSpec::example2()] {
            let (status, _) = post_json(
                client,
                uri!(crate::api::admin::add_candidate(id)).to_string(),
                json!(candidate),
            )
            .await;
            assert_eq!(Status::Ok, status);
        }
        client
            .get(uri!(crate::api::public::get_election(id)))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap()
    }

    #[backend_test(admin)]
    async fn two_voters_one_vote_each(client: Client) {
        let election = set_up_election(&client, ElectionSpec::current_example()).await;
        let alice = election.candidates[0].id;
        let bob = election.candidates[1].id;

        register(&client, &Registration::example1()).await;
        register(&client, &Registration::example2()).await;

        log_in_as(&client, LoginCredentials::for_registration(&Registration::example1())).await;
        let (status, outcome) = cast(&client, election.id, alice).await;
        assert_eq!(Status::Ok, status);
        assert_eq!(outcome["success"], true);
        assert_eq!(
            results(&client, election.id).await,
            json!({ "Alice Able": 1, "Bob Baker": 0 })
        );

        let (status, outcome) = cast(&client, election.id, bob).await;
        assert_eq!(Status::Conflict, status);
        assert_eq!(outcome["success"], false);
        assert_eq!(
            outcome["message"],
            format!("You have already voted in election {}", election.id)
        );
        assert_eq!(
            results(&client, election.id).await,
            json!({ "Alice Able": 1, "Bob Baker": 0 })
        );

        log_in_as(&client, LoginCredentials::for_registration(&Registration::example2())).await;
        let (status, _) = cast(&client, election.id, bob).await;
        assert_eq!(Status::Ok, status);
        assert_eq!(
            results(&client, election.id).await,
            json!({ "Alice Able": 1, "Bob Baker": 1 })
        );
    }

    #[backend_test(admin)]
    async fn closed_and_bad_votes(client: Client) {
        let future = set_up_election(&client, ElectionSpec::future_example()).await;
        let past = set_up_election(&client, ElectionSpec::past_example()).await;
        let current = set_up_election(&client, ElectionSpec::current_example()).await;

        register(&client, &Registration::example1()).await;
        log_in_as(&client, LoginCredentials::for_registration(&Registration::example1())).await;

        for election in [&future, &past] {
            let (status, outcome) = cast(&client, election.id, election.candidates[0].id).await;
            assert_eq!(Status::Forbidden, status);
            assert_eq!(outcome["success"], false);
            assert_eq!(
                results(&client, election.id).await,
                json!({ "Alice Able": 0, "Bob Baker": 0 })
            );
        }

        let (status, _) = cast(&client, current.id, future.candidates[0].id).await;
        assert_eq!(Status::BadRequest, status);
        let (status, _) = cast(&client, 5555, current.candidates[0].id).await;
        assert_eq!(Status::NotFound, status);
    }

    #[backend_test]
    async fn voting_needs_login(client: Client) {
        let (status, _) = cast(&client, 1, 1).await;
        assert_eq!(Status::Unauthorized, status);
    }

    #[backend_test(voter)]
    async fn progress_tracks_votes(
        client: Client,
        db: Database,
        new_users: Coll<NewUser>,
        users: Coll<User>,
    ) {
        // Elections are set up by an admin, then the voter logs back in.
        new_users
            .insert_one(NewUser::admin_example(), None)
            .await
            .unwrap();
        log_in_as(
            &client,
            LoginCredentials {
                username: "coordinator".to_string(),
                password: "example_password".to_string(),
            },
        )
        .await;
        let first = set_up_election(&client, ElectionSpec::current_example()).await;
        let second = set_up_election(&client, ElectionSpec::current_example()).await;
        log_in_as(&client, LoginCredentials::for_registration(&Registration::example1())).await;

        let (status, _) = cast(&client, first.id, first.candidates[1].id).await;
        assert_eq!(Status::Ok, status);

        let response = client.get(uri!(progress)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let progress: VoterProgress = response.into_json().await.unwrap();
        assert_eq!(progress.total_votes_cast, 1);
        assert_eq!(progress.participated.len(), 1);
        assert_eq!(progress.participated[0].election.id, first.id);
        assert_eq!(progress.participated[0].candidate_id, first.candidates[1].id);
        assert_eq!(progress.pending, vec![second.id]);
        assert_eq!(progress.total_elections, 2);
        assert!((progress.participation_rate - 50.0).abs() < 1e-9);

        // The vote recorded where it came from.
        let voter = users
            .find_one(doc! { "username": "alice112" }, None)
            .await
            .unwrap()
            .unwrap();
        let vote = Coll::<Vote>::from_db(&db)
            .find_one(doc! { "voter_id": voter.id }, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(vote.session_token.len(), 32);
    }
}
