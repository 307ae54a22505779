use std::collections::BTreeMap;

use chrono::Utc;
use rocket::{
    response::stream::{Event, EventStream},
    serde::json::Json,
    tokio::{select, sync::broadcast::error::RecvError},
    Route, Shutdown, State,
};

use crate::{
    error::Result,
    model::{
        api::{
            auth::{AuthToken, Voter},
            election::{ElectionDescription, ElectionSummary},
        },
        common::election::ElectionId,
        db::{
            election::{self, Election},
            vote::{has_voted, Vote},
        },
        mongodb::Coll,
    },
    notifier::BroadcastNotifier,
};

pub fn routes() -> Vec<Route> {
    routes![list_elections, get_election, election_results, election_events]
}

/// Elections currently accepting votes, or with `?active=false`, every election.
#[get("/elections?<active>")]
async fn list_elections(
    active: Option<bool>,
    elections: Coll<Election>,
) -> Result<Json<Vec<ElectionSummary>>> {
    let list = if active.unwrap_or(true) {
        election::list_active_elections(&elections, Utc::now()).await?
    } else {
        election::list_elections(&elections).await?
    };
    Ok(Json(list.into_iter().map(Into::into).collect()))
}

#[get("/elections/<election_id>")]
pub async fn get_election(
    election_id: ElectionId,
    token: Option<AuthToken<Voter>>,
    elections: Coll<Election>,
    votes: Coll<Vote>,
) -> Result<Json<ElectionDescription>> {
    let found = election::get_election(&elections, election_id).await?;
    let mut description = ElectionDescription::from(found);
    if let Some(token) = token {
        description = description.with_has_voted(has_voted(&votes, token.id, election_id).await?);
    }
    Ok(Json(description))
}

/// `{candidateName: voteCount}`, counted live from committed votes.
#[get("/elections/<election_id>/results")]
pub async fn election_results(
    election_id: ElectionId,
    elections: Coll<Election>,
    votes: Coll<Vote>,
) -> Result<Json<BTreeMap<String, u64>>> {
    let results = election::get_results(&elections, &votes, election_id).await?;
    Ok(Json(results.by_name()))
}

/// A live stream of `vote` events for one election, until the server shuts down.
#[get("/elections/<election_id>/events")]
async fn election_events(
    election_id: ElectionId,
    elections: Coll<Election>,
    notifier: &State<BroadcastNotifier>,
    mut shutdown: Shutdown,
) -> Result<EventStream![]> {
    // 404 rather than an empty stream for unknown elections.
    election::get_election(&elections, election_id).await?;
    let mut receiver = notifier.subscribe();

    Ok(EventStream! {
        loop {
            let event = select! {
                event = receiver.recv() => match event {
                    Ok(event) => event,
                    Err(RecvError::Closed) => break,
                    Err(RecvError::Lagged(missed)) => {
                        warn!("Event stream for election {election_id} missed {missed} events");
                        continue;
                    }
                },
                _ = &mut shutdown => break,
            };
            if event.election_id == election_id {
                yield Event::json(&event).event("vote");
            }
        }
    })
}
