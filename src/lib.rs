#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use mongodb::Client;
use rocket::{Build, Rocket};

use crate::config::{AssistantFairing, ConfigFairing, DatabaseFairing};
use crate::logging::LoggerFairing;
use crate::notifier::BroadcastNotifier;

pub mod api;
pub mod assistant;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod notifier;

pub use config::Config;

/// Build the server, connecting to the configured database.
pub fn build() -> Rocket<Build> {
    assemble(DatabaseFairing::new(), BroadcastNotifier::new())
}

/// Build the server against an existing client and database, with the given notifier.
pub fn rocket_for_db_and_notifier(
    db_client: Client,
    db_name: &str,
    notifier: BroadcastNotifier,
) -> Rocket<Build> {
    assemble(DatabaseFairing::with_client(db_client, db_name), notifier)
}

fn assemble(database: DatabaseFairing, notifier: BroadcastNotifier) -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(database)
        .attach(AssistantFairing)
        .manage(notifier)
}

/// A client for the database named in the config, for tests.
///
/// Fails fast when no server is reachable.
#[cfg(test)]
pub(crate) async fn db_client() -> Client {
    use mongodb::options::ClientOptions;

    let db_uri: String = rocket::Config::figment()
        .extract_inner("db_uri")
        .expect("`db_uri` not set");
    let mut options = ClientOptions::parse(&db_uri).await.unwrap();
    options.server_selection_timeout = Some(std::time::Duration::from_secs(2));
    Client::with_options(options).unwrap()
}

/// Is the test database server up?
#[cfg(test)]
pub(crate) async fn db_reachable(db_client: &Client) -> bool {
    use mongodb::bson::doc;

    db_client
        .database("admin")
        .run_command(doc! { "ping": 1 }, None)
        .await
        .is_ok()
}

/// Set to `1` or `true` to skip database tests when no server is reachable.
#[cfg(test)]
pub(crate) const SKIP_DB_TESTS_VAR: &str = "BALLOTBOX_SKIP_DB_TESTS";

/// Has the tester asked for database tests to be skipped without a server?
#[cfg(test)]
pub(crate) fn db_tests_skipped() -> bool {
    skip_requested(std::env::var(SKIP_DB_TESTS_VAR).ok().as_deref())
}

#[cfg(test)]
fn skip_requested(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("1" | "true" | "yes")
    )
}

/// A fresh database name, so tests don't collide.
#[cfg(test)]
pub(crate) fn database() -> String {
    let random: u32 = rand::random();
    format!("test{random}")
}
