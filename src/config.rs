use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use mongodb::{Client as MongoClient, Database};
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::assistant::{Assistant, OpenAiBackend};
use crate::error::Result;
use crate::model::{
    db::user::{ensure_admin_exists, AdminSeed},
    mongodb::{ensure_counters_exist, ensure_indexes_exist, Coll},
};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    auth_ttl: u32,
    // secrets
    jwt_secret: String,
}

impl Config {
    /// Valid lifetime of auth token cookies in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// Secret key used to sign JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // secrets
    db_uri: String,
    #[serde(flatten)]
    seed: AdminSeed,
}

/// The production database name.
pub const DATABASE_NAME: &str = "ballotbox";

/// A fairing that loads the MongoDB config, connects to the database,
/// performs any setup necessary, and places both a `Client` and a `Database`
/// into managed state.
pub struct DatabaseFairing {
    /// Use this connection and database rather than the configured ones.
    existing: Option<(MongoClient, String)>,
}

impl DatabaseFairing {
    /// Connect to the configured database.
    pub fn new() -> Self {
        Self { existing: None }
    }

    /// Use an already-connected client and the named database.
    pub fn with_client(client: MongoClient, db_name: impl Into<String>) -> Self {
        Self {
            existing: Some((client, db_name.into())),
        }
    }
}

impl Default for DatabaseFairing {
    fn default() -> Self {
        Self::new()
    }
}

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        let (client, db_name) = match &self.existing {
            Some((client, db_name)) => (client.clone(), db_name.clone()),
            None => {
                info!("Loaded database config, connecting...");
                match MongoClient::with_uri_str(&config.db_uri).await {
                    Ok(client) => (client, DATABASE_NAME.to_string()),
                    Err(e) => {
                        error!("Failed to connect to database: {e}");
                        return Err(rocket);
                    }
                }
            }
        };
        let db = client.database(&db_name);

        if let Err(e) = prepare_database(&db, &config.seed).await {
            error!("Failed to prepare database: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        rocket = rocket.manage(client).manage(db);
        Ok(rocket)
    }
}

/// Create indexes and ID counters, and seed the admin account.
///
/// This operation is idempotent.
pub async fn prepare_database(db: &Database, seed: &AdminSeed) -> Result<()> {
    ensure_indexes_exist(db).await?;
    ensure_counters_exist(&Coll::from_db(db)).await?;
    if ensure_admin_exists(&Coll::from_db(db), &Coll::from_db(db), seed, Utc::now()).await? {
        info!("Created admin account '{}'", seed.admin_username);
    }
    Ok(())
}

/// Configuration for the conversational helper.
#[derive(Deserialize)]
struct AssistantConfig {
    // non-secrets
    #[serde(default)]
    assistant_enabled: bool,
    #[serde(default = "default_model")]
    assistant_model: String,
    #[serde(default = "default_endpoint")]
    assistant_endpoint: String,
    #[serde(default = "default_timeout")]
    assistant_timeout: u64,
    // secrets
    #[serde(default)]
    assistant_api_key: Option<String>,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_timeout() -> u64 {
    20
}

/// A fairing that loads the assistant config and places an [`Assistant`]
/// into managed state. A missing or unusable backend leaves the assistant
/// offline rather than stopping the server.
pub struct AssistantFairing;

#[rocket::async_trait]
impl Fairing for AssistantFairing {
    fn info(&self) -> Info {
        Info {
            name: "Assistant",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<AssistantConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load assistant config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        let assistant = match (config.assistant_enabled, config.assistant_api_key) {
            (false, _) => Assistant::offline(),
            (true, None) => {
                warn!("Assistant enabled but no API key set, using canned replies");
                Assistant::offline()
            }
            (true, Some(api_key)) => match OpenAiBackend::new(
                config.assistant_endpoint,
                api_key,
                config.assistant_model,
                StdDuration::from_secs(config.assistant_timeout),
            ) {
                Ok(backend) => {
                    info!("Assistant backend configured");
                    Assistant::new(Box::new(backend))
                }
                Err(e) => {
                    warn!("Failed to set up assistant backend, using canned replies: {e}");
                    Assistant::offline()
                }
            },
        };

        rocket = rocket.manage(assistant);
        Ok(rocket)
    }
}
