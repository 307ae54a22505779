//! Prepare an election database and make sure it has an administrator.
//! Settings come from `Rocket.toml` and `ROCKET_*` variables, exactly as for
//! the server, and can be overridden on the command line.

use clap::{Arg, ArgAction, ArgMatches, Command};
use mongodb::Client;
use thiserror::Error;

use ballotbox_backend::{
    config::{prepare_database, DATABASE_NAME},
    model::db::user::AdminSeed,
};

const PROGRAM_NAME: &str = "ballotbox-admin";

const ABOUT_TEXT: &str = "Create indexes and counters in the election database, \
and create an admin account unless one already exists.

EXIT CODES:
     0: Database ready.
 Other: Error.";

const DB_URI: &str = "DB_URI";
const DATABASE: &str = "DATABASE";
const USERNAME: &str = "USERNAME";
const EMAIL: &str = "EMAIL";
const PASSWORD: &str = "PASSWORD";

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    clap::command!(PROGRAM_NAME)
        .about(ABOUT_TEXT)
        .arg(
            Arg::new(DB_URI)
                .long("db-uri")
                .help("MongoDB connection string, instead of `db_uri` from the config")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new(DATABASE)
                .long("database")
                .help("Database to prepare")
                .default_value(DATABASE_NAME)
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new(USERNAME)
                .long("username")
                .help("Admin username, instead of `admin_username` from the config")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new(EMAIL)
                .long("email")
                .help("Admin email, instead of `admin_email` from the config")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new(PASSWORD)
                .long("password")
                .help("Admin password, instead of `admin_password` from the config")
                .action(ArgAction::Set),
        )
}

/// Errors that this program may produce.
#[derive(Debug, Error)]
enum Error {
    #[error("Bad configuration: {0}")]
    Config(#[from] rocket::figment::Error),
    #[error("Failed to connect: {0}")]
    Connect(#[from] mongodb::error::Error),
    #[error(transparent)]
    Backend(#[from] ballotbox_backend::error::Error),
}

/// Settings after applying command line overrides.
struct Settings {
    db_uri: String,
    database: String,
    seed: AdminSeed,
}

impl Settings {
    fn new(matches: &ArgMatches) -> Result<Self, Error> {
        let figment = rocket::Config::figment();
        let configured = |key: &str, flag: &str| -> Result<String, Error> {
            match matches.get_one::<String>(flag) {
                Some(value) => Ok(value.clone()),
                None => Ok(figment.extract_inner(key)?),
            }
        };

        Ok(Self {
            db_uri: configured("db_uri", DB_URI)?,
            // Has a default value, so always present.
            database: matches
                .get_one::<String>(DATABASE)
                .cloned()
                .unwrap_or_else(|| DATABASE_NAME.to_string()),
            seed: AdminSeed {
                admin_username: configured("admin_username", USERNAME)?,
                admin_email: configured("admin_email", EMAIL)?,
                admin_password: configured("admin_password", PASSWORD)?,
            },
        })
    }
}

async fn run(settings: Settings) -> Result<(), Error> {
    let client = Client::with_uri_str(&settings.db_uri).await?;
    let db = client.database(&settings.database);
    prepare_database(&db, &settings.seed).await?;
    Ok(())
}

#[rocket::main]
async fn main() {
    let matches = cli().get_matches();
    let result = match Settings::new(&matches) {
        Ok(settings) => {
            let database = settings.database.clone();
            run(settings).await.map(|()| database)
        }
        Err(err) => Err(err),
    };

    match result {
        Ok(database) => println!("Database '{database}' is ready"),
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_overrides_config() {
        let matches = cli().get_matches_from([
            PROGRAM_NAME,
            "--db-uri",
            "mongodb://db.example.com:27017",
            "--username",
            "returning-officer",
            "--email",
            "ro@example.com",
            "--password",
            "hunter22",
        ]);
        let settings = Settings::new(&matches).unwrap();

        assert_eq!(settings.db_uri, "mongodb://db.example.com:27017");
        assert_eq!(settings.database, DATABASE_NAME);
        assert_eq!(settings.seed.admin_username, "returning-officer");
        assert_eq!(settings.seed.admin_email, "ro@example.com");
        assert_eq!(settings.seed.admin_password, "hunter22");
    }

    #[test]
    fn config_fills_the_gaps() {
        let matches = cli().get_matches_from([PROGRAM_NAME, "--database", "staging"]);
        let settings = Settings::new(&matches).unwrap();

        assert_eq!(settings.database, "staging");
        assert_eq!(settings.seed.admin_username, "admin");
    }

    #[test]
    fn cli_is_well_formed() {
        cli().debug_assert();
    }
}
