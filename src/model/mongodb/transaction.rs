use std::time::Duration;

use mongodb::{
    error::{Error as DbError, UNKNOWN_TRANSACTION_COMMIT_RESULT},
    options::{Acknowledgment, ReadConcern, TransactionOptions, WriteConcern},
    Client, ClientSession,
};
use rand::Rng;

use super::errors::is_transient_transaction_error;

/// Upper bound on how many times a transaction is attempted before giving up.
pub const MAX_TRANSACTION_ATTEMPTS: u32 = 5;

/// Options for every transaction we run: read from a snapshot, and only
/// consider the commit done once a majority has it.
pub fn transaction_options() -> TransactionOptions {
    TransactionOptions::builder()
        .read_concern(ReadConcern::snapshot())
        .write_concern(
            WriteConcern::builder()
                .w(Acknowledgment::Majority)
                .build(),
        )
        .build()
}

/// Start a new session with a transaction already open.
pub async fn begin(db_client: &Client) -> Result<ClientSession, DbError> {
    let mut session = db_client.start_session(None).await?;
    session.start_transaction(transaction_options()).await?;
    Ok(session)
}

/// Commit the session's transaction, retrying the commit itself (never the
/// transaction body) while its outcome is unknown.
pub async fn commit(session: &mut ClientSession) -> Result<(), DbError> {
    let mut attempt = 1;
    loop {
        match session.commit_transaction().await {
            Ok(()) => return Ok(()),
            Err(e)
                if attempt < MAX_TRANSACTION_ATTEMPTS
                    && e.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT) =>
            {
                debug!("Commit result unknown, retrying commit (attempt {attempt})");
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Abort the session's transaction, ignoring failures: an abort that fails
/// leaves the transaction to time out server-side.
pub async fn abort(session: &mut ClientSession) {
    if let Err(e) = session.abort_transaction().await {
        debug!("Failed to abort transaction: {e}");
    }
}

/// Should a transaction that failed with this error be attempted again?
pub fn should_retry(err: &DbError, attempt: u32) -> bool {
    attempt < MAX_TRANSACTION_ATTEMPTS && is_transient_transaction_error(err)
}

/// Sleep a short, jittered, linearly growing time before retry number `attempt`.
pub async fn back_off(attempt: u32) {
    let jitter = rand::thread_rng().gen_range(0..10);
    let millis = u64::from(attempt) * 10 + jitter;
    rocket::tokio::time::sleep(Duration::from_millis(millis)).await;
}
