use mongodb::{
    bson::doc,
    error::Error as DbError,
    options::{FindOneAndUpdateOptions, ReturnDocument, UpdateOptions},
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::mongodb::Coll;

/// Counter backing election IDs.
pub const ELECTION_ID_COUNTER: &str = "election_id";
/// Counter backing candidate IDs, shared by all elections.
pub const CANDIDATE_ID_COUNTER: &str = "candidate_id";

/// A counter object used to implement auto-increment fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counter {
    #[serde(rename = "_id")]
    pub id: String,
    pub next: u32,
}

impl Counter {
    /// Create a new `Counter` with the given name, starting at the given value.
    pub fn new(id: impl Into<String>, start: u32) -> Self {
        Self {
            id: id.into(),
            next: start,
        }
    }

    /// Atomically retrieve the next value of the counter with the given ID.
    pub async fn next(counters: &Coll<Counter>, id: &str) -> Result<u32> {
        let update = doc! {
            "$inc": { "next": 1 }
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::Before)
            .build();
        let counter = counters
            .find_one_and_update(doc! { "_id": id }, update, options)
            .await?
            .ok_or_else(|| Error::StorageUnavailable(format!("Counter {id} is missing")))?;
        Ok(counter.next)
    }
}

/// Ensure the election and candidate ID counters exist, without resetting them.
///
/// This operation is idempotent.
pub async fn ensure_counters_exist(counters: &Coll<Counter>) -> std::result::Result<(), DbError> {
    let upsert = UpdateOptions::builder().upsert(true).build();
    for id in [ELECTION_ID_COUNTER, CANDIDATE_ID_COUNTER] {
        let update = doc! {
            "$setOnInsert": { "next": 1 }
        };
        counters
            .update_one(doc! { "_id": id }, update, upsert.clone())
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[backend_test]
    async fn counter_increment(counters: Coll<Counter>) {
        const START: u32 = 5;

        // Create a counter and insert it.
        counters
            .insert_one(Counter::new("test", START), None)
            .await
            .unwrap();

        // Get the next value.
        let next = Counter::next(&counters, "test").await.unwrap();
        assert_eq!(next, START);

        // Check the counter was incremented.
        let counter = counters
            .find_one(doc! { "_id": "test" }, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(counter.next, START + 1);
    }

    #[backend_test]
    async fn ensure_counters_is_idempotent(counters: Coll<Counter>) {
        // The test rocket has already created the counters; advance one.
        let first = Counter::next(&counters, ELECTION_ID_COUNTER).await.unwrap();

        // Re-running the setup must not reset it.
        ensure_counters_exist(&counters).await.unwrap();
        let second = Counter::next(&counters, ELECTION_ID_COUNTER).await.unwrap();
        assert_eq!(second, first + 1);
    }
}
