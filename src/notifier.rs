//! Live vote events.

use rocket::tokio::sync::broadcast;
use serde::{Deserialize, Serialize};

use crate::model::common::election::{CandidateId, ElectionId};

/// Published once per committed vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteEvent {
    pub election_id: ElectionId,
    pub candidate_id: CandidateId,
    /// The candidate's total after this vote.
    pub candidate_total: u64,
}

/// Somewhere to announce committed votes.
///
/// Delivery is best-effort: notifying must not block and cannot fail the vote.
pub trait VoteNotifier: Send + Sync {
    fn notify(&self, event: VoteEvent);
}

/// Fans vote events out to every live subscriber.
pub struct BroadcastNotifier {
    sender: broadcast::Sender<VoteEvent>,
}

impl BroadcastNotifier {
    /// How many events a slow subscriber may fall behind before it misses some.
    pub const CAPACITY: usize = 1024;

    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(Self::CAPACITY);
        Self { sender }
    }

    /// Receive every event sent from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<VoteEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl VoteNotifier for BroadcastNotifier {
    fn notify(&self, event: VoteEvent) {
        // Only fails when nobody is listening.
        if self.sender.send(event).is_err() {
            trace!("No listeners for {event:?}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(election_id: ElectionId) -> VoteEvent {
        VoteEvent {
            election_id,
            candidate_id: 1,
            candidate_total: 1,
        }
    }

    #[rocket::async_test]
    async fn subscribers_see_events() {
        let notifier = BroadcastNotifier::new();
        let mut first = notifier.subscribe();
        let mut second = notifier.subscribe();

        notifier.notify(event(4));

        assert_eq!(first.recv().await.unwrap(), event(4));
        assert_eq!(second.recv().await.unwrap(), event(4));
    }

    #[test]
    fn notifying_nobody_is_fine() {
        let notifier = BroadcastNotifier::new();
        notifier.notify(event(1));

        // Late subscribers don't see earlier events.
        let mut late = notifier.subscribe();
        assert!(late.try_recv().is_err());
    }
}
