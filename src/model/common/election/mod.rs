use chrono::{DateTime, Utc};

/// Our election IDs are auto-incrementing integers.
pub type ElectionId = u32;
/// Our candidate IDs are auto-incrementing integers, unique across elections.
pub type CandidateId = u32;

/// The `[start, end]` range during which voting is permitted.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ElectionWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ElectionWindow {
    /// Create a window, or `None` if it doesn't start strictly before it ends.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    /// Is `now` within the window? Both ends are inclusive.
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        self.start <= now && now <= self.end
    }
}
