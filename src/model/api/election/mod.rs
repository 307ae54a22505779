mod desc;
mod results;
mod spec;

pub use desc::{CandidateDescription, ElectionDescription, ElectionSummary};
pub use results::{CandidateTally, ElectionResults};
pub use spec::{CandidateSpec, ElectionSpec};
