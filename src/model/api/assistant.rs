use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A message for the conversational helper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantRequest {
    pub message: String,
    /// Optional key/value context, e.g. the election being viewed.
    #[serde(default)]
    pub context: Option<BTreeMap<String, String>>,
}

/// The helper's reply. Always present, even when the backend is unavailable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantReply {
    pub response: String,
}
