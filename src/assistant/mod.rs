//! The conversational helper.
//!
//! Answers free-text questions about the platform, delegating to a hosted
//! language model when one is configured and falling back to canned replies
//! otherwise. It never fails.

use std::collections::BTreeMap;

mod backend;
mod fallback;

pub use backend::{BackendError, CompletionBackend, OpenAiBackend};

const SYSTEM_PROMPT: &str = "You are the assistant for an online voting platform. You help users with:
- Registering, logging in and casting their vote
- Common questions about how elections work
- Step-by-step guidance when they are stuck
- The platform's security and privacy measures
- Information about elections and their results
- Administrative tasks, for admins

Guidelines:
- Be friendly and conversational, not robotic
- Keep answers concise but complete
- Gently steer unrelated conversations back to voting
- Give admins more technical detail
- Ask for clarification when a question is unclear";

/// The helper, with an optional language model behind it.
pub struct Assistant {
    backend: Option<Box<dyn CompletionBackend>>,
}

impl Assistant {
    pub fn new(backend: Box<dyn CompletionBackend>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    /// A helper that only uses canned replies.
    pub fn offline() -> Self {
        Self { backend: None }
    }

    pub fn is_online(&self) -> bool {
        self.backend.is_some()
    }

    /// Answer the message, taking the optional key/value context into account.
    pub async fn respond(&self, message: &str, context: Option<&BTreeMap<String, String>>) -> String {
        if let Some(backend) = &self.backend {
            match backend.complete(&system_prompt(context), message).await {
                Ok(reply) => return reply,
                Err(e) => warn!("Assistant backend failed, using fallback: {e}"),
            }
        }
        fallback::respond(message).to_string()
    }
}

/// The system prompt, with any context appended as `- key: value` lines.
fn system_prompt(context: Option<&BTreeMap<String, String>>) -> String {
    let mut prompt = SYSTEM_PROMPT.to_string();
    if let Some(context) = context.filter(|c| !c.is_empty()) {
        prompt.push_str("\n\nCurrent Context:\n");
        for (key, value) in context {
            prompt.push_str(&format!("- {key}: {value}\n"));
        }
    }
    prompt
}
