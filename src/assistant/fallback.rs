//! Canned answers for when no language model is available.

/// Keywords and the reply they trigger, most specific first.
///
/// Keywords containing a space match anywhere in the message; single words
/// must match a whole word, so "hi" doesn't fire on "this".
const TABLE: &[(&[&str], &str)] = &[
    (
        &["register", "registration", "sign up", "signup", "create account", "create an account"],
        "To register: choose 'Register', enter a username, your email address and a password \
         of at least six characters, then log in and start voting. Which step can I help with?",
    ),
    (
        &["change vote", "change my vote", "modify vote", "modify my vote", "undo my vote"],
        "Votes can't be changed once submitted, so that every election keeps its integrity. \
         Please review your choice carefully before confirming.",
    ),
    (
        &["vote", "voting", "cast", "ballot", "election", "elections"],
        "How to vote: 1) Log in 2) Browse the active elections 3) Pick an election \
         4) Read about the candidates 5) Choose 'Vote' next to your candidate 6) Confirm. \
         You can vote once in each election.",
    ),
    (
        &["login", "log in", "sign in", "signin", "logout", "log out"],
        "To log in: choose 'Login', enter your username and password, and submit. \
         Your session lasts a while, and you can log out at any time.",
    ),
    (
        &["how long", "duration", "time", "deadline", "ends", "closes"],
        "Each election has its own voting window, shown on its page. Voting is only possible \
         between its start and end times, and an administrator may close it early.",
    ),
    (
        &["secure", "security", "safe", "privacy", "private", "encryption", "encrypted"],
        "Your password is stored only as a salted hash, sessions use signed tokens, and the \
         system guarantees a single vote per person per election. Results are counted \
         directly from the recorded votes.",
    ),
    (
        &["help", "support", "assist", "hlp", "stuck"],
        "I can help with registering, logging in, voting, election timings and security. \
         What would you like to know?",
    ),
    (
        &[
            "hello",
            "hi",
            "hey",
            "greetings",
            "good morning",
            "good afternoon",
            "good evening",
            "how are you",
        ],
        "Hello! I'm the voting assistant. I can help you register, find an election or cast \
         your vote. What can I do for you?",
    ),
    (
        &["thank you", "thanks", "thx", "appreciate", "grateful"],
        "You're welcome! Is there anything else you'd like to know about voting?",
    ),
    (
        &["who are you", "what are you", "your name", "ai", "artificial intelligence", "bot"],
        "I'm the assistant for this voting platform. I answer questions about registering, \
         voting, results and security.",
    ),
];

/// Said when nothing in the table matches.
pub const DEFAULT_REPLY: &str = "I'm mostly here to help with voting, but happy to chat. \
     Is there anything about elections or your account you'd like to know?";

/// Pick a canned reply for the message. Always returns something.
pub fn respond(message: &str) -> &'static str {
    let message = message.to_lowercase();
    let words: Vec<&str> = message
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .collect();

    TABLE
        .iter()
        .find(|(keywords, _)| {
            keywords.iter().any(|keyword| {
                if keyword.contains(' ') {
                    message.contains(keyword)
                } else {
                    words.contains(keyword)
                }
            })
        })
        .map_or(DEFAULT_REPLY, |(_, reply)| *reply)
}
