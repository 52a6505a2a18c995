//! Query tokenization for the FTS index.

/// Maximum number of tokens kept from a query.
pub const MAX_TOKENS: usize = 12;

const PUNCTUATION: &str = "?*+-\"(){}[]^~:\\/<>!@#$%&=|;,.'_";

const STOP_WORDS: &[&str] = &[
    // English filler
    "a", "an", "the", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
    "do", "does", "did", "will", "would", "could", "should", "may", "might", "must", "can", "to",
    "of", "in", "for", "on", "with", "at", "by", "from", "as", "into", "about", "that", "this",
    "these", "those", "it", "its", "and", "or", "but", "not", "no", "so", "if", "then", "than",
    "me", "my", "we", "our", "you", "your", "he", "she", "they", "them", "their", "what", "which",
    "who", "when", "where", "why", "how", "all", "any", "some", "there", "here", "just", "also",
    "please", "up", "out", "get", "got", "let", "make", "need", "want", "like", "use", "using",
    // Task instruction verbs
    "fix", "implement", "analyze", "analyse", "add", "create", "update", "change", "modify",
    "refactor", "write", "check", "find", "look", "show", "tell", "explain", "help", "run",
    "build", "test", "review",
];

/// Lowercase, strip punctuation and stop words, keep the first [`MAX_TOKENS`].
#[must_use]
pub fn tokenize(query: &str) -> Vec<String> {
    let cleaned: String = query
        .to_lowercase()
        .chars()
        .map(|c| if PUNCTUATION.contains(c) { ' ' } else { c })
        .collect();

    cleaned
        .split_whitespace()
        .filter(|t| t.chars().count() > 1 && !STOP_WORDS.contains(t))
        .take(MAX_TOKENS)
        .map(str::to_string)
        .collect()
}

/// Quote each token and join with OR. `None` when nothing survives.
#[must_use]
pub fn build_fts_query(query: &str) -> Option<String> {
    let tokens = tokenize(query);
    if tokens.is_empty() {
        return None;
    }
    Some(
        tokens
            .iter()
            .map(|t| format!("\"{t}\""))
            .collect::<Vec<_>>()
            .join(" OR "),
    )
}
