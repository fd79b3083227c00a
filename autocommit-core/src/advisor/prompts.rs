//! Prompt templates for command-backed advisors

use super::DecisionRequest;

/// Diffs beyond this many bytes are truncated before prompting
pub const MAX_DIFF_BYTES: usize = 12_000;

/// Prompt templates for commit decisions and messages
pub struct PromptTemplates;

impl PromptTemplates {
    /// Prompt asking whether to commit, answered as a JSON object
    pub fn decision_prompt(request: &DecisionRequest) -> String {
        let threshold = request
            .threshold
            .map(|t| {
                format!(
                    "Only recommend a commit when significance meets the '{}' threshold.\n",
                    t
                )
            })
            .unwrap_or_default();
        let completeness = if request.require_completeness.unwrap_or(false) {
            "Do not recommend committing work that looks unfinished.\n"
        } else {
            ""
        };

        format!(
            "You decide whether a developer's pending changes should be committed now.\n\
             {threshold}{completeness}\n\
             Respond with a single JSON object and nothing else:\n\
             {{\"shouldCommit\": bool, \"reason\": string, \
             \"significance\": \"LOW\"|\"MEDIUM\"|\"HIGH\", \
             \"completeness\": \"complete\"|\"partial\"|\"incomplete\", \
             \"changeType\": string, \"suggestedMessage\": string}}\n\n\
             Status:\n{status}\n\nDiff:\n{diff}\n",
            status = request.status.trim_end(),
            diff = truncate(&request.staged_diff, MAX_DIFF_BYTES),
        )
    }

    /// Prompt asking for a conventional commit message only
    pub fn message_prompt(staged_diff: &str, status: &str) -> String {
        format!(
            "Write a concise conventional commit message (type(scope): summary, \
             at most 72 characters in the first line) for these changes. \
             Reply with the message only.\n\n\
             Status:\n{}\n\nDiff:\n{}\n",
            status.trim_end(),
            truncate(staged_diff, MAX_DIFF_BYTES),
        )
    }
}

/// Truncate on a char boundary, marking the cut
pub fn truncate(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }

    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!(
        "{}\n... [diff truncated, {} bytes omitted]",
        &text[..end],
        text.len() - end
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::CommitThreshold;

    #[test]
    fn test_truncate_respects_char_boundary() {
        let text = "aé".repeat(10);
        let out = truncate(&text, 4);
        assert!(out.starts_with("aéa"));
        assert!(out.contains("bytes omitted"));
        assert_eq!(truncate("short", 10), "short");
    }

    #[test]
    fn test_decision_prompt_mentions_policy() {
        let request = DecisionRequest {
            staged_diff: "+x".to_string(),
            status: " M a.rs".to_string(),
            threshold: Some(CommitThreshold::Major),
            require_completeness: Some(true),
        };
        let prompt = PromptTemplates::decision_prompt(&request);

        assert!(prompt.contains("'major' threshold"));
        assert!(prompt.contains("unfinished"));
        assert!(prompt.contains("\"shouldCommit\""));
    }
}
