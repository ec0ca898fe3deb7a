//! @mention extraction
//!
//! Matches `@name` tokens in message content against the known agent-name
//! set. Unknown names are ignored; duplicates collapse to the first
//! occurrence.

use std::sync::LazyLock;

use regex::Regex;

/// Pre-compiled regex for @mention scanning (e.g., "@builder take a look")
static MENTION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@(\w+)").expect("MENTION_REGEX is a compile-time constant"));

/// Extract known-agent mentions from `content`, first-occurrence order.
#[must_use]
pub fn extract_mentions(content: &str, known_agents: &[String]) -> Vec<String> {
    let mut mentions = Vec::new();
    for capture in MENTION_REGEX.captures_iter(content) {
        let name = &capture[1];
        if known_agents.iter().any(|a| a == name) && !mentions.iter().any(|m| m == name) {
            mentions.push(name.to_string());
        }
    }
    mentions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agents() -> Vec<String> {
        ["planner", "builder", "reviewer"]
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn extracts_known_names() {
        let mentions = extract_mentions("@builder please apply what @planner wrote", &agents());
        assert_eq!(mentions, vec!["builder", "planner"]);
    }

    #[test]
    fn ignores_unknown_names() {
        let mentions = extract_mentions("@nobody and @builder", &agents());
        assert_eq!(mentions, vec!["builder"]);
    }

    #[test]
    fn collapses_duplicates_keeping_first_occurrence() {
        let mentions = extract_mentions("@builder then @reviewer then @builder again", &agents());
        assert_eq!(mentions, vec!["builder", "reviewer"]);
    }

    #[test]
    fn matches_mention_at_end_of_content() {
        let mentions = extract_mentions("handing off to @reviewer", &agents());
        assert_eq!(mentions, vec!["reviewer"]);
    }

    #[test]
    fn no_mentions_in_plain_text() {
        assert!(extract_mentions("nothing to route here", &agents()).is_empty());
    }
}
