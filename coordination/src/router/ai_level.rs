//! AI-level gate
//!
//! A ticket body may carry an explicit directive such as `AI Level: manual`.
//! When present it decides; otherwise the global [`AiMode`] does.

use regex::Regex;
use std::sync::LazyLock;

use crate::config::AiMode;

static AI_LEVEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bai[ _-]?level\b\W{0,4}\s*([a-z]+)").unwrap());

/// Extract a recognized AI-level directive from ticket text.
pub fn parse_ai_level(text: &str) -> Option<AiMode> {
    AI_LEVEL_RE
        .captures_iter(text)
        .find_map(|caps| caps.get(1)?.as_str().parse::<AiMode>().ok())
}

/// Whether a general-lane ticket may be automated.
pub fn automation_allowed(body: &str, global: AiMode) -> bool {
    parse_ai_level(body).unwrap_or(global).allows_automation()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_manual_disables() {
        assert!(!automation_allowed("Please do this.\nAI Level: manual", AiMode::Smart));
        assert!(!automation_allowed("**ai_level:** Manual", AiMode::Hybrid));
    }

    #[test]
    fn test_explicit_value_enables_over_global_manual() {
        assert!(automation_allowed("AI level: smart", AiMode::Manual));
        assert!(automation_allowed("ai-level = suggest", AiMode::Manual));
    }

    #[test]
    fn test_global_mode_when_no_directive() {
        assert!(automation_allowed("Build the thing", AiMode::Smart));
        assert!(!automation_allowed("Build the thing", AiMode::Manual));
    }

    #[test]
    fn test_unrecognized_value_falls_through() {
        assert_eq!(parse_ai_level("AI Level: maximum"), None);
        assert!(!automation_allowed("AI Level: maximum", AiMode::Manual));
    }
}
