//! Deliverable-specific content checks

use regex::Regex;
use std::sync::LazyLock;

use super::GateOutcome;
use crate::ticket::OperationType;

static TASK_LANGUAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)\b(?:create[ds]?|creating|add(?:ed|ing)?|generated?|generating)\b[^.\n]{0,40}\b(?:sub)?tasks?\b|\btask\s*#?\d+|^\s*(?:[-*]|\d+[.)])\s+task\b",
    )
    .unwrap()
});
static COMPONENT_OR_PAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:components?|pages?)\b").unwrap());
static CODE_CONTENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)```|^\s*(?:pub\s+)?(?:async\s+)?(?:fn|function|def|class|struct|enum|impl|interface|const|let|var|import|export|package)\b|[{;]\s*$",
    )
    .unwrap()
});

/// Output describes creating tasks
pub fn has_task_language(content: &str) -> bool {
    TASK_LANGUAGE.is_match(content)
}

/// Output mentions a component or page
pub fn has_component_mention(content: &str) -> bool {
    COMPONENT_OR_PAGE.is_match(content)
}

/// Output contains recognizable code
pub fn has_code(content: &str) -> bool {
    CODE_CONTENT.is_match(content)
}

/// Run the content check for a deliverable type. Types without a check are
/// reported as skipped.
pub fn deliverable_check(deliverable: OperationType, content: &str) -> GateOutcome {
    let ok = match deliverable {
        OperationType::PlanGeneration => has_task_language(content),
        OperationType::DesignChange => has_component_mention(content),
        OperationType::CodeGeneration => has_code(content),
        _ => return GateOutcome::Skipped,
    };
    if ok {
        GateOutcome::Passed
    } else {
        GateOutcome::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_language() {
        assert!(has_task_language("Created 3 tasks: setup, schema, api"));
        assert!(has_task_language("I will create the following subtasks"));
        assert!(has_task_language("Task 1: scaffold the project"));
        assert!(has_task_language("1. Task: write migrations"));
        assert!(!has_task_language("OK"));
        assert!(!has_task_language("The plan looks fine."));
    }

    #[test]
    fn test_component_mention() {
        assert!(has_component_mention("Updated the Header component"));
        assert!(has_component_mention("New settings page"));
        assert!(!has_component_mention("Changed the colour palette"));
    }

    #[test]
    fn test_code_detection() {
        assert!(has_code("```rust\nfn main() {}\n```"));
        assert!(has_code("pub fn add(a: i32) -> i32 {\n    a\n}"));
        assert!(has_code("const x = 1;"));
        assert!(has_code("def handler(event):\n    return event"));
        assert!(!has_code("I looked into it and it is fine"));
    }

    #[test]
    fn test_unchecked_deliverables_skip() {
        assert_eq!(
            deliverable_check(OperationType::Verification, "anything"),
            GateOutcome::Skipped
        );
        assert_eq!(
            deliverable_check(OperationType::DesignChange, "nothing relevant"),
            GateOutcome::Failed
        );
    }
}
