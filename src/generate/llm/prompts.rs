//! Prompt construction for test-case generation

use std::num::NonZeroU32;

/// Field list and output shape shared by every generation prompt
pub const TEST_CASE_FIELDS: &str = r#"Every test case has these fields:
- title: short, specific name of the scenario
- description: what the test verifies
- preconditions: state that must hold before the first step
- steps: ordered list of concrete actions (array of strings)
- expected_result: observable outcome when the test passes
- priority: High, Medium or Low
- category: Functional, Performance, Security, Usability, etc.

The JSON shape of one test case:
{
  "title": "Test case title",
  "description": "What is being tested",
  "preconditions": "Required setup",
  "steps": ["Step 1", "Step 2", "Step 3"],
  "expected_result": "Expected outcome",
  "priority": "Medium",
  "category": "Functional"
}

Cover positive, negative and edge-case scenarios. Keep every step actionable."#;

/// The two text parts sent to a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    /// System-level instruction: output shape, count, test type and context
    pub instruction: String,
    /// Short user-turn request
    pub directive: String,
}

impl Prompt {
    /// Instruction and directive as one block, for APIs with no system slot
    pub fn combined(&self) -> String {
        format!("{}\n\n{}", self.instruction, self.directive)
    }
}

/// Build the prompt for one generation request.
///
/// Pure: the same inputs always give the same bytes.
pub fn build_prompt(
    requirement: &str,
    test_type: &str,
    count: NonZeroU32,
    context: &str,
) -> Prompt {
    let instruction = format!(
        "You are a senior QA engineer who writes thorough, executable test cases.\n\n\
         Write {count} test cases for the requirements below.\n\n\
         Requirements: {requirement}\n\
         Test type: {test_type}\n\n\
         {fields}\n\n\
         OUTPUT FORMAT:\n\
         Reply with a JSON array of exactly {count} objects and nothing else.\n\n\
         Context:\n{context}",
        count = count,
        requirement = requirement,
        test_type = test_type,
        fields = TEST_CASE_FIELDS,
        context = context,
    );

    Prompt {
        instruction,
        directive: format!("Generate {} test cases for: {}", count, requirement),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(value: u32) -> NonZeroU32 {
        NonZeroU32::new(value).unwrap()
    }

    #[test]
    fn test_build_is_deterministic() {
        let a = build_prompt("Login with email", "Functional", n(5), "File: a.txt\nx");
        let b = build_prompt("Login with email", "Functional", n(5), "File: a.txt\nx");
        assert_eq!(a, b);
    }

    #[test]
    fn test_directive_format() {
        let prompt = build_prompt("password reset", "Security", n(3), "");
        assert_eq!(prompt.directive, "Generate 3 test cases for: password reset");
    }

    #[test]
    fn test_instruction_names_fields_and_count() {
        let prompt = build_prompt("checkout", "Regression", n(7), "");
        for field in [
            "\"title\"",
            "\"description\"",
            "\"preconditions\"",
            "\"steps\"",
            "\"expected_result\"",
            "\"priority\"",
            "\"category\"",
        ] {
            assert!(prompt.instruction.contains(field), "missing {}", field);
        }
        assert!(prompt.instruction.contains("exactly 7 objects"));
        assert!(prompt.instruction.contains("Test type: Regression"));
        assert!(!prompt.instruction.contains("{count}"));
    }

    #[test]
    fn test_empty_context_still_valid() {
        let prompt = build_prompt("search", "Functional", n(1), "");
        assert!(prompt.instruction.ends_with("Context:\n"));
    }

    #[test]
    fn test_context_appended_verbatim() {
        let context = "Meeting Transcript - Sync:\nUse {placeholders} carefully";
        let prompt = build_prompt("search", "Functional", n(2), context);
        assert!(prompt.instruction.ends_with(context));
    }

    #[test]
    fn test_combined_joins_with_blank_line() {
        let prompt = build_prompt("search", "Functional", n(2), "");
        assert_eq!(
            prompt.combined(),
            format!("{}\n\n{}", prompt.instruction, prompt.directive)
        );
    }
}
