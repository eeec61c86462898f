//! The agent abstraction for chain stages.

use serde_json::{Map, Value};

use crate::chain::context::AgentContext;

/// One stage of the generation chain: a pure function from accumulated
/// context to a typed JSON fragment, backed by a single model call.
///
/// Agents are intentionally decoupled: the chain can be reordered and
/// agents added without touching the orchestrator, and any single agent's
/// failure is attributable without unwinding prior results.
pub trait ChainAgent: Send + Sync {
    /// Agent name, used in progress labels and failure attribution.
    fn name(&self) -> &str;

    /// Role line sent as the system message.
    fn role(&self) -> &str;

    /// Sampling temperature for this agent's model call.
    fn temperature(&self) -> f32;

    /// Output token limit for this agent's model call.
    fn max_tokens(&self) -> u32 {
        1024
    }

    /// Canonical description of the expected JSON output shape, appended to
    /// every prompt.
    fn output_contract(&self) -> &str;

    /// Top-level keys the parsed output must contain. Missing keys are a
    /// hard error for this agent.
    fn required_fields(&self) -> &[&str];

    /// snake_case key under which the agent's full output object is also
    /// recorded (for report assembly).
    fn context_key(&self) -> &str;

    /// Build the task body of the prompt from the accumulated context.
    fn build_prompt(&self, ctx: &AgentContext) -> String;

    /// Validate a parsed output object against the agent's declared fields.
    fn validate_output(&self, output: &Map<String, Value>) -> Result<(), String> {
        for field in self.required_fields() {
            if !output.contains_key(*field) {
                return Err(format!("missing required field: {field}"));
            }
        }
        Ok(())
    }
}

/// Assemble the full user prompt: task body plus the output contract.
pub fn full_prompt(agent: &dyn ChainAgent, ctx: &AgentContext) -> String {
    format!(
        "{}\n\n**Output Format (JSON only):**\n{}\n\nReturn ONLY valid JSON, no markdown or extra text.",
        agent.build_prompt(ctx),
        agent.output_contract()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct ToyAgent;

    impl ChainAgent for ToyAgent {
        fn name(&self) -> &str {
            "ToyAgent"
        }
        fn role(&self) -> &str {
            "You are a toy."
        }
        fn temperature(&self) -> f32 {
            0.3
        }
        fn output_contract(&self) -> &str {
            r#"{"answer": "..."}"#
        }
        fn required_fields(&self) -> &[&str] {
            &["answer"]
        }
        fn context_key(&self) -> &str {
            "toy"
        }
        fn build_prompt(&self, _ctx: &AgentContext) -> String {
            "Answer.".to_string()
        }
    }

    #[test]
    fn validate_output_checks_required_fields() {
        let agent = ToyAgent;
        let good = match json!({"answer": "yes"}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        assert!(agent.validate_output(&good).is_ok());

        let bad = match json!({"other": 1}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        let err = agent.validate_output(&bad).unwrap_err();
        assert!(err.contains("answer"));
    }

    #[test]
    fn full_prompt_appends_contract() {
        let prompt = full_prompt(&ToyAgent, &AgentContext::default());
        assert!(prompt.contains("Answer."));
        assert!(prompt.contains("Output Format"));
        assert!(prompt.contains("ONLY valid JSON"));
    }
}
