//! Adapter bridging rig-core's `CompletionModel` to our `LlmProvider` trait.

use async_trait::async_trait;
use rig::completion::CompletionModel;
use rig::message::AssistantContent;
use rust_decimal::Decimal;

use crate::error::LlmError;
use crate::llm::costs;
use crate::llm::provider::{
    ChatMessage, CompletionRequest, CompletionResponse, FinishReason, LlmProvider, Role,
};

/// Wraps a rig completion model as an `LlmProvider`.
pub struct RigAdapter<M: CompletionModel> {
    model: M,
    model_name: String,
    rates: (Decimal, Decimal),
}

impl<M: CompletionModel> RigAdapter<M> {
    pub fn new(model: M, model_name: &str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
            rates: costs::rates_for(model_name),
        }
    }
}

#[async_trait]
impl<M: CompletionModel> LlmProvider for RigAdapter<M> {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn cost_per_token(&self) -> (Decimal, Decimal) {
        self.rates
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        // rig takes one prompt message plus an optional preamble; fold our
        // system messages into the preamble and concatenate user content.
        let mut preamble = String::new();
        let mut prompt = String::new();
        for message in &request.messages {
            let (buf, content) = match message.role {
                Role::System => (&mut preamble, &message.content),
                Role::User => (&mut prompt, &message.content),
            };
            if !buf.is_empty() {
                buf.push_str("\n\n");
            }
            buf.push_str(content);
        }

        let mut builder = self
            .model
            .completion_request(prompt.as_str())
            .temperature(f64::from(request.temperature))
            .max_tokens(u64::from(request.max_tokens));
        if !preamble.is_empty() {
            builder = builder.preamble(preamble);
        }

        let response = builder.send().await.map_err(|e| LlmError::RequestFailed {
            provider: self.model_name.clone(),
            reason: e.to_string(),
        })?;

        let content: String = response
            .choice
            .iter()
            .filter_map(|part| match part {
                AssistantContent::Text(text) => Some(text.text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");

        Ok(CompletionResponse {
            content,
            input_tokens: response.usage.input_tokens,
            output_tokens: response.usage.output_tokens,
            finish_reason: FinishReason::Stop,
        })
    }
}

/// Build the message list for a prompt-only agent call.
pub fn prompt_messages(system: impl Into<String>, user: impl Into<String>) -> Vec<ChatMessage> {
    vec![ChatMessage::system(system), ChatMessage::user(user)]
}
