//! CompletionStep -- an Action that sends the current input to a completion client.
//!
//! The step reads [`USER_INPUT`] and any prior [`MESSAGE_HISTORY`] from the
//! context, sends one request, and on success appends the exchange to the
//! history. The report data is the serialized `CompletionResponse`, so
//! downstream sequential steps see its `content` field as the previous output.

use serde_json::Value;
use taskweave_types::error::WorkError;
use taskweave_types::keys::{MESSAGE_HISTORY, USER_INPUT};
use taskweave_types::llm::{CompletionRequest, Message};

use super::box_client::BoxCompletionClient;
use super::client::CompletionClient;
use crate::action::Action;
use crate::context::WorkContext;
use crate::report::WorkReport;

const DEFAULT_MAX_TOKENS: u32 = 1024;

#[derive(Debug, Clone)]
pub struct CompletionStep {
    name: String,
    client: BoxCompletionClient,
    model: String,
    system: Option<String>,
    max_tokens: u32,
    temperature: Option<f64>,
}

impl CompletionStep {
    pub fn new(
        name: impl Into<String>,
        client: impl CompletionClient + 'static,
        model: impl Into<String>,
    ) -> Self {
        Self::with_client(name, BoxCompletionClient::new(client), model)
    }

    /// Build a step around an already boxed (possibly shared) client.
    pub fn with_client(
        name: impl Into<String>,
        client: BoxCompletionClient,
        model: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            client,
            model: model.into(),
            system: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: None,
        }
    }

    pub fn system(mut self, prompt: impl Into<String>) -> Self {
        self.system = Some(prompt.into());
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    fn history(&self, ctx: &WorkContext) -> Result<Vec<Message>, WorkError> {
        match ctx.get(MESSAGE_HISTORY) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(value) => serde_json::from_value(value).map_err(|e| {
                WorkError::message(format!("invalid {MESSAGE_HISTORY} in context: {e}"))
            }),
        }
    }

    fn build_request(&self, ctx: &WorkContext) -> Result<(CompletionRequest, Vec<Message>), WorkError> {
        let input = ctx
            .get_string(USER_INPUT)
            .ok_or_else(|| WorkError::message(format!("{USER_INPUT} is required")))?;

        let mut messages = self.history(ctx)?;
        messages.push(Message::user(input));

        let request = CompletionRequest {
            model: self.model.clone(),
            messages: messages.clone(),
            system: self.system.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };
        Ok((request, messages))
    }
}

impl Action for CompletionStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &WorkContext) -> WorkReport {
        let (request, mut messages) = match self.build_request(ctx) {
            Ok(built) => built,
            Err(err) => return WorkReport::failure(err),
        };

        tracing::debug!(
            step = %self.name,
            client = self.client.name(),
            model = %self.model,
            messages = messages.len(),
            "sending completion request"
        );

        let response = match self.client.complete(&request).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(step = %self.name, client = self.client.name(), "completion failed: {err}");
                return WorkReport::failure(WorkError::message(err.to_string()));
            }
        };

        messages.push(Message::assistant(response.content.clone()));
        match serde_json::to_value(&messages) {
            Ok(history) => ctx.set(MESSAGE_HISTORY, history),
            Err(err) => return WorkReport::failure(WorkError::message(err.to_string())),
        }

        match serde_json::to_value(&response) {
            Ok(data) => WorkReport::completed_with(data)
                .with_metadata("model", Value::String(response.model))
                .with_metadata("output_tokens", Value::from(response.usage.output_tokens)),
            Err(err) => WorkReport::failure(WorkError::message(err.to_string())),
        }
    }
}
