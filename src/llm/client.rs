use std::sync::Arc;
use std::time::Instant;

use opentelemetry::KeyValue;
use tracing::Instrument;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use super::{ChatMessage, Completion, Conversation, Provider};
use crate::error::{AppError, AppResult};
use crate::telemetry::metrics::{GEN_AI_ERROR_COUNT, GEN_AI_OPERATION_DURATION, GEN_AI_TOKEN_USAGE};

pub const REPORT_INSTRUCTION: &str = "You are an assistant that answers questions based on the \
provided documents. The documents are attached with <Filename Start> and <Filename End> tags. \
Your role is to generate a summary based on the extracted information and put it into the report \
template format supplied in the <Report Template Start> <Report Template End> tags. Retain the css \
in the report. Do not add any ```html or ```css tags to start of the report.";

/// One model, one provider, one call per request. No retry and no streaming.
#[derive(Clone)]
pub struct CompletionClient {
    provider: Arc<dyn Provider>,
    model: String,
}

impl CompletionClient {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Sends `[system: REPORT_INSTRUCTION, user: prompt]` and returns the text
    /// of the first choice.
    pub async fn summarize(&self, prompt: &str) -> AppResult<String> {
        let mut conversation = Conversation::with_system(REPORT_INSTRUCTION);
        conversation.push(ChatMessage::user(prompt));

        let completion = self.send(&conversation).await?;
        Ok(completion.content)
    }

    pub async fn send(&self, conversation: &Conversation) -> AppResult<Completion> {
        let provider_name = self.provider.name().to_string();
        let span_display_name = format!("gen_ai.chat {}", self.model);
        let start = Instant::now();

        let span = tracing::info_span!(
            "gen_ai.chat",
            otel.name = %span_display_name,
            gen_ai.operation.name = "chat",
            gen_ai.provider.name = %provider_name,
            gen_ai.request.model = %self.model,
            gen_ai.request.messages = conversation.len() as i64,
            gen_ai.response.model = tracing::field::Empty,
            gen_ai.usage.input_tokens = tracing::field::Empty,
            gen_ai.usage.output_tokens = tracing::field::Empty,
            gen_ai.response.finish_reasons = tracing::field::Empty,
            otel.status_code = tracing::field::Empty,
            error.type = tracing::field::Empty,
        );

        if let Some(last) = conversation.messages().last() {
            span.add_event(
                "gen_ai.user.message",
                vec![KeyValue::new("gen_ai.prompt", truncate(&last.content, 1000))],
            );
        }

        tracing::info!(parent: &span, "Sending data to llm");

        let result = self
            .provider
            .complete(&self.model, conversation.messages())
            .instrument(span.clone())
            .await;

        let duration = start.elapsed().as_secs_f64();
        let provider_kv = KeyValue::new("gen_ai.provider.name", provider_name);
        let model_kv = KeyValue::new("gen_ai.request.model", self.model.clone());

        match result {
            Ok(resp) => {
                span.record("gen_ai.response.model", resp.model.as_str());
                span.record("gen_ai.usage.input_tokens", resp.input_tokens as i64);
                span.record("gen_ai.usage.output_tokens", resp.output_tokens as i64);
                if !resp.finish_reason.is_empty() {
                    span.record(
                        "gen_ai.response.finish_reasons",
                        resp.finish_reason.as_str(),
                    );
                }

                span.add_event(
                    "gen_ai.assistant.message",
                    vec![KeyValue::new(
                        "gen_ai.completion",
                        truncate(&resp.content, 2000),
                    )],
                );

                GEN_AI_TOKEN_USAGE.record(
                    f64::from(resp.input_tokens),
                    &[
                        KeyValue::new("gen_ai.token.type", "input"),
                        provider_kv.clone(),
                        model_kv.clone(),
                    ],
                );
                GEN_AI_TOKEN_USAGE.record(
                    f64::from(resp.output_tokens),
                    &[
                        KeyValue::new("gen_ai.token.type", "output"),
                        provider_kv.clone(),
                        model_kv.clone(),
                    ],
                );
                GEN_AI_OPERATION_DURATION.record(duration, &[provider_kv, model_kv]);

                tracing::info!(parent: &span, "Received response from llm");
                Ok(resp)
            }
            Err(err) => {
                span.record("otel.status_code", "ERROR");
                span.record("error.type", classify_error(&err));

                GEN_AI_ERROR_COUNT.add(1, &[provider_kv, model_kv]);

                Err(AppError::Llm(err.to_string()))
            }
        }
    }
}

fn classify_error(err: &anyhow::Error) -> &'static str {
    let msg = err.to_string().to_lowercase();
    if msg.contains("rate limit") || msg.contains("429") {
        "rate_limit"
    } else if msg.contains("timeout") || msg.contains("timed out") {
        "timeout"
    } else if msg.contains("401")
        || msg.contains("403")
        || msg.contains("auth")
        || msg.contains("api key")
    {
        "auth_error"
    } else if msg.contains("500")
        || msg.contains("502")
        || msg.contains("503")
        || msg.contains("server")
    {
        "server_error"
    } else if msg.contains("connect") || msg.contains("dns") || msg.contains("network") {
        "network_error"
    } else {
        "unknown_error"
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        s.char_indices()
            .take_while(|&(i, _)| i < max)
            .map(|(_, c)| c)
            .collect()
    }
}
