//! Decision client.
//!
//! Sends the step's prompt and overlay image to a [`DecisionProvider`] and
//! validates the reply into an action batch. A reply that cannot be
//! validated is an ordinary [`DecisionOutcome::Invalid`] value; only
//! provider failures that survive the retry policy come back as errors.

use std::sync::Arc;
use tokio::time::Instant;

use serde_json::{Map, Value};
use tracing::{debug, info};

use visicrawl_config::DecisionConfig;
use visicrawl_protocols::{
    ActionDescriptor, ActionKind, ActionTarget, DecisionProvider, ProviderError, ProviderSettings,
    TokenUsage, MAX_BATCH_ACTIONS,
};

use crate::prompt::DecisionRequest;
use crate::retry::RetryPolicy;

#[cfg(test)]
#[path = "decision_tests.rs"]
mod tests;

/// A validated reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDecision {
    pub actions: Vec<ActionDescriptor>,
    pub goal_completed: bool,
    pub reasoning: Option<String>,
}

/// Result of one decision call.
#[derive(Debug, Clone, PartialEq)]
pub enum DecisionOutcome {
    Batch {
        decision: ParsedDecision,
        latency_ms: u64,
        token_usage: Option<TokenUsage>,
        attempts: u32,
    },
    Invalid {
        raw: String,
        reason: String,
        latency_ms: u64,
    },
}

impl DecisionOutcome {
    pub fn latency_ms(&self) -> u64 {
        match self {
            DecisionOutcome::Batch { latency_ms, .. } | DecisionOutcome::Invalid { latency_ms, .. } => {
                *latency_ms
            }
        }
    }

    /// One-line description for events and logs.
    pub fn summary(&self) -> String {
        match self {
            DecisionOutcome::Batch { decision, .. } => {
                let actions: Vec<String> = decision.actions.iter().map(|a| a.compact()).collect();
                let mut out = format!("{} actions: {}", actions.len(), actions.join("; "));
                if decision.goal_completed {
                    out.push_str(" (goal completed)");
                }
                out
            }
            DecisionOutcome::Invalid { reason, .. } => format!("invalid response: {}", reason),
        }
    }
}

/// Provider-agnostic decision client.
pub struct DecisionClient {
    provider: Arc<dyn DecisionProvider>,
    retry: RetryPolicy,
}

impl DecisionClient {
    pub fn new(provider: Arc<dyn DecisionProvider>, retry: RetryPolicy) -> Self {
        Self { provider, retry }
    }

    pub fn from_config(provider: Arc<dyn DecisionProvider>, config: &DecisionConfig) -> Self {
        Self::new(provider, RetryPolicy::from_config(config))
    }

    pub fn provider_id(&self) -> &str {
        self.provider.id()
    }

    /// Hand credentials and model selection to the adapter.
    pub async fn initialize(&self, config: &DecisionConfig) -> Result<(), ProviderError> {
        let settings = ProviderSettings {
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            request_timeout_ms: config.request_timeout_secs.saturating_mul(1000),
            extra: config.extra.clone(),
        };
        info!(provider = self.provider.id(), model = %settings.model, "Initializing decision provider");
        self.provider.initialize(&settings).await
    }

    /// Ask the provider for the next action batch.
    pub async fn decide(&self, request: &DecisionRequest) -> Result<DecisionOutcome, ProviderError> {
        let prompt = request.render_prompt();
        let started = Instant::now();

        let (result, attempts) = self
            .retry
            .run(|| self.provider.generate(&prompt, &request.image))
            .await;
        let generation = result?;

        let latency_ms = if generation.metadata.latency_ms > 0 {
            generation.metadata.latency_ms
        } else {
            started.elapsed().as_millis() as u64
        };

        match parse_decision(&generation.text) {
            Ok(decision) => {
                debug!(
                    step = request.step,
                    actions = decision.actions.len(),
                    goal_completed = decision.goal_completed,
                    attempts,
                    "Decision received"
                );
                Ok(DecisionOutcome::Batch {
                    decision,
                    latency_ms,
                    token_usage: generation.metadata.token_usage,
                    attempts,
                })
            }
            Err(reason) => {
                debug!(step = request.step, %reason, "Decision rejected");
                Ok(DecisionOutcome::Invalid {
                    raw: generation.text,
                    reason,
                    latency_ms,
                })
            }
        }
    }
}

/// Locate the first balanced JSON object in free-form text.
///
/// Code fences and surrounding prose are ignored.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut search_from = 0;

    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;

        for (i, &b) in bytes.iter().enumerate().skip(start) {
            if in_string {
                match b {
                    _ if escaped => escaped = false,
                    b'\\' => escaped = true,
                    b'"' => in_string = false,
                    _ => {}
                }
                continue;
            }
            match b {
                b'"' => in_string = true,
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        let candidate = &text[start..=i];
                        if serde_json::from_str::<Value>(candidate).is_ok() {
                            return Some(candidate);
                        }
                        break;
                    }
                }
                _ => {}
            }
        }
        search_from = start + 1;
    }
    None
}

/// Parse and validate a raw provider reply.
pub fn parse_decision(raw: &str) -> Result<ParsedDecision, String> {
    let json = extract_json_object(raw).ok_or_else(|| "no JSON object found".to_string())?;
    let value: Value = serde_json::from_str(json).map_err(|e| format!("malformed JSON: {}", e))?;
    let root = value
        .as_object()
        .ok_or_else(|| "response is not a JSON object".to_string())?;

    let actions = root
        .get("actions")
        .and_then(Value::as_array)
        .ok_or_else(|| "missing \"actions\" array".to_string())?;

    if actions.is_empty() {
        return Err("empty action list".to_string());
    }
    if actions.len() > MAX_BATCH_ACTIONS {
        return Err(format!(
            "too many actions: {} (max {})",
            actions.len(),
            MAX_BATCH_ACTIONS
        ));
    }

    let actions = actions
        .iter()
        .enumerate()
        .map(|(i, v)| parse_action(v).map_err(|e| format!("action {}: {}", i + 1, e)))
        .collect::<Result<Vec<_>, _>>()?;

    let goal_completed = match root.get("goal_completed") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(_) => return Err("\"goal_completed\" must be a boolean".to_string()),
    };

    let reasoning = root
        .get("reasoning")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Ok(ParsedDecision {
        actions,
        goal_completed,
        reasoning,
    })
}

fn parse_action(value: &Value) -> Result<ActionDescriptor, String> {
    let obj = value.as_object().ok_or_else(|| "not an object".to_string())?;

    let kind_str = obj
        .get("kind")
        .or_else(|| obj.get("action"))
        .and_then(Value::as_str)
        .ok_or_else(|| "missing \"kind\"".to_string())?;
    let kind: ActionKind = kind_str.parse()?;

    let target = parse_target(obj)?;
    if kind.requires_target() && target.is_none() {
        return Err(format!("{} requires a target", kind));
    }

    let text = obj.get("text").and_then(Value::as_str).map(str::to_string);
    if kind.requires_text() && text.as_deref().is_none_or(|t| t.trim().is_empty()) {
        return Err(format!("{} requires non-empty \"text\"", kind));
    }

    let rationale = obj
        .get("rationale")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok(ActionDescriptor {
        kind,
        target,
        text: if kind.requires_text() { text } else { None },
        rationale,
    })
}

fn parse_target(obj: &Map<String, Value>) -> Result<Option<ActionTarget>, String> {
    match obj.get("target") {
        Some(Value::Null) => {}
        Some(target) => {
            return serde_json::from_value::<ActionTarget>(target.clone())
                .map(Some)
                .map_err(|e| format!("invalid target: {}", e));
        }
        None => {}
    }

    // Shorthand: {"kind": "tap", "label": 3}
    match obj.get("label") {
        None | Some(Value::Null) => Ok(None),
        Some(label) => label
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(|n| Some(ActionTarget::Label(n)))
            .ok_or_else(|| "invalid label".to_string()),
    }
}
