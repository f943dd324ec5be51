//! Structured agent invocation.
//!
//! One invocation: call the runtime under the stage deadline, locate the
//! text inside whatever envelope came back, then either parse and validate
//! it as the role's JSON contract or hand it back as markdown.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde_json::Value;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::adapters::{AgentRuntime, AgentSpec};
use crate::domain::{AgentRole, RoleOutput};

use super::error::PipelineError;
use super::prompts;
use super::safety::SafetyLimits;

/// One known envelope shape
struct Extractor {
    name: &'static str,
    extract: fn(&Value) -> Option<String>,
}

/// Tried in order; the first non-empty text wins
const EXTRACTORS: &[Extractor] = &[
    Extractor {
        name: "bare_string",
        extract: bare_string,
    },
    Extractor {
        name: "output_text",
        extract: output_text,
    },
    Extractor {
        name: "outputText",
        extract: output_text_camel,
    },
    Extractor {
        name: "finalOutputText",
        extract: final_output_text,
    },
    Extractor {
        name: "chat_choices",
        extract: chat_choice,
    },
    Extractor {
        name: "output_segments",
        extract: output_segments,
    },
];

fn bare_string(envelope: &Value) -> Option<String> {
    envelope.as_str().map(str::to_string)
}

fn output_text(envelope: &Value) -> Option<String> {
    string_field(envelope, "output_text")
}

fn output_text_camel(envelope: &Value) -> Option<String> {
    string_field(envelope, "outputText")
}

fn final_output_text(envelope: &Value) -> Option<String> {
    string_field(envelope, "finalOutputText")
}

fn chat_choice(envelope: &Value) -> Option<String> {
    envelope
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn string_field(envelope: &Value, field: &str) -> Option<String> {
    envelope.get(field).and_then(Value::as_str).map(str::to_string)
}

/// Scan `output[*].content` for text segments
fn output_segments(envelope: &Value) -> Option<String> {
    let items = envelope.get("output")?.as_array()?;
    let pieces: Vec<&str> = items
        .iter()
        .flat_map(|item| match item.get("content") {
            Some(Value::Array(parts)) => parts.iter().collect::<Vec<_>>(),
            Some(other) => vec![other],
            None => Vec::new(),
        })
        .filter_map(|part| match part {
            Value::String(s) => Some(s.as_str()),
            Value::Object(map) => map.get("text").and_then(Value::as_str),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .collect();
    Some(pieces.join("\n"))
}

/// Locate the text payload of a response envelope
pub fn extract_text(envelope: &Value) -> Option<String> {
    EXTRACTORS.iter().find_map(|extractor| {
        let text = (extractor.extract)(envelope).filter(|t| !t.trim().is_empty())?;
        debug!(extractor = extractor.name, "located agent output");
        Some(text)
    })
}

fn tagged_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)```json\s*(.*?)\s*```").expect("fence regex is valid")
    })
}

fn bare_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```\s*(.*?)\s*```").expect("fence regex is valid")
    })
}

/// Strict parse, falling back to the first fenced block
pub fn parse_json_text(text: &str) -> Result<Value, String> {
    let strict_err = match serde_json::from_str::<Value>(text) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    let fenced = tagged_fence()
        .captures(text)
        .or_else(|| bare_fence().captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str());

    match fenced {
        Some(block) => serde_json::from_str(block).map_err(|e| e.to_string()),
        None => Err(strict_err.to_string()),
    }
}

/// Validate a parsed document against a role's contract, all-or-nothing
pub fn validate_output<T: RoleOutput>(value: Value) -> Result<T, PipelineError> {
    let output: T = serde_json::from_value(value).map_err(|e| PipelineError::SchemaViolation {
        role: T::ROLE,
        detail: e.to_string(),
    })?;
    output
        .validate()
        .map_err(|detail| PipelineError::SchemaViolation {
            role: T::ROLE,
            detail,
        })?;
    Ok(output)
}

/// Invokes roles and hands back only validated values or non-empty text
pub struct StructuredAgentInvoker {
    runtime: Arc<dyn AgentRuntime>,
    limits: SafetyLimits,
    model: Option<String>,
}

impl StructuredAgentInvoker {
    pub fn new(runtime: Arc<dyn AgentRuntime>, limits: SafetyLimits, model: Option<String>) -> Self {
        Self {
            runtime,
            limits,
            model,
        }
    }

    pub fn runtime_name(&self) -> &str {
        self.runtime.name()
    }

    /// Invoke a JSON role and return its validated output
    pub async fn invoke_json<T: RoleOutput>(&self, input: &str) -> Result<T, PipelineError> {
        let role = T::ROLE;
        let text = self.invoke_text(role, input).await?;
        let value = parse_json_text(&text)
            .map_err(|reason| PipelineError::UnparseableOutput { role, reason })?;
        validate_output(value)
    }

    /// Invoke a markdown role and return its text
    pub async fn invoke_markdown(&self, role: AgentRole, input: &str) -> Result<String, PipelineError> {
        self.invoke_text(role, input).await
    }

    async fn invoke_text(&self, role: AgentRole, input: &str) -> Result<String, PipelineError> {
        let spec = AgentSpec::new(role, prompts::instructions(role)).with_model(self.model.clone());
        let deadline = self.limits.stage_timeout();

        let envelope = match timeout(deadline, self.runtime.invoke(&spec, input)).await {
            Ok(Ok(envelope)) => envelope,
            Ok(Err(e)) => {
                warn!(%role, error = %e, "agent invocation failed");
                return Err(PipelineError::Runtime {
                    role,
                    message: format!("{:#}", e),
                });
            }
            Err(_) => {
                return Err(PipelineError::StageTimeout {
                    role,
                    seconds: self.limits.stage_timeout_seconds,
                })
            }
        };

        let text = extract_text(&envelope).ok_or(PipelineError::NoOutput { role })?;
        self.limits.validate_output(role, &text)?;
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ManagerReview, NewsResearchOutput};
    use serde_json::json;

    #[test]
    fn test_extract_prefers_output_text() {
        let envelope = json!({
            "output_text": "first",
            "outputText": "second",
            "output": [{"content": [{"text": "third"}]}]
        });
        assert_eq!(extract_text(&envelope).as_deref(), Some("first"));
    }

    #[test]
    fn test_extract_skips_empty_fields() {
        let envelope = json!({
            "output_text": "",
            "finalOutputText": "from final"
        });
        assert_eq!(extract_text(&envelope).as_deref(), Some("from final"));
    }

    #[test]
    fn test_extract_from_segments() {
        let envelope = json!({
            "output": [
                {"type": "reasoning"},
                {"content": [{"type": "output_text", "text": "line one"}, {"type": "refusal"}]},
                {"content": "line two"}
            ]
        });
        assert_eq!(extract_text(&envelope).as_deref(), Some("line one\nline two"));
    }

    #[test]
    fn test_extract_from_chat_completion() {
        let envelope = json!({
            "choices": [{"message": {"role": "assistant", "content": "{\"a\":1}"}}]
        });
        assert_eq!(extract_text(&envelope).as_deref(), Some("{\"a\":1}"));
    }

    #[test]
    fn test_extract_nothing() {
        assert_eq!(extract_text(&json!({"output": []})), None);
        assert_eq!(extract_text(&json!({"status": "ok"})), None);
        assert_eq!(extract_text(&json!("   ")), None);
    }

    #[test]
    fn test_parse_strict_json() {
        assert_eq!(parse_json_text("{\"ok\": true}").unwrap(), json!({"ok": true}));
    }

    #[test]
    fn test_parse_fenced_json() {
        let text = "Here you go:\n```JSON\n{\"ok\": true}\n```\nThanks";
        assert_eq!(parse_json_text(text).unwrap(), json!({"ok": true}));

        let untagged = "```\n[1, 2]\n```";
        assert_eq!(parse_json_text(untagged).unwrap(), json!([1, 2]));
    }

    #[test]
    fn test_parse_rejects_prose() {
        assert!(parse_json_text("I could not find anything.").is_err());
        assert!(parse_json_text("```json\nnot json\n```").is_err());
    }

    #[test]
    fn test_validate_output_schema_violation() {
        let err = validate_output::<ManagerReview>(json!({"needs_news_revision": true})).unwrap_err();
        match err {
            PipelineError::SchemaViolation { role, detail } => {
                assert_eq!(role, AgentRole::Manager);
                assert!(detail.contains("needs_finance_revision"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_validate_output_runs_semantic_checks() {
        let err = validate_output::<NewsResearchOutput>(json!({
            "key_events": [{"url": "nope"}]
        }))
        .unwrap_err();
        assert_eq!(err.kind(), "schema_violation");
    }
}
