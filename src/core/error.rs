//! Failure taxonomy for a run.

use thiserror::Error;

use crate::domain::AgentRole;

/// Errors that end a run.
///
/// Every variant is fatal to the run it occurs in. The orchestrator turns
/// it into exactly one `error` event followed by `done`.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    #[error("{0}")]
    Configuration(String),

    #[error("{role} produced no text output")]
    NoOutput { role: AgentRole },

    #[error("{role} output was not valid JSON: {reason}")]
    UnparseableOutput { role: AgentRole, reason: String },

    #[error("{role} JSON schema validation failed: {detail}")]
    SchemaViolation { role: AgentRole, detail: String },

    #[error("{role} did not respond within {seconds}s")]
    StageTimeout { role: AgentRole, seconds: u64 },

    #[error("{role} output too large: {actual} > {limit} bytes")]
    OutputTooLarge {
        role: AgentRole,
        actual: u64,
        limit: u64,
    },

    #[error("{role} invocation failed: {message}")]
    Runtime { role: AgentRole, message: String },

    #[error("{role} was already revised once")]
    RevisionLimit { role: AgentRole },

    #[error("stream consumer rejected event: {0}")]
    StreamFault(String),
}

impl PipelineError {
    /// Stable identifier written into `error` event details
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Configuration(_) => "configuration",
            PipelineError::NoOutput { .. } => "no_output",
            PipelineError::UnparseableOutput { .. } => "unparseable_output",
            PipelineError::SchemaViolation { .. } => "schema_violation",
            PipelineError::StageTimeout { .. } => "stage_timeout",
            PipelineError::OutputTooLarge { .. } => "output_too_large",
            PipelineError::Runtime { .. } => "runtime",
            PipelineError::RevisionLimit { .. } => "revision_limit",
            PipelineError::StreamFault(_) => "stream_fault",
        }
    }

    /// Role the failure is attributed to
    pub fn role(&self) -> Option<AgentRole> {
        match self {
            PipelineError::NoOutput { role }
            | PipelineError::UnparseableOutput { role, .. }
            | PipelineError::SchemaViolation { role, .. }
            | PipelineError::StageTimeout { role, .. }
            | PipelineError::OutputTooLarge { role, .. }
            | PipelineError::Runtime { role, .. }
            | PipelineError::RevisionLimit { role } => Some(*role),
            PipelineError::Configuration(_) | PipelineError::StreamFault(_) => None,
        }
    }

    pub fn is_stream_fault(&self) -> bool {
        matches!(self, PipelineError::StreamFault(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_role() {
        let err = PipelineError::NoOutput {
            role: AgentRole::FinancialAnalyst,
        };
        assert_eq!(err.to_string(), "FinancialAnalyst produced no text output");
        assert_eq!(err.role(), Some(AgentRole::FinancialAnalyst));
        assert_eq!(err.kind(), "no_output");
    }

    #[test]
    fn test_configuration_has_no_role() {
        let err = PipelineError::Configuration("OPENAI_API_KEY is missing".to_string());
        assert_eq!(err.role(), None);
        assert!(!err.is_stream_fault());
        assert_eq!(err.to_string(), "OPENAI_API_KEY is missing");
    }
}
