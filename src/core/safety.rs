//! Safety limits applied to every run.
//!
//! Bounds cost and cache-key cardinality through:
//! - A cap on subject length
//! - A per-stage deadline on agent invocations
//! - A cap on the size of any single agent output

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::AgentRole;

use super::error::PipelineError;

/// Safety limits for pipeline execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyLimits {
    /// Maximum subject length in characters (default: 80)
    #[serde(default = "default_max_subject_chars")]
    pub max_subject_chars: usize,

    /// Per-stage timeout in seconds (default: 300 = 5 min)
    #[serde(default = "default_stage_timeout")]
    pub stage_timeout_seconds: u64,

    /// Maximum output size in bytes for one invocation (default: 1MB)
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: u64,
}

fn default_max_subject_chars() -> usize {
    80
}
fn default_stage_timeout() -> u64 {
    300
} // 5 min
fn default_max_output_bytes() -> u64 {
    1024 * 1024
} // 1MB

impl Default for SafetyLimits {
    fn default() -> Self {
        Self {
            max_subject_chars: default_max_subject_chars(),
            stage_timeout_seconds: default_stage_timeout(),
            max_output_bytes: default_max_output_bytes(),
        }
    }
}

impl SafetyLimits {
    /// Trim and cap a subject before it reaches a prompt or a cache key
    pub fn clamp_subject(&self, subject: &str) -> String {
        subject.trim().chars().take(self.max_subject_chars).collect()
    }

    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_seconds)
    }

    /// Validate output against the size limit
    pub fn validate_output(&self, role: AgentRole, output: &str) -> Result<(), PipelineError> {
        let size = output.len() as u64;
        if size > self.max_output_bytes {
            return Err(PipelineError::OutputTooLarge {
                role,
                actual: size,
                limit: self.max_output_bytes,
            });
        }
        Ok(())
    }
}
