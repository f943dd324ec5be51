//! Adapter interfaces for the generative-agent runtime.
//!
//! The orchestrator never talks to a model provider directly. It hands an
//! [`AgentSpec`] and a prompt to an [`AgentRuntime`] and gets back the raw
//! response envelope, whose shape varies between providers and API modes.

pub mod openai;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::domain::AgentRole;

// Re-export the OpenAI-compatible runtime
pub use openai::{ApiMode, OpenAiRuntime};

/// Everything the runtime needs to stand up one role
#[derive(Debug, Clone)]
pub struct AgentSpec {
    pub role: AgentRole,

    /// System instructions for the role
    pub instructions: String,

    /// Model override (runtime default when unset)
    pub model: Option<String>,

    /// Tools the role may call; executing them is the runtime's job
    pub tools: Vec<String>,
}

impl AgentSpec {
    pub fn new(role: AgentRole, instructions: impl Into<String>) -> Self {
        Self {
            role,
            instructions: instructions.into(),
            model: None,
            tools: role.tools().iter().map(|t| t.to_string()).collect(),
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }
}

/// Trait for generative-agent runtimes
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    /// Human-readable runtime name
    fn name(&self) -> &str;

    /// Run one role against one prompt and return the response envelope
    async fn invoke(&self, agent: &AgentSpec, input: &str) -> Result<Value>;
}
