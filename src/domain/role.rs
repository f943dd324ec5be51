//! The fixed set of agent roles that take part in a run.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A participant in the research pipeline.
///
/// Roles are stateless between invocations: anything a role needs from an
/// earlier stage is passed to it explicitly in its prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentRole {
    /// Coordinating reviewer (hierarchical topology only)
    Manager,

    /// Gathers recent news, launches, partnerships and signals
    NewsResearcher,

    /// Collects financial metrics and performance notes
    FinancialAnalyst,

    /// Synthesizes the final markdown memo
    ReportWriter,
}

/// What a role is expected to hand back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputContract {
    /// A single JSON object validated against the role's schema
    Json,

    /// Free-form, non-empty markdown
    Markdown,
}

impl AgentRole {
    pub const ALL: [AgentRole; 4] = [
        AgentRole::Manager,
        AgentRole::NewsResearcher,
        AgentRole::FinancialAnalyst,
        AgentRole::ReportWriter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Manager => "Manager",
            AgentRole::NewsResearcher => "NewsResearcher",
            AgentRole::FinancialAnalyst => "FinancialAnalyst",
            AgentRole::ReportWriter => "ReportWriter",
        }
    }

    pub fn contract(&self) -> OutputContract {
        match self {
            AgentRole::ReportWriter => OutputContract::Markdown,
            _ => OutputContract::Json,
        }
    }

    /// Names of the external tools the runtime may let this role call
    pub fn tools(&self) -> &'static [&'static str] {
        match self {
            AgentRole::NewsResearcher => &["web_search"],
            AgentRole::FinancialAnalyst => &["finance_lookup"],
            AgentRole::Manager | AgentRole::ReportWriter => &[],
        }
    }

    /// Parse the wire name of a role
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.as_str() == name)
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_names_roundtrip() {
        for role in AgentRole::ALL {
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json, format!("\"{}\"", role.as_str()));
            assert_eq!(AgentRole::from_name(role.as_str()), Some(role));
        }
        assert_eq!(AgentRole::from_name("Intern"), None);
    }

    #[test]
    fn test_only_writer_produces_markdown() {
        assert_eq!(AgentRole::ReportWriter.contract(), OutputContract::Markdown);
        assert_eq!(AgentRole::Manager.contract(), OutputContract::Json);
        assert_eq!(AgentRole::NewsResearcher.contract(), OutputContract::Json);
        assert_eq!(AgentRole::FinancialAnalyst.contract(), OutputContract::Json);
    }

    #[test]
    fn test_tool_assignment() {
        assert_eq!(AgentRole::NewsResearcher.tools(), &["web_search"]);
        assert_eq!(AgentRole::FinancialAnalyst.tools(), &["finance_lookup"]);
        assert!(AgentRole::ReportWriter.tools().is_empty());
    }
}
