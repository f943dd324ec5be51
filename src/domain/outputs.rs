//! Typed output contracts for the JSON-producing roles.
//!
//! Deserialization is the schema: required fields must be present, optional
//! fields and empty-array defaults may be omitted by the agent. Constraints
//! serde cannot express live in [`RoleOutput::validate`].

use std::collections::BTreeMap;

use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::role::AgentRole;

/// A validated JSON output belonging to one role
pub trait RoleOutput: DeserializeOwned + Serialize + Send {
    /// Role that produces this output
    const ROLE: AgentRole;

    /// Checks beyond the shape of the document
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }

    /// Non-fatal problems the role reported (e.g. a degraded upstream tool)
    fn warnings(&self) -> &[String] {
        &[]
    }
}

/// Output of the news researcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsResearchOutput {
    #[serde(default)]
    pub key_events: Vec<KeyEvent>,

    #[serde(default)]
    pub positioning_notes: Vec<String>,

    #[serde(default)]
    pub product_mentions: Vec<String>,

    #[serde(default)]
    pub red_flags: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyEvent {
    #[serde(default)]
    pub date: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub summary: String,

    /// Source link, must be an absolute URL
    pub url: String,
}

impl RoleOutput for NewsResearchOutput {
    const ROLE: AgentRole = AgentRole::NewsResearcher;

    fn validate(&self) -> Result<(), String> {
        for (i, event) in self.key_events.iter().enumerate() {
            if Url::parse(&event.url).is_err() {
                return Err(format!("key_events[{}].url: invalid url '{}'", i, event.url));
            }
        }
        Ok(())
    }

    fn warnings(&self) -> &[String] {
        self.warnings.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompanyType {
    Public,
    Private,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// A metric value is either a number or a labelled string ("~$2B (est.)")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(serde_json::Number),
    Text(String),
}

/// Output of the financial analyst
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinanceOutput {
    #[serde(default)]
    pub company: String,

    pub company_type: CompanyType,

    pub key_metrics: BTreeMap<String, MetricValue>,

    pub performance_summary: String,

    #[serde(default)]
    pub risks: Vec<String>,

    pub confidence: Confidence,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_mock: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
}

impl RoleOutput for FinanceOutput {
    const ROLE: AgentRole = AgentRole::FinancialAnalyst;

    fn warnings(&self) -> &[String] {
        self.warnings.as_deref().unwrap_or_default()
    }
}

/// Review verdict from the manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagerReview {
    pub needs_news_revision: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub news_revision_request: Option<String>,

    pub needs_finance_revision: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finance_revision_request: Option<String>,

    /// What to tell the report writer
    pub handoff_summary: String,
}

impl RoleOutput for ManagerReview {
    const ROLE: AgentRole = AgentRole::Manager;
}
