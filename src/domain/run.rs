//! Run records and state reconstruction from events.
//!
//! A run is one execution of the pipeline for a (subject, topology) pair.
//! Once recorded it is immutable; its state is derived by replaying events.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::events::{Event, EventKind};
use super::role::AgentRole;

/// Coordination strategy for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    /// Researcher, then analyst, then writer
    Sequential,

    /// Parallel specialists, one review, at most one revision each, then writer
    Hierarchical,
}

impl Topology {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topology::Sequential => "sequential",
            Topology::Hierarchical => "hierarchical",
        }
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topology {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sequential" => Ok(Topology::Sequential),
            "hierarchical" => Ok(Topology::Hierarchical),
            other => Err(format!("Invalid mode: {}", other)),
        }
    }
}

/// A completed, cached run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Time- and subject-derived identifier
    pub id: String,

    /// Trimmed, length-capped subject
    #[serde(rename = "competitor")]
    pub subject: String,

    #[serde(rename = "mode")]
    pub topology: Topology,

    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,

    /// Full event log, in emission order
    pub events: Vec<Event>,
}

impl RunRecord {
    /// Build an identifier of the form `{millis}-{topology}-{slug}-{suffix}`
    pub fn generate_id(subject: &str, topology: Topology, now: DateTime<Utc>) -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!(
            "{}-{}-{}-{}",
            now.timestamp_millis(),
            topology,
            slugify(subject),
            &suffix[..8]
        )
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            id: self.id.clone(),
            subject: self.subject.clone(),
            topology: self.topology,
            created_at: self.created_at,
        }
    }

    pub fn state(&self) -> RunState {
        RunState::from_events(&self.events)
    }
}

/// Entry in the recent-runs index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub id: String,

    #[serde(rename = "competitor")]
    pub subject: String,

    #[serde(rename = "mode")]
    pub topology: Topology,

    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// Bounded list of recent runs, newest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryIndex {
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,

    pub runs: Vec<RunSummary>,
}

impl HistoryIndex {
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            created_at: now,
            runs: Vec::new(),
        }
    }
}

/// Pipeline stage a running run is in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    News,
    Finance,
    Review,
    Writing,
}

impl Stage {
    pub fn for_role(role: AgentRole) -> Self {
        match role {
            AgentRole::NewsResearcher => Stage::News,
            AgentRole::FinancialAnalyst => Stage::Finance,
            AgentRole::Manager => Stage::Review,
            AgentRole::ReportWriter => Stage::Writing,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::News => "news",
            Stage::Finance => "finance",
            Stage::Review => "review",
            Stage::Writing => "writing",
        };
        f.write_str(name)
    }
}

/// State of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum RunState {
    /// No events yet
    Idle,

    /// A stage is executing
    Running { stage: Stage },

    /// A final artifact was produced and the run terminated
    Completed,

    /// The run terminated with an error
    Failed { error: String },
}

impl Default for RunState {
    fn default() -> Self {
        Self::Idle
    }
}

impl RunState {
    /// Reconstruct state from an event log
    pub fn from_events(events: &[Event]) -> Self {
        let mut state = RunState::Idle;
        for event in events {
            state.apply_event(event);
        }
        state
    }

    /// Apply a single event
    pub fn apply_event(&mut self, event: &Event) {
        if self.is_terminal() {
            return;
        }
        match event.event {
            EventKind::Log | EventKind::Raw => {
                if let Some(role) = event.agent() {
                    *self = RunState::Running {
                        stage: Stage::for_role(role),
                    };
                }
            }
            EventKind::Final => {
                *self = RunState::Running {
                    stage: Stage::Writing,
                };
            }
            EventKind::Error => {
                let error = event
                    .data
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or_default()
                    .to_string();
                *self = RunState::Failed { error };
            }
            EventKind::Done => {
                *self = RunState::Completed;
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed { .. })
    }
}

fn slugify(subject: &str) -> String {
    let mut slug = String::new();
    let mut pending_dash = false;
    for c in subject.trim().to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    let slug: String = slug.chars().take(40).collect();
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "competitor".to_string()
    } else {
        slug.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_topology_parsing() {
        assert_eq!("sequential".parse::<Topology>(), Ok(Topology::Sequential));
        assert_eq!("hierarchical".parse::<Topology>(), Ok(Topology::Hierarchical));
        assert!("parallel".parse::<Topology>().is_err());
        assert_eq!(
            serde_json::to_string(&Topology::Hierarchical).unwrap(),
            "\"hierarchical\""
        );
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("  Acme Corp, Inc. "), "acme-corp-inc");
        assert_eq!(slugify("!!!"), "competitor");
        assert_eq!(slugify(&"a".repeat(60)).len(), 40);
    }

    #[test]
    fn test_generate_id_shape() {
        let id = RunRecord::generate_id("Acme Corp", Topology::Sequential, ts());
        assert!(id.starts_with(&format!("{}-sequential-acme-corp-", ts().timestamp_millis())));

        let other = RunRecord::generate_id("Acme Corp", Topology::Sequential, ts());
        assert_ne!(id, other);
    }

    #[test]
    fn test_state_from_successful_log() {
        let events = vec![
            Event::log(ts(), AgentRole::NewsResearcher, "searching…"),
            Event::log(ts(), AgentRole::ReportWriter, "drafting memo…"),
            Event::final_memo(ts(), "# Memo"),
            Event::done(ts()),
        ];
        assert_eq!(RunState::from_events(&events), RunState::Completed);
        assert_eq!(
            RunState::from_events(&events[..2]),
            RunState::Running {
                stage: Stage::Writing
            }
        );
        assert_eq!(RunState::from_events(&[]), RunState::Idle);
    }

    #[test]
    fn test_state_from_failed_log() {
        let events = vec![
            Event::log(ts(), AgentRole::FinancialAnalyst, "fetching…"),
            Event::error(ts(), "FinancialAnalyst produced no text output", None),
            Event::done(ts()),
        ];
        assert_eq!(
            RunState::from_events(&events),
            RunState::Failed {
                error: "FinancialAnalyst produced no text output".to_string()
            }
        );
    }

    #[test]
    fn test_record_serializes_with_wire_names() {
        let record = RunRecord {
            id: "1-sequential-acme".to_string(),
            subject: "Acme".to_string(),
            topology: Topology::Sequential,
            created_at: ts(),
            events: vec![Event::done(ts())],
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["competitor"], "Acme");
        assert_eq!(value["mode"], "sequential");
        assert!(value.get("createdAt").is_some());
        assert_eq!(value["events"][0]["event"], "done");
    }
}
