//! Shared fixtures: a scripted agent runtime and frame helpers.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};

use rivalbrief::adapters::{AgentRuntime, AgentSpec};
use rivalbrief::core::{
    ManualClock, MemoryConsumer, Orchestrator, OrchestratorSettings, RunCache, SafetyLimits,
};
use rivalbrief::domain::AgentRole;

/// What the runtime does on one call for a role
#[derive(Debug, Clone)]
pub enum Step {
    Respond(Value),
    Fail(String),
    Hang,
}

/// Agent runtime that replays a per-role script and records every call
#[derive(Default)]
pub struct ScriptedRuntime {
    scripts: Mutex<HashMap<AgentRole, VecDeque<Step>>>,
    calls: Mutex<Vec<(AgentRole, String)>>,
}

impl ScriptedRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, role: AgentRole, step: Step) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(role)
            .or_default()
            .push_back(step);
        self
    }

    pub fn calls(&self) -> Vec<(AgentRole, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, role: AgentRole) -> usize {
        self.calls().iter().filter(|(r, _)| *r == role).count()
    }
}

#[async_trait]
impl AgentRuntime for ScriptedRuntime {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn invoke(&self, agent: &AgentSpec, input: &str) -> Result<Value> {
        self.calls
            .lock()
            .unwrap()
            .push((agent.role, input.to_string()));

        let step = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&agent.role)
            .and_then(VecDeque::pop_front);

        match step {
            Some(Step::Respond(envelope)) => Ok(envelope),
            Some(Step::Fail(message)) => anyhow::bail!(message),
            Some(Step::Hang) => Ok(std::future::pending::<Value>().await),
            None => anyhow::bail!("no scripted response for {}", agent.role),
        }
    }
}

/// Responses-API style envelope around a text payload
pub fn envelope(text: impl Into<String>) -> Step {
    Step::Respond(json!({ "output_text": text.into() }))
}

pub fn news_output(items: usize, warnings: &[&str]) -> Value {
    let key_events: Vec<Value> = (0..items)
        .map(|i| {
            json!({
                "date": format!("2025-0{}-01", i % 9 + 1),
                "title": format!("Launch {}", i),
                "summary": "Shipped a new tier",
                "url": format!("https://news.example.com/{}", i),
            })
        })
        .collect();
    let mut output = json!({
        "key_events": key_events,
        "positioning_notes": ["Premium positioning"],
        "product_mentions": ["Acme Cloud"],
        "red_flags": [],
    });
    if !warnings.is_empty() {
        output["warnings"] = json!(warnings);
    }
    output
}

pub fn finance_output(metrics: usize, is_mock: bool) -> Value {
    let key_metrics: serde_json::Map<String, Value> = (0..metrics)
        .map(|i| (format!("metric_{}", i), json!(i * 10)))
        .collect();
    let mut output = json!({
        "company": "Acme",
        "company_type": "private",
        "key_metrics": key_metrics,
        "performance_summary": "Growing steadily",
        "risks": ["Concentrated customer base"],
        "confidence": if is_mock { "low" } else { "medium" },
    });
    if is_mock {
        output["is_mock"] = json!(true);
        output["warnings"] = json!(["Finance data is mocked"]);
    }
    output
}

pub fn review_output(news: bool, finance: bool, handoff: &str) -> Value {
    json!({
        "needs_news_revision": news,
        "news_revision_request": if news { json!("Add more dated items with links") } else { Value::Null },
        "needs_finance_revision": finance,
        "handoff_summary": handoff,
    })
}

pub const MEMO: &str = "# Acme Corp\n\n## Executive Summary\n- Growing";

/// Script a full happy path for the given topology's roles
pub fn happy_runtime(with_review: bool) -> ScriptedRuntime {
    let runtime = ScriptedRuntime::new()
        .script(AgentRole::NewsResearcher, envelope(news_output(5, &[]).to_string()))
        .script(AgentRole::FinancialAnalyst, envelope(finance_output(5, false).to_string()))
        .script(AgentRole::ReportWriter, envelope(MEMO));
    if with_review {
        runtime.script(
            AgentRole::Manager,
            envelope(review_output(false, false, "").to_string()),
        )
    } else {
        runtime
    }
}

pub struct Harness {
    pub runtime: Arc<ScriptedRuntime>,
    pub clock: Arc<ManualClock>,
    pub cache: Arc<RunCache>,
    pub orchestrator: Orchestrator,
}

pub fn harness(runtime: ScriptedRuntime) -> Harness {
    harness_with(runtime, true, SafetyLimits::default())
}

pub fn harness_with(runtime: ScriptedRuntime, credentials_present: bool, limits: SafetyLimits) -> Harness {
    let runtime = Arc::new(runtime);
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
    ));
    let cache = Arc::new(RunCache::with_defaults(clock.clone()));
    let orchestrator = Orchestrator::new(
        runtime.clone(),
        cache.clone(),
        clock.clone(),
        OrchestratorSettings {
            credentials_present,
            model: None,
            limits,
        },
    );
    Harness {
        runtime,
        clock,
        cache,
        orchestrator,
    }
}

/// Decoded frame: (kind, payload)
pub fn frames(consumer: &MemoryConsumer) -> Vec<(String, Value)> {
    consumer
        .frames()
        .iter()
        .map(|frame| {
            let body = frame.strip_suffix("\n\n").expect("frame ends with blank line");
            let (head, data) = body.split_once('\n').expect("frame has two lines");
            let kind = head.strip_prefix("event: ").expect("event line");
            let data = data.strip_prefix("data: ").expect("data line");
            (kind.to_string(), serde_json::from_str(data).expect("data is JSON"))
        })
        .collect()
}

pub fn kinds(frames: &[(String, Value)]) -> Vec<&str> {
    frames.iter().map(|(kind, _)| kind.as_str()).collect()
}

/// `(kind, agent)` pairs, agent empty for unattributed frames
pub fn kinds_and_agents(frames: &[(String, Value)]) -> Vec<(String, String)> {
    frames
        .iter()
        .map(|(kind, data)| {
            let agent = data["agent"].as_str().unwrap_or("").to_string();
            (kind.clone(), agent)
        })
        .collect()
}

pub fn position(frames: &[(String, Value)], kind: &str, agent: &str) -> Vec<usize> {
    frames
        .iter()
        .enumerate()
        .filter(|(_, (k, data))| k == kind && data["agent"].as_str().unwrap_or("") == agent)
        .map(|(i, _)| i)
        .collect()
}
