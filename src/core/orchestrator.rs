//! Main orchestrator for research runs.
//!
//! Serves cache hits by replay, otherwise drives the stages of the chosen
//! topology, records every event and caches the finished log.

use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, error, info, instrument, warn, Span};

use crate::adapters::{AgentRuntime, OpenAiRuntime};
use crate::config::ResolvedConfig;
use crate::domain::{
    AgentRole, FinanceOutput, HistoryIndex, NewsResearchOutput, RoleOutput, RunRecord, Stage,
    Topology,
};

use super::clock::{Clock, SystemClock};
use super::error::PipelineError;
use super::event_sink::{EventSink, FrameConsumer};
use super::invoker::StructuredAgentInvoker;
use super::prompts;
use super::review::{ReviewGate, RevisionSlot};
use super::run_cache::RunCache;
use super::safety::SafetyLimits;

/// Per-request options
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Skip the cache lookup and always execute
    pub bypass_cache: bool,
}

/// How a call to [`Orchestrator::start_run`] ended.
///
/// Informational only: the consumer has already seen a terminated stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// A cached run was replayed
    Replayed { run_id: String },

    /// The pipeline ran and produced a final artifact
    Completed { run_id: String },

    /// The pipeline ran and ended with an error event
    Failed { run_id: String, error: String },

    /// The consumer stopped accepting frames; nothing was cached
    Aborted { error: String },
}

/// Settings the orchestrator needs from configuration
#[derive(Debug, Clone, Default)]
pub struct OrchestratorSettings {
    /// Whether the agent runtime credential precondition holds
    pub credentials_present: bool,

    /// Model passed to every role (runtime default when unset)
    pub model: Option<String>,

    pub limits: SafetyLimits,
}

pub const MISSING_CREDENTIAL_MESSAGE: &str =
    "OPENAI_API_KEY is missing. Set it in your environment; it is required to run agents.";

/// Main research orchestrator
pub struct Orchestrator {
    invoker: StructuredAgentInvoker,
    cache: Arc<RunCache>,
    clock: Arc<dyn Clock>,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(
        runtime: Arc<dyn AgentRuntime>,
        cache: Arc<RunCache>,
        clock: Arc<dyn Clock>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            invoker: StructuredAgentInvoker::new(
                runtime,
                settings.limits.clone(),
                settings.model.clone(),
            ),
            cache,
            clock,
            settings,
        }
    }

    /// Wire an orchestrator from resolved configuration
    pub fn from_config(config: &ResolvedConfig) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let cache = Arc::new(RunCache::new(
            clock.clone(),
            Duration::seconds(config.cache.ttl_seconds as i64),
            config.cache.max_recent_runs,
        ));
        let runtime = Arc::new(OpenAiRuntime::new(
            config.agent.base_url.clone(),
            config.agent.api_key.clone(),
            config.agent.model.clone(),
            config.agent.api_mode,
        ));
        let settings = OrchestratorSettings {
            credentials_present: config.agent.has_credentials(),
            model: config.agent.model.clone(),
            limits: config.safety.clone(),
        };
        Self::new(runtime, cache, clock, settings)
    }

    pub fn cache(&self) -> &Arc<RunCache> {
        &self.cache
    }

    /// Drive one run (or a cache replay) to completion against `consumer`.
    ///
    /// Never returns an error: every failure has already been reported to
    /// the consumer as an `error` event followed by `done`.
    #[instrument(
        skip(self, subject, consumer),
        fields(subject = %subject.trim(), topology = %topology, run_id = tracing::field::Empty)
    )]
    pub async fn start_run(
        &self,
        subject: &str,
        topology: Topology,
        consumer: &dyn FrameConsumer,
        options: RunOptions,
    ) -> RunOutcome {
        let subject = self.settings.limits.clamp_subject(subject);

        if !options.bypass_cache {
            if let Some(record) = self.cache.get_latest(&subject, topology) {
                Span::current().record("run_id", record.id.as_str());
                info!("replaying cached run");
                return match RunCache::replay(&record, consumer) {
                    Ok(_) => RunOutcome::Replayed {
                        run_id: record.id.clone(),
                    },
                    Err(e) => {
                        warn!(error = %e, "replay aborted");
                        RunOutcome::Aborted {
                            error: e.to_string(),
                        }
                    }
                };
            }
        }

        info!("starting run");
        let sink = EventSink::new(consumer, self.clock.clone());

        let result = if self.settings.credentials_present {
            self.execute(&subject, topology, &sink).await
        } else {
            Err(PipelineError::Configuration(
                MISSING_CREDENTIAL_MESSAGE.to_string(),
            ))
        };

        let terminal = match &result {
            Ok(()) => sink.done(),
            Err(e) => self.handle_run_failure(&sink, e),
        };

        let fault = match (&result, terminal) {
            (Err(e), _) if e.is_stream_fault() => Some(e.clone()),
            (_, Err(e)) => Some(e),
            _ => None,
        };
        if let Some(fault) = fault {
            warn!(error = %fault, events = sink.len(), "stream fault, run not cached");
            let _ = consumer.finish();
            return RunOutcome::Aborted {
                error: fault.to_string(),
            };
        }

        let record = self.cache.save(&subject, topology, sink.into_events());
        Span::current().record("run_id", record.id.as_str());
        if let Err(e) = consumer.finish() {
            warn!(error = %e, "failed to close stream");
        }

        match result {
            Ok(()) => {
                info!("run completed");
                RunOutcome::Completed {
                    run_id: record.id.clone(),
                }
            }
            Err(e) => RunOutcome::Failed {
                run_id: record.id.clone(),
                error: e.to_string(),
            },
        }
    }

    /// Recent runs still within their TTL
    pub fn list_recent_runs(&self) -> HistoryIndex {
        self.cache.recent_runs()
    }

    /// Full recorded run by id
    pub fn get_run(&self, id: &str) -> Option<Arc<RunRecord>> {
        self.cache.get_by_id(id)
    }

    async fn execute(
        &self,
        subject: &str,
        topology: Topology,
        sink: &EventSink<'_>,
    ) -> Result<(), PipelineError> {
        match topology {
            Topology::Sequential => self.run_sequential(subject, sink).await,
            Topology::Hierarchical => self.run_hierarchical(subject, sink).await,
        }
    }

    async fn run_sequential(&self, subject: &str, sink: &EventSink<'_>) -> Result<(), PipelineError> {
        let news = self.run_news(subject, sink, None).await?;
        let finance = self.run_finance(subject, sink, None).await?;

        let warnings = collect_warnings(&news, &finance);
        self.run_writer(subject, sink, &news, &finance, &warnings)
            .await
    }

    async fn run_hierarchical(&self, subject: &str, sink: &EventSink<'_>) -> Result<(), PipelineError> {
        // Both branches are in flight at once; the first failure wins
        let (news, finance) = tokio::try_join!(
            self.run_news(subject, sink, None),
            self.run_finance(subject, sink, None),
        )?;

        let directive = ReviewGate::new(&self.invoker)
            .review(subject, &news, &finance, sink)
            .await?;

        let mut news = RevisionSlot::new(AgentRole::NewsResearcher, news);
        if let Some(request) = directive.news.as_deref() {
            let revised = self.run_news(subject, sink, Some(request)).await?;
            news.record_revision(revised)?;
        }

        let mut finance = RevisionSlot::new(AgentRole::FinancialAnalyst, finance);
        if let Some(request) = directive.finance.as_deref() {
            let revised = self.run_finance(subject, sink, Some(request)).await?;
            finance.record_revision(revised)?;
        }

        let (news, finance) = (news.into_result(), finance.into_result());
        let mut warnings = collect_warnings(&news, &finance);
        if !directive.handoff_summary.trim().is_empty() {
            warnings.insert(0, format!("Manager: {}", directive.handoff_summary));
        }

        self.run_writer(subject, sink, &news, &finance, &warnings)
            .await
    }

    async fn run_news(
        &self,
        subject: &str,
        sink: &EventSink<'_>,
        revision: Option<&str>,
    ) -> Result<NewsResearchOutput, PipelineError> {
        let role = AgentRole::NewsResearcher;
        debug!(stage = %Stage::News, revision = revision.is_some(), "entering stage");
        sink.log(role, progress_message("searching…", revision))?;

        let data: NewsResearchOutput = self
            .invoker
            .invoke_json(&prompts::news_prompt(subject, revision))
            .await?;

        sink.raw(role, serde_json::to_value(&data).unwrap_or_default())?;
        let suffix = if data.warnings().is_empty() { "" } else { "; warnings" };
        sink.log(role, format!("done ({} items{})", data.key_events.len(), suffix))?;
        Ok(data)
    }

    async fn run_finance(
        &self,
        subject: &str,
        sink: &EventSink<'_>,
        revision: Option<&str>,
    ) -> Result<FinanceOutput, PipelineError> {
        let role = AgentRole::FinancialAnalyst;
        debug!(stage = %Stage::Finance, revision = revision.is_some(), "entering stage");
        sink.log(role, progress_message("fetching…", revision))?;

        let data: FinanceOutput = self
            .invoker
            .invoke_json(&prompts::finance_prompt(subject, revision))
            .await?;

        sink.raw(role, serde_json::to_value(&data).unwrap_or_default())?;
        let suffix = if data.is_mock == Some(true) { "; mock" } else { "" };
        sink.log(role, format!("done ({} metrics{})", data.key_metrics.len(), suffix))?;
        Ok(data)
    }

    async fn run_writer(
        &self,
        subject: &str,
        sink: &EventSink<'_>,
        news: &NewsResearchOutput,
        finance: &FinanceOutput,
        warnings: &[String],
    ) -> Result<(), PipelineError> {
        let role = AgentRole::ReportWriter;
        debug!(stage = %Stage::Writing, warnings = warnings.len(), "entering stage");
        sink.log(role, "drafting memo…")?;

        let prompt = prompts::writer_prompt(subject, news, finance, warnings);
        let markdown = self.invoker.invoke_markdown(role, &prompt).await?;

        sink.raw(role, serde_json::Value::String(markdown.clone()))?;
        sink.final_memo(&markdown)?;
        sink.log(role, "done")?;
        Ok(())
    }

    /// Report a failure as `error` then `done`
    fn handle_run_failure(&self, sink: &EventSink<'_>, err: &PipelineError) -> Result<(), PipelineError> {
        error!(error = %err, kind = err.kind(), "run failed");

        let mut details = serde_json::json!({ "kind": err.kind() });
        if let (Some(role), Some(map)) = (err.role(), details.as_object_mut()) {
            map.insert("role".to_string(), serde_json::json!(role));
        }

        let reported = sink.error(&err.to_string(), Some(details));
        let done = sink.done();
        reported.and(done)
    }
}

fn progress_message(default: &str, revision: Option<&str>) -> String {
    match revision {
        Some(request) => format!("revision requested: {}", request),
        None => default.to_string(),
    }
}

/// Role-reported warnings, prefixed with their source
fn collect_warnings(news: &NewsResearchOutput, finance: &FinanceOutput) -> Vec<String> {
    let warnings: Vec<String> = news
        .warnings()
        .iter()
        .map(|w| format!("News: {}", w))
        .chain(finance.warnings().iter().map(|w| format!("Finance: {}", w)))
        .collect();
    for warning in &warnings {
        warn!(%warning, "upstream warning");
    }
    warnings
}
