//! Review gate and bounded revision state.
//!
//! The manager reviews both specialist outputs exactly once per run. Each
//! flagged specialist may be re-invoked at most once; there is no second
//! review cycle.

use tracing::info;

use crate::domain::{AgentRole, FinanceOutput, ManagerReview, NewsResearchOutput};

use super::error::PipelineError;
use super::event_sink::EventSink;
use super::invoker::StructuredAgentInvoker;
use super::prompts::{self, DEFAULT_FINANCE_REVISION, DEFAULT_NEWS_REVISION};

/// Outcome of the single review.
///
/// A `Some` request means the sub-task is flagged for revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionDirective {
    pub news: Option<String>,
    pub finance: Option<String>,
    pub handoff_summary: String,
}

impl From<ManagerReview> for RevisionDirective {
    fn from(review: ManagerReview) -> Self {
        let request = |flagged: bool, text: Option<String>, fallback: &str| {
            flagged.then(|| {
                text.filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| fallback.to_string())
            })
        };
        Self {
            news: request(
                review.needs_news_revision,
                review.news_revision_request,
                DEFAULT_NEWS_REVISION,
            ),
            finance: request(
                review.needs_finance_revision,
                review.finance_revision_request,
                DEFAULT_FINANCE_REVISION,
            ),
            handoff_summary: review.handoff_summary,
        }
    }
}

impl RevisionDirective {
    pub fn needs_any(&self) -> bool {
        self.news.is_some() || self.finance.is_some()
    }
}

/// Invokes the reviewing role against the two specialist outputs
pub struct ReviewGate<'a> {
    invoker: &'a StructuredAgentInvoker,
}

impl<'a> ReviewGate<'a> {
    pub fn new(invoker: &'a StructuredAgentInvoker) -> Self {
        Self { invoker }
    }

    pub async fn review(
        &self,
        subject: &str,
        news: &NewsResearchOutput,
        finance: &FinanceOutput,
        sink: &EventSink<'_>,
    ) -> Result<RevisionDirective, PipelineError> {
        sink.log(AgentRole::Manager, "reviewing completeness…")?;

        let input = prompts::review_prompt(subject, news, finance);
        let review: ManagerReview = self.invoker.invoke_json(&input).await?;

        sink.raw(AgentRole::Manager, serde_json::to_value(&review).unwrap_or_default())?;
        sink.log(AgentRole::Manager, "review complete")?;

        let directive = RevisionDirective::from(review);
        info!(
            news_revision = directive.news.is_some(),
            finance_revision = directive.finance.is_some(),
            "review complete"
        );
        Ok(directive)
    }
}

/// One specialist's result plus how many revisions it has had (0 or 1)
#[derive(Debug, Clone)]
pub struct RevisionSlot<T> {
    role: AgentRole,
    attempts: u8,
    result: T,
}

impl<T> RevisionSlot<T> {
    /// Maximum revisions per role
    pub const MAX_REVISIONS: u8 = 1;

    pub fn new(role: AgentRole, initial: T) -> Self {
        Self {
            role,
            attempts: 0,
            result: initial,
        }
    }

    pub fn role(&self) -> AgentRole {
        self.role
    }

    pub fn attempts(&self) -> u8 {
        self.attempts
    }

    pub fn can_revise(&self) -> bool {
        self.attempts < Self::MAX_REVISIONS
    }

    /// Replace the result with its revision; refuses a second one
    pub fn record_revision(&mut self, revised: T) -> Result<(), PipelineError> {
        if !self.can_revise() {
            return Err(PipelineError::RevisionLimit { role: self.role });
        }
        self.attempts += 1;
        self.result = revised;
        Ok(())
    }

    pub fn result(&self) -> &T {
        &self.result
    }

    pub fn into_result(self) -> T {
        self.result
    }
}
