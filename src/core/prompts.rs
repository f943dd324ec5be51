//! Role instructions and prompt builders.

use serde::Serialize;

use crate::domain::{AgentRole, FinanceOutput, NewsResearchOutput};

pub const DEFAULT_NEWS_REVISION: &str = "Please add at least 5 recent news items with links.";
pub const DEFAULT_FINANCE_REVISION: &str =
    "Please provide at least 5 financial metrics or explain why not possible.";

/// System instructions for a role
pub fn instructions(role: AgentRole) -> String {
    let lines: &[&str] = match role {
        AgentRole::NewsResearcher => &[
            "Role: News Researcher.",
            "Goal: Find news, press releases, product launches, partnerships, controversies and hiring or layoff signals about the competitor from the last 12 months.",
            "Call the web_search tool at least once.",
            "Prefer sources from the last 12 months and label anything older.",
            "Return ONLY one JSON object with keys:",
            "key_events: array of {date, title, summary, url}",
            "positioning_notes: array of strings",
            "product_mentions: array of strings",
            "red_flags: array of strings",
            "warnings?: array of strings",
            "Include urls and dates for key_events, and at least 5 key_events when possible.",
        ],
        AgentRole::FinancialAnalyst => &[
            "Role: Financial Analyst.",
            "Goal: Summarize financial performance and key metrics. Public companies: stock performance, revenue trend, profitability. Private companies: infer carefully from available sources and label estimates.",
            "Call finance_lookup(company) at least once.",
            "Return ONLY one JSON object with keys:",
            "company_type: 'public' | 'private' | 'unknown'",
            "key_metrics: { metric: value } (at least 5 when possible)",
            "performance_summary: string",
            "risks: string[]",
            "confidence: 'high' | 'medium' | 'low'",
            "is_mock?: boolean",
            "warnings?: string[]",
            "sources?: string[]",
            "If the finance tool returns mock data, set is_mock true and confidence low.",
        ],
        AgentRole::Manager => &[
            "Role: Research Manager.",
            "Goal: Check the specialists' work for completeness and request at most one revision before the memo is written.",
            "Quality checks:",
            "- at least 5 news items with links, or an explicit explanation of the gap",
            "- at least 5 financial metrics, or an explicit explanation of the gap",
            "When asked to review outputs, respond with one JSON object with keys:",
            "needs_news_revision: boolean",
            "news_revision_request?: string",
            "needs_finance_revision: boolean",
            "finance_revision_request?: string",
            "handoff_summary: string (what to tell the ReportWriter)",
        ],
        AgentRole::ReportWriter => &[
            "Role: Strategy & Insights Writer.",
            "Goal: Write a polished business memo combining the news and financial findings into an actionable competitor brief.",
            "Output ONLY markdown with these sections:",
            "Executive Summary (5 bullets)",
            "Who They Are (positioning)",
            "Recent Moves (chronological bullets with links)",
            "Financial Snapshot (table)",
            "Threats & Opportunities (bullets)",
            "Recommended Actions (3-5 actions)",
            "Sources (list of links)",
            "Stay internally consistent and label estimates or mocked data.",
        ],
    };
    lines.join("\n")
}

pub fn news_prompt(subject: &str, revision: Option<&str>) -> String {
    let mut lines = vec![
        format!("Competitor: {}", subject),
        "Task: Gather at least 5 key events from the last 12 months with links.".to_string(),
    ];
    if let Some(request) = revision {
        lines.push(format!("Revision request: {}", request));
    }
    lines.push(
        "Use web_search with queries like: \"<competitor> press release\", \"<competitor> partnership\", \"<competitor> product launch\", \"<competitor> layoffs\"."
            .to_string(),
    );
    lines.join("\n")
}

pub fn finance_prompt(subject: &str, revision: Option<&str>) -> String {
    let mut lines = vec![
        format!("Company: {}", subject),
        "Task: Provide at least 5 key financial metrics when possible; if not possible, explain why and label estimates.".to_string(),
    ];
    if let Some(request) = revision {
        lines.push(format!("Revision request: {}", request));
    }
    lines.push("You must call finance_lookup(company).".to_string());
    lines.join("\n")
}

pub fn review_prompt(subject: &str, news: &NewsResearchOutput, finance: &FinanceOutput) -> String {
    [
        format!("Competitor: {}", subject),
        "Review the outputs below and decide if revisions are needed.".to_string(),
        format!("NewsResearcher JSON:\n{}", pretty(news)),
        format!("FinancialAnalyst JSON:\n{}", pretty(finance)),
    ]
    .join("\n\n")
}

pub fn writer_prompt(
    subject: &str,
    news: &NewsResearchOutput,
    finance: &FinanceOutput,
    warnings: &[String],
) -> String {
    let mut sections = vec![format!("Competitor: {}", subject)];
    if !warnings.is_empty() {
        sections.push(format!("Global warnings:\n- {}", warnings.join("\n- ")));
    }
    sections.push(format!("\nNewsResearcher JSON:\n{}", pretty(news)));
    sections.push(format!("\nFinancialAnalyst JSON:\n{}", pretty(finance)));
    sections.push("\nWrite the memo now.".to_string());
    sections.join("\n\n")
}

fn pretty<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CompanyType, Confidence};
    use std::collections::BTreeMap;

    fn news() -> NewsResearchOutput {
        NewsResearchOutput {
            key_events: Vec::new(),
            positioning_notes: vec!["Premium tier".to_string()],
            product_mentions: Vec::new(),
            red_flags: Vec::new(),
            warnings: None,
        }
    }

    fn finance() -> FinanceOutput {
        FinanceOutput {
            company: "Acme".to_string(),
            company_type: CompanyType::Private,
            key_metrics: BTreeMap::new(),
            performance_summary: "Unknown".to_string(),
            risks: Vec::new(),
            confidence: Confidence::Low,
            is_mock: Some(true),
            warnings: None,
            sources: None,
        }
    }

    #[test]
    fn test_every_role_has_instructions() {
        for role in AgentRole::ALL {
            assert!(instructions(role).starts_with("Role: "));
        }
    }

    #[test]
    fn test_revision_request_is_appended() {
        let plain = news_prompt("Acme", None);
        assert!(!plain.contains("Revision request"));

        let revised = news_prompt("Acme", Some("Add links"));
        assert!(revised.starts_with("Competitor: Acme\n"));
        assert!(revised.contains("Revision request: Add links"));

        let finance = finance_prompt("Acme", Some("More metrics"));
        assert!(finance.contains("Revision request: More metrics\nYou must call finance_lookup(company)."));
    }

    #[test]
    fn test_writer_prompt_warnings_block() {
        let warnings = vec!["Manager: focus on pricing".to_string(), "News: search degraded".to_string()];
        let prompt = writer_prompt("Acme", &news(), &finance(), &warnings);
        assert!(prompt.contains("Global warnings:\n- Manager: focus on pricing\n- News: search degraded"));
        assert!(prompt.contains("\"is_mock\": true"));
        assert!(prompt.ends_with("Write the memo now."));

        let prompt = writer_prompt("Acme", &news(), &finance(), &[]);
        assert!(!prompt.contains("Global warnings"));
    }

    #[test]
    fn test_review_prompt_embeds_both_outputs() {
        let prompt = review_prompt("Acme", &news(), &finance());
        assert!(prompt.contains("NewsResearcher JSON:\n{"));
        assert!(prompt.contains("FinancialAnalyst JSON:\n{"));
    }
}
