//! Domain types for the research pipeline.
//!
//! This module contains the core data structures:
//! - Events: Immutable records appended to a run's log
//! - Run: Recorded runs, topologies and derived run state
//! - Role: The four agent roles and their output contracts
//! - Outputs: Typed, validated role outputs

pub mod events;
pub mod outputs;
pub mod role;
pub mod run;

// Re-export commonly used types
pub use events::{format_ts, ErrorData, Event, EventKind, FinalData, LogData, RawData};
pub use outputs::{
    CompanyType, Confidence, FinanceOutput, KeyEvent, ManagerReview, MetricValue,
    NewsResearchOutput, RoleOutput,
};
pub use role::{AgentRole, OutputContract};
pub use run::{HistoryIndex, RunRecord, RunState, RunSummary, Stage, Topology};
