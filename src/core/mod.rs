//! Core orchestration logic.
//!
//! This module contains:
//! - EventSink: Live emission plus recording of run events
//! - RunCache: TTL cache of recorded runs and the recent-runs index
//! - StructuredAgentInvoker: Envelope extraction, parsing, validation
//! - ReviewGate: Single review with bounded revisions
//! - Orchestrator: Main execution engine

pub mod clock;
pub mod error;
pub mod event_sink;
pub mod invoker;
pub mod orchestrator;
pub mod prompts;
pub mod review;
pub mod run_cache;
pub mod safety;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::PipelineError;
pub use event_sink::{encode_frame, EventSink, FrameConsumer, MemoryConsumer, StdoutConsumer};
pub use invoker::{extract_text, parse_json_text, StructuredAgentInvoker};
pub use orchestrator::{Orchestrator, OrchestratorSettings, RunOptions, RunOutcome};
pub use review::{ReviewGate, RevisionDirective, RevisionSlot};
pub use run_cache::RunCache;
pub use safety::SafetyLimits;
