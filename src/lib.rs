//! rivalbrief - Multi-agent competitor research orchestrator
//!
//! Coordinates four agent roles (researcher, analyst, reviewer, writer)
//! into one research run and streams its progress as server-sent events.
//!
//! # Architecture
//!
//! Every run is an ordered log of events:
//! - Each event is framed and delivered live as it is emitted
//! - The same events are recorded and cached for 15 minutes
//! - A cache hit replays the recorded frames without invoking any role
//!
//! # Modules
//!
//! - `adapters`: Agent runtime integrations (OpenAI-compatible HTTP)
//! - `core`: Orchestration logic (EventSink, RunCache, Invoker, ReviewGate)
//! - `domain`: Data structures (Event, RunRecord, role outputs)
//! - `server`: HTTP surface (SSE runs, history)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Research a competitor, streaming frames to stdout
//! rivalbrief run "Acme Corp" --topology hierarchical
//!
//! # Serve the HTTP API
//! rivalbrief serve --address 127.0.0.1:3000
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod server;

// Re-export main types at crate root for convenience
pub use core::{Orchestrator, PipelineError, RunCache, RunOptions, RunOutcome};
pub use domain::{AgentRole, Event, EventKind, RunRecord, RunState, Topology};
