//! Live + recording event sink.
//!
//! Every event is timestamped once, appended to the in-memory log and then
//! pushed to the live consumer as an encoded frame, under one lock so both
//! observe the same order. The recorded log is the canonical copy used for
//! caching and replay.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;

use crate::domain::{AgentRole, Event};

use super::clock::Clock;
use super::error::PipelineError;

/// Encode one event as a push frame: named type, payload, blank line.
///
/// String payloads pass through verbatim; everything else is JSON.
pub fn encode_frame(event: &Event) -> String {
    let payload = match &event.data {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    format!("event: {}\ndata: {}\n\n", event.event, payload)
}

/// Receiver of encoded frames (an HTTP stream, stdout, a test buffer)
pub trait FrameConsumer: Send + Sync {
    /// Accept one frame; an error is a stream fault
    fn accept(&self, frame: &str) -> Result<(), PipelineError>;

    /// Signal that no more frames will follow
    fn finish(&self) -> Result<(), PipelineError> {
        Ok(())
    }
}

impl FrameConsumer for UnboundedSender<String> {
    fn accept(&self, frame: &str) -> Result<(), PipelineError> {
        self.send(frame.to_string())
            .map_err(|_| PipelineError::StreamFault("consumer disconnected".to_string()))
    }
}

/// Writes frames to stdout
#[derive(Debug, Default)]
pub struct StdoutConsumer;

impl FrameConsumer for StdoutConsumer {
    fn accept(&self, frame: &str) -> Result<(), PipelineError> {
        let mut stdout = std::io::stdout().lock();
        stdout
            .write_all(frame.as_bytes())
            .and_then(|_| stdout.flush())
            .map_err(|e| PipelineError::StreamFault(e.to_string()))
    }
}

/// Collects frames in memory
#[derive(Debug, Default)]
pub struct MemoryConsumer {
    frames: Mutex<Vec<String>>,
    finished: AtomicBool,
}

impl MemoryConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Vec<String> {
        self.frames
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// All frames concatenated, as they would appear on the wire
    pub fn transcript(&self) -> String {
        self.frames().concat()
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

impl FrameConsumer for MemoryConsumer {
    fn accept(&self, frame: &str) -> Result<(), PipelineError> {
        if self.is_finished() {
            return Err(PipelineError::StreamFault("stream already closed".to_string()));
        }
        self.frames
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(frame.to_string());
        Ok(())
    }

    fn finish(&self) -> Result<(), PipelineError> {
        self.finished.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Append-only sink for one run
pub struct EventSink<'a> {
    consumer: &'a dyn FrameConsumer,
    clock: Arc<dyn Clock>,
    recorded: Mutex<Vec<Event>>,
}

impl<'a> EventSink<'a> {
    pub fn new(consumer: &'a dyn FrameConsumer, clock: Arc<dyn Clock>) -> Self {
        Self {
            consumer,
            clock,
            recorded: Mutex::new(Vec::new()),
        }
    }

    /// Record an event, then push it live.
    ///
    /// The event stays recorded even when the consumer rejects it.
    pub fn emit(&self, event: Event) -> Result<(), PipelineError> {
        let frame = encode_frame(&event);
        let mut recorded = self.recorded.lock().unwrap_or_else(|e| e.into_inner());
        recorded.push(event);
        self.consumer.accept(&frame)
    }

    pub fn log(&self, agent: AgentRole, message: impl Into<String>) -> Result<(), PipelineError> {
        self.emit(Event::log(self.clock.now(), agent, message))
    }

    pub fn raw(&self, agent: AgentRole, payload: Value) -> Result<(), PipelineError> {
        self.emit(Event::raw(self.clock.now(), agent, payload))
    }

    pub fn final_memo(&self, markdown: &str) -> Result<(), PipelineError> {
        self.emit(Event::final_memo(self.clock.now(), markdown))
    }

    pub fn error(&self, message: &str, details: Option<Value>) -> Result<(), PipelineError> {
        self.emit(Event::error(self.clock.now(), message, details))
    }

    pub fn done(&self) -> Result<(), PipelineError> {
        self.emit(Event::done(self.clock.now()))
    }

    /// Number of events recorded so far
    pub fn len(&self) -> usize {
        self.recorded.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take the recorded log
    pub fn into_events(self) -> Vec<Event> {
        self.recorded.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::domain::EventKind;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn clock() -> Arc<dyn Clock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap(),
        ))
    }

    struct RejectingConsumer;

    impl FrameConsumer for RejectingConsumer {
        fn accept(&self, _frame: &str) -> Result<(), PipelineError> {
            Err(PipelineError::StreamFault("broken pipe".to_string()))
        }
    }

    #[test]
    fn test_encode_frame_format() {
        let event = Event::done(Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap());
        assert_eq!(
            encode_frame(&event),
            "event: done\ndata: {\"ts\":\"2025-06-01T09:00:00.000Z\"}\n\n"
        );
    }

    #[test]
    fn test_encode_string_payload_verbatim() {
        let event = Event {
            event: EventKind::Final,
            data: Value::String("plain text".to_string()),
        };
        assert_eq!(encode_frame(&event), "event: final\ndata: plain text\n\n");
    }

    #[test]
    fn test_live_and_recorded_share_order_and_bytes() {
        let consumer = MemoryConsumer::new();
        let sink = EventSink::new(&consumer, clock());

        sink.log(AgentRole::NewsResearcher, "searching…").unwrap();
        sink.raw(AgentRole::NewsResearcher, json!({"key_events": []}))
            .unwrap();
        sink.done().unwrap();
        assert_eq!(sink.len(), 3);

        let recorded = sink.into_events();
        let reencoded: Vec<String> = recorded.iter().map(encode_frame).collect();
        assert_eq!(consumer.frames(), reencoded);
        assert_eq!(recorded[2].event, EventKind::Done);
    }

    #[test]
    fn test_rejected_event_is_still_recorded() {
        let consumer = RejectingConsumer;
        let sink = EventSink::new(&consumer, clock());

        let result = sink.log(AgentRole::Manager, "reviewing completeness…");
        assert!(matches!(result, Err(PipelineError::StreamFault(_))));
        assert_eq!(sink.into_events().len(), 1);
    }

    #[test]
    fn test_memory_consumer_rejects_after_finish() {
        let consumer = MemoryConsumer::new();
        consumer.accept("event: done\ndata: {}\n\n").unwrap();
        consumer.finish().unwrap();
        assert!(consumer.is_finished());
        assert!(consumer.accept("late").is_err());
        assert_eq!(consumer.frames().len(), 1);
    }
}
