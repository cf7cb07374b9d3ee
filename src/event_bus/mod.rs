//! Run-scoped event fan-out to pluggable sinks.
//!
//! The module is organized around a flume-backed [`EventBus`] that drains
//! emitted [`RunEvent`]s into configured [`EventSink`]s (stdout, memory,
//! channel) from a background listener task.

pub mod bus;
pub mod event;
pub mod sink;

pub use bus::EventBus;
pub use event::{DiagnosticEvent, RunEvent, StepEvent, RUN_END_SCOPE};
pub use sink::{ChannelSink, EventSink, MemorySink, StdOutSink};
