//! Actix middleware shared by every inbound surface.

pub mod trace;

pub use trace::{TRACE_ID_HEADER, Trace, TraceId};
