//! Data model shared across the change-propagation engine: events, the
//! metadata envelope every event carries, and the binding tree produced by
//! the matcher.

mod bindings;
mod event;
mod pointer;

pub use bindings::Bindings;
pub use event::{Event, EventMeta, EventParseError};
pub use pointer::get_path;

pub use serde_json::Value;
