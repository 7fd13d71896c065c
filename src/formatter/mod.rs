//! Turning record context into display strings.
//!
//! The snapshot builder calls a [`Formatter`] once per record and embeds the
//! result verbatim as `formatted_data`.

pub mod plain;

pub use plain::PlainFormatter;

use crate::core::{FrozenMap, OrderedMap};
use serde_json::Value;

/// Renders a record's context as key → display string
pub trait Formatter {
    fn format(&self, context: &FrozenMap<String, Value>) -> OrderedMap<String, String>;
}
