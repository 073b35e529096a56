//! Page-side read scripts and the typed snapshots they produce
//!
//! This module provides:
//! - TableSnapshot: one-shot read of a results table, with the pager heuristics
//! - DropdownOption: the options of a `<select>`
//!
//! The scripts are evaluated by the session and return JSON strings, which are
//! parsed here so that every heuristic can be tested without a browser.

pub mod options;
pub mod table;

pub use options::DropdownOption;
pub use table::{PagerTarget, TableLink, TableRow, TableSnapshot, page_number_in};

use crate::error::{BrowserError, Result};

/// Function expression that serializes a table; called with the table node and a row-scoped locator function
pub const READ_TABLE_JS: &str = include_str!("read_table.js");

/// Function expression that serializes the options of a select; called with the node and a selected-only flag
pub const READ_OPTIONS_JS: &str = include_str!("read_options.js");

/// Parse the JSON string returned by a read script. `null` maps to `None`.
pub fn parse_script_json<T: serde::de::DeserializeOwned>(value: Option<serde_json::Value>) -> Result<Option<T>> {
    let json_str = match value {
        None | Some(serde_json::Value::Null) => return Ok(None),
        Some(serde_json::Value::String(s)) => s,
        Some(other) => {
            return serde_json::from_value(other)
                .map(Some)
                .map_err(|e| BrowserError::EvaluationFailed(format!("Failed to deserialize script result: {}", e)));
        }
    };

    serde_json::from_str(&json_str)
        .map(Some)
        .map_err(|e| BrowserError::EvaluationFailed(format!("Failed to parse script JSON: {}", e)))
}
