// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The JSON-lines form of installer event logs.
//!
//! Each non-empty line holds exactly one [`ProcessUpdate`] as a JSON object.

use thiserror::Error;

use crate::ProcessUpdate;

/// Parses a single line of an event log.
///
/// Returns `Ok(None)` for lines that only contain whitespace. `line_number` is
/// 1-based and is only used for error reporting.
pub fn parse_update_line(
    line_number: usize,
    line: &str,
) -> Result<Option<ProcessUpdate>, ParseUpdateError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(line)
        .map(Some)
        .map_err(|err| ParseUpdateError { line_number, err })
}

/// Serializes an update as a single line, without the trailing newline.
pub fn format_update_line(
    update: &ProcessUpdate,
) -> Result<String, serde_json::Error> {
    serde_json::to_string(update)
}

/// An error returned by [`parse_update_line`].
#[derive(Debug, Error)]
#[error("error parsing event log line {line_number}")]
pub struct ParseUpdateError {
    pub line_number: usize,
    #[source]
    pub err: serde_json::Error,
}
