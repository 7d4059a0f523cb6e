// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Replays installer updates from a JSON-lines event log.

use std::{fmt, str::FromStr};

use anyhow::{Context, Result, bail};
use camino::Utf8PathBuf;
use deploy_common::{ProcessUpdate, parse_update_line};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, BufReader},
    sync::mpsc,
};

/// Where an event log is read from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EventSource {
    Stdin,
    File(Utf8PathBuf),
}

impl EventSource {
    /// Opens the event log for reading.
    pub async fn open(&self) -> Result<Box<dyn AsyncBufRead + Send + Unpin>> {
        match self {
            EventSource::Stdin => {
                Ok(Box::new(BufReader::new(tokio::io::stdin())))
            }
            EventSource::File(path) => {
                let file = tokio::fs::File::open(path)
                    .await
                    .with_context(|| format!("error opening `{path}`"))?;
                Ok(Box::new(BufReader::new(file)))
            }
        }
    }
}

impl FromStr for EventSource {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "-" {
            Ok(EventSource::Stdin)
        } else {
            Ok(EventSource::File(s.into()))
        }
    }
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventSource::Stdin => f.write_str("stdin"),
            EventSource::File(path) => write!(f, "`{path}`"),
        }
    }
}

/// Reads updates from `reader` and sends them through `sender`.
///
/// Returns the number of updates sent. Stops at the first line that can't be
/// parsed.
pub async fn replay_updates<R>(
    log: &slog::Logger,
    reader: R,
    sender: &mpsc::Sender<ProcessUpdate>,
) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut line_number = 0;
    let mut sent = 0;

    while let Some(line) =
        lines.next_line().await.context("error reading event log")?
    {
        line_number += 1;
        let Some(update) = parse_update_line(line_number, &line)? else {
            continue;
        };
        slog::debug!(
            log,
            "replaying update";
            "line" => line_number,
            "phase" => %update.phase,
            "event" => %update.event,
        );
        if sender.send(update).await.is_err() {
            bail!("progress display stopped receiving installer updates");
        }
        sent += 1;
    }

    Ok(sent)
}
