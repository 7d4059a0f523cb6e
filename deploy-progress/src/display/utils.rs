// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Utility displayers.

use std::{fmt, time::Duration};

/// Displays a duration in an `hh:mm:ss` format.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use deploy_progress::display::ElapsedDisplay;
///
/// let display = ElapsedDisplay::new(Duration::from_secs(3));
/// assert_eq!(display.to_string(), "00:00:03");
/// let display = ElapsedDisplay::new(Duration::from_secs(3 * 3600 + 62));
/// assert_eq!(display.to_string(), "03:01:02");
/// ```
#[derive(Clone, Copy, Debug)]
pub struct ElapsedDisplay {
    elapsed: Duration,
}

impl ElapsedDisplay {
    pub fn new(elapsed: Duration) -> Self {
        Self { elapsed }
    }
}

impl fmt::Display for ElapsedDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total_secs = self.elapsed.as_secs();
        let hours = total_secs / 3600;
        let minutes = (total_secs % 3600) / 60;
        let seconds = total_secs % 60;
        write!(f, "{:02}:{:02}:{:02}", hours, minutes, seconds)
    }
}
