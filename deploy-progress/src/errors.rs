// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use deploy_common::{InstallationPhase, ProcessEvent};
use thiserror::Error;

/// An error detected while rendering installer updates.
///
/// These are forwarded to the caller's error sink, and never stop the
/// processing of later updates.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum UpdateError {
    #[error(
        "illegal state: start step for installation phase '{phase}' \
         already exists"
    )]
    StepAlreadyExists { phase: InstallationPhase },

    #[error(
        "illegal state: step for installation phase '{phase}' does not exist"
    )]
    StepDoesNotExist { phase: InstallationPhase },

    #[error("deployment phase '{phase}' failed: {event}")]
    PhaseFailed { phase: InstallationPhase, event: ProcessEvent },

    #[error("deployment of component '{component}' failed")]
    ComponentFailed { phase: InstallationPhase, component: String },
}

impl UpdateError {
    /// Returns the phase this error was reported for.
    pub fn phase(&self) -> &InstallationPhase {
        match self {
            UpdateError::StepAlreadyExists { phase }
            | UpdateError::StepDoesNotExist { phase }
            | UpdateError::PhaseFailed { phase, .. }
            | UpdateError::ComponentFailed { phase, .. } => phase,
        }
    }

    /// Returns true if this error is an update ordering violation rather than
    /// a failure reported by the installer.
    pub fn is_illegal_state(&self) -> bool {
        matches!(
            self,
            UpdateError::StepAlreadyExists { .. }
                | UpdateError::StepDoesNotExist { .. }
        )
    }
}

/// An error returned when [`AsyncUi`](crate::AsyncUi) is used outside of its
/// running state.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum LifecycleError {
    #[error("duplicate call of start detected")]
    DuplicateStart,

    #[error("cannot {operation} because the progress display is not running")]
    NotRunning { operation: &'static str },
}
