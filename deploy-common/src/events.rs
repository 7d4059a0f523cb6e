// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::{
    cmp::Ordering,
    hash::{Hash, Hasher},
};

use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};

/// An update emitted by the installer while a deployment is in progress.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct ProcessUpdate {
    /// The installation phase this update belongs to.
    pub phase: InstallationPhase,

    /// What happened.
    pub event: ProcessEvent,

    /// The component this update is about, if any.
    ///
    /// If this is `None`, the update concerns the phase as a whole.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<Component>,
}

impl ProcessUpdate {
    /// Creates a phase-level update.
    pub fn new(phase: InstallationPhase, event: ProcessEvent) -> Self {
        Self { phase, event, component: None }
    }

    /// Creates an update for a component within a phase.
    pub fn for_component(
        phase: InstallationPhase,
        event: ProcessEvent,
        component: Component,
    ) -> Self {
        Self { phase, event, component: Some(component) }
    }
}

/// A top-level stage of the deployment process.
///
/// Phases other than the four well-known ones are triggered by callers before
/// or after the deployment itself, and are identified by a free-form name.
///
/// Phases are compared by identifier, so `Custom("InstallComponents")` is the
/// same phase as `InstallComponents`. Use [`Self::canonical`] to resolve such
/// a value to its well-known variant.
#[derive(Clone, Debug, DeserializeFromStr, SerializeDisplay)]
#[derive(strum::AsRefStr, strum::Display, strum::EnumString)]
pub enum InstallationPhase {
    InstallPreRequisites,
    UninstallPreRequisites,
    InstallComponents,
    UninstallComponents,
    #[strum(default)]
    Custom(String),
}

impl InstallationPhase {
    /// Returns the identifier for this phase.
    pub fn as_str(&self) -> &str {
        self.as_ref()
    }

    /// Returns the well-known variant if this is a custom phase named after
    /// one.
    pub fn canonical(self) -> Self {
        match self {
            InstallationPhase::Custom(name) => InstallationPhase::from(&*name),
            other => other,
        }
    }
}

impl InstallationPhase {
    pub fn from(s: &str) -> Self {
        // Unknown identifiers parse as `Custom`, so this never fails.
        s.parse()
            .unwrap_or_else(|_| InstallationPhase::Custom(s.to_owned()))
    }
}

impl PartialEq for InstallationPhase {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for InstallationPhase {}

impl Hash for InstallationPhase {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl PartialOrd for InstallationPhase {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for InstallationPhase {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

/// The kind of a [`ProcessUpdate`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
#[derive(strum::Display)]
pub enum ProcessEvent {
    ProcessStart,
    ProcessRunning,
    ProcessFinished,
    ProcessExecutionFailure,
    ProcessTimeoutFailure,
    ProcessForceQuitFailure,
}

impl ProcessEvent {
    /// Returns true if this event reports that the process failed.
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            ProcessEvent::ProcessExecutionFailure
                | ProcessEvent::ProcessTimeoutFailure
                | ProcessEvent::ProcessForceQuitFailure
        )
    }
}

/// A named unit of work reported within a phase.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct Component {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    pub status: ComponentStatus,
}

impl Component {
    pub fn new(name: impl Into<String>, status: ComponentStatus) -> Self {
        Self { name: name.into(), namespace: None, status }
    }

    pub fn with_namespace(self, namespace: impl Into<String>) -> Self {
        Self { namespace: Some(namespace.into()), ..self }
    }
}

/// The result reported for a [`Component`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
    Installed,
    Uninstalled,
    NotInstalled,
    Error,
}

impl ComponentStatus {
    #[inline]
    pub fn is_error(self) -> bool {
        matches!(self, ComponentStatus::Error)
    }
}
