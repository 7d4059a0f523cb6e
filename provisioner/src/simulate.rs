// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A simulated installer, used when no event log is provided.

use std::time::Duration;

use anyhow::{Result, bail};
use deploy_common::{
    Component, ComponentStatus, InstallationPhase, ProcessEvent, ProcessUpdate,
};
use tokio::sync::mpsc;

/// The direction of a deployment.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeployKind {
    Deploy,
    Undeploy,
}

impl DeployKind {
    fn prerequisites_phase(self) -> InstallationPhase {
        match self {
            DeployKind::Deploy => InstallationPhase::InstallPreRequisites,
            DeployKind::Undeploy => InstallationPhase::UninstallPreRequisites,
        }
    }

    fn components_phase(self) -> InstallationPhase {
        match self {
            DeployKind::Deploy => InstallationPhase::InstallComponents,
            DeployKind::Undeploy => InstallationPhase::UninstallComponents,
        }
    }

    fn success_status(self) -> ComponentStatus {
        match self {
            DeployKind::Deploy => ComponentStatus::Installed,
            DeployKind::Undeploy => ComponentStatus::Uninstalled,
        }
    }
}

/// Emits the updates an installer would report for a deployment.
#[derive(Clone, Debug)]
pub struct SimulatedInstaller {
    log: slog::Logger,
    kind: DeployKind,
    components: Vec<String>,
    fail_component: Option<String>,
    interval: Duration,
}

impl SimulatedInstaller {
    pub fn new(
        log: &slog::Logger,
        kind: DeployKind,
        components: Vec<String>,
    ) -> Self {
        Self {
            log: log.new(slog::o!("component" => "SimulatedInstaller")),
            kind,
            components,
            fail_component: None,
            interval: Duration::ZERO,
        }
    }

    /// Reports the component with the given name as failed.
    pub fn with_failing_component(self, name: Option<String>) -> Self {
        Self { fail_component: name, ..self }
    }

    /// Waits for `interval` before emitting each update.
    pub fn with_interval(self, interval: Duration) -> Self {
        Self { interval, ..self }
    }

    /// Returns the full sequence of updates.
    ///
    /// Prerequisites are installed before components on deploy, and removed
    /// after them on undeploy.
    pub fn updates(&self) -> Vec<ProcessUpdate> {
        let prerequisites = self.kind.prerequisites_phase();
        let prerequisite_updates = [
            ProcessUpdate::new(
                prerequisites.clone(),
                ProcessEvent::ProcessStart,
            ),
            ProcessUpdate::new(prerequisites, ProcessEvent::ProcessFinished),
        ];

        let phase = self.kind.components_phase();
        let mut component_updates =
            vec![ProcessUpdate::new(phase.clone(), ProcessEvent::ProcessStart)];
        let mut any_failed = false;
        for name in &self.components {
            let status = if self.fail_component.as_ref() == Some(name) {
                any_failed = true;
                ComponentStatus::Error
            } else {
                self.kind.success_status()
            };
            component_updates.push(ProcessUpdate::for_component(
                phase.clone(),
                ProcessEvent::ProcessRunning,
                Component::new(name, status).with_namespace("kyma-system"),
            ));
        }
        let finish = if any_failed {
            ProcessEvent::ProcessExecutionFailure
        } else {
            ProcessEvent::ProcessFinished
        };
        component_updates.push(ProcessUpdate::new(phase, finish));

        match self.kind {
            DeployKind::Deploy => prerequisite_updates
                .into_iter()
                .chain(component_updates)
                .collect(),
            DeployKind::Undeploy => component_updates
                .into_iter()
                .chain(prerequisite_updates)
                .collect(),
        }
    }

    /// Sends every update through `sender`.
    ///
    /// Fails if the receiving side goes away before all updates were sent,
    /// which happens when the run is cancelled.
    pub async fn run(self, sender: mpsc::Sender<ProcessUpdate>) -> Result<()> {
        if let Some(name) = &self.fail_component {
            if !self.components.contains(name) {
                slog::warn!(
                    self.log,
                    "component to fail is not part of the deployment";
                    "fail_component" => name,
                );
            }
        }

        for update in self.updates() {
            if !self.interval.is_zero() {
                tokio::time::sleep(self.interval).await;
            }
            slog::debug!(
                self.log,
                "emitting update";
                "phase" => %update.phase,
                "event" => %update.event,
            );
            if sender.send(update).await.is_err() {
                bail!("progress display stopped receiving installer updates");
            }
        }
        Ok(())
    }
}
