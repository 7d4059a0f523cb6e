// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Projects installer updates onto progress steps.

use std::{collections::HashMap, sync::Arc};

use deploy_common::{InstallationPhase, ProcessEvent, ProcessUpdate};

use crate::{Step, StepFactory, UpdateError};

/// Returns the label shown to end users for the step representing a phase.
///
/// Phases that aren't part of the deployment itself (e.g. steps triggered by
/// the CLI before or after the deployment) are shown by name.
pub fn phase_label(phase: &InstallationPhase) -> &str {
    match phase {
        InstallationPhase::InstallPreRequisites => "Deploying pre-requisites",
        InstallationPhase::UninstallPreRequisites => {
            "Undeploying pre-requisites"
        }
        InstallationPhase::InstallComponents => "Deploying Kyma",
        InstallationPhase::UninstallComponents => "Undeploying Kyma",
        InstallationPhase::Custom(name) => name,
    }
}

/// Returns the label shown to end users for a component result.
pub fn component_label(name: &str) -> String {
    format!("Deploying component '{name}'")
}

/// The state machine behind [`AsyncUi`](crate::AsyncUi).
///
/// Each phase is rendered as a step which stays open between the phase's
/// `ProcessStart` update and its phase-level terminal update. Component
/// results are rendered as separate one-shot steps.
pub(crate) struct EventAggregator<F: StepFactory> {
    log: slog::Logger,
    factory: Arc<F>,
    // Steps for phases that have started but not finished. An entry is
    // removed as soon as its phase reaches a terminal state, so the table is
    // bounded by the number of phases running at once.
    ongoing: HashMap<InstallationPhase, F::Step>,
}

impl<F: StepFactory> EventAggregator<F> {
    pub(crate) fn new(log: &slog::Logger, factory: Arc<F>) -> Self {
        Self {
            log: log.new(slog::o!("component" => "EventAggregator")),
            factory,
            ongoing: HashMap::new(),
        }
    }

    /// Renders a single update.
    ///
    /// An error means that the update was either illegal in the current
    /// state, or that it reported a failure. Either way, the aggregator stays
    /// usable for later updates.
    pub(crate) fn process(
        &mut self,
        update: ProcessUpdate,
    ) -> Result<(), UpdateError> {
        // Phase table keys and labels use the well-known variant, even if
        // the update carries it as a custom name.
        let update =
            ProcessUpdate { phase: update.phase.canonical(), ..update };
        slog::debug!(
            self.log,
            "processing update";
            "phase" => %update.phase,
            "event" => %update.event,
            "failure" => update.event.is_failure(),
            "component" => update.component.as_ref().map(|c| c.name.as_str()),
        );

        let event = update.event;
        match event {
            ProcessEvent::ProcessStart => self.render_start(update.phase),
            // Components have no start or stop updates of their own, so a
            // running update carrying a component is that component's result.
            ProcessEvent::ProcessRunning if update.component.is_some() => {
                self.render_stop(update)
            }
            ProcessEvent::ProcessRunning => Ok(()),
            _ => self.render_stop(update),
        }
    }

    fn render_start(
        &mut self,
        phase: InstallationPhase,
    ) -> Result<(), UpdateError> {
        if self.ongoing.contains_key(&phase) {
            return Err(UpdateError::StepAlreadyExists { phase });
        }
        let step = self.factory.new_step(phase_label(&phase));
        self.ongoing.insert(phase, step);
        Ok(())
    }

    fn render_stop(
        &mut self,
        update: ProcessUpdate,
    ) -> Result<(), UpdateError> {
        let ProcessUpdate { phase, event, component } = update;

        let Some(component) = component else {
            let Some(step) = self.ongoing.remove(&phase) else {
                return Err(UpdateError::StepDoesNotExist { phase });
            };
            if event == ProcessEvent::ProcessFinished {
                step.success();
                return Ok(());
            }
            step.failure();
            return Err(UpdateError::PhaseFailed { phase, event });
        };

        if !self.ongoing.contains_key(&phase) {
            return Err(UpdateError::StepDoesNotExist { phase });
        }

        // The phase step stays open: the component is shown as its own step.
        let step = self.factory.new_step(&component_label(&component.name));
        if component.status.is_error() {
            step.failure();
            return Err(UpdateError::ComponentFailed {
                phase,
                component: component.name,
            });
        }
        step.success();
        Ok(())
    }

    /// Returns the phases whose steps are still open.
    pub(crate) fn open_phases(
        &self,
    ) -> impl Iterator<Item = &InstallationPhase> {
        self.ongoing.keys()
    }

    /// Marks all steps that are still open as failed.
    pub(crate) fn fail_open_steps(&mut self) {
        for (phase, step) in self.ongoing.drain() {
            slog::debug!(
                self.log,
                "marking unfinished phase as failed";
                "phase" => %phase,
            );
            step.failure();
        }
    }
}
