// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::{Arc, Mutex};

use crate::{Step, StepFactory};

pub(crate) fn test_log() -> slog::Logger {
    slog::Logger::root(slog::Discard, slog::o!())
}

/// A call made against a [`RecordingStepFactory`] or one of its steps.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum StepCall {
    Created(String),
    Success(String),
    Failure(String),
}

pub(crate) fn created(label: &str) -> StepCall {
    StepCall::Created(label.to_owned())
}

pub(crate) fn success(label: &str) -> StepCall {
    StepCall::Success(label.to_owned())
}

pub(crate) fn failure(label: &str) -> StepCall {
    StepCall::Failure(label.to_owned())
}

/// A step factory that records every call in order.
#[derive(Clone, Debug, Default)]
pub(crate) struct RecordingStepFactory {
    calls: Arc<Mutex<Vec<StepCall>>>,
}

impl RecordingStepFactory {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn calls(&self) -> Vec<StepCall> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn created_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, StepCall::Created(_)))
            .count()
    }

    /// Returns the number of steps that were created but never finished.
    pub(crate) fn unfinished_count(&self) -> usize {
        let calls = self.calls();
        let finished = calls
            .iter()
            .filter(|call| !matches!(call, StepCall::Created(_)))
            .count();
        (calls.len() - finished) - finished
    }
}

impl StepFactory for RecordingStepFactory {
    type Step = RecordingStep;

    fn new_step(&self, label: &str) -> Self::Step {
        self.calls.lock().unwrap().push(StepCall::Created(label.to_owned()));
        RecordingStep { label: label.to_owned(), calls: self.calls.clone() }
    }
}

#[derive(Debug)]
pub(crate) struct RecordingStep {
    label: String,
    calls: Arc<Mutex<Vec<StepCall>>>,
}

impl Step for RecordingStep {
    fn success(self) {
        self.calls.lock().unwrap().push(StepCall::Success(self.label));
    }

    fn failure(self) {
        self.calls.lock().unwrap().push(StepCall::Failure(self.label));
    }
}
