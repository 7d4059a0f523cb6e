// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/// A user-visible progress indicator.
///
/// A step is shown as running from the moment it is created. It is finished by
/// calling exactly one of [`Step::success`] or [`Step::failure`], which take
/// the step by value so that it cannot be finished twice.
pub trait Step: Send + 'static {
    /// Marks the step as successful.
    fn success(self);

    /// Marks the step as failed.
    fn failure(self);
}

/// Creates [`Step`]s for the progress display.
pub trait StepFactory: Send + Sync + 'static {
    type Step: Step;

    /// Creates a new running step with the given label.
    fn new_step(&self, label: &str) -> Self::Step;
}
