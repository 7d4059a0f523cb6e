// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Renders the progress of a deployment, as reported by the installer, as a
//! series of steps.
//!
//! The installer reports [`ProcessUpdate`](deploy_common::ProcessUpdate)s
//! for each installation phase. [`AsyncUi`] consumes them on a background
//! task and turns them into [`Step`]s created by a [`StepFactory`]:
//!
//! * each phase is shown as a step that stays open until the phase finishes
//!   or fails;
//! * each component result reported within a phase is shown as its own step.
//!
//! Updates that arrive out of order, and failures reported by the installer,
//! are forwarded to the caller as [`UpdateError`]s.

mod aggregator;
pub mod display;
mod errors;
mod step;
#[cfg(test)]
mod test_helpers;
mod ui;

pub use aggregator::{component_label, phase_label};
pub use errors::*;
pub use step::*;
pub use ui::*;
