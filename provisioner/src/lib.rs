// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The provisioner drives a deployment and renders the installer's progress
//! on the terminal.

pub mod config;
mod deploy;
mod dispatch;
mod replay;
mod simulate;

pub use deploy::*;
pub use dispatch::*;
pub use replay::*;
pub use simulate::*;
