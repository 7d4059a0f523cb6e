// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Types shared by the deployment installer and the progress display.

mod events;
mod wire;

pub use events::*;
pub use wire::*;
