// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Terminal displays for progress steps.

mod line_display;
mod utils;

pub use line_display::*;
pub use utils::*;

// This is chosen to leave enough room for all possible headers: "Completed" at
// 9 characters is the longest.
pub(crate) const HEADER_WIDTH: usize = 9;
