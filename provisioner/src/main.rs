// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use anyhow::Result;
use clap::Parser;
use provisioner::ProvisionerApp;

#[tokio::main]
async fn main() -> Result<()> {
    let app = ProvisionerApp::parse();
    let config = app.load_config()?;
    let log = ProvisionerApp::setup_log(&config.log.path)?;
    app.exec(&log, config).await
}
