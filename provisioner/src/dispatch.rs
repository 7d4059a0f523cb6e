// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io::IsTerminal;

use anyhow::{Context, Result, bail};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand};
use deploy_progress::display::{LineDisplayStyles, LineStepFactory};
use display_error_chain::DisplayErrorChain;
use slog::Drain;

use crate::{
    config::{ColorChoice, Config},
    deploy::{UpdateSource, run_deployment},
    replay::EventSource,
    simulate::{DeployKind, SimulatedInstaller},
};

/// Deploys Kyma and shows the installer's progress.
#[derive(Debug, Parser)]
#[command(version)]
pub struct ProvisionerApp {
    /// Path to a TOML configuration file
    #[clap(long, global = true)]
    config: Option<Utf8PathBuf>,

    /// Whether to colorize progress output
    #[clap(long, global = true, value_enum)]
    color: Option<ColorChoice>,

    /// Path to the log file [default: /tmp/provisioner.log]
    #[clap(long, global = true, env = "PROVISIONER_LOG_PATH")]
    log_file: Option<Utf8PathBuf>,

    #[clap(subcommand)]
    subcommand: ProvisionerCommand,
}

impl ProvisionerApp {
    /// Loads the configuration, with command-line flags applied on top.
    pub fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        if let Some(color) = self.color {
            config.display.color = color;
        }
        if let Some(log_file) = &self.log_file {
            config.log.path = log_file.clone();
        }
        self.subcommand.opts().apply_to(&mut config);
        Ok(config)
    }

    /// Executes the app.
    pub async fn exec(self, log: &slog::Logger, config: Config) -> Result<()> {
        match self.subcommand {
            ProvisionerCommand::Deploy(opts) => {
                opts.exec(log, &config, DeployKind::Deploy).await
            }
            ProvisionerCommand::Undeploy(opts) => {
                opts.exec(log, &config, DeployKind::Undeploy).await
            }
        }
    }

    pub fn setup_log(path: impl AsRef<Utf8Path>) -> Result<slog::Logger> {
        let path = path.as_ref();
        let file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .with_context(|| format!("error opening log file `{path}`"))?;

        let file_decorator = slog_term::PlainDecorator::new(file);
        let file_drain =
            slog_term::FullFormat::new(file_decorator).build().fuse();

        let stderr_drain =
            stderr_env_drain("RUST_LOG", std::io::stderr().is_terminal());

        let drain = slog::Duplicate::new(file_drain, stderr_drain).fuse();
        let drain = slog_async::Async::new(drain).build().fuse();
        Ok(slog::Logger::root(drain, slog::o!()))
    }
}

#[derive(Debug, Subcommand)]
enum ProvisionerCommand {
    /// Deploy Kyma.
    Deploy(DeployOpts),
    /// Undeploy Kyma.
    Undeploy(DeployOpts),
}

impl ProvisionerCommand {
    fn opts(&self) -> &DeployOpts {
        match self {
            ProvisionerCommand::Deploy(opts)
            | ProvisionerCommand::Undeploy(opts) => opts,
        }
    }
}

#[derive(Debug, Args)]
struct DeployOpts {
    /// Replay installer events from a JSON-lines file, or `-` for stdin
    ///
    /// Without this, a simulated installer is run.
    #[clap(long)]
    events: Option<EventSource>,

    /// Components deployed by the simulated installer
    #[clap(long, value_delimiter = ',')]
    components: Option<Vec<String>>,

    /// Report the given component as failed in the simulated installer
    #[clap(long)]
    fail_component: Option<String>,

    /// Delay between simulated installer events, in milliseconds
    #[clap(long)]
    event_interval_ms: Option<u64>,
}

impl DeployOpts {
    fn apply_to(&self, config: &mut Config) {
        if let Some(components) = &self.components {
            config.simulation.components = components.clone();
        }
        if let Some(interval) = self.event_interval_ms {
            config.simulation.event_interval_ms = interval;
        }
    }

    async fn exec(
        self,
        log: &slog::Logger,
        config: &Config,
        kind: DeployKind,
    ) -> Result<()> {
        let styles = if config
            .display
            .color
            .should_colorize(std::io::stdout().is_terminal())
        {
            LineDisplayStyles::colorized()
        } else {
            LineDisplayStyles::default()
        };
        let factory = LineStepFactory::with_options(
            log,
            std::io::stdout(),
            config.display.prefix.clone(),
            styles,
        );

        let source = match self.events {
            Some(source) => {
                if self.fail_component.is_some() {
                    slog::warn!(
                        log,
                        "--fail-component only applies to the simulated \
                         installer, ignoring"
                    );
                }
                UpdateSource::Replay(source)
            }
            None => UpdateSource::Simulated(
                SimulatedInstaller::new(
                    log,
                    kind,
                    config.simulation.components.clone(),
                )
                .with_failing_component(self.fail_component)
                .with_interval(config.simulation.event_interval()),
            ),
        };

        let ctrl_c = {
            let log = log.clone();
            async move {
                if let Err(error) = tokio::signal::ctrl_c().await {
                    slog::warn!(
                        log,
                        "failed to listen for Ctrl-C, \
                         cancellation is unavailable";
                        "error" => %DisplayErrorChain::new(&error),
                    );
                    std::future::pending::<()>().await;
                }
            }
        };

        let outcome = run_deployment(
            log,
            factory.clone(),
            source,
            config.errors.buffer,
            ctrl_c,
        )
        .await?;

        if outcome.cancelled {
            bail!("deployment cancelled");
        }
        if outcome.failed {
            bail!(
                "deployment failed: {} error{} reported",
                outcome.error_count,
                if outcome.error_count == 1 { "" } else { "s" },
            );
        }
        factory.write_generic("Deployment completed successfully");
        Ok(())
    }
}

fn stderr_env_drain(
    env_var: &str,
    use_color: bool,
) -> impl Drain<Ok = (), Err = slog::Never> + use<> {
    let mut builder = slog_term::TermDecorator::new().stderr();
    if use_color {
        builder = builder.force_color();
    } else {
        builder = builder.force_plain();
    }
    let stderr_drain =
        slog_term::FullFormat::new(builder.build()).build().fuse();
    let mut builder = slog_envlogger::LogBuilder::new(stderr_drain);
    if let Ok(s) = std::env::var(env_var) {
        builder = builder.parse(&s);
    } else {
        // Log at the info level by default.
        builder = builder.filter(None, slog::FilterLevel::Info);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;

    #[test]
    fn flags_override_config() {
        let dir = Utf8TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[display]\ncolor = \"always\"\n\n\
             [simulation]\nevent_interval_ms = 10\n",
        )
        .unwrap();

        let app = ProvisionerApp::try_parse_from([
            "provisioner",
            "--config",
            path.as_str(),
            "--color",
            "never",
            "deploy",
            "--components",
            "istio,serverless",
        ])
        .unwrap();
        let config = app.load_config().unwrap();

        assert_eq!(config.display.color, ColorChoice::Never);
        assert_eq!(config.simulation.event_interval_ms, 10);
        assert_eq!(config.simulation.components, ["istio", "serverless"]);
    }

    #[test]
    fn parse_undeploy_with_events() {
        let app = ProvisionerApp::try_parse_from([
            "provisioner",
            "undeploy",
            "--events",
            "-",
            "--log-file",
            "/var/tmp/undeploy.log",
        ])
        .unwrap();
        let config = app.load_config().unwrap();
        assert_eq!(config.log.path, "/var/tmp/undeploy.log");

        let ProvisionerCommand::Undeploy(opts) = &app.subcommand else {
            panic!("expected undeploy, found {:?}", app.subcommand);
        };
        assert_eq!(opts.events, Some(EventSource::Stdin));
    }

    #[test]
    fn invalid_color_is_rejected() {
        let res = ProvisionerApp::try_parse_from([
            "provisioner",
            "--color",
            "sometimes",
            "deploy",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn verify_app() {
        use clap::CommandFactory;
        ProvisionerApp::command().debug_assert();
    }
}
