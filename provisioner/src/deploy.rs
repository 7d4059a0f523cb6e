// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Drives a deployment and renders its progress.

use std::{future::Future, io::Write};

use anyhow::Result;
use deploy_progress::{AsyncUi, Step, display::LineStepFactory};
use display_error_chain::DisplayErrorChain;
use tokio::sync::mpsc;

use crate::{
    replay::{EventSource, replay_updates},
    simulate::SimulatedInstaller,
};

/// Where installer updates come from.
#[derive(Clone, Debug)]
pub enum UpdateSource {
    /// Replay a recorded event log.
    Replay(EventSource),
    /// Run the simulated installer.
    Simulated(SimulatedInstaller),
}

/// The result of a deployment run.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DeployOutcome {
    /// The number of errors that were reported while rendering.
    pub error_count: usize,
    /// Whether the progress display detected any failure.
    pub failed: bool,
    /// Whether the run was cancelled before all updates were rendered.
    pub cancelled: bool,
}

/// Runs a deployment, feeding the updates from `source` to a progress display
/// which writes lines through `factory`.
///
/// Errors reported by the display are printed through `factory` as they
/// arrive. If `cancel` completes before all updates were sent, the run is
/// cancelled.
///
/// Returns an error if the updates couldn't be produced, for example because
/// the event log is malformed.
pub async fn run_deployment<W, C>(
    log: &slog::Logger,
    factory: LineStepFactory<W>,
    source: UpdateSource,
    error_buffer: usize,
    cancel: C,
) -> Result<DeployOutcome>
where
    W: Write + Send + 'static,
    C: Future<Output = ()>,
{
    let log = log.new(slog::o!("component" => "deploy"));

    let (error_sender, mut error_receiver) = mpsc::channel(error_buffer.max(1));
    let mut ui =
        AsyncUi::new(&log, factory.clone()).with_error_sink(error_sender);
    ui.start()?;

    // The worker drops its end of the error sink when it exits, which ends
    // this task.
    let error_printer = {
        let factory = factory.clone();
        tokio::spawn(async move {
            let mut error_count = 0;
            while let Some(error) = error_receiver.recv().await {
                factory.write_error(&error);
                error_count += 1;
            }
            error_count
        })
    };

    let cancel_handle = ui.cancel_handle()?;
    let sender = ui.update_channel()?;

    let (feed_result, cancelled) = {
        let feed = feed_updates(&log, &ui, source, sender);
        tokio::pin!(feed);
        tokio::pin!(cancel);

        tokio::select! {
            res = &mut feed => (res, false),
            () = &mut cancel => {
                slog::info!(log, "cancellation requested");
                cancel_handle.cancel();
                (Ok(()), true)
            }
        }
    };

    ui.stop().await;

    let error_count = match error_printer.await {
        Ok(count) => count,
        Err(error) => {
            slog::error!(
                log,
                "error printer task panicked";
                "error" => %DisplayErrorChain::new(&error),
            );
            0
        }
    };

    feed_result?;

    let outcome =
        DeployOutcome { error_count, failed: ui.failed(), cancelled };
    slog::info!(
        log,
        "deployment finished";
        "errors" => outcome.error_count,
        "failed" => outcome.failed,
        "cancelled" => outcome.cancelled,
    );
    Ok(outcome)
}

async fn feed_updates<W: Write + Send + 'static>(
    log: &slog::Logger,
    ui: &AsyncUi<LineStepFactory<W>>,
    source: UpdateSource,
    sender: mpsc::Sender<deploy_common::ProcessUpdate>,
) -> Result<()> {
    match source {
        UpdateSource::Replay(source) => {
            let step = ui.add_step(&format!(
                "Reading installer events from {source}"
            ))?;
            let res = async {
                let reader = source.open().await?;
                replay_updates(log, reader, &sender).await
            }
            .await;
            match res {
                Ok(count) => {
                    slog::debug!(log, "replayed event log"; "updates" => count);
                    step.success();
                    Ok(())
                }
                Err(error) => {
                    step.failure();
                    Err(error.context(format!(
                        "failed to replay installer events from {source}"
                    )))
                }
            }
        }
        UpdateSource::Simulated(installer) => installer.run(sender).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulate::DeployKind;
    use camino_tempfile::Utf8TempDir;
    use deploy_common::{
        InstallationPhase, ProcessEvent, ProcessUpdate, format_update_line,
    };
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    fn test_log() -> slog::Logger {
        slog::Logger::root(slog::Discard, slog::o!())
    }

    #[derive(Clone, Debug, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        fn lines(&self) -> Vec<String> {
            let buf = self.0.lock().unwrap();
            String::from_utf8(buf.clone())
                .expect("output is UTF-8")
                .lines()
                .map(|line| line.to_owned())
                .collect()
        }

        fn count_containing(&self, needle: &str) -> usize {
            self.lines().iter().filter(|line| line.contains(needle)).count()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn components() -> Vec<String> {
        ["cluster-essentials", "istio", "serverless"]
            .into_iter()
            .map(|name| name.to_owned())
            .collect()
    }

    #[tokio::test]
    async fn simulated_deploy_succeeds() {
        let log = test_log();
        let buffer = SharedBuffer::default();
        let factory = LineStepFactory::new(&log, buffer.clone());
        let installer =
            SimulatedInstaller::new(&log, DeployKind::Deploy, components());

        let outcome = run_deployment(
            &log,
            factory,
            UpdateSource::Simulated(installer),
            16,
            std::future::pending(),
        )
        .await
        .unwrap();

        assert_eq!(outcome, DeployOutcome::default());
        assert_eq!(buffer.count_containing("Error"), 0, "{:?}", buffer.lines());
        assert_eq!(buffer.count_containing("Completed"), 5);
        assert_eq!(
            buffer.count_containing("Completed Deploying Kyma after"),
            1
        );
    }

    #[tokio::test]
    async fn simulated_undeploy_succeeds() {
        let log = test_log();
        let buffer = SharedBuffer::default();
        let factory = LineStepFactory::new(&log, buffer.clone());
        let installer =
            SimulatedInstaller::new(&log, DeployKind::Undeploy, components());

        let outcome = run_deployment(
            &log,
            factory,
            UpdateSource::Simulated(installer),
            16,
            std::future::pending(),
        )
        .await
        .unwrap();

        assert_eq!(outcome, DeployOutcome::default());
        assert_eq!(
            buffer.count_containing("Completed Undeploying pre-requisites"),
            1
        );
    }

    #[tokio::test]
    async fn simulated_component_failure() {
        let log = test_log();
        let buffer = SharedBuffer::default();
        let factory = LineStepFactory::new(&log, buffer.clone());
        let installer =
            SimulatedInstaller::new(&log, DeployKind::Deploy, components())
                .with_failing_component(Some("istio".to_owned()));

        let outcome = run_deployment(
            &log,
            factory,
            UpdateSource::Simulated(installer),
            16,
            std::future::pending(),
        )
        .await
        .unwrap();

        // One error for the component, one for the phase.
        assert_eq!(
            outcome,
            DeployOutcome { error_count: 2, failed: true, cancelled: false }
        );
        assert_eq!(
            buffer.count_containing("Failed Deploying component 'istio'"),
            1
        );
        assert_eq!(buffer.count_containing("Failed Deploying Kyma"), 1);
        assert_eq!(
            buffer.count_containing(
                "Error deployment of component 'istio' failed"
            ),
            1
        );
    }

    #[tokio::test]
    async fn replay_from_file() {
        let dir = Utf8TempDir::new().unwrap();
        let path = dir.path().join("events.jsonl");
        let updates = [
            ProcessUpdate::new(
                InstallationPhase::InstallComponents,
                ProcessEvent::ProcessStart,
            ),
            // A finish without a start is a protocol violation.
            ProcessUpdate::new(
                InstallationPhase::InstallPreRequisites,
                ProcessEvent::ProcessFinished,
            ),
            ProcessUpdate::new(
                InstallationPhase::InstallComponents,
                ProcessEvent::ProcessFinished,
            ),
        ];
        let contents: String = updates
            .iter()
            .map(|update| {
                format!("{}\n", format_update_line(update).unwrap())
            })
            .collect();
        std::fs::write(&path, contents).unwrap();

        let log = test_log();
        let buffer = SharedBuffer::default();
        let factory = LineStepFactory::new(&log, buffer.clone());

        let outcome = run_deployment(
            &log,
            factory,
            UpdateSource::Replay(EventSource::File(path)),
            16,
            std::future::pending(),
        )
        .await
        .unwrap();

        assert_eq!(
            outcome,
            DeployOutcome { error_count: 1, failed: true, cancelled: false }
        );
        assert_eq!(
            buffer.count_containing("Completed Reading installer events"),
            1
        );
        assert_eq!(buffer.count_containing("Completed Deploying Kyma"), 1);
        assert_eq!(
            buffer.count_containing(
                "'InstallPreRequisites' does not exist"
            ),
            1
        );
    }

    #[tokio::test]
    async fn replay_malformed_log() {
        let dir = Utf8TempDir::new().unwrap();
        let path = dir.path().join("events.jsonl");
        std::fs::write(&path, "{\"phase\": 12}\n").unwrap();

        let log = test_log();
        let buffer = SharedBuffer::default();
        let factory = LineStepFactory::new(&log, buffer.clone());

        let error = run_deployment(
            &log,
            factory,
            UpdateSource::Replay(EventSource::File(path)),
            16,
            std::future::pending(),
        )
        .await
        .unwrap_err();

        assert!(
            format!("{error:#}").contains("line 1"),
            "unexpected error: {error:#}"
        );
        assert_eq!(
            buffer.count_containing("Failed Reading installer events"),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_the_run() {
        let log = test_log();
        let buffer = SharedBuffer::default();
        let factory = LineStepFactory::new(&log, buffer.clone());
        let installer =
            SimulatedInstaller::new(&log, DeployKind::Deploy, components())
                .with_interval(Duration::from_secs(60));

        // Cancel while the components phase is still in progress.
        let outcome = run_deployment(
            &log,
            factory,
            UpdateSource::Simulated(installer),
            16,
            tokio::time::sleep(Duration::from_secs(60 * 4 + 30)),
        )
        .await
        .unwrap();

        assert!(outcome.cancelled);
        assert!(!outcome.failed);
        assert_eq!(outcome.error_count, 0);
        assert_eq!(
            buffer.count_containing("Completed Deploying pre-requisites"),
            1
        );
        assert_eq!(buffer.count_containing("Failed Deploying Kyma"), 1);
    }
}
