// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::{
    fmt,
    ops::ControlFlow,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use cancel_safe_futures::coop_cancel;
use deploy_common::ProcessUpdate;
use derive_where::derive_where;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use uuid::Uuid;

use crate::{
    LifecycleError, StepFactory, UpdateError, aggregator::EventAggregator,
};

/// The capacity of the update channel.
///
/// Updates are rendered one at a time, in the order they were sent: a sender
/// waits until the previous update has been picked up.
pub const UPDATE_CHANNEL_CAPACITY: usize = 1;

/// Renders installer updates as progress steps, on a background task.
///
/// An `AsyncUi` serves a single run:
///
/// 1. [`Self::start`] spawns the worker task.
/// 2. The installer sends [`ProcessUpdate`]s through the sender returned by
///    [`Self::update_channel`].
/// 3. [`Self::stop`] closes the channel and waits for the worker to render
///    everything that was sent.
///
/// Errors detected while rendering are sent to the error sink, if one was
/// provided via [`Self::with_error_sink`]. Regardless of whether a sink is
/// present, [`Self::failed`] reports whether any error was detected.
///
/// # Error sink backpressure
///
/// The worker waits for space in the error sink before rendering the next
/// update. If the sink is full and nobody is receiving from it, rendering
/// stalls until the caller receives or the run is cancelled.
#[derive_where(Debug)]
pub struct AsyncUi<F: StepFactory> {
    log: slog::Logger,
    #[derive_where(skip)]
    factory: Arc<F>,
    // Handed to the worker on start.
    error_sink: Option<mpsc::Sender<UpdateError>>,
    failed: Arc<AtomicBool>,
    state: RunState,
}

impl<F: StepFactory> AsyncUi<F> {
    /// Creates a new `AsyncUi` which creates steps through `factory`.
    pub fn new(log: &slog::Logger, factory: F) -> Self {
        Self {
            log: log.new(slog::o!("component" => "AsyncUi")),
            factory: Arc::new(factory),
            error_sink: None,
            failed: Arc::new(AtomicBool::new(false)),
            state: RunState::NotStarted,
        }
    }

    /// Sets the channel that errors are sent to.
    pub fn with_error_sink(self, sink: mpsc::Sender<UpdateError>) -> Self {
        Self { error_sink: Some(sink), ..self }
    }

    /// Starts the worker task.
    ///
    /// Must be called from within a Tokio runtime. Fails if this `AsyncUi`
    /// has been started before.
    pub fn start(&mut self) -> Result<(), LifecycleError> {
        if !matches!(self.state, RunState::NotStarted) {
            return Err(LifecycleError::DuplicateStart);
        }

        let run_id = Uuid::new_v4();
        let log = self.log.new(slog::o!("run_id" => run_id.to_string()));

        let (updates_sender, updates) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);
        let (close_sender, close_receiver) = oneshot::channel();
        let (canceler, cancel_receiver) = coop_cancel::new_pair();

        let worker = Worker {
            log: log.clone(),
            aggregator: EventAggregator::new(&log, self.factory.clone()),
            error_sink: self.error_sink.take(),
            failed: self.failed.clone(),
            updates,
            close_receiver,
            cancel_receiver,
        };

        slog::debug!(log, "starting progress display");
        let worker = tokio::spawn(worker.run());

        self.state = RunState::Running(RunningState {
            log,
            updates_sender,
            close_sender: Some(close_sender),
            canceler,
            worker,
        });
        Ok(())
    }

    /// Closes the update channel and waits until all updates sent so far have
    /// been rendered.
    ///
    /// This is a no-op if the `AsyncUi` isn't running. The channel is closed
    /// even if senders returned by [`Self::update_channel`] are still alive;
    /// sending through them fails afterwards.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. If the returned future is dropped, the
    /// channel stays closed and a later call resumes waiting.
    pub async fn stop(&mut self) {
        let RunState::Running(running) = &mut self.state else {
            return;
        };

        if let Some(close_sender) = running.close_sender.take() {
            // An error means that the worker has already exited.
            _ = close_sender.send(());
        }

        if let Err(error) = (&mut running.worker).await {
            slog::error!(
                running.log,
                "progress display task exited abnormally";
                "error" => %error,
            );
        }

        slog::debug!(running.log, "progress display stopped");
        self.state = RunState::Stopped;
    }

    /// Cancels the run.
    ///
    /// Unlike [`Self::stop`], this does not wait for pending updates: the
    /// worker stops at its next await point, discards updates that haven't
    /// been rendered yet and marks the steps of unfinished phases as failed.
    /// Senders observe the update channel as closed afterwards.
    ///
    /// [`Self::stop`] must still be called to complete the run.
    pub fn cancel(&self) -> Result<(), LifecycleError> {
        self.cancel_handle()?.cancel();
        Ok(())
    }

    /// Returns a handle which can be used to cancel the run from elsewhere.
    pub fn cancel_handle(&self) -> Result<CancelHandle, LifecycleError> {
        let running = self.running("cancel the run")?;
        Ok(CancelHandle {
            log: running.log.clone(),
            canceler: running.canceler.clone(),
        })
    }

    /// Creates a step which is not tied to an installation phase.
    pub fn add_step(&self, label: &str) -> Result<F::Step, LifecycleError> {
        self.running("add a step")?;
        Ok(self.factory.new_step(label))
    }

    /// Returns the sender for installer updates.
    pub fn update_channel(
        &self,
    ) -> Result<mpsc::Sender<ProcessUpdate>, LifecycleError> {
        let running = self.running("retrieve the update channel")?;
        Ok(running.updates_sender.clone())
    }

    /// Returns true between [`Self::start`] and the completion of
    /// [`Self::stop`].
    pub fn is_running(&self) -> bool {
        matches!(self.state, RunState::Running(_))
    }

    /// Returns true if any error was detected during the run.
    ///
    /// Once set, this stays set.
    pub fn failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    fn running(
        &self,
        operation: &'static str,
    ) -> Result<&RunningState, LifecycleError> {
        match &self.state {
            RunState::Running(running) => Ok(running),
            RunState::NotStarted | RunState::Stopped => {
                Err(LifecycleError::NotRunning { operation })
            }
        }
    }
}

/// A handle used to cancel an [`AsyncUi`] run.
#[derive(Clone, Debug)]
pub struct CancelHandle {
    log: slog::Logger,
    canceler: coop_cancel::Canceler<String>,
}

impl CancelHandle {
    /// Cancels the run.
    ///
    /// Returns false if the worker had already exited.
    pub fn cancel(&self) -> bool {
        match self.canceler.cancel("run cancelled by caller".to_owned()) {
            Ok(_waiter) => {
                slog::info!(self.log, "cancelling progress display");
                true
            }
            Err(_) => {
                slog::debug!(
                    self.log,
                    "progress display already exited, ignoring cancel"
                );
                false
            }
        }
    }
}

enum RunState {
    NotStarted,
    Running(RunningState),
    Stopped,
}

impl fmt::Debug for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::NotStarted => f.write_str("NotStarted"),
            RunState::Running(_) => f.write_str("Running"),
            RunState::Stopped => f.write_str("Stopped"),
        }
    }
}

struct RunningState {
    log: slog::Logger,
    updates_sender: mpsc::Sender<ProcessUpdate>,
    // Set to None once the close signal has been sent.
    close_sender: Option<oneshot::Sender<()>>,
    canceler: coop_cancel::Canceler<String>,
    worker: JoinHandle<()>,
}

struct Worker<F: StepFactory> {
    log: slog::Logger,
    aggregator: EventAggregator<F>,
    error_sink: Option<mpsc::Sender<UpdateError>>,
    failed: Arc<AtomicBool>,
    updates: mpsc::Receiver<ProcessUpdate>,
    close_receiver: oneshot::Receiver<()>,
    cancel_receiver: coop_cancel::Receiver<String>,
}

impl<F: StepFactory> Worker<F> {
    async fn run(mut self) {
        let mut closing = false;

        loop {
            tokio::select! {
                biased;

                Some(message) = self.cancel_receiver.recv() => {
                    self.on_cancel(message);
                    return;
                }

                // The close signal is also received if the AsyncUi is dropped
                // without being stopped.
                _ = &mut self.close_receiver, if !closing => {
                    closing = true;
                    // Updates that were already sent are still received after
                    // this.
                    self.updates.close();
                }

                update = self.updates.recv() => {
                    let Some(update) = update else {
                        break;
                    };
                    if let Err(error) = self.aggregator.process(update) {
                        if let ControlFlow::Break(message) =
                            self.dispatch_error(error).await
                        {
                            self.on_cancel(message);
                            return;
                        }
                    }
                }
            }
        }

        let open_phases: Vec<_> =
            self.aggregator.open_phases().map(|p| p.to_string()).collect();
        if !open_phases.is_empty() {
            slog::warn!(
                self.log,
                "update channel closed with unfinished phases";
                "phases" => open_phases.join(", "),
            );
        }
        slog::debug!(self.log, "update channel closed, exiting");
    }

    /// Records an error and sends it to the error sink.
    ///
    /// Returns `Break` if the run was cancelled while waiting for the sink.
    async fn dispatch_error(
        &mut self,
        error: UpdateError,
    ) -> ControlFlow<String> {
        slog::warn!(
            self.log,
            "error while rendering update";
            "phase" => %error.phase(),
            "error" => %error,
        );
        self.failed.store(true, Ordering::Release);

        let Some(sink) = &self.error_sink else {
            return ControlFlow::Continue(());
        };

        let sink_closed = tokio::select! {
            biased;

            Some(message) = self.cancel_receiver.recv() => {
                return ControlFlow::Break(message);
            }

            res = sink.send(error) => res.is_err(),
        };

        if sink_closed {
            slog::warn!(
                self.log,
                "error sink receiver dropped, no longer forwarding errors"
            );
            self.error_sink = None;
        }
        ControlFlow::Continue(())
    }

    fn on_cancel(&mut self, message: String) {
        slog::info!(
            self.log,
            "progress display cancelled";
            "message" => message,
        );
        self.aggregator.fail_open_steps();
    }
}
