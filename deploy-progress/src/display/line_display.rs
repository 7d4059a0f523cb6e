// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::{
    error::Error,
    io::Write,
    sync::{Arc, Mutex},
    time::Instant,
};

use debug_ignore::DebugIgnore;
use derive_where::derive_where;
use display_error_chain::DisplayErrorChain;
use owo_colors::{OwoColorize, Style};
use swrite::{SWrite, swrite};

use super::{ElapsedDisplay, HEADER_WIDTH};
use crate::{Step, StepFactory};

/// A line-oriented step display.
///
/// Every step produces one line when it is created and one when it is
/// finished. Clones share the same writer, so lines from different steps are
/// never interleaved.
#[derive_where(Clone, Debug)]
pub struct LineStepFactory<W> {
    log: slog::Logger,
    shared: Arc<Mutex<LineWriter<W>>>,
}

impl<W: Write + Send + 'static> LineStepFactory<W> {
    /// Creates a new `LineStepFactory` that writes to `writer`.
    pub fn new(log: &slog::Logger, writer: W) -> Self {
        Self::with_options(
            log,
            writer,
            String::new(),
            LineDisplayStyles::default(),
        )
    }

    /// Creates a new `LineStepFactory` with a prefix for all lines and the
    /// given styles.
    pub fn with_options(
        log: &slog::Logger,
        writer: W,
        prefix: impl Into<String>,
        styles: LineDisplayStyles,
    ) -> Self {
        Self {
            log: log.new(slog::o!("component" => "LineStepFactory")),
            shared: Arc::new(Mutex::new(LineWriter {
                writer: DebugIgnore(writer),
                prefix: prefix.into(),
                styles,
                start: Instant::now(),
            })),
        }
    }

    /// Writes an error line, including the error's chain of sources.
    pub fn write_error(&self, error: &dyn Error) {
        let mut shared = self.shared.lock().unwrap();
        let mut line = shared.start_line();
        swrite!(
            line,
            "{:>HEADER_WIDTH$} {}",
            "Error".style(shared.styles.error_style),
            DisplayErrorChain::new(error)
                .style(shared.styles.error_message_style),
        );
        shared.write_line(&self.log, &line);
    }

    /// Writes a generic line, with the prefix attached if provided.
    pub fn write_generic(&self, message: &str) {
        let mut shared = self.shared.lock().unwrap();
        let mut line = shared.start_line();
        line.push_str(message);
        shared.write_line(&self.log, &line);
    }
}

impl<W: Write + Send + 'static> StepFactory for LineStepFactory<W> {
    type Step = LineStep<W>;

    fn new_step(&self, label: &str) -> Self::Step {
        let mut shared = self.shared.lock().unwrap();
        let mut line = shared.start_line();
        swrite!(
            line,
            "{:>HEADER_WIDTH$} {}",
            "Running".style(shared.styles.progress_style),
            label.style(shared.styles.step_name_style),
        );
        shared.write_line(&self.log, &line);

        LineStep {
            log: self.log.clone(),
            shared: self.shared.clone(),
            label: label.to_owned(),
            started: Instant::now(),
        }
    }
}

/// A step created by [`LineStepFactory`].
#[derive_where(Debug)]
pub struct LineStep<W> {
    log: slog::Logger,
    shared: Arc<Mutex<LineWriter<W>>>,
    label: String,
    started: Instant,
}

impl<W: Write> LineStep<W> {
    fn finish(self, outcome: StepOutcome) {
        let mut shared = self.shared.lock().unwrap();
        let (header, style) = match outcome {
            StepOutcome::Success => ("Completed", shared.styles.progress_style),
            StepOutcome::Failure => ("Failed", shared.styles.error_style),
        };

        let mut line = shared.start_line();
        swrite!(
            line,
            "{:>HEADER_WIDTH$} {}",
            header.style(style),
            self.label.style(shared.styles.step_name_style),
        );
        let elapsed = format!("{:.2?}", self.started.elapsed());
        swrite!(line, " after {}", elapsed.style(shared.styles.meta_style));
        shared.write_line(&self.log, &line);
    }
}

impl<W: Write + Send + 'static> Step for LineStep<W> {
    fn success(self) {
        self.finish(StepOutcome::Success);
    }

    fn failure(self) {
        self.finish(StepOutcome::Failure);
    }
}

#[derive(Clone, Copy, Debug)]
enum StepOutcome {
    Success,
    Failure,
}

#[derive_where(Debug)]
struct LineWriter<W> {
    writer: DebugIgnore<W>,
    prefix: String,
    styles: LineDisplayStyles,
    start: Instant,
}

impl<W: Write> LineWriter<W> {
    /// Starts a line with the prefix and the time elapsed since the display
    /// was created.
    fn start_line(&self) -> String {
        let mut line =
            format!("[{}", self.prefix.style(self.styles.prefix_style));
        if !self.prefix.is_empty() {
            line.push(' ');
        }
        swrite!(line, "{}", ElapsedDisplay::new(self.start.elapsed()));
        line.push_str("] ");
        line
    }

    fn write_line(&mut self, log: &slog::Logger, line: &str) {
        // Steps can't report errors, so the best we can do is log them.
        let res = writeln!(self.writer, "{line}")
            .and_then(|()| self.writer.flush());
        if let Err(error) = res {
            slog::warn!(
                log,
                "failed to write progress line";
                "error" => %DisplayErrorChain::new(&error),
            );
        }
    }
}

/// Styles for [`LineStepFactory`].
///
/// By default this isn't colorized, but it can be if so chosen.
#[derive(Clone, Debug, Default)]
#[non_exhaustive]
pub struct LineDisplayStyles {
    pub prefix_style: Style,
    pub meta_style: Style,
    pub step_name_style: Style,
    pub progress_style: Style,
    pub error_style: Style,
    pub error_message_style: Style,
}

impl LineDisplayStyles {
    /// Returns a default set of colorized styles with ANSI colors.
    pub fn colorized() -> Self {
        let mut ret = Self::default();
        ret.prefix_style = Style::new().bold();
        ret.meta_style = Style::new().bold();
        ret.step_name_style = Style::new();
        ret.progress_style = Style::new().bold().green();
        ret.error_style = Style::new().bold().red();
        ret.error_message_style = Style::new().red();

        ret
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{UpdateError, test_helpers::test_log};
    use deploy_common::InstallationPhase;

    /// A writer whose contents can be inspected after it has been handed off.
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
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn step_lines() {
        let buffer = SharedBuffer::default();
        let factory = LineStepFactory::new(&test_log(), buffer.clone());

        let phase = factory.new_step("Deploying Kyma");
        let component = factory.new_step("Deploying component 'istio'");
        component.failure();
        phase.success();

        let lines = buffer.lines();
        assert_eq!(lines.len(), 4, "lines: {lines:?}");
        assert!(lines[0].starts_with("[00:00:0"), "{}", lines[0]);
        assert!(
            lines[0].ends_with("]   Running Deploying Kyma"),
            "{}",
            lines[0]
        );
        assert!(
            lines[1].ends_with("]   Running Deploying component 'istio'"),
            "{}",
            lines[1]
        );
        assert!(
            lines[2].contains("]    Failed Deploying component 'istio' after "),
            "{}",
            lines[2]
        );
        assert!(
            lines[3].contains("] Completed Deploying Kyma after "),
            "{}",
            lines[3]
        );
    }

    #[test]
    fn prefix_and_error_lines() {
        let buffer = SharedBuffer::default();
        let factory = LineStepFactory::with_options(
            &test_log(),
            buffer.clone(),
            "cluster-1",
            LineDisplayStyles::default(),
        );

        factory.write_error(&UpdateError::StepDoesNotExist {
            phase: InstallationPhase::InstallComponents,
        });
        factory.write_generic("deployment finished");

        let lines = buffer.lines();
        assert_eq!(lines.len(), 2, "lines: {lines:?}");
        assert!(lines[0].starts_with("[cluster-1 00:00:0"), "{}", lines[0]);
        assert!(
            lines[0].ends_with(
                "]     Error illegal state: step for installation phase \
                 'InstallComponents' does not exist"
            ),
            "{}",
            lines[0]
        );
        assert!(lines[1].ends_with("] deployment finished"), "{}", lines[1]);
    }

    #[test]
    fn colorized_lines_contain_escapes() {
        let buffer = SharedBuffer::default();
        let factory = LineStepFactory::with_options(
            &test_log(),
            buffer.clone(),
            "",
            LineDisplayStyles::colorized(),
        );
        factory.new_step("Deploying Kyma").success();

        let lines = buffer.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains('\u{1b}'), "{}", lines[0]);
    }
}
