//! Live progress reporting for a deployment.
//!
//! Every step handed out by a [`Ui`] ends exactly once, in either `done` or `abort`.

use std::sync::Mutex;
use tracing::{info, warn};

pub trait Step {
    fn update(&mut self, message: &str);
    fn done(self: Box<Self>);
    fn abort(self: Box<Self>);
}

pub trait Ui: Send + Sync {
    /// Announce a new step.
    fn step(&self, message: &str) -> Box<dyn Step + '_>;
    /// One line of live output from the wrapped tool.
    fn output(&self, line: &str);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopUi;

struct NoopStep;

impl Step for NoopStep {
    fn update(&mut self, _message: &str) {}
    fn done(self: Box<Self>) {}
    fn abort(self: Box<Self>) {}
}

impl Ui for NoopUi {
    fn step(&self, _message: &str) -> Box<dyn Step + '_> {
        Box::new(NoopStep)
    }

    fn output(&self, _line: &str) {}
}

/// Reports steps and tool output through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogUi;

struct LogStep {
    message: String,
}

impl Step for LogStep {
    fn update(&mut self, message: &str) {
        info!("{message}");
        message.clone_into(&mut self.message);
    }

    fn done(self: Box<Self>) {
        info!("done: {}", self.message);
    }

    fn abort(self: Box<Self>) {
        warn!("aborted: {}", self.message);
    }
}

impl Ui for LogUi {
    fn step(&self, message: &str) -> Box<dyn Step + '_> {
        info!("{message}");
        Box::new(LogStep {
            message: message.to_owned(),
        })
    }

    fn output(&self, line: &str) {
        info!(target: "helmfile", "{line}");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    Started(String),
    Updated(String),
    Done(String),
    Aborted(String),
    Output(String),
}

/// Keeps every event in memory, in order.
#[derive(Debug, Default)]
pub struct RecordingUi {
    events: Mutex<Vec<UiEvent>>,
}

impl RecordingUi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<UiEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    fn record(&self, event: UiEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

struct RecordingStep<'a> {
    ui: &'a RecordingUi,
    message: String,
}

impl Step for RecordingStep<'_> {
    fn update(&mut self, message: &str) {
        self.ui.record(UiEvent::Updated(message.to_owned()));
    }

    fn done(self: Box<Self>) {
        self.ui.record(UiEvent::Done(self.message));
    }

    fn abort(self: Box<Self>) {
        self.ui.record(UiEvent::Aborted(self.message));
    }
}

impl Ui for RecordingUi {
    fn step(&self, message: &str) -> Box<dyn Step + '_> {
        self.record(UiEvent::Started(message.to_owned()));
        Box::new(RecordingStep {
            ui: self,
            message: message.to_owned(),
        })
    }

    fn output(&self, line: &str) {
        self.record(UiEvent::Output(line.to_owned()));
    }
}

/// Holds the currently open step and aborts it if dropped while still open.
pub(crate) struct StepGuard<'a> {
    ui: &'a dyn Ui,
    current: Option<Box<dyn Step + 'a>>,
}

impl<'a> StepGuard<'a> {
    pub(crate) fn new(ui: &'a dyn Ui) -> Self {
        Self { ui, current: None }
    }

    /// Announce a step. A step still open from before is marked done first.
    pub(crate) fn begin(&mut self, message: &str) {
        self.done();
        self.current = Some(self.ui.step(message));
    }

    pub(crate) fn update(&mut self, message: &str) {
        if let Some(step) = self.current.as_mut() {
            step.update(message);
        }
    }

    pub(crate) fn done(&mut self) {
        if let Some(step) = self.current.take() {
            step.done();
        }
    }
}

impl Drop for StepGuard<'_> {
    fn drop(&mut self) {
        if let Some(step) = self.current.take() {
            step.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_marks_done_steps() {
        let ui = RecordingUi::new();
        {
            let mut guard = StepGuard::new(&ui);
            guard.begin("one");
            guard.update("halfway");
            guard.done();
            guard.begin("two");
            guard.done();
        }
        assert_eq!(
            ui.events(),
            vec![
                UiEvent::Started("one".into()),
                UiEvent::Updated("halfway".into()),
                UiEvent::Done("one".into()),
                UiEvent::Started("two".into()),
                UiEvent::Done("two".into()),
            ]
        );
    }

    #[test]
    fn guard_aborts_open_step_on_drop() {
        let ui = RecordingUi::new();
        {
            let mut guard = StepGuard::new(&ui);
            guard.begin("render");
        }
        assert_eq!(
            ui.events(),
            vec![
                UiEvent::Started("render".into()),
                UiEvent::Aborted("render".into()),
            ]
        );
    }

    #[test]
    fn begin_closes_previous_step() {
        let ui = RecordingUi::new();
        {
            let mut guard = StepGuard::new(&ui);
            guard.begin("a");
            guard.begin("b");
        }
        let events = ui.events();
        assert_eq!(events[1], UiEvent::Done("a".into()));
        assert_eq!(events[3], UiEvent::Aborted("b".into()));
    }

    #[test]
    fn noop_ui_accepts_everything() {
        let ui = NoopUi;
        let mut step = ui.step("x");
        step.update("y");
        step.done();
        ui.output("line");
    }
}
