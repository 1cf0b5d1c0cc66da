use crate::cancel::CancelToken;
use crate::command::{CommandSpec, Outcome, ToolRunner};
use crate::RuntimeError;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

/// One invocation seen by [`MockRunner`].
#[derive(Debug, Clone)]
pub struct MockCall {
    pub spec: CommandSpec,
    /// Contents of the `--state-values-file` argument at the time of the call.
    pub state_values: Option<String>,
}

/// Scripted stand-in for helmfile. Records every call and answers with a fixed exit code.
pub struct MockRunner {
    exit_code: i32,
    stdout: Vec<String>,
    stderr: String,
    block_until_cancelled: bool,
    calls: Mutex<Vec<MockCall>>,
}

impl Default for MockRunner {
    fn default() -> Self {
        Self {
            exit_code: 0,
            stdout: Vec::new(),
            stderr: String::new(),
            block_until_cancelled: false,
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    #[must_use]
    pub fn with_stdout(mut self, lines: &[&str]) -> Self {
        self.stdout = lines.iter().map(|l| (*l).to_owned()).collect();
        self
    }

    #[must_use]
    pub fn with_stderr(mut self, stderr: &str) -> Self {
        self.stderr = stderr.to_owned();
        self
    }

    /// Simulate a long apply that only ends when the caller cancels.
    #[must_use]
    pub fn blocking_until_cancelled(mut self) -> Self {
        self.block_until_cancelled = true;
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl ToolRunner for MockRunner {
    fn run(
        &self,
        spec: &CommandSpec,
        cancel: &CancelToken,
        on_stdout: &mut dyn FnMut(&str),
    ) -> Result<Outcome, RuntimeError> {
        if cancel.is_cancelled() {
            return Err(RuntimeError::Cancelled);
        }

        let state_values = spec
            .argv
            .iter()
            .position(|a| a == "--state-values-file")
            .and_then(|i| spec.argv.get(i + 1))
            .and_then(|path| std::fs::read_to_string(path).ok());
        self.calls
            .lock()
            .map_err(|e| RuntimeError::ExecFailed(format!("mutex poisoned: {e}")))?
            .push(MockCall {
                spec: spec.clone(),
                state_values,
            });

        for line in &self.stdout {
            on_stdout(line);
        }

        if self.block_until_cancelled {
            while !cancel.is_cancelled() {
                thread::sleep(Duration::from_millis(10));
            }
            return Err(RuntimeError::Cancelled);
        }

        Ok(Outcome::from_exit(
            spec.exit_code_policy,
            Some(self.exit_code),
            self.stderr.clone(),
        ))
    }
}
