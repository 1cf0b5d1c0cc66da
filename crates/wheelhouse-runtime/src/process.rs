use crate::cancel::CancelToken;
use crate::command::{CommandSpec, Outcome, ToolRunner};
use crate::RuntimeError;
use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const TERM_GRACE: Duration = Duration::from_millis(500);

/// Runs helmfile as a real child process.
///
/// Stdout is forwarded line by line, stderr is captured for error reporting.
/// On unix the child gets its own process group so cancellation also reaches
/// the helm processes helmfile spawns.
#[derive(Debug, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

impl ToolRunner for ProcessRunner {
    fn run(
        &self,
        spec: &CommandSpec,
        cancel: &CancelToken,
        on_stdout: &mut dyn FnMut(&str),
    ) -> Result<Outcome, RuntimeError> {
        let Some((program, args)) = spec.argv.split_first() else {
            return Err(RuntimeError::EmptyCommand);
        };
        if cancel.is_cancelled() {
            return Err(RuntimeError::Cancelled);
        }

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(&spec.working_dir)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt as _;
            cmd.process_group(0);
        }

        debug!("spawning {spec} in {}", spec.working_dir.display());
        let mut child = cmd.spawn().map_err(|source| RuntimeError::Spawn {
            program: program.clone(),
            source,
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // Readers are never joined: a backgrounded grandchild may hold the
        // pipes open long after helmfile itself has exited.
        let (tx, rx) = mpsc::channel::<String>();
        thread::spawn(move || {
            let Some(stdout) = stdout else { return };
            for line in BufReader::new(stdout).lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
        let (err_tx, err_rx) = mpsc::channel::<Vec<u8>>();
        thread::spawn(move || {
            let mut buf = Vec::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_end(&mut buf);
            }
            let _ = err_tx.send(buf);
        });

        let mut stdout_open = true;
        let mut status = None;
        let mut stderr_buf = None;
        loop {
            if stdout_open {
                match rx.recv_timeout(POLL_INTERVAL) {
                    Ok(line) => on_stdout(&line),
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => stdout_open = false,
                }
            } else if status.is_some() {
                match err_rx.recv_timeout(POLL_INTERVAL) {
                    Ok(buf) => stderr_buf = Some(buf),
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => stderr_buf = Some(Vec::new()),
                }
            } else {
                thread::sleep(POLL_INTERVAL);
            }

            if cancel.is_cancelled() {
                warn!("cancellation requested, terminating {program}");
                terminate(&mut child);
                return Err(RuntimeError::Cancelled);
            }

            if status.is_none() {
                status = child.try_wait()?;
            }
            if let (Some(status), false, Some(buf)) = (status, stdout_open, &stderr_buf) {
                let stderr_text = String::from_utf8_lossy(buf).into_owned();
                debug!("{program} exited with {status}");
                return Ok(Outcome::from_exit(
                    spec.exit_code_policy,
                    status.code(),
                    stderr_text,
                ));
            }
        }
    }
}

/// SIGTERM the child's process group, then SIGKILL whatever is left after a grace period.
///
/// Works after helmfile itself has exited too: the group outlives its leader
/// while any descendant is still running.
fn terminate(child: &mut Child) {
    #[cfg(unix)]
    if let Ok(pid) = i32::try_from(child.id()) {
        if signal_group(pid, libc::SIGTERM) {
            let deadline = Instant::now() + TERM_GRACE;
            while Instant::now() < deadline {
                if !group_alive(pid) {
                    let _ = child.wait();
                    return;
                }
                let _ = child.try_wait();
                thread::sleep(POLL_INTERVAL);
            }
            warn!("process group {pid} still running after SIGTERM, sending SIGKILL");
            signal_group(pid, libc::SIGKILL);
        }
    }

    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(unix)]
fn signal_group(pgid: i32, signal: i32) -> bool {
    // SAFETY: kill() with a process group id and a valid signal number is safe.
    #[allow(unsafe_code)]
    let ret = unsafe { libc::kill(-pgid, signal) };
    ret == 0
}

#[cfg(unix)]
fn group_alive(pgid: i32) -> bool {
    signal_group(pgid, 0)
}
