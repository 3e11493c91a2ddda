//! External tools (`pdftoppm`, `pdfinfo`) run under the job deadline.

use std::io::Read;
use std::process::{Command, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::warn;

use crate::error::BackendError;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Runs `command` to completion and captures its output. A child still
/// running at `deadline` is killed and reaped.
pub fn run_tool(command: &mut Command, deadline: Option<Instant>) -> Result<Output, BackendError> {
    let program = command.get_program().to_string_lossy().into_owned();
    let tool_err = |source: std::io::Error| BackendError::Tool {
        program: program.clone(),
        source,
    };

    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(&tool_err)?;

    // Pipes are drained on their own threads so a chatty tool cannot block
    // on a full pipe while we poll.
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = match deadline {
        None => child.wait().map_err(&tool_err)?,
        Some(deadline) => loop {
            if let Some(status) = child.try_wait().map_err(&tool_err)? {
                break status;
            }
            if Instant::now() >= deadline {
                warn!("{} (pid {}) still running at the deadline, killing it", program, child.id());
                if let Err(e) = child.kill() {
                    warn!("Failed to kill {}: {}", program, e);
                }
                let _ = child.wait();
                return Err(BackendError::DeadlinePassed);
            }
            thread::sleep(POLL_INTERVAL);
        },
    };

    Ok(Output {
        status,
        stdout: collect(stdout),
        stderr: collect(stderr),
    })
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    })
}

fn collect(reader: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}
