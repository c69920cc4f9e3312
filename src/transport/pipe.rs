use std::io::{self, Read};
use std::process::{Child, ChildStdout, Command, Stdio};

use tracing::{debug, warn};

use crate::errors::SharError;

/// Byte stream backed by the stdout of a shell command.
///
/// The child is killed and reaped when the reader is dropped, so abandoning a
/// shard mid-stream never leaves a running process behind. A non-zero exit
/// status observed at end of stream is reported as an I/O error.
pub struct PipeReader {
    command: String,
    child: Child,
    stdout: ChildStdout,
    finished: bool,
}

impl PipeReader {
    /// Spawn `command` through `sh -c` with stdout captured.
    pub fn spawn(command: &str) -> Result<Self, SharError> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|err| {
                SharError::Io(io::Error::new(
                    err.kind(),
                    format!("failed spawning pipe '{command}': {err}"),
                ))
            })?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SharError::Io(io::Error::other("pipe stdout was not captured")))?;
        debug!(command, "opened pipe shard");
        Ok(Self {
            command: command.to_string(),
            child,
            stdout,
            finished: false,
        })
    }

    fn finish(&mut self) -> io::Result<()> {
        self.finished = true;
        let status = self.child.wait()?;
        if !status.success() {
            return Err(io::Error::other(format!(
                "pipe '{}' exited with {status}",
                self.command
            )));
        }
        Ok(())
    }
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.finished {
            return Ok(0);
        }
        let read = self.stdout.read(buf)?;
        if read == 0 && !buf.is_empty() {
            self.finish()?;
        }
        Ok(read)
    }
}

impl Drop for PipeReader {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(err) = self.child.kill() {
            debug!(command = %self.command, %err, "pipe already exited");
        }
        if let Err(err) = self.child.wait() {
            warn!(command = %self.command, %err, "failed reaping pipe process");
        }
    }
}
