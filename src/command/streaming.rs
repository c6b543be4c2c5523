//! Runner that forwards child output to the terminal as it arrives.

use std::ffi::OsString;
use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Command;
use tracing::{info, warn};

use super::{CommandError, CommandFuture, CommandOutput, CommandRunner, render_command};

const CHUNK_SIZE: usize = 8192;

/// Runs commands with their output mirrored live to this process's stdout
/// and stderr while still capturing both streams.
///
/// Used for long remote payloads whose progress the operator should see.
#[derive(Clone, Copy, Debug, Default)]
pub struct StreamingCommandRunner;

impl CommandRunner for StreamingCommandRunner {
    fn run<'a>(&'a self, program: &'a str, args: &'a [OsString]) -> CommandFuture<'a> {
        Box::pin(stream_command(
            program,
            args,
            tokio::io::stdout(),
            tokio::io::stderr(),
        ))
    }
}

/// Runs `program`, copying its stdout into `out` and its stderr into `err`
/// chunk by chunk.
pub(crate) async fn stream_command<O, E>(
    program: &str,
    args: &[OsString],
    out: O,
    err: E,
) -> Result<CommandOutput, CommandError>
where
    O: AsyncWrite + Unpin + Send,
    E: AsyncWrite + Unpin + Send,
{
    info!(command = %render_command(program, args), "running command with live output");
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|spawn_err| {
            warn!(program, error = %spawn_err, "command could not be started");
            CommandError::Spawn {
                program: program.to_owned(),
                message: spawn_err.to_string(),
            }
        })?;

    let io_error = |message: String| CommandError::Io {
        program: program.to_owned(),
        message,
    };
    let child_out = child
        .stdout
        .take()
        .ok_or_else(|| io_error(String::from("stdout was not piped")))?;
    let child_err = child
        .stderr
        .take()
        .ok_or_else(|| io_error(String::from("stderr was not piped")))?;

    let (stdout, stderr, status) = tokio::try_join!(
        forward(child_out, out),
        forward(child_err, err),
        async { child.wait().await },
    )
    .map_err(|wait_err| io_error(wait_err.to_string()))?;

    let output = CommandOutput {
        code: status.code(),
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
    };
    if !output.is_success() {
        warn!(program, status = %output.status_text(), "command exited unsuccessfully");
    }
    Ok(output)
}

/// Copies `source` into `sink` until end of stream, returning everything read.
///
/// A sink that stops accepting writes is dropped from forwarding; capture
/// continues so the child never blocks on a full pipe.
async fn forward<S, W>(mut source: S, mut sink: W) -> std::io::Result<Vec<u8>>
where
    S: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut captured = Vec::new();
    let mut buffer = [0_u8; CHUNK_SIZE];
    let mut forwarding = true;
    loop {
        let read = source.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        let chunk = buffer.get(..read).unwrap_or_default();
        if forwarding {
            let written = async {
                sink.write_all(chunk).await?;
                sink.flush().await
            }
            .await;
            if let Err(write_err) = written {
                warn!(error = %write_err, "live output forwarding stopped");
                forwarding = false;
            }
        }
        captured.extend_from_slice(chunk);
    }
    Ok(captured)
}
