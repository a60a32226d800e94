use super::error::ToolError;
use crate::utils::format_bytes;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::VecDeque;
use std::io;
use std::process::Stdio;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

/// Media bytes relayed from a child process, in the order the child wrote them.
pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

const STDERR_TAIL_LINES: usize = 20;
const MAX_STDERR_LINE: usize = 4096;

struct Relay {
    tool: String,
    chunks: ReaderStream<ChildStdout>,
    child: Child,
    stderr: JoinHandle<String>,
    relayed: u64,
}

enum RelayState {
    Streaming(Relay),
    Finished,
}

/// Spawns `command` and exposes its stdout as a [`ByteStream`].
///
/// The child is killed when the stream is dropped. A non-zero exit surfaces
/// as a final `Err` item so the HTTP layer aborts the response instead of
/// ending it cleanly; the client then sees a truncated transfer.
pub fn spawn_relay(
    tool: &str,
    mut command: Command,
    input: Option<Bytes>,
) -> Result<ByteStream, ToolError> {
    command
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn().map_err(|source| ToolError::Spawn {
        tool: tool.to_string(),
        source,
    })?;

    debug!("{} spawned with pid {:?}", tool, child.id());

    if let (Some(input), Some(mut stdin)) = (input, child.stdin.take()) {
        let tool = tool.to_string();
        tokio::spawn(async move {
            let result = stdin.write_all(&input).await;
            drop(stdin);
            match result {
                Ok(_) => debug!("Wrote {} to {} stdin", format_bytes(input.len() as u64), tool),
                // the tool may legitimately stop reading early
                Err(e) => debug!("Failed to write to {} stdin: {}", tool, e),
            }
        });
    }

    let stdout = child.stdout.take().ok_or_else(|| ToolError::Spawn {
        tool: tool.to_string(),
        source: io::Error::other("stdout was not captured"),
    })?;
    let stderr = child.stderr.take().ok_or_else(|| ToolError::Spawn {
        tool: tool.to_string(),
        source: io::Error::other("stderr was not captured"),
    })?;

    let relay = Relay {
        tool: tool.to_string(),
        chunks: ReaderStream::new(stdout),
        child,
        stderr: tokio::spawn(drain_stderr(stderr)),
        relayed: 0,
    };

    let stream = stream::unfold(RelayState::Streaming(relay), |state| async move {
        let mut relay = match state {
            RelayState::Streaming(relay) => relay,
            RelayState::Finished => return None,
        };

        match relay.chunks.next().await {
            Some(Ok(chunk)) => {
                relay.relayed += chunk.len() as u64;
                Some((Ok(chunk), RelayState::Streaming(relay)))
            }
            Some(Err(e)) => {
                warn!("Failed reading {} stdout: {}", relay.tool, e);
                if let Err(e) = relay.child.start_kill() {
                    debug!("Failed to kill {}: {}", relay.tool, e);
                }
                Some((Err(e), RelayState::Finished))
            }
            None => relay
                .finish()
                .await
                .map(|e| (Err(e), RelayState::Finished)),
        }
    });

    Ok(stream.boxed())
}

impl Relay {
    async fn finish(mut self) -> Option<io::Error> {
        let status = self.child.wait().await;
        let stderr_tail = self.stderr.await.unwrap_or_default();

        match status {
            Ok(status) if status.success() => {
                info!(
                    "{} finished, relayed {}",
                    self.tool,
                    format_bytes(self.relayed)
                );
                None
            }
            Ok(status) => {
                warn!(
                    tool = %self.tool,
                    relayed = self.relayed,
                    stderr = %stderr_tail,
                    "Stream ended early: {} exited with {}",
                    self.tool,
                    status
                );
                Some(io::Error::other(format!(
                    "{} exited with {} after {}",
                    self.tool,
                    status,
                    format_bytes(self.relayed)
                )))
            }
            Err(e) => {
                warn!("Failed to wait for {}: {}", self.tool, e);
                Some(e)
            }
        }
    }
}

/// Reads stderr to the end so the child never blocks on a full pipe,
/// keeping only the last few lines. Progress output uses `\r`, so both
/// `\r` and `\n` end a line.
async fn drain_stderr(mut stderr: ChildStderr) -> String {
    let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
    let mut line: Vec<u8> = Vec::new();
    let mut buffer = [0u8; 8192];

    loop {
        match stderr.read(&mut buffer).await {
            Ok(0) => break,
            Ok(n) => {
                for &byte in &buffer[..n] {
                    if byte == b'\n' || byte == b'\r' {
                        push_line(&mut line, &mut tail);
                    } else if line.len() < MAX_STDERR_LINE {
                        line.push(byte);
                    }
                }
            }
            Err(e) => {
                debug!("Failed to read stderr: {}", e);
                break;
            }
        }
    }
    push_line(&mut line, &mut tail);

    tail.into_iter().collect::<Vec<_>>().join("\n")
}

fn push_line(line: &mut Vec<u8>, tail: &mut VecDeque<String>) {
    if line.is_empty() {
        return;
    }
    if tail.len() == STDERR_TAIL_LINES {
        tail.pop_front();
    }
    tail.push_back(String::from_utf8_lossy(line).into_owned());
    line.clear();
}
