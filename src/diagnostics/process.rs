use std::{
    io,
    process::{ExitStatus, Stdio},
    time::Duration,
};

use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, BufReader},
    process::{Child, Command},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::DiagnosticError;

/// One external command, as run and as reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Label used in failure messages, e.g. "Reverse Traceroute".
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
    /// Stream stderr into the output instead of capturing it.
    pub merge_stderr: bool,
}

impl Invocation {
    pub fn new<I, S>(name: &str, program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.to_string(),
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            merge_stderr: false,
        }
    }

    pub fn merging_stderr(mut self) -> Self {
        self.merge_stderr = true;
        self
    }

    pub fn call_string(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    pub timeout: Option<Duration>,
    pub cancel: CancellationToken,
}

enum Finish {
    Exited(io::Result<(ExitStatus, String)>),
    TimedOut(Duration),
    Cancelled,
}

/// Runs `invocation`, handing each stdout line to `on_line` as it arrives.
///
/// The child is spawned with kill-on-drop and is always killed and reaped
/// before this returns, whether it finished, timed out or was cancelled.
pub async fn run<F>(
    invocation: &Invocation,
    opts: &ProcessOptions,
    on_line: F,
) -> Result<(), DiagnosticError>
where
    F: FnMut(String),
{
    if opts.cancel.is_cancelled() {
        return Err(DiagnosticError::Cancelled {
            invocation: invocation.clone(),
        });
    }

    debug!("spawning {}", invocation.call_string());
    let mut command = Command::new(&invocation.program);
    command
        .args(&invocation.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    // Own group, so helpers forked by the child (ssh under gcloud) can be
    // killed along with it.
    #[cfg(unix)]
    command.process_group(0);
    let mut child = command
        .spawn()
        .map_err(|source| DiagnosticError::Spawn {
            invocation: invocation.clone(),
            source,
        })?;

    let finish = {
        let pumping = pump(&mut child, invocation.merge_stderr, on_line);
        match opts.timeout {
            Some(limit) => tokio::select! {
                res = tokio::time::timeout(limit, pumping) => match res {
                    Ok(exited) => Finish::Exited(exited),
                    Err(_) => Finish::TimedOut(limit),
                },
                _ = opts.cancel.cancelled() => Finish::Cancelled,
            },
            None => tokio::select! {
                exited = pumping => Finish::Exited(exited),
                _ = opts.cancel.cancelled() => Finish::Cancelled,
            },
        }
    };

    match finish {
        Finish::Exited(Ok((status, _))) if status.success() => Ok(()),
        Finish::Exited(Ok((status, stderr))) => Err(DiagnosticError::Subprocess {
            invocation: invocation.clone(),
            status,
            stderr: stderr.trim().to_string(),
        }),
        Finish::Exited(Err(source)) => {
            reap(&mut child, invocation).await;
            Err(DiagnosticError::Stream {
                invocation: invocation.clone(),
                source,
            })
        }
        Finish::TimedOut(after) => {
            warn!("{} timed out after {after:?}", invocation.program);
            reap(&mut child, invocation).await;
            Err(DiagnosticError::Timeout {
                invocation: invocation.clone(),
                after,
            })
        }
        Finish::Cancelled => {
            reap(&mut child, invocation).await;
            Err(DiagnosticError::Cancelled {
                invocation: invocation.clone(),
            })
        }
    }
}

/// Runs `invocation` to completion and returns its stdout.
pub async fn capture(
    invocation: &Invocation,
    opts: &ProcessOptions,
) -> Result<String, DiagnosticError> {
    let mut out = String::new();
    run(invocation, opts, |line| {
        out.push_str(&line);
        out.push('\n');
    })
    .await?;
    Ok(out)
}

async fn pump<F>(
    child: &mut Child,
    merge_stderr: bool,
    mut on_line: F,
) -> io::Result<(ExitStatus, String)>
where
    F: FnMut(String),
{
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "stderr was not piped"))?;

    let mut out = BufReader::new(stdout);
    let mut err = BufReader::new(stderr);
    let (mut out_buf, mut err_buf) = (Vec::new(), Vec::new());
    let mut captured = String::new();
    let (mut out_done, mut err_done) = (false, false);

    // Both pipes are drained together so a chatty stderr cannot fill up
    // and stall the child. A partial line stays in its buffer across
    // iterations until the newline arrives.
    while !(out_done && err_done) {
        tokio::select! {
            line = next_line(&mut out, &mut out_buf), if !out_done => match line? {
                Some(line) => on_line(line),
                None => out_done = true,
            },
            line = next_line(&mut err, &mut err_buf), if !err_done => match line? {
                Some(line) if merge_stderr => on_line(line),
                Some(line) => {
                    captured.push_str(&line);
                    captured.push('\n');
                }
                None => err_done = true,
            },
        }
    }

    let status = child.wait().await?;
    Ok((status, captured))
}

/// Reads one line, decoding invalid UTF-8 lossily. Tool output (hop names,
/// remote shells) is not guaranteed to be UTF-8.
async fn next_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    if reader.read_until(b'\n', buf).await? == 0 {
        // EOF; flush a final unterminated line if there is one
        if buf.is_empty() {
            return Ok(None);
        }
    }
    let mut line = buf.as_slice();
    if let Some(rest) = line.strip_suffix(b"\n") {
        line = rest;
    }
    if let Some(rest) = line.strip_suffix(b"\r") {
        line = rest;
    }
    let line = String::from_utf8_lossy(line).into_owned();
    buf.clear();
    Ok(Some(line))
}

async fn reap(child: &mut Child, invocation: &Invocation) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        use nix::{
            sys::signal::{killpg, Signal},
            unistd::Pid,
        };

        if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
            debug!("unable to kill process group of {}: {e}", invocation.program);
        }
    }
    if let Err(e) = child.kill().await {
        debug!("unable to kill {}: {e}", invocation.program);
    }
}
