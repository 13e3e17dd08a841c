// THEORY:
// The `InferenceChannel` is the sole owner of the external inference process.
// It launches the engine, waits for it to come up, and then offers a single
// operation, `predict`, that pushes one request frame into the engine's stdin and
// reads one response frame back from its stdout.
//
// Key architectural principles:
// 1.  **Strict Alternation**: the engine answers requests in order, one line in,
//     one line out, with no correlation ids. Two interleaved exchanges would
//     hand each caller the other's answer, and every later answer would stay
//     misattributed for the life of the process. The pipes therefore sit behind
//     one async mutex that is held for the whole write+read cycle.
// 2.  **Detached Exchanges**: each exchange runs in its own task holding the lock.
//     If the caller goes away mid-request (an HTTP client hanging up), the task
//     still reads the answer off the pipe, so it is never left for the next caller.
// 3.  **One-way Lifecycle**: `Starting -> Ready -> Dead`. Liveness is polled before
//     every request; a dead engine is reported, never restarted. Any failure
//     that leaves the stream position unknown (I/O error, EOF, timeout) also
//     kills the engine and disables the channel.
// 4.  **Supervised Resources**: the diagnostic drain and the child are tied to the
//     channel's lifetime. `shutdown` kills and reaps the engine and joins the
//     drain; dropping the channel aborts the drain and the child is killed on drop.

use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

use crate::config::ChannelConfig;
use crate::core_modules::drain::{log_sink, spawn_drain};
use crate::core_modules::framing::{Framing, LineFraming};
use crate::core_modules::grid::PixelGrid;
use crate::error::ChannelError;

/// The engine's answer, verbatim apart from framing.
pub type Label = String;

const READ_CHUNK: usize = 4096;
/// How long `shutdown` waits for the drain to flush the engine's last lines.
const DRAIN_JOIN_TIMEOUT: Duration = Duration::from_secs(1);
/// How long a failed startup waits to learn the engine's exit status.
const EXIT_STATUS_WAIT: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Starting,
    Ready,
    Dead,
}

/// Stdin/stdout of the engine plus any bytes read past the last frame.
struct Pipes {
    stdin: ChildStdin,
    stdout: ChildStdout,
    pending: Vec<u8>,
}

impl Pipes {
    async fn read_frame<F: Framing>(&mut self, framing: &F) -> Result<String, ChannelError> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if let Some(frame) = framing.decode_response(&mut self.pending) {
                return Ok(frame);
            }
            let read = self.stdout.read(&mut chunk).await?;
            if read == 0 {
                return Err(ChannelError::StreamClosed);
            }
            self.pending.extend_from_slice(&chunk[..read]);
        }
    }

    async fn round_trip<F: Framing>(&mut self, framing: &F, request: &[u8]) -> Result<Label, ChannelError> {
        if !self.pending.is_empty() {
            log::warn!(
                "discarding {} unread bytes left over from a previous response",
                self.pending.len()
            );
            self.pending.clear();
        }
        self.stdin.write_all(request).await?;
        self.stdin.flush().await?;
        self.read_frame(framing).await
    }
}

/// The child handle and its lifecycle state. Kept apart from the pipes so
/// liveness checks and shutdown never wait behind a request in flight.
struct Process {
    child: Mutex<Child>,
    state: std::sync::Mutex<ProcessState>,
}

impl Process {
    fn state(&self) -> ProcessState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: ProcessState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    async fn ensure_alive(&self) -> Result<(), ChannelError> {
        if self.state() == ProcessState::Dead {
            return Err(ChannelError::ProcessDied);
        }
        let polled = self.child.lock().await.try_wait();
        match polled {
            Ok(None) => Ok(()),
            Ok(Some(status)) => {
                log::error!("inference engine exited ({status})");
                self.set_state(ProcessState::Dead);
                Err(ChannelError::ProcessDied)
            }
            Err(e) => {
                self.set_state(ProcessState::Dead);
                Err(ChannelError::Io(e))
            }
        }
    }

    async fn disable(&self, cause: &ChannelError) {
        log::error!("disabling inference channel: {cause}");
        self.set_state(ProcessState::Dead);
        if let Err(e) = self.child.lock().await.start_kill() {
            log::debug!("could not kill inference engine: {e}");
        }
    }

    async fn exit_status(&self, wait: Duration) -> Option<ExitStatus> {
        let mut child = self.child.lock().await;
        timeout(wait, child.wait()).await.ok()?.ok()
    }
}

/// Owns the inference engine and serializes requests to it.
pub struct InferenceChannel<F: Framing = LineFraming> {
    pipes: Arc<Mutex<Pipes>>,
    process: Arc<Process>,
    framing: Arc<F>,
    drain: Option<JoinHandle<usize>>,
    request_timeout: Option<Duration>,
}

impl InferenceChannel<LineFraming> {
    /// Launches the engine and waits until it acknowledges startup.
    pub async fn spawn(config: ChannelConfig) -> Result<Self, ChannelError> {
        Self::spawn_with_framing(config, LineFraming).await
    }
}

impl<F: Framing> InferenceChannel<F> {
    pub async fn spawn_with_framing(config: ChannelConfig, framing: F) -> Result<Self, ChannelError> {
        log::info!("launching inference engine {:?}", config.program);
        let mut child = Command::new(&config.program)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ChannelError::Spawn {
                program: config.program.clone(),
                source,
            })?;

        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            return Err(ChannelError::Io(std::io::Error::other(
                "inference engine pipes were not captured",
            )));
        };

        // Drain from the first moment so startup chatter cannot fill the pipe.
        let drain = spawn_drain(stderr, log_sink);

        let channel = Self {
            pipes: Arc::new(Mutex::new(Pipes {
                stdin,
                stdout,
                pending: Vec::new(),
            })),
            process: Arc::new(Process {
                child: Mutex::new(child),
                state: std::sync::Mutex::new(ProcessState::Starting),
            }),
            framing: Arc::new(framing),
            drain: Some(drain),
            request_timeout: config.request_timeout,
        };

        match channel.await_ready(&config).await {
            Ok(()) => Ok(channel),
            Err(e) => {
                log::error!("inference engine failed to start: {e}");
                if let Err(cleanup) = channel.shutdown().await {
                    log::debug!("cleanup after failed startup also failed: {cleanup}");
                }
                Err(e)
            }
        }
    }

    async fn await_ready(&self, config: &ChannelConfig) -> Result<(), ChannelError> {
        sleep(config.startup_grace).await;

        if let Some(status) = self.process.child.lock().await.try_wait()? {
            return Err(ChannelError::ExitedDuringStartup(status));
        }

        let mut pipes = self.pipes.lock().await;
        let status_line = match timeout(config.startup_timeout, pipes.read_frame(self.framing.as_ref())).await {
            Err(_) => return Err(ChannelError::NoAcknowledgement(config.startup_timeout)),
            Ok(Err(ChannelError::StreamClosed)) => {
                return Err(match self.process.exit_status(EXIT_STATUS_WAIT).await {
                    Some(status) => ChannelError::ExitedDuringStartup(status),
                    None => ChannelError::NoAcknowledgement(config.startup_timeout),
                });
            }
            Ok(read) => read?,
        };

        log::info!("inference engine status: {}", status_line.trim());
        self.process.set_state(ProcessState::Ready);
        Ok(())
    }

    /// Sends one grid to the engine and returns its answer.
    ///
    /// Concurrent callers are queued; each gets the response to its own request.
    /// Returns [`ChannelError::ProcessDied`] without touching the pipes once the
    /// engine has exited.
    pub async fn predict(&self, grid: &PixelGrid) -> Result<Label, ChannelError> {
        let request = self.framing.encode_request(grid);
        let pipes = self.pipes.clone();
        let process = self.process.clone();
        let framing = self.framing.clone();
        let request_timeout = self.request_timeout;

        let exchange = tokio::spawn(async move {
            let mut pipes = pipes.lock().await;
            process.ensure_alive().await?;

            let outcome = match request_timeout {
                Some(limit) => timeout(limit, pipes.round_trip(framing.as_ref(), &request))
                    .await
                    .unwrap_or(Err(ChannelError::Timeout(limit))),
                None => pipes.round_trip(framing.as_ref(), &request).await,
            };

            if let Err(e) = &outcome {
                process.disable(e).await;
            }
            outcome
        });

        exchange
            .await
            .map_err(|e| ChannelError::Aborted(e.to_string()))?
    }

    /// Last known lifecycle state. A process that exited since the last
    /// request is only noticed by the next `predict`.
    pub fn state(&self) -> ProcessState {
        self.process.state()
    }

    /// Kills and reaps the engine, then waits briefly for the drain to flush.
    pub async fn shutdown(mut self) -> Result<ExitStatus, ChannelError> {
        self.process.set_state(ProcessState::Dead);

        let status = {
            let mut child = self.process.child.lock().await;
            if let Err(e) = child.start_kill() {
                log::debug!("inference engine already gone: {e}");
            }
            child.wait().await?
        };
        log::info!("inference engine stopped ({status})");

        if let Some(mut drain) = self.drain.take() {
            match timeout(DRAIN_JOIN_TIMEOUT, &mut drain).await {
                Ok(Ok(lines)) => log::debug!("diagnostic drain forwarded {lines} lines"),
                Ok(Err(e)) => log::debug!("diagnostic drain task failed: {e}"),
                Err(_) => {
                    log::debug!("diagnostic drain still busy after shutdown");
                    drain.abort();
                }
            }
        }

        Ok(status)
    }
}

impl<F: Framing> Drop for InferenceChannel<F> {
    fn drop(&mut self) {
        if let Some(drain) = self.drain.take() {
            drain.abort();
        }
    }
}
