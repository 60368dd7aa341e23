//! Camera / QR decoder abstraction.
//!
//! A [`CameraDevice`] is opened for one [`CameraSessionId`] at a time and
//! pushes every decoded payload into a [`CameraSink`] tagged with that
//! session, so the reducer can drop decodes that outlive their session.
//! A device that dies while its session is open reports
//! [`CameraSignal::Failed`] through the same sink.

use crate::error::CameraError;
use crate::types::CameraSessionId;
use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

/// Boxed camera operation
pub type CameraFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// A payload decoded by the camera
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedCode {
    /// Session that produced the decode
    pub session: CameraSessionId,
    /// Raw payload
    pub code: String,
}

/// What a camera reports while a session is open
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CameraSignal {
    /// A payload was decoded
    Decoded(DecodedCode),
    /// The device stopped working; no further decodes follow
    Failed {
        /// Session that was open
        session: CameraSessionId,
        /// Why
        error: CameraError,
    },
}

/// Where a camera delivers its signals
pub type CameraSink = mpsc::UnboundedSender<CameraSignal>;

/// A QR decoding camera
pub trait CameraDevice: Send + Sync {
    /// Open the camera for `session`, delivering decodes to `sink`
    ///
    /// # Errors
    ///
    /// Returns an error if the device cannot be opened. Failures after a
    /// successful start arrive as [`CameraSignal::Failed`].
    fn start(&self, session: CameraSessionId, sink: CameraSink) -> CameraFuture<Result<(), CameraError>>;

    /// Stop delivering decodes without releasing the device
    fn pause(&self, session: CameraSessionId) -> CameraFuture<()>;

    /// Deliver decodes again after [`CameraDevice::pause`]
    fn resume(&self, session: CameraSessionId) -> CameraFuture<()>;

    /// Release the device; a no-op if `session` is not the open one
    fn stop(&self, session: CameraSessionId) -> CameraFuture<()>;
}

/// Strip decoder-specific prefixes such as zbar's `QR-Code:`
#[must_use]
pub fn normalize_decoder_line(line: &str) -> Option<String> {
    let line = line.trim();
    let payload = line.strip_prefix("QR-Code:").unwrap_or(line).trim();
    (!payload.is_empty()).then(|| payload.to_string())
}

/// Decoder stderr lines kept for the failure message
const STDERR_TAIL_LINES: usize = 5;

/// How long a closed decoder output waits for the stderr tail
const STDERR_GRACE: Duration = Duration::from_secs(1);

/// Log decoder stderr and keep its last lines
async fn collect_stderr(stderr: impl AsyncRead + Unpin, session: CameraSessionId) -> String {
    let mut lines = BufReader::new(stderr).lines();
    let mut tail: Vec<String> = Vec::new();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        tracing::warn!(%session, line = %line, "Decoder stderr");
        if tail.len() == STDERR_TAIL_LINES {
            tail.remove(0);
        }
        tail.push(line);
    }
    tail.join("; ")
}

struct RunningDecoder {
    session: CameraSessionId,
    child: Child,
    paused: Arc<AtomicBool>,
    reader: JoinHandle<()>,
}

/// Camera backed by an external decoder process
///
/// The process (for example `zbarcam --raw --nodisplay`) must print one
/// decoded payload per line on stdout.
#[derive(Clone)]
pub struct CommandCamera {
    program: String,
    args: Vec<String>,
    running: Arc<Mutex<Option<RunningDecoder>>>,
}

impl CommandCamera {
    /// Camera running `program` with `args`
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            running: Arc::new(Mutex::new(None)),
        }
    }

    /// Parse a command line such as `"zbarcam --raw --nodisplay"`
    ///
    /// Returns `None` for a blank command.
    #[must_use]
    pub fn from_command_line(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }

    async fn set_paused(&self, session: CameraSessionId, paused: bool) {
        let running = self.running.lock().await;
        if let Some(decoder) = running.as_ref().filter(|d| d.session == session) {
            decoder.paused.store(paused, Ordering::Release);
        }
    }
}

impl std::fmt::Debug for CommandCamera {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandCamera")
            .field("program", &self.program)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

impl CameraDevice for CommandCamera {
    fn start(&self, session: CameraSessionId, sink: CameraSink) -> CameraFuture<Result<(), CameraError>> {
        let camera = self.clone();

        Box::pin(async move {
            let mut running = camera.running.lock().await;
            if let Some(current) = running.as_ref() {
                return Err(CameraError::Busy(current.session.to_string()));
            }

            let mut child = Command::new(&camera.program)
                .args(&camera.args)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| CameraError::StartFailed(format!("{}: {e}", camera.program)))?;

            let stdout = child
                .stdout
                .take()
                .ok_or_else(|| CameraError::StartFailed("decoder stdout unavailable".to_string()))?;
            let stderr = child
                .stderr
                .take()
                .ok_or_else(|| CameraError::StartFailed("decoder stderr unavailable".to_string()))?;
            let stderr = tokio::spawn(collect_stderr(stderr, session));

            let paused = Arc::new(AtomicBool::new(false));
            let reader_paused = Arc::clone(&paused);

            let reader = tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                loop {
                    match lines.next_line().await {
                        Ok(Some(line)) => {
                            if reader_paused.load(Ordering::Acquire) {
                                continue;
                            }
                            let Some(code) = normalize_decoder_line(&line) else {
                                continue;
                            };
                            if sink.send(CameraSignal::Decoded(DecodedCode { session, code })).is_err() {
                                return;
                            }
                        },
                        Ok(None) => break,
                        Err(error) => {
                            tracing::warn!(%session, %error, "Failed to read decoder output");
                            break;
                        },
                    }
                }

                // Output closed while the session is open: the decoder is gone
                let detail = tokio::time::timeout(STDERR_GRACE, stderr)
                    .await
                    .ok()
                    .and_then(Result::ok)
                    .filter(|tail| !tail.is_empty())
                    .unwrap_or_else(|| "decoder process exited".to_string());
                tracing::warn!(%session, %detail, "Decoder process closed its output");
                let _ = sink.send(CameraSignal::Failed {
                    session,
                    error: CameraError::Stopped(detail),
                });
            });

            tracing::info!(%session, program = %camera.program, "Camera started");
            *running = Some(RunningDecoder {
                session,
                child,
                paused,
                reader,
            });
            Ok(())
        })
    }

    fn pause(&self, session: CameraSessionId) -> CameraFuture<()> {
        let camera = self.clone();
        Box::pin(async move { camera.set_paused(session, true).await })
    }

    fn resume(&self, session: CameraSessionId) -> CameraFuture<()> {
        let camera = self.clone();
        Box::pin(async move { camera.set_paused(session, false).await })
    }

    fn stop(&self, session: CameraSessionId) -> CameraFuture<()> {
        let camera = self.clone();

        Box::pin(async move {
            let mut running = camera.running.lock().await;
            if running.as_ref().is_none_or(|d| d.session != session) {
                return;
            }
            if let Some(mut decoder) = running.take() {
                decoder.reader.abort();
                if let Err(error) = decoder.child.kill().await {
                    tracing::warn!(%session, %error, "Failed to kill decoder process");
                }
                tracing::info!(%session, "Camera stopped");
            }
        })
    }
}
