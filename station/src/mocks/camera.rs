//! Mock camera.

use crate::camera::{CameraDevice, CameraFuture, CameraSignal, CameraSink, DecodedCode};
use crate::error::CameraError;
use crate::types::CameraSessionId;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A transition the mock camera went through
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CameraEvent {
    /// Session opened
    Started(CameraSessionId),
    /// Decoding suspended
    Paused(CameraSessionId),
    /// Decoding resumed
    Resumed(CameraSessionId),
    /// Device released
    Stopped(CameraSessionId),
}

#[derive(Debug, Default)]
struct Device {
    open: Option<CameraSessionId>,
    paused: bool,
    sink: Option<CameraSink>,
    fail_next_start: Option<CameraError>,
    events: Vec<CameraEvent>,
}

/// Camera the test decides what it sees
///
/// Only effective transitions are logged: stopping a session that is not
/// open, or pausing twice, leaves no trace.
#[derive(Clone, Debug, Default)]
pub struct MockCamera {
    device: Arc<Mutex<Device>>,
}

impl MockCamera {
    /// Closed camera
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn device(&self) -> MutexGuard<'_, Device> {
        self.device.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next start fail with `error`
    pub fn fail_next_start(&self, error: CameraError) {
        self.device().fail_next_start = Some(error);
    }

    /// Show a code to the camera
    ///
    /// Returns whether it was decoded, which requires an open, unpaused session.
    pub fn emit(&self, code: impl Into<String>) -> bool {
        let device = self.device();
        match (device.open, &device.sink) {
            (Some(session), Some(sink)) if !device.paused => sink
                .send(CameraSignal::Decoded(DecodedCode {
                    session,
                    code: code.into(),
                }))
                .is_ok(),
            _ => false,
        }
    }

    /// Push a decode tagged with any session, bypassing the device state
    ///
    /// Stands in for a decode that was already in flight when the session changed.
    pub fn emit_from(&self, session: CameraSessionId, code: impl Into<String>) -> bool {
        self.device().sink.as_ref().is_some_and(|sink| {
            sink.send(CameraSignal::Decoded(DecodedCode {
                session,
                code: code.into(),
            }))
            .is_ok()
        })
    }

    /// Break the open session as an unplugged device would
    ///
    /// Returns whether a session was open to report the failure.
    pub fn fail(&self, error: CameraError) -> bool {
        let device = self.device();
        match (device.open, &device.sink) {
            (Some(session), Some(sink)) => sink.send(CameraSignal::Failed { session, error }).is_ok(),
            _ => false,
        }
    }

    /// Session holding the device
    #[must_use]
    pub fn open_session(&self) -> Option<CameraSessionId> {
        self.device().open
    }

    /// Whether decoding is suspended
    #[must_use]
    pub fn is_paused(&self) -> bool {
        let device = self.device();
        device.open.is_some() && device.paused
    }

    /// Transitions so far, oldest first
    #[must_use]
    pub fn events(&self) -> Vec<CameraEvent> {
        self.device().events.clone()
    }
}

impl CameraDevice for MockCamera {
    fn start(&self, session: CameraSessionId, sink: CameraSink) -> CameraFuture<Result<(), CameraError>> {
        let result = {
            let mut device = self.device();
            if let Some(error) = device.fail_next_start.take() {
                Err(error)
            } else if let Some(open) = device.open {
                Err(CameraError::Busy(open.to_string()))
            } else {
                device.open = Some(session);
                device.paused = false;
                device.sink = Some(sink);
                device.events.push(CameraEvent::Started(session));
                Ok(())
            }
        };
        Box::pin(async move { result })
    }

    fn pause(&self, session: CameraSessionId) -> CameraFuture<()> {
        {
            let mut device = self.device();
            if device.open == Some(session) && !device.paused {
                device.paused = true;
                device.events.push(CameraEvent::Paused(session));
            }
        }
        Box::pin(async {})
    }

    fn resume(&self, session: CameraSessionId) -> CameraFuture<()> {
        {
            let mut device = self.device();
            if device.open == Some(session) && device.paused {
                device.paused = false;
                device.events.push(CameraEvent::Resumed(session));
            }
        }
        Box::pin(async {})
    }

    fn stop(&self, session: CameraSessionId) -> CameraFuture<()> {
        {
            let mut device = self.device();
            if device.open == Some(session) {
                device.open = None;
                device.paused = false;
                device.events.push(CameraEvent::Stopped(session));
            }
        }
        Box::pin(async {})
    }
}
