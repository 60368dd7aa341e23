//! Scanner station reducer.
//!
//! # Flow
//!
//! 1. Operator selects event and resource type; options load and the first
//!    one is selected
//! 2. Codes arrive from the camera (one session at a time) or the manual
//!    entry field
//! 3. Each code runs through [`process_qr_code`] as one effect
//! 4. A recorded scan refreshes statistics and recent scans once each, and
//!    for certificate printing generates the certificate on the side
//!
//! # Camera
//!
//! The device is exclusive. Any reconfiguration stops the open session
//! before anything else runs, and a new session first makes sure the
//! previous one is released. Decodes pause the camera until the scan
//! result is in and the cooldown has elapsed.

use super::actions::{ScanSource, ScannerAction};
use super::environment::ScannerEnvironment;
use super::pipeline::process_qr_code;
use super::state::{CameraStatus, InFlightScan, NotificationLevel, ScannerState};
use crate::certificates::{CertificateDocument, PRINT_INSTRUCTION};
use crate::error::{CameraError, CertificateError};
use crate::types::{ResourceType, ScanAttemptId, ScannerMode};
use atlas_core::effect::Effect;
use atlas_core::reducer::Reducer;
use atlas_core::{SmallVec, async_effect, delay, smallvec};

/// Banner shown while the camera is unusable
fn camera_error_banner(error: &CameraError) -> String {
    format!("Camera Error: {error}. Switch to manual mode to keep scanning.")
}

/// Scanner station reducer
#[derive(Debug, Clone, Copy, Default)]
pub struct ScannerReducer;

impl ScannerReducer {
    /// Create the reducer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Stop the open camera session, leaving the camera off
    fn teardown_camera(state: &mut ScannerState, env: &ScannerEnvironment) -> Effect<ScannerAction> {
        let Some(session) = state.camera.session() else {
            state.camera = CameraStatus::Off;
            return Effect::None;
        };
        state.camera = CameraStatus::Off;

        tracing::debug!(%session, "Tearing down camera session");
        let camera = env.camera.clone();
        async_effect! {
            camera.stop(session).await;
            None
        }
    }

    /// Forget the current options and load the ones of the current selection
    fn load_options(state: &mut ScannerState, env: &ScannerEnvironment) -> Effect<ScannerAction> {
        state.options_generation += 1;
        state.options.clear();
        state.selected_option = None;
        state.options_error = None;
        state.statistics.reset();
        state.recent_scans.reset();

        let Some(event) = state.event.clone() else {
            state.options_loading = false;
            return Effect::None;
        };
        state.options_loading = true;

        let generation = state.options_generation;
        let resource_type = state.resource_type;
        let catalog = env.catalog.clone();
        Effect::Future(Box::pin(async move {
            let load = catalog.load(event, resource_type).await;
            Some(ScannerAction::OptionsLoaded { generation, load })
        }))
    }

    fn refresh_statistics(state: &mut ScannerState, env: &ScannerEnvironment) -> Effect<ScannerAction> {
        let (Some(event), Some(option)) = (state.event.clone(), state.selected_option.clone()) else {
            return Effect::None;
        };
        let token = state.statistics.begin_refresh();
        let resource_type = state.resource_type;
        let api = env.api.clone();

        Effect::Future(Box::pin(async move {
            let result = api.resource_statistics(event, resource_type, option).await;
            Some(ScannerAction::StatisticsLoaded { token, result })
        }))
    }

    fn refresh_recent_scans(state: &mut ScannerState, env: &ScannerEnvironment) -> Effect<ScannerAction> {
        let Some(event) = state.event.clone() else {
            return Effect::None;
        };
        let token = state.recent_scans.begin_refresh();
        let resource_type = state.resource_type;
        let limit = env.settings.recent_scans_limit;
        let api = env.api.clone();

        Effect::Future(Box::pin(async move {
            let result = api.recent_scans(event, resource_type, limit).await;
            Some(ScannerAction::RecentScansLoaded { token, result })
        }))
    }

    /// Register a scan attempt and run it through the pipeline
    fn begin_scan(
        state: &mut ScannerState,
        env: &ScannerEnvironment,
        code: String,
        source: ScanSource,
    ) -> Effect<ScannerAction> {
        let attempt = ScanAttemptId::new();
        state.in_flight.insert(
            attempt,
            InFlightScan {
                code: code.clone(),
                source,
                started_at: env.clock.now(),
            },
        );

        tracing::debug!(%attempt, ?source, code = %code, "Processing scan");
        let target = state.scan_target();
        let api = env.api.clone();

        Effect::Future(Box::pin(async move {
            let outcome = process_qr_code(api.as_ref(), target, code, attempt).await;
            Some(ScannerAction::ScanCompleted {
                attempt,
                source,
                outcome,
            })
        }))
    }
}

impl Reducer for ScannerReducer {
    type State = ScannerState;
    type Action = ScannerAction;
    type Environment = ScannerEnvironment;

    #[allow(clippy::too_many_lines)] // One arm per action
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ═══════════════════════════════════════════════════════════════
            // Selection
            // ═══════════════════════════════════════════════════════════════
            ScannerAction::SelectEvent { event } => {
                if state.event.as_ref() == Some(&event) {
                    return smallvec![Effect::None];
                }
                state.event = Some(event);
                let teardown = Self::teardown_camera(state, env);
                let load = Self::load_options(state, env);
                smallvec![Effect::chain(vec![teardown, load])]
            },

            ScannerAction::SelectResourceType { resource_type } => {
                state.resource_type = resource_type;
                let teardown = Self::teardown_camera(state, env);
                let load = Self::load_options(state, env);
                smallvec![Effect::chain(vec![teardown, load])]
            },

            ScannerAction::SelectResourceOption { option } => {
                if !state.options.iter().any(|o| o.id == option) {
                    tracing::warn!(%option, "Ignoring selection of an unknown option");
                    return smallvec![Effect::None];
                }
                if state.selected_option.as_ref() == Some(&option) {
                    return smallvec![Effect::None];
                }
                state.selected_option = Some(option);
                state.statistics.reset();
                smallvec![Self::refresh_statistics(state, env)]
            },

            ScannerAction::OptionsLoaded { generation, load } => {
                if generation != state.options_generation || load.resource_type != state.resource_type {
                    tracing::debug!(generation, "Dropping options of a superseded selection");
                    return smallvec![Effect::None];
                }
                state.options_loading = false;
                state.options_error = load.error.clone();
                state.selected_option = load.default_selection();
                state.options = load.options;

                smallvec![
                    Self::refresh_statistics(state, env),
                    Self::refresh_recent_scans(state, env),
                ]
            },

            // ═══════════════════════════════════════════════════════════════
            // Mode and camera
            // ═══════════════════════════════════════════════════════════════
            ScannerAction::SetScannerMode { mode } => {
                if state.mode == mode {
                    return smallvec![Effect::None];
                }
                state.mode = mode;
                state.camera_error = None;
                smallvec![Self::teardown_camera(state, env)]
            },

            ScannerAction::StartScanning => {
                if state.mode != ScannerMode::Camera {
                    tracing::debug!("StartScanning ignored outside camera mode");
                    return smallvec![Effect::None];
                }
                if state.camera.is_running() {
                    return smallvec![Effect::None];
                }

                let previous = state.last_camera_session;
                let session = state.allocate_camera_session();
                state.camera = CameraStatus::Starting(session);
                state.camera_error = None;

                let camera = env.camera.clone();
                let signals = env.camera_signals.clone();
                smallvec![Effect::Future(Box::pin(async move {
                    if let Some(previous) = previous {
                        camera.stop(previous).await;
                    }
                    match camera.start(session, signals).await {
                        Ok(()) => Some(ScannerAction::CameraStarted { session }),
                        Err(error) => Some(ScannerAction::CameraStartFailed { session, error }),
                    }
                }))]
            },

            ScannerAction::StopScanning => {
                smallvec![Self::teardown_camera(state, env)]
            },

            ScannerAction::CameraStarted { session } => {
                if state.camera == CameraStatus::Starting(session) {
                    state.camera = CameraStatus::Active(session);
                    return smallvec![Effect::None];
                }
                // Torn down while opening
                let camera = env.camera.clone();
                smallvec![async_effect! {
                    camera.stop(session).await;
                    None
                }]
            },

            ScannerAction::CameraStartFailed { session, error } => {
                if state.camera != CameraStatus::Starting(session) {
                    return smallvec![Effect::None];
                }
                tracing::warn!(%session, %error, "Camera failed to start");
                state.camera = CameraStatus::Failed;
                state.camera_error = Some(camera_error_banner(&error));
                smallvec![Effect::None]
            },

            ScannerAction::CameraFailed { session, error } => {
                if state.camera.session() != Some(session) {
                    return smallvec![Effect::None];
                }
                tracing::warn!(%session, %error, "Camera stopped while scanning");
                state.camera = CameraStatus::Failed;
                state.camera_error = Some(camera_error_banner(&error));
                let camera = env.camera.clone();
                smallvec![async_effect! {
                    camera.stop(session).await;
                    None
                }]
            },

            ScannerAction::CodeDecoded { session, code } => {
                if state.camera != CameraStatus::Active(session) {
                    tracing::trace!(%session, "Dropping decode outside an active session");
                    return smallvec![Effect::None];
                }
                let code = code.trim().to_string();
                if code.is_empty() {
                    return smallvec![Effect::None];
                }
                state.camera = CameraStatus::Paused(session);

                let camera = env.camera.clone();
                let pause = async_effect! {
                    camera.pause(session).await;
                    None
                };
                smallvec![
                    pause,
                    Self::begin_scan(state, env, code, ScanSource::Camera(session)),
                ]
            },

            ScannerAction::ResumeCamera { session } => {
                if state.camera != CameraStatus::Paused(session) {
                    return smallvec![Effect::None];
                }
                state.camera = CameraStatus::Active(session);
                let camera = env.camera.clone();
                smallvec![async_effect! {
                    camera.resume(session).await;
                    None
                }]
            },

            // ═══════════════════════════════════════════════════════════════
            // Manual entry
            // ═══════════════════════════════════════════════════════════════
            ScannerAction::ManualInputChanged { input } => {
                state.manual_input = input;
                smallvec![Effect::None]
            },

            ScannerAction::SubmitManualCode => {
                let code = state.manual_input.trim().to_string();
                if code.is_empty() {
                    return smallvec![Effect::None];
                }
                state.manual_input.clear();
                smallvec![Self::begin_scan(state, env, code, ScanSource::Manual)]
            },

            // ═══════════════════════════════════════════════════════════════
            // Scan results
            // ═══════════════════════════════════════════════════════════════
            ScannerAction::ScanCompleted {
                attempt,
                source,
                outcome,
            } => {
                state.in_flight.remove(&attempt);
                let mut effects: SmallVec<[Effect<ScannerAction>; 4]> = SmallVec::new();

                if let ScanSource::Camera(session) = source {
                    if state.camera == CameraStatus::Paused(session) {
                        effects.push(delay! {
                            duration: env.settings.resume_delay,
                            action: ScannerAction::ResumeCamera { session }
                        });
                    }
                }

                if outcome.recorded() {
                    state.scans_recorded += 1;
                    effects.push(Self::refresh_statistics(state, env));
                    effects.push(Self::refresh_recent_scans(state, env));

                    let printing = outcome
                        .target
                        .as_ref()
                        .filter(|t| t.resource_type == ResourceType::CertificatePrinting);
                    if let Some(target) = printing {
                        match outcome.registration_id() {
                            Some(registration) => {
                                let api = env.api.clone();
                                let sink = env.certificates.clone();
                                let event = target.event.clone();
                                let template = target.option.id.clone();
                                let registration = registration.clone();

                                effects.push(Effect::Future(Box::pin(async move {
                                    let pdf = match api
                                        .certificate_pdf(event.clone(), registration.clone(), template.clone())
                                        .await
                                    {
                                        Ok(pdf) => pdf,
                                        Err(error) => {
                                            return Some(ScannerAction::CertificateFailed {
                                                attempt,
                                                error: CertificateError::Generation(error),
                                            });
                                        },
                                    };
                                    let document = CertificateDocument {
                                        event,
                                        registration,
                                        template,
                                        pdf,
                                    };
                                    Some(match sink.deliver(document).await {
                                        Ok(location) => ScannerAction::CertificateDelivered { attempt, location },
                                        Err(error) => ScannerAction::CertificateFailed { attempt, error },
                                    })
                                })));
                            },
                            None => {
                                state.push_notification(
                                    NotificationLevel::Error,
                                    CertificateError::MissingRegistration.to_string(),
                                );
                            },
                        }
                    }
                }

                state.last_result = Some(outcome.result);

                if effects.is_empty() {
                    effects.push(Effect::None);
                }
                effects
            },

            ScannerAction::RefreshData => {
                smallvec![
                    Self::refresh_statistics(state, env),
                    Self::refresh_recent_scans(state, env),
                ]
            },

            ScannerAction::StatisticsLoaded { token, result } => {
                if let Err(error) = &result {
                    tracing::warn!(%error, "Statistics refresh failed; keeping last known values");
                }
                if !state.statistics.apply(token, result, env.clock.now()) {
                    tracing::debug!(token, "Dropping statistics of a superseded selection");
                }
                smallvec![Effect::None]
            },

            ScannerAction::RecentScansLoaded { token, result } => {
                if let Err(error) = &result {
                    tracing::warn!(%error, "Recent scans refresh failed; keeping last known list");
                }
                if !state.recent_scans.apply(token, result, env.clock.now()) {
                    tracing::debug!(token, "Dropping recent scans of a superseded selection");
                }
                smallvec![Effect::None]
            },

            // ═══════════════════════════════════════════════════════════════
            // Certificates and notifications
            // ═══════════════════════════════════════════════════════════════
            ScannerAction::CertificateDelivered { attempt, location } => {
                tracing::info!(%attempt, %location, "Certificate ready");
                state.push_notification(
                    NotificationLevel::Info,
                    format!("Certificate ready at {location}. {PRINT_INSTRUCTION}."),
                );
                smallvec![Effect::None]
            },

            ScannerAction::CertificateFailed { attempt, error } => {
                tracing::warn!(%attempt, %error, "Certificate not delivered");
                state.push_notification(NotificationLevel::Error, error.to_string());
                smallvec![Effect::None]
            },

            ScannerAction::DismissNotification { id } => {
                state.notifications.retain(|n| n.id != id);
                smallvec![Effect::None]
            },
        }
    }
}
