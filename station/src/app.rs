//! Scanner station runtime: the store, its environment and the camera bridge.

use crate::api::AtlasApi;
use crate::camera::{CameraDevice, CameraSignal, DecodedCode};
use crate::catalog::ResourceCatalog;
use crate::certificates::CertificateSink;
use crate::config::Config;
use crate::error::StationError;
use crate::scanner::{
    ScanOutcome, ScanSource, ScannerAction, ScannerEnvironment, ScannerReducer, ScannerSettings,
    ScannerState,
};
use crate::types::{EventId, ResourceOptionId, ResourceType, ScannerMode};
use atlas_core::environment::{Clock, SystemClock};
use atlas_runtime::{EffectHandle, Store, StoreError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

/// Store type driving a station
pub type ScannerStore = Store<ScannerState, ScannerAction, ScannerEnvironment, ScannerReducer>;

/// Collaborators a station is built from
#[derive(Clone)]
pub struct StationDeps {
    /// Atlas backend
    pub api: Arc<dyn AtlasApi>,
    /// QR decoding camera
    pub camera: Arc<dyn CameraDevice>,
    /// Destination of generated certificates
    pub certificates: Arc<dyn CertificateSink>,
    /// Time source
    pub clock: Arc<dyn Clock>,
}

/// How a station behaves
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StationOptions {
    /// Reducer tunables
    pub settings: ScannerSettings,
    /// Show placeholder options when none are configured
    pub placeholder_options: bool,
    /// Initial scanner mode
    pub mode: ScannerMode,
}

impl StationOptions {
    /// Options from the station configuration
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            settings: ScannerSettings {
                resume_delay: config.scanner.resume_delay(),
                recent_scans_limit: config.scanner.recent_scans_limit,
            },
            placeholder_options: config.catalog.placeholder_options,
            mode: config.scanner.default_mode,
        }
    }
}

/// A running scanner station
///
/// Owns the store and a task forwarding camera signals into it. Must be
/// created inside a Tokio runtime.
pub struct ScannerStation {
    store: Arc<ScannerStore>,
    camera: Arc<dyn CameraDevice>,
    bridge: JoinHandle<()>,
}

impl ScannerStation {
    /// Build a station and start forwarding camera signals
    #[must_use]
    pub fn new(deps: StationDeps, options: StationOptions) -> Self {
        let (camera_signals, mut signals) = mpsc::unbounded_channel::<CameraSignal>();

        let environment = ScannerEnvironment {
            catalog: ResourceCatalog::new(Arc::clone(&deps.api), options.placeholder_options),
            api: deps.api,
            camera: Arc::clone(&deps.camera),
            certificates: deps.certificates,
            clock: deps.clock,
            camera_signals,
            settings: options.settings,
        };

        let store = Arc::new(Store::new(
            ScannerState::new(options.mode),
            ScannerReducer::new(),
            environment,
        ));

        let bridge = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                while let Some(signal) = signals.recv().await {
                    let action = match signal {
                        CameraSignal::Decoded(DecodedCode { session, code }) => {
                            ScannerAction::CodeDecoded { session, code }
                        },
                        CameraSignal::Failed { session, error } => ScannerAction::CameraFailed { session, error },
                    };
                    if let Err(error) = store.send(action).await {
                        tracing::debug!(%error, "Camera bridge stopped");
                        break;
                    }
                }
            })
        };

        tracing::info!(mode = ?options.mode, "Scanner station ready");

        Self {
            store,
            camera: deps.camera,
            bridge,
        }
    }

    /// Station over the configured backend, camera and certificate sink with the wall clock
    #[must_use]
    pub fn from_config(
        config: &Config,
        api: Arc<dyn AtlasApi>,
        camera: Arc<dyn CameraDevice>,
        certificates: Arc<dyn CertificateSink>,
    ) -> Self {
        Self::new(
            StationDeps {
                api,
                camera,
                certificates,
                clock: Arc::new(SystemClock),
            },
            StationOptions::from_config(config),
        )
    }

    /// Underlying store
    #[must_use]
    pub fn store(&self) -> &ScannerStore {
        &self.store
    }

    /// Dispatch an action
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] after [`ScannerStation::shutdown`].
    pub async fn send(&self, action: ScannerAction) -> Result<EffectHandle, StoreError> {
        self.store.send(action).await
    }

    /// Read the station state
    pub async fn state<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&ScannerState) -> T,
    {
        self.store.state(f).await
    }

    /// Observe every action produced by effects
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ScannerAction> {
        self.store.subscribe_actions()
    }

    /// Wait until every effect has settled
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Timeout`] if effects are still running after `timeout`.
    pub async fn wait_until_idle(&self, timeout: Duration) -> Result<(), StoreError> {
        self.store.wait_until_idle(timeout).await
    }

    /// Select event, resource type and (optionally) option, waiting for options to load
    ///
    /// Without an explicit option the first loaded one stays selected.
    ///
    /// # Errors
    ///
    /// Returns [`StationError::UnknownOption`] if `option` is not among the
    /// loaded options, leaving the first one selected. Returns
    /// [`StationError::Store`] if the store is shutting down or options do
    /// not load within `timeout`.
    pub async fn configure(
        &self,
        event: EventId,
        resource_type: ResourceType,
        option: Option<ResourceOptionId>,
        timeout: Duration,
    ) -> Result<(), StationError> {
        self.send(ScannerAction::SelectEvent { event }).await?;
        self.store
            .send_and_wait_for(
                ScannerAction::SelectResourceType { resource_type },
                |action| matches!(action, ScannerAction::OptionsLoaded { load, .. } if load.resource_type == resource_type),
                timeout,
            )
            .await?;
        // The loaded options are reduced right after they are broadcast
        self.wait_until_idle(timeout).await?;

        if let Some(option) = option {
            let available = self
                .state(|s| s.options.iter().map(|o| o.id.clone()).collect::<Vec<_>>())
                .await;
            if !available.contains(&option) {
                return Err(StationError::UnknownOption {
                    option: option.to_string(),
                    resource_type: resource_type.to_string(),
                    available: available
                        .iter()
                        .map(ResourceOptionId::as_str)
                        .collect::<Vec<_>>()
                        .join(", "),
                });
            }
            self.send(ScannerAction::SelectResourceOption { option }).await?;
        }
        Ok(())
    }

    /// Submit a typed code and wait for its result
    ///
    /// # Errors
    ///
    /// Returns an error if the store is shutting down or the scan does not
    /// complete within `timeout`.
    pub async fn submit_manual(&self, code: impl Into<String>, timeout: Duration) -> Result<ScanOutcome, StoreError> {
        self.send(ScannerAction::ManualInputChanged { input: code.into() }).await?;
        let completed = self
            .store
            .send_and_wait_for(
                ScannerAction::SubmitManualCode,
                |action| {
                    matches!(
                        action,
                        ScannerAction::ScanCompleted {
                            source: ScanSource::Manual,
                            ..
                        }
                    )
                },
                timeout,
            )
            .await?;

        match completed {
            ScannerAction::ScanCompleted { outcome, .. } => Ok(outcome),
            _ => Err(StoreError::ChannelClosed),
        }
    }

    /// Release the camera, then stop accepting actions and drain effects
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownTimeout`] if effects do not drain in time.
    pub async fn shutdown(&self, timeout: Option<Duration>) -> Result<(), StoreError> {
        let session = self.store.state(|s| s.camera.session()).await;
        if let Err(error) = self.send(ScannerAction::StopScanning).await {
            tracing::debug!(%error, "Station already shutting down");
        }
        if let Some(session) = session {
            self.camera.stop(session).await;
        }
        self.bridge.abort();
        self.store.shutdown(timeout).await
    }
}

impl Drop for ScannerStation {
    fn drop(&mut self) {
        self.bridge.abort();
    }
}

impl std::fmt::Debug for ScannerStation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScannerStation")
            .field("pending_effects", &self.store.pending_effects())
            .finish_non_exhaustive()
    }
}
