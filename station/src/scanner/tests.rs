#![allow(clippy::unwrap_used)]

use super::*;
use crate::api::AtlasApi;
use crate::catalog::{CatalogLoad, ResourceCatalog};
use crate::error::{ApiError, CameraError};
use crate::mocks::{MemoryCertificateSink, MockAtlasApi, MockCamera};
use crate::types::{
    CameraSessionId, EventId, Registration, RegistrationId, ResourceOption, ResourceOptionId,
    ResourceStatistics, ResourceType, ScanAttemptId, ScanOutcomeKind, ScanResult, ScannerMode,
};
use atlas_testing::{ReducerTest, assertions, test_clock, test_epoch};
use std::sync::Arc;
use tokio::sync::mpsc;

fn environment() -> ScannerEnvironment {
    let api: Arc<dyn AtlasApi> = Arc::new(MockAtlasApi::new());
    let (camera_signals, _signals) = mpsc::unbounded_channel();
    ScannerEnvironment {
        catalog: ResourceCatalog::new(Arc::clone(&api), true),
        api,
        camera: Arc::new(MockCamera::new()),
        certificates: Arc::new(MemoryCertificateSink::new()),
        clock: Arc::new(test_clock()),
        camera_signals,
        settings: ScannerSettings::default(),
    }
}

fn session(n: u64) -> CameraSessionId {
    CameraSessionId::new(n)
}

/// Event selected, one breakfast option loaded and selected
fn ready_state(mode: ScannerMode) -> ScannerState {
    let mut state = ScannerState::new(mode);
    state.event = Some(EventId::new("E1"));
    state.options = vec![
        ResourceOption::configured("0_Breakfast", "Breakfast (Jan 1)"),
        ResourceOption::configured("0_Lunch", "Lunch (Jan 1)"),
    ];
    state.selected_option = Some(ResourceOptionId::new("0_Breakfast"));
    state.options_generation = 1;
    state
}

fn target(resource_type: ResourceType) -> ScanTarget {
    ScanTarget {
        event: EventId::new("E1"),
        resource_type,
        option: ResourceOption::configured("tmpl-1", "Attendance"),
    }
}

fn recorded(resource_type: ResourceType, registration: Option<Registration>) -> ScanOutcome {
    ScanOutcome {
        result: ScanResult {
            success: true,
            message: format!("{} recorded successfully", resource_type.label()),
            details: None,
            kind: ScanOutcomeKind::Recorded,
            registration,
            resource_option: Some("Attendance".to_string()),
            code: "REG-001".to_string(),
        },
        target: Some(target(resource_type)),
    }
}

fn rejected() -> ScanOutcome {
    ScanOutcome {
        result: ScanResult::failure(ScanOutcomeKind::Rejected, "REG-404", "Unknown code", None),
        target: Some(target(ResourceType::Food)),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Selection
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn selecting_an_event_loads_its_options() {
    ReducerTest::new(ScannerReducer::new())
        .with_env(environment())
        .given_state(ScannerState::default())
        .when_action(ScannerAction::SelectEvent {
            event: EventId::new("E1"),
        })
        .then_state(|state| {
            assert_eq!(state.event, Some(EventId::new("E1")));
            assert!(state.options_loading);
            assert!(state.options.is_empty());
            assert_eq!(state.selected_option, None);
        })
        .then_effects(|effects| {
            assertions::assert_effects_count(effects, 1);
            assertions::assert_has_future_effect(effects);
        })
        .run();
}

#[test]
fn reselecting_the_same_event_does_nothing() {
    ReducerTest::new(ScannerReducer::new())
        .with_env(environment())
        .given_state(ready_state(ScannerMode::Manual))
        .when_action(ScannerAction::SelectEvent {
            event: EventId::new("E1"),
        })
        .then_state(|state| assert_eq!(state.options.len(), 2))
        .then_effects(assertions::assert_no_effects)
        .run();
}

#[test]
fn loaded_options_select_the_first_and_refresh_views() {
    let mut state = ScannerState::default();
    state.event = Some(EventId::new("E1"));
    state.options_generation = 3;
    state.options_loading = true;

    ReducerTest::new(ScannerReducer::new())
        .with_env(environment())
        .given_state(state)
        .when_action(ScannerAction::OptionsLoaded {
            generation: 3,
            load: CatalogLoad {
                resource_type: ResourceType::Food,
                options: vec![
                    ResourceOption::configured("0_Dinner", "Dinner (Jan 1)"),
                    ResourceOption::configured("1_Dinner", "Dinner (Jan 2)"),
                ],
                error: None,
            },
        })
        .then_state(|state| {
            assert!(!state.options_loading);
            assert_eq!(state.selected_option, Some(ResourceOptionId::new("0_Dinner")));
            assert!(state.statistics.loading);
            assert!(state.recent_scans.loading);
        })
        .then_effects(|effects| {
            assertions::assert_effects_count(effects, 2);
            assertions::assert_has_future_effect(effects);
        })
        .run();
}

#[test]
fn options_of_a_superseded_load_are_dropped() {
    let mut state = ScannerState::default();
    state.event = Some(EventId::new("E1"));
    state.options_generation = 2;

    ReducerTest::new(ScannerReducer::new())
        .with_env(environment())
        .given_state(state)
        .when_action(ScannerAction::OptionsLoaded {
            generation: 1,
            load: CatalogLoad {
                resource_type: ResourceType::Food,
                options: vec![ResourceOption::configured("old", "Old")],
                error: None,
            },
        })
        .then_state(|state| {
            assert!(state.options.is_empty());
            assert_eq!(state.selected_option, None);
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}

#[test]
fn unknown_option_cannot_be_selected() {
    ReducerTest::new(ScannerReducer::new())
        .with_env(environment())
        .given_state(ready_state(ScannerMode::Manual))
        .when_action(ScannerAction::SelectResourceOption {
            option: ResourceOptionId::new("9_Brunch"),
        })
        .then_state(|state| {
            assert_eq!(state.selected_option, Some(ResourceOptionId::new("0_Breakfast")));
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}

#[test]
fn changing_option_resets_statistics_and_refreshes() {
    let mut state = ready_state(ScannerMode::Manual);
    let token = state.statistics.begin_refresh();
    state.statistics.apply(
        token,
        Ok(ResourceStatistics {
            count: 40,
            today: 12,
            unique_attendees: 38,
        }),
        test_epoch(),
    );

    ReducerTest::new(ScannerReducer::new())
        .with_env(environment())
        .given_state(state)
        .when_action(ScannerAction::SelectResourceOption {
            option: ResourceOptionId::new("0_Lunch"),
        })
        .then_state(|state| {
            assert_eq!(state.statistics.value, ResourceStatistics::default());
            assert!(state.statistics.loading);
        })
        .then_effects(|effects| {
            assertions::assert_effects_count(effects, 1);
            assertions::assert_has_future_effect(effects);
        })
        .run();
}

#[test]
fn changing_resource_type_tears_down_the_camera_before_loading() {
    let mut state = ready_state(ScannerMode::Camera);
    state.camera = CameraStatus::Active(session(1));

    ReducerTest::new(ScannerReducer::new())
        .with_env(environment())
        .given_state(state)
        .when_action(ScannerAction::SelectResourceType {
            resource_type: ResourceType::Kits,
        })
        .then_state(|state| {
            assert_eq!(state.camera, CameraStatus::Off);
            assert_eq!(state.resource_type, ResourceType::Kits);
            assert!(state.options.is_empty());
            assert!(state.options_loading);
        })
        .then_effects(|effects| {
            assertions::assert_effects_count(effects, 1);
            assert!(matches!(&effects[0], atlas_core::effect::Effect::Sequential(steps) if steps.len() == 2));
        })
        .run();
}

// ═══════════════════════════════════════════════════════════════════════
// Camera
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn start_scanning_is_ignored_in_manual_mode() {
    ReducerTest::new(ScannerReducer::new())
        .with_env(environment())
        .given_state(ready_state(ScannerMode::Manual))
        .when_action(ScannerAction::StartScanning)
        .then_state(|state| assert_eq!(state.camera, CameraStatus::Off))
        .then_effects(assertions::assert_no_effects)
        .run();
}

#[test]
fn start_scanning_opens_a_new_session() {
    ReducerTest::new(ScannerReducer::new())
        .with_env(environment())
        .given_state(ready_state(ScannerMode::Camera))
        .when_actions([
            ScannerAction::StartScanning,
            ScannerAction::CameraStarted { session: session(1) },
            ScannerAction::StopScanning,
            ScannerAction::StartScanning,
        ])
        .then_state(|state| {
            assert_eq!(state.camera, CameraStatus::Starting(session(2)));
            assert_eq!(state.last_camera_session, Some(session(2)));
        })
        .then_effects(assertions::assert_has_future_effect)
        .run();
}

#[test]
fn start_failure_advises_manual_mode() {
    ReducerTest::new(ScannerReducer::new())
        .with_env(environment())
        .given_state(ready_state(ScannerMode::Camera))
        .when_actions([
            ScannerAction::StartScanning,
            ScannerAction::CameraStartFailed {
                session: session(1),
                error: CameraError::StartFailed("no video device".to_string()),
            },
        ])
        .then_state(|state| {
            assert_eq!(state.camera, CameraStatus::Failed);
            let banner = state.camera_error.as_deref().unwrap();
            assert!(banner.contains("no video device"));
            assert!(banner.contains("manual mode"));
        })
        .run();
}

#[test]
fn camera_failure_mid_session_releases_the_device() {
    let mut state = ready_state(ScannerMode::Camera);
    state.camera = CameraStatus::Active(session(3));

    ReducerTest::new(ScannerReducer::new())
        .with_env(environment())
        .given_state(state)
        .when_action(ScannerAction::CameraFailed {
            session: session(3),
            error: CameraError::Stopped("no device".to_string()),
        })
        .then_state(|state| {
            assert_eq!(state.camera, CameraStatus::Failed);
            assert!(!state.camera.is_running());
            let banner = state.camera_error.as_deref().unwrap();
            assert!(banner.contains("no device"));
            assert!(banner.contains("manual mode"));
        })
        .then_effects(assertions::assert_has_future_effect)
        .run();
}

#[test]
fn failure_of_a_previous_session_is_ignored() {
    let mut state = ready_state(ScannerMode::Camera);
    state.camera = CameraStatus::Active(session(3));

    ReducerTest::new(ScannerReducer::new())
        .with_env(environment())
        .given_state(state)
        .when_action(ScannerAction::CameraFailed {
            session: session(2),
            error: CameraError::Stopped("decoder process exited".to_string()),
        })
        .then_state(|state| {
            assert_eq!(state.camera, CameraStatus::Active(session(3)));
            assert_eq!(state.camera_error, None);
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}

#[test]
fn late_start_of_a_torn_down_session_is_stopped() {
    ReducerTest::new(ScannerReducer::new())
        .with_env(environment())
        .given_state(ready_state(ScannerMode::Camera))
        .when_actions([
            ScannerAction::StartScanning,
            ScannerAction::StopScanning,
            ScannerAction::CameraStarted { session: session(1) },
        ])
        .then_state(|state| assert_eq!(state.camera, CameraStatus::Off))
        .then_effects(assertions::assert_has_future_effect)
        .run();
}

#[test]
fn switching_to_manual_releases_the_camera() {
    let mut state = ready_state(ScannerMode::Camera);
    state.camera = CameraStatus::Paused(session(4));

    ReducerTest::new(ScannerReducer::new())
        .with_env(environment())
        .given_state(state)
        .when_action(ScannerAction::SetScannerMode {
            mode: ScannerMode::Manual,
        })
        .then_state(|state| {
            assert_eq!(state.mode, ScannerMode::Manual);
            assert_eq!(state.camera, CameraStatus::Off);
        })
        .then_effects(assertions::assert_has_future_effect)
        .run();
}

#[test]
fn decode_pauses_the_camera_and_starts_a_scan() {
    let mut state = ready_state(ScannerMode::Camera);
    state.camera = CameraStatus::Active(session(1));

    ReducerTest::new(ScannerReducer::new())
        .with_env(environment())
        .given_state(state)
        .when_action(ScannerAction::CodeDecoded {
            session: session(1),
            code: " REG-001 ".to_string(),
        })
        .then_state(|state| {
            assert_eq!(state.camera, CameraStatus::Paused(session(1)));
            assert!(state.is_processing());
            let scan = state.in_flight.values().next().unwrap();
            assert_eq!(scan.code, "REG-001");
            assert_eq!(scan.source, ScanSource::Camera(session(1)));
            assert_eq!(scan.started_at, test_epoch());
        })
        .then_effects(|effects| assertions::assert_effects_count(effects, 2))
        .run();
}

#[test]
fn decodes_outside_the_active_session_are_dropped() {
    for camera in [
        CameraStatus::Active(session(2)),
        CameraStatus::Paused(session(1)),
        CameraStatus::Starting(session(1)),
        CameraStatus::Off,
    ] {
        let mut state = ready_state(ScannerMode::Camera);
        state.camera = camera;

        ReducerTest::new(ScannerReducer::new())
            .with_env(environment())
            .given_state(state)
            .when_action(ScannerAction::CodeDecoded {
                session: session(1),
                code: "REG-001".to_string(),
            })
            .then_state(move |state| {
                assert_eq!(state.camera, camera);
                assert!(!state.is_processing());
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }
}

#[test]
fn camera_scan_result_schedules_the_resume() {
    let attempt = ScanAttemptId::new();
    let mut state = ready_state(ScannerMode::Camera);
    state.camera = CameraStatus::Paused(session(1));

    ReducerTest::new(ScannerReducer::new())
        .with_env(environment())
        .given_state(state)
        .when_action(ScannerAction::ScanCompleted {
            attempt,
            source: ScanSource::Camera(session(1)),
            outcome: rejected(),
        })
        .then_state(|state| {
            assert!(!state.is_processing());
            assert_eq!(state.camera, CameraStatus::Paused(session(1)));
            assert_eq!(state.last_result.as_ref().unwrap().message, "Unknown code");
            assert_eq!(state.scans_recorded, 0);
        })
        .then_effects(|effects| {
            assertions::assert_effects_count(effects, 1);
            assertions::assert_has_delay_effect(effects);
        })
        .run();
}

#[test]
fn resume_only_applies_to_the_paused_session() {
    let mut state = ready_state(ScannerMode::Camera);
    state.camera = CameraStatus::Paused(session(2));

    ReducerTest::new(ScannerReducer::new())
        .with_env(environment())
        .given_state(state)
        .when_action(ScannerAction::ResumeCamera { session: session(1) })
        .then_state(|state| assert_eq!(state.camera, CameraStatus::Paused(session(2))))
        .then_effects(assertions::assert_no_effects)
        .run();
}

// ═══════════════════════════════════════════════════════════════════════
// Manual entry and results
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn blank_manual_submission_does_nothing() {
    ReducerTest::new(ScannerReducer::new())
        .with_env(environment())
        .given_state(ready_state(ScannerMode::Manual))
        .when_actions([
            ScannerAction::ManualInputChanged {
                input: "   ".to_string(),
            },
            ScannerAction::SubmitManualCode,
        ])
        .then_state(|state| {
            assert!(!state.is_processing());
            assert_eq!(state.last_result, None);
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}

#[test]
fn manual_submission_clears_the_field() {
    ReducerTest::new(ScannerReducer::new())
        .with_env(environment())
        .given_state(ready_state(ScannerMode::Manual))
        .when_actions([
            ScannerAction::ManualInputChanged {
                input: "  REG-001\n".to_string(),
            },
            ScannerAction::SubmitManualCode,
        ])
        .then_state(|state| {
            assert!(state.manual_input.is_empty());
            let scan = state.in_flight.values().next().unwrap();
            assert_eq!(scan.code, "REG-001");
            assert_eq!(scan.source, ScanSource::Manual);
        })
        .then_effects(|effects| {
            assertions::assert_effects_count(effects, 1);
            assertions::assert_has_future_effect(effects);
        })
        .run();
}

#[test]
fn recorded_scan_refreshes_statistics_and_feed_once() {
    ReducerTest::new(ScannerReducer::new())
        .with_env(environment())
        .given_state(ready_state(ScannerMode::Manual))
        .when_action(ScannerAction::ScanCompleted {
            attempt: ScanAttemptId::new(),
            source: ScanSource::Manual,
            outcome: recorded(ResourceType::Food, None),
        })
        .then_state(|state| {
            assert_eq!(state.scans_recorded, 1);
            assert!(state.last_result.as_ref().unwrap().success);
            assert!(state.statistics.loading);
            assert!(state.recent_scans.loading);
        })
        .then_effects(|effects| assertions::assert_effects_count(effects, 2))
        .run();
}

#[test]
fn recorded_certificate_scan_generates_the_certificate() {
    let registration = Registration {
        id: RegistrationId::new("r1"),
        registration_id: Some("REG-001".to_string()),
        first_name: Some("Ada".to_string()),
        last_name: Some("Lovelace".to_string()),
        email: None,
        category: None,
    };

    ReducerTest::new(ScannerReducer::new())
        .with_env(environment())
        .given_state(ready_state(ScannerMode::Manual))
        .when_action(ScannerAction::ScanCompleted {
            attempt: ScanAttemptId::new(),
            source: ScanSource::Manual,
            outcome: recorded(ResourceType::CertificatePrinting, Some(registration)),
        })
        .then_state(|state| assert!(state.notifications.is_empty()))
        .then_effects(|effects| assertions::assert_effects_count(effects, 3))
        .run();
}

#[test]
fn certificate_scan_without_registration_raises_a_toast() {
    ReducerTest::new(ScannerReducer::new())
        .with_env(environment())
        .given_state(ready_state(ScannerMode::Manual))
        .when_action(ScannerAction::ScanCompleted {
            attempt: ScanAttemptId::new(),
            source: ScanSource::Manual,
            outcome: recorded(ResourceType::CertificatePrinting, None),
        })
        .then_state(|state| {
            assert_eq!(state.notifications.len(), 1);
            assert_eq!(state.notifications[0].level, NotificationLevel::Error);
        })
        .then_effects(|effects| assertions::assert_effects_count(effects, 2))
        .run();
}

#[test]
fn failed_refresh_keeps_the_last_statistics() {
    let mut state = ready_state(ScannerMode::Manual);
    let token = state.statistics.begin_refresh();
    state.statistics.apply(
        token,
        Ok(ResourceStatistics {
            count: 7,
            today: 3,
            unique_attendees: 7,
        }),
        test_epoch(),
    );
    let token = state.statistics.begin_refresh();

    ReducerTest::new(ScannerReducer::new())
        .with_env(environment())
        .given_state(state)
        .when_action(ScannerAction::StatisticsLoaded {
            token,
            result: Err(ApiError::Transport("connection reset".to_string())),
        })
        .then_state(|state| {
            assert_eq!(state.statistics.value.count, 7);
            assert!(state.statistics.stale);
            assert!(!state.statistics.loading);
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}

#[test]
fn notifications_can_be_dismissed() {
    let mut state = ready_state(ScannerMode::Manual);
    let first = state.push_notification(NotificationLevel::Info, "Certificate ready");
    let second = state.push_notification(NotificationLevel::Error, "Printer offline");

    ReducerTest::new(ScannerReducer::new())
        .with_env(environment())
        .given_state(state)
        .when_action(ScannerAction::DismissNotification { id: first })
        .then_state(move |state| {
            assert_eq!(state.notifications.len(), 1);
            assert_eq!(state.notifications[0].id, second);
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}
