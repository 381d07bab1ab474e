mod common;

use std::sync::Arc;

use application::CommandDispatcher;
use common::{MockDriver, shared, state_for};
use domain::device::{DetectionRange, Resolution};
use domain::driver::DeviceSetting;
use domain::error::ProtocolFault;
use domain::{DeviceClass, DriverError, Outcome, QosLevel, RejectReason};
use mockall::predicate::eq;

fn dispatcher(class: DeviceClass, driver: MockDriver) -> (CommandDispatcher, Arc<application::DeviceState>) {
    let state = state_for(class);
    (CommandDispatcher::new(state.clone(), shared(driver)), state)
}

fn timeout() -> DriverError {
    DriverError::protocol(ProtocolFault::Timeout { timeout_ms: 1000 })
}

#[tokio::test]
async fn test_interval_below_minimum_is_rejected() {
    let (dispatcher, state) = dispatcher(DeviceClass::Co2Sensor, MockDriver::new());
    let before = state.config();

    let ack = dispatcher
        .dispatch_payload(br#"{"command":"SET_PUBLISH_INTERVAL","interval_ms":500}"#)
        .await;

    assert_eq!(ack.status, "rejected:invalid_parameter");
    assert_eq!(ack.outcome, Outcome::Rejected(RejectReason::InvalidParameter));
    assert_eq!(state.config(), before);
}

#[tokio::test]
async fn test_interval_update_is_accepted() {
    let (dispatcher, state) = dispatcher(DeviceClass::Co2Sensor, MockDriver::new());

    let ack = dispatcher
        .dispatch_payload(br#"{"command":"SET_PUBLISH_INTERVAL","interval_ms":2000}"#)
        .await;

    assert_eq!(ack.status, "interval_updated");
    assert_eq!(ack.outcome, Outcome::Accepted);
    assert_eq!(state.config().interval_ms, 2000);
}

#[tokio::test]
async fn test_same_command_twice_is_idempotent() {
    let (dispatcher, state) = dispatcher(DeviceClass::Co2Sensor, MockDriver::new());
    let payload = br#"{"command":"SET_QOS","qos":2}"#;

    dispatcher.dispatch_payload(payload).await;
    let once = state.config();
    dispatcher.dispatch_payload(payload).await;

    assert_eq!(state.config(), once);
    assert_eq!(once.qos, QosLevel::ExactlyOnce);
}

#[tokio::test]
async fn test_missing_and_mistyped_parameters() {
    let (dispatcher, state) = dispatcher(DeviceClass::Co2Sensor, MockDriver::new());
    let before = state.config();

    let missing = dispatcher.dispatch_payload(br#"{"command":"SET_QOS"}"#).await;
    let mistyped = dispatcher
        .dispatch_payload(br#"{"command":"SET_ENABLED","enabled":"no"}"#)
        .await;

    assert_eq!(missing.status, "rejected:missing_parameter");
    assert_eq!(mistyped.status, "rejected:missing_parameter");
    assert_eq!(state.config(), before);
}

#[tokio::test]
async fn test_unknown_and_malformed_payloads() {
    let (dispatcher, _state) = dispatcher(DeviceClass::Co2Sensor, MockDriver::new());

    let unknown = dispatcher.dispatch_payload(br#"{"command":"REBOOT"}"#).await;
    assert_eq!(unknown.status, "rejected:unknown_command");
    assert_eq!(unknown.command, "REBOOT");

    let malformed = dispatcher.dispatch_payload(b"not json").await;
    assert_eq!(malformed.status, "rejected:malformed_payload");

    let array = dispatcher.dispatch_payload(b"[1,2,3]").await;
    assert_eq!(array.status, "rejected:malformed_payload");
}

#[tokio::test]
async fn test_detection_range_pushes_frame_to_device() {
    let mut driver = MockDriver::new();
    driver
        .expect_apply_setting()
        .with(eq(DeviceSetting::DetectionRange(DetectionRange::Ppm2000)))
        .times(1)
        .returning(|_| Ok(()));
    let (dispatcher, state) = dispatcher(DeviceClass::Co2Sensor, driver);

    let ack = dispatcher
        .dispatch_payload(br#"{"command":"SET_DETECTION_RANGE","range_ppm":2000}"#)
        .await;

    assert_eq!(ack.status, "range_updated");
    assert_eq!(ack.outcome, Outcome::Accepted);
    assert_eq!(
        state.config().co2().unwrap().detection_range,
        DetectionRange::Ppm2000
    );
}

#[tokio::test]
async fn test_device_write_failure_keeps_software_setting() {
    let mut driver = MockDriver::new();
    driver
        .expect_apply_setting()
        .times(1)
        .returning(|_| Err(timeout()));
    let (dispatcher, state) = dispatcher(DeviceClass::Co2Sensor, driver);

    let ack = dispatcher
        .dispatch_payload(br#"{"command":"SET_ABC","enabled":false}"#)
        .await;

    assert_eq!(ack.status, "abc_update_failed");
    assert_eq!(ack.outcome, Outcome::AcceptedSoftwareOnly);
    assert!(ack.detail.is_some());
    assert!(!state.config().co2().unwrap().abc_enabled);
}

#[tokio::test]
async fn test_invalid_range_never_reaches_device() {
    let mut driver = MockDriver::new();
    driver.expect_apply_setting().times(0);
    let (dispatcher, state) = dispatcher(DeviceClass::Co2Sensor, driver);
    let before = state.config();

    let ack = dispatcher
        .dispatch_payload(br#"{"command":"SET_DETECTION_RANGE","range_ppm":3000}"#)
        .await;

    assert_eq!(ack.status, "rejected:invalid_parameter");
    assert_eq!(state.config(), before);
}

#[tokio::test]
async fn test_calibration_outcomes() {
    let mut driver = MockDriver::new();
    driver
        .expect_apply_setting()
        .with(eq(DeviceSetting::CalibrateZero))
        .times(1)
        .returning(|_| Err(DriverError::Transport("port closed".into())));
    driver
        .expect_apply_setting()
        .with(eq(DeviceSetting::CalibrateSpan(2000)))
        .times(1)
        .returning(|_| Ok(()));
    let (dispatcher, _state) = dispatcher(DeviceClass::Co2Sensor, driver);

    let zero = dispatcher
        .dispatch_payload(br#"{"command":"CALIBRATE_ZERO"}"#)
        .await;
    assert_eq!(zero.status, "calibration_failed");
    assert_eq!(zero.outcome, Outcome::Failed);

    let span = dispatcher
        .dispatch_payload(br#"{"command":"CALIBRATE_SPAN","span_ppm":2000}"#)
        .await;
    assert_eq!(span.status, "span_calibration_success");

    let above_range = dispatcher
        .dispatch_payload(br#"{"command":"CALIBRATE_SPAN","span_ppm":6000}"#)
        .await;
    assert_eq!(above_range.status, "rejected:invalid_parameter");
}

#[tokio::test]
async fn test_get_info_echoes_config() {
    let (dispatcher, state) = dispatcher(DeviceClass::Co2Sensor, MockDriver::new());
    let ack = dispatcher.dispatch_payload(br#"{"command":"GET_INFO"}"#).await;
    assert_eq!(ack.status, "info_requested");
    assert_eq!(ack.config, Some(state.config()));
}

#[tokio::test]
async fn test_co2_commands_unsupported_on_camera() {
    let mut driver = MockDriver::new();
    driver.expect_apply_setting().times(0);
    let (dispatcher, _state) = dispatcher(DeviceClass::Camera, driver);

    let abc = dispatcher
        .dispatch_payload(br#"{"command":"SET_ABC","enabled":true}"#)
        .await;
    let zero = dispatcher
        .dispatch_payload(br#"{"command":"CALIBRATE_ZERO"}"#)
        .await;

    assert_eq!(abc.status, "rejected:unsupported");
    assert_eq!(zero.status, "rejected:unsupported");
}

#[tokio::test]
async fn test_camera_field_bag_is_all_or_nothing() {
    let mut driver = MockDriver::new();
    driver.expect_apply_setting().times(0);
    let (dispatcher, state) = dispatcher(DeviceClass::Camera, driver);
    let before = state.config();

    let ack = dispatcher
        .dispatch_payload(br#"{"resolution":"VGA","quality":99}"#)
        .await;

    assert_eq!(ack.status, "rejected:invalid_parameter");
    assert_eq!(state.config(), before);
}

#[tokio::test]
async fn test_camera_field_bag_applies_changed_fields() {
    let mut driver = MockDriver::new();
    driver
        .expect_apply_setting()
        .with(eq(DeviceSetting::Resolution(Resolution::Vga)))
        .times(1)
        .returning(|_| Ok(()));
    driver
        .expect_apply_setting()
        .with(eq(DeviceSetting::Brightness(1)))
        .times(1)
        .returning(|_| Err(DriverError::Capture("sensor busy".into())));
    let (dispatcher, state) = dispatcher(DeviceClass::Camera, driver);

    // quality 10 is the default and is dropped as unchanged
    let ack = dispatcher
        .dispatch_payload(
            br#"{"resolution":"VGA","quality":10,"brightness":1,"capture_interval_ms":250,"range_ppm":2000}"#,
        )
        .await;

    assert_eq!(ack.status, "config_updated");
    assert_eq!(ack.outcome, Outcome::AcceptedSoftwareOnly);
    let camera = *state.config().camera().unwrap();
    assert_eq!(camera.resolution, Resolution::Vga);
    assert_eq!(camera.brightness, 1);
    assert_eq!(state.config().interval_ms, 250);
}

#[tokio::test]
async fn test_field_bag_without_changes() {
    let (dispatcher, _state) = dispatcher(DeviceClass::Camera, MockDriver::new());
    let ack = dispatcher.dispatch_payload(br#"{"quality":10}"#).await;
    assert_eq!(ack.status, "no_change");
    assert_eq!(ack.outcome, Outcome::Accepted);
}
