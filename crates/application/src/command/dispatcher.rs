use std::sync::Arc;

use tracing::{info, warn};

use domain::command::CommandParseError;
use domain::device::ConfigChange;
use domain::driver::DeviceSetting;
use domain::{
    Acknowledgement, Command, DeviceClass, DeviceConfig, DriverError, RejectReason,
    ValidationError,
};

use crate::state::{DeviceState, SharedDriver};

/// Name reported on acknowledgements of payloads that could not be parsed
const UNPARSED: &str = "UNPARSED";

/// Lowest span calibration point accepted, in ppm
const MIN_SPAN_PPM: i64 = 1_000;

/// Turns remote commands into state mutations and device writes.
///
/// Each command is one validate-then-apply transaction. Software state is
/// updated first; a failed device write afterwards is reported on the
/// acknowledgement but does not roll the software state back.
pub struct CommandDispatcher {
    state: Arc<DeviceState>,
    driver: SharedDriver,
}

impl CommandDispatcher {
    pub fn new(state: Arc<DeviceState>, driver: SharedDriver) -> Self {
        Self { state, driver }
    }

    /// Parses and dispatches a raw control payload. Never fails: every
    /// outcome, including a malformed payload, becomes an acknowledgement.
    pub async fn dispatch_payload(&self, payload: &[u8]) -> Acknowledgement {
        match Command::parse(payload) {
            Ok(command) => self.dispatch(command).await,
            Err(e) => {
                let preview = String::from_utf8_lossy(payload);
                match e {
                    CommandParseError::InvalidJson(_) => {
                        warn!(device_id = %self.device_id(), error = %e, payload = %preview, "Malformed command payload")
                    }
                    CommandParseError::NotAnObject => {
                        warn!(device_id = %self.device_id(), payload = %preview, "Command payload is not an object")
                    }
                }
                Acknowledgement::rejected(UNPARSED, RejectReason::MalformedPayload)
            }
        }
    }

    pub async fn dispatch(&self, command: Command) -> Acknowledgement {
        let name = command.name().to_string();

        let ack = match command {
            Command::SetPublishInterval { interval_ms } => match interval_ms {
                Some(value) => {
                    self.apply_software(&name, ConfigChange::Interval(value), "interval_updated")
                }
                None => Acknowledgement::rejected(&name, RejectReason::MissingParameter),
            },
            Command::SetQos { qos } => match qos {
                Some(value) => self.apply_software(&name, ConfigChange::Qos(value), "qos_updated"),
                None => Acknowledgement::rejected(&name, RejectReason::MissingParameter),
            },
            Command::SetEnabled { enabled } => match enabled {
                Some(value) => {
                    self.apply_software(&name, ConfigChange::Enabled(value), "enabled_updated")
                }
                None => Acknowledgement::rejected(&name, RejectReason::MissingParameter),
            },
            Command::SetDetectionRange { range_ppm } => match range_ppm {
                Some(value) => {
                    self.apply_with_device(
                        &name,
                        ConfigChange::DetectionRange(value),
                        "range_updated",
                        "range_update_failed",
                    )
                    .await
                }
                None => Acknowledgement::rejected(&name, RejectReason::MissingParameter),
            },
            Command::SetAbc { enabled } => match enabled {
                Some(value) => {
                    self.apply_with_device(
                        &name,
                        ConfigChange::Abc(value),
                        "abc_updated",
                        "abc_update_failed",
                    )
                    .await
                }
                None => Acknowledgement::rejected(&name, RejectReason::MissingParameter),
            },
            Command::CalibrateZero => {
                self.calibrate(
                    &name,
                    DeviceSetting::CalibrateZero,
                    "calibration_success",
                    "calibration_failed",
                )
                .await
            }
            Command::CalibrateSpan { span_ppm } => self.calibrate_span(&name, span_ppm).await,
            Command::GetInfo => {
                Acknowledgement::accepted(&name, "info_requested").with_config(self.state.config())
            }
            Command::Configure(changes) => self.configure(&name, changes).await,
            Command::Unknown(_) => {
                warn!(device_id = %self.device_id(), command = %name, "Unknown command");
                Acknowledgement::rejected(&name, RejectReason::UnknownCommand)
            }
        };

        info!(
            device_id = %self.device_id(),
            command = %ack.command,
            status = %ack.status,
            outcome = ack.outcome.as_str(),
            "Command dispatched"
        );
        ack
    }

    fn apply_software(&self, name: &str, change: ConfigChange, status: &str) -> Acknowledgement {
        match self.state.try_mutate(&change) {
            Ok(_) => Acknowledgement::accepted(name, status),
            Err(e) => self.reject_invalid(name, e),
        }
    }

    async fn apply_with_device(
        &self,
        name: &str,
        change: ConfigChange,
        status: &str,
        failed_status: &str,
    ) -> Acknowledgement {
        if !change.applies_to(self.state.identity().class) {
            return Acknowledgement::rejected(name, RejectReason::Unsupported);
        }
        let config = match self.state.try_mutate(&change) {
            Ok(config) => config,
            Err(e) => return self.reject_invalid(name, e),
        };

        let Some(setting) = config.device_setting(&change) else {
            return Acknowledgement::accepted(name, status);
        };

        match self.write_setting(setting).await {
            Ok(()) => Acknowledgement::accepted(name, status),
            Err(e) => {
                warn!(
                    device_id = %self.device_id(),
                    command = name,
                    setting = setting.name(),
                    error = %e,
                    "Device write failed, keeping software setting"
                );
                Acknowledgement::software_only(name, failed_status, e.to_string())
            }
        }
    }

    async fn calibrate(
        &self,
        name: &str,
        setting: DeviceSetting,
        status: &str,
        failed_status: &str,
    ) -> Acknowledgement {
        if self.state.config().class() != DeviceClass::Co2Sensor {
            return Acknowledgement::rejected(name, RejectReason::Unsupported);
        }

        match self.write_setting(setting).await {
            Ok(()) => Acknowledgement::accepted(name, status),
            Err(e) => {
                warn!(device_id = %self.device_id(), command = name, error = %e, "Calibration failed");
                Acknowledgement::failed(name, failed_status, e.to_string())
            }
        }
    }

    async fn calibrate_span(&self, name: &str, span_ppm: Option<i64>) -> Acknowledgement {
        let config = self.state.config();
        let Some(co2) = config.co2() else {
            return Acknowledgement::rejected(name, RejectReason::Unsupported);
        };
        let Some(span) = span_ppm else {
            return Acknowledgement::rejected(name, RejectReason::MissingParameter);
        };

        let ceiling = i64::from(co2.detection_range.ppm());
        if !(MIN_SPAN_PPM..=ceiling).contains(&span) {
            return self.reject_invalid(
                name,
                ValidationError::OutOfRange {
                    field: "span_ppm",
                    value: span,
                    min: MIN_SPAN_PPM,
                    max: ceiling,
                },
            );
        }

        // Ceiling is at most 10000, fits in u16
        self.calibrate(
            name,
            DeviceSetting::CalibrateSpan(span as u16),
            "span_calibration_success",
            "span_calibration_failed",
        )
        .await
    }

    /// Field-bag message. Fields that do not exist on this device class are
    /// ignored; the rest are applied together or not at all.
    async fn configure(&self, name: &str, changes: Vec<ConfigChange>) -> Acknowledgement {
        let class = self.state.identity().class;
        let (relevant, ignored): (Vec<_>, Vec<_>) =
            changes.into_iter().partition(|change| change.applies_to(class));
        for change in &ignored {
            warn!(device_id = %self.device_id(), field = change.field(), "Ignoring field for this device class");
        }

        let (config, applied) = match self.state.try_mutate_all(&relevant) {
            Ok(result) => result,
            Err(e) => return self.reject_invalid(name, e),
        };

        if applied.is_empty() {
            return Acknowledgement::accepted(name, "no_change");
        }

        let failures = self.push_to_device(&config, &applied).await;
        if failures.is_empty() {
            Acknowledgement::accepted(name, "config_updated").with_config(config)
        } else {
            Acknowledgement::software_only(name, "config_updated", failures.join("; "))
                .with_config(config)
        }
    }

    async fn push_to_device(&self, config: &DeviceConfig, applied: &[ConfigChange]) -> Vec<String> {
        let mut failures = Vec::new();
        for change in applied {
            let Some(setting) = config.device_setting(change) else {
                continue;
            };
            if let Err(e) = self.write_setting(setting).await {
                warn!(device_id = %self.device_id(), setting = setting.name(), error = %e, "Device write failed");
                failures.push(format!("{}: {}", setting.name(), e));
            }
        }
        failures
    }

    async fn write_setting(&self, setting: DeviceSetting) -> Result<(), DriverError> {
        let mut driver = self.driver.lock().await;
        driver.apply_setting(setting).await
    }

    fn reject_invalid(&self, name: &str, error: ValidationError) -> Acknowledgement {
        warn!(device_id = %self.device_id(), command = name, error = %error, "Command rejected");
        let reason = match error {
            ValidationError::Unsupported { .. } => RejectReason::Unsupported,
            ValidationError::OutOfRange { .. } | ValidationError::NotAllowed { .. } => {
                RejectReason::InvalidParameter
            }
        };
        Acknowledgement::rejected(name, reason).with_detail(error.to_string())
    }

    fn device_id(&self) -> &str {
        &self.state.identity().device_id
    }
}
