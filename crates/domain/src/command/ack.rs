use serde::Serialize;

use crate::device::DeviceConfig;

/// Why a command was refused without touching state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    UnknownCommand,
    InvalidParameter,
    MissingParameter,
    Unsupported,
    MalformedPayload,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownCommand => "unknown_command",
            Self::InvalidParameter => "invalid_parameter",
            Self::MissingParameter => "missing_parameter",
            Self::Unsupported => "unsupported",
            Self::MalformedPayload => "malformed_payload",
        }
    }
}

/// How a command ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Software state updated and, where relevant, the device write accepted
    Accepted,
    /// Software state updated but the device write failed
    AcceptedSoftwareOnly,
    /// A device-only command (calibration) failed
    Failed,
    Rejected(RejectReason),
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::AcceptedSoftwareOnly => "accepted_software_only",
            Self::Failed => "failed",
            Self::Rejected(_) => "rejected",
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

/// Result of dispatching one command, published on the status channel
#[derive(Debug, Clone, PartialEq)]
pub struct Acknowledgement {
    pub command: String,
    /// Short status token, e.g. `interval_updated` or `rejected:invalid_parameter`
    pub status: String,
    pub outcome: Outcome,
    pub detail: Option<String>,
    /// Configuration echoed back (GET_INFO)
    pub config: Option<DeviceConfig>,
}

impl Acknowledgement {
    fn new(command: &str, status: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            command: command.to_string(),
            status: status.into(),
            outcome,
            detail: None,
            config: None,
        }
    }

    pub fn accepted(command: &str, status: &str) -> Self {
        Self::new(command, status, Outcome::Accepted)
    }

    pub fn software_only(command: &str, status: &str, detail: impl Into<String>) -> Self {
        Self::new(command, status, Outcome::AcceptedSoftwareOnly).with_detail(detail)
    }

    pub fn failed(command: &str, status: &str, detail: impl Into<String>) -> Self {
        Self::new(command, status, Outcome::Failed).with_detail(detail)
    }

    pub fn rejected(command: &str, reason: RejectReason) -> Self {
        Self::new(
            command,
            format!("rejected:{}", reason.as_str()),
            Outcome::Rejected(reason),
        )
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_config(mut self, config: DeviceConfig) -> Self {
        self.config = Some(config);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_status_token() {
        let ack = Acknowledgement::rejected("SET_QOS", RejectReason::InvalidParameter);
        assert_eq!(ack.status, "rejected:invalid_parameter");
        assert_eq!(ack.outcome.as_str(), "rejected");
        assert!(ack.outcome.is_rejected());
    }

    #[test]
    fn test_software_only_keeps_detail() {
        let ack = Acknowledgement::software_only("SET_ABC", "abc_update_failed", "write failed");
        assert_eq!(ack.outcome, Outcome::AcceptedSoftwareOnly);
        assert_eq!(ack.outcome.as_str(), "accepted_software_only");
        assert_eq!(ack.detail.as_deref(), Some("write failed"));
    }
}
