//! Domain layer - Pure node logic with no external dependencies
//!
//! This crate contains:
//! - Device configuration and metrics records, with their range rules
//! - Acquisition value objects (Reading, Frame) and the warm-up gate
//! - The MH-Z19 binary frame codec
//! - Remote commands and their acknowledgements
//! - Port traits (SensorDriver, EventPublisher)
//!
//! Principles:
//! - No I/O, no runtime
//! - Invalid values are rejected, never clamped
//! - Testable in isolation

pub mod command;
pub mod device;
pub mod driver;
pub mod error;
pub mod event;
pub mod protocol;

// Re-export commonly used types
pub use command::{Acknowledgement, Command, Outcome, RejectReason};
pub use device::{DeviceClass, DeviceConfig, DeviceIdentity, DeviceMetrics, QosLevel};
pub use driver::{Acquisition, Frame, Reading, SensorDriver, WarmupState};
pub use error::{DriverError, ProtocolFault, PublishError, ValidationError};
pub use event::{Channel, EventPublisher, OutboundMessage};
