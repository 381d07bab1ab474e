mod camera;
mod mhz19;
mod mhz19_simulator;
mod transport;

pub use camera::{CameraSimConfig, SimulatedCamera};
pub use mhz19::{Mhz19Config, Mhz19Driver};
pub use mhz19_simulator::{Mhz19Simulator, Mhz19SimulatorConfig};
pub use transport::{PreparedTransport, SerialConfig, SerialOpener, Transport, TransportOpener};

use domain::{DeviceClass, DriverError, SensorDriver};

use crate::config::{CameraConfig, SensorConfig, SensorDriverKind};

/// Factory for creating sensor drivers
pub struct DriverFactory;

impl DriverFactory {
    /// Create the driver for a device class from the node configuration.
    ///
    /// The simulator transport is spawned on the current runtime; nothing
    /// touches real hardware until [`SensorDriver::initialize`].
    pub fn create_driver(
        class: DeviceClass,
        sensor: &SensorConfig,
        camera: &CameraConfig,
    ) -> Result<Box<dyn SensorDriver>, DriverError> {
        match (class, sensor.driver) {
            (DeviceClass::Co2Sensor, SensorDriverKind::Serial) => {
                if sensor.port.trim().is_empty() {
                    return Err(DriverError::Transport(
                        "Serial port not configured".to_string(),
                    ));
                }
                let opener = SerialOpener::new(sensor.serial());
                Ok(Box::new(Mhz19Driver::new(sensor.timing(), Box::new(opener))))
            }
            (DeviceClass::Co2Sensor, SensorDriverKind::Simulator) => {
                let (stream, _task) =
                    Mhz19Simulator::new(Mhz19SimulatorConfig::default()).spawn();
                let opener = PreparedTransport::new("mhz19-simulator", stream);
                Ok(Box::new(Mhz19Driver::new(sensor.timing(), Box::new(opener))))
            }
            (DeviceClass::Camera, _) => Ok(Box::new(SimulatedCamera::new(camera.simulation()))),
        }
    }
}
