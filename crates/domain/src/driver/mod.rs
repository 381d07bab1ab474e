mod acquisition;
mod sensor_driver;
mod warmup;

pub use acquisition::{Acquisition, Frame, Reading};
pub use sensor_driver::{DeviceSetting, SensorDriver};
pub use warmup::WarmupState;
