mod device_state;

pub use device_state::{DeviceSnapshot, DeviceState, SharedDriver};
