use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;

use domain::protocol::mhz19::{
    self, FRAME_LEN, Measurement, Opcode, RawFrame, SENSOR_ADDRESS, START_BYTE,
};

/// Fresh-air level the zero calibration pins the output to
const ZERO_POINT_PPM: i32 = 400;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mhz19SimulatorConfig {
    #[serde(default = "default_baseline_ppm")]
    pub baseline_ppm: u16,
    #[serde(default = "default_amplitude_ppm")]
    pub amplitude_ppm: u16,
    #[serde(default = "default_period_secs")]
    pub period_secs: f64,
    #[serde(default = "default_temperature_c")]
    pub temperature_c: i16,
}

fn default_baseline_ppm() -> u16 {
    650
}
fn default_amplitude_ppm() -> u16 {
    150
}
fn default_period_secs() -> f64 {
    60.0
}
fn default_temperature_c() -> i16 {
    23
}

impl Default for Mhz19SimulatorConfig {
    fn default() -> Self {
        Self {
            baseline_ppm: default_baseline_ppm(),
            amplitude_ppm: default_amplitude_ppm(),
            period_secs: default_period_secs(),
            temperature_c: default_temperature_c(),
        }
    }
}

/// Answers MH-Z19 frames on a byte stream the way the sensor does: read
/// requests get a 9-byte response, configuration frames get none.
pub struct Mhz19Simulator {
    config: Mhz19SimulatorConfig,
    start_time: Instant,
    range_ppm: u16,
    abc_enabled: bool,
    zero_offset: i32,
}

impl Mhz19Simulator {
    pub fn new(config: Mhz19SimulatorConfig) -> Self {
        Self {
            config,
            start_time: Instant::now(),
            range_ppm: 5000,
            abc_enabled: true,
            zero_offset: 0,
        }
    }

    /// Starts serving on one end of an in-memory pipe and returns the other
    /// end. The task ends when that end is dropped and yields every frame it
    /// received.
    pub fn spawn(self) -> (DuplexStream, JoinHandle<Vec<RawFrame>>) {
        let (driver_end, sensor_end) = tokio::io::duplex(256);
        let handle = tokio::spawn(self.serve(sensor_end));
        (driver_end, handle)
    }

    pub async fn serve<S>(mut self, mut stream: S) -> Vec<RawFrame>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut received = Vec::new();
        loop {
            let mut frame = [0u8; FRAME_LEN];
            if stream.read_exact(&mut frame).await.is_err() {
                break;
            }
            received.push(frame);

            if let Some(reply) = self.respond(&frame) {
                if stream.write_all(&reply).await.is_err() {
                    break;
                }
            }
        }
        tracing::debug!(frames = received.len(), "MH-Z19 simulator stopped");
        received
    }

    fn respond(&mut self, frame: &RawFrame) -> Option<RawFrame> {
        if frame[0] != START_BYTE || frame[1] != SENSOR_ADDRESS || !mhz19::verify_checksum(frame) {
            tracing::warn!(frame = ?frame, "Simulator ignored malformed frame");
            return None;
        }

        match Opcode::from_byte(frame[2]) {
            Some(Opcode::ReadCo2) => Some(mhz19::encode_read_response(&self.measurement())),
            Some(Opcode::DetectionRange) => {
                self.range_ppm = u16::from_be_bytes([frame[3], frame[4]]);
                None
            }
            Some(Opcode::AbcLogic) => {
                self.abc_enabled = frame[3] == 0xA0;
                None
            }
            Some(Opcode::CalibrateZero) => {
                self.zero_offset = self.raw_ppm() - ZERO_POINT_PPM;
                None
            }
            Some(Opcode::CalibrateSpan) => None,
            None => {
                tracing::warn!(opcode = frame[2], "Simulator received unknown opcode");
                None
            }
        }
    }

    fn raw_ppm(&self) -> i32 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        let phase = elapsed / self.config.period_secs.max(f64::EPSILON) * std::f64::consts::TAU;
        let value = f64::from(self.config.baseline_ppm) + f64::from(self.config.amplitude_ppm) * phase.sin();
        value.round() as i32
    }

    fn measurement(&self) -> Measurement {
        let ppm = (self.raw_ppm() - self.zero_offset).clamp(0, i32::from(self.range_ppm));
        Measurement {
            co2_ppm: ppm as u16,
            temperature_c: self.config.temperature_c,
            status: 0,
        }
    }

    pub fn abc_enabled(&self) -> bool {
        self.abc_enabled
    }

    pub fn range_ppm(&self) -> u16 {
        self.range_ppm
    }
}
