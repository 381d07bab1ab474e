//! MH-Z19 UART framing.
//!
//! Every frame is 9 bytes: `0xFF`, an address (`0x01` outbound) or the echoed
//! opcode (inbound), five payload bytes, and a checksum over bytes 1..=7:
//! `0xFF - (sum mod 256) + 1`.

use crate::driver::DeviceSetting;
use crate::error::{DriverError, ProtocolFault};

pub const FRAME_LEN: usize = 9;
pub const START_BYTE: u8 = 0xFF;
pub const SENSOR_ADDRESS: u8 = 0x01;
pub const TEMPERATURE_OFFSET: i16 = 40;

pub type RawFrame = [u8; FRAME_LEN];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    ReadCo2 = 0x86,
    CalibrateZero = 0x87,
    CalibrateSpan = 0x88,
    AbcLogic = 0x79,
    DetectionRange = 0x99,
}

impl Opcode {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x86 => Some(Self::ReadCo2),
            0x87 => Some(Self::CalibrateZero),
            0x88 => Some(Self::CalibrateSpan),
            0x79 => Some(Self::AbcLogic),
            0x99 => Some(Self::DetectionRange),
            _ => None,
        }
    }
}

/// Decoded payload of a read response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    pub co2_ppm: u16,
    pub temperature_c: i16,
    pub status: u8,
}

pub fn checksum(frame: &RawFrame) -> u8 {
    let sum = frame[1..8]
        .iter()
        .fold(0u8, |acc, byte| acc.wrapping_add(*byte));
    0xFFu8.wrapping_sub(sum).wrapping_add(1)
}

pub fn verify_checksum(frame: &RawFrame) -> bool {
    checksum(frame) == frame[8]
}

/// Builds an outbound frame with the checksum filled in.
pub fn command_frame(opcode: Opcode, args: [u8; 5]) -> RawFrame {
    let mut frame = [
        START_BYTE,
        SENSOR_ADDRESS,
        opcode as u8,
        args[0],
        args[1],
        args[2],
        args[3],
        args[4],
        0x00,
    ];
    frame[8] = checksum(&frame);
    frame
}

pub fn read_command() -> RawFrame {
    command_frame(Opcode::ReadCo2, [0; 5])
}

/// Frame for a configuration write. Camera settings have no MH-Z19 encoding.
pub fn setting_frame(setting: &DeviceSetting) -> Result<RawFrame, DriverError> {
    let frame = match setting {
        DeviceSetting::DetectionRange(range) => {
            let [high, low] = range.ppm().to_be_bytes();
            command_frame(Opcode::DetectionRange, [high, low, 0, 0, 0])
        }
        DeviceSetting::Abc(enabled) => {
            let mode = if *enabled { 0xA0 } else { 0x00 };
            command_frame(Opcode::AbcLogic, [mode, 0, 0, 0, 0])
        }
        DeviceSetting::CalibrateZero => command_frame(Opcode::CalibrateZero, [0; 5]),
        DeviceSetting::CalibrateSpan(ppm) => {
            let [high, low] = ppm.to_be_bytes();
            command_frame(Opcode::CalibrateSpan, [high, low, 0, 0, 0])
        }
        other => return Err(DriverError::Unsupported(other.name().to_string())),
    };
    Ok(frame)
}

/// Validates and decodes a response to [`read_command`].
pub fn decode_read_response(frame: &RawFrame) -> Result<Measurement, ProtocolFault> {
    if frame[0] != START_BYTE || frame[1] != Opcode::ReadCo2 as u8 {
        return Err(ProtocolFault::BadHeader {
            first: frame[0],
            second: frame[1],
        });
    }
    let expected = checksum(frame);
    if expected != frame[8] {
        return Err(ProtocolFault::ChecksumMismatch {
            expected,
            actual: frame[8],
        });
    }
    Ok(Measurement {
        co2_ppm: u16::from_be_bytes([frame[2], frame[3]]),
        temperature_c: i16::from(frame[4] as i8) - TEMPERATURE_OFFSET,
        status: frame[5],
    })
}

/// Encodes a read response the way the sensor would send it.
pub fn encode_read_response(measurement: &Measurement) -> RawFrame {
    let [high, low] = measurement.co2_ppm.to_be_bytes();
    // Byte 4 is a two's complement value
    let raw_temperature = (measurement.temperature_c + TEMPERATURE_OFFSET).clamp(-128, 127) as i8 as u8;
    let mut frame = [
        START_BYTE,
        Opcode::ReadCo2 as u8,
        high,
        low,
        raw_temperature,
        measurement.status,
        0x00,
        0x00,
        0x00,
    ];
    frame[8] = checksum(&frame);
    frame
}
