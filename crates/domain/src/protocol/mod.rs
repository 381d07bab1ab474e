//! Device-level binary protocols
pub mod mhz19;
