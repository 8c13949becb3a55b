//! Burst-mode binary FSK receiver for short fixed-length packets
//!
//! The receive chain is a sequence of pull-based stages:
//! energy-gated preamble detection, per-burst CFO/STO estimation and correction,
//! non-coherent FSK demodulation, and sync-word alignment with CRC validation.
//! A phase-continuous reference transmitter produces matching test signals.

pub mod config;
pub mod crc;
pub mod detector;
pub mod encoder;
pub mod error;
pub mod framing;
pub mod fsk;
pub mod receiver;
pub mod source;
pub mod stage;
pub mod sync;

pub use config::{CrcParams, ModemConfig};
pub use crc::Crc;
pub use detector::PreambleDetector;
pub use encoder::Transmitter;
pub use error::{ModemError, Result};
pub use framing::{FrameEncoder, Packet, PacketParser, ParserStats};
pub use fsk::{FskDemodulator, FskModulator};
pub use num_complex::Complex32;
pub use receiver::{Receiver, ReceiverStats};
pub use source::{SampleSource, SliceSource};
pub use stage::{Stage, Work};
pub use sync::{BurstEstimate, SynchronizationEstimator};

// Link defaults
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;
pub const DEFAULT_DATA_RATE: u32 = 6_000; // 8 samples per symbol
pub const DEFAULT_FREQUENCY_DEVIATION: f64 = 3_000.0; // modulation index 1

// Packet layout
pub const DEFAULT_HEADER_LEN: usize = 8;
pub const DEFAULT_PAYLOAD_LEN: usize = 16;
/// Two identical halves, required by the Moose CFO estimator
pub const DEFAULT_SYNC_WORD: [u8; 8] = [0xAA, 0xAA, 0x2D, 0xD4, 0xAA, 0xAA, 0x2D, 0xD4];

// Detector
pub const DEFAULT_ENERGY_THRESHOLD: f32 = 0.5;
