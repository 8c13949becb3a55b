use crate::error::{ModemError, Result};
use crate::framing::bytes_to_bits;
use crate::{
    DEFAULT_DATA_RATE, DEFAULT_ENERGY_THRESHOLD, DEFAULT_FREQUENCY_DEVIATION, DEFAULT_HEADER_LEN,
    DEFAULT_PAYLOAD_LEN, DEFAULT_SAMPLE_RATE, DEFAULT_SYNC_WORD,
};
use serde::{Deserialize, Serialize};

/// Upper bound on `header_len` and `payload_len`, in bytes
pub const MAX_FIELD_LEN: usize = 4096;
/// Upper bound on `detector_block_symbols`
pub const MAX_BLOCK_SYMBOLS: usize = 1024;

/// Parameters of a CRC in the usual width/poly/init/refin/refout/xorout form.
///
/// The polynomial is given without its implicit top bit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrcParams {
    pub width: u8,
    pub poly: u32,
    pub init: u32,
    pub reflect_in: bool,
    pub reflect_out: bool,
    pub xor_out: u32,
}

impl CrcParams {
    /// Number of bytes the checksum occupies on the wire
    pub fn byte_len(&self) -> usize {
        (self.width as usize + 7) / 8
    }

    pub(crate) fn mask(&self) -> u32 {
        if self.width >= 32 {
            u32::MAX
        } else {
            (1u32 << self.width) - 1
        }
    }
}

impl Default for CrcParams {
    fn default() -> Self {
        Self {
            width: 8,
            poly: 0x07,
            init: 0xFF,
            reflect_in: false,
            reflect_out: false,
            xor_out: 0x00,
        }
    }
}

/// Link configuration shared read-only by every stage of the receiver and by
/// the reference transmitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModemConfig {
    /// Complex sample rate in Hz
    pub sample_rate: u32,
    /// Symbol rate in baud (one bit per symbol)
    pub data_rate: u32,
    /// Tone offset from the carrier in Hz; bit 1 is `+deviation`, bit 0 is `-deviation`
    pub frequency_deviation: f64,
    pub header_len: usize,
    pub payload_len: usize,
    pub crc_len: usize,
    /// Address/sync pattern transmitted as the header, most significant bit first
    pub sync_word: Vec<u8>,
    /// Mean sample magnitude a detector block must exceed
    pub energy_threshold: f32,
    /// Detector block length in symbols
    pub detector_block_symbols: usize,
    /// Samples added to the start of the triggering block
    pub detector_guard: usize,
    /// Externally measured noise power, only used for the SNR diagnostic
    pub noise_power: Option<f64>,
    pub crc: CrcParams,
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            data_rate: DEFAULT_DATA_RATE,
            frequency_deviation: DEFAULT_FREQUENCY_DEVIATION,
            header_len: DEFAULT_HEADER_LEN,
            payload_len: DEFAULT_PAYLOAD_LEN,
            crc_len: 1,
            sync_word: DEFAULT_SYNC_WORD.to_vec(),
            energy_threshold: DEFAULT_ENERGY_THRESHOLD,
            detector_block_symbols: 8,
            detector_guard: 0,
            noise_power: None,
            crc: CrcParams::default(),
        }
    }
}

impl ModemConfig {
    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.data_rate == 0 || self.sample_rate == 0 {
            return Err(invalid("sample_rate and data_rate must be positive"));
        }
        if self.sample_rate % self.data_rate != 0 {
            return Err(invalid(format!(
                "sample_rate {} is not an integer multiple of data_rate {}",
                self.sample_rate, self.data_rate
            )));
        }
        if self.osr() < 2 {
            return Err(invalid("oversampling ratio must be at least 2"));
        }

        let nyquist = self.sample_rate as f64 / 2.0;
        if !self.frequency_deviation.is_finite()
            || self.frequency_deviation <= 0.0
            || self.frequency_deviation >= nyquist
        {
            return Err(invalid(format!(
                "frequency_deviation must lie in (0, {nyquist}) Hz"
            )));
        }

        if self.header_len == 0 || self.payload_len == 0 {
            return Err(invalid("header_len and payload_len must be positive"));
        }
        if self.header_len > MAX_FIELD_LEN || self.payload_len > MAX_FIELD_LEN {
            return Err(invalid(format!(
                "header_len and payload_len must not exceed {MAX_FIELD_LEN} bytes"
            )));
        }
        if self.sync_word.len() != self.header_len {
            return Err(invalid(format!(
                "sync_word has {} bits but header_len requires {}",
                self.sync_word.len() * 8,
                self.header_len * 8
            )));
        }

        let crc = &self.crc;
        if crc.width == 0 || crc.width > 32 {
            return Err(invalid("crc width must be between 1 and 32 bits"));
        }
        if self.crc_len != crc.byte_len() {
            return Err(invalid(format!(
                "crc_len {} does not match a {}-bit CRC",
                self.crc_len, crc.width
            )));
        }
        let mask = crc.mask();
        if crc.poly & !mask != 0 || crc.init & !mask != 0 || crc.xor_out & !mask != 0 {
            return Err(invalid("crc poly, init and xor_out must fit in the crc width"));
        }

        if !self.energy_threshold.is_finite() || self.energy_threshold < 0.0 {
            return Err(invalid("energy_threshold must be finite and non-negative"));
        }
        if self.detector_block_symbols == 0 || self.detector_block_symbols > MAX_BLOCK_SYMBOLS {
            return Err(invalid(format!(
                "detector_block_symbols must lie in 1..={MAX_BLOCK_SYMBOLS}"
            )));
        }
        let osr = self.osr();
        let burst_len = self
            .packet_len_checked()
            .and_then(|len| len.checked_add(1))
            .and_then(|len| len.checked_mul(8))
            .and_then(|bits| bits.checked_add(1))
            .and_then(|symbols| symbols.checked_mul(osr));
        if burst_len.is_none() || self.detector_block_symbols.checked_mul(osr).is_none() {
            return Err(invalid("packet and block sizes overflow the sample counters"));
        }
        if let Some(noise) = self.noise_power {
            if !noise.is_finite() || noise <= 0.0 {
                return Err(invalid("noise_power must be positive"));
            }
        }

        Ok(())
    }

    /// Samples per symbol
    pub fn osr(&self) -> usize {
        if self.data_rate == 0 {
            return 0;
        }
        (self.sample_rate / self.data_rate) as usize
    }

    /// Header + payload + CRC, in bytes
    pub fn packet_len(&self) -> usize {
        self.header_len + self.payload_len + self.crc_len
    }

    fn packet_len_checked(&self) -> Option<usize> {
        self.header_len
            .checked_add(self.payload_len)?
            .checked_add(self.crc_len)
    }

    /// Detector block length `L` in samples
    pub fn block_len(&self) -> usize {
        self.detector_block_symbols * self.osr()
    }

    /// Samples covered by the header, used for CFO/STO estimation
    pub fn header_samples(&self) -> usize {
        self.header_len * 8 * self.osr()
    }

    /// Samples the receiver extracts per burst: one slack byte plus one guard symbol
    pub fn burst_len(&self) -> usize {
        8 * self.osr() * (self.packet_len() + 1) + self.osr()
    }

    /// Samples of a modulated frame without slack or guard
    pub fn frame_samples(&self) -> usize {
        8 * self.osr() * self.packet_len()
    }

    pub fn sync_bits(&self) -> Vec<u8> {
        bytes_to_bits(&self.sync_word)
    }
}

fn invalid(msg: impl Into<String>) -> ModemError {
    ModemError::InvalidConfig(msg.into())
}
