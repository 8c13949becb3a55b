use crate::config::ModemConfig;
use crate::error::{ModemError, Result};
use crate::framing::FrameEncoder;
use crate::fsk::FskModulator;
use num_complex::Complex32;

/// Silent detector blocks placed before, between and after frames
pub const DEFAULT_GAP_BLOCKS: usize = 4;

/// Reference transmitter producing a complex baseband stream the receiver can
/// decode.
///
/// Every frame is padded with silence to exactly `burst_len` samples and
/// separated by whole detector blocks, so each frame starts on the detector's
/// block grid.
pub struct Transmitter {
    config: ModemConfig,
    modulator: FskModulator,
    gap_blocks: usize,
}

impl Transmitter {
    pub fn new(config: &ModemConfig) -> Result<Self> {
        Ok(Self {
            modulator: FskModulator::new(config)?,
            config: config.clone(),
            gap_blocks: DEFAULT_GAP_BLOCKS,
        })
    }

    pub fn with_gap_blocks(mut self, gap_blocks: usize) -> Self {
        self.gap_blocks = gap_blocks;
        self
    }

    pub fn config(&self) -> &ModemConfig {
        &self.config
    }

    /// Sync word, payload and CRC as bytes
    pub fn frame(&self, payload: &[u8]) -> Result<Vec<u8>> {
        FrameEncoder::encode(&self.config, payload)
    }

    /// One frame, modulated from phase zero and padded with silence to `burst_len`
    pub fn modulate_frame(&mut self, payload: &[u8]) -> Result<Vec<Complex32>> {
        let frame = self.frame(payload)?;
        self.modulator.reset();
        let mut samples = self.modulator.modulate(&frame);
        samples.resize(self.config.burst_len(), Complex32::default());
        Ok(samples)
    }

    /// Gap, then each frame followed by a gap
    pub fn transmit<P: AsRef<[u8]>>(&mut self, payloads: &[P]) -> Result<Vec<Complex32>> {
        let gap = vec![Complex32::default(); self.gap_blocks * self.config.block_len()];
        let mut samples = gap.clone();
        for payload in payloads {
            samples.extend(self.modulate_frame(payload.as_ref())?);
            samples.extend_from_slice(&gap);
        }
        log::debug!(
            "Transmitted {} frame(s) in {} samples",
            payloads.len(),
            samples.len()
        );
        Ok(samples)
    }

    /// Split arbitrary data into payload-sized frames, zero-padding the last one.
    pub fn encode_data(&mut self, data: &[u8]) -> Result<Vec<Complex32>> {
        if data.is_empty() {
            return Err(ModemError::InvalidInputSize);
        }
        let payloads: Vec<Vec<u8>> = data
            .chunks(self.config.payload_len)
            .map(|chunk| {
                let mut payload = chunk.to_vec();
                payload.resize(self.config.payload_len, 0);
                payload
            })
            .collect();
        self.transmit(&payloads)
    }
}
