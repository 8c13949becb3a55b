use crate::config::ModemConfig;
use crate::error::Result;
use crate::stage::{Stage, Work};
use num_complex::Complex32;

/// Energy-gated burst detector.
///
/// While scanning, the input is cut into blocks of `L` samples and the summed
/// magnitude of each block is compared with `threshold * L`. The first block
/// above threshold opens a passthrough window of `burst_len` samples starting
/// at `block_start + guard`; those samples are forwarded unchanged and no new
/// detection is considered until the window has been fully emitted.
pub struct PreambleDetector {
    block_len: usize,
    threshold: f32,
    guard: usize,
    burst_len: usize,
    /// Samples left to forward for the current burst; 0 while scanning
    remaining: usize,
    /// Absolute stream index of the next input sample
    position: u64,
    bursts: u64,
}

enum Scan {
    Detected(usize),
    Skipped(usize),
}

impl PreambleDetector {
    pub fn new(config: &ModemConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            block_len: config.block_len(),
            threshold: config.energy_threshold,
            guard: config.detector_guard,
            burst_len: config.burst_len(),
            remaining: 0,
            position: 0,
            bursts: 0,
        })
    }

    pub fn bursts_detected(&self) -> u64 {
        self.bursts
    }

    pub fn in_burst(&self) -> bool {
        self.remaining > 0
    }

    /// Find the first block above threshold in `window`.
    fn scan(&self, window: &[Complex32]) -> Scan {
        let limit = self.threshold * self.block_len as f32;
        for (i, block) in window.chunks_exact(self.block_len).enumerate() {
            let energy: f32 = block.iter().map(|s| s.norm()).sum();
            if energy > limit {
                let start = i * self.block_len + self.guard;
                if start < window.len() {
                    return Scan::Detected(start);
                }
                log::debug!(
                    "Detection at +{} falls outside the {}-sample window; dropped",
                    start,
                    window.len()
                );
                return Scan::Skipped((i + 1) * self.block_len);
            }
        }
        Scan::Skipped(window.len() / self.block_len * self.block_len)
    }
}

impl Stage for PreambleDetector {
    type Input = Complex32;
    type Output = Complex32;

    const NAME: &'static str = "preamble detector";

    fn required_input(&self, noutput: usize) -> usize {
        if self.remaining > 0 {
            self.remaining.min(noutput)
        } else {
            self.block_len
        }
    }

    fn work(&mut self, input: &[Complex32], output: &mut [Complex32]) -> Work {
        let mut consumed = 0;
        let mut produced = 0;

        loop {
            if self.remaining > 0 {
                let n = self
                    .remaining
                    .min(input.len() - consumed)
                    .min(output.len() - produced);
                if n == 0 {
                    break;
                }
                output[produced..produced + n].copy_from_slice(&input[consumed..consumed + n]);
                consumed += n;
                produced += n;
                self.remaining -= n;
                continue;
            }

            let window = &input[consumed..];
            if window.len() < self.block_len {
                break;
            }
            match self.scan(window) {
                Scan::Detected(offset) => {
                    consumed += offset;
                    self.remaining = self.burst_len;
                    self.bursts += 1;
                    log::debug!(
                        "Burst {} detected at sample {}",
                        self.bursts,
                        self.position + consumed as u64
                    );
                }
                Scan::Skipped(scanned) => {
                    consumed += scanned;
                    break;
                }
            }
        }

        self.position += consumed as u64;
        Work::new(consumed, produced)
    }
}
