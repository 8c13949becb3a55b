use crate::config::ModemConfig;
use crate::error::Result;
use crate::framing::bytes_to_bits;
use crate::stage::{Stage, Work};
use num_complex::Complex32;
use std::f64::consts::PI;

// Binary FSK around the carrier:
// - bit 1 is sent at +frequency_deviation, bit 0 at -frequency_deviation
// - one bit per symbol, `osr` samples per symbol
// - the transmitter keeps its phase continuous across symbol boundaries
//
// With frequency_deviation = data_rate / 2 (modulation index 1) the two tones
// are orthogonal over one symbol and the phase advances by exactly ±π per bit.

/// Phase-continuous reference modulator
pub struct FskModulator {
    osr: usize,
    /// Phase increment per sample at +deviation, in radians
    step: f64,
    phase: f64,
}

impl FskModulator {
    pub fn new(config: &ModemConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            osr: config.osr(),
            step: 2.0 * PI * config.frequency_deviation / config.sample_rate as f64,
            phase: 0.0,
        })
    }

    /// Restart the carrier at phase zero
    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    /// Modulate one bit (0 or 1) per symbol
    pub fn modulate_bits(&mut self, bits: &[u8]) -> Vec<Complex32> {
        let mut samples = Vec::with_capacity(bits.len() * self.osr);
        for &bit in bits {
            let step = if bit != 0 { self.step } else { -self.step };
            for _ in 0..self.osr {
                samples.push(Complex32::new(self.phase.cos() as f32, self.phase.sin() as f32));
                self.phase = (self.phase + step) % (2.0 * PI);
            }
        }
        samples
    }

    /// Modulate bytes, most significant bit first
    pub fn modulate(&mut self, bytes: &[u8]) -> Vec<Complex32> {
        self.modulate_bits(&bytes_to_bits(bytes))
    }
}

/// Non-coherent binary FSK demodulator.
///
/// Each symbol window is correlated against one period of both reference
/// tones; the larger normalized magnitude wins, ties go to bit 0. Bits are
/// packed MSB first and only whole bytes are ever emitted.
pub struct FskDemodulator {
    osr: usize,
    tone_high: Vec<Complex32>,
    tone_low: Vec<Complex32>,
}

impl FskDemodulator {
    pub fn new(config: &ModemConfig) -> Result<Self> {
        config.validate()?;
        let osr = config.osr();
        let step = 2.0 * PI * config.frequency_deviation / config.sample_rate as f64;

        let tone_high: Vec<Complex32> = (0..osr)
            .map(|n| {
                let phase = step * n as f64;
                Complex32::new(phase.cos() as f32, phase.sin() as f32)
            })
            .collect();
        let tone_low = tone_high.iter().map(|t| t.conj()).collect();

        Ok(Self {
            osr,
            tone_high,
            tone_low,
        })
    }

    pub fn samples_per_byte(&self) -> usize {
        8 * self.osr
    }

    /// Decide one bit from exactly `osr` samples
    pub fn demodulate_symbol(&self, window: &[Complex32]) -> u8 {
        let high = self.correlate(window, &self.tone_high);
        let low = self.correlate(window, &self.tone_low);
        (high > low) as u8
    }

    /// Decide eight symbols from exactly `8 * osr` samples
    pub fn demodulate_byte(&self, samples: &[Complex32]) -> u8 {
        samples
            .chunks_exact(self.osr)
            .take(8)
            .fold(0u8, |byte, symbol| (byte << 1) | self.demodulate_symbol(symbol))
    }

    /// Demodulate every complete byte in `samples`; a trailing partial byte is ignored
    pub fn demodulate(&self, samples: &[Complex32]) -> Vec<u8> {
        samples
            .chunks_exact(self.samples_per_byte())
            .map(|chunk| self.demodulate_byte(chunk))
            .collect()
    }

    fn correlate(&self, window: &[Complex32], tone: &[Complex32]) -> f32 {
        let acc: Complex32 = window
            .iter()
            .zip(tone.iter())
            .map(|(s, t)| s * t.conj())
            .sum();
        acc.norm() / self.osr as f32
    }
}

impl Stage for FskDemodulator {
    type Input = Complex32;
    type Output = u8;

    const NAME: &'static str = "demodulator";

    fn required_input(&self, noutput: usize) -> usize {
        noutput * self.samples_per_byte()
    }

    fn work(&mut self, input: &[Complex32], output: &mut [u8]) -> Work {
        let per_byte = self.samples_per_byte();
        let nbytes = (input.len() / per_byte).min(output.len());
        for (slot, chunk) in output.iter_mut().zip(input.chunks_exact(per_byte)).take(nbytes) {
            *slot = self.demodulate_byte(chunk);
        }
        Work::new(nbytes * per_byte, nbytes)
    }
}
