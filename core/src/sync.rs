use crate::config::ModemConfig;
use crate::error::Result;
use crate::stage::{Stage, Work};
use num_complex::{Complex32, Complex64};
use std::f64::consts::PI;

/// Corrected samples that must be seen before the power/SNR estimate is taken
pub const SNR_MIN_SAMPLES: usize = 256;

/// Per-burst synchronization results, reported for observability only
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BurstEstimate {
    /// Carrier frequency offset in Hz
    pub cfo_hz: f64,
    /// Samples skipped to reach the first symbol boundary
    pub sto: usize,
    /// Mean power of the first corrected samples
    pub mean_power: Option<f64>,
    /// `(mean_power - noise) / noise` in dB, when a noise estimate is configured
    pub snr_db: Option<f64>,
}

/// Scratch state of the burst being corrected
#[derive(Debug, Clone)]
struct BurstState {
    estimate: BurstEstimate,
    /// Time of the next sample to correct, in seconds from the start of the header window
    t0: f64,
    rem_samples: usize,
    power_sum: f64,
    power_count: usize,
}

#[derive(Debug, Clone)]
enum SyncState {
    AwaitingHeader,
    Correcting(BurstState),
    /// Dropping what is left of the guard symbol after the corrected burst
    Trailing { guard: usize },
}

/// Carrier and symbol-timing synchronization, once per detected burst.
///
/// On the first `header_len * 8 * osr` samples of a burst the CFO is estimated
/// with the Moose estimator and the STO from the symbol-transition pattern of
/// the derotated header. The burst is then derotated continuously (phase kept
/// across calls) and forwarded, `(packet_len + 1) * 8 * osr` samples in all.
pub struct SynchronizationEstimator {
    sample_rate: f64,
    osr: usize,
    header_samples: usize,
    corrected_len: usize,
    noise_power: Option<f64>,
    state: SyncState,
    last_estimate: Option<BurstEstimate>,
    bursts: u64,
}

impl SynchronizationEstimator {
    pub fn new(config: &ModemConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            sample_rate: config.sample_rate as f64,
            osr: config.osr(),
            header_samples: config.header_samples(),
            corrected_len: (config.packet_len() + 1) * 8 * config.osr(),
            noise_power: config.noise_power,
            state: SyncState::AwaitingHeader,
            last_estimate: None,
            bursts: 0,
        })
    }

    pub fn last_estimate(&self) -> Option<&BurstEstimate> {
        self.last_estimate.as_ref()
    }

    pub fn bursts_synchronized(&self) -> u64 {
        self.bursts
    }

    /// True while a burst is being corrected or its guard drained
    pub fn in_burst(&self) -> bool {
        !matches!(self.state, SyncState::AwaitingHeader)
    }

    fn acquire(&mut self, input: &[Complex32]) -> (SyncState, Work) {
        if input.len() < self.header_samples {
            return (SyncState::AwaitingHeader, Work::default());
        }

        let header = &input[..self.header_samples];
        let cfo_hz = estimate_cfo(header, self.sample_rate);
        let mut derotated = vec![Complex32::default(); header.len()];
        derotate(header, cfo_hz, self.sample_rate, 0.0, &mut derotated);
        let sto = estimate_sto(&derotated, self.osr);

        self.bursts += 1;
        log::info!(
            "Burst {}: CFO {:.2} Hz, STO {} samples",
            self.bursts,
            cfo_hz,
            sto
        );

        let estimate = BurstEstimate {
            cfo_hz,
            sto,
            ..Default::default()
        };
        self.last_estimate = Some(estimate);

        let burst = BurstState {
            estimate,
            t0: sto as f64 / self.sample_rate,
            rem_samples: self.corrected_len,
            power_sum: 0.0,
            power_count: 0,
        };
        (SyncState::Correcting(burst), Work::new(sto, 0))
    }

    fn correct(
        &mut self,
        mut burst: BurstState,
        input: &[Complex32],
        output: &mut [Complex32],
    ) -> (SyncState, Work) {
        let n = burst.rem_samples.min(input.len()).min(output.len());
        if n == 0 {
            return (SyncState::Correcting(burst), Work::default());
        }

        derotate(
            &input[..n],
            burst.estimate.cfo_hz,
            self.sample_rate,
            burst.t0,
            &mut output[..n],
        );
        burst.t0 += n as f64 / self.sample_rate;
        burst.rem_samples -= n;

        if burst.estimate.mean_power.is_none() {
            burst.power_sum += output[..n].iter().map(|s| s.norm_sqr() as f64).sum::<f64>();
            burst.power_count += n;
            if burst.power_count >= SNR_MIN_SAMPLES {
                let mean_power = burst.power_sum / burst.power_count as f64;
                burst.estimate.mean_power = Some(mean_power);
                burst.estimate.snr_db = self.noise_power.map(|noise| snr_db(mean_power, noise));
                if let Some(snr) = burst.estimate.snr_db {
                    log::info!(
                        "Burst {}: mean power {:.4}, SNR {:.1} dB",
                        self.bursts,
                        mean_power,
                        snr
                    );
                }
                self.last_estimate = Some(burst.estimate);
            }
        }

        let next = if burst.rem_samples == 0 {
            SyncState::Trailing {
                guard: self.osr - burst.estimate.sto,
            }
        } else {
            SyncState::Correcting(burst)
        };
        (next, Work::new(n, n))
    }
}

impl Stage for SynchronizationEstimator {
    type Input = Complex32;
    type Output = Complex32;

    const NAME: &'static str = "synchronization estimator";

    fn required_input(&self, noutput: usize) -> usize {
        match &self.state {
            SyncState::AwaitingHeader => self.header_samples,
            SyncState::Correcting(burst) => burst.rem_samples.min(noutput),
            SyncState::Trailing { .. } => 1,
        }
    }

    fn work(&mut self, input: &[Complex32], output: &mut [Complex32]) -> Work {
        let mut consumed = 0;
        let mut produced = 0;

        loop {
            let state = std::mem::replace(&mut self.state, SyncState::AwaitingHeader);
            let before = std::mem::discriminant(&state);
            let (next, step) = match state {
                SyncState::AwaitingHeader => self.acquire(&input[consumed..]),
                SyncState::Correcting(burst) => {
                    self.correct(burst, &input[consumed..], &mut output[produced..])
                }
                SyncState::Trailing { guard } => {
                    let n = guard.min(input.len() - consumed);
                    if n == guard {
                        (SyncState::AwaitingHeader, Work::new(n, 0))
                    } else {
                        (SyncState::Trailing { guard: guard - n }, Work::new(n, 0))
                    }
                }
            };
            let changed = before != std::mem::discriminant(&next);
            self.state = next;
            consumed += step.consumed;
            produced += step.produced;

            if step.is_idle() && !changed {
                break;
            }
        }

        Work::new(consumed, produced)
    }
}

fn widen(s: Complex32) -> Complex64 {
    Complex64::new(s.re as f64, s.im as f64)
}

/// Moose CFO estimate in Hz from a window made of two repeated halves.
///
/// Unambiguous for `|cfo| < sample_rate / (2 * half)`.
pub fn estimate_cfo(window: &[Complex32], sample_rate: f64) -> f64 {
    let half = window.len() / 2;
    if half == 0 {
        return 0.0;
    }
    let (first, second) = (&window[..half], &window[half..2 * half]);
    let r: Complex64 = first
        .iter()
        .zip(second.iter())
        .map(|(a, b)| widen(*b) * widen(*a).conj())
        .sum::<Complex64>()
        / half as f64;
    r.arg() / (2.0 * PI * half as f64) * sample_rate
}

/// Remove a carrier offset; `t0` is the time of `input[0]` in seconds.
pub fn derotate(
    input: &[Complex32],
    cfo_hz: f64,
    sample_rate: f64,
    t0: f64,
    output: &mut [Complex32],
) {
    for (i, (s, out)) in input.iter().zip(output.iter_mut()).enumerate() {
        let t = t0 + i as f64 / sample_rate;
        let y = widen(*s) * Complex64::from_polar(1.0, -2.0 * PI * cfo_hz * t);
        *out = Complex32::new(y.re as f32, y.im as f32);
    }
}

/// Remove 2π jumps between consecutive phase samples
pub fn unwrap_phase(phase: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(phase.len());
    let mut correction = 0.0;
    for (i, &p) in phase.iter().enumerate() {
        if i > 0 {
            let delta = p - phase[i - 1];
            if delta.abs() > PI {
                let wrapped = (delta + PI).rem_euclid(2.0 * PI) - PI;
                correction += wrapped - delta;
            }
        }
        out.push(p + correction);
    }
    out
}

/// Symbol timing offset in `0..osr` from a CFO-corrected header.
///
/// The instantaneous frequency (first phase difference) changes only at symbol
/// boundaries, so the absolute change of frequency between samples `n - 1` and
/// `n` is summed per sub-symbol position `n mod osr`; the strongest position
/// marks where symbols start.
///
/// Ties go to the smallest offset, so a header with no visible transitions
/// reports 0.
pub fn estimate_sto(header: &[Complex32], osr: usize) -> usize {
    if osr < 2 || header.len() < 3 {
        return 0;
    }

    let phase: Vec<f64> = header.iter().map(|s| (s.im as f64).atan2(s.re as f64)).collect();
    let unwrapped = unwrap_phase(&phase);
    let freq: Vec<f64> = unwrapped.windows(2).map(|w| w[1] - w[0]).collect();

    let mut scores = vec![0.0f64; osr];
    for n in 1..freq.len() {
        scores[n % osr] += (freq[n] - freq[n - 1]).abs();
    }

    let mut best = 0;
    for (offset, &score) in scores.iter().enumerate() {
        if score > scores[best] {
            best = offset;
        }
    }
    best
}

fn snr_db(mean_power: f64, noise_power: f64) -> f64 {
    let ratio = (mean_power - noise_power) / noise_power;
    if ratio > 0.0 {
        10.0 * ratio.log10()
    } else {
        f64::NEG_INFINITY
    }
}
