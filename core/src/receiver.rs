use crate::config::ModemConfig;
use crate::detector::PreambleDetector;
use crate::error::{ModemError, Result};
use crate::framing::{Packet, PacketParser};
use crate::fsk::FskDemodulator;
use crate::source::SampleSource;
use crate::stage::{Stage, Work};
use crate::sync::{BurstEstimate, SynchronizationEstimator};
use num_complex::Complex32;

/// Output items requested from a sample stage per call
const SAMPLE_CHUNK: usize = 4096;
/// Output items requested from the byte and packet stages per call
const ITEM_CHUNK: usize = 64;
/// Samples pulled from a source per read
const READ_CHUNK: usize = 8192;

/// Counters collected across the whole chain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    pub bursts_detected: u64,
    pub bursts_synchronized: u64,
    pub packets_seen: u64,
    pub packets_ok: u64,
    pub crc_failures: u64,
}

/// Detector → synchronizer → demodulator → parser, driven synchronously.
///
/// The receiver owns every intermediate buffer. Each `push` runs the stages in
/// order, repeatedly, until none of them can make progress with the input
/// accumulated so far; anything left over waits for the next `push`.
pub struct Receiver {
    detector: PreambleDetector,
    sync: SynchronizationEstimator,
    demod: FskDemodulator,
    parser: PacketParser,
    raw: Vec<Complex32>,
    gated: Vec<Complex32>,
    synced: Vec<Complex32>,
    bytes: Vec<u8>,
}

impl Receiver {
    pub fn new(config: &ModemConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            detector: PreambleDetector::new(config)?,
            sync: SynchronizationEstimator::new(config)?,
            demod: FskDemodulator::new(config)?,
            parser: PacketParser::new(config)?,
            raw: Vec::new(),
            gated: Vec::new(),
            synced: Vec::new(),
            bytes: Vec::new(),
        })
    }

    /// Feed samples and collect every packet that could be completed.
    pub fn push(&mut self, samples: &[Complex32]) -> Result<Vec<Packet>> {
        self.raw.extend_from_slice(samples);

        let mut packets = Vec::new();
        loop {
            let mut progress = false;
            progress |= step(&mut self.detector, &mut self.raw, &mut self.gated, SAMPLE_CHUNK)?;
            progress |= step(&mut self.sync, &mut self.gated, &mut self.synced, SAMPLE_CHUNK)?;
            progress |= step(&mut self.demod, &mut self.synced, &mut self.bytes, ITEM_CHUNK)?;
            progress |= step(&mut self.parser, &mut self.bytes, &mut packets, ITEM_CHUNK)?;
            if !progress {
                break;
            }
        }
        Ok(packets)
    }

    /// Pull from `source` until it reports end of stream.
    ///
    /// A burst still in flight when the stream ends is abandoned.
    pub fn run<S: SampleSource + ?Sized>(&mut self, source: &mut S) -> Result<Vec<Packet>> {
        let mut buf = vec![Complex32::default(); READ_CHUNK];
        let mut packets = Vec::new();
        loop {
            let n = source.read(&mut buf)?;
            if n == 0 {
                break;
            }
            packets.extend(self.push(&buf[..n])?);
        }
        if self.detector.in_burst() || self.sync.in_burst() {
            log::debug!("End of stream inside a burst; partial burst abandoned");
        }
        Ok(packets)
    }

    pub fn stats(&self) -> ReceiverStats {
        let parser = self.parser.stats();
        ReceiverStats {
            bursts_detected: self.detector.bursts_detected(),
            bursts_synchronized: self.sync.bursts_synchronized(),
            packets_seen: parser.packets_seen,
            packets_ok: parser.packets_ok,
            crc_failures: parser.crc_failures,
        }
    }

    pub fn last_estimate(&self) -> Option<&BurstEstimate> {
        self.sync.last_estimate()
    }
}

/// Largest output request `n <= capacity` whose input requirement is met
fn max_output<S: Stage>(stage: &S, available: usize, capacity: usize) -> usize {
    if capacity == 0 || stage.required_input(1) > available {
        return 0;
    }
    let (mut lo, mut hi) = (1, capacity);
    while lo < hi {
        let mid = lo + (hi - lo + 1) / 2;
        if stage.required_input(mid) <= available {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    lo
}

/// Run one stage on its input buffer, moving its results to `output`.
fn step<S>(
    stage: &mut S,
    input: &mut Vec<S::Input>,
    output: &mut Vec<S::Output>,
    capacity: usize,
) -> Result<bool>
where
    S: Stage,
    S::Output: Clone + Default,
{
    let noutput = max_output(stage, input.len(), capacity);
    if noutput == 0 {
        return Ok(false);
    }

    let mut buf = vec![S::Output::default(); noutput];
    let work: Work = stage.work(input, &mut buf);
    if work.consumed > input.len() {
        return Err(ModemError::ConsumeOverrun {
            stage: S::NAME,
            consumed: work.consumed,
            available: input.len(),
        });
    }
    if work.produced > noutput {
        return Err(ModemError::ProduceOverrun {
            stage: S::NAME,
            produced: work.produced,
            capacity: noutput,
        });
    }

    input.drain(..work.consumed);
    buf.truncate(work.produced);
    output.extend(buf);
    Ok(!work.is_idle())
}
