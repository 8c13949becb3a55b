use crate::config::ModemConfig;
use crate::crc::Crc;
use crate::error::{ModemError, Result};
use crate::stage::{Stage, Work};

/// Expand bytes into one bit per element, most significant bit first
pub fn bytes_to_bits(bytes: &[u8]) -> Vec<u8> {
    bytes
        .iter()
        .flat_map(|&byte| (0..8).rev().map(move |i| (byte >> i) & 1))
        .collect()
}

/// Pack bits MSB first; a trailing partial byte is dropped
pub fn bits_to_bytes(bits: &[u8]) -> Vec<u8> {
    bits.chunks_exact(8)
        .map(|chunk| chunk.iter().fold(0u8, |byte, &bit| (byte << 1) | (bit & 1)))
        .collect()
}

/// Over-the-air frame: sync word, payload, CRC over the payload
pub struct FrameEncoder;

impl FrameEncoder {
    pub fn encode(config: &ModemConfig, payload: &[u8]) -> Result<Vec<u8>> {
        if payload.len() != config.payload_len {
            return Err(ModemError::InvalidInputSize);
        }
        let crc = Crc::new(config.crc.clone());

        let mut frame = Vec::with_capacity(config.packet_len());
        frame.extend_from_slice(&config.sync_word);
        frame.extend_from_slice(payload);
        frame.extend_from_slice(&crc.compute_bytes(payload));
        Ok(frame)
    }
}

/// A frame recovered by the parser.
///
/// Validity is decided once, when the packet is built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Packet {
    address: Vec<u8>,
    payload: Vec<u8>,
    crc: Vec<u8>,
    valid: bool,
}

impl Packet {
    fn new(address: Vec<u8>, payload: Vec<u8>, crc: Vec<u8>, checker: &Crc) -> Self {
        let valid = checker.verify(&payload, &crc);
        Self {
            address,
            payload,
            crc,
            valid,
        }
    }

    /// Header bits as received in front of the payload
    pub fn address(&self) -> &[u8] {
        &self.address
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn crc(&self) -> &[u8] {
        &self.crc
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}

/// Counters kept by the parser; observable only
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserStats {
    pub packets_seen: u64,
    pub packets_ok: u64,
    pub crc_failures: u64,
}

/// Aligns a demodulated burst on the sync word and checks the CRC.
///
/// Each window is `packet_len + 1` bytes. Its first `header_len * 8` bits are
/// cross-correlated (±1 mapped, all lags) against the sync word; the payload
/// starts right after the lag with the largest absolute correlation.
pub struct PacketParser {
    sync: Vec<i32>,
    payload_len: usize,
    crc_len: usize,
    window_len: usize,
    crc: Crc,
    stats: ParserStats,
}

impl PacketParser {
    pub fn new(config: &ModemConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            sync: config.sync_bits().iter().map(|&b| bipolar(b)).collect(),
            payload_len: config.payload_len,
            crc_len: config.crc_len,
            window_len: config.packet_len() + 1,
            crc: Crc::new(config.crc.clone()),
            stats: ParserStats::default(),
        })
    }

    pub fn window_len(&self) -> usize {
        self.window_len
    }

    pub fn stats(&self) -> ParserStats {
        self.stats
    }

    /// Bit index at which the payload starts within `bits`
    pub fn alignment(&self, bits: &[u8]) -> usize {
        let len = self.sync.len();
        let head: Vec<i32> = bits.iter().take(len).map(|&b| bipolar(b)).collect();
        let n = head.len();
        if n == 0 {
            return 0;
        }

        // Full cross-correlation: lag k pairs head[i] with sync[j] where i - j = k - (len - 1)
        let mut best_lag = 0;
        let mut best = i32::MIN;
        for k in 0..(n + len - 1) {
            let shift = k as isize - (len as isize - 1);
            let score: i32 = self
                .sync
                .iter()
                .enumerate()
                .filter_map(|(j, &s)| {
                    let i = j as isize + shift;
                    (0..n as isize).contains(&i).then(|| head[i as usize] * s)
                })
                .sum();
            if score.abs() > best {
                best = score.abs();
                best_lag = k;
            }
        }
        best_lag + 1
    }

    /// Parse one window, returning the packet only when its CRC checks out.
    pub fn parse(&mut self, window: &[u8]) -> Option<Packet> {
        self.stats.packets_seen += 1;

        let bits = bytes_to_bits(window);
        let offset = self.alignment(&bits);
        let body_bits = (self.payload_len + self.crc_len) * 8;
        if offset + body_bits > bits.len() {
            self.stats.crc_failures += 1;
            log::debug!(
                "Packet {}: sync at bit {} leaves no room for the body; dropped",
                self.stats.packets_seen,
                offset
            );
            return None;
        }

        let header_start = offset.saturating_sub(self.sync.len());
        let mut header_bits = vec![0u8; self.sync.len() - (offset - header_start)];
        header_bits.extend_from_slice(&bits[header_start..offset]);
        let address = bits_to_bytes(&header_bits);

        let body = bits_to_bytes(&bits[offset..offset + body_bits]);
        let (payload, crc) = body.split_at(self.payload_len);
        let packet = Packet::new(address, payload.to_vec(), crc.to_vec(), &self.crc);

        if packet.is_valid() {
            self.stats.packets_ok += 1;
            log::debug!("Packet {}: CRC ok", self.stats.packets_seen);
            Some(packet)
        } else {
            self.stats.crc_failures += 1;
            log::debug!(
                "Packet {}: CRC mismatch (received {:02X?}, computed {:02X?})",
                self.stats.packets_seen,
                packet.crc(),
                self.crc.compute_bytes(packet.payload())
            );
            None
        }
    }
}

fn bipolar(bit: u8) -> i32 {
    if bit != 0 {
        1
    } else {
        -1
    }
}

impl Stage for PacketParser {
    type Input = u8;
    type Output = Packet;

    const NAME: &'static str = "packet parser";

    fn required_input(&self, noutput: usize) -> usize {
        noutput * self.window_len
    }

    fn work(&mut self, input: &[u8], output: &mut [Packet]) -> Work {
        let mut consumed = 0;
        let mut produced = 0;
        while produced < output.len() && input.len() - consumed >= self.window_len {
            let window = &input[consumed..consumed + self.window_len];
            consumed += self.window_len;
            if let Some(packet) = self.parse(window) {
                output[produced] = packet;
                produced += 1;
            }
        }
        Work::new(consumed, produced)
    }
}
