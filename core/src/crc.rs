use crate::config::CrcParams;

/// Bitwise CRC for widths up to 32 bits.
///
/// With the default parameters this is CRC-8 (poly 0x07, init 0xFF, no
/// reflection, no final XOR). The generator `x^8 + x^2 + x + 1` contains the
/// factor `x + 1`, so every odd-weight error and every burst of at most 8 bits
/// is caught. Error patterns that are multiples of the generator go unnoticed,
/// e.g. XOR-ing `01 07` into the last two payload bytes leaves the checksum
/// unchanged.
#[derive(Debug, Clone)]
pub struct Crc {
    params: CrcParams,
}

impl Crc {
    pub fn new(params: CrcParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &CrcParams {
        &self.params
    }

    pub fn checksum(&self, data: &[u8]) -> u32 {
        let width = self.params.width as u32;
        let mask = self.params.mask() as u64;
        let top = 1u64 << (width - 1);
        let poly = self.params.poly as u64;

        let mut reg = self.params.init as u64 & mask;
        for &byte in data {
            let byte = if self.params.reflect_in {
                byte.reverse_bits()
            } else {
                byte
            };
            for i in (0..8).rev() {
                let bit = (byte >> i) & 1 == 1;
                let msb = reg & top != 0;
                reg = (reg << 1) & mask;
                if msb != bit {
                    reg ^= poly;
                }
            }
        }

        let mut crc = reg as u32;
        if self.params.reflect_out {
            crc = crc.reverse_bits() >> (32 - width);
        }
        crc ^ self.params.xor_out
    }

    /// Checksum serialized big-endian in `ceil(width / 8)` bytes
    pub fn to_bytes(&self, crc: u32) -> Vec<u8> {
        let len = self.params.byte_len();
        (0..len)
            .rev()
            .map(|i| (crc >> (8 * i)) as u8)
            .collect()
    }

    pub fn compute_bytes(&self, data: &[u8]) -> Vec<u8> {
        self.to_bytes(self.checksum(data))
    }

    /// Byte-for-byte comparison of the received CRC field against the payload
    pub fn verify(&self, data: &[u8], received: &[u8]) -> bool {
        self.compute_bytes(data) == received
    }
}

impl Default for Crc {
    fn default() -> Self {
        Self::new(CrcParams::default())
    }
}
