use crate::error::Result;
use num_complex::Complex32;

/// Pull interface to an external sample stream (radio capture, file replay).
pub trait SampleSource {
    /// Fill `buf` with up to `buf.len()` samples. Returns 0 at end of stream.
    fn read(&mut self, buf: &mut [Complex32]) -> Result<usize>;
}

/// Replays an in-memory capture
pub struct SliceSource<'a> {
    samples: &'a [Complex32],
    pos: usize,
}

impl<'a> SliceSource<'a> {
    pub fn new(samples: &'a [Complex32]) -> Self {
        Self { samples, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.samples.len() - self.pos
    }
}

impl SampleSource for SliceSource<'_> {
    fn read(&mut self, buf: &mut [Complex32]) -> Result<usize> {
        let n = buf.len().min(self.remaining());
        buf[..n].copy_from_slice(&self.samples[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}
