use crate::error::CliError;
use fsklink_core::{Complex32, ModemError, SampleSource};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Write complex baseband as a stereo 16-bit WAV: left = I, right = Q
pub fn write_iq(path: &Path, samples: &[Complex32], sample_rate: u32) -> Result<(), CliError> {
    let spec = WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)?;
    for s in samples {
        writer.write_sample(to_i16(s.re))?;
        writer.write_sample(to_i16(s.im))?;
    }
    writer.finalize()?;
    Ok(())
}

fn to_i16(x: f32) -> i16 {
    (x.clamp(-1.0, 1.0) * 32767.0) as i16
}

/// Streams I/Q pairs out of a stereo WAV file, 16-bit integer or 32-bit float
pub struct WavSource {
    reader: WavReader<BufReader<File>>,
    format: SampleFormat,
}

impl WavSource {
    pub fn open(path: &Path, sample_rate: u32) -> Result<Self, CliError> {
        let reader = WavReader::open(path)?;
        let spec = reader.spec();
        log::info!(
            "Read WAV: {} Hz, {} channels, {} bits",
            spec.sample_rate,
            spec.channels,
            spec.bits_per_sample
        );

        if spec.channels != 2 {
            return Err(CliError::UnsupportedFormat(format!(
                "expected 2 channels (I, Q), found {}",
                spec.channels
            )));
        }
        if spec.sample_rate != sample_rate {
            return Err(CliError::UnsupportedFormat(format!(
                "sample rate {} Hz does not match the configured {} Hz",
                spec.sample_rate, sample_rate
            )));
        }
        match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Int, 16) | (SampleFormat::Float, 32) => {}
            (format, bits) => {
                return Err(CliError::UnsupportedFormat(format!(
                    "{bits}-bit {format:?} samples"
                )))
            }
        }

        Ok(Self {
            reader,
            format: spec.sample_format,
        })
    }

    /// I/Q pairs in the file
    pub fn sample_count(&self) -> usize {
        self.reader.len() as usize / 2
    }
}

impl SampleSource for WavSource {
    fn read(&mut self, buf: &mut [Complex32]) -> fsklink_core::Result<usize> {
        let mut n = 0;
        match self.format {
            SampleFormat::Int => {
                let mut samples = self.reader.samples::<i16>();
                while n < buf.len() {
                    match (samples.next(), samples.next()) {
                        (Some(i), Some(q)) => {
                            let (i, q) = (i.map_err(source_error)?, q.map_err(source_error)?);
                            buf[n] = Complex32::new(i as f32 / 32768.0, q as f32 / 32768.0);
                            n += 1;
                        }
                        _ => break,
                    }
                }
            }
            SampleFormat::Float => {
                let mut samples = self.reader.samples::<f32>();
                while n < buf.len() {
                    match (samples.next(), samples.next()) {
                        (Some(i), Some(q)) => {
                            let (i, q) = (i.map_err(source_error)?, q.map_err(source_error)?);
                            buf[n] = Complex32::new(i, q);
                            n += 1;
                        }
                        _ => break,
                    }
                }
            }
        }
        Ok(n)
    }
}

fn source_error(e: hound::Error) -> ModemError {
    ModemError::Source(e.to_string())
}
