//! Sample sources feeding the streaming logger.
//!
//! Hardware acquisition lives outside this crate. Whatever produces voltages
//! is adapted to the [`SampleSource`] capability:
//!
//! - [`FnSource`] wraps any closure (callable-fed logging)
//! - [`StreamSource`] pulls big-endian `u32` millivolt words from a byte
//!   stream such as a pipe (stream-fed logging)
//! - [`ScriptedSource`] replays a fixed list, for tests and dry runs
//! - [`AdcScale`] turns raw ADC counts into millivolts

use std::io::{ErrorKind, Read};

use crate::error::{BatconError, Result};

/// Capability: one synchronous voltage sample per call.
///
/// # Contract
/// - Returns the battery voltage in millivolts
/// - Returns `Err(BatconError::SampleSourceExhausted)` once no more samples
///   will ever arrive; the capture loop ends the test normally on it
/// - Any other error is a device failure
pub trait SampleSource {
    /// Take one sample, in millivolts.
    fn read_millivolts(&mut self) -> Result<u32>;
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn read_millivolts(&mut self) -> Result<u32> {
        (**self).read_millivolts()
    }
}

/// Adapts a zero-argument closure.
pub struct FnSource<F> {
    read: F,
}

impl<F> FnSource<F>
where
    F: FnMut() -> Result<u32>,
{
    /// Wrap `read`.
    pub fn new(read: F) -> Self {
        Self { read }
    }
}

impl<F> SampleSource for FnSource<F>
where
    F: FnMut() -> Result<u32>,
{
    fn read_millivolts(&mut self) -> Result<u32> {
        (self.read)()
    }
}

/// Width of one sample word on a stream.
pub const SAMPLE_WORD_LEN: usize = 4;

/// Reads one big-endian `u32` millivolt word per sample.
///
/// A clean end of stream between words is exhaustion. A stream that ends
/// inside a word is reported as truncated input.
pub struct StreamSource<R> {
    inner: R,
}

impl<R: Read> StreamSource<R> {
    /// Read samples from `inner`.
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Give back the underlying reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> SampleSource for StreamSource<R> {
    fn read_millivolts(&mut self) -> Result<u32> {
        let mut word = [0u8; SAMPLE_WORD_LEN];
        let mut filled = 0;
        while filled < SAMPLE_WORD_LEN {
            match self.inner.read(&mut word[filled..]) {
                Ok(0) if filled == 0 => return Err(BatconError::SampleSourceExhausted),
                Ok(0) => {
                    return Err(BatconError::TruncatedInput {
                        expected: SAMPLE_WORD_LEN,
                        actual: filled,
                    })
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(u32::from_be_bytes(word))
    }
}

/// Replays a fixed voltage list, then reports exhaustion.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    samples: Vec<u32>,
    index: usize,
}

impl ScriptedSource {
    /// Replay `samples` in order.
    pub fn new(samples: Vec<u32>) -> Self {
        Self {
            samples,
            index: 0,
        }
    }

    /// Samples not yet handed out.
    pub fn remaining(&self) -> usize {
        self.samples.len() - self.index
    }
}

impl SampleSource for ScriptedSource {
    fn read_millivolts(&mut self) -> Result<u32> {
        let sample = self
            .samples
            .get(self.index)
            .copied()
            .ok_or(BatconError::SampleSourceExhausted)?;
        self.index += 1;
        Ok(sample)
    }
}

/// Linear conversion from raw ADC counts to millivolts.
///
/// `ref_volts` is the reference voltage already compensated for any divider
/// in front of the converter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdcScale {
    /// Count reported at 0 V.
    pub digital_min: u32,
    /// Count reported at the reference voltage.
    pub digital_max: u32,
    /// Reference voltage after divider compensation.
    pub ref_volts: f64,
}

impl AdcScale {
    /// Scale for a 10-bit MCP3008-style converter.
    pub fn ten_bit(ref_volts: f64) -> Result<Self> {
        Self::new(0, 1023, ref_volts)
    }

    /// Validated scale; the count range must be non-empty.
    pub fn new(digital_min: u32, digital_max: u32, ref_volts: f64) -> Result<Self> {
        if digital_max <= digital_min {
            return Err(BatconError::Validation(format!(
                "ADC range {digital_min}..{digital_max} is empty"
            )));
        }
        if !ref_volts.is_finite() || ref_volts <= 0.0 {
            return Err(BatconError::Validation(format!(
                "ADC reference voltage must be positive, got {ref_volts}"
            )));
        }
        Ok(Self {
            digital_min,
            digital_max,
            ref_volts,
        })
    }

    /// Millivolts for a raw count, truncated. Counts below the range read as zero.
    pub fn millivolts(&self, raw: u32) -> u32 {
        let span = f64::from(self.digital_max - self.digital_min);
        let offset = f64::from(raw.saturating_sub(self.digital_min));
        let mv = (offset / span * self.ref_volts * 1000.0).trunc();
        if mv >= f64::from(u32::MAX) {
            u32::MAX
        } else {
            mv as u32
        }
    }

    /// Wrap a raw-count reader as a millivolt sample source.
    pub fn source<F>(self, mut read_raw: F) -> FnSource<impl FnMut() -> Result<u32>>
    where
        F: FnMut() -> Result<u32>,
    {
        FnSource::new(move || read_raw().map(|raw| self.millivolts(raw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_source_exhausts() {
        let mut source = ScriptedSource::new(vec![12_000, 11_500]);
        assert_eq!(source.read_millivolts().unwrap(), 12_000);
        assert_eq!(source.remaining(), 1);
        assert_eq!(source.read_millivolts().unwrap(), 11_500);
        assert!(matches!(
            source.read_millivolts(),
            Err(BatconError::SampleSourceExhausted)
        ));
    }

    #[test]
    fn test_stream_source_words() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&12_000u32.to_be_bytes());
        bytes.extend_from_slice(&11_950u32.to_be_bytes());
        let mut source = StreamSource::new(bytes.as_slice());
        assert_eq!(source.read_millivolts().unwrap(), 12_000);
        assert_eq!(source.read_millivolts().unwrap(), 11_950);
        assert!(source.read_millivolts().unwrap_err().is_recoverable());
    }

    #[test]
    fn test_stream_source_partial_word() {
        let bytes = [0u8, 0, 0x2E];
        let mut source = StreamSource::new(&bytes[..]);
        assert!(matches!(
            source.read_millivolts(),
            Err(BatconError::TruncatedInput {
                expected: 4,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_fn_source() {
        let mut volts = 12_100;
        let mut source = FnSource::new(move || {
            volts -= 100;
            Ok(volts)
        });
        assert_eq!(source.read_millivolts().unwrap(), 12_000);
        assert_eq!(source.read_millivolts().unwrap(), 11_900);
    }

    #[test]
    fn test_adc_scale() {
        let scale = AdcScale::ten_bit(13.2).unwrap();
        assert_eq!(scale.millivolts(100), 1290);
        assert_eq!(scale.millivolts(0), 0);
        assert_eq!(AdcScale::ten_bit(5.0).unwrap().millivolts(1023), 5000);

        let mut source = scale.source(|| Ok(512));
        assert_eq!(source.read_millivolts().unwrap(), 6606);
    }

    #[test]
    fn test_adc_scale_rejects_empty_range() {
        assert!(AdcScale::new(10, 10, 3.3).is_err());
        assert!(AdcScale::new(0, 1023, 0.0).is_err());
    }
}
