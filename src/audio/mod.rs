pub mod decoder;
pub mod device;
pub mod engine;
pub mod format;
pub mod resampler;

#[cfg(test)]
pub mod testing;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::AudioError;

pub use decoder::decode;
pub use device::CpalBackend;
pub use engine::{EngineEvent, PlaybackEngine};
pub use format::FormatNegotiator;
pub use resampler::LinearResampler;

/// Sample encoding of a stream as reported by its container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleEncoding {
    PcmSigned,
    PcmUnsigned,
    PcmFloat,
}

impl SampleEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            SampleEncoding::PcmSigned => "PCM_SIGNED",
            SampleEncoding::PcmUnsigned => "PCM_UNSIGNED",
            SampleEncoding::PcmFloat => "PCM_FLOAT",
        }
    }
}

/// Format description used for line capability checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub encoding: SampleEncoding,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub channels: u16,
    pub big_endian: bool,
}

impl StreamFormat {
    pub const BASELINE_SAMPLE_RATE: u32 = 44_100;

    /// Signed 16-bit stereo PCM at 44.1 kHz, little-endian
    pub fn baseline() -> Self {
        Self {
            encoding: SampleEncoding::PcmSigned,
            sample_rate: Self::BASELINE_SAMPLE_RATE,
            bits_per_sample: 16,
            channels: 2,
            big_endian: false,
        }
    }

    pub fn is_baseline(&self) -> bool {
        *self == Self::baseline()
    }
}

impl fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let channels = match self.channels {
            1 => "mono".to_string(),
            2 => "stereo".to_string(),
            n => format!("{} channels", n),
        };
        write!(
            f,
            "{} {} Hz, {} bit, {}, {}",
            self.encoding.as_str(),
            self.sample_rate,
            self.bits_per_sample,
            channels,
            if self.big_endian { "big-endian" } else { "little-endian" }
        )
    }
}

/// Fully decoded audio ready to hand to a line.
///
/// Samples are interleaved `f32`; `format` describes what they represent.
#[derive(Clone)]
pub struct PlayableStream {
    pub format: StreamFormat,
    pub samples: Arc<[f32]>,
}

impl PlayableStream {
    pub fn new(format: StreamFormat, samples: impl Into<Arc<[f32]>>) -> Self {
        Self {
            format,
            samples: samples.into(),
        }
    }

    pub fn frames(&self) -> usize {
        match self.format.channels {
            0 => 0,
            ch => self.samples.len() / ch as usize,
        }
    }

    pub fn duration(&self) -> Duration {
        if self.format.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.format.sample_rate as f64)
    }
}

impl fmt::Debug for PlayableStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayableStream")
            .field("format", &self.format)
            .field("frames", &self.frames())
            .finish()
    }
}

/// Invoked by a line whenever it stops, for whatever reason
pub type StopCallback = Arc<dyn Fn() + Send + Sync>;

/// The platform audio output
pub trait AudioBackend: Send + Sync {
    /// Can a line be opened for this format as-is
    fn is_line_supported(&self, format: &StreamFormat) -> bool;

    /// Can `source` be converted to `target`
    fn is_conversion_supported(&self, target: &StreamFormat, source: &StreamFormat) -> bool;

    /// Open a stopped line loaded with `stream`
    fn open_line(&self, stream: PlayableStream, on_stop: StopCallback) -> Result<Box<dyn AudioLine>, AudioError>;
}

/// One open output line holding a loaded clip
pub trait AudioLine: Send {
    /// Begin or continue from the current position
    fn start(&mut self) -> Result<(), AudioError>;

    /// Halt and keep the position. Fires the stop callback if it was running.
    fn stop(&mut self);

    /// Move back to frame zero
    fn rewind(&mut self);

    /// Release the line. No stop callback is fired.
    fn close(&mut self);

    /// Master gain range in dB, if the line has a gain control
    fn gain_range(&self) -> Option<(f32, f32)>;

    fn set_gain(&mut self, db: f32);

    fn position_frames(&self) -> u64;
}
