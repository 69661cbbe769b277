use std::sync::Arc;

use crate::audio::resampler::{map_channels, LinearResampler};
use crate::audio::{AudioBackend, PlayableStream, StreamFormat};

/// Picks the format a decoded stream is played in.
///
/// Streams the line accepts pass through untouched. Otherwise the stream is
/// converted to the baseline format when the backend reports that conversion
/// as supported. Failing both, the stream is returned as-is and opening the
/// line decides.
pub struct FormatNegotiator {
    backend: Arc<dyn AudioBackend>,
}

impl FormatNegotiator {
    pub fn new(backend: Arc<dyn AudioBackend>) -> Self {
        Self { backend }
    }

    pub fn negotiate(&self, stream: PlayableStream) -> PlayableStream {
        if self.backend.is_line_supported(&stream.format) {
            return stream;
        }

        let target = StreamFormat::baseline();
        if self.backend.is_conversion_supported(&target, &stream.format) {
            log::debug!("Converting {} to {}", stream.format, target);
            return Self::convert(&stream, target);
        }

        log::warn!("No conversion from {} available; trying it unchanged", stream.format);
        stream
    }

    fn convert(stream: &PlayableStream, target: StreamFormat) -> PlayableStream {
        let src_channels = stream.format.channels as usize;
        let dst_channels = target.channels as usize;

        let mapped = map_channels(&stream.samples, src_channels, dst_channels);
        let resampled = LinearResampler::resample_clip(
            stream.format.sample_rate,
            target.sample_rate,
            dst_channels,
            &mapped,
        );

        PlayableStream::new(target, resampled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::ScriptedBackend;
    use crate::audio::SampleEncoding;

    fn mono_22k(frames: usize) -> PlayableStream {
        let format = StreamFormat {
            encoding: SampleEncoding::PcmSigned,
            sample_rate: 22_050,
            bits_per_sample: 16,
            channels: 1,
            big_endian: false,
        };
        PlayableStream::new(format, vec![0.25f32; frames])
    }

    #[test]
    fn test_supported_stream_passes_through() {
        let backend = Arc::new(ScriptedBackend::new());
        let negotiator = FormatNegotiator::new(backend);

        let stream = mono_22k(100);
        let samples = stream.samples.clone();
        let negotiated = negotiator.negotiate(stream);

        assert_eq!(negotiated.format.sample_rate, 22_050);
        assert!(Arc::ptr_eq(&negotiated.samples, &samples));
    }

    #[test]
    fn test_unsupported_stream_converted_to_baseline() {
        let backend = Arc::new(ScriptedBackend::accepting_only(vec![StreamFormat::baseline()]));
        let negotiator = FormatNegotiator::new(backend);

        let negotiated = negotiator.negotiate(mono_22k(1_000));

        assert!(negotiated.format.is_baseline());
        assert!((negotiated.frames() as isize - 2_000).abs() <= 2);
        assert!(negotiated.samples.iter().all(|s| (*s - 0.25).abs() < 1e-6));
    }

    #[test]
    fn test_no_conversion_returns_original() {
        let backend = Arc::new(
            ScriptedBackend::accepting_only(vec![StreamFormat::baseline()]).without_conversion(),
        );
        let negotiator = FormatNegotiator::new(backend);

        let negotiated = negotiator.negotiate(mono_22k(100));
        assert_eq!(negotiated.format.channels, 1);
        assert_eq!(negotiated.frames(), 100);
    }
}
