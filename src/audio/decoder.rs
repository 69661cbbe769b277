use std::fs::File;
use std::io::Cursor;

use symphonia::core::audio::{SampleBuffer, SignalSpec};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::SampleFormat;

use crate::audio::{PlayableStream, SampleEncoding, StreamFormat};
use crate::error::AudioError;
use crate::logging::OperationTimer;
use crate::source::LocalResource;

/// Decode a whole resource into memory
pub fn decode(resource: &LocalResource) -> Result<PlayableStream, AudioError> {
    let timer = OperationTimer::new(format!("decode {}", resource));

    let source: Box<dyn MediaSource> = match resource {
        LocalResource::File { path } => {
            let file = File::open(path).map_err(|e| {
                AudioError::DecodeFailed(format!("Failed to open {}: {}", path.display(), e))
            })?;
            Box::new(file)
        }
        LocalResource::Memory { bytes, .. } => Box::new(Cursor::new(bytes.clone())),
    };

    let media_source = MediaSourceStream::new(source, Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = resource.extension_hint() {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, media_source, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| AudioError::FormatUnsupported {
            format: format!("unrecognised container ({})", e),
        })?;

    let mut format_reader = probed.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AudioError::FormatUnsupported {
            format: "no audio track".to_string(),
        })?;

    let track_id = track.id;
    let params = track.codec_params.clone();

    let mut decoder = symphonia::default::get_codecs()
        .make(&params, &DecoderOptions::default())
        .map_err(|e| AudioError::FormatUnsupported {
            format: format!("no decoder for codec ({})", e),
        })?;

    let mut samples: Vec<f32> = Vec::new();
    let mut decoded_spec: Option<SignalSpec> = None;
    let mut sample_buf: Option<(u64, SampleBuffer<f32>)> = None;

    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(AudioError::DecodeFailed(format!("Failed to read packet: {}", e))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let frames = decoded.capacity() as u64;
                let needs_new = sample_buf
                    .as_ref()
                    .map(|(capacity, _)| *capacity < frames || decoded_spec != Some(spec))
                    .unwrap_or(true);
                if needs_new {
                    sample_buf = Some((frames, SampleBuffer::<f32>::new(frames, spec)));
                }
                if let Some((_, buf)) = sample_buf.as_mut() {
                    buf.copy_interleaved_ref(decoded);
                    samples.extend_from_slice(buf.samples());
                }
                decoded_spec = Some(spec);
            }
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("Skipping corrupt packet: {}", e);
            }
            Err(e) => return Err(AudioError::DecodeFailed(format!("Decoder error: {}", e))),
        }
    }

    let sample_rate = params.sample_rate.or(decoded_spec.map(|s| s.rate));
    let channels = params
        .channels
        .or(decoded_spec.map(|s| s.channels))
        .map(|c| c.count() as u16);

    let (sample_rate, channels) = match (sample_rate, channels) {
        (Some(rate), Some(ch)) if rate > 0 && ch > 0 => (rate, ch),
        _ => {
            return Err(AudioError::FormatUnsupported {
                format: "stream has no sample rate or channel layout".to_string(),
            })
        }
    };

    if samples.is_empty() {
        return Err(AudioError::DecodeFailed("stream contains no audio frames".to_string()));
    }

    let (encoding, bits_per_sample) = source_encoding(params.sample_format, params.bits_per_sample);
    let format = StreamFormat {
        encoding,
        sample_rate,
        bits_per_sample,
        channels,
        big_endian: false,
    };

    let stream = PlayableStream::new(format, samples);
    let took = timer.finish();
    log::debug!(
        "Decoded {} frames ({}) in {}ms",
        stream.frames(),
        stream.format,
        took.as_millis()
    );
    Ok(stream)
}

/// Decode on the blocking pool
pub async fn decode_blocking(resource: LocalResource) -> Result<PlayableStream, AudioError> {
    tokio::task::spawn_blocking(move || decode(&resource))
        .await
        .map_err(|e| AudioError::DecodeFailed(format!("decoder task failed: {}", e)))?
}

/// Map the container's declared sample type onto a line encoding.
///
/// Compressed codecs declare nothing and decode to float.
fn source_encoding(sample_format: Option<SampleFormat>, bits: Option<u32>) -> (SampleEncoding, u16) {
    match sample_format {
        Some(SampleFormat::U8) => (SampleEncoding::PcmUnsigned, 8),
        Some(SampleFormat::U16) => (SampleEncoding::PcmUnsigned, 16),
        Some(SampleFormat::U24) => (SampleEncoding::PcmUnsigned, 24),
        Some(SampleFormat::U32) => (SampleEncoding::PcmUnsigned, 32),
        Some(SampleFormat::S8) => (SampleEncoding::PcmSigned, 8),
        Some(SampleFormat::S16) => (SampleEncoding::PcmSigned, 16),
        Some(SampleFormat::S24) => (SampleEncoding::PcmSigned, 24),
        Some(SampleFormat::S32) => (SampleEncoding::PcmSigned, 32),
        Some(SampleFormat::F32) => (SampleEncoding::PcmFloat, 32),
        Some(SampleFormat::F64) => (SampleEncoding::PcmFloat, 64),
        None => match bits {
            Some(bits) => (SampleEncoding::PcmSigned, bits as u16),
            None => (SampleEncoding::PcmFloat, 32),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::write_wav;
    use crate::error::ErrorKind;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_decode_wav_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tone.wav");
        write_wav(&path, 44_100, 2, 4_410);

        let stream = decode(&LocalResource::File { path }).unwrap();
        assert_eq!(stream.format, StreamFormat::baseline());
        assert_eq!(stream.frames(), 4_410);
    }

    #[test]
    fn test_decode_mono_wav_reports_source_format() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("mono.wav");
        write_wav(&path, 22_050, 1, 2_205);

        let stream = decode(&LocalResource::File { path }).unwrap();
        assert_eq!(stream.format.sample_rate, 22_050);
        assert_eq!(stream.format.channels, 1);
        assert_eq!(stream.format.encoding, SampleEncoding::PcmSigned);
        assert_eq!(stream.frames(), 2_205);
    }

    #[test]
    fn test_decode_from_memory() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tone.wav");
        write_wav(&path, 44_100, 2, 1_000);
        let bytes: Arc<[u8]> = std::fs::read(&path).unwrap().into();

        let stream = decode(&LocalResource::Memory {
            bytes,
            extension_hint: Some("wav".to_string()),
        })
        .unwrap();
        assert_eq!(stream.frames(), 1_000);
    }

    #[test]
    fn test_missing_file_is_decode_failure() {
        let err = decode(&LocalResource::File {
            path: PathBuf::from("/definitely/missing.wav"),
        })
        .unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::DecodeFailed));
    }

    #[test]
    fn test_garbage_is_format_unsupported() {
        let err = decode(&LocalResource::Memory {
            bytes: Arc::from(&b"this is not audio at all"[..]),
            extension_hint: None,
        })
        .unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::FormatUnsupported));
    }

    #[test]
    fn test_source_encoding_mapping() {
        assert_eq!(source_encoding(Some(SampleFormat::U8), None), (SampleEncoding::PcmUnsigned, 8));
        assert_eq!(source_encoding(None, Some(24)), (SampleEncoding::PcmSigned, 24));
        assert_eq!(source_encoding(None, None), (SampleEncoding::PcmFloat, 32));
    }

    #[tokio::test]
    async fn test_decode_blocking() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tone.wav");
        write_wav(&path, 48_000, 2, 480);

        let stream = decode_blocking(LocalResource::File { path }).await.unwrap();
        assert_eq!(stream.format.sample_rate, 48_000);
    }
}
