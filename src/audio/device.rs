use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Host, SampleFormat, SampleRate, Stream, StreamConfig};

use crate::audio::{AudioBackend, AudioLine, PlayableStream, StopCallback, StreamFormat};
use crate::error::AudioError;

/// Gain control range exposed by cpal lines, matching a typical mixer master gain
const GAIN_RANGE_DB: (f32, f32) = (-80.0, 6.0206);

/// Select an output device by name, falling back to the host default
pub fn select_device(host: &Host, preferred: Option<&str>) -> Result<Device, AudioError> {
    if let Some(name) = preferred {
        let devices = host
            .output_devices()
            .map_err(|e| AudioError::InitializationFailed(format!("Failed to enumerate devices: {}", e)))?;

        for device in devices {
            if device.name().map(|n| n == name).unwrap_or(false) {
                return Ok(device);
            }
        }
        log::warn!("Audio device '{}' not found, falling back to default", name);
    }

    host.default_output_device().ok_or_else(|| match preferred {
        Some(name) => AudioError::DeviceNotFound {
            device: name.to_string(),
        },
        None => AudioError::InitializationFailed("No default output device available".to_string()),
    })
}

/// Names of every output device on the default host
pub fn list_output_devices() -> Result<Vec<String>, AudioError> {
    let host = cpal::default_host();
    let devices = host
        .output_devices()
        .map_err(|e| AudioError::InitializationFailed(format!("Failed to enumerate devices: {}", e)))?;
    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

#[derive(Debug, Clone, Copy)]
struct ConfigRange {
    channels: u16,
    min_rate: u32,
    max_rate: u32,
}

/// Audio output through cpal's default host
pub struct CpalBackend {
    device_name: String,
    ranges: Vec<ConfigRange>,
}

impl CpalBackend {
    pub fn new(preferred_device: Option<&str>) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = select_device(&host, preferred_device)?;

        let device_name = device
            .name()
            .map_err(|e| AudioError::InitializationFailed(format!("Failed to get device name: {}", e)))?;

        let ranges: Vec<ConfigRange> = device
            .supported_output_configs()
            .map_err(|e| {
                AudioError::InitializationFailed(format!("Failed to get supported configs for {}: {}", device_name, e))
            })?
            .map(|range| ConfigRange {
                channels: range.channels(),
                min_rate: range.min_sample_rate().0,
                max_rate: range.max_sample_rate().0,
            })
            .collect();

        log::info!("Audio output device: {} ({} config ranges)", device_name, ranges.len());
        Ok(Self { device_name, ranges })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

impl AudioBackend for CpalBackend {
    fn is_line_supported(&self, format: &StreamFormat) -> bool {
        if format.big_endian || !matches!(format.bits_per_sample, 8 | 16 | 24 | 32) {
            return false;
        }
        self.ranges.iter().any(|r| {
            r.channels == format.channels && (r.min_rate..=r.max_rate).contains(&format.sample_rate)
        })
    }

    fn is_conversion_supported(&self, target: &StreamFormat, source: &StreamFormat) -> bool {
        source.sample_rate > 0 && source.channels > 0 && self.is_line_supported(target)
    }

    fn open_line(&self, stream: PlayableStream, on_stop: StopCallback) -> Result<Box<dyn AudioLine>, AudioError> {
        ClipLine::open(&self.device_name, stream, on_stop).map(|line| Box::new(line) as Box<dyn AudioLine>)
    }
}

/// Playback state shared between a [`ClipLine`] and its output callback
struct ClipState {
    samples: Arc<[f32]>,
    channels: usize,
    cursor: AtomicUsize,
    running: AtomicBool,
    finished: AtomicBool,
    gain: AtomicU32,
}

impl ClipState {
    fn new(samples: Arc<[f32]>, channels: usize) -> Self {
        Self {
            samples,
            channels: channels.max(1),
            cursor: AtomicUsize::new(0),
            running: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            gain: AtomicU32::new(1.0f32.to_bits()),
        }
    }

    /// Fill one output buffer. Marks the clip finished when it runs out.
    fn render<T>(&self, data: &mut [T])
    where
        T: cpal::Sample + cpal::FromSample<f32>,
    {
        if !self.running.load(Ordering::Acquire) {
            for sample in data.iter_mut() {
                *sample = T::from_sample(0.0f32);
            }
            return;
        }

        let gain = f32::from_bits(self.gain.load(Ordering::Relaxed));
        let mut cursor = self.cursor.load(Ordering::Acquire);
        for sample in data.iter_mut() {
            let value = match self.samples.get(cursor) {
                Some(s) => {
                    cursor += 1;
                    s * gain
                }
                None => 0.0,
            };
            *sample = T::from_sample(value);
        }
        self.cursor.store(cursor, Ordering::Release);

        if cursor >= self.samples.len() && self.running.swap(false, Ordering::AcqRel) {
            self.finished.store(true, Ordering::Release);
        }
    }
}

fn decibels_to_linear(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

enum LineCommand {
    Close,
}

/// A clip loaded into a cpal output stream.
///
/// The stream lives on a dedicated `audio-output` thread, which also reports
/// natural completion through the stop callback.
pub struct ClipLine {
    format: StreamFormat,
    state: Arc<ClipState>,
    on_stop: StopCallback,
    commands: Option<Sender<LineCommand>>,
    thread: Option<JoinHandle<()>>,
}

impl ClipLine {
    fn open(device_name: &str, stream: PlayableStream, on_stop: StopCallback) -> Result<Self, AudioError> {
        let format = stream.format;
        let state = Arc::new(ClipState::new(stream.samples, format.channels as usize));

        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), AudioError>>(1);
        let (command_tx, command_rx) = mpsc::channel::<LineCommand>();

        let thread_state = Arc::clone(&state);
        let thread_on_stop = Arc::clone(&on_stop);
        let device_name = device_name.to_string();

        let handle = thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || {
                let stream = match Self::build_stream(&device_name, &format, &thread_state) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(AudioError::LineUnavailable {
                        format: format.to_string(),
                        reason: format!("failed to start stream: {}", e),
                    }));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                loop {
                    match command_rx.recv_timeout(Duration::from_millis(20)) {
                        Ok(LineCommand::Close) | Err(RecvTimeoutError::Disconnected) => break,
                        Err(RecvTimeoutError::Timeout) => {}
                    }
                    if thread_state.finished.swap(false, Ordering::AcqRel) {
                        thread_on_stop();
                    }
                }

                let _ = stream.pause();
            })
            .map_err(|e| AudioError::InitializationFailed(format!("Failed to create audio thread: {}", e)))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(e);
            }
            Err(_) => {
                let _ = handle.join();
                return Err(AudioError::LineUnavailable {
                    format: format.to_string(),
                    reason: "audio thread exited during setup".to_string(),
                });
            }
        }

        Ok(Self {
            format,
            state,
            on_stop,
            commands: Some(command_tx),
            thread: Some(handle),
        })
    }

    fn build_stream(device_name: &str, format: &StreamFormat, state: &Arc<ClipState>) -> Result<Stream, AudioError> {
        let host = cpal::default_host();
        let device = select_device(&host, Some(device_name))?;

        let default_config = device
            .default_output_config()
            .map_err(|e| AudioError::InitializationFailed(format!("Failed to get default config: {}", e)))?;

        let config = StreamConfig {
            channels: format.channels,
            sample_rate: SampleRate(format.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        match default_config.sample_format() {
            SampleFormat::F32 => Self::build_typed_stream::<f32>(&device, &config, format, state),
            SampleFormat::I16 => Self::build_typed_stream::<i16>(&device, &config, format, state),
            SampleFormat::U16 => Self::build_typed_stream::<u16>(&device, &config, format, state),
            sample_format => Err(AudioError::LineUnavailable {
                format: format.to_string(),
                reason: format!("unsupported device sample format {:?}", sample_format),
            }),
        }
    }

    fn build_typed_stream<T>(
        device: &Device,
        config: &StreamConfig,
        format: &StreamFormat,
        state: &Arc<ClipState>,
    ) -> Result<Stream, AudioError>
    where
        T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32> + Send + 'static,
    {
        let state = Arc::clone(state);
        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| state.render(data),
                move |err| log::error!("Audio stream error: {}", err),
                None,
            )
            .map_err(|e| AudioError::LineUnavailable {
                format: format.to_string(),
                reason: format!("failed to build output stream: {}", e),
            })
    }
}

impl AudioLine for ClipLine {
    fn start(&mut self) -> Result<(), AudioError> {
        if self.commands.is_none() {
            return Err(AudioError::LineUnavailable {
                format: self.format.to_string(),
                reason: "line closed".to_string(),
            });
        }
        self.state.running.store(true, Ordering::Release);
        Ok(())
    }

    fn stop(&mut self) {
        if self.state.running.swap(false, Ordering::AcqRel) {
            (self.on_stop)();
        }
    }

    fn rewind(&mut self) {
        self.state.finished.store(false, Ordering::Release);
        self.state.cursor.store(0, Ordering::Release);
    }

    fn close(&mut self) {
        self.state.running.store(false, Ordering::Release);
        if let Some(commands) = self.commands.take() {
            let _ = commands.send(LineCommand::Close);
        }
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                log::error!("Audio output thread panicked");
            }
        }
    }

    fn gain_range(&self) -> Option<(f32, f32)> {
        Some(GAIN_RANGE_DB)
    }

    fn set_gain(&mut self, db: f32) {
        let (min_db, max_db) = GAIN_RANGE_DB;
        let linear = decibels_to_linear(db.clamp(min_db, max_db));
        self.state.gain.store(linear.to_bits(), Ordering::Relaxed);
    }

    fn position_frames(&self) -> u64 {
        (self.state.cursor.load(Ordering::Acquire) / self.state.channels) as u64
    }
}

impl Drop for ClipLine {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SampleEncoding;

    fn backend_with(ranges: Vec<ConfigRange>) -> CpalBackend {
        CpalBackend {
            device_name: "Test Device".to_string(),
            ranges,
        }
    }

    fn stereo_range() -> ConfigRange {
        ConfigRange {
            channels: 2,
            min_rate: 8_000,
            max_rate: 48_000,
        }
    }

    #[test]
    fn test_line_support_follows_device_ranges() {
        let backend = backend_with(vec![stereo_range()]);

        assert!(backend.is_line_supported(&StreamFormat::baseline()));

        let mono = StreamFormat {
            channels: 1,
            ..StreamFormat::baseline()
        };
        assert!(!backend.is_line_supported(&mono));

        let high_rate = StreamFormat {
            sample_rate: 96_000,
            ..StreamFormat::baseline()
        };
        assert!(!backend.is_line_supported(&high_rate));
    }

    #[test]
    fn test_big_endian_and_odd_depths_rejected() {
        let backend = backend_with(vec![stereo_range()]);

        let big_endian = StreamFormat {
            big_endian: true,
            ..StreamFormat::baseline()
        };
        assert!(!backend.is_line_supported(&big_endian));

        let double = StreamFormat {
            encoding: SampleEncoding::PcmFloat,
            bits_per_sample: 64,
            ..StreamFormat::baseline()
        };
        assert!(!backend.is_line_supported(&double));
    }

    #[test]
    fn test_conversion_requires_supported_target() {
        let source = StreamFormat {
            channels: 1,
            sample_rate: 22_050,
            ..StreamFormat::baseline()
        };

        assert!(backend_with(vec![stereo_range()]).is_conversion_supported(&StreamFormat::baseline(), &source));
        assert!(!backend_with(vec![]).is_conversion_supported(&StreamFormat::baseline(), &source));
    }

    #[test]
    fn test_render_applies_gain_and_finishes() {
        let state = ClipState::new(Arc::from(vec![0.5f32, 0.5, 1.0, 1.0]), 2);
        state.running.store(true, Ordering::SeqCst);
        state.gain.store(0.5f32.to_bits(), Ordering::SeqCst);

        let mut out = [0.0f32; 6];
        state.render(&mut out);

        assert_eq!(out, [0.25, 0.25, 0.5, 0.5, 0.0, 0.0]);
        assert!(!state.running.load(Ordering::SeqCst));
        assert!(state.finished.load(Ordering::SeqCst));
    }

    #[test]
    fn test_render_outputs_silence_when_stopped() {
        let state = ClipState::new(Arc::from(vec![1.0f32; 8]), 2);

        let mut out = [9i16; 4];
        state.render(&mut out);

        assert_eq!(out, [0, 0, 0, 0]);
        assert_eq!(state.cursor.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_render_continues_across_buffers() {
        let state = ClipState::new(Arc::from(vec![0.25f32; 8]), 2);
        state.running.store(true, Ordering::SeqCst);

        let mut out = [0.0f32; 4];
        state.render(&mut out);
        assert_eq!(state.cursor.load(Ordering::SeqCst), 4);
        assert!(!state.finished.load(Ordering::SeqCst));

        state.render(&mut out);
        assert!(state.finished.load(Ordering::SeqCst));
    }

    #[test]
    fn test_decibels_to_linear() {
        assert!((decibels_to_linear(0.0) - 1.0).abs() < 1e-6);
        assert!((decibels_to_linear(6.0206) - 2.0).abs() < 1e-3);
        assert!(decibels_to_linear(-80.0) < 1e-3);
    }
}
