use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::audio::{AudioBackend, AudioLine, PlayableStream, StopCallback, StreamFormat};
use crate::error::AudioError;

/// Write a short 16-bit sine WAV fixture
pub fn write_wav(path: &Path, sample_rate: u32, channels: u16, frames: usize) {
    std::fs::write(path, wav_bytes(sample_rate, channels, frames)).unwrap();
}

/// The same fixture as [`write_wav`], kept in memory
pub fn wav_bytes(sample_rate: u32, channels: u16, frames: usize) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut bytes = Vec::new();
    let mut writer = hound::WavWriter::new(std::io::Cursor::new(&mut bytes), spec).unwrap();
    for n in 0..frames {
        let t = n as f32 / sample_rate as f32;
        let sample = ((2.0 * std::f32::consts::PI * 440.0 * t).sin() * 8_000.0) as i16;
        for _ in 0..channels {
            writer.write_sample(sample).unwrap();
        }
    }
    writer.finalize().unwrap();
    bytes
}

/// Observable state of a line opened by [`ScriptedBackend`]
pub struct LineProbe {
    pub format: StreamFormat,
    pub frames: usize,
    running: AtomicBool,
    closed: AtomicBool,
    starts: AtomicUsize,
    rewinds: AtomicUsize,
    position: AtomicU64,
    gain_db: Mutex<Option<f32>>,
    on_stop: StopCallback,
}

impl LineProbe {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn rewinds(&self) -> usize {
        self.rewinds.load(Ordering::SeqCst)
    }

    pub fn gain_db(&self) -> Option<f32> {
        *self.gain_db.lock().unwrap()
    }

    /// Simulate the clip playing to its last frame
    pub fn finish(&self) -> bool {
        if self.running.swap(false, Ordering::SeqCst) {
            self.position.store(self.frames as u64, Ordering::SeqCst);
            (self.on_stop)();
            true
        } else {
            false
        }
    }
}

struct ScriptedLine {
    probe: Arc<LineProbe>,
}

impl AudioLine for ScriptedLine {
    fn start(&mut self) -> Result<(), AudioError> {
        if self.probe.is_closed() {
            return Err(AudioError::LineUnavailable {
                format: self.probe.format.to_string(),
                reason: "line closed".to_string(),
            });
        }
        self.probe.running.store(true, Ordering::SeqCst);
        self.probe.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) {
        if self.probe.running.swap(false, Ordering::SeqCst) {
            (self.probe.on_stop)();
        }
    }

    fn rewind(&mut self) {
        self.probe.rewinds.fetch_add(1, Ordering::SeqCst);
        self.probe.position.store(0, Ordering::SeqCst);
    }

    fn close(&mut self) {
        self.probe.running.store(false, Ordering::SeqCst);
        self.probe.closed.store(true, Ordering::SeqCst);
    }

    fn gain_range(&self) -> Option<(f32, f32)> {
        Some((-80.0, 6.0206))
    }

    fn set_gain(&mut self, db: f32) {
        *self.probe.gain_db.lock().unwrap() = Some(db);
    }

    fn position_frames(&self) -> u64 {
        self.probe.position.load(Ordering::SeqCst)
    }
}

/// In-memory audio backend whose lines are driven by the test
pub struct ScriptedBackend {
    accepted: Option<Vec<StreamFormat>>,
    conversion: bool,
    fail_open: AtomicBool,
    lines: Mutex<Vec<Arc<LineProbe>>>,
}

impl ScriptedBackend {
    /// Accepts every format
    pub fn new() -> Self {
        Self {
            accepted: None,
            conversion: true,
            fail_open: AtomicBool::new(false),
            lines: Mutex::new(Vec::new()),
        }
    }

    pub fn accepting_only(formats: Vec<StreamFormat>) -> Self {
        Self {
            accepted: Some(formats),
            ..Self::new()
        }
    }

    pub fn without_conversion(mut self) -> Self {
        self.conversion = false;
        self
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    pub fn lines(&self) -> Vec<Arc<LineProbe>> {
        self.lines.lock().unwrap().clone()
    }

    pub fn lines_opened(&self) -> usize {
        self.lines.lock().unwrap().len()
    }

    /// Most recently opened line that is still open
    pub fn current_line(&self) -> Option<Arc<LineProbe>> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|line| !line.is_closed())
            .cloned()
    }

    pub fn open_line_count(&self) -> usize {
        self.lines.lock().unwrap().iter().filter(|l| !l.is_closed()).count()
    }

    /// Play the current line to its end
    pub fn finish_current(&self) -> bool {
        self.current_line().map(|line| line.finish()).unwrap_or(false)
    }
}

impl AudioBackend for ScriptedBackend {
    fn is_line_supported(&self, format: &StreamFormat) -> bool {
        match &self.accepted {
            Some(formats) => formats.contains(format),
            None => true,
        }
    }

    fn is_conversion_supported(&self, target: &StreamFormat, _source: &StreamFormat) -> bool {
        self.conversion && self.is_line_supported(target)
    }

    fn open_line(&self, stream: PlayableStream, on_stop: StopCallback) -> Result<Box<dyn AudioLine>, AudioError> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(AudioError::LineUnavailable {
                format: stream.format.to_string(),
                reason: "scripted failure".to_string(),
            });
        }

        let probe = Arc::new(LineProbe {
            format: stream.format,
            frames: stream.frames(),
            running: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            starts: AtomicUsize::new(0),
            rewinds: AtomicUsize::new(0),
            position: AtomicU64::new(0),
            gain_db: Mutex::new(None),
            on_stop,
        });
        self.lines.lock().unwrap().push(probe.clone());
        Ok(Box::new(ScriptedLine { probe }))
    }
}
