/*!
Linear resampling and channel mapping for interleaved f32 clips.

Used by the format negotiator to bring decoded audio to the baseline line
format. The resampler keeps one frame of history so a clip can be fed in
chunks without clicks at the boundaries.
*/

#[derive(Debug, Clone)]
pub struct LinearResampler {
    src_rate: u32,
    dst_rate: u32,
    channels: usize,

    // source frames per output frame
    step: f64,

    // position relative to `prev_frame`
    pos: f64,
    prev_frame: Vec<f32>,
}

impl LinearResampler {
    pub fn new(src_rate: u32, dst_rate: u32, channels: usize) -> Self {
        let step = if dst_rate == 0 { 0.0 } else { src_rate as f64 / dst_rate as f64 };
        Self {
            src_rate,
            dst_rate,
            channels,
            step,
            pos: 0.0,
            prev_frame: Vec::new(),
        }
    }

    /// Resample one block, carrying phase into the next call
    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        if self.channels == 0 || self.dst_rate == 0 || self.src_rate == 0 {
            return Vec::new();
        }
        if self.src_rate == self.dst_rate {
            return input.to_vec();
        }

        let ch = self.channels;
        let in_frames = input.len() / ch;

        // [prev_frame, input...] so interpolation spans chunk boundaries
        let mut work = Vec::with_capacity((in_frames + 1) * ch);
        if self.prev_frame.len() == ch {
            work.extend_from_slice(&self.prev_frame);
        }
        work.extend_from_slice(&input[..in_frames * ch]);
        if work.is_empty() {
            return Vec::new();
        }

        let total_frames = work.len() / ch;
        let expected = ((in_frames as f64) * (self.dst_rate as f64 / self.src_rate as f64)).ceil() as usize + 4;
        let mut out = Vec::with_capacity(expected * ch);

        let last = (total_frames - 1) as f64;
        while self.pos < last {
            let i = self.pos.floor() as usize;
            let frac = (self.pos - i as f64) as f32;
            let base0 = i * ch;
            let base1 = (i + 1) * ch;

            out.extend((0..ch).map(|c| {
                let s0 = work[base0 + c];
                let s1 = work[base1 + c];
                s0 + (s1 - s0) * frac
            }));

            self.pos += self.step;
        }

        // The last frame becomes index 0 of the next block
        let last_base = (total_frames - 1) * ch;
        self.prev_frame.clear();
        self.prev_frame.extend_from_slice(&work[last_base..last_base + ch]);
        self.pos -= last;

        out
    }

    /// Resample a whole clip in one go
    pub fn resample_clip(src_rate: u32, dst_rate: u32, channels: usize, input: &[f32]) -> Vec<f32> {
        let mut resampler = Self::new(src_rate, dst_rate, channels);
        resampler.process(input)
    }
}

/// Map interleaved audio to `dst_channels`.
///
/// Mono is duplicated across every output channel; otherwise channels are
/// truncated or padded with silence.
pub fn map_channels(input: &[f32], src_channels: usize, dst_channels: usize) -> Vec<f32> {
    if src_channels == dst_channels || src_channels == 0 || dst_channels == 0 {
        return input.to_vec();
    }

    let frames = input.len() / src_channels;
    let mut out = Vec::with_capacity(frames * dst_channels);
    for frame in input.chunks_exact(src_channels) {
        if src_channels == 1 {
            out.extend(std::iter::repeat(frame[0]).take(dst_channels));
        } else if dst_channels == 1 {
            out.push(frame.iter().sum::<f32>() / src_channels as f32);
        } else {
            let keep = src_channels.min(dst_channels);
            out.extend_from_slice(&frame[..keep]);
            out.extend(std::iter::repeat(0.0).take(dst_channels - keep));
        }
    }
    out
}
