use std::sync::Arc;

// Sample buffer with metadata
#[derive(Clone, Debug)]
pub struct SoundBuffer {
  /// Interleaved frames.
  pub data: Vec<f32>,
  pub channels: usize,
  pub sample_rate: u32,
}

impl SoundBuffer {
  pub fn new(data: Vec<f32>, channels: usize, sample_rate: u32) -> Self {
    let channels = channels.max(1);
    let mut data = data;
    data.truncate(data.len() - data.len() % channels);
    Self { data, channels, sample_rate }
  }

  pub fn frames(&self) -> usize { self.data.len() / self.channels }
  pub fn is_empty(&self) -> bool { self.data.is_empty() }
}

/// One playing one-shot. The cursor counts frames and only moves forward.
#[derive(Clone, Debug)]
pub struct Voice {
  buffer: Arc<SoundBuffer>,
  cursor: usize,
  gain: f32,
}

impl Voice {
  pub fn new(buffer: Arc<SoundBuffer>, gain: f32) -> Self { Self { buffer, cursor: 0, gain } }

  pub fn cursor(&self) -> usize { self.cursor }
  pub fn gain(&self) -> f32 { self.gain }
  pub fn is_exhausted(&self) -> bool { self.cursor >= self.buffer.frames() }

  /// Adds up to `frames` frames into `out` scaled by `gain * master`.
  /// Missing frames contribute nothing (zero padding). Returns the frames
  /// actually consumed.
  pub fn mix_into(&mut self, out: &mut [f32], frames: usize, master: f32) -> usize {
    let ch = self.buffer.channels;
    let remaining = self.buffer.frames().saturating_sub(self.cursor);
    let n = remaining.min(frames).min(out.len() / ch);
    let g = self.gain * master;
    let start = self.cursor * ch;
    let src = &self.buffer.data[start..start + n * ch];
    for (o, s) in out[..n * ch].iter_mut().zip(src) { *o += s * g; }
    self.cursor += n;
    n
  }
}

/// Active voices. Only the mixer callback that owns it ever mutates it.
#[derive(Default)]
pub struct VoiceRegistry {
  voices: Vec<Voice>,
}

impl VoiceRegistry {
  pub fn with_capacity(n: usize) -> Self { Self { voices: Vec::with_capacity(n) } }

  pub fn push(&mut self, v: Voice) { self.voices.push(v); }
  pub fn clear(&mut self) { self.voices.clear(); }
  pub fn len(&self) -> usize { self.voices.len() }
  pub fn is_empty(&self) -> bool { self.voices.is_empty() }
  pub fn iter(&self) -> impl Iterator<Item = &Voice> { self.voices.iter() }

  /// Sums every voice into `out` and drops the ones that reached their end.
  pub fn mix(&mut self, out: &mut [f32], frames: usize, master: f32) {
    for v in self.voices.iter_mut() { v.mix_into(out, frames, master); }
    self.voices.retain(|v| !v.is_exhausted());
  }
}
