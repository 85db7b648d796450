use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Granular delay: every `grain` samples a new read head is dropped roughly
/// one grain behind the write head (± `jitter` of a grain) and reads forward
/// for the whole grain.
pub struct GranularDelay {
  buf: Vec<f32>,
  wr: usize,
  rd: usize,
  pos: usize,
  grain: usize,
  jitter: f32,
  mix: f32,
  rng: SmallRng,
}

impl GranularDelay {
  pub fn new(sr: f32) -> Self { Self::with_rng(sr, SmallRng::from_entropy()) }

  pub fn with_seed(sr: f32, seed: u64) -> Self { Self::with_rng(sr, SmallRng::seed_from_u64(seed)) }

  fn with_rng(sr: f32, rng: SmallRng) -> Self {
    let len = ((2.0 * sr).round() as usize).max(1024);
    Self { buf: vec![0.0; len], wr: 0, rd: 0, pos: 0, grain: 800, jitter: 0.3, mix: 0.25, rng }
  }

  pub fn set_grain(&mut self, g: f32) {
    // longest grain plus full jitter must still land inside the buffer
    let max = self.buf.len() / 2 - 1;
    self.grain = (g.round().max(1.0) as usize).min(max);
    if self.pos >= self.grain { self.pos = 0; }
  }
  pub fn set_jitter(&mut self, j: f32) { self.jitter = j.clamp(0.0, 1.0); }
  pub fn set_mix(&mut self, m: f32) { self.mix = m.clamp(0.0, 1.0); }

  pub fn process(&mut self, block: &mut [f32]) {
    let len = self.buf.len();
    for s in block.iter_mut() {
      let dry = *s;
      self.buf[self.wr] = dry;
      self.wr += 1; if self.wr >= len { self.wr = 0; }

      if self.pos == 0 {
        let spread = (self.grain as f32 * self.jitter) as i64;
        let offset = self.grain as i64 + self.rng.gen_range(-spread..=spread);
        let offset = offset.clamp(1, len as i64 - 1) as usize;
        self.rd = (self.wr + len - offset) % len;
      }

      let wet = self.buf[self.rd];
      self.rd += 1; if self.rd >= len { self.rd = 0; }

      self.pos += 1; if self.pos >= self.grain { self.pos = 0; }
      *s = dry * (1.0 - self.mix) + wet * self.mix;
    }
  }
}
