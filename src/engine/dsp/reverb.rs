/// Three-tap feedback delay "reverb" over a one second circular buffer.
pub struct FeedbackReverb {
  buf: Vec<f32>,
  wr: usize,
  wet: f32,
  feedback: f32,
  delays: [usize; 3],
}

impl FeedbackReverb {
  pub fn new(sr: f32) -> Self {
    let len = (sr.round() as usize).max(64);
    Self { buf: vec![0.0; len], wr: 0, wet: 0.12, feedback: 0.35, delays: [1200, 1700, 900] }
  }

  pub fn set_wet(&mut self, w: f32) { self.wet = w.clamp(0.0, 1.0); }
  pub fn set_feedback(&mut self, fb: f32) { self.feedback = fb; }
  pub fn set_delays(&mut self, d: [f32; 3]) {
    let max = self.buf.len() - 1;
    for (slot, v) in self.delays.iter_mut().zip(d) {
      *slot = (v.round().max(1.0) as usize).min(max);
    }
  }

  pub fn process(&mut self, block: &mut [f32]) {
    let len = self.buf.len();
    let dry_gain = 1.0 - self.wet;
    for s in block.iter_mut() {
      let dry = *s;
      // read taps BEFORE writing
      let mut acc = 0.0;
      for &d in &self.delays { acc += self.buf[(self.wr + len - d) % len]; }
      let tap_avg = acc / self.delays.len() as f32;
      self.buf[self.wr] = dry + tap_avg * self.feedback;
      *s = dry * dry_gain + tap_avg * self.wet;
      self.wr += 1; if self.wr >= len { self.wr = 0; }
    }
  }
}
