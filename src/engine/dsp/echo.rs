/// Feedback echo over a two second ring. The ring stores `x + echo * decay`
/// and the output is `x + echo`, clipped to unity.
pub struct Echo {
  buf: Vec<f32>,
  wr: usize,
  delay: usize,
  decay: f32,
  sr: f32,
}

impl Echo {
  pub fn new(sr: f32) -> Self {
    let len = ((2.0 * sr).round() as usize).max(64);
    let mut e = Self { buf: vec![0.0; len], wr: 0, delay: 1, decay: 0.5, sr };
    e.set_delay_ms(300.0);
    e
  }

  pub fn set_delay_ms(&mut self, ms: f32) {
    let d = (ms.max(0.0) / 1000.0 * self.sr).round() as usize;
    self.delay = d.clamp(1, self.buf.len() - 1);
  }
  pub fn set_decay(&mut self, d: f32) { self.decay = d.clamp(0.0, 0.99); }

  pub fn process(&mut self, block: &mut [f32]) {
    let len = self.buf.len();
    for s in block.iter_mut() {
      let x = *s;
      let echo = self.buf[(self.wr + len - self.delay) % len];
      self.buf[self.wr] = x + echo * self.decay;
      self.wr += 1; if self.wr >= len { self.wr = 0; }
      *s = (x + echo).clamp(-1.0, 1.0);
    }
  }
}
