pub struct Bitcrusher {
  bits: u8,      // 1..24
  factor: u32,   // 1..64
  hold: f32,
  cnt: u32,
}

impl Bitcrusher {
  pub fn new() -> Self {
    Self { bits: 8, factor: 6, hold: 0.0, cnt: 0 }
  }
  pub fn set_bits(&mut self, b: f32) { self.bits = (b.round() as i32).clamp(1, 24) as u8; }
  pub fn set_factor(&mut self, f: f32) {
    self.factor = (f.round() as i64).clamp(1, 64) as u32;
    if self.cnt >= self.factor { self.cnt = 0; }
  }

  #[inline]
  fn quantize(x: f32, bits: u8) -> f32 {
    let levels = (1u32 << (bits as u32)) as f32;
    (x * levels).round() / levels
  }

  /// Sample-and-hold at `factor`, quantized to `bits`. The hold value and the
  /// position inside the hold window carry over into the next block.
  pub fn process(&mut self, block: &mut [f32]) {
    let mut cnt = self.cnt;
    for s in block.iter_mut() {
      if cnt == 0 { self.hold = Self::quantize(*s, self.bits); }
      *s = self.hold;
      cnt += 1; if cnt >= self.factor { cnt = 0; }
    }
    self.cnt = cnt;
  }
}

impl Default for Bitcrusher {
  fn default() -> Self { Self::new() }
}
