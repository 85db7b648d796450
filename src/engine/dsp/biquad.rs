use std::f32::consts::PI;

// Butterworth section Qs
const Q_ORDER2: f32 = std::f32::consts::FRAC_1_SQRT_2;
const Q_ORDER4: [f32; 2] = [0.541_196_1, 1.306_563];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Response { LowPass, HighPass }

#[derive(Clone, Copy)]
pub struct Biquad {
  b0: f32, b1: f32, b2: f32, a1: f32, a2: f32,
  z1: f32, z2: f32,
}

impl Biquad {
  pub fn new(resp: Response, sr: f32, freq: f32, q: f32) -> Self {
    let mut b = Self { b0: 1.0, b1: 0.0, b2: 0.0, a1: 0.0, a2: 0.0, z1: 0.0, z2: 0.0 };
    b.set(resp, sr, freq, q);
    b
  }

  /// Recomputes coefficients; filter state is kept.
  pub fn set(&mut self, resp: Response, sr: f32, freq: f32, q: f32) {
    let f = (freq / sr).clamp(0.0005, 0.49);
    let w0 = 2.0 * PI * f;
    let cosw = w0.cos();
    let alpha = w0.sin() / (2.0 * q.max(0.1));
    let (b0, b1, b2) = match resp {
      Response::LowPass => ((1.0 - cosw) * 0.5, 1.0 - cosw, (1.0 - cosw) * 0.5),
      Response::HighPass => ((1.0 + cosw) * 0.5, -(1.0 + cosw), (1.0 + cosw) * 0.5),
    };
    let a0 = 1.0 + alpha;
    self.b0 = b0 / a0;
    self.b1 = b1 / a0;
    self.b2 = b2 / a0;
    self.a1 = -2.0 * cosw / a0;
    self.a2 = (1.0 - alpha) / a0;
  }

  #[inline]
  pub fn tick(&mut self, x: f32) -> f32 {
    let y = self.b0 * x + self.z1;
    self.z1 = self.b1 * x - self.a1 * y + self.z2;
    self.z2 = self.b2 * x - self.a2 * y;
    y
  }
}

/// Up to four second-order sections run in series. Built once, never grows.
pub struct Cascade {
  stages: [Biquad; 4],
  len: usize,
  sr: f32,
  cutoff: f32,
}

impl Cascade {
  /// Fourth-order Butterworth high-pass.
  pub fn highpass(sr: f32, cutoff: f32) -> Self {
    let hp = Q_ORDER4.map(|q| Biquad::new(Response::HighPass, sr, cutoff, q));
    Self::from_sections(&hp, sr, cutoff)
  }

  /// Band-pass as a Butterworth high-pass at `lo` followed by a low-pass at
  /// `hi`, each of order 2 or 4.
  pub fn bandpass(sr: f32, lo: f32, hi: f32, order4: bool) -> Self {
    let mut sections = Vec::with_capacity(4);
    let qs: &[f32] = if order4 { &Q_ORDER4 } else { &[Q_ORDER2] };
    for &q in qs { sections.push(Biquad::new(Response::HighPass, sr, lo, q)); }
    for &q in qs { sections.push(Biquad::new(Response::LowPass, sr, hi, q)); }
    Self::from_sections(&sections, sr, lo)
  }

  fn from_sections(sections: &[Biquad], sr: f32, cutoff: f32) -> Self {
    let mut stages = [Biquad::new(Response::LowPass, sr, sr * 0.25, Q_ORDER2); 4];
    let len = sections.len().min(4);
    stages[..len].copy_from_slice(&sections[..len]);
    Self { stages, len, sr, cutoff }
  }

  /// Moves a high-pass cascade to a new cutoff without clearing its state.
  pub fn set_highpass_cutoff(&mut self, cutoff: f32) {
    if cutoff == self.cutoff { return; }
    self.cutoff = cutoff;
    for (st, &q) in self.stages.iter_mut().zip(Q_ORDER4.iter()) {
      st.set(Response::HighPass, self.sr, cutoff, q);
    }
  }

  #[inline]
  pub fn tick(&mut self, x: f32) -> f32 {
    self.stages[..self.len].iter_mut().fold(x, |acc, st| st.tick(acc))
  }

  pub fn process(&mut self, block: &mut [f32]) {
    for s in block.iter_mut() { *s = self.tick(*s); }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sine_rms(c: &mut Cascade, hz: f32) -> f32 {
    let sr = 48000.0;
    let mut acc = 0.0;
    let n = 48000;
    for i in 0..n {
      let y = c.tick((2.0 * PI * hz * i as f32 / sr).sin());
      // skip the settling tail
      if i >= n / 2 { acc += y * y; }
    }
    (acc / (n / 2) as f32).sqrt()
  }

  #[test]
  fn highpass_blocks_lows_and_passes_highs() {
    let low = sine_rms(&mut Cascade::highpass(48000.0, 1000.0), 100.0);
    let high = sine_rms(&mut Cascade::highpass(48000.0, 1000.0), 8000.0);
    assert!(low < 0.01, "100 Hz leaked: {low}");
    assert!((high - std::f32::consts::FRAC_1_SQRT_2).abs() < 0.02, "8 kHz rms {high}");
  }

  #[test]
  fn telephone_band_keeps_the_voice_band() {
    let mk = || Cascade::bandpass(48000.0, 300.0, 3400.0, true);
    assert!(sine_rms(&mut mk(), 1000.0) > 0.65);
    assert!(sine_rms(&mut mk(), 50.0) < 0.01);
    assert!(sine_rms(&mut mk(), 15000.0) < 0.01);
  }

  #[test]
  fn cutoff_change_keeps_running_without_blowup() {
    let mut c = Cascade::highpass(48000.0, 1000.0);
    for i in 0..4800 { c.tick((i as f32 * 0.3).sin()); }
    c.set_highpass_cutoff(200.0);
    for i in 0..4800 { assert!(c.tick((i as f32 * 0.3).sin()).is_finite()); }
  }
}
