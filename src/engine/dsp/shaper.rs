//! Memoryless shapers.

/// Hard clip at `threshold` after `gain`, renormalised so the clip level
/// maps to full scale.
pub struct Distortion { gain: f32, threshold: f32 }

impl Distortion {
  pub fn new() -> Self { Self { gain: 5.0, threshold: 0.5 } }
  pub fn set_gain(&mut self, g: f32) { self.gain = g.max(0.0); }
  pub fn set_threshold(&mut self, t: f32) { self.threshold = t.clamp(0.01, 1.0); }

  pub fn process(&mut self, block: &mut [f32]) {
    let t = self.threshold;
    for s in block.iter_mut() { *s = (*s * self.gain).clamp(-t, t) / t; }
  }
}

impl Default for Distortion {
  fn default() -> Self { Self::new() }
}

pub struct Overdrive { drive: f32 }

impl Overdrive {
  pub fn new() -> Self { Self { drive: 2.0 } }
  pub fn set_drive(&mut self, d: f32) { self.drive = d.max(0.0); }
  pub fn process(&mut self, block: &mut [f32]) {
    for s in block.iter_mut() { *s = (*s * self.drive).tanh(); }
  }
}

impl Default for Overdrive {
  fn default() -> Self { Self::new() }
}

/// Plain gain stage, clipped to unity.
pub struct Gain { gain: f32 }

impl Gain {
  pub fn new() -> Self { Self { gain: 1.0 } }
  pub fn set_gain(&mut self, g: f32) { self.gain = g; }
  pub fn process(&mut self, block: &mut [f32]) {
    for s in block.iter_mut() { *s = (*s * self.gain).clamp(-1.0, 1.0); }
  }
}

impl Default for Gain {
  fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn distortion_clips_and_renormalises() {
    let mut d = Distortion::new();
    let mut b = [0.05f32, 0.2, -0.5];
    d.process(&mut b);
    assert!((b[0] - 0.5).abs() < 1e-6);
    assert_eq!(b[1], 1.0);
    assert_eq!(b[2], -1.0);
  }

  #[test]
  fn overdrive_is_tanh_of_drive() {
    let mut o = Overdrive::new();
    let mut b = [0.3f32, -2.0];
    o.process(&mut b);
    assert_eq!(b[0], 0.6f32.tanh());
    assert_eq!(b[1], (-4.0f32).tanh());
  }

  #[test]
  fn gain_clips_at_unity() {
    let mut g = Gain::new();
    g.set_gain(3.0);
    let mut b = [0.1f32, 0.5, -0.9];
    g.process(&mut b);
    assert!((b[0] - 0.3).abs() < 1e-6);
    assert_eq!(&b[1..], &[1.0, -1.0]);
  }
}
