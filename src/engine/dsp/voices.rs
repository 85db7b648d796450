//! Fixed voice presets built from the other units.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::biquad::Cascade;
use super::bitcrusher::Bitcrusher;
use super::modulation::{Carrier, RingMod};
use super::pitch::GranularPitchShifter;

/// Gaussian sample via Box-Muller.
fn gaussian(rng: &mut SmallRng, sigma: f32) -> f32 {
  let u1: f32 = rng.gen_range(f32::EPSILON..1.0);
  let u2: f32 = rng.gen();
  sigma * (-2.0 * u1.ln()).sqrt() * (std::f32::consts::TAU * u2).cos()
}

fn decimation(sr: f32, target_hz: f32) -> f32 { (sr / target_hz).floor().max(1.0) }

/// Quiet breathy voice: `0.3 * x` plus a little Gaussian hiss.
pub struct Whisper {
  rng: SmallRng,
  level: f32,
}

impl Whisper {
  pub const LEVEL: f32 = 0.3;
  pub const NOISE: f32 = 0.002;

  pub fn new() -> Self { Self::with_rng(SmallRng::from_entropy()) }
  pub fn with_seed(seed: u64) -> Self { Self::with_rng(SmallRng::seed_from_u64(seed)) }
  fn with_rng(rng: SmallRng) -> Self { Self { rng, level: Self::LEVEL } }

  pub fn process(&mut self, block: &mut [f32]) {
    for s in block.iter_mut() { *s = *s * self.level + gaussian(&mut self.rng, Self::NOISE); }
  }
}

impl Default for Whisper {
  fn default() -> Self { Self::new() }
}

/// 6-bit sample-and-hold at 8 kHz.
pub fn lofi(sr: f32) -> Bitcrusher {
  let mut bc = Bitcrusher::new();
  bc.set_bits(6.0);
  bc.set_factor(decimation(sr, 8000.0));
  bc
}

/// Old screen-recorder microphone: noise gate, 150 Hz to 4 kHz band,
/// 8 kHz sample-and-hold, 128-level crush and a floor of hiss.
pub struct Hypercam {
  band: Cascade,
  crush: Bitcrusher,
  rng: SmallRng,
}

impl Hypercam {
  const GATE: f32 = 0.15;
  const NOISE: f32 = 1e-4;

  pub fn new(sr: f32) -> Self { Self::with_rng(sr, SmallRng::from_entropy()) }
  pub fn with_seed(sr: f32, seed: u64) -> Self { Self::with_rng(sr, SmallRng::seed_from_u64(seed)) }

  fn with_rng(sr: f32, rng: SmallRng) -> Self {
    let mut crush = Bitcrusher::new();
    crush.set_bits(7.0);
    crush.set_factor(decimation(sr, 8000.0));
    Self { band: Cascade::bandpass(sr, 150.0, 4000.0, true), crush, rng }
  }

  pub fn process(&mut self, block: &mut [f32]) {
    for s in block.iter_mut() {
      let gated = if s.abs() < Self::GATE { 0.0 } else { *s };
      *s = self.band.tick(gated);
    }
    self.crush.process(block);
    for s in block.iter_mut() { *s = (*s + gaussian(&mut self.rng, Self::NOISE)).clamp(-1.0, 1.0); }
  }
}

/// Pitched up by a factor of 1.2, then ring modulated by a 60 Hz sine.
pub struct Alien {
  pitch: GranularPitchShifter,
  ring: RingMod,
}

impl Alien {
  pub fn new(sr: f32) -> Self {
    let mut pitch = GranularPitchShifter::new(sr);
    pitch.set_semitones(12.0 * 1.2f32.log2());
    Self { pitch, ring: RingMod::new(sr, 60.0, Carrier::Sine) }
  }

  pub fn process(&mut self, block: &mut [f32]) {
    self.pitch.process(block);
    self.ring.process(block);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn whisper_scales_and_adds_small_noise() {
    let mut w = Whisper::with_seed(3);
    let mut b = vec![0.5f32; 4096];
    w.process(&mut b);
    let mean = b.iter().sum::<f32>() / b.len() as f32;
    assert!((mean - 0.15).abs() < 1e-3);
    assert!(b.iter().all(|s| (s - 0.15).abs() < 10.0 * Whisper::NOISE));
    assert!(b.iter().any(|&s| s != 0.15));
  }

  #[test]
  fn lofi_holds_for_eight_khz_windows() {
    let mut l = lofi(48000.0);
    let mut b: Vec<f32> = (0..12).map(|i| i as f32 * 0.01).collect();
    l.process(&mut b);
    assert!(b[..6].iter().all(|&s| s == 0.0));
    let q = (0.06f32 * 64.0).round() / 64.0;
    assert!(b[6..].iter().all(|&s| s == q));
  }

  #[test]
  fn hypercam_gates_quiet_input_down_to_hiss() {
    let mut h = Hypercam::with_seed(48000.0, 9);
    let mut b: Vec<f32> = (0..4800).map(|i| 0.1 * (i as f32 * 0.05).sin()).collect();
    h.process(&mut b);
    assert!(b.iter().all(|s| s.abs() < 1e-2));
  }

  #[test]
  fn alien_keeps_block_length_and_range() {
    let mut a = Alien::new(48000.0);
    let mut b: Vec<f32> = (0..3000).map(|i| 0.5 * (i as f32 * 0.03).sin()).collect();
    a.process(&mut b);
    assert_eq!(b.len(), 3000);
    assert!(b.iter().all(|s| s.is_finite() && s.abs() <= 1.0));
  }
}
