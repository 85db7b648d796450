use std::f32::consts::PI;

use super::formant::FormantShifter;

pub const GRAINS: usize = 4;
pub const MIN_GRAIN: usize = 32;
pub const MAX_GRAIN: usize = 8192;
const HPF_CUTOFF_HZ: f32 = 100.0;
// four Hann windows spaced a quarter apart sum to ~2
const OVERLAP_GAIN: f32 = 0.5;

/// One-pole high-pass, `y = a * (y' + x - x')`.
pub struct OnePoleHP { a: f32, x1: f32, y1: f32 }
impl OnePoleHP {
  pub fn new(sr: f32, cutoff: f32) -> Self {
    let rc = 1.0 / (2.0 * PI * cutoff);
    let dt = 1.0 / sr;
    Self { a: rc / (rc + dt), x1: 0.0, y1: 0.0 }
  }
  #[inline] pub fn tick(&mut self, x: f32) -> f32 { let y = self.a * (self.y1 + x - self.x1); self.x1 = x; self.y1 = y; y }
}

#[derive(Clone, Copy)]
struct Grain {
  read: f32,
  phase: usize,
}

/// Four-grain overlap-add pitch shifter reading a 2 s circular history.
/// Each grain restarts `grain` samples behind the write head whenever its
/// window completes, then reads forward at `ratio`.
pub struct GranularPitchShifter {
  buf: Vec<f32>,
  wr: usize,
  grains: [Grain; GRAINS],
  grain: usize,
  window: Vec<f32>,
  ratio: f32,
  hpf: OnePoleHP,
  formant: FormantShifter,
  formant_st: f32,
}

impl GranularPitchShifter {
  pub fn new(sr: f32) -> Self {
    let len = ((2.0 * sr).round() as usize).max(2 * MAX_GRAIN);
    let mut s = Self {
      buf: vec![0.0; len],
      wr: 0,
      grains: [Grain { read: 0.0, phase: 0 }; GRAINS],
      grain: 0,
      window: Vec::with_capacity(MAX_GRAIN),
      ratio: 1.0,
      hpf: OnePoleHP::new(sr, HPF_CUTOFF_HZ),
      formant: FormantShifter::new(),
      formant_st: 0.0,
    };
    s.set_grain(480.0);
    for (g, grain) in s.grains.iter_mut().enumerate() {
      grain.phase = g * s.grain / GRAINS;
    }
    s
  }

  pub fn set_semitones(&mut self, st: f32) { self.ratio = 2f32.powf(st / 12.0); }
  pub fn set_formant(&mut self, st: f32) { self.formant_st = st; }

  /// Rebuilds the window in place; capacity is reserved up front.
  pub fn set_grain(&mut self, g: f32) {
    let g = (g.round().max(0.0) as usize).clamp(MIN_GRAIN, MAX_GRAIN);
    if g == self.grain { return; }
    self.grain = g;
    self.window.clear();
    let denom = (g - 1) as f32;
    self.window.extend((0..g).map(|n| 0.5 - 0.5 * (2.0 * PI * n as f32 / denom).cos()));
  }

  pub fn process(&mut self, block: &mut [f32]) {
    let len = self.buf.len();
    let lenf = len as f32;
    let grain = self.grain;
    for s in block.iter_mut() {
      self.buf[self.wr] = self.hpf.tick(*s);
      self.wr += 1; if self.wr >= len { self.wr = 0; }

      let mut acc = 0.0;
      for g in self.grains.iter_mut() {
        if g.phase >= grain {
          g.phase = 0;
          g.read = ((self.wr + len - grain) % len) as f32;
        }
        let i0 = g.read as usize % len;
        let i1 = (i0 + 1) % len;
        let frac = g.read - g.read.floor();
        let v = self.buf[i0] * (1.0 - frac) + self.buf[i1] * frac;
        acc += v * self.window[g.phase];
        g.read += self.ratio;
        if g.read >= lenf { g.read -= lenf; }
        g.phase += 1;
      }
      *s = acc * OVERLAP_GAIN;
    }
    self.formant.set_semitones(self.formant_st);
    if self.formant.is_active() { self.formant.process(block); }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sine(n: usize, hz: f32) -> Vec<f32> {
    (0..n).map(|i| 0.5 * (2.0 * PI * hz * i as f32 / 48000.0).sin()).collect()
  }

  fn rms(x: &[f32]) -> f32 { (x.iter().map(|v| v * v).sum::<f32>() / x.len() as f32).sqrt() }

  #[test]
  fn unity_ratio_preserves_length_and_energy() {
    let mut ps = GranularPitchShifter::new(48000.0);
    ps.set_semitones(0.0);
    let input = sine(48000, 1000.0);
    let mut out = Vec::with_capacity(input.len());
    for chunk in input.chunks(1024) {
      let mut b = chunk.to_vec();
      ps.process(&mut b);
      assert_eq!(b.len(), chunk.len());
      out.extend_from_slice(&b);
    }
    // skip the first grains while every window re-aligns
    let settled = 4 * 480;
    let in_rms = rms(&input[settled..]);
    let out_rms = rms(&out[settled..]);
    assert!((out_rms / in_rms - 1.0).abs() < 0.1, "rms in {in_rms} out {out_rms}");
  }

  #[test]
  fn grain_phases_start_evenly_spaced() {
    let ps = GranularPitchShifter::new(48000.0);
    let phases: Vec<usize> = ps.grains.iter().map(|g| g.phase).collect();
    assert_eq!(phases, vec![0, 120, 240, 360]);
  }

  #[test]
  fn grain_length_is_clamped_and_window_resized() {
    let mut ps = GranularPitchShifter::new(48000.0);
    ps.set_grain(4.0);
    assert_eq!(ps.window.len(), MIN_GRAIN);
    ps.set_grain(1e9);
    assert_eq!(ps.window.len(), MAX_GRAIN);
    let mut b = sine(256, 300.0);
    ps.process(&mut b);
    assert!(b.iter().all(|s| s.is_finite()));
  }

  #[test]
  fn high_pass_removes_dc() {
    let mut hp = OnePoleHP::new(48000.0, 100.0);
    let mut last = 1.0;
    for _ in 0..48000 { last = hp.tick(1.0); }
    assert!(last.abs() < 1e-3);
  }

  #[test]
  fn formant_stage_only_runs_when_set() {
    let mut dry = GranularPitchShifter::new(48000.0);
    let mut wet = GranularPitchShifter::new(48000.0);
    wet.set_formant(0.0);
    let mut a = sine(2048, 440.0);
    let mut b = a.clone();
    dry.process(&mut a);
    wet.process(&mut b);
    assert_eq!(a, b);
  }

  #[test]
  fn formant_stage_restarts_after_being_switched_off() {
    let mut ps = GranularPitchShifter::new(48000.0);
    ps.set_formant(4.0);
    let mut loud = sine(4800, 440.0);
    ps.process(&mut loud);
    ps.set_formant(0.0);
    let mut gap = vec![0.0f32; 9600];
    ps.process(&mut gap);
    ps.set_formant(4.0);
    // one frame of pre-roll, never the audio from before the gap
    let mut after = sine(960, 440.0);
    ps.process(&mut after);
    assert!(after.iter().all(|&s| s == 0.0));
  }
}
