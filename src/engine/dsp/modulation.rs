use std::f32::consts::TAU;

/// LFO phase in normalized cycles `[0, 1)`, carried across blocks.
#[derive(Clone, Copy, Default)]
struct Phase(f32);

impl Phase {
  #[inline]
  fn advance(&mut self, hz: f32, sr: f32) -> f32 {
    let p = self.0;
    self.0 = (self.0 + hz / sr).fract();
    p
  }
}

/// Amplitude LFO: `gain = 1 - depth * (1 - 0.5 * (1 + sin))`.
pub struct Tremolo {
  sr: f32,
  phase: Phase,
  hz: f32,
  depth: f32,
}

impl Tremolo {
  pub fn new(sr: f32) -> Self { Self { sr, phase: Phase::default(), hz: 5.0, depth: 1.0 } }
  pub fn set_rate(&mut self, hz: f32) { self.hz = hz.max(0.0); }
  pub fn set_depth(&mut self, d: f32) { self.depth = d.clamp(0.0, 1.0); }

  pub fn process(&mut self, block: &mut [f32]) {
    for s in block.iter_mut() {
      let lfo = 0.5 * (1.0 + (TAU * self.phase.advance(self.hz, self.sr)).sin());
      *s *= 1.0 - self.depth * (1.0 - lfo);
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Carrier { Sine, Square }

/// Ring modulator. With a square carrier this is the robot voice.
pub struct RingMod {
  sr: f32,
  phase: Phase,
  hz: f32,
  carrier: Carrier,
}

impl RingMod {
  pub fn new(sr: f32, hz: f32, carrier: Carrier) -> Self { Self { sr, phase: Phase::default(), hz, carrier } }
  pub fn set_rate(&mut self, hz: f32) { self.hz = hz.max(0.0); }

  pub fn process(&mut self, block: &mut [f32]) {
    for s in block.iter_mut() {
      let c = (TAU * self.phase.advance(self.hz, self.sr)).sin();
      *s *= match self.carrier {
        Carrier::Sine => c,
        Carrier::Square => if c > 0.0 { 1.0 } else if c < 0.0 { -1.0 } else { 0.0 },
      };
    }
  }
}

/// Voicing of a modulated delay line.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModVoicing {
  pub dry: f32,
  pub wet: f32,
}

pub const VIBRATO: ModVoicing = ModVoicing { dry: 0.0, wet: 1.0 };
pub const FLANGER: ModVoicing = ModVoicing { dry: 1.0, wet: 0.7 };
pub const CHORUS: ModVoicing = ModVoicing { dry: 0.5, wet: 0.5 };

/// Mono delay line read `(0.5 * sin + 0.5) * depth` behind the write head
/// with linear interpolation. One second of history.
pub struct ModDelay {
  buf: Vec<f32>,
  wr: usize,
  sr: f32,
  phase: Phase,
  hz: f32,
  depth_ms: f32,
  voicing: ModVoicing,
}

impl ModDelay {
  pub fn new(sr: f32, voicing: ModVoicing) -> Self {
    let len = (sr.ceil() as usize).max(64);
    Self { buf: vec![0.0; len], wr: 0, sr, phase: Phase::default(), hz: 1.0, depth_ms: 2.0, voicing }
  }

  pub fn set_rate(&mut self, hz: f32) { self.hz = hz.max(0.0); }
  pub fn set_depth_ms(&mut self, ms: f32) {
    // keep the farthest tap inside the ring
    let max_ms = (self.buf.len() - 2) as f32 / self.sr * 1000.0;
    self.depth_ms = ms.clamp(0.0, max_ms);
  }

  #[inline]
  fn read_at(buf: &[f32], idx: f32) -> f32 {
    let len = buf.len() as i32;
    let i0 = idx.floor() as i32;
    let frac = idx - i0 as f32;
    let wrap = |i: i32| -> usize { ((i % len + len) % len) as usize };
    let s0 = buf[wrap(i0)];
    let s1 = buf[wrap(i0 + 1)];
    s0 + (s1 - s0) * frac
  }

  pub fn process(&mut self, block: &mut [f32]) {
    let depth = self.depth_ms * self.sr / 1000.0;
    let ModVoicing { dry, wet } = self.voicing;
    for s in block.iter_mut() {
      let x = *s;
      self.buf[self.wr] = x;
      let lfo = (TAU * self.phase.advance(self.hz, self.sr)).sin();
      let d = (lfo * 0.5 + 0.5) * depth;
      let y = Self::read_at(&self.buf, self.wr as f32 - d);
      self.wr += 1; if self.wr >= self.buf.len() { self.wr = 0; }
      *s = (dry * x + wet * y).clamp(-1.0, 1.0);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tremolo_phase_carries_across_blocks() {
    let mut whole = Tremolo::new(48000.0);
    let mut split = Tremolo::new(48000.0);
    let mut a = vec![0.5f32; 1000];
    whole.process(&mut a);
    let mut b = vec![0.5f32; 1000];
    let (l, r) = b.split_at_mut(333);
    split.process(l);
    split.process(r);
    assert_eq!(a, b);
    assert!(a.iter().all(|&s| (0.0..=0.5).contains(&s)));
  }

  #[test]
  fn zero_depth_tremolo_is_transparent() {
    let mut t = Tremolo::new(48000.0);
    t.set_depth(0.0);
    let mut b = vec![0.3f32; 256];
    t.process(&mut b);
    assert!(b.iter().all(|&s| s == 0.3));
  }

  #[test]
  fn robot_carrier_only_flips_sign() {
    let mut rm = RingMod::new(48000.0, 30.0, Carrier::Square);
    let mut b = vec![0.25f32; 4800];
    rm.process(&mut b);
    assert!(b.iter().all(|&s| s == 0.25 || s == -0.25 || s == 0.0));
    // half a period of 30 Hz is 800 samples
    assert!(b[1..800].iter().all(|&s| s == 0.25));
    assert!(b[801..1600].iter().all(|&s| s == -0.25));
  }

  #[test]
  fn zero_depth_vibrato_is_transparent() {
    let mut v = ModDelay::new(48000.0, VIBRATO);
    v.set_depth_ms(0.0);
    let input: Vec<f32> = (0..512).map(|i| (i as f32 * 0.02).sin() * 0.5).collect();
    let mut b = input.clone();
    v.process(&mut b);
    assert_eq!(b, input);
  }

  #[test]
  fn flanger_adds_a_delayed_copy() {
    let mut f = ModDelay::new(48000.0, FLANGER);
    f.set_rate(0.0);
    f.set_depth_ms(1.0);
    // phase 0 gives sin 0, so the tap sits at half the depth: 24 samples
    let mut b = vec![0.0f32; 64];
    b[0] = 0.5;
    f.process(&mut b);
    assert_eq!(b[0], 0.5);
    assert!((b[24] - 0.35).abs() < 1e-6);
    assert!(b.iter().enumerate().all(|(i, &s)| i == 0 || i == 24 || s == 0.0));
  }

  #[test]
  fn depth_is_clamped_to_the_ring() {
    let mut c = ModDelay::new(1000.0, CHORUS);
    c.set_depth_ms(1e6);
    let mut b = vec![0.4f32; 3000];
    c.process(&mut b);
    assert!(b.iter().all(|s| s.is_finite() && s.abs() <= 1.0));
  }
}
