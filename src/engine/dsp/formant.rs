//! LPC formant shifter.
//!
//! Frames of `FRAME` samples are analysed every `HOP` samples: autocorrelation
//! and Levinson-Durbin give an all-pole model of the spectral envelope, the
//! frame itself is run through a frequency-warped version of that all-pole
//! filter, and the first `HOP` samples of the result are committed to the
//! output. Output therefore lags input by exactly `FRAME` samples; no
//! already-emitted sample is ever rewritten.

pub const FRAME: usize = 960;
pub const HOP: usize = 480;
pub const ORDER: usize = 16;

const MAX_WARP: f32 = 0.8;

/// Warp coefficient for a formant shift in semitones.
pub fn warp_alpha(semitones: f32) -> f32 {
  (0.6 * (semitones / 12.0)).clamp(-MAX_WARP, MAX_WARP)
}

pub fn autocorr(x: &[f32], r: &mut [f32; ORDER + 1]) {
  for (lag, slot) in r.iter_mut().enumerate() {
    let mut acc = 0.0f32;
    for i in 0..x.len().saturating_sub(lag) { acc += x[i] * x[i + lag]; }
    *slot = acc;
  }
}

/// Levinson-Durbin recursion. `a[0]` is always 1; `a[1..]` are the
/// prediction-error filter coefficients `A(z) = 1 + sum a[k] z^-k`.
pub fn levinson_durbin(r: &[f32; ORDER + 1], a: &mut [f32; ORDER + 1]) {
  *a = [0.0; ORDER + 1];
  a[0] = 1.0;
  let mut e = r[0];
  let mut prev = [0.0f32; ORDER + 1];
  for i in 1..=ORDER {
    let mut acc = 0.0f32;
    for j in 1..i { acc += a[j] * r[i - j]; }
    let k = -(r[i] + acc) / (e + 1e-9);
    prev.copy_from_slice(&a[..]);
    for j in 1..i { a[j] = prev[j] + k * prev[i - j]; }
    a[i] = k;
    e *= 1.0 - k * k;
  }
}

pub struct FormantShifter {
  frame: [f32; FRAME],
  fill: usize,
  // committed output waiting to be emitted
  out: [f32; FRAME + HOP],
  out_head: usize,
  out_len: usize,
  scratch: [f32; FRAME],
  semitones: f32,
}

impl FormantShifter {
  pub fn new() -> Self {
    Self {
      frame: [0.0; FRAME],
      fill: 0,
      out: [0.0; FRAME + HOP],
      out_head: 0,
      // pre-roll of silence covering the analysis delay
      out_len: FRAME,
      scratch: [0.0; FRAME],
      semitones: 0.0,
    }
  }

  /// A shift of 0 disables the stage. Leaving 0 starts again from the
  /// silent pre-roll so nothing captured before the stage was disabled is
  /// ever emitted.
  pub fn set_semitones(&mut self, st: f32) {
    if self.semitones == 0.0 && st != 0.0 { self.reset(); }
    self.semitones = st;
  }

  pub fn is_active(&self) -> bool { self.semitones != 0.0 }

  pub fn reset(&mut self) {
    self.frame = [0.0; FRAME];
    self.fill = 0;
    self.out = [0.0; FRAME + HOP];
    self.out_head = 0;
    self.out_len = FRAME;
  }

  pub fn process(&mut self, block: &mut [f32]) {
    for s in block.iter_mut() {
      self.frame[self.fill] = *s;
      self.fill += 1;
      if self.fill == FRAME {
        self.process_frame();
        // overlap: keep the last FRAME - HOP samples for the next frame
        self.frame.copy_within(HOP.., 0);
        self.fill = FRAME - HOP;
      }
      *s = self.pop();
    }
  }

  fn pop(&mut self) -> f32 {
    if self.out_len == 0 { return 0.0; }
    let v = self.out[self.out_head];
    self.out_head = (self.out_head + 1) % self.out.len();
    self.out_len -= 1;
    v
  }

  fn push(&mut self, v: f32) {
    let cap = self.out.len();
    if self.out_len == cap { return; }
    let idx = (self.out_head + self.out_len) % cap;
    self.out[idx] = v;
    self.out_len += 1;
  }

  fn process_frame(&mut self) {
    let alpha = warp_alpha(self.semitones);
    let mut r = [0.0f32; ORDER + 1];
    let mut a = [0.0f32; ORDER + 1];
    autocorr(&self.frame, &mut r);
    if r[0] > 1e-9 {
      levinson_durbin(&r, &mut a);
      warped_synthesis(&self.frame, &a, alpha, &mut self.scratch);
      if self.scratch.iter().any(|v| !v.is_finite()) {
        self.scratch.copy_from_slice(&self.frame);
      }
    } else {
      // silent frame: nothing to model
      self.scratch.copy_from_slice(&self.frame);
    }
    for i in 0..HOP {
      let v = self.scratch[i].clamp(-1.0, 1.0);
      self.push(v);
    }
  }
}

impl Default for FormantShifter {
  fn default() -> Self { Self::new() }
}

/// All-pole synthesis `1 / A(z)` where every unit delay is blended towards
/// its input by `alpha`. With `alpha == 0` the delays are plain.
fn warped_synthesis(x: &[f32], a: &[f32; ORDER + 1], alpha: f32, y: &mut [f32]) {
  let mut state = [0.0f32; ORDER];
  for n in 0..x.len() {
    let mut acc = x[n];
    for k in 0..ORDER { acc -= a[k + 1] * state[k]; }
    let mut prev = acc;
    for st in state.iter_mut() {
      let tmp = *st;
      *st = prev + alpha * (tmp - prev);
      prev = tmp;
    }
    y[n] = acc;
  }
}
