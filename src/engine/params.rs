use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use super::error::{EngineError, EngineResult};

/// f32 stored as raw bits so a reader never observes a torn value.
#[derive(Debug)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
  pub fn new(v: f32) -> Self { Self(AtomicU32::new(v.to_bits())) }
  #[inline]
  pub fn load(&self) -> f32 { f32::from_bits(self.0.load(Ordering::Relaxed)) }
  #[inline]
  pub fn store(&self, v: f32) { self.0.store(v.to_bits(), Ordering::Relaxed) }
}

pub const DEFAULT_PARAMS: &[(&str, f32)] = &[
  ("BITCRUSH_BITS", 8.0),
  ("BITCRUSH_DOWNSAMPLE", 6.0),
  ("SAT_DRIVE", 2.0),
  ("SAT_EXCITE", 0.15),
  ("REV_WET", 0.12),
  ("REV_FEEDBACK", 0.35),
  ("REV_D1", 1200.0),
  ("REV_D2", 1700.0),
  ("REV_D3", 900.0),
  ("PITCH_SEMITONES", 0.0),
  ("FORMANT_SEMITONES", 0.0),
  ("GRANP_GRAIN", 480.0),
  ("GRAN_GRAIN", 800.0),
  ("GRAN_JITTER", 0.3),
  ("GRAN_MIX", 0.25),
  ("ECHO_DELAY_MS", 300.0),
  ("ECHO_DECAY", 0.5),
  ("TREMOLO_HZ", 5.0),
  ("TREMOLO_DEPTH", 1.0),
  ("VIBRATO_HZ", 5.0),
  ("VIBRATO_DEPTH_MS", 2.0),
  ("FLANGER_HZ", 0.25),
  ("FLANGER_DEPTH_MS", 2.0),
  ("CHORUS_HZ", 1.5),
  ("CHORUS_DEPTH_MS", 3.0),
  ("ROBOT_HZ", 30.0),
  ("HIGHPASS_HZ", 1000.0),
  ("DIST_GAIN", 5.0),
  ("DIST_THRESHOLD", 0.5),
  ("OVERDRIVE_DRIVE", 2.0),
  ("FX_GAIN", 1.0),
];

struct ParamSlot {
  name: &'static str,
  value: AtomicF32,
}

/// Fixed-key parameter table shared between the control thread (writer) and
/// the audio threads (readers). The key set never changes after construction,
/// so lookups need no lock; each value is a single atomic word.
pub struct ParamStore {
  slots: Vec<ParamSlot>,
  index_h: HashMap<u64, usize>,
}

impl ParamStore {
  pub fn new() -> Self { Self::with_keys(DEFAULT_PARAMS) }

  pub fn with_keys(keys: &[(&'static str, f32)]) -> Self {
    let mut slots = Vec::with_capacity(keys.len());
    let mut index_h = HashMap::with_capacity(keys.len());
    for (name, v) in keys {
      index_h.insert(fast_hash(name), slots.len());
      slots.push(ParamSlot { name, value: AtomicF32::new(*v) });
    }
    Self { slots, index_h }
  }

  /// Keys are matched case-insensitively; unknown keys are rejected untouched.
  pub fn set(&self, path: &str, v: f32) -> EngineResult<()> {
    let key = path.to_ascii_uppercase();
    match self.index_h.get(&fast_hash(&key)) {
      Some(&i) => { self.slots[i].value.store(v); Ok(()) }
      None => Err(EngineError::UnknownParam(path.to_string())),
    }
  }

  pub fn get_f32(&self, path: &str, default: f32) -> f32 {
    self.get_f32_h(fast_hash(&path.to_ascii_uppercase()), default)
  }

  #[inline]
  pub fn get_f32_h(&self, key: u64, default: f32) -> f32 {
    match self.index_h.get(&key) { Some(&i) => self.slots[i].value.load(), None => default }
  }

  pub fn contains(&self, path: &str) -> bool {
    self.index_h.contains_key(&fast_hash(&path.to_ascii_uppercase()))
  }

  pub fn entries(&self) -> impl Iterator<Item = (&'static str, f32)> + '_ {
    self.slots.iter().map(|s| (s.name, s.value.load()))
  }
}

impl Default for ParamStore {
  fn default() -> Self { Self::new() }
}

/// Gain scalars the control channel can change while streams run.
pub struct Gains {
  pub master: AtomicF32,
  pub mic: AtomicF32,
}

impl Gains {
  pub fn new(master: f32, mic: f32) -> Self {
    Self { master: AtomicF32::new(master), mic: AtomicF32::new(mic) }
  }
}

#[inline]
fn fast_hash(s: &str) -> u64 {
  // FNV-1a 64-bit
  let mut hash: u64 = 0xcbf29ce484222325; // offset basis
  for b in s.as_bytes() {
    hash ^= *b as u64;
    hash = hash.wrapping_mul(0x100000001b3);
  }
  hash
}

// Helper to expose hash for other modules
pub fn hash_path(path: &str) -> u64 { fast_hash(path) }
