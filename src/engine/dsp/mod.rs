pub mod biquad;
pub mod bitcrusher;
pub mod echo;
pub mod formant;
pub mod granular;
pub mod modulation;
pub mod pitch;
pub mod reverb;
pub mod saturator;
pub mod shaper;
pub mod voices;

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::params::{hash_path, ParamStore};

use biquad::Cascade;
use bitcrusher::Bitcrusher;
use echo::Echo;
use formant::FormantShifter;
use granular::GranularDelay;
use modulation::{Carrier, ModDelay, RingMod, Tremolo, CHORUS, FLANGER, VIBRATO};
use pitch::GranularPitchShifter;
use reverb::FeedbackReverb;
use saturator::Saturator;
use shaper::{Distortion, Gain, Overdrive};
use voices::{Alien, Hypercam, Whisper};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EffectKind {
  PassThrough,
  Bitcrusher,
  Saturator,
  FeedbackReverb,
  GranularPitch,
  Formant,
  GranularDelay,
  Echo,
  Tremolo,
  Vibrato,
  Flanger,
  Chorus,
  Robot,
  HighPass,
  Telephone,
  Megaphone,
  LoFi,
  Whisper,
  Distortion,
  Overdrive,
  Gain,
  Alien,
  Hypercam,
}

impl EffectKind {
  pub const ALL: [EffectKind; 23] = [
    EffectKind::PassThrough,
    EffectKind::Bitcrusher,
    EffectKind::Saturator,
    EffectKind::FeedbackReverb,
    EffectKind::GranularPitch,
    EffectKind::Formant,
    EffectKind::GranularDelay,
    EffectKind::Echo,
    EffectKind::Tremolo,
    EffectKind::Vibrato,
    EffectKind::Flanger,
    EffectKind::Chorus,
    EffectKind::Robot,
    EffectKind::HighPass,
    EffectKind::Telephone,
    EffectKind::Megaphone,
    EffectKind::LoFi,
    EffectKind::Whisper,
    EffectKind::Distortion,
    EffectKind::Overdrive,
    EffectKind::Gain,
    EffectKind::Alien,
    EffectKind::Hypercam,
  ];

  pub fn name(self) -> &'static str {
    match self {
      EffectKind::PassThrough => "none",
      EffectKind::Bitcrusher => "bitcrush",
      EffectKind::Saturator => "saturation",
      EffectKind::FeedbackReverb => "reverb",
      EffectKind::GranularPitch => "pitch",
      EffectKind::Formant => "formant",
      EffectKind::GranularDelay => "granular",
      EffectKind::Echo => "echo",
      EffectKind::Tremolo => "tremolo",
      EffectKind::Vibrato => "vibrato",
      EffectKind::Flanger => "flanger",
      EffectKind::Chorus => "chorus",
      EffectKind::Robot => "robot",
      EffectKind::HighPass => "highpass",
      EffectKind::Telephone => "telephone",
      EffectKind::Megaphone => "megaphone",
      EffectKind::LoFi => "lofi",
      EffectKind::Whisper => "whisper",
      EffectKind::Distortion => "distortion",
      EffectKind::Overdrive => "overdrive",
      EffectKind::Gain => "gain",
      EffectKind::Alien => "alien",
      EffectKind::Hypercam => "hypercam",
    }
  }

  pub fn from_name(name: &str) -> EngineResult<Self> {
    let wanted = name.trim().to_ascii_lowercase();
    Self::ALL
      .iter()
      .copied()
      .find(|k| k.name() == wanted)
      .ok_or_else(|| EngineError::UnknownEffect(name.trim().to_string()))
  }

  /// At most one unit of this kind may sit in a chain; adding another
  /// replaces the old one.
  pub fn is_exclusive(self) -> bool { matches!(self, EffectKind::Hypercam) }
}

/// Parameter hashes resolved once when a unit is built.
pub struct EffectParamKeys {
  pub bits: u64,
  pub downsample: u64,
  pub drive: u64,
  pub excite: u64,
  pub rev_wet: u64,
  pub rev_feedback: u64,
  pub rev_delays: [u64; 3],
  pub pitch_semitones: u64,
  pub formant_semitones: u64,
  pub pitch_grain: u64,
  pub gran_grain: u64,
  pub gran_jitter: u64,
  pub gran_mix: u64,
  pub echo_delay: u64,
  pub echo_decay: u64,
  pub tremolo_rate: u64,
  pub tremolo_depth: u64,
  pub vibrato_rate: u64,
  pub vibrato_depth: u64,
  pub flanger_rate: u64,
  pub flanger_depth: u64,
  pub chorus_rate: u64,
  pub chorus_depth: u64,
  pub robot_rate: u64,
  pub highpass_cutoff: u64,
  pub dist_gain: u64,
  pub dist_threshold: u64,
  pub overdrive: u64,
  pub fx_gain: u64,
}

impl EffectParamKeys {
  pub fn new() -> Self {
    Self {
      bits: hash_path("BITCRUSH_BITS"),
      downsample: hash_path("BITCRUSH_DOWNSAMPLE"),
      drive: hash_path("SAT_DRIVE"),
      excite: hash_path("SAT_EXCITE"),
      rev_wet: hash_path("REV_WET"),
      rev_feedback: hash_path("REV_FEEDBACK"),
      rev_delays: [hash_path("REV_D1"), hash_path("REV_D2"), hash_path("REV_D3")],
      pitch_semitones: hash_path("PITCH_SEMITONES"),
      formant_semitones: hash_path("FORMANT_SEMITONES"),
      pitch_grain: hash_path("GRANP_GRAIN"),
      gran_grain: hash_path("GRAN_GRAIN"),
      gran_jitter: hash_path("GRAN_JITTER"),
      gran_mix: hash_path("GRAN_MIX"),
      echo_delay: hash_path("ECHO_DELAY_MS"),
      echo_decay: hash_path("ECHO_DECAY"),
      tremolo_rate: hash_path("TREMOLO_HZ"),
      tremolo_depth: hash_path("TREMOLO_DEPTH"),
      vibrato_rate: hash_path("VIBRATO_HZ"),
      vibrato_depth: hash_path("VIBRATO_DEPTH_MS"),
      flanger_rate: hash_path("FLANGER_HZ"),
      flanger_depth: hash_path("FLANGER_DEPTH_MS"),
      chorus_rate: hash_path("CHORUS_HZ"),
      chorus_depth: hash_path("CHORUS_DEPTH_MS"),
      robot_rate: hash_path("ROBOT_HZ"),
      highpass_cutoff: hash_path("HIGHPASS_HZ"),
      dist_gain: hash_path("DIST_GAIN"),
      dist_threshold: hash_path("DIST_THRESHOLD"),
      overdrive: hash_path("OVERDRIVE_DRIVE"),
      fx_gain: hash_path("FX_GAIN"),
    }
  }
}

impl Default for EffectParamKeys {
  fn default() -> Self { Self::new() }
}

/// Closed set of effect units. Each variant owns its state outright; a unit
/// is never shared between chains.
pub enum EffectUnit {
  PassThrough,
  Bitcrusher(Bitcrusher),
  Saturator(Saturator),
  FeedbackReverb(FeedbackReverb),
  GranularPitch(Box<GranularPitchShifter>),
  Formant(Box<FormantShifter>),
  GranularDelay(GranularDelay),
  Echo(Echo),
  Tremolo(Tremolo),
  Vibrato(ModDelay),
  Flanger(ModDelay),
  Chorus(ModDelay),
  Robot(RingMod),
  HighPass(Cascade),
  Telephone(Cascade),
  Megaphone(Cascade),
  LoFi(Bitcrusher),
  Whisper(Whisper),
  Distortion(Distortion),
  Overdrive(Overdrive),
  Gain(Gain),
  Alien(Box<Alien>),
  Hypercam(Hypercam),
}

impl EffectUnit {
  pub fn new(kind: EffectKind, sr: f32) -> Self {
    match kind {
      EffectKind::PassThrough => EffectUnit::PassThrough,
      EffectKind::Bitcrusher => EffectUnit::Bitcrusher(Bitcrusher::new()),
      EffectKind::Saturator => EffectUnit::Saturator(Saturator::new()),
      EffectKind::FeedbackReverb => EffectUnit::FeedbackReverb(FeedbackReverb::new(sr)),
      EffectKind::GranularPitch => EffectUnit::GranularPitch(Box::new(GranularPitchShifter::new(sr))),
      EffectKind::Formant => EffectUnit::Formant(Box::new(FormantShifter::new())),
      EffectKind::GranularDelay => EffectUnit::GranularDelay(GranularDelay::new(sr)),
      EffectKind::Echo => EffectUnit::Echo(Echo::new(sr)),
      EffectKind::Tremolo => EffectUnit::Tremolo(Tremolo::new(sr)),
      EffectKind::Vibrato => EffectUnit::Vibrato(ModDelay::new(sr, VIBRATO)),
      EffectKind::Flanger => EffectUnit::Flanger(ModDelay::new(sr, FLANGER)),
      EffectKind::Chorus => EffectUnit::Chorus(ModDelay::new(sr, CHORUS)),
      EffectKind::Robot => EffectUnit::Robot(RingMod::new(sr, 30.0, Carrier::Square)),
      EffectKind::HighPass => EffectUnit::HighPass(Cascade::highpass(sr, 1000.0)),
      EffectKind::Telephone => EffectUnit::Telephone(Cascade::bandpass(sr, 300.0, 3400.0, true)),
      EffectKind::Megaphone => EffectUnit::Megaphone(Cascade::bandpass(sr, 500.0, 3000.0, false)),
      EffectKind::LoFi => EffectUnit::LoFi(voices::lofi(sr)),
      EffectKind::Whisper => EffectUnit::Whisper(Whisper::new()),
      EffectKind::Distortion => EffectUnit::Distortion(Distortion::new()),
      EffectKind::Overdrive => EffectUnit::Overdrive(Overdrive::new()),
      EffectKind::Gain => EffectUnit::Gain(Gain::new()),
      EffectKind::Alien => EffectUnit::Alien(Box::new(Alien::new(sr))),
      EffectKind::Hypercam => EffectUnit::Hypercam(Hypercam::new(sr)),
    }
  }

  pub fn kind(&self) -> EffectKind {
    match self {
      EffectUnit::PassThrough => EffectKind::PassThrough,
      EffectUnit::Bitcrusher(_) => EffectKind::Bitcrusher,
      EffectUnit::Saturator(_) => EffectKind::Saturator,
      EffectUnit::FeedbackReverb(_) => EffectKind::FeedbackReverb,
      EffectUnit::GranularPitch(_) => EffectKind::GranularPitch,
      EffectUnit::Formant(_) => EffectKind::Formant,
      EffectUnit::GranularDelay(_) => EffectKind::GranularDelay,
      EffectUnit::Echo(_) => EffectKind::Echo,
      EffectUnit::Tremolo(_) => EffectKind::Tremolo,
      EffectUnit::Vibrato(_) => EffectKind::Vibrato,
      EffectUnit::Flanger(_) => EffectKind::Flanger,
      EffectUnit::Chorus(_) => EffectKind::Chorus,
      EffectUnit::Robot(_) => EffectKind::Robot,
      EffectUnit::HighPass(_) => EffectKind::HighPass,
      EffectUnit::Telephone(_) => EffectKind::Telephone,
      EffectUnit::Megaphone(_) => EffectKind::Megaphone,
      EffectUnit::LoFi(_) => EffectKind::LoFi,
      EffectUnit::Whisper(_) => EffectKind::Whisper,
      EffectUnit::Distortion(_) => EffectKind::Distortion,
      EffectUnit::Overdrive(_) => EffectKind::Overdrive,
      EffectUnit::Gain(_) => EffectKind::Gain,
      EffectUnit::Alien(_) => EffectKind::Alien,
      EffectUnit::Hypercam(_) => EffectKind::Hypercam,
    }
  }

  /// Pulls this block's parameters, then processes `block` in place.
  pub fn process(&mut self, block: &mut [f32], params: &ParamStore, keys: &EffectParamKeys) {
    match self {
      EffectUnit::PassThrough => {}
      EffectUnit::Bitcrusher(u) => {
        u.set_bits(params.get_f32_h(keys.bits, 8.0));
        u.set_factor(params.get_f32_h(keys.downsample, 6.0));
        u.process(block);
      }
      EffectUnit::Saturator(u) => {
        u.set_drive(params.get_f32_h(keys.drive, 2.0));
        u.set_excite(params.get_f32_h(keys.excite, 0.15));
        u.process(block);
      }
      EffectUnit::FeedbackReverb(u) => {
        u.set_wet(params.get_f32_h(keys.rev_wet, 0.12));
        u.set_feedback(params.get_f32_h(keys.rev_feedback, 0.35));
        u.set_delays([
          params.get_f32_h(keys.rev_delays[0], 1200.0),
          params.get_f32_h(keys.rev_delays[1], 1700.0),
          params.get_f32_h(keys.rev_delays[2], 900.0),
        ]);
        u.process(block);
      }
      EffectUnit::GranularPitch(u) => {
        u.set_semitones(params.get_f32_h(keys.pitch_semitones, 0.0));
        u.set_grain(params.get_f32_h(keys.pitch_grain, 480.0));
        u.set_formant(params.get_f32_h(keys.formant_semitones, 0.0));
        u.process(block);
      }
      EffectUnit::Formant(u) => {
        // a shift of 0 bypasses the stage and arms a reset for the next enable
        u.set_semitones(params.get_f32_h(keys.formant_semitones, 0.0));
        if u.is_active() { u.process(block); }
      }
      EffectUnit::GranularDelay(u) => {
        u.set_grain(params.get_f32_h(keys.gran_grain, 800.0));
        u.set_jitter(params.get_f32_h(keys.gran_jitter, 0.3));
        u.set_mix(params.get_f32_h(keys.gran_mix, 0.25));
        u.process(block);
      }
      EffectUnit::Echo(u) => {
        u.set_delay_ms(params.get_f32_h(keys.echo_delay, 300.0));
        u.set_decay(params.get_f32_h(keys.echo_decay, 0.5));
        u.process(block);
      }
      EffectUnit::Tremolo(u) => {
        u.set_rate(params.get_f32_h(keys.tremolo_rate, 5.0));
        u.set_depth(params.get_f32_h(keys.tremolo_depth, 1.0));
        u.process(block);
      }
      EffectUnit::Vibrato(u) => {
        u.set_rate(params.get_f32_h(keys.vibrato_rate, 5.0));
        u.set_depth_ms(params.get_f32_h(keys.vibrato_depth, 2.0));
        u.process(block);
      }
      EffectUnit::Flanger(u) => {
        u.set_rate(params.get_f32_h(keys.flanger_rate, 0.25));
        u.set_depth_ms(params.get_f32_h(keys.flanger_depth, 2.0));
        u.process(block);
      }
      EffectUnit::Chorus(u) => {
        u.set_rate(params.get_f32_h(keys.chorus_rate, 1.5));
        u.set_depth_ms(params.get_f32_h(keys.chorus_depth, 3.0));
        u.process(block);
      }
      EffectUnit::Robot(u) => {
        u.set_rate(params.get_f32_h(keys.robot_rate, 30.0));
        u.process(block);
      }
      EffectUnit::HighPass(u) => {
        u.set_highpass_cutoff(params.get_f32_h(keys.highpass_cutoff, 1000.0));
        u.process(block);
      }
      EffectUnit::Telephone(u) | EffectUnit::Megaphone(u) => u.process(block),
      EffectUnit::LoFi(u) => u.process(block),
      EffectUnit::Whisper(u) => u.process(block),
      EffectUnit::Distortion(u) => {
        u.set_gain(params.get_f32_h(keys.dist_gain, 5.0));
        u.set_threshold(params.get_f32_h(keys.dist_threshold, 0.5));
        u.process(block);
      }
      EffectUnit::Overdrive(u) => {
        u.set_drive(params.get_f32_h(keys.overdrive, 2.0));
        u.process(block);
      }
      EffectUnit::Gain(u) => {
        u.set_gain(params.get_f32_h(keys.fx_gain, 1.0));
        u.process(block);
      }
      EffectUnit::Alien(u) => u.process(block),
      EffectUnit::Hypercam(u) => u.process(block),
    }
  }
}
