use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};

use super::error::{EngineError, EngineResult};
use super::params::Gains;
use super::relay::RelayChannel;
use super::voice::{SoundBuffer, Voice, VoiceRegistry};

const PLAY_QUEUE: usize = 256;
const MAX_VOICES: usize = 128;

pub struct PlayRequest {
  pub buffer: Arc<SoundBuffer>,
  pub gain: f32,
}

pub enum MixerMsg {
  Play(PlayRequest),
  StopAll,
}

/// Control-side handle: submits play requests and stop commands without
/// ever touching the voice registry.
#[derive(Clone)]
pub struct MixerHandle {
  tx: Sender<MixerMsg>,
  relay: Arc<RelayChannel>,
  sample_rate: u32,
  channels: usize,
}

impl MixerHandle {
  /// Rejects buffers whose format differs from the stream before they can
  /// become voices.
  pub fn play(&self, buffer: Arc<SoundBuffer>, gain: f32) -> EngineResult<()> {
    if buffer.sample_rate != self.sample_rate {
      return Err(EngineError::SampleRateMismatch {
        path: "<buffer>".into(),
        found: buffer.sample_rate,
        expected: self.sample_rate,
      });
    }
    if buffer.channels != self.channels {
      return Err(EngineError::ChannelMismatch {
        path: "<buffer>".into(),
        found: buffer.channels,
        expected: self.channels,
      });
    }
    self.send(MixerMsg::Play(PlayRequest { buffer, gain }))
  }

  /// The mixer clears its registry and the relay together at the start of
  /// its next block.
  pub fn stop_all(&self) -> EngineResult<()> { self.send(MixerMsg::StopAll) }

  pub fn relay(&self) -> &Arc<RelayChannel> { &self.relay }

  fn send(&self, msg: MixerMsg) -> EngineResult<()> {
    self.tx.try_send(msg).map_err(|e| match e {
      TrySendError::Full(_) => EngineError::Busy,
      TrySendError::Disconnected(_) => EngineError::Disconnected,
    })
  }
}

/// Body of the primary output callback.
pub struct MixingEngine {
  rx: Receiver<MixerMsg>,
  registry: VoiceRegistry,
  gains: Arc<Gains>,
  mute: Arc<AtomicBool>,
  relay: Arc<RelayChannel>,
  channels: usize,
}

pub fn mixer_pair(
  sample_rate: u32,
  channels: usize,
  gains: Arc<Gains>,
  mute: Arc<AtomicBool>,
  relay: Arc<RelayChannel>,
) -> (MixerHandle, MixingEngine) {
  let (tx, rx) = bounded(PLAY_QUEUE);
  let channels = channels.max(1);
  (
    MixerHandle { tx, relay: relay.clone(), sample_rate, channels },
    MixingEngine { rx, registry: VoiceRegistry::with_capacity(MAX_VOICES), gains, mute, relay, channels },
  )
}

impl MixingEngine {
  pub fn active_voices(&self) -> usize { self.registry.len() }

  fn drain_requests(&mut self) {
    loop {
      match self.rx.try_recv() {
        Ok(MixerMsg::Play(req)) => self.registry.push(Voice::new(req.buffer, req.gain)),
        Ok(MixerMsg::StopAll) => {
          // same thread as the push, so no stopped block can slip in after the clear
          self.registry.clear();
          self.relay.clear();
        }
        Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
      }
    }
  }

  /// Renders one interleaved block into `out` and relays a copy.
  pub fn render(&mut self, out: &mut [f32]) {
    self.drain_requests();
    let frames = out.len() / self.channels;
    out.fill(0.0);
    let master = self.gains.master.load();
    self.registry.mix(out, frames, master);
    // the mute flag is sampled once per block; voices keep advancing
    if self.mute.load(Ordering::Relaxed) {
      out.fill(0.0);
    } else {
      for s in out.iter_mut() { *s = s.clamp(-1.0, 1.0); }
    }
    self.relay.push(out);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn setup(channels: usize) -> (MixerHandle, MixingEngine, Arc<Gains>, Arc<AtomicBool>) {
    let gains = Arc::new(Gains::new(1.0, 1.0));
    let mute = Arc::new(AtomicBool::new(false));
    let relay = Arc::new(RelayChannel::new(8));
    let (h, m) = mixer_pair(48000, channels, gains.clone(), mute.clone(), relay);
    (h, m, gains, mute)
  }

  fn constant(frames: usize, channels: usize, v: f32) -> Arc<SoundBuffer> {
    Arc::new(SoundBuffer::new(vec![v; frames * channels], channels, 48000))
  }

  #[test]
  fn two_voices_hard_clip_at_unity() {
    let (h, mut m, _, _) = setup(2);
    h.play(constant(256, 2, 0.6), 1.0).unwrap();
    h.play(constant(256, 2, 0.6), 1.0).unwrap();
    let mut out = vec![0.0f32; 128 * 2];
    m.render(&mut out);
    assert_eq!(m.active_voices(), 2);
    assert!(out.iter().all(|&s| s == 1.0));
  }

  #[test]
  fn master_gain_scales_mix() {
    let (h, mut m, gains, _) = setup(1);
    gains.master.store(0.5);
    h.play(constant(64, 1, 0.8), 0.5).unwrap();
    let mut out = vec![0.0f32; 64];
    m.render(&mut out);
    assert!(out.iter().all(|&s| (s - 0.2).abs() < 1e-6));
    assert_eq!(m.active_voices(), 0);
  }

  #[test]
  fn block_is_relayed() {
    let (h, mut m, _, _) = setup(1);
    h.play(constant(16, 1, 0.3), 1.0).unwrap();
    let mut out = vec![0.0f32; 16];
    m.render(&mut out);
    let mut relayed = vec![0.0f32; 16];
    assert_eq!(h.relay().pop_into(&mut relayed), 16);
    assert_eq!(out, relayed);
  }

  #[test]
  fn mute_emits_silence_but_time_moves_on() {
    let (h, mut m, _, mute) = setup(1);
    h.play(constant(100, 1, 0.5), 1.0).unwrap();
    mute.store(true, Ordering::Relaxed);
    let mut out = vec![1.0f32; 64];
    m.render(&mut out);
    assert!(out.iter().all(|&s| s == 0.0));
    mute.store(false, Ordering::Relaxed);
    m.render(&mut out);
    assert!(out[..36].iter().all(|&s| s == 0.5));
    assert!(out[36..].iter().all(|&s| s == 0.0));
    assert_eq!(m.active_voices(), 0);
  }

  #[test]
  fn stop_all_clears_registry_and_relay() {
    let (h, mut m, _, _) = setup(1);
    h.play(constant(1000, 1, 0.1), 1.0).unwrap();
    let mut out = vec![0.0f32; 32];
    m.render(&mut out);
    assert_eq!(m.active_voices(), 1);
    m.render(&mut out);
    assert_eq!(h.relay().len(), 2);
    h.stop_all().unwrap();
    // nothing changes until the mixer runs
    assert_eq!(h.relay().len(), 2);
    m.render(&mut out);
    assert_eq!(m.active_voices(), 0);
    assert!(out.iter().all(|&s| s == 0.0));
    // only the silent block rendered after the stop is left
    assert_eq!(h.relay().len(), 1);
    let mut relayed = vec![1.0f32; 32];
    assert_eq!(h.relay().pop_into(&mut relayed), 32);
    assert!(relayed.iter().all(|&s| s == 0.0));
  }

  #[test]
  fn mismatched_buffer_never_becomes_a_voice() {
    let (h, mut m, _, _) = setup(2);
    let wrong_rate = Arc::new(SoundBuffer::new(vec![0.1; 64], 2, 44100));
    assert!(matches!(h.play(wrong_rate, 1.0), Err(EngineError::SampleRateMismatch { .. })));
    let wrong_channels = constant(32, 1, 0.1);
    assert!(matches!(h.play(wrong_channels, 1.0), Err(EngineError::ChannelMismatch { .. })));
    let mut out = vec![0.0f32; 64];
    m.render(&mut out);
    assert_eq!(m.active_voices(), 0);
  }
}
