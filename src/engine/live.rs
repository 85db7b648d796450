use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender};

use super::chain::ChainSlot;
use super::params::{Gains, ParamStore};
use super::relay::RelayChannel;

const CAPTURE_QUEUE: usize = 16;

/// Input-callback side of the live path: takes the first input channel,
/// applies mic gain, and hands the block over without blocking.
pub struct CaptureSender {
  tx: Sender<Vec<f32>>,
  pool_rx: Receiver<Vec<f32>>,
  gains: Arc<Gains>,
  input_channels: usize,
  dropped: Arc<AtomicU64>,
}

impl CaptureSender {
  pub fn capture(&self, input: &[f32]) {
    let mut buf = self.pool_rx.try_recv().unwrap_or_default();
    buf.clear();
    let mic = self.gains.mic.load();
    buf.extend(input.chunks(self.input_channels).map(|frame| frame[0] * mic));
    if self.tx.try_send(buf).is_err() {
      self.dropped.fetch_add(1, Ordering::Relaxed);
    }
  }

  /// Shared count of blocks discarded because the output side fell behind.
  pub fn dropped(&self) -> Arc<AtomicU64> { self.dropped.clone() }
}

/// Output-callback side of the live path: mic → effect chain → every output
/// channel, optionally relayed to a secondary device.
pub struct EffectStream {
  rx: Receiver<Vec<f32>>,
  pool_tx: Sender<Vec<f32>>,
  pending: VecDeque<f32>,
  max_pending: usize,
  scratch: Vec<f32>,
  chain: ChainSlot,
  params: Arc<ParamStore>,
  gains: Arc<Gains>,
  mute: Arc<AtomicBool>,
  channels: usize,
  relay: Option<Arc<RelayChannel>>,
}

pub struct LiveConfig {
  pub block_size: usize,
  pub input_channels: usize,
  pub output_channels: usize,
}

pub fn live_pair(
  cfg: LiveConfig,
  chain: ChainSlot,
  params: Arc<ParamStore>,
  gains: Arc<Gains>,
  mute: Arc<AtomicBool>,
  relay: Option<Arc<RelayChannel>>,
) -> (CaptureSender, EffectStream) {
  let (tx, rx) = bounded(CAPTURE_QUEUE);
  let (pool_tx, pool_rx) = bounded(CAPTURE_QUEUE * 2);
  let block = cfg.block_size.max(16);
  for _ in 0..CAPTURE_QUEUE {
    let _ = pool_tx.try_send(Vec::with_capacity(block));
  }
  let capture = CaptureSender {
    tx,
    pool_rx,
    gains: gains.clone(),
    input_channels: cfg.input_channels.max(1),
    dropped: Arc::new(AtomicU64::new(0)),
  };
  let max_pending = block * 4;
  let stream = EffectStream {
    rx,
    pool_tx,
    pending: VecDeque::with_capacity(max_pending + block * CAPTURE_QUEUE),
    max_pending,
    scratch: Vec::with_capacity(block * 4),
    chain,
    params,
    gains,
    mute,
    channels: cfg.output_channels.max(1),
    relay,
  };
  (capture, stream)
}

impl EffectStream {
  pub fn render(&mut self, out: &mut [f32]) {
    while let Ok(buf) = self.rx.try_recv() {
      self.pending.extend(buf.iter().copied());
      let _ = self.pool_tx.try_send(buf);
    }
    // keep latency bounded when the output side falls behind
    if self.pending.len() > self.max_pending {
      let excess = self.pending.len() - self.max_pending;
      self.pending.drain(..excess);
    }

    let frames = out.len() / self.channels;
    self.scratch.clear();
    let n = self.pending.len().min(frames);
    self.scratch.extend(self.pending.drain(..n));
    // underrun: pad with silence
    self.scratch.resize(frames, 0.0);

    if self.mute.load(Ordering::Relaxed) {
      self.scratch.fill(0.0);
    } else {
      self.chain.process(&mut self.scratch, &self.params);
      let master = self.gains.master.load();
      for s in self.scratch.iter_mut() { *s = (*s * master).clamp(-1.0, 1.0); }
    }

    for (frame, &v) in out.chunks_mut(self.channels).zip(self.scratch.iter()) { frame.fill(v); }
    if let Some(relay) = &self.relay { relay.push(out); }
  }

  pub fn chain(&self) -> &ChainSlot { &self.chain }
}
