use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};

use super::dsp::{EffectKind, EffectParamKeys, EffectUnit};
use super::error::{EngineError, EngineResult};
use super::params::ParamStore;

/// Ordered list of effect units; a block flows through them front to back.
pub struct EffectChain {
  units: Vec<EffectUnit>,
  keys: EffectParamKeys,
}

impl EffectChain {
  pub fn empty() -> Self { Self { units: Vec::new(), keys: EffectParamKeys::new() } }

  /// Resolves every name before building anything, so one bad name rejects
  /// the whole chain.
  pub fn from_names<S: AsRef<str>>(names: &[S], sr: f32) -> EngineResult<Self> {
    let kinds = names
      .iter()
      .map(|n| EffectKind::from_name(n.as_ref()))
      .collect::<EngineResult<Vec<_>>>()?;
    Ok(Self::from_kinds(&kinds, sr))
  }

  pub fn from_kinds(kinds: &[EffectKind], sr: f32) -> Self {
    Self { units: kinds.iter().map(|&k| EffectUnit::new(k, sr)).collect(), keys: EffectParamKeys::new() }
  }

  pub fn is_empty(&self) -> bool { self.units.is_empty() }

  pub fn kinds(&self) -> Vec<EffectKind> { self.units.iter().map(|u| u.kind()).collect() }

  pub fn names(&self) -> Vec<&'static str> { self.units.iter().map(|u| u.kind().name()).collect() }

  pub fn process(&mut self, block: &mut [f32], params: &ParamStore) {
    for unit in self.units.iter_mut() { unit.process(block, params, &self.keys); }
  }
}

/// Control-side end of the chain hand-off. Installing sends a complete,
/// freshly built chain; the audio side adopts it between blocks.
pub struct ChainInstaller {
  tx: Sender<Box<EffectChain>>,
  retired_rx: Receiver<Box<EffectChain>>,
  current: Vec<EffectKind>,
}

/// Audio-side owner of the active chain.
pub struct ChainSlot {
  active: Box<EffectChain>,
  rx: Receiver<Box<EffectChain>>,
  retired_tx: Sender<Box<EffectChain>>,
}

const PENDING_CHAINS: usize = 8;
// Every install collects before it sends, so between two collections the
// audio side retires at most the pending queue plus the one chain sent
// after the collection.
const RETIRED_CHAINS: usize = PENDING_CHAINS + 1;

pub fn chain_pair(initial: EffectChain) -> (ChainInstaller, ChainSlot) {
  let (tx, rx) = bounded(PENDING_CHAINS);
  let (retired_tx, retired_rx) = bounded(RETIRED_CHAINS);
  let current = initial.kinds();
  (
    ChainInstaller { tx, retired_rx, current },
    ChainSlot { active: Box::new(initial), rx, retired_tx },
  )
}

impl ChainInstaller {
  pub fn install(&mut self, chain: EffectChain) -> EngineResult<()> {
    self.collect_retired();
    let kinds = chain.kinds();
    self.tx.try_send(Box::new(chain)).map_err(|e| match e {
      TrySendError::Full(_) => EngineError::Busy,
      TrySendError::Disconnected(_) => EngineError::Disconnected,
    })?;
    log::info!("effect chain installed: [{}]", kinds.iter().map(|k| k.name()).collect::<Vec<_>>().join(", "));
    self.current = kinds;
    Ok(())
  }

  pub fn current(&self) -> &[EffectKind] { &self.current }

  /// Drops chains the audio side has swapped out, off the audio thread.
  pub fn collect_retired(&self) -> usize {
    let mut n = 0;
    while self.retired_rx.try_recv().is_ok() { n += 1; }
    n
  }
}

impl ChainSlot {
  /// Adopts the newest pending chain (if any) and runs the block through it.
  /// The swap happens only here, before processing, so every block sees one
  /// whole chain.
  pub fn process(&mut self, block: &mut [f32], params: &ParamStore) {
    self.adopt_pending();
    self.active.process(block, params);
  }

  pub fn adopt_pending(&mut self) {
    loop {
      match self.rx.try_recv() {
        Ok(next) => {
          let old = std::mem::replace(&mut self.active, next);
          // sized by RETIRED_CHAINS, never full; a closed queue means shutdown
          if let Err(e) = self.retired_tx.try_send(old) { drop(e.into_inner()); }
        }
        Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
      }
    }
  }

  pub fn active(&self) -> &EffectChain { &self.active }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unknown_name_rejects_whole_chain() {
    let r = EffectChain::from_names(&["bitcrush", "warble", "reverb"], 48000.0);
    assert!(matches!(r, Err(EngineError::UnknownEffect(ref n)) if n == "warble"));
  }

  #[test]
  fn units_run_in_order() {
    let params = ParamStore::new();
    params.set("SAT_DRIVE", 1.0).unwrap();
    params.set("SAT_EXCITE", 0.0).unwrap();
    params.set("BITCRUSH_BITS", 2.0).unwrap();
    params.set("BITCRUSH_DOWNSAMPLE", 1.0).unwrap();
    let mut a = EffectChain::from_names(&["saturation", "bitcrush"], 48000.0).unwrap();
    let mut b = EffectChain::from_names(&["bitcrush", "saturation"], 48000.0).unwrap();
    let mut x = [0.3f32];
    let mut y = [0.3f32];
    a.process(&mut x, &params);
    b.process(&mut y, &params);
    assert_eq!(x[0], (0.3f32.tanh() * 4.0).round() / 4.0);
    assert_eq!(y[0], ((0.3f32 * 4.0).round() / 4.0).tanh());
  }

  #[test]
  fn slot_swaps_only_between_blocks() {
    let params = ParamStore::new();
    let (mut installer, mut slot) = chain_pair(EffectChain::empty());
    let mut block = [0.25f32; 16];
    slot.process(&mut block, &params);
    assert!(slot.active().is_empty());
    installer.install(EffectChain::from_names(&["none", "none"], 48000.0).unwrap()).unwrap();
    assert!(slot.active().is_empty());
    slot.process(&mut block, &params);
    assert_eq!(slot.active().names(), vec!["none", "none"]);
    assert_eq!(installer.collect_retired(), 1);
  }

  #[test]
  fn last_pending_chain_wins() {
    let (mut installer, mut slot) = chain_pair(EffectChain::empty());
    installer.install(EffectChain::from_names(&["reverb"], 48000.0).unwrap()).unwrap();
    installer.install(EffectChain::from_names(&["bitcrush"], 48000.0).unwrap()).unwrap();
    slot.adopt_pending();
    assert_eq!(slot.active().names(), vec!["bitcrush"]);
    assert_eq!(installer.current(), &[EffectKind::Bitcrusher]);
  }

  #[test]
  fn retired_queue_holds_a_full_pending_queue_plus_one() {
    let (mut installer, mut slot) = chain_pair(EffectChain::empty());
    for _ in 0..PENDING_CHAINS {
      installer.install(EffectChain::from_names(&["reverb"], 48000.0).unwrap()).unwrap();
    }
    assert!(matches!(installer.install(EffectChain::empty()), Err(EngineError::Busy)));
    // one swap lands after the installer collected but before it sent
    let next = slot.rx.try_recv().unwrap();
    let old = std::mem::replace(&mut slot.active, next);
    slot.retired_tx.try_send(old).unwrap();
    installer.tx.try_send(Box::new(EffectChain::from_names(&["bitcrush"], 48000.0).unwrap())).unwrap();
    slot.adopt_pending();
    assert_eq!(slot.active().names(), vec!["bitcrush"]);
    assert_eq!(installer.collect_retired(), PENDING_CHAINS + 1);
  }
}
