use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use super::relay::RelayChannel;

pub const TICK: Duration = Duration::from_millis(10);
// drop counters are checked every this many ticks
const MONITOR_TICKS: u32 = 100;

/// Boolean mute/route source polled by the control side.
pub trait KeySignal: Send {
  fn is_on(&self) -> bool;
}

/// Signal flipped by operator commands.
#[derive(Clone, Default)]
pub struct ManualSignal(Arc<AtomicBool>);

impl ManualSignal {
  pub fn new() -> Self { Self::default() }
  pub fn set(&self, on: bool) { self.0.store(on, Ordering::Relaxed); }
  pub fn toggle(&self) -> bool { !self.0.fetch_xor(true, Ordering::Relaxed) }
}

impl KeySignal for ManualSignal {
  fn is_on(&self) -> bool { self.0.load(Ordering::Relaxed) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
  Rising,
  Falling,
}

/// Turns successive samples of a signal into edges.
#[derive(Default)]
pub struct EdgeDetector {
  last: bool,
}

impl EdgeDetector {
  pub fn update(&mut self, on: bool) -> Option<Edge> {
    let edge = match (self.last, on) {
      (false, true) => Some(Edge::Rising),
      (true, false) => Some(Edge::Falling),
      _ => None,
    };
    self.last = on;
    edge
  }
}

/// A count of discarded blocks that only ever grows.
pub trait DropCounter: Send {
  fn dropped(&self) -> u64;
}

impl DropCounter for Arc<AtomicU64> {
  fn dropped(&self) -> u64 { self.load(Ordering::Relaxed) }
}

impl DropCounter for Arc<RelayChannel> {
  fn dropped(&self) -> u64 { RelayChannel::dropped(self) }
}

/// Warns about every increase of the tracked drop counters since the
/// previous poll.
#[derive(Default)]
pub struct DropMonitor {
  sources: Vec<(&'static str, Box<dyn DropCounter>, u64)>,
}

impl DropMonitor {
  pub fn new() -> Self { Self::default() }

  pub fn track<C: DropCounter + 'static>(mut self, what: &'static str, counter: C) -> Self {
    let seen = counter.dropped();
    self.sources.push((what, Box::new(counter), seen));
    self
  }

  /// Returns how many drops were new since the last poll.
  pub fn poll(&mut self) -> u64 {
    let mut total = 0;
    for (what, counter, seen) in self.sources.iter_mut() {
      let now = counter.dropped();
      if now > *seen {
        let n = now - *seen;
        log::warn!("{n} {what} dropped ({now} total)");
        total += n;
        *seen = now;
      }
    }
    total
  }
}

/// Background poller: mirrors the signal into the shared mute flag and runs
/// `on_mute` once per rising edge. Stops and joins on drop.
pub struct SignalWatcher {
  stop: Arc<AtomicBool>,
  handle: Option<JoinHandle<()>>,
}

pub fn watch<S, F>(signal: S, mute: Arc<AtomicBool>, on_mute: F, tick: Duration) -> SignalWatcher
where
  S: KeySignal + 'static,
  F: FnMut() + Send + 'static,
{
  watch_with(signal, mute, on_mute, DropMonitor::new(), tick)
}

/// Like [`watch`], and also polls `monitor` about once a second.
pub fn watch_with<S, F>(signal: S, mute: Arc<AtomicBool>, mut on_mute: F, mut monitor: DropMonitor, tick: Duration) -> SignalWatcher
where
  S: KeySignal + 'static,
  F: FnMut() + Send + 'static,
{
  let stop = Arc::new(AtomicBool::new(false));
  let stop_flag = stop.clone();
  let handle = std::thread::Builder::new()
    .name("voxrelay-signal".into())
    .spawn(move || {
      let mut edges = EdgeDetector::default();
      let mut ticks = 0u32;
      while !stop_flag.load(Ordering::Relaxed) {
        ticks += 1;
        if ticks >= MONITOR_TICKS {
          ticks = 0;
          monitor.poll();
        }
        let on = signal.is_on();
        match edges.update(on) {
          Some(Edge::Rising) => {
            mute.store(true, Ordering::Relaxed);
            on_mute();
            log::info!("muted");
          }
          Some(Edge::Falling) => {
            mute.store(false, Ordering::Relaxed);
            log::info!("unmuted");
          }
          None => {}
        }
        std::thread::sleep(tick);
      }
    })
    .map_err(|e| log::error!("failed to spawn signal watcher: {e}"))
    .ok();
  SignalWatcher { stop, handle }
}

impl SignalWatcher {
  pub fn is_running(&self) -> bool { self.handle.as_ref().map_or(false, |h| !h.is_finished()) }
}

impl Drop for SignalWatcher {
  fn drop(&mut self) {
    self.stop.store(true, Ordering::Relaxed);
    if let Some(h) = self.handle.take() {
      let _ = h.join();
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::AtomicUsize;
  use std::time::Instant;

  #[test]
  fn edges_fire_once_per_transition() {
    let mut d = EdgeDetector::default();
    let seq = [false, true, true, false, false, true];
    let got: Vec<_> = seq.iter().map(|&on| d.update(on)).collect();
    assert_eq!(
      got,
      vec![None, Some(Edge::Rising), None, Some(Edge::Falling), None, Some(Edge::Rising)]
    );
  }

  #[test]
  fn manual_toggle_returns_new_state() {
    let s = ManualSignal::new();
    assert!(s.toggle());
    assert!(s.is_on());
    assert!(!s.toggle());
  }

  fn wait_for(cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
      if cond() { return true; }
      std::thread::sleep(Duration::from_millis(2));
    }
    false
  }

  #[test]
  fn watcher_mirrors_signal_and_flushes_on_mute() {
    let signal = ManualSignal::new();
    let mute = Arc::new(AtomicBool::new(false));
    let flushes = Arc::new(AtomicUsize::new(0));
    let f = flushes.clone();
    let w = watch(signal.clone(), mute.clone(), move || { f.fetch_add(1, Ordering::Relaxed); }, Duration::from_millis(1));
    assert!(w.is_running());

    signal.set(true);
    assert!(wait_for(|| mute.load(Ordering::Relaxed) && flushes.load(Ordering::Relaxed) == 1));

    signal.set(false);
    assert!(wait_for(|| !mute.load(Ordering::Relaxed)));
    assert_eq!(flushes.load(Ordering::Relaxed), 1);
    drop(w);
  }

  #[test]
  fn monitor_reports_only_new_drops() {
    let captures = Arc::new(AtomicU64::new(3));
    let relay = Arc::new(RelayChannel::new(1));
    let mut m = DropMonitor::new().track("captured blocks", captures.clone()).track("relay blocks", relay.clone());
    // drops from before tracking started are not news
    assert_eq!(m.poll(), 0);
    captures.fetch_add(2, Ordering::Relaxed);
    relay.push(&[0.0; 4]);
    relay.push(&[0.0; 4]);
    relay.push(&[0.0; 4]);
    assert_eq!(m.poll(), 4);
    assert_eq!(m.poll(), 0);
  }

  #[test]
  fn watcher_polls_its_monitor() {
    let captures = Arc::new(AtomicU64::new(0));
    let seen = Arc::new(AtomicU64::new(0));
    struct Spy(Arc<AtomicU64>, Arc<AtomicU64>);
    impl DropCounter for Spy {
      fn dropped(&self) -> u64 {
        self.1.fetch_add(1, Ordering::Relaxed);
        self.0.load(Ordering::Relaxed)
      }
    }
    let monitor = DropMonitor::new().track("captured blocks", Spy(captures.clone(), seen.clone()));
    let w = watch_with(ManualSignal::new(), Arc::new(AtomicBool::new(false)), || {}, monitor, Duration::from_millis(1));
    captures.fetch_add(1, Ordering::Relaxed);
    // one read at track time, more once the watcher polls
    assert!(wait_for(|| seen.load(Ordering::Relaxed) >= 2));
    drop(w);
  }
}
