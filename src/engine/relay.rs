use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

struct RelayInner {
  blocks: VecDeque<Vec<f32>>,
  // storage of evicted/consumed blocks, reused by later pushes
  spare: Vec<Vec<f32>>,
  dropped: u64,
}

/// Bounded FIFO of mixed blocks between a primary callback (producer) and a
/// secondary output callback (consumer). The lock is held only for the push
/// or pop itself. A full channel evicts its oldest block; an empty one yields
/// silence.
pub struct RelayChannel {
  inner: Mutex<RelayInner>,
  capacity: usize,
}

impl RelayChannel {
  pub fn new(capacity: usize) -> Self {
    let capacity = capacity.max(1);
    Self {
      inner: Mutex::new(RelayInner {
        blocks: VecDeque::with_capacity(capacity + 1),
        spare: Vec::with_capacity(capacity + 1),
        dropped: 0,
      }),
      capacity,
    }
  }

  fn lock(&self) -> MutexGuard<'_, RelayInner> {
    // a poisoned relay still holds valid samples
    self.inner.lock().unwrap_or_else(|e| e.into_inner())
  }

  pub fn capacity(&self) -> usize { self.capacity }
  pub fn len(&self) -> usize { self.lock().blocks.len() }
  pub fn is_empty(&self) -> bool { self.lock().blocks.is_empty() }
  pub fn dropped(&self) -> u64 { self.lock().dropped }

  /// Copies `block` in. Never blocks beyond the push itself and never fails.
  pub fn push(&self, block: &[f32]) {
    let mut g = self.lock();
    let mut slot = if g.blocks.len() >= self.capacity {
      g.dropped += 1;
      g.blocks.pop_front().unwrap_or_default()
    } else {
      g.spare.pop().unwrap_or_default()
    };
    slot.clear();
    slot.extend_from_slice(block);
    g.blocks.push_back(slot);
  }

  /// Fills `out` from the oldest block. A longer block is split and its tail
  /// put back at the front; a shorter one (or none) is zero padded. Returns
  /// the number of samples taken from the channel.
  pub fn pop_into(&self, out: &mut [f32]) -> usize {
    let mut g = self.lock();
    let Some(mut block) = g.blocks.pop_front() else {
      drop(g);
      out.fill(0.0);
      return 0;
    };
    let n = block.len().min(out.len());
    out[..n].copy_from_slice(&block[..n]);
    out[n..].fill(0.0);
    if block.len() > n {
      block.drain(..n);
      g.blocks.push_front(block);
    } else {
      g.spare.push(block);
    }
    n
  }

  pub fn clear(&self) {
    let mut g = self.lock();
    let RelayInner { blocks, spare, .. } = &mut *g;
    spare.extend(blocks.drain(..));
  }

  #[cfg(test)]
  fn snapshot(&self) -> Vec<Vec<f32>> { self.lock().blocks.iter().cloned().collect() }
}
